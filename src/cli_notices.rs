use admin_notices::config::{AppConfig, CliConfig, FileConfig, LoggingLevel};
use admin_notices::notices::{
    DismissOutcome, DismissRequest, NoticeBoard, NoticeRecord, NoticeType, RequestContext,
};
use admin_notices::option_store::SqliteOptionStore;
use admin_notices::user::{Operator, UserRole};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;

use cli_style::{get_styles, print_field, print_nothing, print_notice_table, report, Status};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to the SQLite database holding options and user meta.
    #[clap(value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML config file. Values in it override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    #[clap(long, value_enum, default_value_t = LoggingLevel::Info)]
    pub logging_level: LoggingLevel,

    /// Lifetime of dismissal tokens, in seconds.
    #[clap(long)]
    pub nonce_lifespan_secs: Option<u64>,
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

/// Acting user for commands that depend on who is looking.
#[derive(clap::Args, Debug)]
struct AsUser {
    #[clap(long, default_value_t = 1)]
    user_id: usize,

    /// Role of the acting user, may be repeated.
    #[clap(long = "role", default_value = "administrator")]
    roles: Vec<String>,

    /// Extra capability granted to the acting user, may be repeated.
    #[clap(long = "cap")]
    capabilities: Vec<String>,
}

impl AsUser {
    fn operator(&self) -> Result<Operator> {
        let mut roles = Vec::with_capacity(self.roles.len());
        for role in &self.roles {
            match UserRole::from_str(role) {
                Some(r) => roles.push(r),
                None => bail!(
                    "Invalid role '{}'. Valid roles are: administrator, editor, author, subscriber",
                    role
                ),
            }
        }
        Ok(self
            .capabilities
            .iter()
            .fold(Operator::new(self.user_id, roles), |operator, cap| {
                operator.with_capability(cap.as_str())
            }))
    }
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Adds a notice. Extra fields can be given as a JSON object.
    Add {
        id: String,
        /// error, warning, information, or any custom type.
        notice_type: String,
        #[clap(long)]
        message: Option<String>,
        #[clap(long)]
        title: Option<String>,
        #[clap(long)]
        group: Option<String>,
        #[clap(long)]
        priority: Option<i64>,
        #[clap(long)]
        dismissible: bool,
        /// JSON object with any other notice field.
        #[clap(long)]
        json: Option<String>,
    },

    /// Removes a notice and its group membership.
    Remove { id: String },

    /// Removes every notice and every group.
    RemoveAll,

    /// Shows all stored notices.
    List,

    /// Shows a stored notice as JSON.
    Show { id: String },

    /// Shows the group index.
    Groups,

    /// Shows the notices that would be displayed for a request.
    Resolve {
        /// Query string of the admin page request, e.g. "page=dashboard".
        #[clap(default_value = "")]
        query: String,
        #[clap(long)]
        blocking_error: bool,
        #[command(flatten)]
        user: AsUser,
    },

    /// Prints the markup that would be displayed for a request.
    Render {
        #[clap(default_value = "")]
        query: String,
        #[clap(long)]
        blocking_error: bool,
        #[command(flatten)]
        user: AsUser,
    },

    /// Issues a dismissal token and prints the query that dismisses a notice.
    IssueNonce {
        id: String,
        #[command(flatten)]
        user: AsUser,
    },

    /// Dismisses a notice. Without --nonce a fresh token is issued first.
    Dismiss {
        id: String,
        #[clap(long)]
        nonce: Option<String>,
        #[command(flatten)]
        user: AsUser,
    },

    /// Shows the notices a user has dismissed.
    Dismissed {
        #[clap(default_value_t = 1)]
        user_id: usize,
    },

    /// Shows the path of the current notices db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

fn build_fields(
    message: Option<String>,
    title: Option<String>,
    priority: Option<i64>,
    dismissible: bool,
    json: Option<String>,
) -> Result<NoticeRecord> {
    let mut fields: NoticeRecord = match json {
        Some(json) => serde_json::from_str(&json).context("Invalid notice JSON")?,
        None => NoticeRecord::default(),
    };
    if message.is_some() {
        fields.message = message;
    }
    if title.is_some() {
        fields.title = title;
    }
    if priority.is_some() {
        fields.priority = priority;
    }
    fields.dismissible |= dismissible;
    Ok(fields)
}

fn request_context(
    board: &NoticeBoard,
    query: &str,
    blocking_error: bool,
) -> RequestContext {
    board
        .context_from_query(query, Utc::now())
        .with_blocking_error(blocking_error)
}

fn execute(command: InnerCommand, board: &NoticeBoard, db_path: &str) -> Result<bool> {
    match command {
        InnerCommand::Add {
            id,
            notice_type,
            message,
            title,
            group,
            priority,
            dismissible,
            json,
        } => {
            let fields = build_fields(message, title, priority, dismissible, json)?;
            if board.store().add(
                &id,
                NoticeType::from(notice_type.as_str()),
                fields,
                group.as_deref(),
            )? {
                report(Status::Done, &format!("Notice '{}' added", id));
            } else {
                report(
                    Status::Skipped,
                    &format!("Notice '{}' not added (empty id, no text, or already present)", id),
                );
            }
        }
        InnerCommand::Remove { id } => {
            if board.store().remove(&id)? {
                report(Status::Done, &format!("Notice '{}' removed", id));
            } else {
                report(Status::Skipped, &format!("Notice '{}' not found", id));
            }
        }
        InnerCommand::RemoveAll => {
            board.store().remove_all()?;
            report(Status::Done, "All notices removed");
        }
        InnerCommand::List => print_notice_table(&board.store().list()?),
        InnerCommand::Show { id } => match board.store().get(&id)? {
            Some(notice) => println!("{}", serde_json::to_string_pretty(&notice)?),
            None => report(Status::Skipped, &format!("Notice '{}' not found", id)),
        },
        InnerCommand::Groups => {
            let groups = board.store().groups()?;
            if groups.is_empty() {
                print_nothing("groups");
            }
            for (group, ids) in groups.iter() {
                print_field(group, &ids.join(", "));
            }
        }
        InnerCommand::Resolve {
            query,
            blocking_error,
            user,
        } => {
            let context = request_context(board, &query, blocking_error);
            report(Status::Note, &format!("Screen: '{}'", context.current_screen));
            print_notice_table(&board.resolve(&context, &user.operator()?)?);
        }
        InnerCommand::Render {
            query,
            blocking_error,
            user,
        } => {
            let context = request_context(board, &query, blocking_error);
            let markup = board.display(&context, &user.operator()?)?;
            if markup.is_empty() {
                print_nothing("markup to display");
            }
            for html in markup {
                println!("{}", html);
            }
        }
        InnerCommand::IssueNonce { id, user } => {
            let query = board.dismiss_query(&id, &user.operator()?, Utc::now())?;
            print_field("query", &query);
        }
        InnerCommand::Dismiss { id, nonce, user } => {
            let operator = user.operator()?;
            let now = Utc::now();
            let nonce = match nonce {
                Some(nonce) => nonce,
                None => board.issue_dismiss_nonce(&operator, now)?,
            };
            match board.dismiss(&DismissRequest::new(id.as_str(), Some(nonce)), &operator, now)? {
                DismissOutcome::Dismissed => {
                    report(Status::Done, &format!("Notice '{}' dismissed", id))
                }
                DismissOutcome::NotFound => {
                    report(Status::Skipped, &format!("Notice '{}' not found", id))
                }
            }
        }
        InnerCommand::Dismissed { user_id } => {
            let ids = board.dismissal().dismissed_notices(user_id)?;
            if ids.is_empty() {
                print_nothing("dismissed notices");
            }
            for id in ids {
                println!("  {}", id);
            }
        }
        InnerCommand::Where => println!("{}", db_path),
        InnerCommand::Exit => return Ok(false),
    }
    Ok(true)
}

fn execute_command(line: String, board: &NoticeBoard, db_path: &str) -> CommandExecutionResult {
    if line.trim().is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => match execute(cli.command, board, db_path) {
            Ok(true) => CommandExecutionResult::Ok,
            Ok(false) => CommandExecutionResult::Exit,
            Err(err) => CommandExecutionResult::Error(format!("{:#}", err)),
        },
        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
            CommandExecutionResult::Ok
        }
    }
}

#[derive(rustyline_derive::Hinter)]
struct NoticesHelper {
    commands_names: Vec<String>,
}

impl NoticesHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        NoticesHelper { commands_names }
    }
}

impl Completer for NoticesHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .cloned()
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for NoticesHelper {}
impl Validator for NoticesHelper {}
impl Helper for NoticesHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_path: cli_args.db_path.clone(),
        logging_level: cli_args.logging_level,
        nonce_lifespan_secs: cli_args.nonce_lifespan_secs,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(config.logging_level.as_filter().into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let store = Arc::new(SqliteOptionStore::new(&config.db_path)?);
    let board = NoticeBoard::new(store.clone(), store, config.notices.clone());
    let db_path = config.db_path.display().to_string();
    info!("Opened notices db at {}", db_path);

    cli_style::print_welcome(&db_path);
    InnerCli::command().print_long_help()?;

    let rl_config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<NoticesHelper, FileHistory>::with_config(rl_config)?;
    rl.set_helper(Some(NoticesHelper::new()));

    let prompt = cli_style::get_prompt();
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &board, &db_path) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => report(Status::Failed, &err),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                report(Status::Failed, &format!("{:?}", e));
                break;
            }
        }
    }
    cli_style::print_goodbye();
    Ok(())
}
