//! Terminal presentation for the notices shell.

use admin_notices::notices::{NoticeRecord, NoticeType};
use clap::builder::styling::{AnsiColor, Style};
use clap::builder::Styles;
use crossterm::style::{Color, StyledContent, Stylize};
use unicode_width::UnicodeWidthStr;

const SEVERITY_ERROR: Color = Color::Rgb { r: 214, g: 54, b: 56 };
const SEVERITY_WARNING: Color = Color::Rgb { r: 219, g: 166, b: 23 };
const SEVERITY_INFO: Color = Color::Rgb { r: 34, g: 113, b: 177 };
const MUTED: Color = Color::Rgb { r: 120, g: 124, b: 130 };
const ACCENT: Color = Color::Rgb { r: 0, g: 163, b: 42 };

const DISMISSIBLE_MARK: &str = "×";
const COLUMN_GAP: &str = "  ";

fn ansi(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(color.into()))
}

pub fn get_styles() -> Styles {
    Styles::styled()
        .header(ansi(AnsiColor::Blue).bold())
        .usage(ansi(AnsiColor::Blue).bold())
        .literal(ansi(AnsiColor::Cyan))
        .placeholder(ansi(AnsiColor::BrightBlack))
        .valid(ansi(AnsiColor::Green))
        .invalid(ansi(AnsiColor::Red).bold())
        .error(ansi(AnsiColor::Red).bold())
}

/// Color a notice of this type is shown in. Types that never render are
/// muted.
pub fn severity_color(notice_type: Option<&NoticeType>) -> Color {
    match notice_type {
        Some(NoticeType::Error) => SEVERITY_ERROR,
        Some(NoticeType::Warning) => SEVERITY_WARNING,
        Some(NoticeType::Information) => SEVERITY_INFO,
        Some(NoticeType::Other(_)) | None => MUTED,
    }
}

/// Result of a shell command, as shown on its status line.
#[derive(Debug, Clone, Copy)]
pub enum Status {
    Done,
    Skipped,
    Failed,
    Note,
}

impl Status {
    fn marker(self) -> StyledContent<&'static str> {
        match self {
            Status::Done => "ok".with(ACCENT).bold(),
            Status::Skipped => "--".with(SEVERITY_WARNING).bold(),
            Status::Failed => "!!".with(SEVERITY_ERROR).bold(),
            Status::Note => "..".with(SEVERITY_INFO),
        }
    }
}

pub fn report(status: Status, message: &str) {
    let line = format!("[{}] {}", status.marker(), message);
    match status {
        Status::Failed => eprintln!("{}", line),
        _ => println!("{}", line),
    }
}

pub fn print_field(key: &str, value: &str) {
    println!("  {} {}", pad(key, 10).with(MUTED), value);
}

pub fn print_nothing(what: &str) {
    println!("  {}", format!("no {}", what).with(MUTED).italic());
}

/// One row per notice, colored by severity. Dismissible notices carry a
/// mark in the first column.
pub fn print_notice_table(notices: &[NoticeRecord]) {
    if notices.is_empty() {
        print_nothing("notices");
        return;
    }

    let headers = ["", "id", "type", "prio", "group", "title"];
    let rows: Vec<[String; 6]> = notices
        .iter()
        .map(|notice| {
            [
                (if notice.dismissible { DISMISSIBLE_MARK } else { "" }).to_string(),
                notice.id.clone(),
                notice
                    .notice_type
                    .as_ref()
                    .map_or_else(|| "?".to_string(), NoticeType::to_string),
                notice.priority.map_or_else(|| "-".to_string(), |p| p.to_string()),
                notice.group.clone().unwrap_or_default(),
                notice
                    .title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .or_else(|| notice.message.clone())
                    .unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = headers.map(|h| h.width());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let header = headers
        .iter()
        .zip(widths)
        .map(|(h, w)| pad(h, w))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    println!("{}", header.trim_end().with(MUTED).underlined());

    for (notice, row) in notices.iter().zip(&rows) {
        let color = severity_color(notice.notice_type.as_ref());
        let line = row
            .iter()
            .zip(widths)
            .map(|(cell, w)| pad(cell, w))
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        println!("{}", line.trim_end().with(color));
    }
}

fn pad(cell: &str, width: usize) -> String {
    format!("{}{}", cell, " ".repeat(width.saturating_sub(cell.width())))
}

pub fn get_prompt() -> String {
    format!("{} ", "notices>".with(SEVERITY_INFO).bold())
}

pub fn print_welcome(db_path: &str) {
    println!(
        "{} {}",
        "admin notices".with(SEVERITY_INFO).bold(),
        format!("({})", env!("NOTICES_GIT_HASH")).with(MUTED)
    );
    print_field("database", db_path);
    println!();
}

pub fn print_goodbye() {
    println!("{}", "bye".with(MUTED));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_type() {
        assert_eq!(severity_color(Some(&NoticeType::Error)), SEVERITY_ERROR);
        assert_eq!(severity_color(Some(&NoticeType::from("promo"))), MUTED);
        assert_eq!(severity_color(None), MUTED);
    }

    #[test]
    fn pad_uses_display_width() {
        assert_eq!(pad("ab", 4), "ab  ");
        assert_eq!(pad("日本", 5), "日本 ");
        assert_eq!(pad("toolong", 3), "toolong");
    }
}
