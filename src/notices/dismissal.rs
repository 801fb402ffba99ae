//! Validation and processing of dismissal requests.

use super::hooks::NoticeHooks;
use super::request::DismissRequest;
use super::store::NoticeStore;
use crate::option_store::UserMetaStore;
use crate::user::{NonceManager, Principal};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Action the dismissal anti-forgery token is scoped to.
pub const DISMISS_NONCE_ACTION: &str = "notice-dismiss";

/// Prefix of the per-user entries recording dismissed notices.
pub const DISMISSED_META_PREFIX: &str = "dismissed_notice:";

#[derive(Debug, Error)]
pub enum DismissError {
    #[error("Missing security token, the request could not be verified")]
    MissingNonce,

    #[error("Invalid or expired security token")]
    InvalidNonce,

    #[error("Notice {0} cannot be dismissed")]
    NotDismissible(String),

    #[error("You are not allowed to dismiss notice {notice_id} (requires {capability})")]
    NotPermitted {
        notice_id: String,
        capability: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DismissOutcome {
    Dismissed,
    /// The notice did not exist; nothing was done.
    NotFound,
}

pub struct DismissalHandler {
    store: Arc<NoticeStore>,
    user_meta: Arc<dyn UserMetaStore>,
    nonces: Arc<NonceManager>,
    hooks: Arc<dyn NoticeHooks>,
}

impl DismissalHandler {
    pub fn new(
        store: Arc<NoticeStore>,
        user_meta: Arc<dyn UserMetaStore>,
        nonces: Arc<NonceManager>,
        hooks: Arc<dyn NoticeHooks>,
    ) -> Self {
        Self {
            store,
            user_meta,
            nonces,
            hooks,
        }
    }

    /// Runs every check before touching anything: token, existence,
    /// dismissibility, capability. Only a request passing all of them
    /// removes the notice.
    pub fn dismiss(
        &self,
        request: &DismissRequest,
        principal: &dyn Principal,
        now: DateTime<Utc>,
    ) -> Result<DismissOutcome, DismissError> {
        let user_id = principal.user_id();
        let notice_id = request.notice_id.as_str();

        let nonce = request.nonce.as_deref().ok_or_else(|| {
            warn!("Dismissal of {} by user {} without token", notice_id, user_id);
            DismissError::MissingNonce
        })?;
        if self
            .nonces
            .verify(nonce, DISMISS_NONCE_ACTION, user_id, now)?
            .is_none()
        {
            warn!("Dismissal of {} by user {} with bad token", notice_id, user_id);
            return Err(DismissError::InvalidNonce);
        }

        let Some(notice) = self.store.get(notice_id)? else {
            info!("Dismissal of unknown notice {} ignored", notice_id);
            return Ok(DismissOutcome::NotFound);
        };

        if !notice.dismissible {
            warn!("User {} tried to dismiss {}", user_id, notice_id);
            return Err(DismissError::NotDismissible(notice_id.to_string()));
        }

        if let Some(capability) = notice.required_capability() {
            if !principal.has_capability(capability) {
                warn!(
                    "User {} lacks {} to dismiss {}",
                    user_id, capability, notice_id
                );
                return Err(DismissError::NotPermitted {
                    notice_id: notice_id.to_string(),
                    capability: capability.to_string(),
                });
            }
        }

        self.store.remove(notice_id)?;
        self.user_meta
            .set_user_meta(user_id, &dismissed_key(notice_id), &now.to_rfc3339())?;
        self.hooks.notice_dismissed(notice_id);

        info!("User {} dismissed notice {}", user_id, notice_id);
        Ok(DismissOutcome::Dismissed)
    }

    pub fn is_dismissed(&self, user_id: usize, notice_id: &str) -> anyhow::Result<bool> {
        Ok(self
            .user_meta
            .get_user_meta(user_id, &dismissed_key(notice_id))?
            .is_some())
    }

    /// Ids of the notices `user_id` has dismissed, sorted.
    pub fn dismissed_notices(&self, user_id: usize) -> anyhow::Result<Vec<String>> {
        Ok(self
            .user_meta
            .get_user_meta_keys(user_id, DISMISSED_META_PREFIX)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(DISMISSED_META_PREFIX).map(str::to_string))
            .collect())
    }
}

fn dismissed_key(notice_id: &str) -> String {
    format!("{}{}", DISMISSED_META_PREFIX, notice_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notices::hooks::NoHooks;
    use crate::notices::models::{NoticeRecord, NoticeType, OneOrMany};
    use crate::option_store::{InMemoryOptionStore, OptionStore};
    use crate::user::{Operator, UserRole};
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl NoticeHooks for Recorder {
        fn notice_dismissed(&self, notice_id: &str) {
            self.0.lock().unwrap().push(notice_id.to_string());
        }
    }

    struct Fixture {
        options: Arc<InMemoryOptionStore>,
        store: Arc<NoticeStore>,
        nonces: Arc<NonceManager>,
        recorder: Arc<Recorder>,
        handler: DismissalHandler,
    }

    fn fixture() -> Fixture {
        let options = Arc::new(InMemoryOptionStore::new());
        let store = Arc::new(NoticeStore::new(options.clone(), "notices", "groups"));
        let nonces = Arc::new(NonceManager::new(options.clone(), 86_400));
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let handler = DismissalHandler::new(
            store.clone(),
            options.clone(),
            nonces.clone(),
            recorder.clone(),
        );
        Fixture {
            options,
            store,
            nonces,
            recorder,
            handler,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn add(store: &NoticeStore, id: &str, dismissible: bool, capability: Option<&str>) {
        let mut fields = NoticeRecord::with_message("m");
        fields.dismissible = dismissible;
        fields.capability = capability.map(OneOrMany::from);
        store
            .add(id, NoticeType::Warning, fields, Some("batch"))
            .unwrap();
    }

    fn request(f: &Fixture, id: &str, user_id: usize) -> DismissRequest {
        let nonce = f.nonces.create(DISMISS_NONCE_ACTION, user_id, now()).unwrap();
        DismissRequest::new(id, Some(nonce))
    }

    #[test]
    fn dismiss_removes_and_records() {
        let f = fixture();
        add(&f.store, "n1", true, None);
        add(&f.store, "n2", true, None);
        let admin = Operator::new(1, vec![UserRole::Administrator]);

        let outcome = f.handler.dismiss(&request(&f, "n1", 1), &admin, now()).unwrap();
        assert_eq!(outcome, DismissOutcome::Dismissed);
        assert!(f.store.get("n1").unwrap().is_none());
        assert_eq!(f.store.group("batch").unwrap(), vec!["n2"]);
        assert!(f.handler.is_dismissed(1, "n1").unwrap());
        assert!(!f.handler.is_dismissed(2, "n1").unwrap());
        assert_eq!(f.handler.dismissed_notices(1).unwrap(), vec!["n1"]);
        assert_eq!(*f.recorder.0.lock().unwrap(), vec!["n1"]);
    }

    #[test]
    fn missing_or_bad_token_aborts() {
        let f = fixture();
        add(&f.store, "n1", true, None);
        let admin = Operator::new(1, vec![UserRole::Administrator]);

        let err = f
            .handler
            .dismiss(&DismissRequest::new("n1", None), &admin, now())
            .unwrap_err();
        assert!(matches!(err, DismissError::MissingNonce));

        let err = f
            .handler
            .dismiss(
                &DismissRequest::new("n1", Some("0123456789abcdef0123".to_string())),
                &admin,
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, DismissError::InvalidNonce));

        // A token issued to somebody else does not work either
        let err = f
            .handler
            .dismiss(&request(&f, "n1", 2), &admin, now())
            .unwrap_err();
        assert!(matches!(err, DismissError::InvalidNonce));

        assert!(f.store.get("n1").unwrap().is_some());
        assert!(f.recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn bad_token_is_checked_before_existence() {
        let f = fixture();
        let admin = Operator::new(1, vec![UserRole::Administrator]);
        let err = f
            .handler
            .dismiss(&DismissRequest::new("ghost", None), &admin, now())
            .unwrap_err();
        assert!(matches!(err, DismissError::MissingNonce));
    }

    #[test]
    fn absent_notice_is_silent_success() {
        let f = fixture();
        let admin = Operator::new(1, vec![UserRole::Administrator]);
        let outcome = f
            .handler
            .dismiss(&request(&f, "ghost", 1), &admin, now())
            .unwrap();
        assert_eq!(outcome, DismissOutcome::NotFound);
        assert!(f.handler.dismissed_notices(1).unwrap().is_empty());
        assert!(f.recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn non_dismissible_never_mutates() {
        let f = fixture();
        add(&f.store, "sticky", false, None);
        let before = f.options.get_option("notices").unwrap();
        let groups_before = f.options.get_option("groups").unwrap();
        let admin = Operator::new(1, vec![UserRole::Administrator]);

        let err = f
            .handler
            .dismiss(&request(&f, "sticky", 1), &admin, now())
            .unwrap_err();
        assert!(matches!(err, DismissError::NotDismissible(ref id) if id == "sticky"));

        assert_eq!(f.options.get_option("notices").unwrap(), before);
        assert_eq!(f.options.get_option("groups").unwrap(), groups_before);
        assert!(!f.handler.is_dismissed(1, "sticky").unwrap());
        assert!(f.recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn capability_is_rechecked() {
        let f = fixture();
        add(&f.store, "admins", true, Some("manage_options"));
        let editor = Operator::new(4, vec![UserRole::Editor]);

        let err = f
            .handler
            .dismiss(&request(&f, "admins", 4), &editor, now())
            .unwrap_err();
        match err {
            DismissError::NotPermitted {
                notice_id,
                capability,
            } => {
                assert_eq!(notice_id, "admins");
                assert_eq!(capability, "manage_options");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(f.store.get("admins").unwrap().is_some());

        let admin = Operator::new(1, vec![UserRole::Administrator]);
        let outcome = f
            .handler
            .dismiss(&request(&f, "admins", 1), &admin, now())
            .unwrap();
        assert_eq!(outcome, DismissOutcome::Dismissed);
    }

    #[test]
    fn dismiss_with_no_hooks() {
        let options = Arc::new(InMemoryOptionStore::new());
        let store = Arc::new(NoticeStore::new(options.clone(), "notices", "groups"));
        let nonces = Arc::new(NonceManager::new(options.clone(), 86_400));
        let handler = DismissalHandler::new(store.clone(), options, nonces.clone(), Arc::new(NoHooks));
        add(&store, "n1", true, None);

        let operator = Operator::new(3, vec![UserRole::Author]);
        let nonce = nonces.create(DISMISS_NONCE_ACTION, 3, now()).unwrap();
        let outcome = handler
            .dismiss(&DismissRequest::new("n1", Some(nonce)), &operator, now())
            .unwrap();
        assert_eq!(outcome, DismissOutcome::Dismissed);
    }
}
