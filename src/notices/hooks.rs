use super::models::{NoticeRecord, NoticeType};

/// Extension points around the notice lifecycle.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait NoticeHooks: Send + Sync {
    /// Last chance to change the resolved list before it is rendered.
    fn filter_notices(&self, notices: Vec<NoticeRecord>) -> Vec<NoticeRecord> {
        notices
    }

    /// Rewrites the rendered markup of one notice. Gets the notice type so
    /// a hook can target only, say, error banners.
    fn filter_markup(&self, _notice_type: &NoticeType, html: String) -> String {
        html
    }

    /// Called after a notice was dismissed and removed.
    fn notice_dismissed(&self, _notice_id: &str) {}
}

pub struct NoHooks;

impl NoticeHooks for NoHooks {}

/// Runs several hook implementations in registration order.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn NoticeHooks>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, hooks: impl NoticeHooks + 'static) -> Self {
        self.hooks.push(Box::new(hooks));
        self
    }
}

impl NoticeHooks for HookChain {
    fn filter_notices(&self, notices: Vec<NoticeRecord>) -> Vec<NoticeRecord> {
        self.hooks
            .iter()
            .fold(notices, |notices, hooks| hooks.filter_notices(notices))
    }

    fn filter_markup(&self, notice_type: &NoticeType, html: String) -> String {
        self.hooks
            .iter()
            .fold(html, |html, hooks| hooks.filter_markup(notice_type, html))
    }

    fn notice_dismissed(&self, notice_id: &str) {
        for hooks in &self.hooks {
            hooks.notice_dismissed(notice_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct DropIds(Vec<&'static str>);

    impl NoticeHooks for DropIds {
        fn filter_notices(&self, notices: Vec<NoticeRecord>) -> Vec<NoticeRecord> {
            notices
                .into_iter()
                .filter(|n| !self.0.contains(&n.id.as_str()))
                .collect()
        }
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl NoticeHooks for Recorder {
        fn notice_dismissed(&self, notice_id: &str) {
            self.0.lock().unwrap().push(notice_id.to_string());
        }
    }

    struct Badge(&'static str);

    impl NoticeHooks for Badge {
        fn filter_markup(&self, notice_type: &NoticeType, html: String) -> String {
            match notice_type {
                NoticeType::Error => format!("{}{}", html, self.0),
                _ => html,
            }
        }
    }

    fn record(id: &str) -> NoticeRecord {
        NoticeRecord {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn no_hooks_passes_through() {
        let notices = vec![record("a"), record("b")];
        assert_eq!(NoHooks.filter_notices(notices.clone()), notices);
    }

    #[test]
    fn chain_applies_filters_in_order_and_notifies_all() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = HookChain::new()
            .register(DropIds(vec!["a"]))
            .register(DropIds(vec!["c"]))
            .register(Recorder(seen.clone()))
            .register(Recorder(seen.clone()));

        let filtered = chain.filter_notices(vec![record("a"), record("b"), record("c")]);
        assert_eq!(filtered, vec![record("b")]);

        chain.notice_dismissed("b");
        assert_eq!(*seen.lock().unwrap(), vec!["b", "b"]);
    }

    #[test]
    fn markup_filters_chain_per_type() {
        let chain = HookChain::new().register(Badge("!")).register(Badge("?"));
        assert_eq!(
            chain.filter_markup(&NoticeType::Error, "<div></div>".to_string()),
            "<div></div>!?"
        );
        assert_eq!(
            chain.filter_markup(&NoticeType::Warning, "<div></div>".to_string()),
            "<div></div>"
        );
        assert_eq!(NoHooks.filter_markup(&NoticeType::Error, "x".to_string()), "x");
    }
}
