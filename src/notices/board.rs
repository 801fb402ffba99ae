//! Wires the notice components together for a page view.

use super::condition::ConditionEvaluator;
use super::dismissal::{DismissError, DismissOutcome, DismissalHandler, DISMISS_NONCE_ACTION};
use super::filter::NoticeFilterEngine;
use super::hooks::{NoHooks, NoticeHooks};
use super::models::NoticeRecord;
use super::render::{AdminNoticeRenderer, NoticeRenderer};
use super::request::{DismissRequest, RequestContext};
use super::store::NoticeStore;
use crate::option_store::{OptionStore, UserMetaStore};
use crate::user::{NonceManager, Principal};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

/// Option keys, nonce lifetime and query parameter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeSettings {
    pub notices_option_key: String,
    pub groups_option_key: String,
    pub nonce_lifespan_secs: u64,
    pub screen_param: String,
    pub dismiss_param: String,
    pub nonce_param: String,
}

impl Default for NoticeSettings {
    fn default() -> Self {
        Self {
            notices_option_key: "admin_notices".to_string(),
            groups_option_key: "admin_group_notices".to_string(),
            nonce_lifespan_secs: 86_400,
            screen_param: "page".to_string(),
            dismiss_param: "notice_dismiss".to_string(),
            nonce_param: "_notice_nonce".to_string(),
        }
    }
}

pub struct NoticeBoard {
    settings: NoticeSettings,
    options: Arc<dyn OptionStore>,
    store: Arc<NoticeStore>,
    nonces: Arc<NonceManager>,
    engine: NoticeFilterEngine,
    dismissal: DismissalHandler,
    hooks: Arc<dyn NoticeHooks>,
    renderer: Box<dyn NoticeRenderer>,
}

impl NoticeBoard {
    pub fn new(
        options: Arc<dyn OptionStore>,
        user_meta: Arc<dyn UserMetaStore>,
        settings: NoticeSettings,
    ) -> Self {
        Self::with_hooks(options, user_meta, settings, Arc::new(NoHooks))
    }

    pub fn with_hooks(
        options: Arc<dyn OptionStore>,
        user_meta: Arc<dyn UserMetaStore>,
        settings: NoticeSettings,
        hooks: Arc<dyn NoticeHooks>,
    ) -> Self {
        let store = Arc::new(NoticeStore::new(
            options.clone(),
            settings.notices_option_key.clone(),
            settings.groups_option_key.clone(),
        ));
        let nonces = Arc::new(NonceManager::new(
            options.clone(),
            settings.nonce_lifespan_secs,
        ));
        let dismissal = DismissalHandler::new(store.clone(), user_meta, nonces.clone(), hooks.clone());
        Self {
            engine: NoticeFilterEngine::new(options.clone()),
            settings,
            options,
            store,
            nonces,
            dismissal,
            hooks,
            renderer: Box::new(AdminNoticeRenderer),
        }
    }

    pub fn with_renderer(mut self, renderer: impl NoticeRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn settings(&self) -> &NoticeSettings {
        &self.settings
    }

    pub fn store(&self) -> &NoticeStore {
        &self.store
    }

    pub fn dismissal(&self) -> &DismissalHandler {
        &self.dismissal
    }

    pub fn context_from_query(&self, query: &str, now: DateTime<Utc>) -> RequestContext {
        RequestContext::from_query(query, &self.settings.screen_param, now)
    }

    /// The notices to show, in display order, after hooks had their say.
    pub fn resolve(
        &self,
        context: &RequestContext,
        principal: &dyn Principal,
    ) -> Result<Vec<NoticeRecord>> {
        let resolved = self.engine.resolve(self.store.list()?, context, principal);
        Ok(self.hooks.filter_notices(resolved))
    }

    /// Markup for every notice to show, in display order.
    pub fn display(
        &self,
        context: &RequestContext,
        principal: &dyn Principal,
    ) -> Result<Vec<String>> {
        let evaluator = ConditionEvaluator::new(&context.current_screen, self.options.as_ref());
        Ok(self
            .resolve(context, principal)?
            .iter()
            .filter_map(|notice| {
                let Some(markup) = self.renderer.render(notice, &evaluator) else {
                    debug!("No markup for notice {}", notice.id);
                    return None;
                };
                Some(match &notice.notice_type {
                    Some(notice_type) => self.hooks.filter_markup(notice_type, markup),
                    None => markup,
                })
            })
            .collect())
    }

    pub fn issue_dismiss_nonce(
        &self,
        principal: &dyn Principal,
        now: DateTime<Utc>,
    ) -> Result<String> {
        self.nonces
            .create(DISMISS_NONCE_ACTION, principal.user_id(), now)
    }

    /// Query string that dismisses `notice_id` when appended to an admin
    /// page URL.
    pub fn dismiss_query(
        &self,
        notice_id: &str,
        principal: &dyn Principal,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let nonce = self.issue_dismiss_nonce(principal, now)?;
        Ok(form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.settings.dismiss_param, notice_id)
            .append_pair(&self.settings.nonce_param, &nonce)
            .finish())
    }

    pub fn dismiss(
        &self,
        request: &DismissRequest,
        principal: &dyn Principal,
        now: DateTime<Utc>,
    ) -> Result<DismissOutcome, DismissError> {
        self.dismissal.dismiss(request, principal, now)
    }

    /// Handles the dismissal parameters of a page request, if present.
    pub fn handle_dismiss_request(
        &self,
        query: &str,
        principal: &dyn Principal,
        now: DateTime<Utc>,
    ) -> Result<Option<DismissOutcome>, DismissError> {
        let Some(request) = DismissRequest::from_query(
            query,
            &self.settings.dismiss_param,
            &self.settings.nonce_param,
        ) else {
            return Ok(None);
        };
        self.dismiss(&request, principal, now).map(Some)
    }
}
