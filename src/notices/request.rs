//! Per-request inputs, derived from the query string of an admin page view.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use url::form_urlencoded;

/// Decodes `a=1&b=two+words` into an ordered map. Later duplicates win.
pub fn parse_query(query: &str) -> IndexMap<String, String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Keeps text-like characters only, the way a screen id arrives from a
/// query parameter.
fn sanitize_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() && *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub current_screen: String,
    /// A critical error is already on screen; lesser notices stay hidden.
    pub has_blocking_error: bool,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(current_screen: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            current_screen: current_screen.into(),
            has_blocking_error: false,
            now,
        }
    }

    pub fn from_query(query: &str, screen_param: &str, now: DateTime<Utc>) -> Self {
        let params = parse_query(query);
        let screen = params
            .get(screen_param)
            .map(|s| sanitize_text(s))
            .unwrap_or_default();
        Self::new(screen, now)
    }

    pub fn with_blocking_error(mut self, has_blocking_error: bool) -> Self {
        self.has_blocking_error = has_blocking_error;
        self
    }
}

/// A dismissal asked for through the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DismissRequest {
    pub notice_id: String,
    pub nonce: Option<String>,
}

impl DismissRequest {
    pub fn new(notice_id: impl Into<String>, nonce: Option<String>) -> Self {
        Self {
            notice_id: notice_id.into(),
            nonce,
        }
    }

    /// None when the query carries no dismissal parameter at all.
    pub fn from_query(query: &str, dismiss_param: &str, nonce_param: &str) -> Option<Self> {
        let mut params = parse_query(query);
        // Taken verbatim: it must match a stored key exactly
        let notice_id = params.shift_remove(dismiss_param)?;
        if notice_id.is_empty() {
            return None;
        }
        let nonce = params
            .shift_remove(nonce_param)
            .filter(|nonce| !nonce.is_empty());
        Some(Self::new(notice_id, nonce))
    }
}
