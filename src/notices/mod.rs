//! Admin notices: storage, per-request selection, rendering and dismissal.

mod board;
mod condition;
mod dismissal;
mod filter;
mod hooks;
mod models;
pub mod render;
mod request;
mod store;

pub use board::{NoticeBoard, NoticeSettings};
pub use condition::{Comparison, Condition, ConditionEvaluator, ConditionKey};
pub use dismissal::{
    DismissError, DismissOutcome, DismissalHandler, DISMISSED_META_PREFIX, DISMISS_NONCE_ACTION,
};
pub use filter::{parse_date, NoticeFilterEngine};
#[cfg(feature = "mock")]
pub use hooks::MockNoticeHooks;
pub use hooks::{HookChain, NoHooks, NoticeHooks};
pub use models::{
    DismissSpec, ImageSpec, NavigationItem, NavigationSpec, NoticeButton, NoticeRecord,
    NoticeStyles, NoticeType, OneOrMany, StyleValue, DEFAULT_PRIORITY,
};
pub use render::{AdminNoticeRenderer, NoticeRenderer};
pub use request::{parse_query, DismissRequest, RequestContext};
pub use store::{GroupIndex, NoticeStore};
