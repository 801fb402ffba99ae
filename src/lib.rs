//! Admin notices library
//!
//! Storage, per-request selection, rendering and dismissal of admin panel
//! notices, on top of a SQLite-backed option store.

pub mod config;
pub mod notices;
pub mod option_store;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use notices::{NoticeBoard, NoticeRecord, NoticeSettings, NoticeStore, NoticeType};
pub use option_store::{InMemoryOptionStore, OptionStore, SqliteOptionStore, UserMetaStore};
pub use user::{Operator, Principal, UserRole};
