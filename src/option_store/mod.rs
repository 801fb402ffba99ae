//! Persistent key-value configuration storage.
//!
//! Notices, group indices and the anti-forgery secret live in site-wide
//! options; dismissal flags live in per-user meta entries.

mod memory_option_store;
mod schema;
mod sqlite_option_store;

pub use memory_option_store::InMemoryOptionStore;
pub use schema::OPTIONS_VERSIONED_SCHEMAS;
pub use sqlite_option_store::SqliteOptionStore;

use anyhow::Result;

pub trait OptionStore: Send + Sync {
    /// Returns the raw value stored under `key`, None if it was never set.
    fn get_option(&self, key: &str) -> Result<Option<String>>;

    /// Inserts or replaces the value stored under `key`.
    fn set_option(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes `key`. Deleting a missing key is not an error.
    fn delete_option(&self, key: &str) -> Result<()>;

    /// Writes all entries, or none of them if any write fails.
    fn set_options(&self, entries: &[(&str, &str)]) -> Result<()>;
}

pub trait UserMetaStore: Send + Sync {
    /// Returns the value of a per-user entry, None if it was never set.
    fn get_user_meta(&self, user_id: usize, key: &str) -> Result<Option<String>>;

    /// Inserts or replaces a per-user entry.
    fn set_user_meta(&self, user_id: usize, key: &str, value: &str) -> Result<()>;

    /// Deletes a per-user entry. Deleting a missing entry is not an error.
    fn delete_user_meta(&self, user_id: usize, key: &str) -> Result<()>;

    /// Returns the keys of a user's entries that start with `prefix`, sorted.
    fn get_user_meta_keys(&self, user_id: usize, prefix: &str) -> Result<Vec<String>>;
}
