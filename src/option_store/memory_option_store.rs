//! In-memory option store.
//!
//! Holds everything in process memory. Useful for embedding the notice
//! engine where nothing needs to survive a restart, and in tests.

use super::{OptionStore, UserMetaStore};
use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct InMemoryOptionStore {
    options: Mutex<IndexMap<String, String>>,
    user_meta: Mutex<BTreeMap<(usize, String), String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow!("in-memory option store lock poisoned"))
}

impl InMemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for InMemoryOptionStore {
    fn get_option(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.options)?.get(key).cloned())
    }

    fn set_option(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.options)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_option(&self, key: &str) -> Result<()> {
        lock(&self.options)?.shift_remove(key);
        Ok(())
    }

    fn set_options(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut options = lock(&self.options)?;
        for (key, value) in entries {
            options.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

impl UserMetaStore for InMemoryOptionStore {
    fn get_user_meta(&self, user_id: usize, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.user_meta)?
            .get(&(user_id, key.to_string()))
            .cloned())
    }

    fn set_user_meta(&self, user_id: usize, key: &str, value: &str) -> Result<()> {
        lock(&self.user_meta)?.insert((user_id, key.to_string()), value.to_string());
        Ok(())
    }

    fn delete_user_meta(&self, user_id: usize, key: &str) -> Result<()> {
        lock(&self.user_meta)?.remove(&(user_id, key.to_string()));
        Ok(())
    }

    fn get_user_meta_keys(&self, user_id: usize, prefix: &str) -> Result<Vec<String>> {
        Ok(lock(&self.user_meta)?
            .keys()
            .filter(|(owner, key)| *owner == user_id && key.starts_with(prefix))
            .map(|(_, key)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_roundtrip_and_delete() {
        let store = InMemoryOptionStore::new();
        assert!(store.get_option("a").unwrap().is_none());

        store.set_option("a", "1").unwrap();
        store.set_options(&[("a", "2"), ("b", "3")]).unwrap();
        assert_eq!(store.get_option("a").unwrap(), Some("2".to_string()));
        assert_eq!(store.get_option("b").unwrap(), Some("3".to_string()));

        store.delete_option("a").unwrap();
        store.delete_option("missing").unwrap();
        assert!(store.get_option("a").unwrap().is_none());
    }

    #[test]
    fn user_meta_keys_are_sorted_and_scoped() {
        let store = InMemoryOptionStore::new();
        store.set_user_meta(3, "p:b", "1").unwrap();
        store.set_user_meta(3, "p:a", "1").unwrap();
        store.set_user_meta(3, "q:c", "1").unwrap();
        store.set_user_meta(4, "p:z", "1").unwrap();

        assert_eq!(store.get_user_meta_keys(3, "p:").unwrap(), vec!["p:a", "p:b"]);
        assert_eq!(store.get_user_meta_keys(4, "p:").unwrap(), vec!["p:z"]);

        store.delete_user_meta(3, "p:a").unwrap();
        assert!(store.get_user_meta(3, "p:a").unwrap().is_none());
        assert_eq!(store.get_user_meta(3, "p:b").unwrap(), Some("1".to_string()));
    }
}
