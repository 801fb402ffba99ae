use super::schema::OPTIONS_VERSIONED_SCHEMAS;
use super::{OptionStore, UserMetaStore};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct SqliteOptionStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteOptionStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path.as_ref(), OPTIONS_VERSIONED_SCHEMAS, "options")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: db_path.as_ref().to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("options database connection lock poisoned"))
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }
}

impl OptionStore for SqliteOptionStore {
    fn get_option(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM options WHERE key = ?1")?;
        let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).optional()?;
        Ok(value)
    }

    fn set_option(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO options (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, Self::now()],
        )?;
        Ok(())
    }

    fn delete_option(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM options WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn set_options(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut conn = self.lock()?;
        let now = Self::now();
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO options (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl UserMetaStore for SqliteOptionStore {
    fn get_user_meta(&self, user_id: usize, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT meta_value FROM user_meta WHERE user_id = ?1 AND meta_key = ?2",
                params![user_id as i64, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_user_meta(&self, user_id: usize, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_meta (user_id, meta_key, meta_value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, meta_key) DO UPDATE SET meta_value = ?3, updated_at = ?4",
            params![user_id as i64, key, value, Self::now()],
        )?;
        Ok(())
    }

    fn delete_user_meta(&self, user_id: usize, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM user_meta WHERE user_id = ?1 AND meta_key = ?2",
            params![user_id as i64, key],
        )?;
        Ok(())
    }

    fn get_user_meta_keys(&self, user_id: usize, prefix: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT meta_key FROM user_meta WHERE user_id = ?1 AND substr(meta_key, 1, ?2) = ?3
             ORDER BY meta_key",
        )?;
        let keys = stmt
            .query_map(
                params![user_id as i64, prefix.chars().count() as i64, prefix],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_persistence::BASE_DB_VERSION;
    use tempfile::TempDir;

    struct TestStore {
        store: SqliteOptionStore,
        _temp_dir: TempDir,
    }

    fn create_test_store() -> TestStore {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("options.db");
        let store = SqliteOptionStore::new(&db_path).unwrap();
        TestStore {
            store,
            _temp_dir: temp_dir,
        }
    }

    #[test]
    fn test_option_get_nonexistent() {
        let test = create_test_store();
        assert!(test.store.get_option("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_option_set_update_delete() {
        let test = create_test_store();
        let store = &test.store;

        store.set_option("key", "value1").unwrap();
        store.set_option("key", "value2").unwrap();
        assert_eq!(store.get_option("key").unwrap(), Some("value2".to_string()));

        store.delete_option("key").unwrap();
        assert!(store.get_option("key").unwrap().is_none());

        // Deleting again is a no-op
        store.delete_option("key").unwrap();
    }

    #[test]
    fn test_set_options_writes_all_entries() {
        let test = create_test_store();
        let store = &test.store;

        store
            .set_options(&[("notices", "{\"a\":1}"), ("groups", "{}")])
            .unwrap();

        assert_eq!(
            store.get_option("notices").unwrap(),
            Some("{\"a\":1}".to_string())
        );
        assert_eq!(store.get_option("groups").unwrap(), Some("{}".to_string()));
    }

    #[test]
    fn test_user_meta_is_scoped_per_user() {
        let test = create_test_store();
        let store = &test.store;

        store.set_user_meta(1, "dismissed_notice:a", "1").unwrap();
        store.set_user_meta(2, "dismissed_notice:b", "1").unwrap();

        assert_eq!(
            store.get_user_meta(1, "dismissed_notice:a").unwrap(),
            Some("1".to_string())
        );
        assert!(store.get_user_meta(2, "dismissed_notice:a").unwrap().is_none());

        store.delete_user_meta(1, "dismissed_notice:a").unwrap();
        assert!(store.get_user_meta(1, "dismissed_notice:a").unwrap().is_none());
    }

    #[test]
    fn test_user_meta_keys_by_prefix() {
        let test = create_test_store();
        let store = &test.store;

        store.set_user_meta(7, "dismissed_notice:z", "1").unwrap();
        store.set_user_meta(7, "dismissed_notice:a", "1").unwrap();
        store.set_user_meta(7, "other", "1").unwrap();

        let keys = store.get_user_meta_keys(7, "dismissed_notice:").unwrap();
        assert_eq!(keys, vec!["dismissed_notice:a", "dismissed_notice:z"]);
    }

    #[test]
    fn test_reopen_keeps_data_and_version() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("options.db");
        {
            let store = SqliteOptionStore::new(&db_path).unwrap();
            store.set_option("persisted", "yes").unwrap();
        }

        let store = SqliteOptionStore::new(&db_path).unwrap();
        assert_eq!(
            store.get_option("persisted").unwrap(),
            Some("yes".to_string())
        );

        let conn = store.lock().unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 2);
    }

    #[test]
    fn test_v1_database_is_migrated() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("options.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            OPTIONS_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
            conn.execute(
                "INSERT INTO options (key, value, updated_at) VALUES ('old', 'v', 'now')",
                [],
            )
            .unwrap();
        }

        let store = SqliteOptionStore::new(&db_path).unwrap();
        assert_eq!(store.get_option("old").unwrap(), Some("v".to_string()));
        store.set_user_meta(1, "k", "v").unwrap();
        assert_eq!(store.get_user_meta(1, "k").unwrap(), Some("v".to_string()));
    }
}
