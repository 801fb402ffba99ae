//! Common test infrastructure
//!
//! A SQLite-backed notice board in a temporary directory, plus the users
//! and clock the end-to-end tests act with.

#![allow(dead_code)]

use admin_notices::notices::{NoticeBoard, NoticeSettings};
use admin_notices::option_store::SqliteOptionStore;
use admin_notices::user::{Operator, UserRole};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_ID: usize = 1;
pub const SUBSCRIBER_ID: usize = 7;

pub struct TestBoard {
    pub board: NoticeBoard,
    pub options: Arc<SqliteOptionStore>,
    // Keeps the database directory alive for the lifetime of the board
    pub temp_dir: TempDir,
}

impl TestBoard {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let options = Arc::new(SqliteOptionStore::new(temp_dir.path().join("notices.db")).unwrap());
        let board = NoticeBoard::new(options.clone(), options.clone(), NoticeSettings::default());
        TestBoard {
            board,
            options,
            temp_dir,
        }
    }

    /// A second board over the same database file, as a later request would
    /// see it.
    pub fn reopen(&self) -> NoticeBoard {
        let options =
            Arc::new(SqliteOptionStore::new(self.temp_dir.path().join("notices.db")).unwrap());
        NoticeBoard::new(options.clone(), options, NoticeSettings::default())
    }
}

pub fn admin() -> Operator {
    Operator::new(ADMIN_ID, vec![UserRole::Administrator])
}

pub fn subscriber() -> Operator {
    Operator::new(SUBSCRIBER_ID, vec![UserRole::Subscriber])
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}
