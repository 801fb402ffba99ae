//! SQLite schema definitions for the options database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};
use anyhow::Result;
use rusqlite::Connection;

// =============================================================================
// Version 1 - Site-wide options
// =============================================================================

const OPTIONS_TABLE_V1: Table = Table {
    name: "options",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - Per-user meta entries (dismissal flags)
// =============================================================================

const USER_META_TABLE_V2: Table = Table {
    name: "user_meta",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Integer, non_null = true),
        sqlite_column!("meta_key", &SqlType::Text, non_null = true),
        sqlite_column!("meta_value", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_user_meta_user_id", "user_id")],
    unique_constraints: &[&["user_id", "meta_key"]],
};

fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    USER_META_TABLE_V2.create(conn)
}

pub const OPTIONS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[OPTIONS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[OPTIONS_TABLE_V1, USER_META_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
];
