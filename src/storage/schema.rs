//! Versioned schema migrations.
//!
//! The schema went through several revisions: the first had no `state`
//! column, and nothing stopped one owner from holding two stalls. Each
//! revision is an explicit, ordered migration recorded in `schema_migrations`,
//! with one statement list per backend.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(database_url: &str) -> Option<Self> {
        if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
            Some(Backend::Postgres)
        } else if database_url.starts_with("sqlite:") {
            Some(Backend::Sqlite)
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub postgres: &'static [&'static str],
    pub sqlite: &'static [&'static str],
}

impl Migration {
    pub fn statements(&self, backend: Backend) -> &'static [&'static str] {
        match backend {
            Backend::Postgres => self.postgres,
            Backend::Sqlite => self.sqlite,
        }
    }
}

pub const POSTGRES_BOOKKEEPING: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version BIGINT PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

pub const SQLITE_BOOKKEEPING: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)";

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "users, stalls and stock_updates",
        postgres: &[
            "CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                phone TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            "CREATE TABLE IF NOT EXISTS stalls (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL CHECK (name <> ''),
                address TEXT NOT NULL CHECK (address <> ''),
                latitude DOUBLE PRECISION,
                longitude DOUBLE PRECISION,
                phone TEXT,
                owner_id BIGINT REFERENCES users (id) ON DELETE SET NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            "CREATE TABLE IF NOT EXISTS stock_updates (
                id BIGSERIAL PRIMARY KEY,
                stall_id BIGINT NOT NULL REFERENCES stalls (id) ON DELETE CASCADE,
                varieties JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            "CREATE INDEX IF NOT EXISTS idx_stock_updates_latest
                ON stock_updates (stall_id, created_at DESC, id DESC)",
        ],
        sqlite: &[
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                phone TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
            "CREATE TABLE IF NOT EXISTS stalls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL CHECK (name <> ''),
                address TEXT NOT NULL CHECK (address <> ''),
                latitude REAL,
                longitude REAL,
                phone TEXT,
                owner_id INTEGER REFERENCES users (id) ON DELETE SET NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
            "CREATE TABLE IF NOT EXISTS stock_updates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stall_id INTEGER NOT NULL REFERENCES stalls (id) ON DELETE CASCADE,
                varieties TEXT NOT NULL CHECK (json_valid(varieties)),
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
            "CREATE INDEX IF NOT EXISTS idx_stock_updates_latest
                ON stock_updates (stall_id, created_at DESC, id DESC)",
        ],
    },
    Migration {
        version: 2,
        description: "stalls.state",
        postgres: &["ALTER TABLE stalls ADD COLUMN IF NOT EXISTS state VARCHAR(100)"],
        sqlite: &["ALTER TABLE stalls ADD COLUMN state TEXT"],
    },
    Migration {
        version: 3,
        description: "one stall per owner",
        postgres: &["CREATE UNIQUE INDEX IF NOT EXISTS idx_stalls_owner_unique ON stalls (owner_id)"],
        sqlite: &["CREATE UNIQUE INDEX IF NOT EXISTS idx_stalls_owner_unique ON stalls (owner_id)"],
    },
];

pub fn latest_version() -> i64 {
    MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppliedMigration {
    pub version: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MigrationReport {
    /// Migrations applied by this run (empty when already current).
    pub applied: Vec<AppliedMigration>,
    #[serde(rename = "currentVersion")]
    pub current_version: i64,
    #[serde(rename = "checkedAt")]
    pub checked_at: DateTime<Utc>,
}

/// Migrations not yet in `applied`, in version order.
pub fn pending<'a>(applied: &'a [i64]) -> impl Iterator<Item = &'static Migration> + 'a {
    MIGRATIONS
        .iter()
        .filter(move |m| !applied.contains(&m.version))
}
