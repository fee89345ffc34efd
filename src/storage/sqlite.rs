//! SQLite store, used for local runs and tests.
//!
//! Timestamps are stored as RFC 3339 text with millisecond precision, so
//! lexical order matches time order.

use crate::domain::{
    Credentials, NewUser, Stall, StallDraft, StallId, StockUpdate, UpdateId, User, UserId,
    Variety,
};
use crate::error::{MarketError, MarketResult};
use crate::storage::rows::{ListingRow, StallRow, UpdateRow, UserRow};
use crate::storage::schema::{self, AppliedMigration, Backend, MigrationReport};
use crate::storage::{sql, MarketStore, StallWithLatest};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;

const STALL_COLUMNS: &str = "id, name, address, state, latitude, longitude, phone, owner_id";
const USER_COLUMNS: &str = "id, name, email, password_hash, phone, created_at";

#[derive(Clone)]
pub struct SqliteMarketStore {
    pool: SqlitePool,
}

impl SqliteMarketStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database at `database_url`.
    ///
    /// An in-memory database lives only as long as its connection, so those
    /// get a single connection that is never recycled.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if database_url.contains(":memory:") || database_url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Fresh in-memory store with the schema applied.
    pub async fn in_memory() -> MarketResult<Self> {
        let store = Self::connect("sqlite::memory:", 1).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn insert_update(
    conn: &mut SqliteConnection,
    stall_id: StallId,
    varieties: &[Variety],
) -> Result<UpdateId, sqlx::Error> {
    let result = sqlx::query("INSERT INTO stock_updates (stall_id, varieties) VALUES (?, ?)")
        .bind(stall_id)
        .bind(Json(varieties))
        .execute(conn)
        .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_stall(
    conn: &mut SqliteConnection,
    draft: &StallDraft,
    owner_id: Option<UserId>,
) -> Result<StallId, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO stalls (name, address, state, latitude, longitude, phone, owner_id)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&draft.name)
    .bind(&draft.address)
    .bind(draft.state.as_deref())
    .bind(draft.latitude)
    .bind(draft.longitude)
    .bind(draft.phone.as_deref())
    .bind(owner_id)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

#[async_trait]
impl MarketStore for SqliteMarketStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn ping(&self) -> MarketResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn migrate(&self) -> MarketResult<MigrationReport> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(schema::SQLITE_BOOKKEEPING)
            .execute(&mut *tx)
            .await?;

        let already: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
            .fetch_all(&mut *tx)
            .await?;

        let mut applied = Vec::new();
        for migration in schema::pending(&already) {
            for statement in migration.statements(Backend::Sqlite) {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.description)
                .execute(&mut *tx)
                .await?;
            tracing::info!(
                version = migration.version,
                "applied migration: {}",
                migration.description
            );
            applied.push(AppliedMigration {
                version: migration.version,
                description: migration.description.to_string(),
            });
        }
        tx.commit().await?;

        Ok(MigrationReport {
            applied,
            current_version: schema::latest_version(),
            checked_at: Utc::now(),
        })
    }

    async fn create_stall(
        &self,
        draft: &StallDraft,
        owner_id: Option<UserId>,
        initial: Option<&[Variety]>,
    ) -> MarketResult<StallId> {
        let mut tx = self.pool.begin().await?;
        let id = insert_stall(&mut tx, draft, owner_id).await?;
        if let Some(varieties) = initial {
            insert_update(&mut tx, id, varieties).await?;
        }
        tx.commit().await?;
        Ok(id)
    }

    async fn update_stall(
        &self,
        id: StallId,
        draft: &StallDraft,
        new_update: Option<&[Variety]>,
    ) -> MarketResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE stalls
             SET name = ?, address = ?, state = ?, latitude = ?, longitude = ?, phone = ?,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?",
        )
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(draft.state.as_deref())
        .bind(draft.latitude)
        .bind(draft.longitude)
        .bind(draft.phone.as_deref())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MarketError::NotFound(format!("stall {}", id)));
        }
        if let Some(varieties) = new_update {
            insert_update(&mut tx, id, varieties).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_stall(&self, id: StallId) -> MarketResult<u64> {
        let result = sqlx::query("DELETE FROM stalls WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stall(&self, id: StallId) -> MarketResult<Option<Stall>> {
        let row: Option<StallRow> =
            sqlx::query_as(&format!("SELECT {} FROM stalls WHERE id = ?", STALL_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Stall::from))
    }

    async fn stall_by_owner(&self, owner_id: UserId) -> MarketResult<Option<Stall>> {
        let row: Option<StallRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stalls WHERE owner_id = ? ORDER BY id LIMIT 1",
            STALL_COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Stall::from))
    }

    async fn count_stalls(&self) -> MarketResult<i64> {
        Ok(sqlx::query_scalar(sql::COUNT_STALLS)
            .fetch_one(&self.pool)
            .await?)
    }

    fn stream_stalls(&self) -> BoxStream<'_, MarketResult<StallWithLatest>> {
        sqlx::query_as::<_, ListingRow>(sql::LIST_STALLS_WITH_LATEST)
            .fetch(&self.pool)
            .map(|row| row.map(ListingRow::into_parts).map_err(MarketError::from))
            .boxed()
    }

    async fn append_update(
        &self,
        stall_id: StallId,
        varieties: &[Variety],
    ) -> MarketResult<UpdateId> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM stalls WHERE id = ?")
            .bind(stall_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(MarketError::NotFound(format!("stall {}", stall_id)));
        }
        let id = insert_update(&mut tx, stall_id, varieties)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    MarketError::NotFound(format!("stall {}", stall_id))
                }
                other => MarketError::from(other),
            })?;
        tx.commit().await?;
        Ok(id)
    }

    async fn latest_update_for(&self, stall_id: StallId) -> MarketResult<Option<StockUpdate>> {
        let row: Option<UpdateRow> = sqlx::query_as(
            "SELECT id, stall_id, varieties, created_at
             FROM stock_updates
             WHERE stall_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(stall_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StockUpdate::from))
    }

    async fn latest_updates_for_all(&self) -> MarketResult<HashMap<StallId, StockUpdate>> {
        let rows: Vec<UpdateRow> = sqlx::query_as(sql::LATEST_UPDATES_FOR_ALL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.stall_id, StockUpdate::from(row)))
            .collect())
    }

    async fn register(
        &self,
        user: &NewUser,
        stall: &StallDraft,
    ) -> MarketResult<(User, StallId)> {
        let mut tx = self.pool.begin().await?;
        let user_id = sqlx::query(
            "INSERT INTO users (name, email, password_hash, phone) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.phone.as_deref())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        let row: UserRow =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let stall_id = insert_stall(&mut tx, stall, Some(user_id)).await?;
        tx.commit().await?;
        Ok((row.into_user(), stall_id))
    }

    async fn user(&self, id: UserId) -> MarketResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(UserRow::into_user))
    }

    async fn credentials_by_email(&self, email: &str) -> MarketResult<Option<Credentials>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(UserRow::into_credentials))
    }
}
