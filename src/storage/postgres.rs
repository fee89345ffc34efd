//! PostgreSQL store.

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
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;

/// Serializes concurrent migration runs (stable across instances).
const MIGRATION_LOCK_ID: i64 = 4_240_001;

const STALL_COLUMNS: &str = "id, name, address, state, latitude, longitude, phone, owner_id";

#[derive(Clone)]
pub struct PgMarketStore {
    pool: PgPool,
}

impl PgMarketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn insert_update(
    conn: &mut PgConnection,
    stall_id: StallId,
    varieties: &[Variety],
) -> Result<UpdateId, sqlx::Error> {
    sqlx::query_scalar("INSERT INTO stock_updates (stall_id, varieties) VALUES ($1, $2) RETURNING id")
        .bind(stall_id)
        .bind(Json(varieties))
        .fetch_one(conn)
        .await
}

async fn insert_stall(
    conn: &mut PgConnection,
    draft: &StallDraft,
    owner_id: Option<UserId>,
) -> Result<StallId, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO stalls (name, address, state, latitude, longitude, phone, owner_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id",
    )
    .bind(&draft.name)
    .bind(&draft.address)
    .bind(draft.state.as_deref())
    .bind(draft.latitude)
    .bind(draft.longitude)
    .bind(draft.phone.as_deref())
    .bind(owner_id)
    .fetch_one(conn)
    .await
}

#[async_trait]
impl MarketStore for PgMarketStore {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn ping(&self) -> MarketResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn migrate(&self) -> MarketResult<MigrationReport> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query(schema::POSTGRES_BOOKKEEPING)
            .execute(&mut *tx)
            .await?;

        let already: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
            .fetch_all(&mut *tx)
            .await?;

        let mut applied = Vec::new();
        for migration in schema::pending(&already) {
            for statement in migration.statements(Backend::Postgres) {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, description) VALUES ($1, $2)")
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
             SET name = $1, address = $2, state = $3, latitude = $4, longitude = $5, phone = $6,
                 updated_at = now()
             WHERE id = $7",
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
        let result = sqlx::query("DELETE FROM stalls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stall(&self, id: StallId) -> MarketResult<Option<Stall>> {
        let row: Option<StallRow> =
            sqlx::query_as(&format!("SELECT {} FROM stalls WHERE id = $1", STALL_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Stall::from))
    }

    async fn stall_by_owner(&self, owner_id: UserId) -> MarketResult<Option<Stall>> {
        let row: Option<StallRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stalls WHERE owner_id = $1 ORDER BY id LIMIT 1",
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
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM stalls WHERE id = $1")
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
             WHERE stall_id = $1
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
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (name, email, password_hash, phone)
             VALUES ($1, $2, $3, $4)
             RETURNING id, name, email, password_hash, phone, created_at",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.phone.as_deref())
        .fetch_one(&mut *tx)
        .await?;
        let created = row.into_user();
        let stall_id = insert_stall(&mut tx, stall, Some(created.id)).await?;
        tx.commit().await?;
        Ok((created, stall_id))
    }

    async fn user(&self, id: UserId) -> MarketResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, phone, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_user))
    }

    async fn credentials_by_email(&self, email: &str) -> MarketResult<Option<Credentials>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, phone, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_credentials))
    }
}
