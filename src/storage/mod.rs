//! Relational store behind the stall directory and the stock update log.
//!
//! One logical schema, two backends: PostgreSQL for deployments and SQLite
//! for local runs and tests. The backend is picked from the `DATABASE_URL`
//! scheme. Multi-statement writes run in a single transaction and roll back
//! on any error.

pub mod postgres;
pub mod rows;
pub mod schema;
pub mod sqlite;

pub use postgres::PgMarketStore;
pub use schema::{Backend, MigrationReport};
pub use sqlite::SqliteMarketStore;

use crate::domain::{
    Credentials, NewUser, Stall, StallDraft, StallId, StockUpdate, UpdateId, User, UserId,
    Variety,
};
use crate::error::MarketResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Arc;

/// A stall joined with its Latest-Stock Projection.
pub type StallWithLatest = (Stall, Option<StockUpdate>);

/// Data-access contract used by the market service.
///
/// Inputs are expected to be validated already; the store enforces only
/// referential integrity and uniqueness.
#[async_trait]
pub trait MarketStore: Send + Sync {
    fn backend(&self) -> Backend;

    async fn ping(&self) -> MarketResult<()>;

    /// Applies pending schema migrations.
    async fn migrate(&self) -> MarketResult<MigrationReport>;

    // --- Stall Directory ---

    /// Inserts a stall, plus its first stock update when `initial` is given,
    /// in one transaction.
    async fn create_stall(
        &self,
        draft: &StallDraft,
        owner_id: Option<UserId>,
        initial: Option<&[Variety]>,
    ) -> MarketResult<StallId>;

    /// Full replace of the stall attributes, plus an optional new stock
    /// update, in one transaction. `NotFound` if the stall does not exist.
    async fn update_stall(
        &self,
        id: StallId,
        draft: &StallDraft,
        new_update: Option<&[Variety]>,
    ) -> MarketResult<()>;

    /// Deletes a stall and (by cascade) its stock updates. Returns the number
    /// of stalls removed; a missing id is not an error.
    async fn delete_stall(&self, id: StallId) -> MarketResult<u64>;

    async fn stall(&self, id: StallId) -> MarketResult<Option<Stall>>;

    async fn stall_by_owner(&self, owner_id: UserId) -> MarketResult<Option<Stall>>;

    async fn count_stalls(&self) -> MarketResult<i64>;

    /// Every stall with its latest update, from one windowed query, ordered
    /// by name then id. Each call starts a fresh pass.
    fn stream_stalls(&self) -> BoxStream<'_, MarketResult<StallWithLatest>>;

    // --- Stock Update Log ---

    /// Appends one immutable entry. `NotFound` if the stall does not exist.
    async fn append_update(&self, stall_id: StallId, varieties: &[Variety])
        -> MarketResult<UpdateId>;

    /// Entry with the greatest timestamp for the stall; ties go to the larger
    /// id. `None` for stalls that were never updated or do not exist.
    async fn latest_update_for(&self, stall_id: StallId) -> MarketResult<Option<StockUpdate>>;

    async fn latest_updates_for_all(&self) -> MarketResult<HashMap<StallId, StockUpdate>>;

    // --- Accounts ---

    /// Inserts the user and its stall in one transaction.
    async fn register(&self, user: &NewUser, stall: &StallDraft)
        -> MarketResult<(User, StallId)>;

    async fn user(&self, id: UserId) -> MarketResult<Option<User>>;

    async fn credentials_by_email(&self, email: &str) -> MarketResult<Option<Credentials>>;
}

/// SQL shared by both backends apart from placeholder syntax.
pub(crate) mod sql {
    /// Latest-Stock Projection for every stall: top-1 per stall by
    /// `(created_at DESC, id DESC)`.
    pub const LIST_STALLS_WITH_LATEST: &str = "
        SELECT s.id, s.name, s.address, s.state, s.latitude, s.longitude, s.phone, s.owner_id,
               u.id AS update_id, u.varieties, u.created_at AS last_updated
        FROM stalls s
        LEFT JOIN (
            SELECT id, stall_id, varieties, created_at,
                   ROW_NUMBER() OVER (
                       PARTITION BY stall_id ORDER BY created_at DESC, id DESC
                   ) AS rn
            FROM stock_updates
        ) u ON u.stall_id = s.id AND u.rn = 1
        ORDER BY s.name, s.id";

    pub const LATEST_UPDATES_FOR_ALL: &str = "
        SELECT id, stall_id, varieties, created_at
        FROM (
            SELECT id, stall_id, varieties, created_at,
                   ROW_NUMBER() OVER (
                       PARTITION BY stall_id ORDER BY created_at DESC, id DESC
                   ) AS rn
            FROM stock_updates
        ) ranked
        WHERE rn = 1";

    pub const COUNT_STALLS: &str = "SELECT COUNT(*) FROM stalls";
}

/// Connects to the backend named by `database_url`.
pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Arc<dyn MarketStore>> {
    match Backend::from_url(database_url) {
        Some(Backend::Postgres) => Ok(Arc::new(
            PgMarketStore::connect(database_url, max_connections).await?,
        )),
        Some(Backend::Sqlite) => Ok(Arc::new(
            SqliteMarketStore::connect(database_url, max_connections).await?,
        )),
        None => Err(anyhow::anyhow!(
            "Unsupported DATABASE_URL scheme (expected postgres:// or sqlite:)"
        )),
    }
}
