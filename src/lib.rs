pub mod app;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{MarketService, Session};
pub use error::{MarketError, MarketResult};
pub use infra::Config;
pub use storage::{MarketStore, PgMarketStore, SqliteMarketStore};
