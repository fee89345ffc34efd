pub mod market_service;

pub use market_service::{AdminCredentials, MarketService, Session};
