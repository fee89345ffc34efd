//! Domain types for the stall directory, the stock update log and the
//! authorization gate.

pub mod auth;
pub mod stall;
pub mod stock;
pub mod user;

pub use auth::{AuthGate, Identity, Requirement};
pub use stall::{
    Position, Stall, StallDraft, StallFilter, StallId, StallListing, StallRecord,
    FALLBACK_POSITION,
};
pub use stock::{validate_varieties, StockLevel, StockUpdate, UpdateId, Variety, VarietyDraft};
pub use user::{Credentials, NewUser, Registration, User, UserId};
