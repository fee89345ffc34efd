pub mod router;
pub mod types;
pub mod handlers {
    pub mod admin;
    pub mod auth;
    pub mod common;
    pub mod health;
    pub mod owner;
    pub mod stalls;
}

pub use router::{create_router, ApiDoc};
pub use types::AppState;
