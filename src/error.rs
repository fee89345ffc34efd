//! Error taxonomy shared by the store, the authorization gate and the service.
//!
//! Everything except `Store` and `Internal` is an expected, user-facing
//! outcome. Those two are logged with full detail by the transport layer and
//! reported to callers as an opaque failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    /// Malformed or missing input; the message says what to fix.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No credential was supplied, or the credentials did not match.
    #[error("authentication required")]
    Unauthenticated,

    /// The bearer token failed signature, format or expiry checks.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Valid credential without the required role or ownership.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation (duplicate email, second stall for one owner).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[source] sqlx::Error),

    /// Password hashing or token signing failed.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type MarketResult<T> = Result<T, MarketError>;

impl From<sqlx::Error> for MarketError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return MarketError::Conflict(unique_violation_message(db_err.message()));
            }
        }
        MarketError::Store(e)
    }
}

impl MarketError {
    /// True for failures that are not the caller's fault.
    pub fn is_internal(&self) -> bool {
        matches!(self, MarketError::Store(_) | MarketError::Internal(_))
    }
}

fn unique_violation_message(raw: &str) -> String {
    let raw = raw.to_lowercase();
    if raw.contains("email") {
        "a user with this email already exists".to_string()
    } else if raw.contains("owner") {
        "this owner already has a stall".to_string()
    } else {
        "record already exists".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_messages_name_the_column() {
        assert!(unique_violation_message("UNIQUE constraint failed: users.email").contains("email"));
        assert!(unique_violation_message(
            "duplicate key value violates unique constraint \"idx_stalls_owner_unique\""
        )
        .contains("owner"));
        assert_eq!(unique_violation_message("something else"), "record already exists");
    }

    #[test]
    fn only_store_and_internal_are_internal() {
        assert!(MarketError::Internal("x".into()).is_internal());
        assert!(MarketError::Store(sqlx::Error::RowNotFound).is_internal());
        assert!(!MarketError::Unauthenticated.is_internal());
        assert!(!MarketError::Validation("name".into()).is_internal());
    }
}
