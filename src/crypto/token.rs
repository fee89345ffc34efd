// Signed bearer tokens (HS256 JWT) carrying a role, a subject and an expiry.

use crate::domain::user::UserId;
use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// JWT claims. `sub` is the user id for `user` tokens and the admin
/// username for `admin` tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    admin_ttl: Duration,
    user_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("admin_ttl", &self.admin_ttl)
            .field("user_ttl", &self.user_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str, admin_ttl: Duration, user_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            admin_ttl,
            user_ttl,
        }
    }

    pub fn admin_ttl(&self) -> Duration {
        self.admin_ttl
    }

    pub fn user_ttl(&self) -> Duration {
        self.user_ttl
    }

    pub fn issue_admin(&self, username: &str) -> MarketResult<String> {
        self.issue_admin_at(username, Utc::now())
    }

    pub fn issue_admin_at(&self, username: &str, now: DateTime<Utc>) -> MarketResult<String> {
        self.sign(&Claims {
            sub: username.to_string(),
            role: Role::Admin,
            email: None,
            iat: now.timestamp(),
            exp: (now + self.admin_ttl).timestamp(),
        })
    }

    pub fn issue_user(&self, user_id: UserId, email: &str) -> MarketResult<String> {
        self.issue_user_at(user_id, email, Utc::now())
    }

    pub fn issue_user_at(
        &self,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> MarketResult<String> {
        self.sign(&Claims {
            sub: user_id.to_string(),
            role: Role::User,
            email: Some(email.to_string()),
            iat: now.timestamp(),
            exp: (now + self.user_ttl).timestamp(),
        })
    }

    pub fn sign(&self, claims: &Claims) -> MarketResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| MarketError::Internal(format!("token signing failed: {}", e)))
    }

    /// Verifies signature and expiry (no leeway) and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}
