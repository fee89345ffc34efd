//! Stall owner accounts (self-service mode).

use crate::domain::stall::{blank_to_none, StallDraft};
use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type UserId = i64;

pub const MIN_PASSWORD_LEN: usize = 6;

/// A user as returned to clients. The password hash never leaves the store
/// layer except through [`Credentials`].
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Login lookup result.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

/// User row to insert; `password_hash` is already an argon2 PHC string.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
}

/// Self-service registration: one account plus its stall.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub stall: StallDraft,
}

impl Registration {
    pub fn normalized(mut self) -> MarketResult<Self> {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.phone = blank_to_none(self.phone);

        if self.name.is_empty() {
            return Err(MarketError::Validation("name is required".into()));
        }
        if !looks_like_email(&self.email) {
            return Err(MarketError::Validation(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(MarketError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let mut stall = self.stall.normalized()?;
        if stall.phone.is_none() {
            stall.phone = self.phone.clone();
        }
        self.stall = stall;
        Ok(self)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
