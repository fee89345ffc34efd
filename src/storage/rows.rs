//! Row shapes shared by both backends. `FromRow` is derived generically, so
//! the same structs decode Postgres and SQLite rows.

use crate::domain::{Credentials, Stall, StockUpdate, User, Variety};
use chrono::{DateTime, Utc};
use sqlx::types::Json;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StallRow {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub owner_id: Option<i64>,
}

impl From<StallRow> for Stall {
    fn from(row: StallRow) -> Self {
        Stall {
            id: row.id,
            name: row.name,
            address: row.address,
            state: row.state,
            latitude: row.latitude,
            longitude: row.longitude,
            phone: row.phone,
            owner_id: row.owner_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UpdateRow {
    pub id: i64,
    pub stall_id: i64,
    pub varieties: Json<Vec<Variety>>,
    pub created_at: DateTime<Utc>,
}

impl From<UpdateRow> for StockUpdate {
    fn from(row: UpdateRow) -> Self {
        StockUpdate {
            id: row.id,
            stall_id: row.stall_id,
            varieties: row.varieties.0,
            last_updated: row.created_at,
        }
    }
}

/// A stall left-joined with its top-ranked stock update.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ListingRow {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub owner_id: Option<i64>,
    pub update_id: Option<i64>,
    pub varieties: Option<Json<Vec<Variety>>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ListingRow {
    pub fn into_parts(self) -> (Stall, Option<StockUpdate>) {
        let latest = match (self.update_id, self.varieties, self.last_updated) {
            (Some(id), Some(varieties), Some(last_updated)) => Some(StockUpdate {
                id,
                stall_id: self.id,
                varieties: varieties.0,
                last_updated,
            }),
            _ => None,
        };
        let stall = Stall {
            id: self.id,
            name: self.name,
            address: self.address,
            state: self.state,
            latitude: self.latitude,
            longitude: self.longitude,
            phone: self.phone,
            owner_id: self.owner_id,
        };
        (stall, latest)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_user(self) -> User {
        self.into_credentials().user
    }

    pub fn into_credentials(self) -> Credentials {
        Credentials {
            user: User {
                id: self.id,
                name: self.name,
                email: self.email,
                phone: self.phone,
                created_at: self.created_at,
            },
            password_hash: self.password_hash,
        }
    }
}
