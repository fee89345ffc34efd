//! Stall Directory types.

use crate::domain::stock::StockUpdate;
use crate::domain::user::UserId;
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type StallId = i64;

/// Display position used for stalls that were never positioned (Kuala Lumpur).
pub const FALLBACK_POSITION: Position = Position {
    latitude: 3.1390,
    longitude: 101.6869,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// A stall row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Stall {
    pub id: StallId,
    pub name: String,
    pub address: String,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    #[serde(rename = "ownerId")]
    pub owner_id: Option<UserId>,
}

impl Stall {
    pub fn position(&self) -> Option<Position> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Position { latitude, longitude }),
            _ => None,
        }
    }
}

/// Mutable stall attributes. Updates are full replaces, so every field is
/// resent even when unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct StallDraft {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl StallDraft {
    /// Trims text fields, turns blank optionals into `None` and checks the
    /// required fields and coordinate ranges.
    pub fn normalized(mut self) -> MarketResult<Self> {
        self.name = self.name.trim().to_string();
        self.address = self.address.trim().to_string();
        self.state = blank_to_none(self.state);
        self.phone = blank_to_none(self.phone);

        if self.name.is_empty() {
            return Err(MarketError::Validation("stall name is required".into()));
        }
        if self.address.is_empty() {
            return Err(MarketError::Validation("stall address is required".into()));
        }
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                    return Err(MarketError::Validation(format!(
                        "latitude {} is outside [-90, 90]",
                        lat
                    )));
                }
                if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
                    return Err(MarketError::Validation(format!(
                        "longitude {} is outside [-180, 180]",
                        lng
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(MarketError::Validation(
                    "latitude and longitude must be supplied together".into(),
                ))
            }
        }
        Ok(self)
    }
}

pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Latest-Stock Projection of a stall as seen by public readers.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StallListing {
    pub id: StallId,
    pub name: String,
    pub address: String,
    pub state: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    #[serde(rename = "latestUpdate")]
    pub latest_update: Option<StockUpdate>,
}

impl StallListing {
    /// Joins a stall with its latest entry, substituting `fallback` for a
    /// missing position so map consumers never see a null coordinate.
    pub fn project(stall: Stall, latest_update: Option<StockUpdate>, fallback: Position) -> Self {
        let position = stall.position().unwrap_or(fallback);
        Self {
            id: stall.id,
            name: stall.name,
            address: stall.address,
            state: stall.state,
            latitude: position.latitude,
            longitude: position.longitude,
            phone: stall.phone,
            latest_update,
        }
    }
}

/// Full stall row plus its latest entry, for the admin panel.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StallRecord {
    #[serde(flatten)]
    pub stall: Stall,
    #[serde(rename = "latestUpdate")]
    pub latest_update: Option<StockUpdate>,
}

/// Optional public listing filters, applied while streaming the directory.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StallFilter {
    /// Case-insensitive match on the stall's state.
    pub state: Option<String>,
    /// Only stalls whose latest update has this variety in stock.
    pub variety: Option<String>,
}

impl StallFilter {
    pub fn matches(&self, listing: &StallListing) -> bool {
        if let Some(state) = self.state.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let same_state = listing
                .state
                .as_deref()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(state));
            if !same_state {
                return false;
            }
        }
        if let Some(variety) = self.variety.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return listing
                .latest_update
                .as_ref()
                .is_some_and(|update| update.has_in_stock(variety));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::{StockLevel, Variety};
    use chrono::Utc;

    fn draft() -> StallDraft {
        StallDraft {
            name: "  Durian King Stall ".into(),
            address: "Jalan Sultan, Kuala Lumpur".into(),
            state: Some("   ".into()),
            latitude: None,
            longitude: None,
            phone: Some("+60 12-345 6789".into()),
        }
    }

    #[test]
    fn normalized_trims_and_drops_blank_optionals() {
        let d = draft().normalized().unwrap();
        assert_eq!(d.name, "Durian King Stall");
        assert_eq!(d.state, None);
        assert_eq!(d.phone.as_deref(), Some("+60 12-345 6789"));
    }

    #[test]
    fn empty_name_or_address_is_rejected() {
        let mut d = draft();
        d.name = " ".into();
        assert!(matches!(d.normalized(), Err(MarketError::Validation(_))));

        let mut d = draft();
        d.address = String::new();
        assert!(matches!(d.normalized(), Err(MarketError::Validation(_))));
    }

    #[test]
    fn coordinates_must_be_paired_and_in_range() {
        let mut d = draft();
        d.latitude = Some(3.0);
        assert!(matches!(d.clone().normalized(), Err(MarketError::Validation(_))));
        d.longitude = Some(181.0);
        assert!(matches!(d.clone().normalized(), Err(MarketError::Validation(_))));
        d.longitude = Some(101.0);
        assert!(d.normalized().is_ok());
    }

    #[test]
    fn unpositioned_stall_gets_fallback() {
        let stall = Stall {
            id: 1,
            name: "A".into(),
            address: "B".into(),
            state: None,
            latitude: Some(4.0),
            longitude: None,
            phone: None,
            owner_id: None,
        };
        let listing = StallListing::project(stall, None, FALLBACK_POSITION);
        assert_eq!(listing.latitude, FALLBACK_POSITION.latitude);
        assert_eq!(listing.longitude, FALLBACK_POSITION.longitude);
    }

    #[test]
    fn filter_by_state_and_variety() {
        let listing = StallListing {
            id: 1,
            name: "A".into(),
            address: "B".into(),
            state: Some("Selangor".into()),
            latitude: 0.0,
            longitude: 0.0,
            phone: None,
            latest_update: Some(StockUpdate {
                id: 1,
                stall_id: 1,
                varieties: vec![
                    Variety {
                        name: "Musang King".into(),
                        price: Some(45.0),
                        stock: StockLevel::High,
                    },
                    Variety {
                        name: "D24 Sultan".into(),
                        price: None,
                        stock: StockLevel::SoldOut,
                    },
                ],
                last_updated: Utc::now(),
            }),
        };

        let by_state = StallFilter {
            state: Some("selangor".into()),
            variety: None,
        };
        assert!(by_state.matches(&listing));

        let other_state = StallFilter {
            state: Some("Penang".into()),
            variety: None,
        };
        assert!(!other_state.matches(&listing));

        let in_stock = StallFilter {
            state: None,
            variety: Some("musang king".into()),
        };
        assert!(in_stock.matches(&listing));

        let sold_out = StallFilter {
            state: None,
            variety: Some("D24 Sultan".into()),
        };
        assert!(!sold_out.matches(&listing));
        assert!(StallFilter::default().matches(&listing));
    }
}
