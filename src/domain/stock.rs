//! Stock Update Log types and variety validation.

use crate::domain::stall::StallId;
use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub type UpdateId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StockLevel {
    #[default]
    High,
    Medium,
    Low,
    SoldOut,
}

impl StockLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockLevel::High => "high",
            StockLevel::Medium => "medium",
            StockLevel::Low => "low",
            StockLevel::SoldOut => "sold-out",
        }
    }
}

impl fmt::Display for StockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(StockLevel::High),
            "medium" => Ok(StockLevel::Medium),
            "low" => Ok(StockLevel::Low),
            "sold-out" => Ok(StockLevel::SoldOut),
            other => Err(format!(
                "unknown stock level '{}' (expected high, medium, low or sold-out)",
                other
            )),
        }
    }
}

/// One durian cultivar inside a stock update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Variety {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub stock: StockLevel,
}

/// Variety as submitted by a client, before validation.
///
/// Forms post prices as numbers, numeric strings or `""`, and older callers
/// omit the stock level entirely.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct VarietyDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub price: Option<JsonValue>,
    #[serde(default)]
    pub stock: Option<String>,
}

impl VarietyDraft {
    pub fn new(name: &str, price: Option<f64>, stock: &str) -> Self {
        Self {
            name: name.to_string(),
            price: price.map(JsonValue::from),
            stock: Some(stock.to_string()),
        }
    }
}

impl From<Variety> for VarietyDraft {
    fn from(v: Variety) -> Self {
        Self {
            name: v.name,
            price: v.price.map(JsonValue::from),
            stock: Some(v.stock.as_str().to_string()),
        }
    }
}

/// Validates and normalizes a submitted variety list. Errors name the index
/// of the first offending entry.
pub fn validate_varieties(drafts: Vec<VarietyDraft>) -> MarketResult<Vec<Variety>> {
    drafts
        .into_iter()
        .enumerate()
        .map(|(idx, draft)| {
            validate_variety(draft)
                .map_err(|msg| MarketError::Validation(format!("varieties[{}]: {}", idx, msg)))
        })
        .collect()
}

fn validate_variety(draft: VarietyDraft) -> Result<Variety, String> {
    let name = draft.name.trim().to_string();
    if name.is_empty() {
        return Err("name is required".to_string());
    }
    let price = match draft.price {
        None | Some(JsonValue::Null) => None,
        Some(v) => coerce_price(&v)?,
    };
    let stock = match draft.stock.as_deref().map(str::trim) {
        None | Some("") => StockLevel::default(),
        Some(s) => s.parse()?,
    };
    Ok(Variety { name, price, stock })
}

fn coerce_price(v: &JsonValue) -> Result<Option<f64>, String> {
    let n = match v {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| "price is not a number".to_string())?,
        JsonValue::String(s) if s.trim().is_empty() => return Ok(None),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("price '{}' is not a number", s))?,
        other => return Err(format!("price must be a number, got {}", other)),
    };
    if !n.is_finite() || n < 0.0 {
        return Err(format!("price {} must be a non-negative number", n));
    }
    Ok(Some(n))
}

/// One immutable entry of the Stock Update Log.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StockUpdate {
    pub id: UpdateId,
    #[serde(rename = "stallId")]
    pub stall_id: StallId,
    pub varieties: Vec<Variety>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl StockUpdate {
    /// True when the entry lists `variety` (case-insensitive) as not sold out.
    pub fn has_in_stock(&self, variety: &str) -> bool {
        self.varieties
            .iter()
            .any(|v| v.name.eq_ignore_ascii_case(variety) && v.stock != StockLevel::SoldOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stock_level_round_trips_through_its_wire_name() {
        for level in [
            StockLevel::High,
            StockLevel::Medium,
            StockLevel::Low,
            StockLevel::SoldOut,
        ] {
            assert_eq!(level.as_str().parse::<StockLevel>(), Ok(level));
            assert_eq!(serde_json::to_value(level).unwrap(), json!(level.as_str()));
        }
        assert_eq!(" Sold-Out ".parse::<StockLevel>(), Ok(StockLevel::SoldOut));
        assert!("plenty".parse::<StockLevel>().is_err());
    }

    #[test]
    fn missing_stock_defaults_to_high_and_blank_price_is_absent() {
        let drafts: Vec<VarietyDraft> = serde_json::from_value(json!([
            { "name": "Musang King", "price": "" },
            { "name": "Black Thorn", "price": "35.5", "stock": "medium" },
            { "name": "D24 Sultan", "price": 25, "stock": "" }
        ]))
        .unwrap();
        let varieties = validate_varieties(drafts).unwrap();
        assert_eq!(varieties[0].stock, StockLevel::High);
        assert_eq!(varieties[0].price, None);
        assert_eq!(varieties[1].price, Some(35.5));
        assert_eq!(varieties[1].stock, StockLevel::Medium);
        assert_eq!(varieties[2].price, Some(25.0));
        assert_eq!(varieties[2].stock, StockLevel::High);
    }

    #[test]
    fn invalid_varieties_name_the_index() {
        let err = validate_varieties(vec![
            VarietyDraft::new("Musang King", Some(40.0), "low"),
            VarietyDraft::new("XO", None, "plenty"),
        ])
        .unwrap_err();
        match err {
            MarketError::Validation(msg) => assert!(msg.starts_with("varieties[1]"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }

        assert!(validate_varieties(vec![VarietyDraft::new(" ", None, "high")]).is_err());
        assert!(validate_varieties(vec![VarietyDraft::new("XO", Some(-1.0), "high")]).is_err());

        let bad_price = VarietyDraft {
            name: "XO".into(),
            price: Some(json!(true)),
            stock: None,
        };
        assert!(validate_varieties(vec![bad_price]).is_err());
    }

    #[test]
    fn empty_list_is_storable() {
        assert_eq!(validate_varieties(Vec::new()).unwrap(), Vec::new());
    }
}
