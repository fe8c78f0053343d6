//! Kalshi event and market payloads as returned by the trade API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KalshiEvent {
    pub event_ticker: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sub_title: String,
    #[serde(default)]
    pub mutually_exclusive: bool,
    #[serde(default)]
    pub strike_date: Option<DateTime<Utc>>,
    /// Only populated when the listing asked for nested markets.
    #[serde(default)]
    pub markets: Vec<KalshiMarket>,
    #[serde(default)]
    pub total_volume: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KalshiMarket {
    pub ticker: String,
    #[serde(default)]
    pub event_ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub yes_bid: Option<f64>,
    #[serde(default)]
    pub yes_ask: Option<f64>,
    #[serde(default)]
    pub no_bid: Option<f64>,
    #[serde(default)]
    pub no_ask: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub volume: Option<i64>,
    #[serde(default)]
    pub open_interest: Option<i64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub yes_sub_title: String,
    #[serde(default)]
    pub no_sub_title: String,
}

impl KalshiMarket {
    /// Yes bid as a probability in [0,1]. The API reports cents; values
    /// already at or below 1 are taken as probabilities.
    pub fn yes_probability(&self) -> Option<f64> {
        self.yes_bid.map(normalize_price)
    }

    /// Display name of the outcome this market represents.
    pub fn outcome_name(&self) -> &str {
        if self.yes_sub_title.trim().is_empty() {
            &self.title
        } else {
            &self.yes_sub_title
        }
    }
}

/// Converts a cent price (e.g. 42) into a probability (0.42).
pub fn normalize_price(raw: f64) -> f64 {
    if raw > 1.0 {
        (raw / 100.0).clamp(0.0, 1.0)
    } else {
        raw.max(0.0)
    }
}

/// One page of `GET /events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub events: Vec<KalshiEvent>,
    /// Opaque continuation token; empty or absent on the last page.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// `GET /events/{ticker}` returns event and markets as sibling keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetail {
    pub event: KalshiEvent,
    #[serde(default)]
    pub markets: Vec<KalshiMarket>,
}

impl EventDetail {
    pub fn total_volume(&self) -> i64 {
        self.markets.iter().filter_map(|m| m.volume).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_price() {
        assert!((normalize_price(42.0) - 0.42).abs() < 1e-9);
        assert!((normalize_price(0.42) - 0.42).abs() < 1e-9);
        assert_eq!(normalize_price(1.0), 1.0);
        assert_eq!(normalize_price(-3.0), 0.0);
    }

    #[test]
    fn test_event_detail_parses_sparse_payload() {
        let raw = r#"{
            "event": {"event_ticker": "KXPOPE", "title": "Next pope?"},
            "markets": [
                {"ticker": "KXPOPE-A", "yes_bid": 31, "volume": 1200, "yes_sub_title": "Parolin"},
                {"ticker": "KXPOPE-B", "yes_bid": 18, "title": "Tagle"}
            ]
        }"#;
        let detail: EventDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.total_volume(), 1200);
        assert_eq!(detail.markets[0].outcome_name(), "Parolin");
        assert_eq!(detail.markets[1].outcome_name(), "Tagle");
        assert!((detail.markets[1].yes_probability().unwrap() - 0.18).abs() < 1e-9);
    }
}
