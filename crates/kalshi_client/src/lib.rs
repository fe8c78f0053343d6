//! Read-only Kalshi market data client.
//!
//! Lists open events, fetches event details and ranks the hottest events.

pub mod hot;
pub mod rate_limit;
pub mod rest;

pub use hot::select_hot_events;
pub use rate_limit::RateLimiter;
pub use rest::{EventFilter, KalshiRestClient};
