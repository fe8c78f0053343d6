//! REST client for the public Kalshi market data endpoints.
//!
//! Covers event listing and event detail lookup. All methods are
//! rate-limited; none require authentication.

use common::{EventDetail, EventsPage, Error, KalshiEvent};
use futures::future::join_all;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::hot::select_hot_events;
use crate::rate_limit::RateLimiter;

const DEMO_BASE_URL: &str = "https://demo-api.kalshi.co";
const PROD_BASE_URL: &str = "https://api.elections.kalshi.com";
const API_PREFIX: &str = "/trade-api/v2";

/// Events whose details are fetched when ranking hot events.
const HOT_DETAIL_FANOUT: usize = 20;

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn resolve_rest_base_url(api_base: Option<&str>, use_demo: bool) -> String {
    if let Some(override_url) = api_base {
        let normalized = normalize_base_url(override_url);
        if !normalized.is_empty() {
            info!("Using Kalshi API base override: {}", normalized);
            return normalized;
        }
        warn!("Ignoring empty Kalshi API base override");
    }

    if use_demo {
        DEMO_BASE_URL.to_string()
    } else {
        PROD_BASE_URL.to_string()
    }
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so network failures (DNS/TLS/socket) are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

/// Listing filters for `GET /events`.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub limit: u32,
    pub status: String,
    pub with_nested_markets: bool,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            limit: 100,
            status: "open".into(),
            with_nested_markets: false,
        }
    }
}

/// Async REST client for the Kalshi trade API.
#[derive(Debug, Clone)]
pub struct KalshiRestClient {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl KalshiRestClient {
    /// * `api_base` overrides the demo/prod choice when non-empty.
    pub fn new(api_base: Option<&str>, use_demo: bool, reads_per_sec: u32) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;

        Ok(Self {
            client,
            base_url: resolve_rest_base_url(api_base, use_demo),
            limiter: RateLimiter::with_reads_per_sec(reads_per_sec),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        self.limiter.wait_read().await;

        let resp = req
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;

        let status_code = resp.status().as_u16();
        if status_code != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::KalshiApi {
                status: status_code,
                message: body,
            });
        }

        resp.json()
            .await
            .map_err(|e| Error::Http(format_reqwest_error(&e)))
    }

    /// Fetch one page of events. Pass the previous page's cursor to continue.
    pub async fn list_events(
        &self,
        cursor: Option<&str>,
        filter: &EventFilter,
    ) -> Result<EventsPage, Error> {
        let mut req = self
            .client
            .get(self.url("/events"))
            .query(&[("limit", filter.limit.to_string()), ("status", filter.status.clone())]);
        if let Some(c) = cursor.filter(|c| !c.is_empty()) {
            req = req.query(&[("cursor", c)]);
        }
        if filter.with_nested_markets {
            req = req.query(&[("with_nested_markets", "true")]);
        }

        let mut page: EventsPage = self.get_json(req).await?;
        if page.cursor.as_deref() == Some("") {
            page.cursor = None;
        }
        debug!(
            "Fetched {} events (more: {})",
            page.events.len(),
            page.cursor.is_some()
        );
        Ok(page)
    }

    /// Fetch a single event with its markets.
    pub async fn get_event(&self, event_ticker: &str) -> Result<EventDetail, Error> {
        let req = self.client.get(self.url(&format!("/events/{}", event_ticker)));
        match self.get_json(req).await {
            Err(Error::KalshiApi { status: 404, .. }) => {
                Err(Error::EventNotFound(event_ticker.to_string()))
            }
            other => other,
        }
    }

    /// The highest-volume open events, one per category.
    pub async fn hot_events(&self, limit: usize) -> Result<Vec<KalshiEvent>, Error> {
        let page = self.list_events(None, &EventFilter::default()).await?;

        let details = join_all(
            page.events
                .iter()
                .take(HOT_DETAIL_FANOUT)
                .map(|event| self.get_event(&event.event_ticker)),
        )
        .await;

        let fetched: Vec<EventDetail> = details
            .into_iter()
            .filter_map(|result| match result {
                Ok(detail) => Some(detail),
                Err(e) => {
                    debug!("Skipping event detail: {}", e);
                    None
                }
            })
            .collect();

        Ok(select_hot_events(fetched, limit))
    }
}
