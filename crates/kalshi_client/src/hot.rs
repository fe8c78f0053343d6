//! Hot-event ranking: highest total volume, one event per category.

use common::{EventDetail, KalshiEvent};
use std::collections::HashSet;

/// Ranks events by summed market volume and keeps the first event seen for
/// each case-insensitive category, up to `limit`.
///
/// Returned events carry `total_volume` and only their first market.
pub fn select_hot_events(details: Vec<EventDetail>, limit: usize) -> Vec<KalshiEvent> {
    let mut enriched: Vec<KalshiEvent> = details
        .into_iter()
        .map(|detail| {
            let total_volume = detail.total_volume();
            let mut event = detail.event;
            event.total_volume = Some(total_volume);
            event.markets = detail.markets.into_iter().take(1).collect();
            event
        })
        .collect();

    // Stable sort keeps listing order among equal volumes.
    enriched.sort_by(|a, b| b.total_volume.cmp(&a.total_volume));

    let mut used_categories = HashSet::new();
    enriched
        .into_iter()
        .filter(|event| used_categories.insert(event.category.to_lowercase()))
        .take(limit)
        .collect()
}
