//! Incremental crawl walker.
//!
//! The feed is addressed by a backward-moving millisecond cursor and never
//! confirms its own end: empty pages show up in the middle of real catalogs,
//! and the last page looks like any other. The walker infers termination
//! heuristically: a stall counter over pages that yield nothing new, a fixed
//! backward window to probe past gaps, a historical floor, and an absolute
//! page ceiling. Every stop path is bounded.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use feed_client::{FeedClient, FeedItem};

/// Tuning knobs for the walk. Defaults match the observed posting cadence of
/// typical creator accounts; sparse accounts may want a larger backoff window
/// or stall threshold.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Items requested per page.
    pub page_size: u32,
    /// Consecutive no-new-item pages tolerated before stopping.
    pub stall_threshold: u32,
    /// Backward cursor shift when a page is empty or the feed stops making
    /// progress (milliseconds).
    pub backoff_window_ms: i64,
    /// Hard historical floor (milliseconds since epoch). The walk never
    /// continues past it.
    pub floor_ms: i64,
    /// Absolute page-fetch ceiling. Guards against pathological feeds.
    pub max_pages: u32,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            page_size: 15,
            stall_threshold: 3,
            backoff_window_ms: 7 * 86_400_000,
            floor_ms: 1_472_706_000_000,
            max_pages: 200,
        }
    }
}

/// One page of the feed at a cursor position. Implemented by the live client
/// and by scripted sources in tests.
#[async_trait]
pub trait FeedPageSource: Send + Sync {
    async fn fetch_page(&self, cursor_ms: i64, count: u32) -> Result<Vec<FeedItem>>;
}

/// Live page source bound to one creator's resolved account id.
pub struct CreatorFeed<'a> {
    client: &'a FeedClient,
    sec_uid: String,
}

impl<'a> CreatorFeed<'a> {
    pub fn new(client: &'a FeedClient, sec_uid: impl Into<String>) -> Self {
        Self {
            client,
            sec_uid: sec_uid.into(),
        }
    }
}

#[async_trait]
impl FeedPageSource for CreatorFeed<'_> {
    async fn fetch_page(&self, cursor_ms: i64, count: u32) -> Result<Vec<FeedItem>> {
        Ok(self
            .client
            .fetch_item_page(&self.sec_uid, cursor_ms, count)
            .await?)
    }
}

/// Why the walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stall threshold of consecutive no-new-item pages was hit.
    Stalled,
    /// The cursor crossed the historical floor.
    FloorReached,
    /// The absolute page ceiling was hit.
    PageCeiling,
    /// The caller's item cap was reached (possibly mid-page).
    CapReached,
}

#[derive(Debug)]
pub struct WalkOutcome {
    /// Deduplicated items in first-sighting order.
    pub items: Vec<FeedItem>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

/// Walk state threaded through the loop. Explicit so the walker stays
/// independently testable with injected page sources.
struct WalkState {
    seen: HashSet<String>,
    items: Vec<FeedItem>,
    no_new_pages: u32,
    cursor_ms: i64,
}

/// Walk the feed backward from `start_cursor_ms`, accumulating the largest
/// deduplicated item set reachable. `max_items == 0` means unbounded.
///
/// A page-fetch error propagates immediately; the windowing backoff only
/// handles empty pages, it is not an error-recovery mechanism.
pub async fn walk(
    source: &dyn FeedPageSource,
    config: &WalkerConfig,
    max_items: usize,
    start_cursor_ms: i64,
) -> Result<WalkOutcome> {
    let mut state = WalkState {
        seen: HashSet::new(),
        items: Vec::new(),
        no_new_pages: 0,
        cursor_ms: start_cursor_ms,
    };
    let mut pages_fetched = 0u32;

    while pages_fetched < config.max_pages {
        let page = source.fetch_page(state.cursor_ms, config.page_size).await?;
        pages_fetched += 1;

        if page.is_empty() {
            state.no_new_pages += 1;
            if state.no_new_pages >= config.stall_threshold {
                return Ok(outcome(state, pages_fetched, StopReason::Stalled));
            }
            // Probe past a gap in the feed rather than assuming end-of-data.
            state.cursor_ms = state.cursor_ms.saturating_sub(config.backoff_window_ms);
            if state.cursor_ms < config.floor_ms {
                return Ok(outcome(state, pages_fetched, StopReason::FloorReached));
            }
            continue;
        }

        // The last item's creation time drives the next cursor; capture it
        // before the page is consumed.
        let last_time_ms = page.last().and_then(|item| item.create_time_ms());

        let mut added = 0u32;
        for item in page {
            let Some(id) = item.id.clone() else {
                continue;
            };
            if !state.seen.insert(id) {
                continue;
            }
            state.items.push(item);
            added += 1;
            if max_items > 0 && state.items.len() >= max_items {
                return Ok(outcome(state, pages_fetched, StopReason::CapReached));
            }
        }

        // Advance only when the feed actually moved backward; a repeated or
        // missing time gets the fixed shift so progress is guaranteed.
        match last_time_ms {
            Some(next) if next < state.cursor_ms => state.cursor_ms = next,
            _ => {
                state.cursor_ms = state.cursor_ms.saturating_sub(config.backoff_window_ms);
            }
        }

        if added == 0 {
            state.no_new_pages += 1;
        } else {
            state.no_new_pages = 0;
        }
        if state.no_new_pages >= config.stall_threshold {
            return Ok(outcome(state, pages_fetched, StopReason::Stalled));
        }
        if state.cursor_ms < config.floor_ms {
            return Ok(outcome(state, pages_fetched, StopReason::FloorReached));
        }

        debug!(
            page = pages_fetched,
            total = state.items.len(),
            cursor_ms = state.cursor_ms,
            "Fetched feed page"
        );
    }

    Ok(outcome(state, pages_fetched, StopReason::PageCeiling))
}

fn outcome(state: WalkState, pages_fetched: u32, stop: StopReason) -> WalkOutcome {
    info!(
        items = state.items.len(),
        pages_fetched,
        stop = ?stop,
        "Feed walk finished"
    );
    WalkOutcome {
        items: state.items,
        pages_fetched,
        stop,
    }
}
