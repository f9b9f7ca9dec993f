//! The generic paginated walk.
//!
//! All traversals in bramble are this one loop: build a page URL from the
//! cursor, fetch it through the session, extract records, stop on any
//! terminating condition, otherwise tag the records with parent context,
//! route them to storage, advance and yield for the inter-request delay.

use crate::cursor::{CrawlCursor, PageSignature};
use async_trait::async_trait;
use bramble_core::types::merge_context;
use bramble_core::{FetchResult, Record};
use bramble_session::SessionManager;
use bramble_store::StorageRouter;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Anything that can fetch a page for the engine. In production this is
/// the session manager; tests script it.
#[async_trait]
pub trait PageFetcher: Send {
    async fn fetch_page(&mut self, url: &str) -> Option<FetchResult>;
}

#[async_trait]
impl PageFetcher for SessionManager {
    async fn fetch_page(&mut self, url: &str) -> Option<FetchResult> {
        self.fetch(url).await
    }
}

/// What an extractor got out of one page.
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    /// Records in page order
    pub records: Vec<Record>,
    /// Site-reported end of data (empty-state or error-message block);
    /// terminates the walk without a retry
    pub end_marker: Option<String>,
}

/// Turns page content into records. Pure with respect to the page: all
/// walk state lives in the engine.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, content: &str, cursor: &CrawlCursor) -> ExtractOutcome;
}

/// Walk policy: where to start, how far to go, how fast.
#[derive(Debug, Clone, Copy)]
pub struct CrawlPolicy {
    pub start: u64,
    pub step: u64,
    pub stop: Option<u64>,
    pub delay: Duration,
    /// Tag each stored record with `page_offset` and a stable `post_no`
    /// (offset + position in page). Tagging happens after the duplicate
    /// check — a clamped offset re-serving the last page must still
    /// compare equal.
    pub tag_offsets: bool,
}

/// Why a walk ended. Every walk ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEnd {
    /// The fetch failed; partial results are final (retry lives in the
    /// transport, not here)
    TransportFailure,
    /// A page yielded zero records
    EmptyPage,
    /// The site reported an explicit end of data
    EndMarker(String),
    /// Two consecutive pages carried identical record tuples
    DuplicatePage,
    /// The configured hard stop offset was passed
    HardStop,
    /// Cooperative cancellation was observed
    Cancelled,
}

/// Summary of one walk.
#[derive(Debug)]
pub struct WalkReport {
    /// Pages that yielded stored records
    pub pages: u64,
    /// Total records stored
    pub records_stored: u64,
    /// Terminating condition
    pub end: WalkEnd,
    /// The stored records, context included, for nested traversals
    pub records: Vec<Record>,
}

/// The paginated walk over one session and one storage router.
///
/// Nested walks construct their own engine instances over the same
/// session and router; cursors and signatures are per-walk state.
pub struct CrawlEngine<'a> {
    fetcher: &'a mut dyn PageFetcher,
    router: &'a StorageRouter,
    cancel: CancellationToken,
}

impl<'a> CrawlEngine<'a> {
    pub fn new(fetcher: &'a mut dyn PageFetcher, router: &'a StorageRouter) -> Self {
        Self {
            fetcher,
            router,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an externally-owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk pages until a terminating condition fires.
    ///
    /// `page_url` builds each page's URL from the cursor; `extractor`
    /// produces the records; `context` is merged into every record before
    /// storage under `collection`.
    pub async fn walk(
        &mut self,
        collection: &str,
        context: &Record,
        policy: CrawlPolicy,
        page_url: &(dyn Fn(&CrawlCursor) -> String + Send + Sync),
        extractor: &dyn PageExtractor,
    ) -> WalkReport {
        let mut cursor = CrawlCursor::new(policy.start, policy.step, policy.stop);
        let mut previous_signature: Option<PageSignature> = None;
        let mut report = WalkReport {
            pages: 0,
            records_stored: 0,
            end: WalkEnd::HardStop,
            records: Vec::new(),
        };

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Walk cancelled before offset {}", cursor.offset);
                report.end = WalkEnd::Cancelled;
                break;
            }

            if cursor.past_stop() {
                report.end = WalkEnd::HardStop;
                break;
            }

            let url = page_url(&cursor);
            tracing::debug!("Fetching page offset={}: {}", cursor.offset, url);

            let Some(result) = self.fetcher.fetch_page(&url).await else {
                tracing::warn!("Fetch failed at offset {}, ending walk", cursor.offset);
                report.end = WalkEnd::TransportFailure;
                break;
            };

            let outcome = extractor.extract(&result.content, &cursor);

            if let Some(marker) = outcome.end_marker {
                tracing::info!("Site reported end of data at offset {}: {}", cursor.offset, marker);
                report.end = WalkEnd::EndMarker(marker);
                break;
            }

            if outcome.records.is_empty() {
                tracing::info!("No records at offset {}, ending walk", cursor.offset);
                report.end = WalkEnd::EmptyPage;
                break;
            }

            let signature = PageSignature::of(&outcome.records);
            if previous_signature.as_ref() == Some(&signature) {
                tracing::info!("Duplicate page detected at offset {}, ending walk", cursor.offset);
                report.end = WalkEnd::DuplicatePage;
                break;
            }
            previous_signature = Some(signature);

            let mut records = outcome.records;
            for (index, record) in records.iter_mut().enumerate() {
                if policy.tag_offsets {
                    record.insert("page_offset".to_string(), serde_json::json!(cursor.offset));
                    record.insert(
                        "post_no".to_string(),
                        serde_json::json!(cursor.offset + index as u64),
                    );
                }
                merge_context(record, context);
            }

            self.router.store(collection, &records).await;
            report.pages += 1;
            report.records_stored += records.len() as u64;
            report.records.extend(records);

            if cursor.step == 0 {
                // A zero step walks a single page
                report.end = WalkEnd::HardStop;
                break;
            }
            cursor.advance();

            // Cooperative yield point: the inter-request delay is also
            // where cancellation lands
            tokio::select! {
                () = self.cancel.cancelled() => {
                    report.end = WalkEnd::Cancelled;
                    break;
                }
                () = tokio::time::sleep(policy.delay) => {}
            }
        }

        tracing::info!(
            "Walk over '{}' ended ({:?}): {} records from {} pages",
            collection,
            report.end,
            report.records_stored,
            report.pages
        );
        report
    }
}
