//! Paginated retrieval from the remote object catalog.

pub mod classification;
pub mod client;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::FetchOptions;
use crate::error::TransportError;
use crate::normalization::RawRecord;

pub use classification::{Classification, KNOWN_CLASSIFICATIONS};
pub use client::HttpCatalogClient;

/// One page of catalog results.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub records: Vec<RawRecord>,
    pub has_more: bool,
}

/// Anything that can serve catalog pages. Pages are 1-based.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_page(
        &self,
        classification: &str,
        page: u32,
        page_size: u32,
    ) -> Result<CatalogPage, TransportError>;
}

/// Progress notification emitted after each successful page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub fetched: usize,
    pub target: usize,
    pub page: u32,
}

impl FetchProgress {
    pub fn ratio(&self) -> f64 {
        if self.target == 0 {
            1.0
        } else {
            (self.fetched as f64 / self.target as f64).min(1.0)
        }
    }
}

/// Per-page callback. The lifetime lets callers pass closures that borrow
/// local state.
pub type ProgressFn<'a> = dyn Fn(FetchProgress) + Send + Sync + 'a;

/// Cooperative cancellation, checked before every page request.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a paginated fetch produced. Never an error: a transport failure ends
/// the loop and is carried here next to whatever was already collected.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub pages_requested: u32,
    pub error: Option<TransportError>,
    pub cancelled: bool,
}

/// Fetch pages until `target` records are collected or the catalog runs dry.
///
/// Stops on an empty page, a short page (`has_more == false` or fewer rows than
/// requested), a transport error, or cancellation. Sleeps `page_delay` between
/// consecutive requests. The result is capped at `target`.
pub async fn fetch_up_to<S>(
    source: &S,
    classification: &str,
    target: usize,
    options: &FetchOptions,
    progress: Option<&ProgressFn<'_>>,
    cancel: &CancelFlag,
) -> FetchOutcome
where
    S: CatalogSource + ?Sized,
{
    let mut outcome = FetchOutcome::default();
    if target == 0 {
        return outcome;
    }
    let page_size = options.page_size();
    let mut page: u32 = 1;

    loop {
        if outcome.pages_requested > 0 && !options.page_delay().is_zero() {
            tokio::time::sleep(options.page_delay()).await;
        }
        if cancel.is_cancelled() {
            info!(classification, page, fetched = outcome.records.len(), "fetch cancelled");
            outcome.cancelled = true;
            break;
        }

        outcome.pages_requested += 1;
        let result = source.fetch_page(classification, page, page_size).await;
        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                warn!(
                    classification,
                    page,
                    fetched = outcome.records.len(),
                    error = %err,
                    "page fetch failed; keeping partial result"
                );
                outcome.error = Some(err);
                break;
            }
        };

        let received = batch.records.len();
        if received == 0 {
            debug!(classification, page, "empty page; end of data");
            break;
        }
        outcome.records.extend(batch.records);

        if let Some(cb) = progress {
            cb(FetchProgress {
                fetched: outcome.records.len().min(target),
                target,
                page,
            });
        }

        if outcome.records.len() >= target {
            break;
        }
        if !batch.has_more || received < page_size as usize {
            debug!(classification, page, received, "short page; end of data");
            break;
        }
        page += 1;
    }

    outcome.records.truncate(target);
    info!(
        classification,
        fetched = outcome.records.len(),
        target,
        pages = outcome.pages_requested,
        "fetch finished"
    );
    outcome
}
