//! Fetch → normalize → store, with one report per run.
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::catalog::{
    classification, fetch_up_to, CancelFlag, CatalogSource, FetchOutcome, ProgressFn,
};
use crate::config::FetchOptions;
use crate::model::RecordFailure;
use crate::normalization::{normalize_batch, RawRecord};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Normalize,
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineFailure {
    pub id: Option<i64>,
    pub stage: Stage,
    pub reason: String,
}

impl PipelineFailure {
    fn from_record(stage: Stage, failure: RecordFailure) -> Self {
        Self {
            id: failure.id,
            stage,
            reason: failure.reason,
        }
    }
}

/// Normalize + store result for one batch of raw records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub normalized: usize,
    pub inserted: usize,
    pub failures: Vec<PipelineFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub classification: String,
    pub target: usize,
    pub fetched: usize,
    pub normalized: usize,
    pub inserted: usize,
    pub pages_requested: u32,
    pub failures: Vec<PipelineFailure>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Fewer records came back than were asked for. Not a failure by itself.
    pub fn under_collected(&self) -> bool {
        self.fetched < self.target
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures_at(&self, stage: Stage) -> impl Iterator<Item = &PipelineFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }
}

/// Drives one catalog source into one store. Runs against the same store
/// (including clones of it) hold its run guard, so two replace-then-insert
/// cycles never interleave.
pub struct Pipeline<S> {
    source: S,
    store: Store,
    options: FetchOptions,
}

impl<S: CatalogSource> Pipeline<S> {
    pub fn new(source: S, store: Store, options: FetchOptions) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn run(&self, classification: &str, target: usize) -> PipelineReport {
        self.run_with(classification, target, None, &CancelFlag::new())
            .await
    }

    pub async fn run_with(
        &self,
        classification: &str,
        target: usize,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancelFlag,
    ) -> PipelineReport {
        let filter = classification::filter_value(classification);
        let span = info_span!("pipeline.run", classification = %filter, target);
        async {
            let _guard = self.store.run_guard().await;
            let started_at = Utc::now();

            let outcome = self.collect(&filter, target, progress, cancel).await;
            let mut failures = Vec::new();
            if let Some(err) = &outcome.error {
                failures.push(PipelineFailure {
                    id: None,
                    stage: Stage::Fetch,
                    reason: err.to_string(),
                });
            }

            let persisted = self.persist_unguarded(&outcome.records).await;
            failures.extend(persisted.failures);

            let report = PipelineReport {
                classification: filter.clone(),
                target,
                fetched: outcome.records.len(),
                normalized: persisted.normalized,
                inserted: persisted.inserted,
                pages_requested: outcome.pages_requested,
                failures,
                cancelled: outcome.cancelled,
                started_at,
                finished_at: Utc::now(),
            };
            if report.under_collected() {
                warn!(
                    fetched = report.fetched,
                    target, "collected fewer records than requested"
                );
            }
            info!(
                fetched = report.fetched,
                normalized = report.normalized,
                inserted = report.inserted,
                failures = report.failures.len(),
                cancelled = report.cancelled,
                "pipeline run finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Fetch only. The records are returned to the caller; nothing is kept here.
    pub async fn collect(
        &self,
        classification: &str,
        target: usize,
        progress: Option<&ProgressFn<'_>>,
        cancel: &CancelFlag,
    ) -> FetchOutcome {
        fetch_up_to(&self.source, classification, target, &self.options, progress, cancel).await
    }

    /// Normalize and store a batch the caller already holds.
    pub async fn persist(&self, records: &[RawRecord]) -> PersistReport {
        let _guard = self.store.run_guard().await;
        self.persist_unguarded(records).await
    }

    async fn persist_unguarded(&self, records: &[RawRecord]) -> PersistReport {
        let (normalized, malformed) = normalize_batch(records);
        let inserted = self.store.insert_batch(&normalized).await;

        let failures = malformed
            .into_iter()
            .map(|f| PipelineFailure::from_record(Stage::Normalize, f))
            .chain(
                inserted
                    .failed
                    .into_iter()
                    .map(|f| PipelineFailure::from_record(Stage::Store, f)),
            )
            .collect();

        PersistReport {
            normalized: normalized.len(),
            inserted: inserted.succeeded,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{record, ScriptedCatalog};
    use crate::error::TransportError;
    use serde_json::json;
    use std::time::Duration;

    fn fast() -> FetchOptions {
        FetchOptions::new(100, Duration::ZERO)
    }

    async fn pipeline(catalog: ScriptedCatalog) -> Pipeline<ScriptedCatalog> {
        Pipeline::new(catalog, Store::in_memory().await.unwrap(), fast())
    }

    #[tokio::test]
    async fn paintings_scenario_caps_at_target() {
        let p = pipeline(ScriptedCatalog::with_page_sizes(&[100, 100, 100, 0])).await;
        let report = p.run("Paintings", 250).await;

        assert_eq!(report.classification, "Paintings");
        assert_eq!(report.fetched, 250);
        assert_eq!(report.normalized, 250);
        assert_eq!(report.inserted, 250);
        assert!(report.failures.is_empty());
        assert!(report.is_clean());
        assert!(!report.under_collected());
        assert_eq!(report.pages_requested, 3);

        let counts = p.store().counts().await.unwrap();
        assert_eq!(counts.metadata_rows, 250);
        assert_eq!(counts.media_rows, 250);
        assert_eq!(counts.color_rows, 500);
    }

    #[tokio::test]
    async fn one_malformed_record_among_ten() {
        let mut page: Vec<RawRecord> = (1..=10).map(record).collect();
        page[3] = RawRecord::try_from(json!({"title": "anonymous"})).unwrap();
        let p = pipeline(ScriptedCatalog::new(vec![Ok(page)])).await;

        let report = p.run("Coins", 100).await;
        assert_eq!(report.fetched, 10);
        assert_eq!(report.normalized, 9);
        assert_eq!(report.inserted, 9);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, Stage::Normalize);
        assert_eq!(report.failures[0].id, None);
        assert!(report.under_collected());
    }

    #[tokio::test]
    async fn fetch_error_is_reported_and_partial_batch_kept() {
        let page: Vec<RawRecord> = (1..=100).map(record).collect();
        let p = pipeline(ScriptedCatalog::new(vec![
            Ok(page),
            Err(TransportError::Timeout { secs: 20 }),
        ]))
        .await;

        let report = p.run("Prints", 300).await;
        assert_eq!(report.fetched, 100);
        assert_eq!(report.inserted, 100);
        let fetch_failures: Vec<_> = report.failures_at(Stage::Fetch).collect();
        assert_eq!(fetch_failures.len(), 1);
        assert_eq!(fetch_failures[0].id, None);
        assert!(fetch_failures[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn rerunning_same_classification_does_not_duplicate() {
        let page: Vec<RawRecord> = (1..=50).map(record).collect();
        let p = pipeline(ScriptedCatalog::new(vec![Ok(page.clone()), Ok(page)])).await;
        p.run("Paintings", 100).await;
        let first = p.store().counts().await.unwrap();
        p.run("Paintings", 100).await;
        assert_eq!(p.store().counts().await.unwrap(), first);
        assert_eq!(first.color_rows, 100);
        assert_eq!(p.store().orphan_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn classification_names_are_canonicalized() {
        let p = pipeline(ScriptedCatalog::with_page_sizes(&[1])).await;
        let report = p.run("sculpture", 10).await;
        assert_eq!(report.classification, "Sculpture");
        let calls = p.source.calls.lock().unwrap().clone();
        assert_eq!(calls[0].0, "Sculpture");
    }

    #[tokio::test]
    async fn cancelled_before_start_writes_nothing() {
        let p = pipeline(ScriptedCatalog::with_page_sizes(&[100])).await;
        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = p.run_with("Paintings", 100, None, &cancel).await;
        assert!(report.cancelled);
        assert_eq!(report.fetched, 0);
        assert!(report.is_clean());
        assert_eq!(p.store().counts().await.unwrap().metadata_rows, 0);
    }

    #[tokio::test]
    async fn collect_then_persist_as_explicit_values() {
        let p = pipeline(ScriptedCatalog::with_page_sizes(&[20])).await;
        let outcome = p.collect("Vessels", 100, None, &CancelFlag::new()).await;
        assert_eq!(outcome.records.len(), 20);
        assert_eq!(p.store().counts().await.unwrap().metadata_rows, 0);

        let persisted = p.persist(&outcome.records).await;
        assert_eq!(persisted.normalized, 20);
        assert_eq!(persisted.inserted, 20);
        assert!(persisted.failures.is_empty());
    }

    #[tokio::test]
    async fn concurrent_runs_are_serialized() {
        let p = pipeline(ScriptedCatalog::with_page_sizes(&[100, 100, 0])).await;
        let (a, b) = tokio::join!(p.run("Paintings", 100), p.run("Paintings", 100));
        assert_eq!(a.inserted + b.inserted, 200);
        assert!(a.finished_at <= b.started_at || b.finished_at <= a.started_at);
        let counts = p.store().counts().await.unwrap();
        assert_eq!(counts.metadata_rows, 200);
        assert_eq!(counts.media_rows, 200);
    }

    #[tokio::test]
    async fn pipelines_sharing_a_store_are_serialized() {
        let store = Store::in_memory().await.unwrap();
        let a = Pipeline::new(ScriptedCatalog::with_page_sizes(&[100]), store.clone(), fast());
        let b = Pipeline::new(ScriptedCatalog::with_page_sizes(&[100]), store.clone(), fast());
        let (ra, rb) = tokio::join!(a.run("Paintings", 100), b.run("Paintings", 100));
        assert!(ra.finished_at <= rb.started_at || rb.finished_at <= ra.started_at);
        assert!(ra.is_clean() && rb.is_clean());
        // Both catalogs served ids 1..=100, so the second run replaced the first.
        let counts = store.counts().await.unwrap();
        assert_eq!(counts.metadata_rows, 100);
        assert_eq!(counts.color_rows, 200);
    }

    #[tokio::test]
    async fn progress_callback_may_borrow_caller_state() {
        let p = pipeline(ScriptedCatalog::with_page_sizes(&[100, 50])).await;
        let pages = std::sync::Mutex::new(Vec::new());
        let on_page = |prog: crate::catalog::FetchProgress| pages.lock().unwrap().push(prog.page);
        let report = p
            .run_with("Paintings", 500, Some(&on_page), &CancelFlag::new())
            .await;
        assert_eq!(report.fetched, 150);
        assert_eq!(pages.into_inner().unwrap(), vec![1, 2]);
    }

    #[test]
    fn report_serializes_stage_names() {
        let f = PipelineFailure {
            id: Some(3),
            stage: Stage::Store,
            reason: "disk full".into(),
        };
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v, json!({"id": 3, "stage": "store", "reason": "disk full"}));
    }
}
