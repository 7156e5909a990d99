//! Collects museum catalog records page by page, normalizes them into a
//! fixed relational shape, and stores them in SQLite for read-only analysis.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalization;
pub mod pipeline;
pub mod reports;
pub mod store;

pub mod util {
    pub mod env;
}

pub use catalog::{fetch_up_to, CancelFlag, CatalogSource, FetchOutcome, HttpCatalogClient};
pub use config::{FetchOptions, HarvesterConfig};
pub use error::{MalformedRecordError, QueryError, StorageWriteError, TransportError};
pub use model::{ArtifactColor, ArtifactMedia, ArtifactMetadata, NormalizedRecord};
pub use normalization::{normalize, normalize_batch, RawRecord};
pub use pipeline::{Pipeline, PipelineFailure, PipelineReport, Stage};
pub use store::{InsertReport, QueryResult, Store, TableCounts};
