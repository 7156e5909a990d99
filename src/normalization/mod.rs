//! Raw catalog objects in, typed table rows out.
//!
//! Each `RawRecord` becomes either a `NormalizedRecord` or a per-record
//! failure; nothing here touches the network or the database.

pub mod fields;
pub mod record;

pub use record::{normalize, normalize_batch, RawRecord};
