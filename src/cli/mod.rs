//! Command implementations shared by the binaries.
pub mod db_counts;
pub mod harvest;
