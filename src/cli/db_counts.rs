use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::HarvesterConfig;
use crate::store::schema::TABLES;
use crate::store::Store;
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct DbCountsConfig {
    /// Optional override for the SQLite file (defaults to HARVEST_DB_PATH).
    pub db_path: Option<PathBuf>,
    /// Also write the summary here.
    pub out_file: Option<PathBuf>,
}

pub async fn run(cfg: DbCountsConfig) -> Result<()> {
    env_util::init_env();
    let db_path = match cfg.db_path {
        Some(p) => p,
        None => HarvesterConfig::from_env()?.db_path,
    };
    let store = Store::open(&db_path, 1)
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;

    let mut out = String::new();
    writeln!(out, "database: {}", db_path.display()).ok();
    out.push_str(&summarize(&store).await?);
    print!("{out}");

    if let Some(path) = cfg.out_file {
        std::fs::write(&path, &out).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Row counts per table followed by the orphan audit.
pub async fn summarize(store: &Store) -> Result<String> {
    let counts = store.counts().await?;
    let (media_orphans, color_orphans) = store.orphan_counts().await?;

    let mut out = String::new();
    let rows = [counts.metadata_rows, counts.media_rows, counts.color_rows];
    for (table, n) in TABLES.iter().zip(rows) {
        writeln!(out, "  {table:<20} {n}").ok();
    }
    writeln!(out, "orphans:").ok();
    writeln!(out, "  {:<20} {media_orphans}", TABLES[1]).ok();
    writeln!(out, "  {:<20} {color_orphans}", TABLES[2]).ok();
    if counts.metadata_rows > counts.media_rows {
        writeln!(
            out,
            "  note: {} metadata rows have no media row",
            counts.metadata_rows - counts.media_rows
        )
        .ok();
    }
    Ok(out)
}
