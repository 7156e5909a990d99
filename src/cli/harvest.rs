use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::catalog::{
    fetch_up_to, CancelFlag, Classification, FetchProgress, HttpCatalogClient,
    KNOWN_CLASSIFICATIONS,
};
use crate::config::HarvesterConfig;
use crate::normalization::normalize_batch;
use crate::pipeline::{Pipeline, PipelineReport};
use crate::reports;
use crate::store::{QueryResult, Store};
use crate::util::env as env_util;

const PREVIEW_ROWS: usize = 10;

const COLLECT_SNAPSHOT: &[&str] = &[
    "HARVARD_API_KEY",
    "HARVARD_BASE_URL",
    "HARVEST_DB_PATH",
    "HARVEST_PAGE_SIZE",
    "HARVEST_PAGE_DELAY_MS",
    "HARVEST_TARGET_COUNT",
    "HARVEST_HTTP_TIMEOUT_SECS",
    "HARVEST_ONLY_WITH_IMAGES",
];

#[derive(Debug, Clone, Default)]
pub struct CollectCommandConfig {
    pub classification: String,
    pub target: Option<usize>,
    pub dry_run: bool,
    pub json: bool,
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryCommandConfig {
    pub sql: String,
    pub csv: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportCommandConfig {
    pub name: String,
    pub csv: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

pub async fn run_collect(cfg: CollectCommandConfig) -> Result<()> {
    env_util::preflight_check("harvest collect", &["HARVARD_API_KEY"], COLLECT_SNAPSHOT)?;
    let conf = HarvesterConfig::from_env()?;
    let client = HttpCatalogClient::from_config(&conf)?;
    let target = cfg.target.unwrap_or(conf.default_target);

    if Classification::lookup(&cfg.classification).is_none() {
        warn!(
            classification = %cfg.classification,
            "not a known classification; passing it to the catalog as-is"
        );
    }

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupt received; stopping after the current page");
            on_signal.cancel();
        }
    });
    let progress = |p: FetchProgress| {
        eprintln!(
            "page {:>3}: {:>5}/{} ({:>3.0}%)",
            p.page,
            p.fetched,
            p.target,
            p.ratio() * 100.0
        );
    };

    if cfg.dry_run {
        let filter = crate::catalog::classification::filter_value(&cfg.classification);
        let outcome =
            fetch_up_to(&client, &filter, target, &conf.fetch, Some(&progress), &cancel).await;
        let (normalized, failures) = normalize_batch(&outcome.records);

        println!(
            "fetched {} of {} requested ({} normalized, {} skipped); nothing written",
            outcome.records.len(),
            target,
            normalized.len(),
            failures.len()
        );
        for rec in normalized.iter().take(PREVIEW_ROWS) {
            println!("{}", rec.preview_row());
        }
        if let Some(err) = outcome.error {
            warn!(error = %err, "collection stopped early");
        }
        return Ok(());
    }

    let db_path = cfg.db_path.unwrap_or_else(|| conf.db_path.clone());
    let store = open_store(&db_path, conf.db_max_connections).await?;
    let pipeline = Pipeline::new(client, store, conf.fetch.clone());
    let report = pipeline
        .run_with(&cfg.classification, target, Some(&progress), &cancel)
        .await;

    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

pub fn render_report(report: &PipelineReport) -> String {
    let mut out = String::new();
    let elapsed = report.finished_at - report.started_at;
    writeln!(
        out,
        "{}: fetched {}/{} in {} page(s), normalized {}, inserted {} ({:.1}s)",
        report.classification,
        report.fetched,
        report.target,
        report.pages_requested,
        report.normalized,
        report.inserted,
        elapsed.num_milliseconds() as f64 / 1000.0
    )
    .ok();
    if report.cancelled {
        writeln!(out, "  run was cancelled").ok();
    }
    if report.under_collected() && !report.cancelled {
        writeln!(out, "  catalog returned fewer records than requested").ok();
    }
    for f in &report.failures {
        let id = f.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
        writeln!(out, "  failed [{:?}] id={id}: {}", f.stage, f.reason).ok();
    }
    out
}

pub async fn run_query(cfg: QueryCommandConfig) -> Result<()> {
    let store = store_from_env(cfg.db_path).await?;
    let result = store.query(&cfg.sql).await?;
    emit(&result, cfg.csv.as_deref())
}

pub async fn run_report(cfg: ReportCommandConfig) -> Result<()> {
    if cfg.name.eq_ignore_ascii_case("list") {
        for (n, r) in reports::list() {
            println!("{n:>2}. {:<24} {}", r.name, r.title);
        }
        return Ok(());
    }
    let Some(report) = reports::find(&cfg.name) else {
        bail!("unknown report {:?}; try `harvest report list`", cfg.name);
    };
    let store = store_from_env(cfg.db_path).await?;
    info!(report = report.name, "running report");
    let result = report.run(&store).await?;
    println!("{}", report.title);
    emit(&result, cfg.csv.as_deref())
}

pub async fn run_counts(db_path: Option<PathBuf>) -> Result<()> {
    let store = store_from_env(db_path).await?;
    print!("{}", super::db_counts::summarize(&store).await?);
    Ok(())
}

pub fn run_classifications() {
    for c in KNOWN_CLASSIFICATIONS.iter() {
        println!("{:>4}  {}", c.code, c.name);
    }
}

pub async fn run_reset(db_path: Option<PathBuf>, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("reset deletes every stored artifact; pass --yes to confirm");
    }
    let store = store_from_env(db_path).await?;
    let before = store.reset().await?;
    println!(
        "removed {} metadata, {} media and {} color rows",
        before.metadata_rows, before.media_rows, before.color_rows
    );
    Ok(())
}

async fn store_from_env(db_path: Option<PathBuf>) -> Result<Store> {
    let conf = HarvesterConfig::from_env()?;
    let path = db_path.unwrap_or(conf.db_path);
    open_store(&path, conf.db_max_connections).await
}

async fn open_store(path: &Path, max_connections: u32) -> Result<Store> {
    Store::open(path, max_connections)
        .await
        .with_context(|| format!("opening {}", path.display()))
}

fn emit(result: &QueryResult, csv: Option<&Path>) -> Result<()> {
    match csv {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            result.write_csv(file)?;
            eprintln!("wrote {} row(s) to {}", result.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", result.render_table())?;
            writeln!(stdout, "({} row(s))", result.len())?;
        }
    }
    Ok(())
}
