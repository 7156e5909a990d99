use anyhow::Result;
use artifact_harvester::cli::db_counts::{run, DbCountsConfig};
use artifact_harvester::logging::{init_tracing, DEFAULT_FILTER};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_FILTER)?;
    artifact_harvester::util::env::bootstrap_cli("db_counts");

    let db_path = std::env::args_os().nth(1).map(Into::into);
    run(DbCountsConfig {
        db_path,
        out_file: None,
    })
    .await
}
