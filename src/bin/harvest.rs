use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use artifact_harvester::cli::harvest::{
    run_classifications, run_collect, run_counts, run_query, run_report, run_reset,
    CollectCommandConfig, QueryCommandConfig, ReportCommandConfig,
};
use artifact_harvester::logging::{init_tracing, DEFAULT_FILTER};
use artifact_harvester::util::env;

#[derive(Parser, Debug)]
#[command(name = "harvest", version, about = "Museum catalog collector")]
struct Cli {
    /// SQLite file to use instead of HARVEST_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Fetch, normalize and store up to N records of one classification
    Collect {
        /// Classification name (e.g. Paintings) or numeric code
        #[arg(long, short)]
        classification: String,
        /// Record count to collect (defaults to HARVEST_TARGET_COUNT)
        #[arg(long, short)]
        target: Option<usize>,
        /// Fetch and normalize only; print a preview and write nothing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Print the run report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run one read-only SQL statement
    Query {
        sql: String,
        /// Write rows to this CSV file instead of printing them
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Run a canned report by name or number (`list` shows them)
    Report {
        name: String,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Row counts per table plus the orphan audit
    Counts,
    /// Known classification names and codes
    Classifications,
    /// Delete every stored artifact
    Reset {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_FILTER)?;
    env::bootstrap_cli("harvest");

    let cli = Cli::parse();
    match cli.command {
        Commands::Collect {
            classification,
            target,
            dry_run,
            json,
        } => {
            run_collect(CollectCommandConfig {
                classification,
                target,
                dry_run,
                json,
                db_path: cli.db,
            })
            .await?;
        }
        Commands::Query { sql, csv } => {
            run_query(QueryCommandConfig {
                sql,
                csv,
                db_path: cli.db,
            })
            .await?;
        }
        Commands::Report { name, csv } => {
            run_report(ReportCommandConfig {
                name,
                csv,
                db_path: cli.db,
            })
            .await?;
        }
        Commands::Counts => run_counts(cli.db).await?,
        Commands::Classifications => run_classifications(),
        Commands::Reset { yes } => run_reset(cli.db, yes).await?,
    }
    Ok(())
}
