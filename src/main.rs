use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use runwatch::config::parse_offset;
use runwatch::data::duration::{format_duration, parse_duration};
use runwatch::data::window::day_of;
use runwatch::report::{self, DependentsExport, GraphExport, HealthExport};
use runwatch::{Dashboard, FileSource, Settings};
use runwatch_types::Repository;

#[derive(Parser, Debug)]
#[command(name = "runwatch")]
#[command(about = "Trigger graph and health classification for CI workflow runs")]
struct Args {
    /// Path to a TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding exported runs and workflows (overrides settings)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// UTC offset in which days are evaluated, e.g. "+02:00"
    #[arg(long)]
    utc_offset: Option<String>,

    /// Length of the health window in days
    #[arg(short, long)]
    window_days: Option<u32>,

    /// How long computed results are reused (e.g., "30s", "5m")
    #[arg(long)]
    cache_ttl: Option<String>,

    /// Log level for runwatch (RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,

    /// Write the result to a JSON file instead of stdout
    #[arg(short, long, global = true)]
    export: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the trigger graph of a repository
    Graph {
        /// Repository as owner/name
        repo: Repository,

        /// Print only the workflows transitively triggered by this name or file
        #[arg(long)]
        downstream_of: Option<String>,
    },

    /// Classify every workflow over the configured window
    Health {
        repo: Repository,

        /// Last day of the window (defaults to today)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Compare a day with the day before
    Today {
        repo: Repository,

        /// Day to compare (defaults to today)
        #[arg(long)]
        day: Option<NaiveDate>,
    },

    /// Health of the workflows triggered by a workflow name or file
    Dependents {
        repo: Repository,

        /// Workflow name (e.g. "Build") or file (e.g. "build.yml")
        key: String,

        /// Last day of the window (defaults to today)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[derive(Serialize)]
struct DownstreamExport<'a> {
    key: &'a str,
    files: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = load_settings(&args)?;
    init_logging(&settings.log_level);
    tracing::debug!(
        data_dir = %settings.data_dir.display(),
        offset = %settings.utc_offset,
        ttl = %format_duration(settings.cache_ttl),
        "Loaded settings"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args, settings))
}

/// Settings from file and environment, with command-line overrides applied.
fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;

    if let Some(dir) = &args.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(offset) = &args.utc_offset {
        settings.utc_offset = parse_offset(offset)?;
    }
    if let Some(days) = args.window_days {
        settings.window_days = days.max(1);
    }
    if let Some(ttl) = &args.cache_ttl {
        settings.cache_ttl = parse_duration(ttl)?;
    }
    if let Some(level) = &args.log_level {
        settings.log_level = level.clone();
    }
    Ok(settings)
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("runwatch={level}"))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(args: Args, settings: Settings) -> Result<()> {
    let source = Arc::new(FileSource::new(&settings.data_dir));
    let today = day_of(&Utc::now(), &settings.utc_offset);
    let dashboard = Dashboard::new(source.clone(), source, settings);
    let export = args.export.as_deref();

    match &args.command {
        Command::Graph {
            repo,
            downstream_of,
        } => {
            let graph = dashboard
                .trigger_graph(repo)
                .await
                .with_context(|| format!("Failed to build trigger graph for {repo}"))?;
            match downstream_of {
                Some(key) => emit(
                    &DownstreamExport {
                        key,
                        files: graph.downstream_closure(key).into_iter().collect(),
                    },
                    export,
                ),
                None => emit(&GraphExport::from(graph.as_ref()), export),
            }
        }
        Command::Health { repo, end } => {
            let window = dashboard.window_ending(end.unwrap_or(today));
            let report = dashboard
                .health(repo, window)
                .await
                .with_context(|| format!("Failed to compute health for {repo}"))?;
            emit(&HealthExport::from(report.as_ref()), export)
        }
        Command::Today { repo, day } => {
            let report = dashboard
                .day_over_day(repo, day.unwrap_or(today))
                .await
                .with_context(|| format!("Failed to compare days for {repo}"))?;
            emit(&report, export)
        }
        Command::Dependents { repo, key, end } => {
            let window = dashboard.window_ending(end.unwrap_or(today));
            let dependents = dashboard
                .dependents_health(repo, window, key)
                .await
                .with_context(|| format!("Failed to compute dependents of '{key}' in {repo}"))?;
            emit(&DependentsExport::from(&dependents), export)
        }
    }
}

/// Print a result to stdout, or write it to `export` when given.
fn emit<T: Serialize>(value: &T, export: Option<&Path>) -> Result<()> {
    match export {
        Some(path) => {
            report::export_to_file(value, path)?;
            println!("Exported to: {}", path.display());
        }
        None => println!("{}", report::to_json(value)?),
    }
    Ok(())
}
