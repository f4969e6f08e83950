//! CLI entry point for the exam rater.
//!
//! Provides subcommands for ranking institutions, per-institution and
//! per-student reports, score frequencies, certificate issue and verification,
//! and CSV export of graded records.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use exam_rater::analyzers::analyzer::Rater;
use exam_rater::analyzers::certificate::CertificateLedger;
use exam_rater::config::RaterConfig;
use exam_rater::fetch::{BasicClient, read_source};
use exam_rater::output::{append_records, print_json, write_json};
use exam_rater::services::MemoryStore;
use exam_rater::snapshot::{
    LocalSnapshotSink, S3SnapshotSink, SnapshotSink, decode, report_snapshot_key,
    store_certificates,
};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "exam_rater")]
#[command(about = "Grades exam submissions and ranks institutions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the roster, answers, keys and engine configuration come from.
#[derive(Args)]
struct Sources {
    /// Roster CSV (path or URL)
    #[arg(long, default_value = "roster.csv")]
    roster: String,

    /// Answers JSON (path or URL)
    #[arg(long, default_value = "answers.json")]
    answers: String,

    /// Answer keys JSON (path or URL)
    #[arg(long, default_value = "keys.json")]
    keys: String,

    /// Engine configuration JSON
    #[arg(short, long, env = "RATER_CONFIG", default_value = "rater.json")]
    config: String,
}

/// Where reports and snapshots go.
#[derive(Args)]
struct Destination {
    /// Write the JSON report to this file instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Also store a dated snapshot in this directory
    #[arg(long)]
    snapshot_dir: Option<String>,

    /// Optional: S3 bucket to store a dated snapshot in (e.g., "my-bucket")
    #[arg(long)]
    s3_bucket: Option<String>,

    /// Gzip compress snapshots
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank every institution on overall, section and category averages
    Rank {
        #[command(flatten)]
        sources: Sources,

        #[command(flatten)]
        destination: Destination,
    },
    /// Report every student of one institution with percentiles
    Institution {
        /// Institution name, matched after normalization
        #[arg(value_name = "NAME")]
        name: String,

        #[command(flatten)]
        sources: Sources,

        #[command(flatten)]
        destination: Destination,
    },
    /// Print the score frequency tables
    Frequencies {
        #[command(flatten)]
        sources: Sources,

        #[command(flatten)]
        destination: Destination,
    },
    /// Report one student by username
    Student {
        #[arg(value_name = "USERNAME")]
        username: String,

        #[command(flatten)]
        sources: Sources,

        #[command(flatten)]
        destination: Destination,
    },
    /// Issue certificate ids for every eligible student
    Certificates {
        #[command(flatten)]
        sources: Sources,

        #[command(flatten)]
        destination: Destination,
    },
    /// Verify a certificate number
    Verify {
        #[arg(value_name = "CERTIFICATE_ID")]
        certificate_id: String,

        /// Certificate snapshot to verify against (path or URL, `.gz` allowed).
        /// Without it, certificates are issued from the roster.
        #[arg(long)]
        snapshot: Option<String>,

        #[command(flatten)]
        sources: Sources,
    },
    /// Append graded records to a CSV file
    Grades {
        /// Only export this institution
        #[arg(long)]
        institution: Option<String>,

        /// CSV file to append results to
        #[arg(short, long, default_value = "grades.csv")]
        output: String,

        #[command(flatten)]
        sources: Sources,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/exam_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("exam_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("RUST_LOG")
                .from_env_lossy(),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::DEBUG.into())
                .with_env_var("RUST_LOG_JSON")
                .from_env_lossy(),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            sources,
            destination,
        } => {
            let (rater, store) = load(&sources).await?;
            let report = rater.rank_report(&store, &store).await?;
            emit(&destination, &report)?;

            if let Some(certificates) = report.certificates.clone() {
                store_certificate_snapshot(&destination, certificates).await?;
            }
            store_report_snapshot(&destination, &report).await?;
        }
        Commands::Institution {
            name,
            sources,
            destination,
        } => {
            let (rater, store) = load(&sources).await?;
            match rater.institution_report(&name, &store, &store).await? {
                Some(report) => emit(&destination, &report)?,
                None => anyhow::bail!("unknown institution: {name}"),
            }
        }
        Commands::Frequencies {
            sources,
            destination,
        } => {
            let (rater, store) = load(&sources).await?;
            let tables = rater.frequencies(&store, &store).await?;
            emit(&destination, &tables)?;
        }
        Commands::Student {
            username,
            sources,
            destination,
        } => {
            let (rater, store) = load(&sources).await?;
            match rater.student_report(&username, &store, &store).await? {
                Some(report) => emit(&destination, &report)?,
                None => anyhow::bail!("unknown student: {username}"),
            }
        }
        Commands::Certificates {
            sources,
            destination,
        } => {
            let (rater, store) = load(&sources).await?;
            let certificates = rater.certificates(&store).await?;
            emit(&destination, &certificates)?;
            store_certificate_snapshot(&destination, certificates).await?;
        }
        Commands::Verify {
            certificate_id,
            snapshot,
            sources,
        } => {
            let ledger = match snapshot {
                Some(source) => {
                    let client = BasicClient::new()?;
                    let bytes = decode(&source, read_source(&client, &source).await?)?;
                    CertificateLedger::from_snapshot_json(&bytes)
                        .with_context(|| format!("reading certificate snapshot {source}"))?
                }
                None => {
                    let (rater, store) = load(&sources).await?;
                    CertificateLedger::new(rater.certificates(&store).await?)
                }
            };

            match ledger.find(&certificate_id) {
                Some(record) => {
                    info!(certificate_id = %record.certificate_id, "Certificate verified");
                    print_json(record)?;
                }
                None => {
                    warn!(certificate_id = %certificate_id, checked = ledger.len(), "Certificate not found");
                    anyhow::bail!("certificate {certificate_id} was not issued");
                }
            }
        }
        Commands::Grades {
            institution,
            output,
            sources,
        } => {
            let (rater, store) = load(&sources).await?;
            let records = rater
                .graded_records(institution.as_deref(), &store, &store)
                .await?;
            append_records(&output, &records)?;
            info!(rows = records.len(), output = %output, "Graded records exported");
        }
    }

    Ok(())
}

/// Loads the configuration and every data source for one request.
#[tracing::instrument(skip_all, fields(config = %sources.config))]
async fn load(sources: &Sources) -> Result<(Rater, MemoryStore)> {
    let config = RaterConfig::load(&sources.config)
        .with_context(|| format!("loading configuration {}", sources.config))?;
    info!(
        institutions = config.institutions.len(),
        credentials = config.credentials.len(),
        "Configuration loaded"
    );

    let client = BasicClient::new()?;
    let store = MemoryStore::load(&client, &sources.roster, &sources.answers, &sources.keys)
        .await
        .context("loading data sources")?;
    Ok((Rater::new(config), store))
}

/// Prints `value` as JSON or writes it to `--output`.
fn emit(destination: &Destination, value: &impl Serialize) -> Result<()> {
    match &destination.output {
        Some(path) => write_json(path, value),
        None => print_json(value),
    }
}

/// Every sink the destination options ask for.
async fn sinks(destination: &Destination) -> Vec<Box<dyn SnapshotSink>> {
    let mut sinks: Vec<Box<dyn SnapshotSink>> = Vec::new();
    if let Some(dir) = &destination.snapshot_dir {
        sinks.push(Box::new(LocalSnapshotSink::new(dir, destination.gzip)));
    }
    if let Some(bucket) = &destination.s3_bucket {
        info!(bucket = %bucket, gzip = destination.gzip, "S3 upload enabled");
        sinks.push(Box::new(
            S3SnapshotSink::from_env(bucket, destination.gzip).await,
        ));
    }
    sinks
}

async fn store_certificate_snapshot(
    destination: &Destination,
    certificates: Vec<exam_rater::analyzers::types::CertificateRecord>,
) -> Result<()> {
    let now = Utc::now();
    for sink in sinks(destination).await {
        let location = store_certificates(sink.as_ref(), certificates.clone(), now)
            .await
            .context("storing certificate snapshot")?;
        info!(location = %location, "Certificate snapshot stored");
    }
    Ok(())
}

async fn store_report_snapshot(destination: &Destination, report: &impl Serialize) -> Result<()> {
    let key = report_snapshot_key(Utc::now().date_naive());
    let value = serde_json::to_value(report)?;
    for sink in sinks(destination).await {
        let location = sink
            .put_json(&key, &value)
            .await
            .context("storing report snapshot")?;
        info!(location = %location, "Report snapshot stored");
    }
    Ok(())
}
