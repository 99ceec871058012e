use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use colored::*;
use humansize::{DECIMAL, format_size};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use zipstage::archive::Archive;
use zipstage::config::ClientConfig;
use zipstage::job::{CodePipelineReporter, JobEvent, JobMode, JobOutcome, JobRunner};
use zipstage::pipeline;
use zipstage::s3::S3Connector;

#[derive(Parser)]
#[command(name = "zipstage")]
#[command(author, version, about = "Extract or merge ZIP artifacts for CodePipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the named entries of a local archive into a new archive
    Extract {
        /// Source archive
        source: PathBuf,

        /// Comma separated list of entry paths to copy
        #[arg(short, long)]
        files: String,

        /// Where to write the new archive
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Graft every file of one local archive into another under a prefix
    Merge {
        /// Archive whose entries are kept as-is
        base: PathBuf,

        /// Archive whose files are inserted
        graft: PathBuf,

        /// Prepended verbatim to each grafted path
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Where to write the merged archive
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the entries of a local archive
    List {
        archive: PathBuf,
    },

    /// Run one CodePipeline job from its event payload
    Job {
        /// File holding the event JSON, or - for stdin
        #[arg(long, default_value = "-")]
        event: String,

        /// Merge two input artifacts instead of extracting from one
        #[arg(long)]
        merge: bool,

        /// Execution id reported with failures (random when omitted)
        #[arg(long, env = "ZIPSTAGE_EXECUTION_ID")]
        execution_id: Option<String>,

        #[command(flatten)]
        client: ClientArgs,
    },
}

#[derive(Args)]
struct ClientArgs {
    /// Custom AWS endpoint, e.g. http://localhost:4566 for LocalStack
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// AWS region override
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Use path-style S3 addressing
    #[arg(long, env = "ZIPSTAGE_FORCE_PATH_STYLE")]
    force_path_style: bool,
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        ClientConfig {
            endpoint_url: args.endpoint_url,
            region: args.region,
            force_path_style: args.force_path_style,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;

    match cli.command {
        Commands::Extract {
            source,
            files,
            output,
        } => {
            let extracted = pipeline::extract(read_file(&source).await?, &files)?;
            write_file(&output, &extracted.bytes).await?;

            println!(
                "{} Wrote {} entries ({}) to {}",
                "✓".green().bold(),
                extracted.copied.len(),
                format_size(extracted.bytes.len(), DECIMAL),
                output.display()
            );
            for path in &extracted.unresolved {
                println!("  {} not found: {}", "!".yellow().bold(), path);
            }
            Ok(())
        }
        Commands::Merge {
            base,
            graft,
            prefix,
            output,
        } => {
            let merged =
                pipeline::merge(read_file(&base).await?, read_file(&graft).await?, &prefix)?;
            write_file(&output, &merged.bytes).await?;

            println!(
                "{} Grafted {} entries ({}) into {}",
                "✓".green().bold(),
                merged.grafted.len(),
                format_size(merged.bytes.len(), DECIMAL),
                output.display()
            );
            Ok(())
        }
        Commands::List { archive } => list(&archive).await,
        Commands::Job {
            event,
            merge,
            execution_id,
            client,
        } => {
            let mode = if merge { JobMode::Merge } else { JobMode::Extract };
            run_job(&event, mode, execution_id, client.into()).await
        }
    }
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "zipstage=debug" } else { "zipstage=info" })
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn read_file(path: &Path) -> Result<Bytes> {
    let bytes = tokio::fs::read(path)
        .await
        .context(format!("Failed to read {}", path.display()))?;
    Ok(Bytes::from(bytes))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .context(format!("Failed to write {}", path.display()))
}

async fn list(path: &Path) -> Result<()> {
    let archive = Archive::parse(read_file(path).await?)?;

    for entry in archive.entries() {
        let meta = entry.metadata();
        let mode = meta
            .unix_permissions
            .map(|mode| format!("{:06o}", mode))
            .unwrap_or_else(|| "------".to_string());
        let size = if entry.is_dir() {
            "-".to_string()
        } else {
            format_size(entry.size(), DECIMAL)
        };
        let name = if entry.is_dir() {
            entry.path().blue().bold()
        } else {
            entry.path().normal()
        };

        println!("{}  {:>10}  {}  {}", mode, size, meta.modified, name);
        if let Some(comment) = &meta.comment {
            println!("        {}", comment.dimmed());
        }
    }

    println!("{} entries", archive.len());
    Ok(())
}

async fn run_job(
    event_source: &str,
    mode: JobMode,
    execution_id: Option<String>,
    config: ClientConfig,
) -> Result<()> {
    let payload = if event_source == "-" {
        let mut payload = String::new();
        tokio::io::stdin()
            .read_to_string(&mut payload)
            .await
            .context("Failed to read event from stdin")?;
        payload
    } else {
        tokio::fs::read_to_string(event_source)
            .await
            .context(format!("Failed to read event from {}", event_source))?
    };
    let event = JobEvent::from_json(&payload)?;

    let connector = Arc::new(S3Connector::new(config.clone()));
    let reporter = Arc::new(CodePipelineReporter::new(&config).await);
    let mut runner = JobRunner::new(connector, reporter, mode);
    if let Some(id) = execution_id {
        runner = runner.with_execution_id(id);
    }

    // A failed status report surfaces here and exits non-zero.
    match runner.run(&event).await? {
        JobOutcome::Success { message } => {
            println!("{} {}", "✓".green().bold(), message);
            Ok(())
        }
        failure @ JobOutcome::Failure { .. } => Err(anyhow!(failure.report_message())),
    }
}
