use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use std::path::PathBuf;
use std::sync::Arc;
use swgts::client::{FilterService, HttpFilterService};
use swgts::progress::{self, ProgressAggregator};
use swgts::utils::{calculate_kept_percentage, format_bytes, format_duration, format_read_rate};
use swgts::{Config, Uploader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swgts")]
#[command(about = "Upload FASTQ reads to an SWGTS filtering server")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "swgts.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one read file, or two for paired-end sequencing
    Upload {
        /// Base URL of the server API
        #[arg(short, long)]
        server: Option<String>,

        /// Number of concurrent transfer workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Maximum number of reads per request
        #[arg(long)]
        package_size: Option<usize>,

        /// Failed attempts tolerated per batch
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Write filtered copies of the input files into this directory
        #[arg(short, long)]
        outfolder: Option<PathBuf>,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,

        /// Accept invalid (e.g. self-signed) TLS certificates
        #[arg(short = 'k', long)]
        insecure: bool,

        /// Read files (FASTQ, optionally gzip-compressed)
        #[arg(value_name = "FILE", num_args = 1..=2, required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the server's status
    Status {
        /// Base URL of the server API
        #[arg(short, long)]
        server: Option<String>,

        /// Accept invalid (e.g. self-signed) TLS certificates
        #[arg(short = 'k', long)]
        insecure: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load_or_create(&cli.config)?;

    match cli.command {
        Commands::Status { server, insecure } => {
            if let Some(server) = server {
                config.client.server_url = server;
            }
            if insecure {
                config.client.accept_invalid_certs = true;
            }
            config.validate()?;
            show_status(&config).await
        }
        Commands::Upload {
            server,
            workers,
            package_size,
            max_attempts,
            outfolder,
            no_progress,
            insecure,
            files,
        } => {
            if let Some(server) = server {
                config.client.server_url = server;
            }
            if let Some(workers) = workers {
                config.client.worker_threads = workers;
            }
            if let Some(package_size) = package_size {
                config.client.package_size = package_size;
            }
            if let Some(max_attempts) = max_attempts {
                config.client.max_attempts = max_attempts;
            }
            if no_progress {
                config.client.progress_bar_enabled = false;
            }
            if insecure {
                config.client.accept_invalid_certs = true;
            }
            let outfolder = outfolder
                .or_else(|| config.output.output_directory.clone().map(PathBuf::from));
            config.validate()?;
            run_upload(config, files, outfolder).await
        }
    }
}

async fn show_status(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let service = HttpFilterService::new(&config.client)?;
    let status = service.server_status().await?;

    println!("Server:            {}", config.client.server_url);
    println!(
        "Buffer capacity:   {}",
        format_bytes(status.maximum_pending_bytes)
    );
    if let Some(commit) = status.commit {
        match status.date {
            Some(date) => println!("Version:           {} ({})", commit, date),
            None => println!("Version:           {}", commit),
        }
    }
    if let Some(uptime) = status.uptime {
        let uptime = std::time::Duration::try_from_secs_f64(uptime).unwrap_or_default();
        println!("Uptime:            {}", format_duration(uptime));
    }
    Ok(())
}

async fn run_upload(
    config: Config,
    files: Vec<PathBuf>,
    outfolder: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = Arc::new(HttpFilterService::new(&config.client)?);
    let multi = MultiProgress::new();

    let aggregator = if config.client.progress_bar_enabled {
        // Size the buffer bar to the server's capacity when it can be queried.
        let capacity = match service.server_status().await {
            Ok(status) => Some(status.maximum_pending_bytes),
            Err(e) => {
                warn!(error = %e, "Could not query server status");
                None
            }
        };
        let label = files
            .first()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ProgressAggregator::with_bars(&multi, &label, capacity)
    } else {
        ProgressAggregator::headless()
    };

    let (events, rx) = progress::channel();
    let display = tokio::spawn(aggregator.run(rx));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling upload");
            on_interrupt.cancel();
        }
    });

    info!(
        server = %config.client.server_url,
        files = files.len(),
        workers = config.client.worker_threads,
        "Starting upload"
    );

    let uploader = Uploader::new(service, config.client.clone(), events, cancel);
    let result = uploader
        .upload_paths(&files, outfolder.as_deref(), config.output.compression_level)
        .await;
    // Dropping the uploader closes the event channel so the display task ends.
    drop(uploader);
    let totals = display.await?;

    let report = result?;
    let kept = report.verdict.kept();
    println!();
    println!(
        "{}/{} reads kept ({:.1}%), {} processed by the server",
        kept,
        report.verdict.total,
        calculate_kept_percentage(kept, report.verdict.total),
        totals.filtered_reads
    );
    if let (Some(duration), Some(rate)) =
        (report.stats.duration(), report.stats.reads_per_second())
    {
        println!(
            "Sent {} reads in {} batches in {} ({})",
            report.stats.reads_sent,
            report.stats.batches_sent,
            format_duration(duration),
            format_read_rate(rate)
        );
    }
    if report.stats.backpressure_waits > 0 {
        println!(
            "Server asked to slow down {} times",
            report.stats.backpressure_waits
        );
    }
    for path in &report.artifacts {
        println!("Wrote {}", path.display());
    }

    if !report.is_complete() {
        return Err(format!(
            "{} of {} reads could not be delivered by {} worker(s)",
            report.read_count.saturating_sub(report.stats.reads_sent),
            report.read_count,
            report.failed_workers.len()
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_verifies_certificates_unless_insecure() {
        let cli = Cli::try_parse_from(["swgts", "upload", "r1.fq"]).unwrap();
        assert!(matches!(cli.command, Commands::Upload { insecure: false, .. }));

        let args = ["swgts", "upload", "--insecure", "r1.fq", "r2.fq"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Upload { insecure, files, .. } => {
                assert!(insecure);
                assert_eq!(files.len(), 2);
            }
            _ => panic!("Expected upload command"),
        }
    }

    #[test]
    fn test_upload_rejects_three_files() {
        assert!(Cli::try_parse_from(["swgts", "upload", "a.fq", "b.fq", "c.fq"]).is_err());
    }
}
