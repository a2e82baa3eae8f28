use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use calcserve::{ComputeServer, ServerConfig};

mod job;
mod sink;

use job::{failed_tasks, parse_job, run_jobs, JobSpec};
use sink::OutputFormat;

/// Run producer threads against an in-process compute server and write
/// every task outcome to a per-job file.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct App {
    /// Producer workload as KIND:COUNT (sine, sqrt or power). Repeatable.
    #[arg(long = "job", value_parser = parse_job, default_values = ["sine:10", "sqrt:10", "power:10"])]
    pub jobs: Vec<JobSpec>,

    #[clap(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Seed for operand generation. Random if omitted.
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// JSON file holding the server configuration
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Write a chrome trace of the run to this file
    #[clap(long)]
    pub chrome_trace: Option<PathBuf>,
}

fn init_tracing(chrome_trace: Option<&Path>) -> Option<tracing_chrome::FlushGuard> {
    let (chrome_layer, guard) = match chrome_trace {
        Some(path) => {
            let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file(path)
                .include_args(true)
                .build();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                eprintln!("No environment variables found that can initialize tracing_subscriber::EnvFilter. Using defaults.");
                "calcserve=info,calcserve_driver=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(chrome_layer)
        .init();

    guard
}

fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: ServerConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn main() -> Result<ExitCode> {
    let args = App::parse();
    let _guard = init_tracing(args.chrome_trace.as_deref());

    let config = load_config(args.config.as_deref())?;
    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!("Running {} producers with seed {}", args.jobs.len(), seed);

    let server = ComputeServer::with_config(config)?;
    server.start()?;

    let start = Instant::now();
    let reports = run_jobs(
        &server.client(),
        &args.jobs,
        &args.output_dir,
        args.format,
        seed,
    );
    // Drain and join even when a producer failed
    server.stop()?;
    let reports = reports?;

    for report in &reports {
        println!(
            "{:<6} {:>8} completed {:>8} failed -> {}",
            report.job.kind.name(),
            report.completed,
            report.failed,
            report.path.display()
        );
    }
    tracing::info!("All producers finished in {:?}", start.elapsed());

    if failed_tasks(&reports) > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
