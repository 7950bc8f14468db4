use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use od_core::{Strictness, UrlMetric};
use od_extensions::{metric_context_from_config, MetricConfig};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "od-cli")]
#[command(about = "Validate URL metrics and inspect the effective schema")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Construct a URL metric from a JSON file and print its canonical form.
    Validate {
        file: PathBuf,
        /// Strip undeclared properties instead of rejecting them.
        #[arg(long)]
        lenient: bool,
    },
    /// Print the effective JSON Schema, extensions included.
    Schema {
        /// Omit read-only fields, as clients submit them.
        #[arg(long)]
        writable: bool,
    },
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OD_LOG").unwrap_or_else(|_| "od=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = MetricConfig::from_env();
    debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Validate { file, lenient } => {
            let mut context = metric_context_from_config(&config)?;
            if lenient {
                context = context.with_strictness(Strictness::Lenient);
            }
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            match UrlMetric::from_json_str(&text, &context) {
                Ok(metric) => println!("{}", serde_json::to_string_pretty(&metric)?),
                Err(err) => bail!("{} is not a valid URL metric ({:?}): {err}", file.display(), err.kind()),
            }
        }
        Commands::Schema { writable } => {
            let context = metric_context_from_config(&config)?;
            let schema = context.schema();
            let document = if writable {
                schema.writable().to_json()
            } else {
                schema.to_json()
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::Serve => od_web::serve(config).await?,
    }

    Ok(())
}
