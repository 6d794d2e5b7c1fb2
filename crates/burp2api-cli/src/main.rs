//! burp2api CLI entrypoint
//! Parses command-line arguments and dispatches to the core converter.

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use anyhow::Context;
use burp2api_core::{convert_file, Config};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "burp2api")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Burp Suite proxy-history XML export to convert
    input: PathBuf,
    /// Output directory for the OpenAPI JSON and the normalized XML (default: output)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(output_dir) = &cli.output_dir {
        config.output_dir = output_dir.to_string_lossy().to_string();
    }

    tracing::debug!(input = %cli.input.display(), output_dir = %config.output_dir, "Starting conversion");

    let output = convert_file(&cli.input, &config)
        .await
        .with_context(|| format!("Failed to convert {}", cli.input.display()))?;

    println!("Output saved to {}", output.openapi_path.display());
    println!(
        "Modified XML saved to {} ({} records)",
        output.normalized_path.display(),
        output.record_count
    );
    Ok(())
}
