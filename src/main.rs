use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scholar_harvester::config::{load_settings, Settings};
use scholar_harvester::models::RequestInput;
use scholar_harvester::registry::HarvesterRegistry;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Scholar Harvester - batched identifier lookups against scholarly metadata providers
#[derive(Parser, Debug)]
#[command(name = "scholar-harvester")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harvest scholarly metadata by DOI, ORCID, ROR, provider ID, or name", long_about = None)]
struct Cli {
    /// Enable verbose logging (-v, -vv for more)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Harvest records for a batch of lookup values
    Harvest {
        /// Provider to harvest from
        #[arg(long, default_value = "openalex")]
        provider: String,

        /// Entity kind to retrieve (work, author, institution, ...)
        #[arg(long, default_value = "work")]
        entity: String,

        /// Field the values represent (id, doi, orcid, ror, name, ...)
        #[arg(long, default_value = "id")]
        field: String,

        /// Re-run retrieval even if results are already cached
        #[arg(long)]
        refresh: bool,

        /// Lookup values
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// List configured providers
    Providers,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => load_settings(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = resolve_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Harvest {
            provider,
            entity,
            field,
            refresh,
            values,
        } => {
            let mut registry = HarvesterRegistry::from_settings(&settings)?;
            let Some(harvester) = registry.get_mut(&provider) else {
                bail!("provider '{}' is not active", provider);
            };

            let inputs: Vec<RequestInput> = values
                .into_iter()
                .map(|value| RequestInput::Parts {
                    value,
                    field: field.clone(),
                    entity: entity.clone(),
                })
                .collect();
            harvester.add_requests(inputs)?;

            harvester.get_results(refresh).await?;
            let output = serde_json::json!({
                "results": harvester.results(),
                "diagnostics": harvester.diagnostics(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Providers => {
            for entry in &settings.providers {
                println!(
                    "{} [{}]",
                    entry.name,
                    if entry.enabled { "enabled" } else { "disabled" }
                );
            }
        }
    }

    Ok(())
}
