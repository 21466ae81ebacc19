use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use menuforge::cache::{CacheRead, RawMenuCache};
use menuforge::config::Settings;
use menuforge::serving::MenuService;
use menuforge::tiers::{ArtifactStore, TierResolver};

#[derive(Parser)]
#[command(name = "menuforge", about = "Restaurant menu resolution service", version)]
struct Cli {
    /// Config file (TOML). Defaults to menuforge.toml when present.
    #[arg(long, env = "MENUFORGE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and print the display-ready menu for a restaurant.
    Resolve {
        /// Restaurant slug, e.g. "luigis-pizza".
        slug: String,
        /// Location slug, e.g. "miami-fl".
        #[arg(long)]
        location: Option<String>,
        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },
    /// Print the matcher's per-candidate rationale for a query.
    Explain {
        slug: String,
        #[arg(long)]
        location: Option<String>,
    },
    /// Print the serve-tier decision without fetching anything.
    Tier {
        slug: String,
        #[arg(long)]
        location: Option<String>,
    },
    /// Inspect the raw menu cache entry for a query.
    CheckCache {
        query: String,
        #[arg(long, default_value = "")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("menuforge=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Resolve { slug, location, pretty } => {
            let service = MenuService::from_settings(&settings);
            let menu = service.get_menu_for_app(&slug, location.as_deref()).await?;
            let out = if pretty {
                serde_json::to_string_pretty(&menu)?
            } else {
                serde_json::to_string(&menu)?
            };
            println!("{out}");
        }
        Command::Explain { slug, location } => {
            let service = MenuService::from_settings(&settings);
            let explanations = service.explain_match(&slug, location.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&explanations)?);
        }
        Command::Tier { slug, location } => {
            let store = ArtifactStore::new(&settings.artifacts.dir);
            let cache = RawMenuCache::new(&settings.cache.dir);
            let key = RawMenuCache::key(&slug.replace(['-', '_'], " "), "", &settings.serving.region_flag);
            let decision = TierResolver::new(&store, &settings.tiers).resolve(
                &slug,
                location.as_deref(),
                cache.saved_at(&key),
            )?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::CheckCache { query, address } => {
            let cache = RawMenuCache::new(&settings.cache.dir);
            let key = RawMenuCache::key(&query, &address, &settings.serving.region_flag);
            match cache.read(&key) {
                CacheRead::Hit { items, saved_at, stale } => {
                    println!(
                        "hit  key={key} items={} saved_at={saved_at} stale={stale}",
                        items.len()
                    );
                }
                CacheRead::Miss => println!("miss key={key}"),
            }
        }
    }
    Ok(())
}
