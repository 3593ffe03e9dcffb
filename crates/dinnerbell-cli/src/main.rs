use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dinnerbell_core::config_file::{self, ConfigFile};
use dinnerbell_core::{
    Config, FilterSet, RecommendationSession, ResultCache, ResultSource, SqliteStore,
};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Dinnerbell - restaurant recommendations, three at a time
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find restaurants near a zip code
    Search {
        /// Zip or postal code to search around
        #[arg(long)]
        zip: Option<String>,

        /// Search radius in miles (1-50)
        #[arg(short, long)]
        distance: Option<u32>,

        /// Cuisine to look for, or "Any"
        #[arg(short, long)]
        cuisine: Option<String>,

        /// Number of people dining (1-20)
        #[arg(short, long)]
        party_size: Option<u32>,

        /// Include places that are closed right now
        #[arg(long)]
        any_time: bool,

        /// Print this many pages and exit instead of prompting
        #[arg(long)]
        pages: Option<usize>,

        /// Google Places API key
        #[arg(long)]
        api_key: Option<String>,

        /// Path to the persistent result cache
        #[arg(long)]
        cache_path: Option<PathBuf>,

        /// Always query the provider; never read or write cached results
        #[arg(long)]
        no_cache: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// List the supported cuisines
    Cuisines,

    /// Maintain the persistent result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Path to the persistent result cache
        #[arg(long, global = true)]
        cache_path: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Delete cached searches older than 24 hours
    Prune,
    /// Delete every cached search
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let file_config = config_file::load_config();

    match cli.command {
        Command::Cuisines => {
            output::print_cuisines(&mut std::io::stdout())?;
            Ok(())
        }
        Command::Cache { action, cache_path } => {
            let path = resolve_cache_path(cache_path, &file_config)
                .context("could not determine a cache location; pass --cache-path")?;
            cache_maintenance(action, &path)
        }
        Command::Search {
            zip,
            distance,
            cuisine,
            party_size,
            any_time,
            pages,
            api_key,
            cache_path,
            no_cache,
            no_color,
        } => {
            let filters = resolve_filters(zip, distance, cuisine, party_size, any_time, &file_config);
            let config = resolve_config(api_key, cache_path, no_cache, &file_config);
            search(filters, config, pages, ColorMode(!no_color)).await
        }
    }
}

/// Logs go to stderr so recommendations on stdout stay clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// CLI flags > config file > defaults. Search filters have no env vars.
fn resolve_filters(
    zip: Option<String>,
    distance: Option<u32>,
    cuisine: Option<String>,
    party_size: Option<u32>,
    any_time: bool,
    file_config: &ConfigFile,
) -> FilterSet {
    let defaults = FilterSet::default();
    let file = file_config.search.clone().unwrap_or_default();
    FilterSet {
        food_type: cuisine.or(file.food_type).unwrap_or(defaults.food_type),
        party_size: party_size.or(file.party_size).unwrap_or(defaults.party_size),
        zip_code: zip.or(file.zip_code).unwrap_or(defaults.zip_code),
        distance: distance.or(file.distance).unwrap_or(defaults.distance),
        is_open_now: if any_time {
            false
        } else {
            file.open_now.unwrap_or(defaults.is_open_now)
        },
    }
}

fn resolve_cache_path(flag: Option<PathBuf>, file_config: &ConfigFile) -> Option<PathBuf> {
    flag.or_else(|| std::env::var("DINNERBELL_CACHE_PATH").ok().map(PathBuf::from))
        .or_else(|| {
            file_config
                .cache
                .as_ref()
                .and_then(|c| c.path.clone())
                .map(PathBuf::from)
        })
        .or_else(config_file::default_cache_path)
}

fn resolve_config(
    api_key: Option<String>,
    cache_path: Option<PathBuf>,
    no_cache: bool,
    file_config: &ConfigFile,
) -> Config {
    let defaults = Config::default();
    let api = file_config.api.clone().unwrap_or_default();
    let cache_disabled = no_cache
        || file_config
            .cache
            .as_ref()
            .and_then(|c| c.disabled)
            .unwrap_or(false);
    Config {
        google_places_key: api_key
            .or_else(|| std::env::var("GOOGLE_PLACES_API_KEY").ok())
            .or(api.google_places_key),
        places_base_url: api.base_url.unwrap_or(defaults.places_base_url),
        http_timeout_secs: std::env::var("DINNERBELL_HTTP_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .or_else(|| file_config.http.as_ref().and_then(|h| h.timeout_secs))
            .unwrap_or(defaults.http_timeout_secs),
        cache_path: resolve_cache_path(cache_path, file_config),
        cache_disabled,
    }
}

async fn search(
    filters: FilterSet,
    config: Config,
    pages: Option<usize>,
    color: ColorMode,
) -> anyhow::Result<()> {
    if pages == Some(0) {
        anyhow::bail!("--pages must be at least 1");
    }
    let filters = filters.validate()?;
    let session = RecommendationSession::from_config(&config)?;
    tracing::debug!(?config, "starting search");

    let mut out = std::io::stdout();
    output::print_search_header(&mut out, &filters, color)?;

    let outcome = session.search(&filters).await?;
    match &outcome.source {
        ResultSource::FetchFailed(message) => {
            output::print_fetch_failed(&mut out, message, color)?;
            return Ok(());
        }
        ResultSource::Cache => output::print_source_note(&mut out, "cached results", color)?,
        ResultSource::Provider => output::print_source_note(&mut out, "fresh results", color)?,
    }

    let mut state = outcome.state;
    if state.is_empty() {
        output::print_no_match(&mut out, color)?;
        return Ok(());
    }

    let mut page = 1;
    output::print_page(&mut out, page, state.visible(), color)?;

    if !state.can_show_more() {
        return Ok(());
    }

    match pages {
        Some(n) => {
            while page < n {
                state = session.show_more();
                page += 1;
                output::print_page(&mut out, page, state.visible(), color)?;
            }
        }
        None if std::io::stdin().is_terminal() => {
            let stdin = std::io::stdin();
            let mut lines = stdin.lock().lines();
            loop {
                output::print_more_prompt(&mut out, color)?;
                out.flush()?;
                let Some(line) = lines.next() else { break };
                if line?.trim().eq_ignore_ascii_case("q") {
                    break;
                }
                state = session.show_more();
                page += 1;
                output::print_page(&mut out, page, state.visible(), color)?;
            }
        }
        None => {}
    }
    Ok(())
}

fn cache_maintenance(action: CacheAction, path: &std::path::Path) -> anyhow::Result<()> {
    if !path.exists() {
        println!("No cache at {}", path.display());
        return Ok(());
    }
    let store = Arc::new(SqliteStore::open(path)?);
    let cache = ResultCache::new(store.clone());
    let removed = match action {
        CacheAction::Prune => cache.prune_expired(dinnerbell_core::now_epoch_ms())?,
        CacheAction::Clear => cache.clear()?,
    };
    if removed > 0 {
        store.vacuum()?;
    }
    println!(
        "Removed {} cached search{} from {}",
        removed,
        if removed == 1 { "" } else { "es" },
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dinnerbell_core::config_file::{CacheConfig, SearchDefaults};

    #[test]
    fn flags_override_file_defaults() {
        let file = ConfigFile {
            search: Some(SearchDefaults {
                zip_code: Some("10001".into()),
                distance: Some(5),
                food_type: Some("Thai".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let filters = resolve_filters(Some("80602".into()), None, None, Some(6), false, &file);
        assert_eq!(filters.zip_code, "80602");
        assert_eq!(filters.distance, 5);
        assert_eq!(filters.food_type, "Thai");
        assert_eq!(filters.party_size, 6);
        assert!(filters.is_open_now);
    }

    #[test]
    fn any_time_turns_off_open_now() {
        let filters = resolve_filters(None, None, None, None, true, &ConfigFile::default());
        assert!(!filters.is_open_now);
        assert_eq!(filters, FilterSet {
            is_open_now: false,
            ..FilterSet::default()
        });
    }

    #[test]
    fn no_cache_flag_disables_cache() {
        let config = resolve_config(None, Some("/tmp/x.db".into()), true, &ConfigFile::default());
        assert!(config.cache_disabled);
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn file_can_disable_cache() {
        let file = ConfigFile {
            cache: Some(CacheConfig {
                disabled: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(resolve_config(None, None, false, &file).cache_disabled);
    }

    #[test]
    fn cli_parses_search_flags() {
        let cli = Cli::try_parse_from([
            "dinnerbell",
            "search",
            "--zip",
            "80602",
            "-d",
            "20",
            "-c",
            "Coffee Shop",
            "--any-time",
            "--pages",
            "2",
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                zip,
                distance,
                cuisine,
                any_time,
                pages,
                ..
            } => {
                assert_eq!(zip.as_deref(), Some("80602"));
                assert_eq!(distance, Some(20));
                assert_eq!(cuisine.as_deref(), Some("Coffee Shop"));
                assert!(any_time);
                assert_eq!(pages, Some(2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_cache_subcommand() {
        let cli = Cli::try_parse_from(["dinnerbell", "cache", "prune", "--cache-path", "/tmp/c.db"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheAction::Prune,
                cache_path: Some(_)
            }
        ));
    }
}
