//! Tabula command line.
//!
//! Usage:
//!   tabula translate --view albums.toml --query "status=active&sort=year:desc"
//!   tabula normalize --view albums.toml --query "page=1&title=%20abbey"

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tabula_core::column::ColumnModel;
use tabula_core::config::{GridConfig, ViewConfig};
use tabula_core::filter::FilterRegistry;
use tabula_core::state::GridState;
use tabula_core::translate::{QueryTranslator, TranslatedQuery};
use tabula_core::url_state::{UrlCodec, from_query_string, to_query_string};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate URL parameters into a predicate, sort and page request.
    Translate {
        /// View configuration file (toml, yaml or json).
        #[arg(long)]
        view: PathBuf,

        /// URL query string.
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Re-encode URL parameters in canonical form.
    Normalize {
        /// View configuration file (toml, yaml or json).
        #[arg(long)]
        view: PathBuf,

        /// URL query string.
        #[arg(long, default_value = "")]
        query: String,
    },
}

#[derive(Serialize)]
struct Translation<'a> {
    #[serde(flatten)]
    query: &'a TranslatedQuery,
    warnings: Vec<String>,
    sql: Option<String>,
    count_sql: Option<String>,
}

/// A view with its grid state hydrated from a query string.
struct Hydrated {
    view: ViewConfig,
    columns: ColumnModel,
    state: GridState,
    warnings: Vec<String>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = GridConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.log_filter);

    let registry = FilterRegistry::new();

    match Args::parse().command {
        Command::Translate { view, query } => {
            let hydrated = hydrate(&view, &query, &registry, &config)?;
            let translated = QueryTranslator::new(&hydrated.columns, &registry)
                .with_mode(hydrated.view.pagination)
                .translate(&hydrated.state);
            let renderer = hydrated.view.sql_renderer();
            let output = Translation {
                query: &translated,
                warnings: hydrated.warnings,
                sql: renderer.as_ref().map(|r| r.select_sql(&translated)),
                count_sql: renderer.as_ref().map(|r| r.count_sql(&translated)),
            };
            let json = serde_json::to_string_pretty(&output).context("failed to serialize translation")?;
            println!("{json}");
        }
        Command::Normalize { view, query } => {
            let hydrated = hydrate(&view, &query, &registry, &config)?;
            for warning in &hydrated.warnings {
                info!(warning = %warning, "dropped parameter");
            }
            let params = UrlCodec::new(&hydrated.columns, &registry, &config)
                .with_default_page_size(hydrated.view.page_size(&config))
                .with_mode(hydrated.view.pagination)
                .encode(&hydrated.state);
            println!("{}", to_query_string(&params));
        }
    }

    Ok(())
}

fn hydrate(
    view_path: &Path,
    query: &str,
    registry: &FilterRegistry,
    config: &GridConfig,
) -> Result<Hydrated> {
    let view = ViewConfig::load(view_path)?;
    let columns = view
        .build_columns(registry, config)
        .with_context(|| format!("invalid columns in {}", view_path.display()))?;

    let params = from_query_string(query);
    let page_size = view.page_size(config);
    let decoded = UrlCodec::new(&columns, registry, config)
        .with_default_page_size(page_size)
        .with_mode(view.pagination)
        .decode(&params);
    let warnings = decoded.warnings.iter().map(ToString::to_string).collect();

    let mut state = GridState::new(page_size).with_initial_sort(view.initial_sort(&columns));
    state.apply_decoded(decoded);

    Ok(Hydrated {
        view,
        columns,
        state,
        warnings,
    })
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured
/// filter. Logs go to stderr so stdout stays machine-readable.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
