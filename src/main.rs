//! # newscomp
//!
//! Finds independent coverage of a news story and asks a language model to
//! compare how each outlet frames it.
//!
//! ## Features
//!
//! - Discovers recent seed articles per news theme through Google Custom
//!   Search, or takes seed URLs from the command line
//! - Extracts each seed's title, description, image and author
//! - Searches for the same story elsewhere, narrowing section pages down to a
//!   single article and keeping one article per trusted outlet
//! - Scrapes the readable text of up to four articles per story
//! - Requests a structured bias comparison through an OpenAI-compatible API
//! - Stores only records that pass a validation gate, tagged with a batch id
//!
//! ## Usage
//!
//! ```sh
//! newscomp -o ./out -a ./allowed_domains.yaml -t Tech -w 4
//! ```
//!
//! ## Architecture
//!
//! Themes run one after another. Within a theme:
//! 1. **Discovery**: Find seed URLs for the theme (skipped with `--url`)
//! 2. **Per seed**: concepts, search, diversification, scraping, analysis
//! 3. **Gate**: Validate each record and store it as soon as it passes
//! 4. **Output**: Write the theme's raw results to `analysis_results_<theme>.json`

use awful_aj::{config, config_dir};
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use uuid::Uuid;

mod allowlist;
mod analysis;
mod api;
mod classify;
mod cli;
mod fetch;
mod llm;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod search;
mod store;
mod utils;
mod validate;

#[cfg(test)]
mod testing;

use allowlist::DomainAllowList;
use cli::Cli;
use fetch::HttpFetcher;
use llm::JadeModel;
use pipeline::Pipeline;
use search::discover::discover_theme_seeds;
use search::google::{GoogleSearch, ServiceAccountKey};
use search::query::THEMES;
use store::JsonlStore;
use utils::ensure_writable_dir;

/// Flag cancellation on the first interrupt; returns `true` on a second.
///
/// Returns `false` if listening for the signal fails.
async fn watch_interrupts<F, Fut>(cancel: &AtomicBool, mut interrupted: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupted().await.is_err() {
        return false;
    }
    warn!("Interrupt received; finishing seeds already in progress (interrupt again to quit)");
    cancel.store(true, Ordering::SeqCst);
    interrupted().await.is_ok()
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newscomp starting up");

    let args = Cli::parse();
    debug!(?args.output_dir, ?args.themes, urls = args.urls.len(), workers = args.workers, "Parsed CLI arguments");

    // Early check: output dir must be writable before any network work
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let allowlist = match DomainAllowList::load(&args.allowed_domains).await {
        Ok(list) => list,
        Err(e) => {
            error!(error = %e, "Cannot run without an allow-list");
            return Err(e.into());
        }
    };

    // ---- Load model config & templates ----
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.yaml").to_string_lossy().into_owned(),
    };
    let config = config::load_config(&config_path)
        .map_err(|e| format!("failed to load config {config_path}: {e}"))?;
    info!(%config_path, "Loaded configuration");
    let model = JadeModel::load(config).await?;

    // ---- Collaborators ----
    let fetcher = HttpFetcher::new()?;
    let service_account = match args.google_service_account_key.as_deref() {
        Some(source) => match ServiceAccountKey::load(source).await {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable service-account key");
                None
            }
        },
        None => None,
    };
    let search = GoogleSearch::new(fetcher.client().clone(), args.google_cx.clone())
        .with_api_key(args.google_api_key.clone())
        .with_service_account(service_account);
    if !search.has_credentials() {
        warn!("No search credentials configured; every search will come back empty");
    }
    let store = JsonlStore::new(&args.output_dir);

    let batch_id = Uuid::new_v4().to_string();
    info!(%batch_id, "Starting batch");

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if watch_interrupts(&cancel, tokio::signal::ctrl_c).await {
                error!("Second interrupt received; exiting now");
                std::process::exit(130);
            }
        });
    }

    let pipeline = Pipeline {
        fetcher: &fetcher,
        search: &search,
        model: &model,
        store: &store,
        allowlist: &allowlist,
        batch_id: &batch_id,
        workers: args.workers.max(1),
        cancel: cancel.as_ref(),
    };

    // Explicit URLs bypass discovery and run under "All"
    let themes: Vec<String> = if !args.urls.is_empty() {
        vec!["All".to_string()]
    } else if args.themes.is_empty() {
        THEMES.iter().map(|t| t.to_string()).collect()
    } else {
        args.themes.clone()
    };
    for theme in themes.iter().filter(|t| !THEMES.contains(&t.as_str())) {
        warn!(%theme, "Unknown theme; its discovery query falls back to general news");
    }

    let today = Utc::now().date_naive();
    let mut summaries = Vec::with_capacity(themes.len());
    for theme in &themes {
        if cancel.load(Ordering::SeqCst) {
            warn!(%theme, "Cancelled; skipping remaining themes");
            break;
        }
        let seeds = if args.urls.is_empty() {
            discover_theme_seeds(&fetcher, &search, theme, today).await
        } else {
            args.urls.clone()
        };
        if seeds.is_empty() {
            warn!(%theme, "No seed URLs for theme");
        }
        summaries.push(pipeline.process_theme(theme, &seeds, &args.output_dir).await);
    }

    let total: usize = summaries.iter().map(|s| s.total).sum();
    let valid: usize = summaries.iter().map(|s| s.valid).sum();
    let stored: usize = summaries.iter().map(|s| s.stored).sum();
    info!(
        %batch_id,
        themes = summaries.len(),
        total,
        valid,
        stored,
        store = %store.path().display(),
        elapsed_secs = start_time.elapsed().as_secs(),
        "newscomp finished"
    );

    Ok(())
}
