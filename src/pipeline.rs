//! Per-seed discovery and analysis, and the per-theme batch around it.
//!
//! [`Pipeline::process_seed`] takes one seed URL through every stage:
//!
//! 1. **Domain check**: the seed must be allow-listed
//! 2. **Seed info**: title, description, image, author
//! 3. **Query**: concepts from the model, turned into search parameters
//! 4. **Discovery**: search, section resolution, one article per outlet
//! 5. **Scraping**: the seed plus related articles, first 200 words each
//! 6. **Analysis**: the model's bias comparison, normalized
//!
//! Any stage that cannot continue ends the seed with a [`SeedFailure`],
//! reported in the theme's result file; it never ends the batch.
//! [`Pipeline::process_theme`] runs the seeds through a bounded worker pool
//! and stores each record that passes validation as soon as it is ready.

use crate::allowlist::DomainAllowList;
use crate::analysis::{AnalysisFailure, analyze_articles};
use crate::fetch::PageFetcher;
use crate::llm::{BiasAnalyzer, ConceptExtractor, RelevanceSelector};
use crate::models::{
    PipelineRecord, RelatedArticle, SeedArticle, SeedOutcome, SourceName, StoredRelated,
    ThemeSummary,
};
use crate::outputs::json::write_theme_results;
use crate::scrapers::article_info::extract_article_info;
use crate::scrapers::content::{MAX_SCRAPED, scrape_articles};
use crate::search::SearchProvider;
use crate::search::discover::discover_related;
use crate::search::query::build_query;
use crate::store::RecordStore;
use crate::utils::{host_without_www, normalize_url};
use crate::validate::{is_valid, refilter_related};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Topic recorded when the analysis names none.
pub const DEFAULT_TOPIC: &str = "all";

/// Why a seed URL produced no record.
#[derive(Debug, Error)]
pub enum SeedFailure {
    #[error("Domain not allowed for analysis: {0}")]
    DomainNotAllowed(String),
    #[error("No related articles found")]
    NoRelatedArticles,
    #[error("No articles scraped")]
    NoArticlesScraped,
    #[error(transparent)]
    Analysis(#[from] AnalysisFailure),
}

impl SeedFailure {
    pub fn into_outcome(self, url: &str) -> SeedOutcome {
        let raw = match &self {
            SeedFailure::Analysis(e) => e.raw().map(str::to_string),
            _ => None,
        };
        SeedOutcome::Failed {
            url: url.to_string(),
            error: self.to_string(),
            raw,
        }
    }
}

/// What happened to one seed inside a theme run.
#[derive(Debug)]
struct SeedRun {
    outcome: SeedOutcome,
    valid: bool,
    stored: bool,
}

/// Prepend the seed article unless the same article (by origin and path) is
/// already among the related ones.
pub fn include_seed(related: &mut Vec<RelatedArticle>, seed: &SeedArticle, source: &str) {
    let seed_key = normalize_url(&seed.url);
    if related.iter().any(|r| normalize_url(&r.url) == seed_key) {
        return;
    }
    related.insert(
        0,
        RelatedArticle {
            source: SourceName {
                name: source.to_string(),
            },
            title: seed.title.clone(),
            url: seed.url.clone(),
            published_at: String::new(),
            content: seed.description.clone(),
        },
    );
}

/// Collaborators and run-wide settings shared by every seed.
pub struct Pipeline<'a, F, S, M, R> {
    pub fetcher: &'a F,
    pub search: &'a S,
    pub model: &'a M,
    pub store: &'a R,
    pub allowlist: &'a DomainAllowList,
    pub batch_id: &'a str,
    pub workers: usize,
    pub cancel: &'a AtomicBool,
}

impl<'a, F, S, M, R> Pipeline<'a, F, S, M, R>
where
    F: PageFetcher,
    S: SearchProvider,
    M: ConceptExtractor + RelevanceSelector + BiasAnalyzer,
    R: RecordStore,
{
    /// Run one seed URL to a record or a failure entry.
    #[instrument(level = "info", skip_all, fields(%url, %theme))]
    pub async fn process_seed(&self, url: &str, theme: &str) -> SeedOutcome {
        let outcome = match self.build_record(url, theme).await {
            Ok(record) => SeedOutcome::Record(Box::new(record)),
            Err(e) => e.into_outcome(url),
        };
        if let Some(error) = outcome.error() {
            warn!(%error, "Seed produced no record");
        }
        outcome
    }

    async fn build_record(&self, url: &str, theme: &str) -> Result<PipelineRecord, SeedFailure> {
        let host = host_without_www(url).unwrap_or_else(|| url.to_string());
        if !self.allowlist.is_allowed(&host) {
            return Err(SeedFailure::DomainNotAllowed(host));
        }

        let seed = extract_article_info(self.fetcher, url).await;
        info!(title = %seed.title, "Extracted seed info");

        let params = build_query(self.model, &seed).await;
        let hits = self.search.search(&params).await;
        let seed_outlet = self.allowlist.matching_domain(&host);
        let mut related = discover_related(
            self.fetcher,
            self.model,
            self.allowlist,
            &hits,
            &params.query,
            seed_outlet,
        )
        .await;
        if related.is_empty() {
            return Err(SeedFailure::NoRelatedArticles);
        }
        if self.allowlist.allows_url(&seed.url) {
            include_seed(&mut related, &seed, &host);
        }

        let scraped = scrape_articles(self.fetcher, &related, MAX_SCRAPED).await;
        if !scraped.iter().any(|a| a.has_text()) {
            return Err(SeedFailure::NoArticlesScraped);
        }

        let analysis = analyze_articles(self.model, &scraped).await?;

        let summary = if seed.description.trim().is_empty() {
            analysis.summary.clone()
        } else {
            seed.description.clone()
        };
        let topic = if analysis.topic.trim().is_empty() {
            DEFAULT_TOPIC.to_string()
        } else {
            analysis.topic.clone()
        };

        Ok(PipelineRecord {
            url: url.to_string(),
            title: seed.title,
            summary,
            analysis: Some(analysis),
            related_articles: scraped.iter().map(StoredRelated::from).collect(),
            keywords: params.query,
            image_url: seed.image_url,
            author: seed.author,
            source: host,
            topic,
            theme: theme.to_string(),
            news_date: Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            batchid: self.batch_id.to_string(),
        })
    }

    /// Validate and store a freshly built record.
    async fn persist(&self, outcome: &SeedOutcome) -> (bool, bool) {
        let SeedOutcome::Record(record) = outcome else {
            return (false, false);
        };
        let mut record = (**record).clone();
        refilter_related(&mut record, self.allowlist);
        if !is_valid(&record, self.allowlist) {
            return (false, false);
        }
        match self.store.insert(&record, self.batch_id).await {
            Ok(()) => (true, true),
            Err(e) => {
                error!(url = %outcome.url(), error = %e, "Failed to store record");
                (true, false)
            }
        }
    }

    /// Run every seed of a theme, store valid records, and write the theme's
    /// result file.
    ///
    /// Seeds go through at most `workers` at a time and results keep input
    /// order. Once cancellation is requested, seeds that have not started
    /// are skipped.
    #[instrument(level = "info", skip_all, fields(%theme, seeds = seeds.len(), workers = self.workers))]
    pub async fn process_theme(&self, theme: &str, seeds: &[String], output_dir: &str) -> ThemeSummary {
        let runs: Vec<Option<SeedRun>> = stream::iter(seeds.iter().enumerate())
            .map(|(i, url)| async move {
                if self.cancel.load(Ordering::SeqCst) {
                    info!(index = i, %url, "Cancelled; skipping seed");
                    return None;
                }
                let outcome = self.process_seed(url, theme).await;
                let (valid, stored) = self.persist(&outcome).await;
                Some(SeedRun { outcome, valid, stored })
            })
            .buffered(self.workers.max(1))
            .collect()
            .await;

        let runs: Vec<SeedRun> = runs.into_iter().flatten().collect();
        let summary = ThemeSummary {
            theme: theme.to_string(),
            total: seeds.len(),
            analyzed: runs
                .iter()
                .filter(|r| matches!(r.outcome, SeedOutcome::Record(_)))
                .count(),
            valid: runs.iter().filter(|r| r.valid).count(),
            stored: runs.iter().filter(|r| r.stored).count(),
        };

        let outcomes: Vec<SeedOutcome> = runs.into_iter().map(|r| r.outcome).collect();
        if let Err(e) = write_theme_results(&outcomes, output_dir, theme).await {
            error!(error = %e, "Failed to write theme results");
        }

        info!(
            total = summary.total,
            analyzed = summary.analyzed,
            valid = summary.valid,
            stored = summary.stored,
            "Theme complete"
        );
        summary
    }
}
