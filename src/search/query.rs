//! Search query construction.

use crate::llm::ConceptExtractor;
use crate::models::{Concepts, SearchParams, SeedArticle, TITLE_PLACEHOLDER};
use chrono::{Duration, NaiveDate};
use tracing::{info, instrument, warn};
use url::Url;

/// Queries longer than this are logged; Custom Search starts ignoring terms
/// past roughly this point.
pub const QUERY_CHAR_BUDGET: usize = 500;

/// Recency window for related coverage.
pub const DEFAULT_DATE_RESTRICT: &str = "d7";

/// Query used when the seed page yields no usable title.
pub const FALLBACK_QUERY: &str = "latest news";

/// The fixed news themes a batch run walks through.
pub const THEMES: &[&str] = &[
    "All",
    "Sports",
    "Entertainment",
    "Science",
    "Environment",
    "Education",
    "Politics",
    "Tech",
    "Business",
    "Health",
    "World",
    "Breaking",
];

/// Compose search parameters from concepts, excluding the seed's own host.
///
/// Entities are quoted and joined with the topic; keywords become a quoted
/// `OR` group.
pub fn build_search_params(concepts: &Concepts, seed_url: &str) -> SearchParams {
    let mut terms: Vec<String> = concepts.entities.iter().map(|e| format!("\"{}\"", e.trim())).collect();
    if !concepts.topic.trim().is_empty() {
        terms.push(concepts.topic.trim().to_string());
    }
    let mut query = terms.join(" ");

    if !concepts.keywords.is_empty() {
        let group = concepts
            .keywords
            .iter()
            .map(|k| format!("\"{}\"", k.trim()))
            .collect::<Vec<_>>()
            .join(" OR ");
        query = format!("{query} ({group})").trim_start().to_string();
    }

    let exclude_domain = Url::parse(seed_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    if let Some(host) = &exclude_domain {
        query = format!("{query} -site:{host}").trim_start().to_string();
    }

    if query.chars().count() > QUERY_CHAR_BUDGET {
        warn!(len = query.chars().count(), budget = QUERY_CHAR_BUDGET, "Search query exceeds character budget");
    }

    SearchParams {
        query,
        date_restrict: Some(DEFAULT_DATE_RESTRICT.to_string()),
        sort: Some("date".to_string()),
        exclude_domain,
    }
}

/// Extract concepts from the seed and build its search parameters.
///
/// An empty seed title skips the model and searches for
/// [`FALLBACK_QUERY`]; a concept-model failure falls back to the title as
/// the topic.
#[instrument(level = "info", skip_all, fields(url = %seed.url))]
pub async fn build_query<C: ConceptExtractor>(extractor: &C, seed: &SeedArticle) -> SearchParams {
    if seed.title.trim().is_empty() || seed.title == TITLE_PLACEHOLDER {
        warn!("No title found, falling back to generic query");
        let concepts = Concepts {
            topic: FALLBACK_QUERY.to_string(),
            ..Default::default()
        };
        return build_search_params(&concepts, &seed.url);
    }

    let concepts = match extractor.extract_concepts(&seed.title, &seed.description).await {
        Ok(c) if !c.entities.is_empty() || !c.topic.is_empty() => c.clamp(),
        Ok(_) => {
            warn!("Concept extraction returned nothing; using the title");
            Concepts { topic: seed.title.clone(), ..Default::default() }
        }
        Err(e) => {
            warn!(error = %e, "Concept extraction failed; using the title");
            Concepts { topic: seed.title.clone(), ..Default::default() }
        }
    };

    let params = build_search_params(&concepts, &seed.url);
    info!(query = %params.query, "Built search query");
    params
}

fn theme_terms(theme: &str) -> &'static str {
    match theme {
        "Sports" => "sports OR athletics OR games",
        "Entertainment" => "entertainment OR movies OR music OR celebrities",
        "Science" => "science OR research OR discoveries",
        "Environment" => "environment OR climate change OR ecology",
        "Education" => "education OR schools OR universities",
        "Politics" => "politics",
        "Tech" => "technology OR tech",
        "Business" => "business",
        "Health" => "health",
        "World" => "world news OR international",
        "Breaking" => "breaking news OR latest news OR urgent updates",
        _ => "latest news OR breaking news OR current events",
    }
}

/// Query for discovering a theme's seed articles from the last two days.
pub fn theme_params(theme: &str, today: NaiveDate) -> SearchParams {
    let from = today - Duration::days(2);
    let query = format!(
        "{} after:{} before:{}",
        theme_terms(theme),
        from.format("%Y-%m-%d"),
        today.format("%Y-%m-%d")
    );
    SearchParams {
        query,
        date_restrict: None,
        sort: Some("date".to_string()),
        exclude_domain: None,
    }
}
