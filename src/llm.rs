//! Model collaborators: concept extraction, link selection, bias analysis.
//!
//! The pipeline only talks to the model through the three traits below, so
//! orchestration can be tested with canned answers. [`JadeModel`] is the
//! production implementation: each request shape has its own `awful_aj`
//! chat template (system prompt and response format), and the user message
//! is built here.
//!
//! | Trait | Template | Response |
//! |-------|----------|----------|
//! | [`ConceptExtractor`] | `bias_concepts` | JSON object |
//! | [`RelevanceSelector`] | `bias_link_selector` | a number or `NONE` |
//! | [`BiasAnalyzer`] | `bias_analyzer` | JSON object, possibly fenced |

use crate::analysis::normalize_model_json;
use crate::api::ask_with_backoff;
use crate::models::{Concepts, ScrapedArticle};
use crate::scrapers::links::LinkCandidate;
use crate::utils::{take_chars, truncate_for_log};
use awful_aj::{config::AwfulJadeConfig, template, template::ChatTemplate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use tracing::{debug, info, instrument};

/// Characters of article text sent to the analyzer per article.
pub const MAX_ANALYSIS_CHARS: usize = 40_000;

/// Retries for each model request.
const MAX_RETRIES: usize = 3;

static DATE_OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(after|before):\d{4}-\d{2}-\d{2}\b").expect("static date operator"));

/// Turns seed metadata into [`Concepts`].
pub trait ConceptExtractor {
    async fn extract_concepts(
        &self,
        title: &str,
        description: &str,
    ) -> Result<Concepts, Box<dyn Error>>;
}

/// Picks the candidate most relevant to a query.
///
/// Returns the model's raw answer: a 1-based index or `NONE`. Interpreting it
/// is the caller's job (see [`parse_selection`]).
pub trait RelevanceSelector {
    async fn select_relevant_link(
        &self,
        candidates: &[LinkCandidate],
        query: &str,
    ) -> Result<String, Box<dyn Error>>;
}

/// Produces the raw bias comparison for a set of scraped articles.
pub trait BiasAnalyzer {
    async fn analyze(
        &self,
        articles: &[ScrapedArticle],
        single_source: bool,
    ) -> Result<String, Box<dyn Error>>;
}

/// Remove `after:YYYY-MM-DD` / `before:YYYY-MM-DD` operators from a query.
pub fn clean_query(query: &str) -> String {
    let stripped = DATE_OPERATOR.replace_all(query, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Interpret a selector answer against `count` candidates.
///
/// Returns the 0-based index, or `None` for `NONE`, a non-numeric answer or
/// an index out of range. Leading digits are enough (`"3."` selects 3).
pub fn parse_selection(answer: &str, count: usize) -> Option<usize> {
    let answer = answer.trim().trim_matches(|c| c == '"' || c == '\'');
    if answer.eq_ignore_ascii_case("none") {
        return None;
    }
    let digits: String = answer.chars().take_while(char::is_ascii_digit).collect();
    let n: usize = digits.parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}

pub fn concepts_prompt(title: &str, description: &str) -> String {
    format!(
        "Article Title: \"{title}\"\n\
         Article Description: \"{description}\"\n\n\
         Return ONLY a JSON object with the keys \"entities\" (at most 5 specific \
         people, organizations or places), \"topic\" (a 3-5 word phrase) and \
         \"keywords\" (2-3 essential keywords or short phrases)."
    )
}

pub fn selection_prompt(candidates: &[LinkCandidate], query: &str) -> String {
    let listing = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. URL: {}\n   Title: {}\n   Context: {}",
                i + 1,
                c.href,
                c.text,
                c.context
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Search Query: \"{query}\"\n\n\
         Article Candidates:\n{listing}\n\n\
         Prefer recent, specific news articles over category pages, podcasts and video. \
         Return ONLY the number (1-{n}) of the most relevant article, or \"NONE\" if \
         no candidate is clearly relevant.",
        n = candidates.len()
    )
}

#[derive(Serialize)]
struct AnalysisPayload<'a> {
    source: &'a str,
    title: &'a str,
    text: String,
}

pub fn analysis_prompt(articles: &[ScrapedArticle], single_source: bool) -> String {
    let payload: Vec<AnalysisPayload<'_>> = articles
        .iter()
        .map(|a| AnalysisPayload {
            source: &a.source,
            title: &a.title,
            text: take_chars(&a.text, MAX_ANALYSIS_CHARS),
        })
        .collect();
    let articles_json = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "[]".into());

    let mut prompt = format!("Here are the articles:\n\n{articles_json}\n");
    if single_source {
        prompt.push_str(
            "\nOnly one distinct article is available. Do not write the report as a \
             comparison between sources; analyze it as a single article, and include in \
             \"recommendations\" that readers should seek additional perspectives.\n",
        );
    }
    prompt.push_str(
        "\nReturn the report as a single JSON object with the keys summary, bias, \
         bias_rating, bias_direction, sources_agree_on, conclusion, recommendations, \
         reasoning and topic.\n",
    );
    prompt
}

/// Model collaborators backed by `awful_aj` templates.
pub struct JadeModel {
    config: AwfulJadeConfig,
    concepts: ChatTemplate,
    selector: ChatTemplate,
    analyzer: ChatTemplate,
}

impl JadeModel {
    pub const CONCEPTS_TEMPLATE: &'static str = "bias_concepts";
    pub const SELECTOR_TEMPLATE: &'static str = "bias_link_selector";
    pub const ANALYZER_TEMPLATE: &'static str = "bias_analyzer";

    /// Load the three named templates from the `awful_aj` config directory.
    pub async fn load(config: AwfulJadeConfig) -> Result<Self, Box<dyn Error>> {
        let concepts = template::load_template(Self::CONCEPTS_TEMPLATE).await?;
        let selector = template::load_template(Self::SELECTOR_TEMPLATE).await?;
        let analyzer = template::load_template(Self::ANALYZER_TEMPLATE).await?;
        info!("Loaded model templates");
        Ok(Self {
            config,
            concepts,
            selector,
            analyzer,
        })
    }
}

impl ConceptExtractor for JadeModel {
    #[instrument(level = "info", skip_all)]
    async fn extract_concepts(
        &self,
        title: &str,
        description: &str,
    ) -> Result<Concepts, Box<dyn Error>> {
        let prompt = concepts_prompt(title, description);
        let raw = ask_with_backoff(&self.config, &prompt, &self.concepts, MAX_RETRIES).await?;
        let concepts = normalize_model_json::<Concepts>(&raw)?.clamp();
        debug!(?concepts, "Extracted concepts");
        Ok(concepts)
    }
}

impl RelevanceSelector for JadeModel {
    #[instrument(level = "info", skip_all, fields(candidates = candidates.len()))]
    async fn select_relevant_link(
        &self,
        candidates: &[LinkCandidate],
        query: &str,
    ) -> Result<String, Box<dyn Error>> {
        let prompt = selection_prompt(candidates, query);
        let answer = ask_with_backoff(&self.config, &prompt, &self.selector, MAX_RETRIES).await?;
        debug!(answer = %truncate_for_log(&answer, 40), "Selector answered");
        Ok(answer)
    }
}

impl BiasAnalyzer for JadeModel {
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), single_source))]
    async fn analyze(
        &self,
        articles: &[ScrapedArticle],
        single_source: bool,
    ) -> Result<String, Box<dyn Error>> {
        let prompt = analysis_prompt(articles, single_source);
        ask_with_backoff(&self.config, &prompt, &self.analyzer, MAX_RETRIES).await
    }
}
