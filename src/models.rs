//! Data models for seed articles, search candidates, and analysis records.
//!
//! This module defines the core data structures that flow through the pipeline:
//! - [`SeedArticle`]: Metadata of the article a comparison starts from
//! - [`Concepts`] and [`SearchParams`]: What the model thinks the story is about,
//!   and the search query built from it
//! - [`CandidateResult`], [`RelatedArticle`], [`ScrapedArticle`]: The stages a
//!   related story passes through before analysis
//! - [`AnalysisResult`]: The model's bias comparison, normalized
//! - [`PipelineRecord`] and [`SeedOutcome`]: What gets persisted and audited
//!
//! The analysis types use snake_case field names to match the JSON contract
//! given to the model in the `bias_analyzer` template.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Placeholder title produced when no title fallback matched.
pub const TITLE_PLACEHOLDER: &str = "Title not found";

/// Metadata describing the article a comparison starts from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedArticle {
    pub url: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub author: String,
}

/// Structured description of a story, as extracted by the model.
///
/// Bounds are enforced on receipt with [`Concepts::clamp`]: at most 5
/// entities and 3 keywords.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Concepts {
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Concepts {
    pub const MAX_ENTITIES: usize = 5;
    pub const MAX_KEYWORDS: usize = 3;

    /// Drop blank terms and truncate both lists to their bounds.
    pub fn clamp(mut self) -> Self {
        self.entities.retain(|e| !e.trim().is_empty());
        self.entities.truncate(Self::MAX_ENTITIES);
        self.keywords.retain(|k| !k.trim().is_empty());
        self.keywords.truncate(Self::MAX_KEYWORDS);
        self.topic = self.topic.trim().to_string();
        self
    }
}

/// Parameters handed to a [`crate::search::SearchProvider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Full query string, including any `-site:` exclusion.
    pub query: String,
    /// Recency window in Custom Search syntax (`d7` = last seven days).
    pub date_restrict: Option<String>,
    /// Sort order, `date` for most recent first.
    pub sort: Option<String>,
    /// Host excluded from results via `-site:`.
    pub exclude_domain: Option<String>,
}

/// A raw search-engine hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub link: String,
    pub title: String,
    pub snippet: String,
    /// Outlet name, when the provider reports one.
    pub source: Option<String>,
    /// Publication date, when the provider reports one.
    pub date: Option<String>,
}

/// Name of the outlet an article comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceName {
    pub name: String,
}

/// An allow-listed article selected for comparison, prior to scraping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedArticle {
    pub source: SourceName,
    pub title: String,
    pub url: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    /// Search snippet or seed description; replaced by scraped text when persisted.
    pub content: String,
}

/// A related article together with the text extracted from it.
///
/// `text` is empty when fetching or extraction failed; that means "no usable
/// content", not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedArticle {
    pub source: String,
    pub title: String,
    pub url: String,
    pub date: String,
    pub text: String,
}

impl ScrapedArticle {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A bias rating as the model returned it.
///
/// Models are asked for a 0-5 number but regularly answer with a label such
/// as `"moderate"`, so both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BiasRating {
    Score(f64),
    Label(String),
}

impl Default for BiasRating {
    fn default() -> Self {
        BiasRating::Label("unknown".to_string())
    }
}

impl fmt::Display for BiasRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiasRating::Score(n) => write!(f, "{n}"),
            BiasRating::Label(s) => f.write_str(s),
        }
    }
}

/// The model's assessment of one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBias {
    #[serde(default, deserialize_with = "lenient_text")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub bias_rating: BiasRating,
    #[serde(default = "unknown", deserialize_with = "lenient_text")]
    pub bias_direction: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub bias_analysis: String,
}

/// The model's comparison of all scraped sources for one story.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "lenient_bias_list")]
    pub bias: Vec<SourceBias>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub bias_rating: BiasRating,
    #[serde(default = "unknown", deserialize_with = "lenient_text")]
    pub bias_direction: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sources_agree_on: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub conclusion: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub recommendations: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reasoning: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub topic: String,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Accept a string, a list of strings, a number, or null for a text field.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    })
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<BiasRating, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().map(BiasRating::Score).unwrap_or_default(),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => BiasRating::Score(n),
            Err(_) => BiasRating::Label(s),
        },
        _ => BiasRating::default(),
    })
}

/// A single per-source object is accepted in place of a list.
fn lenient_bias_list<'de, D>(deserializer: D) -> Result<Vec<SourceBias>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<SourceBias>),
        One(SourceBias),
        Other(serde_json::Value),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(b) => vec![b],
        OneOrMany::Other(_) => Vec::new(),
    })
}

/// A related article as stored alongside a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRelated {
    pub source: String,
    pub title: String,
    pub url: String,
    pub content: String,
}

impl From<&ScrapedArticle> for StoredRelated {
    fn from(article: &ScrapedArticle) -> Self {
        StoredRelated {
            source: article.source.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            content: article.text.clone(),
        }
    }
}

/// The unit persisted for each seed URL that passes validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub analysis: Option<AnalysisResult>,
    pub related_articles: Vec<StoredRelated>,
    /// The search query that found the related articles.
    pub keywords: String,
    pub image_url: String,
    pub author: String,
    /// Host of the seed URL, without `www.`.
    pub source: String,
    pub topic: String,
    pub theme: String,
    /// Run date in `YYYY-MM-DD` format.
    pub news_date: String,
    pub batchid: String,
}

/// Result entry for one seed URL: either a record or the reason none was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedOutcome {
    Record(Box<PipelineRecord>),
    Failed {
        url: String,
        error: String,
        /// Raw model output, attached when the analysis could not be parsed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
}

impl SeedOutcome {
    pub fn url(&self) -> &str {
        match self {
            SeedOutcome::Record(r) => &r.url,
            SeedOutcome::Failed { url, .. } => url,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SeedOutcome::Record(_) => None,
            SeedOutcome::Failed { error, .. } => Some(error),
        }
    }
}

/// Totals reported at the end of each theme.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThemeSummary {
    pub theme: String,
    pub total: usize,
    pub analyzed: usize,
    pub valid: usize,
    pub stored: usize,
}
