//! Bias analysis: request, normalization, and the single-source rule.
//!
//! Model answers arrive as text that is supposed to be a JSON object but is
//! often wrapped in a Markdown code fence, and occasionally cut short or not
//! JSON at all. [`normalize_model_json`] is the one place that turns such
//! text into a typed value.

use crate::llm::BiasAnalyzer;
use crate::models::{AnalysisResult, ScrapedArticle};
use crate::utils::{looks_truncated, truncate_for_log};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Sentence appended when a single-source analysis lacks the advice.
pub const SEEK_PERSPECTIVES: &str =
    "Readers should seek additional perspectives from other outlets, since only one source was available for this story.";

/// Model output that could not be turned into the expected value.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{error}")]
pub struct ModelJsonError {
    /// Parser message.
    pub error: String,
    /// The text the model returned.
    pub raw: String,
    /// The text ended before the JSON value did.
    pub truncated: bool,
}

/// Why no [`AnalysisResult`] came out of the analyzer.
#[derive(Debug, Error)]
pub enum AnalysisFailure {
    #[error("Analysis request failed: {0}")]
    Request(String),
    #[error("Failed to parse analysis: {}", .0.error)]
    Parse(ModelJsonError),
}

impl AnalysisFailure {
    pub fn raw(&self) -> Option<&str> {
        match self {
            AnalysisFailure::Request(_) => None,
            AnalysisFailure::Parse(e) => Some(&e.raw),
        }
    }
}

/// Remove one leading ```` ```json ```` / ```` ``` ```` marker and one
/// trailing ```` ``` ```` marker, trimming whitespace around them.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        let rest = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }
    s
}

/// Parse model text as `T` after stripping a code fence.
pub fn normalize_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, ModelJsonError> {
    serde_json::from_str::<T>(strip_code_fence(raw)).map_err(|e| ModelJsonError {
        error: e.to_string(),
        raw: raw.to_string(),
        truncated: looks_truncated(&e),
    })
}

/// Articles with distinct, non-empty text.
///
/// Copies of the same article (the seed syndicated under another URL, say)
/// count once.
pub fn usable_article_count(articles: &[ScrapedArticle]) -> usize {
    articles
        .iter()
        .filter(|a| a.has_text())
        .unique_by(|a| a.text.trim().to_lowercase())
        .count()
}

/// Make sure a single-source analysis tells readers to look further.
pub fn ensure_single_source_guidance(analysis: &mut AnalysisResult) {
    if analysis
        .recommendations
        .to_lowercase()
        .contains("additional perspectives")
    {
        return;
    }
    if analysis.recommendations.trim().is_empty() {
        analysis.recommendations = SEEK_PERSPECTIVES.to_string();
    } else {
        analysis.recommendations = format!("{} {}", analysis.recommendations.trim_end(), SEEK_PERSPECTIVES);
    }
}

/// Ask `analyzer` for a comparison of `articles` and normalize the answer.
///
/// A truncated answer is re-requested once. With one usable article or fewer
/// the single-source rule applies to both the request and the result.
#[instrument(level = "info", skip_all, fields(articles = articles.len()))]
pub async fn analyze_articles<A: BiasAnalyzer>(
    analyzer: &A,
    articles: &[ScrapedArticle],
) -> Result<AnalysisResult, AnalysisFailure> {
    let single_source = usable_article_count(articles) <= 1;

    let raw = analyzer
        .analyze(articles, single_source)
        .await
        .map_err(|e| AnalysisFailure::Request(e.to_string()))?;

    let mut parsed = normalize_model_json::<AnalysisResult>(&raw);
    if let Err(e) = &parsed {
        if e.truncated {
            warn!(error = %e, "EOF while parsing analysis; re-asking once");
            match analyzer.analyze(articles, single_source).await {
                Ok(raw2) => parsed = normalize_model_json::<AnalysisResult>(&raw2),
                Err(e2) => warn!(error = %e2, "Re-ask failed"),
            }
        }
    }

    let mut analysis = parsed.map_err(|e| {
        warn!(
            error = %e,
            response_preview = %truncate_for_log(&e.raw, 300),
            "Model returned non-conforming JSON"
        );
        AnalysisFailure::Parse(e)
    })?;

    if single_source {
        ensure_single_source_guidance(&mut analysis);
    }
    info!(
        sources = analysis.bias.len(),
        single_source,
        topic = %analysis.topic,
        "Analysis parsed"
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeModel, scraped};

    const ANALYSIS: &str = r#"{"summary":"x","bias":[{"source":"CNN","title":"T","bias_rating":2,"bias_direction":"neutral","bias_analysis":"Straight reporting."}],"bias_rating":2,"bias_direction":"neutral","sources_agree_on":"facts","conclusion":"c","recommendations":"r","reasoning":"why","topic":"politics"}"#;

    #[test]
    fn test_fenced_json_parses_like_plain_json() {
        let fenced = format!("```json\n{ANALYSIS}\n```");
        let plain: AnalysisResult = normalize_model_json(ANALYSIS).unwrap();
        let unwrapped: AnalysisResult = normalize_model_json(&fenced).unwrap();
        assert_eq!(plain, unwrapped);
        assert_eq!(unwrapped.summary, "x");
        assert_eq!(unwrapped.bias.len(), 1);
    }

    #[test]
    fn test_bare_fence_and_surrounding_whitespace() {
        let fenced = format!("\n  ```\n{ANALYSIS}\n```  \n");
        let parsed: AnalysisResult = normalize_model_json(&fenced).unwrap();
        assert_eq!(parsed.topic, "politics");

        let upper = format!("```JSON\n{ANALYSIS}```");
        assert!(normalize_model_json::<AnalysisResult>(&upper).is_ok());
    }

    #[test]
    fn test_invalid_json_surfaces_raw_text() {
        let raw = "**Bob's Summary:** the sources broadly agree.";
        let err = normalize_model_json::<AnalysisResult>(raw).unwrap_err();
        assert_eq!(err.raw, raw);
        assert!(!err.truncated);
        assert!(!err.error.is_empty());
    }

    #[test]
    fn test_truncated_json_is_flagged() {
        let err = normalize_model_json::<AnalysisResult>(r#"{"summary": "cut of"#).unwrap_err();
        assert!(err.truncated);
    }

    #[test]
    fn test_usable_article_count_ignores_empty_and_duplicates() {
        let articles = vec![
            scraped("https://a.com/1", "Same story text"),
            scraped("https://b.com/2", "same story text "),
            scraped("https://c.com/3", ""),
        ];
        assert_eq!(usable_article_count(&articles), 1);

        let articles = vec![
            scraped("https://a.com/1", "One text"),
            scraped("https://b.com/2", "Another text"),
        ];
        assert_eq!(usable_article_count(&articles), 2);
    }

    #[test]
    fn test_guidance_is_appended_once() {
        let mut analysis = AnalysisResult {
            recommendations: "Check the primary sources.".into(),
            ..Default::default()
        };
        ensure_single_source_guidance(&mut analysis);
        assert!(analysis.recommendations.starts_with("Check the primary sources."));
        assert!(analysis.recommendations.contains("additional perspectives"));

        let before = analysis.recommendations.clone();
        ensure_single_source_guidance(&mut analysis);
        assert_eq!(analysis.recommendations, before);
    }

    #[tokio::test]
    async fn test_single_article_gets_perspectives_advice() {
        let model = FakeModel::default().with_analysis(&format!("```json\n{ANALYSIS}\n```"));
        let articles = vec![scraped("https://bbc.com/news/1", "Only article text")];

        let analysis = analyze_articles(&model, &articles).await.unwrap();

        assert!(analysis.recommendations.to_lowercase().contains("additional perspectives"));
        assert_eq!(model.single_source_flags(), vec![true]);
    }

    #[tokio::test]
    async fn test_multi_source_leaves_recommendations_alone() {
        let model = FakeModel::default().with_analysis(ANALYSIS);
        let articles = vec![
            scraped("https://bbc.com/news/1", "First text"),
            scraped("https://cnn.com/2025/05/06/x", "Second text"),
        ];

        let analysis = analyze_articles(&model, &articles).await.unwrap();

        assert_eq!(analysis.recommendations, "r");
        assert_eq!(model.single_source_flags(), vec![false]);
    }

    #[tokio::test]
    async fn test_truncated_answer_is_reasked_once() {
        let model = FakeModel::default()
            .with_analysis(r#"{"summary": "cut"#)
            .with_analysis(ANALYSIS);
        let articles = vec![
            scraped("https://a.com/1", "First text"),
            scraped("https://b.com/2", "Second text"),
        ];

        let analysis = analyze_articles(&model, &articles).await.unwrap();
        assert_eq!(analysis.summary, "x");
        assert_eq!(model.single_source_flags().len(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_answer_is_a_parse_failure() {
        let model = FakeModel::default().with_analysis("not json at all");
        let articles = vec![scraped("https://a.com/1", "text")];

        let err = analyze_articles(&model, &articles).await.unwrap_err();
        assert!(matches!(err, AnalysisFailure::Parse(_)));
        assert_eq!(err.raw(), Some("not json at all"));
        assert!(err.to_string().starts_with("Failed to parse analysis"));
    }
}
