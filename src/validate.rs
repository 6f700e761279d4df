//! Quality gate applied to every record before it is stored.

use crate::allowlist::DomainAllowList;
use crate::models::{PipelineRecord, TITLE_PLACEHOLDER};
use thiserror::Error;
use tracing::{debug, warn};

pub const MIN_TITLE_CHARS: usize = 10;
pub const MIN_SUMMARY_CHARS: usize = 20;

/// One reason a record was not stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing url")]
    MissingUrl,
    #[error("missing title")]
    MissingTitle,
    #[error("title too short ({0} chars)")]
    ShortTitle(usize),
    #[error("title is the placeholder")]
    PlaceholderTitle,
    #[error("missing analysis")]
    MissingAnalysis,
    #[error("analysis summary too short ({0} chars)")]
    ShortSummary(usize),
    #[error("analysis has no per-source bias entries")]
    EmptyBias,
    #[error("no related articles from allowed domains")]
    NoAllowedRelated,
}

/// Drop related articles whose URL is outside the allow-list.
pub fn refilter_related(record: &mut PipelineRecord, allowlist: &DomainAllowList) {
    let before = record.related_articles.len();
    record
        .related_articles
        .retain(|a| allowlist.allows_url(&a.url));
    let dropped = before - record.related_articles.len();
    if dropped > 0 {
        debug!(url = %record.url, dropped, "Removed related articles outside the allow-list");
    }
}

/// Every reason `record` fails the gate, or `Ok(())`.
pub fn validate(record: &PipelineRecord, allowlist: &DomainAllowList) -> Result<(), Vec<Rejection>> {
    let mut reasons = Vec::new();

    if record.url.trim().is_empty() {
        reasons.push(Rejection::MissingUrl);
    }

    let title = record.title.trim();
    let title_len = title.chars().count();
    if title.is_empty() {
        reasons.push(Rejection::MissingTitle);
    } else if title == TITLE_PLACEHOLDER {
        reasons.push(Rejection::PlaceholderTitle);
    } else if title_len < MIN_TITLE_CHARS {
        reasons.push(Rejection::ShortTitle(title_len));
    }

    match &record.analysis {
        None => reasons.push(Rejection::MissingAnalysis),
        Some(analysis) => {
            let summary_len = analysis.summary.trim().chars().count();
            if summary_len < MIN_SUMMARY_CHARS {
                reasons.push(Rejection::ShortSummary(summary_len));
            }
            if analysis.bias.is_empty() {
                reasons.push(Rejection::EmptyBias);
            }
        }
    }

    if !record.related_articles.iter().any(|a| allowlist.allows_url(&a.url)) {
        reasons.push(Rejection::NoAllowedRelated);
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        let joined = reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        warn!(url = %record.url, reasons = %joined, "Record failed validation");
        Err(reasons)
    }
}

pub fn is_valid(record: &PipelineRecord, allowlist: &DomainAllowList) -> bool {
    validate(record, allowlist).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    fn allowlist() -> DomainAllowList {
        DomainAllowList::new(["bbc.com", "apnews.com"])
    }

    #[test]
    fn test_complete_record_passes() {
        assert_eq!(validate(&record("https://bbc.com/news/1"), &allowlist()), Ok(()));
    }

    #[test]
    fn test_every_reason_is_reported() {
        let mut r = record("");
        r.title = "Short".into();
        r.analysis = None;
        r.related_articles.clear();

        let reasons = validate(&r, &allowlist()).unwrap_err();
        assert_eq!(
            reasons,
            vec![
                Rejection::MissingUrl,
                Rejection::ShortTitle(5),
                Rejection::MissingAnalysis,
                Rejection::NoAllowedRelated,
            ]
        );
    }

    #[test]
    fn test_placeholder_title_and_empty_bias() {
        let mut r = record("https://bbc.com/news/1");
        r.title = TITLE_PLACEHOLDER.into();
        if let Some(a) = r.analysis.as_mut() {
            a.bias.clear();
        }
        let reasons = validate(&r, &allowlist()).unwrap_err();
        assert!(reasons.contains(&Rejection::PlaceholderTitle));
        assert!(reasons.contains(&Rejection::EmptyBias));
    }

    #[test]
    fn test_short_analysis_summary_rejected_despite_description() {
        let mut r = record("https://bbc.com/news/1");
        if let Some(a) = r.analysis.as_mut() {
            a.summary = "x".into();
        }
        assert!(r.summary.chars().count() >= MIN_SUMMARY_CHARS);

        assert_eq!(validate(&r, &allowlist()), Err(vec![Rejection::ShortSummary(1)]));
    }

    #[test]
    fn test_refilter_drops_disallowed_related() {
        let mut r = record("https://bbc.com/news/1");
        for a in r.related_articles.iter_mut() {
            a.url = "https://blog.example.test/2025/05/06/post".into();
        }
        assert!(!is_valid(&r, &allowlist()));

        refilter_related(&mut r, &allowlist());
        assert!(r.related_articles.is_empty());
    }
}
