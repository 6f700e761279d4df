//! Trusted source domains.
//!
//! The allow-list is loaded once per run and then only read. Every stage that
//! accepts a URL (seed check, candidate filtering, final re-filtering of a
//! record's related articles) consults the same [`DomainAllowList`].
//!
//! # File Format
//!
//! Either a YAML sequence:
//!
//! ```yaml
//! - apnews.com
//! - bbc.com
//! ```
//!
//! or plain text with one domain per line (`#` starts a comment).

use crate::utils::host_without_www;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};

/// Reasons the allow-list could not be built. All of them end the run.
#[derive(Debug, Error)]
pub enum AllowListError {
    #[error("failed to read allow-list {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("allow-list {0} contains no domains")]
    Empty(String),
}

/// Read-only set of trusted registrable domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAllowList {
    domains: Vec<String>,
}

impl DomainAllowList {
    /// Build from an iterator of domains; entries are trimmed, lowercased and
    /// stripped of `www.`. Blank entries are ignored.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut domains: Vec<String> = domains
            .into_iter()
            .map(|d| {
                let d = d.as_ref().trim().to_ascii_lowercase();
                d.strip_prefix("www.").map(str::to_string).unwrap_or(d)
            })
            .filter(|d| !d.is_empty())
            .collect();
        domains.sort();
        domains.dedup();
        Self { domains }
    }

    /// Load the allow-list from a YAML list or a newline-separated file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AllowListError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AllowListError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let list = Self::parse(&raw);
        if list.is_empty() {
            return Err(AllowListError::Empty(path.display().to_string()));
        }
        info!(count = list.len(), "Loaded allowed domains");
        Ok(list)
    }

    fn parse(raw: &str) -> Self {
        if let Ok(entries) = serde_yaml::from_str::<Vec<String>>(raw) {
            return Self::new(entries);
        }
        Self::new(
            raw.lines()
                .map(|l| l.split('#').next().unwrap_or_default())
                .map(|l| l.trim_start_matches('-').trim()),
        )
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Whether `host` (already stripped of `www.`) ends with an allowed domain.
    pub fn is_allowed(&self, host: &str) -> bool {
        self.matching_domain(host).is_some()
    }

    /// The allowed domain `host` matched, preferring the longest entry.
    ///
    /// This is the apex used to tell outlets apart: `edition.cnn.com` and
    /// `cnn.com` both resolve to `cnn.com`.
    pub fn matching_domain(&self, host: &str) -> Option<&str> {
        let host = host.to_ascii_lowercase();
        self.domains
            .iter()
            .filter(|d| host.ends_with(d.as_str()))
            .max_by_key(|d| d.len())
            .map(String::as_str)
    }

    /// Convenience check on a full URL. Unparseable URLs are not allowed.
    pub fn allows_url(&self, url: &str) -> bool {
        host_without_www(url).is_some_and(|h| self.is_allowed(&h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_suffix_matching() {
        let list = DomainAllowList::new(["cnn.com", "www.BBC.co.uk", ""]);
        assert_eq!(list.len(), 2);
        assert!(list.is_allowed("cnn.com"));
        assert!(list.is_allowed("edition.cnn.com"));
        assert!(list.is_allowed("bbc.co.uk"));
        assert!(!list.is_allowed("example.test"));
    }

    #[test]
    fn test_matching_domain_prefers_longest() {
        let list = DomainAllowList::new(["co.uk", "bbc.co.uk"]);
        assert_eq!(list.matching_domain("news.bbc.co.uk"), Some("bbc.co.uk"));
        assert_eq!(list.matching_domain("guardian.co.uk"), Some("co.uk"));
        assert_eq!(list.matching_domain("example.test"), None);
    }

    #[test]
    fn test_allows_url() {
        let list = DomainAllowList::new(["apnews.com"]);
        assert!(list.allows_url("https://www.apnews.com/article/x"));
        assert!(!list.allows_url("https://example.test/a"));
        assert!(!list.allows_url("::not a url::"));
    }

    #[test]
    fn test_parse_yaml_and_plain() {
        let yaml = DomainAllowList::parse("- apnews.com\n- reuters.com\n");
        assert_eq!(yaml, DomainAllowList::new(["apnews.com", "reuters.com"]));

        let plain = DomainAllowList::parse("# trusted\napnews.com\n\nreuters.com # wire\n");
        assert_eq!(plain, DomainAllowList::new(["apnews.com", "reuters.com"]));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_error() {
        let err = DomainAllowList::load("/definitely/not/here.yaml").await.unwrap_err();
        assert!(matches!(err, AllowListError::Read { .. }));
    }

    #[tokio::test]
    async fn test_load_empty_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here").unwrap();
        let err = DomainAllowList::load(file.path()).await.unwrap_err();
        assert!(matches!(err, AllowListError::Empty(_)));
    }

    #[tokio::test]
    async fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- npr.org\n- bbc.com").unwrap();
        let list = DomainAllowList::load(file.path()).await.unwrap();
        assert!(list.is_allowed("text.npr.org"));
    }
}
