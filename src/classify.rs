//! URL-shape heuristics for telling articles from listing pages.
//!
//! [`is_section_page`] and [`looks_like_article`] are independent: a URL can
//! match both or neither. Callers treat a URL that is not a section page as
//! an article, which includes the "neither" case.

use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/news/[^/]*/?$",
        r"/topics/[^/]*/?$",
        r"/category/[^/]*/?$",
        r"/section/[^/]*/?$",
        r"/[^/]*/diplomacy/?$",
        r"/[^/]*/politics/?$",
        r"/[^/]*/business/?$",
        r"/tag/[^/]*/?$",
        r"/latest/?$",
        r"/breaking/?$",
        r"/home/?$",
        r"/$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static section pattern"))
    .collect()
});

static ARTICLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/\d{4}/\d{2}/\d{2}/",
        r"(?i)/news/",
        r"(?i)/[a-z-]+-\d{7,}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static article pattern"))
    .collect()
});

static MEDIA_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|svg|pdf)$").expect("static media pattern"));

/// Whether `url` looks like a listing/category page rather than one story.
pub fn is_section_page(url: &str) -> bool {
    SECTION_PATTERNS.iter().any(|re| re.is_match(url))
}

/// Whether `url` carries one of the usual article markers: a date path, a
/// `/news/` segment, or a slug ending in a long numeric id.
pub fn looks_like_article(url: &str) -> bool {
    ARTICLE_PATTERNS.iter().any(|re| re.is_match(url))
}

/// Whether `url` points at an image or document rather than a page.
pub fn is_media_link(url: &str) -> bool {
    MEDIA_EXTENSION.is_match(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_pages() {
        for url in [
            "https://www.reuters.com/news/politics",
            "https://www.reuters.com/news/business/",
            "https://www.nbcnews.com/topics/china-russia-relations",
            "https://example.com/category/politics",
            "https://www.nytimes.com/section/world",
            "https://www.state.gov/news/us/diplomacy",
            "https://www.theguardian.com/tag/trump",
            "https://www.foxnews.com/latest",
            "https://www.cnn.com/breaking/",
            "https://www.bbc.com/home",
            "https://www.npr.org/",
        ] {
            assert!(is_section_page(url), "expected section page: {url}");
        }
    }

    #[test]
    fn test_article_markers() {
        assert!(looks_like_article("https://www.cnn.com/2025/05/06/politics/story"));
        assert!(looks_like_article("https://www.bbc.com/news/articles/c0kzl"));
        assert!(looks_like_article("https://www.foxnews.com/world/summit-talks-1234567"));
        assert!(!looks_like_article("https://apnews.com/article/summit-talks"));
    }

    #[test]
    fn test_ambiguous_urls_match_neither() {
        let url = "https://apnews.com/article/summit-talks-abc123";
        assert!(!is_section_page(url));
        assert!(!looks_like_article(url));
    }

    #[test]
    fn test_heuristics_can_overlap() {
        let url = "https://www.reuters.com/news/world-election";
        assert!(is_section_page(url));
        assert!(looks_like_article(url));
    }

    #[test]
    fn test_classification_is_pure() {
        let url = "https://www.bbc.com/news/world-us-canada-12345678";
        let first = (is_section_page(url), looks_like_article(url));
        for _ in 0..5 {
            assert_eq!((is_section_page(url), looks_like_article(url)), first);
        }
    }

    #[test]
    fn test_media_links() {
        assert!(is_media_link("https://cdn.example.com/photo.JPG"));
        assert!(is_media_link("https://example.com/report.pdf"));
        assert!(!is_media_link("https://example.com/story.html"));
    }
}
