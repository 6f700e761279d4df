//! Page scrapers: metadata, main text, and outbound links.
//!
//! Each scraper fetches through a [`crate::fetch::PageFetcher`] and parses the
//! HTML with `scraper`. None of them fail loudly: a page that cannot be
//! fetched or parsed yields empty strings or an empty list, and the caller
//! decides what that means for the seed URL being processed.
//!
//! | Module | Input | Output |
//! |--------|-------|--------|
//! | [`article_info`] | seed URL | title, description, image, author |
//! | [`content`] | article URL | first 200 words of readable text |
//! | [`links`] | section page URL | outbound link candidates with context |

pub mod article_info;
pub mod content;
pub mod links;

use scraper::{ElementRef, Html, Selector};

use crate::utils::collapse_whitespace;

/// Collapsed text of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Collapsed text of the first element matching `css`, if non-empty.
pub(crate) fn first_text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Trimmed value of `attr` on the first element matching `css`, if non-empty.
pub(crate) fn first_attr(doc: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
