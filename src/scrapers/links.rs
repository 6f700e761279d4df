//! Outbound link discovery on listing pages.

use super::element_text;
use crate::classify::{is_media_link, is_section_page, looks_like_article};
use crate::fetch::PageFetcher;
use crate::utils::take_chars;
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::error::Error;
use tracing::{info, instrument, warn};
use url::Url;

/// Most candidates handed to the model from one section page.
pub const MAX_LINK_CANDIDATES: usize = 80;

/// Link text must be longer than this many characters to count as a headline.
const MIN_LINK_TEXT: usize = 10;

/// Characters of surrounding text kept as context.
const CONTEXT_CHARS: usize = 200;

/// A link on a section page, with the text around it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCandidate {
    pub href: String,
    pub text: String,
    pub context: String,
}

/// Every absolute `http(s)` link on the page with its anchor text and the
/// text of its parent element.
fn absolute_links<'a>(doc: &'a Html, base: &'a Url) -> impl Iterator<Item = LinkCandidate> + 'a {
    let selector = Selector::parse("a[href]").expect("static anchor selector");
    doc.select(&selector)
        .filter_map(move |a| {
            let href = a.value().attr("href")?;
            let resolved = base.join(href.trim()).ok()?;
            let context = a
                .parent()
                .and_then(ElementRef::wrap)
                .map(element_text)
                .unwrap_or_default();
            Some(LinkCandidate {
                href: resolved.to_string(),
                text: element_text(a),
                context: take_chars(&context, CONTEXT_CHARS),
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
}

/// Links on a section page that could be the specific article we want.
///
/// Keeps absolute `http(s)` links that are not the page itself, carry no
/// fragment, are not media, are not section pages themselves and have
/// meaningful anchor text. Deduplicated by href, capped at
/// [`MAX_LINK_CANDIDATES`].
pub fn parse_link_candidates(html: &str, page_url: &str) -> Vec<LinkCandidate> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    absolute_links(&doc, &base)
        .filter(|c| {
            c.href.starts_with("http")
                && c.href != page_url
                && !c.href.contains('#')
                && !is_media_link(&c.href)
                && !is_section_page(&c.href)
                && c.text.chars().count() > MIN_LINK_TEXT
        })
        .unique_by(|c| c.href.clone())
        .take(MAX_LINK_CANDIDATES)
        .collect()
}

/// Fetch a section page and list its link candidates. Failures yield `[]`.
#[instrument(level = "info", skip_all, fields(%section_url))]
pub async fn fetch_link_candidates<F: PageFetcher>(
    fetcher: &F,
    section_url: &str,
) -> Vec<LinkCandidate> {
    match fetcher.fetch(section_url).await {
        Ok(html) => {
            let candidates = parse_link_candidates(&html, section_url);
            info!(count = candidates.len(), "Collected link candidates");
            candidates
        }
        Err(e) => {
            warn!(error = %e, "Failed to fetch section page");
            Vec::new()
        }
    }
}

/// Article-looking links on a page, deduplicated, in page order.
///
/// Used when a theme search lands on a listing page: every link that carries
/// an article marker becomes a potential seed URL.
pub fn parse_article_links(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    absolute_links(&doc, &base)
        .map(|c| c.href)
        .filter(|href| {
            href.starts_with("http")
                && href != page_url
                && !href.ends_with('/')
                && !href.contains('#')
                && !is_media_link(href)
                && looks_like_article(href)
        })
        .unique()
        .collect()
}

/// Fetch a page and list its article-looking links.
#[instrument(level = "info", skip_all, fields(%page_url))]
pub async fn find_all_article_links<F: PageFetcher>(
    fetcher: &F,
    page_url: &str,
) -> Result<Vec<String>, Box<dyn Error>> {
    let html = fetcher.fetch(page_url).await?;
    let links = parse_article_links(&html, page_url);
    info!(count = links.len(), "Found article links");
    Ok(links)
}
