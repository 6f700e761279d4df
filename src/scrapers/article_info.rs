//! Seed article metadata extraction.
//!
//! Pages are inconsistent about where they put their headline, summary,
//! lead image and byline, so every field is resolved through an ordered list
//! of fallbacks: structured metadata first, then headings, then class-name
//! guesses, then whatever is largest on the page.

use super::{element_text, first_attr, first_text};
use crate::fetch::PageFetcher;
use crate::models::{SeedArticle, TITLE_PLACEHOLDER};
use crate::utils::take_chars;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

static METADATA_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"window\.(\w+)\.metadata\s*=\s*(\{[\s\S]*?\});").expect("static metadata pattern")
});

/// Fetch `url` and extract its metadata.
///
/// Network or parse failures return a [`SeedArticle`] whose fields (other
/// than `url`) are all empty; callers treat an empty title as a soft failure.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn extract_article_info<F: PageFetcher>(fetcher: &F, url: &str) -> SeedArticle {
    match fetcher.fetch(url).await {
        Ok(html) => {
            let info = parse_article_info(&html, url);
            debug!(title = %info.title, has_image = !info.image_url.is_empty(), "Extracted article info");
            info
        }
        Err(e) => {
            warn!(error = %e, "Error extracting article info");
            SeedArticle {
                url: url.to_string(),
                ..Default::default()
            }
        }
    }
}

/// Extract metadata from already fetched HTML.
pub fn parse_article_info(html: &str, url: &str) -> SeedArticle {
    let doc = Html::parse_document(html);
    SeedArticle {
        url: url.to_string(),
        title: extract_title(&doc),
        description: extract_description(&doc),
        image_url: extract_image(&doc, url),
        author: extract_author(&doc),
    }
}

fn extract_title(doc: &Html) -> String {
    first_attr(doc, r#"meta[property="og:title"]"#, "content")
        .or_else(|| first_attr(doc, r#"meta[name="twitter:title"]"#, "content"))
        .or_else(|| first_text(doc, "title"))
        .or_else(|| first_text(doc, "h1"))
        .or_else(|| first_text(doc, "h2"))
        .or_else(|| first_text(doc, "header"))
        .or_else(|| first_text(doc, "article h1"))
        .or_else(|| first_text(doc, "article h2"))
        .or_else(|| class_contains_text(doc, "div", "title"))
        .or_else(|| class_contains_text(doc, "div", "headline"))
        .or_else(|| class_contains_text(doc, "span", "title"))
        .or_else(|| class_contains_text(doc, "span", "headline"))
        .or_else(|| longest_text(doc, "b, strong"))
        .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string())
}

fn extract_description(doc: &Html) -> String {
    first_attr(doc, r#"meta[property="og:description"]"#, "content")
        .or_else(|| first_attr(doc, r#"meta[name="description"]"#, "content"))
        .or_else(|| first_attr(doc, r#"meta[name="twitter:description"]"#, "content"))
        .or_else(|| first_text(doc, "p"))
        .or_else(|| first_text(doc, "article p"))
        .or_else(|| class_contains_text(doc, "div", "summary"))
        .or_else(|| class_contains_text(doc, "div", "description"))
        .or_else(|| class_contains_text(doc, "section", "summary"))
        .or_else(|| class_contains_text(doc, "section", "description"))
        .or_else(|| class_contains_text(doc, "span", "summary"))
        .or_else(|| class_contains_text(doc, "span", "description"))
        .or_else(|| first_text(doc, "blockquote"))
        .or_else(|| first_text(doc, "li"))
        .or_else(|| first_text(doc, "body").map(|t| take_chars(&t, 200)))
        .unwrap_or_default()
}

fn extract_image(doc: &Html, page_url: &str) -> String {
    let found = first_attr(doc, r#"meta[property="og:image"]"#, "content")
        .or_else(|| first_attr(doc, r#"meta[name="twitter:image"]"#, "content"))
        .or_else(|| first_attr(doc, r#"link[rel="image_src"]"#, "href"))
        .or_else(|| first_attr(doc, r#"meta[itemprop="image"]"#, "content"))
        .or_else(|| img_where(doc, |alt, _| contains_ci(alt, "article")))
        .or_else(|| img_where(doc, |alt, _| contains_ci(alt, "news")))
        .or_else(|| img_where(doc, |_, src| contains_ci(src, "article")))
        .or_else(|| img_where(doc, |_, src| contains_ci(src, "news")))
        .or_else(|| img_where(doc, |_, _| true))
        .or_else(|| largest_image(doc));

    match found {
        Some(src) => absolutize(page_url, &src),
        None => String::new(),
    }
}

fn extract_author(doc: &Html) -> String {
    first_attr(doc, r#"meta[name="author"]"#, "content")
        .or_else(|| first_attr(doc, r#"meta[property="article:author"]"#, "content"))
        .or_else(|| first_attr(doc, r#"meta[name="twitter:creator"]"#, "content"))
        .or_else(|| author_from_scripts(doc))
        .unwrap_or_default()
}

/// Text of the first `tag` whose class attribute contains `needle`,
/// case-insensitively.
fn class_contains_text(doc: &Html, tag: &str, needle: &str) -> Option<String> {
    let selector = Selector::parse(&format!("{tag}[class]")).ok()?;
    doc.select(&selector)
        .find(|el| el.value().attr("class").is_some_and(|c| contains_ci(c, needle)))
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn longest_text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .max_by_key(|t| t.len())
}

/// `src` of the first image whose `(alt, src)` satisfies `pred`.
fn img_where(doc: &Html, pred: impl Fn(&str, &str) -> bool) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    doc.select(&selector)
        .filter_map(|el| {
            let src = el.value().attr("src")?.trim();
            let alt = el.value().attr("alt").unwrap_or_default();
            (!src.is_empty() && pred(alt, src)).then(|| src.to_string())
        })
        .next()
}

/// The image with the largest declared `width × height`.
fn largest_image(doc: &Html) -> Option<String> {
    let selector = Selector::parse("img").ok()?;
    doc.select(&selector)
        .filter_map(|el| {
            let v = el.value();
            let src = v.attr("src").or_else(|| v.attr("data-src"))?.trim();
            let dim = |name: &str| v.attr(name).and_then(|s| s.trim().parse::<u64>().ok());
            let area = dim("width").unwrap_or(0).saturating_mul(dim("height").unwrap_or(0));
            (!src.is_empty() && area > 0).then(|| (area, src.to_string()))
        })
        .max_by_key(|(area, _)| *area)
        .map(|(_, src)| src)
}

/// Look for `window.<x>.metadata = {...};` blobs that carry a byline.
fn author_from_scripts(doc: &Html) -> Option<String> {
    let selector = Selector::parse("script").ok()?;
    for script in doc.select(&selector) {
        let text = script.text().collect::<String>();
        let Some(caps) = METADATA_SCRIPT.captures(&text) else {
            continue;
        };
        let Ok(metadata) = serde_json::from_str::<Value>(&caps[2]) else {
            continue;
        };
        let Some(content) = metadata.get("content") else {
            continue;
        };
        match content.get("author") {
            Some(Value::Array(names)) if !names.is_empty() => {
                let joined = names
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if !joined.is_empty() {
                    return Some(joined);
                }
            }
            Some(Value::String(name)) if !name.trim().is_empty() => {
                return Some(name.trim().to_string());
            }
            _ => {}
        }
        if let Some(byline) = content.get("byline").and_then(Value::as_str) {
            if !byline.trim().is_empty() {
                return Some(byline.trim().to_string());
            }
        }
    }
    None
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn absolutize(base: &str, src: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(src))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| src.to_string())
}
