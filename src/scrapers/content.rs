//! Main-text extraction and the article scraper.
//!
//! Readable text is pulled out with a readability pass; pages readability
//! cannot make sense of fall back to the paragraphs inside `<article>` or
//! `<main>`. Only the first [`MAX_WORDS`] words are kept: the model needs
//! the gist of each article, not the whole thing.

use super::element_text;
use crate::fetch::PageFetcher;
use crate::models::{RelatedArticle, ScrapedArticle};
use crate::utils::first_words;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Words kept per scraped article.
pub const MAX_WORDS: usize = 200;

/// Articles scraped per seed URL.
pub const MAX_SCRAPED: usize = 4;

/// Fetch `url` and return the first [`MAX_WORDS`] words of its main text.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_article_text<F: PageFetcher>(
    fetcher: &F,
    url: &str,
) -> Result<String, Box<dyn Error>> {
    let html = fetcher.fetch(url).await?;
    let text = extract_main_text(&html, url)?;
    Ok(first_words(&text, MAX_WORDS))
}

/// Extract the readable body text from `html`.
pub fn extract_main_text(html: &str, url: &str) -> Result<String, Box<dyn Error>> {
    let parsed_url = Url::parse(url)?;
    match readability::extractor::extract(&mut html.as_bytes(), &parsed_url) {
        Ok(product) if !product.text.trim().is_empty() => return Ok(product.text),
        Ok(_) => debug!("Readability produced no text; falling back to paragraphs"),
        Err(e) => debug!(error = ?e, "Readability failed; falling back to paragraphs"),
    }
    Ok(paragraph_text(html))
}

/// Join the paragraphs of the first `<article>` or `<main>` region, or of the
/// whole document when neither exists.
fn paragraph_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(p) = Selector::parse("p") else {
        return String::new();
    };
    for region in ["article", "main", "[role=main]"] {
        let Ok(selector) = Selector::parse(region) else {
            continue;
        };
        if let Some(root) = doc.select(&selector).next() {
            let text = root.select(&p).map(element_text).collect::<Vec<_>>().join("\n");
            if !text.trim().is_empty() {
                return text;
            }
        }
    }
    doc.select(&p).map(element_text).collect::<Vec<_>>().join("\n")
}

/// Scrape at most `max` related articles.
///
/// Articles are processed in order and independently: a failed fetch or
/// extraction gives that article an empty `text` and the loop moves on.
#[instrument(level = "info", skip_all, fields(count = related.len(), max))]
pub async fn scrape_articles<F: PageFetcher>(
    fetcher: &F,
    related: &[RelatedArticle],
    max: usize,
) -> Vec<ScrapedArticle> {
    let mut out = Vec::with_capacity(related.len().min(max));
    for article in related.iter().take(max) {
        let text = match fetch_article_text(fetcher, &article.url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %article.url, error = %e, "Error fetching article content");
                String::new()
            }
        };
        out.push(ScrapedArticle {
            source: article.source.name.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            date: article.published_at.clone(),
            text,
        });
    }
    let with_text = out.iter().filter(|a| a.has_text()).count();
    info!(scraped = out.len(), with_text, "Scraped related articles");
    out
}
