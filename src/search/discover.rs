//! Turning search hits into a diversified set of related articles.
//!
//! Hits are walked in the order the engine returned them. Each one must come
//! from an allow-listed outlet not already represented; section pages are
//! narrowed down to one story by the [`RelevanceSelector`]. The outlet key is
//! the allow-list entry the host matched, so `edition.cnn.com` and `cnn.com`
//! count as the same outlet.

use super::SearchProvider;
use super::query::theme_params;
use crate::allowlist::DomainAllowList;
use crate::classify::{is_section_page, looks_like_article};
use crate::fetch::{PageFetcher, TITLE_FETCH_TIMEOUT};
use crate::llm::{RelevanceSelector, clean_query, parse_selection};
use crate::models::{CandidateResult, RelatedArticle, SourceName};
use crate::scrapers::links::{fetch_link_candidates, find_all_article_links};
use crate::scrapers::{first_attr, first_text};
use crate::utils::host_without_www;
use chrono::NaiveDate;
use itertools::Itertools;
use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Most related articles kept per seed.
pub const MAX_RELATED: usize = 8;

/// Better title for a resolved article: og:title, then `<title>`.
async fn refetch_title<F: PageFetcher>(fetcher: &F, url: &str) -> Option<String> {
    let html = fetcher.fetch_with_timeout(url, TITLE_FETCH_TIMEOUT).await.ok()?;
    let doc = Html::parse_document(&html);
    first_attr(&doc, r#"meta[property="og:title"]"#, "content").or_else(|| first_text(&doc, "title"))
}

/// Narrow a section-page hit down to one article.
///
/// Returns `None` when the page has no usable links, the selector fails, or
/// its answer is `NONE`, out of range, or not a number. A failed title
/// refetch keeps the hit's title.
#[instrument(level = "info", skip_all, fields(section = %hit.link))]
pub async fn resolve_section<F, R>(
    fetcher: &F,
    selector: &R,
    hit: &CandidateResult,
    query: &str,
) -> Option<CandidateResult>
where
    F: PageFetcher,
    R: RelevanceSelector,
{
    let candidates = fetch_link_candidates(fetcher, &hit.link).await;
    if candidates.is_empty() {
        debug!("Section page has no link candidates");
        return None;
    }

    let answer = match selector.select_relevant_link(&candidates, &clean_query(query)).await {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "Link selection failed");
            return None;
        }
    };
    let Some(index) = parse_selection(&answer, candidates.len()) else {
        info!(answer = %answer.trim(), "No specific article selected");
        return None;
    };

    let chosen = &candidates[index];
    let title = refetch_title(fetcher, &chosen.href)
        .await
        .unwrap_or_else(|| hit.title.clone());
    info!(url = %chosen.href, "Resolved section page to article");

    Some(CandidateResult {
        link: chosen.href.clone(),
        title,
        snippet: hit.snippet.clone(),
        source: hit.source.clone(),
        date: hit.date.clone(),
    })
}

fn to_related(hit: CandidateResult, domain: &str) -> RelatedArticle {
    RelatedArticle {
        source: SourceName {
            name: hit.source.unwrap_or_else(|| domain.to_string()),
        },
        title: hit.title,
        url: hit.link,
        published_at: hit.date.unwrap_or_default(),
        content: hit.snippet,
    }
}

/// Outlet key for a URL: the allow-list entry its host matches.
fn outlet_of<'a>(allowlist: &'a DomainAllowList, url: &str) -> Option<&'a str> {
    allowlist.matching_domain(&host_without_www(url)?)
}

/// Pick at most [`MAX_RELATED`] hits, one per allow-listed outlet.
///
/// `seed_outlet` counts as already represented. A disallowed or already
/// represented outlet is skipped without resolving anything, and a section
/// page that cannot be resolved does not use up its outlet's slot. A resolved
/// article is keyed by its own outlet, which may differ from the section
/// page's.
#[instrument(level = "info", skip_all, fields(hits = hits.len(), seed_outlet = ?seed_outlet))]
pub async fn discover_related<F, R>(
    fetcher: &F,
    selector: &R,
    allowlist: &DomainAllowList,
    hits: &[CandidateResult],
    query: &str,
    seed_outlet: Option<&str>,
) -> Vec<RelatedArticle>
where
    F: PageFetcher,
    R: RelevanceSelector,
{
    let mut seen: HashSet<String> = seed_outlet.map(str::to_string).into_iter().collect();
    let mut related = Vec::new();

    for hit in hits {
        if related.len() >= MAX_RELATED {
            break;
        }
        let Some(host) = host_without_www(&hit.link) else {
            continue;
        };
        let Some(domain) = allowlist.matching_domain(&host) else {
            debug!(%host, "Skipping domain not in allow-list");
            continue;
        };
        if seen.contains(domain) {
            debug!(%domain, "Skipping already represented domain");
            continue;
        }

        let (accepted, outlet) = if is_section_page(&hit.link) {
            let Some(mut resolved) = resolve_section(fetcher, selector, hit, query).await else {
                continue;
            };
            let Some(outlet) = outlet_of(allowlist, &resolved.link) else {
                debug!(url = %resolved.link, "Resolved article is outside the allow-list");
                continue;
            };
            if seen.contains(outlet) {
                debug!(url = %resolved.link, %outlet, "Resolved article's outlet already represented");
                continue;
            }
            if outlet != domain {
                resolved.source = None;
            }
            (resolved, outlet)
        } else {
            (hit.clone(), domain)
        };

        seen.insert(outlet.to_string());
        related.push(to_related(accepted, outlet));
    }

    info!(count = related.len(), "Diversified related articles");
    related
}

/// Seed URLs for a theme: the last two days' coverage, one URL per host.
///
/// Hits that look like articles are used directly; anything else is treated
/// as a listing and all of its article links are taken.
#[instrument(level = "info", skip_all, fields(%theme))]
pub async fn discover_theme_seeds<F, S>(
    fetcher: &F,
    search: &S,
    theme: &str,
    today: NaiveDate,
) -> Vec<String>
where
    F: PageFetcher,
    S: SearchProvider,
{
    let params = theme_params(theme, today);
    let hits = search.search(&params).await;

    let mut links = Vec::new();
    for hit in hits {
        if looks_like_article(&hit.link) {
            links.push(hit.link);
            continue;
        }
        match find_all_article_links(fetcher, &hit.link).await {
            Ok(found) => links.extend(found),
            Err(e) => warn!(url = %hit.link, error = %e, "Failed to list article links"),
        }
    }

    let seeds: Vec<String> = links
        .into_iter()
        .filter_map(|l| host_without_www(&l).map(|h| (h, l)))
        .unique_by(|(h, _)| h.clone())
        .map(|(_, l)| l)
        .collect();
    info!(count = seeds.len(), "Discovered seed URLs");
    seeds
}
