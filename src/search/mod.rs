//! Finding related coverage.
//!
//! - [`query`]: builds [`SearchParams`] from a seed article's concepts, and
//!   the theme queries used to discover seed URLs
//! - [`google`]: the Custom Search adapter, with service-account and API-key
//!   credentials
//! - [`discover`]: section-page resolution and per-domain diversification of
//!   search hits

pub mod discover;
pub mod google;
pub mod query;

use crate::models::{CandidateResult, SearchParams};

/// Most results requested from the search engine per query.
pub const MAX_RESULTS: u8 = 10;

/// A search engine.
///
/// Implementations never fail: every error is logged and reported as an
/// empty result list, which is also what "nothing found" looks like.
pub trait SearchProvider {
    async fn search(&self, params: &SearchParams) -> Vec<CandidateResult>;
}
