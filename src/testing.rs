//! Deterministic collaborators for tests.

use crate::fetch::PageFetcher;
use crate::llm::{BiasAnalyzer, ConceptExtractor, RelevanceSelector};
use crate::models::{
    AnalysisResult, BiasRating, CandidateResult, Concepts, PipelineRecord, ScrapedArticle,
    SearchParams, SourceBias, StoredRelated,
};
use crate::scrapers::links::LinkCandidate;
use crate::search::SearchProvider;
use crate::store::RecordStore;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::time::Duration;

/// Serves canned HTML by exact URL; anything else is a fetch error.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    requests: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        self.requests.borrow_mut().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| format!("404 for {url}").into())
    }

    async fn fetch_with_timeout(
        &self,
        url: &str,
        _timeout: Duration,
    ) -> Result<String, Box<dyn Error>> {
        self.fetch(url).await
    }
}

/// Canned model answers. Unconfigured requests fail.
#[derive(Debug, Default)]
pub struct FakeModel {
    concepts: Option<Concepts>,
    selection: Option<String>,
    analyses: RefCell<VecDeque<String>>,
    concept_calls: Cell<usize>,
    selection_queries: RefCell<Vec<String>>,
    single_source_flags: RefCell<Vec<bool>>,
}

impl FakeModel {
    pub fn with_concepts(mut self, concepts: Concepts) -> Self {
        self.concepts = Some(concepts);
        self
    }

    pub fn with_selection(mut self, answer: &str) -> Self {
        self.selection = Some(answer.to_string());
        self
    }

    /// Queue one analyzer answer; answers are handed out in order.
    pub fn with_analysis(self, raw: &str) -> Self {
        self.analyses.borrow_mut().push_back(raw.to_string());
        self
    }

    pub fn concept_calls(&self) -> usize {
        self.concept_calls.get()
    }

    pub fn selection_queries(&self) -> Vec<String> {
        self.selection_queries.borrow().clone()
    }

    /// The `single_source` flag of every analyzer call, in order.
    pub fn single_source_flags(&self) -> Vec<bool> {
        self.single_source_flags.borrow().clone()
    }
}

impl ConceptExtractor for FakeModel {
    async fn extract_concepts(
        &self,
        _title: &str,
        _description: &str,
    ) -> Result<Concepts, Box<dyn Error>> {
        self.concept_calls.set(self.concept_calls.get() + 1);
        self.concepts.clone().ok_or_else(|| "concept model unavailable".into())
    }
}

impl RelevanceSelector for FakeModel {
    async fn select_relevant_link(
        &self,
        _candidates: &[LinkCandidate],
        query: &str,
    ) -> Result<String, Box<dyn Error>> {
        self.selection_queries.borrow_mut().push(query.to_string());
        self.selection.clone().ok_or_else(|| "selector unavailable".into())
    }
}

impl BiasAnalyzer for FakeModel {
    async fn analyze(
        &self,
        _articles: &[ScrapedArticle],
        single_source: bool,
    ) -> Result<String, Box<dyn Error>> {
        self.single_source_flags.borrow_mut().push(single_source);
        self.analyses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| "analyzer unavailable".into())
    }
}

/// Returns the same hits for every query and remembers the queries.
#[derive(Debug, Default)]
pub struct FakeSearch {
    results: Vec<CandidateResult>,
    queries: RefCell<Vec<String>>,
}

impl FakeSearch {
    pub fn with_results(mut self, results: Vec<CandidateResult>) -> Self {
        self.results = results;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.borrow().len()
    }
}

impl SearchProvider for FakeSearch {
    async fn search(&self, params: &SearchParams) -> Vec<CandidateResult> {
        self.queries.borrow_mut().push(params.query.clone());
        self.results.clone()
    }
}

/// Keeps inserted records in memory.
#[derive(Debug, Default)]
pub struct FakeStore {
    records: RefCell<Vec<(PipelineRecord, String)>>,
}

impl FakeStore {
    pub fn records(&self) -> Vec<(PipelineRecord, String)> {
        self.records.borrow().clone()
    }
}

impl RecordStore for FakeStore {
    async fn insert(&self, record: &PipelineRecord, batch_id: &str) -> Result<(), Box<dyn Error>> {
        self.records
            .borrow_mut()
            .push((record.clone(), batch_id.to_string()));
        Ok(())
    }
}

pub fn hit(link: &str) -> CandidateResult {
    CandidateResult {
        link: link.to_string(),
        title: format!("Headline at {link}"),
        snippet: "Snippet".to_string(),
        source: None,
        date: None,
    }
}

pub fn scraped(url: &str, text: &str) -> ScrapedArticle {
    ScrapedArticle {
        source: crate::utils::host_without_www(url).unwrap_or_default(),
        title: format!("Title for {url}"),
        url: url.to_string(),
        date: String::new(),
        text: text.to_string(),
    }
}

/// A record that passes validation against an allow-list containing
/// `bbc.com`.
pub fn record(url: &str) -> PipelineRecord {
    PipelineRecord {
        url: url.to_string(),
        title: "Leaders agree on new climate targets".to_string(),
        summary: "World leaders agreed on new emissions targets at the summit.".to_string(),
        analysis: Some(AnalysisResult {
            bias: vec![SourceBias {
                source: "bbc.com".into(),
                title: "Leaders agree on new climate targets".into(),
                summary: None,
                bias_rating: BiasRating::Score(1.0),
                bias_direction: "neutral".into(),
                bias_analysis: "Straight reporting.".into(),
            }],
            summary: "Coverage is consistent.".into(),
            topic: "environment".into(),
            ..Default::default()
        }),
        related_articles: vec![StoredRelated {
            source: "bbc.com".into(),
            title: "Leaders agree on new climate targets".into(),
            url: "https://www.bbc.com/news/articles/c1234567".into(),
            content: "World leaders agreed...".into(),
        }],
        keywords: "\"climate\" summit".to_string(),
        image_url: String::new(),
        author: String::new(),
        source: "bbc.com".to_string(),
        topic: "environment".to_string(),
        theme: "Environment".to_string(),
        news_date: "2025-05-06".to_string(),
        batchid: "batch".to_string(),
    }
}
