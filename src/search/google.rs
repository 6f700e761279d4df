//! Google Custom Search JSON API adapter.
//!
//! Two credential modes are supported. A service-account key is tried first:
//! an RS256-signed JWT assertion is exchanged for a bearer token, which is
//! cached until shortly before it expires. If that path fails for any reason
//! (signing, token exchange, search call) the request is repeated once with
//! the plain API key. Both failing yields an empty result list.

use super::{MAX_RESULTS, SearchProvider};
use crate::models::{CandidateResult, SearchParams};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub const CUSTOM_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const SEARCH_SCOPE: &str = "https://www.googleapis.com/auth/cse";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for each JWT assertion, in seconds.
const ASSERTION_LIFETIME: i64 = 3600;

/// Cached tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account key file this adapter needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a key from inline JSON, or read it from the file `source` names.
    pub async fn load(source: &str) -> Result<Self, Box<dyn Error>> {
        let trimmed = source.trim();
        let json = if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            tokio::fs::read_to_string(trimmed).await?
        };
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Signed JWT assertion for the token exchange.
fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, Box<dyn Error>> {
    let claims = Claims {
        iss: &key.client_email,
        scope: SEARCH_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?)
}

/// [`SearchProvider`] backed by Google Custom Search.
#[derive(Debug)]
pub struct GoogleSearch {
    client: Client,
    endpoint: String,
    cx: Option<String>,
    api_key: Option<String>,
    service_account: Option<ServiceAccountKey>,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSearch {
    pub fn new(client: Client, cx: Option<String>) -> Self {
        Self {
            client,
            endpoint: CUSTOM_SEARCH_ENDPOINT.to_string(),
            cx,
            api_key: None,
            service_account: None,
            token: Mutex::new(None),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_service_account(mut self, key: Option<ServiceAccountKey>) -> Self {
        self.service_account = key;
        self
    }

    /// Whether any credential is configured.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.service_account.is_some()
    }

    /// A valid bearer token, reusing the cached one when it is still fresh.
    async fn bearer_token(&self, key: &ServiceAccountKey) -> Result<String, Box<dyn Error>> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let assertion = sign_assertion(key, Utc::now().timestamp())?;
        let response: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(expires_in = response.expires_in, "Obtained service-account token");
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
        Ok(response.access_token)
    }

    fn query_pairs(&self, cx: &str, params: &SearchParams) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("cx", cx.to_string()),
            ("q", params.query.clone()),
            ("num", MAX_RESULTS.to_string()),
        ];
        if let Some(d) = &params.date_restrict {
            pairs.push(("dateRestrict", d.clone()));
        }
        if let Some(s) = &params.sort {
            pairs.push(("sort", s.clone()));
        }
        pairs
    }

    async fn search_with_service_account(
        &self,
        key: &ServiceAccountKey,
        cx: &str,
        params: &SearchParams,
    ) -> Result<Vec<CandidateResult>, Box<dyn Error>> {
        let token = self.bearer_token(key).await?;
        let body: Value = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .query(&self.query_pairs(cx, params))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(normalize_results(&body))
    }

    async fn search_with_api_key(
        &self,
        api_key: &str,
        cx: &str,
        params: &SearchParams,
    ) -> Result<Vec<CandidateResult>, Box<dyn Error>> {
        let mut pairs = self.query_pairs(cx, params);
        pairs.push(("key", api_key.to_string()));
        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&pairs)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(normalize_results(&body))
    }
}

impl SearchProvider for GoogleSearch {
    #[instrument(level = "info", skip_all, fields(query = %params.query))]
    async fn search(&self, params: &SearchParams) -> Vec<CandidateResult> {
        let Some(cx) = self.cx.as_deref() else {
            warn!("No search engine id configured; returning no results");
            return Vec::new();
        };

        if let Some(key) = &self.service_account {
            match self.search_with_service_account(key, cx, params).await {
                Ok(results) => {
                    info!(count = results.len(), auth = "service_account", "Search completed");
                    return results;
                }
                Err(e) => warn!(error = %e, "Service-account search failed; falling back to API key"),
            }
        }

        let Some(api_key) = self.api_key.as_deref() else {
            warn!("No API key configured; returning no results");
            return Vec::new();
        };
        match self.search_with_api_key(api_key, cx, params).await {
            Ok(results) => {
                info!(count = results.len(), auth = "api_key", "Search completed");
                results
            }
            Err(e) => {
                warn!(error = %e, "Search failed");
                Vec::new()
            }
        }
    }
}

fn str_field(item: &Value, key: &str) -> String {
    item.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Outlet name from either a plain string or a `{name}` object.
fn source_field(item: &Value) -> Option<String> {
    match item.get("source")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Flatten the result shapes different providers return.
///
/// Accepts Custom Search `items` as well as `news_results` and
/// `organic_results`. Hits without a link are dropped.
pub fn normalize_results(body: &Value) -> Vec<CandidateResult> {
    ["items", "news_results", "organic_results"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|item| {
            let link = str_field(item, "link");
            if link.is_empty() {
                return None;
            }
            Some(CandidateResult {
                link,
                title: str_field(item, "title"),
                snippet: str_field(item, "snippet"),
                source: source_field(item),
                date: item.get("date").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local endpoint answering every request with `status` and `body`.
    /// Returns its URL and a count of requests served.
    async fn serve(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&served);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}/customsearch/v1"), served)
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    fn broken_service_account() -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "svc@example.test".into(),
            private_key: "not a pem".into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
        }
    }

    fn params() -> SearchParams {
        SearchParams {
            query: "summit".into(),
            date_restrict: Some("d7".into()),
            sort: Some("date".into()),
            exclude_domain: None,
        }
    }

    #[tokio::test]
    async fn test_service_account_failure_falls_back_to_api_key() {
        let (endpoint, served) =
            serve("200 OK", r#"{"items":[{"link":"https://apnews.com/article/x","title":"X"}]}"#).await;
        let mut search = GoogleSearch::new(local_client(), Some("cx".into()))
            .with_api_key(Some("k".into()))
            .with_service_account(Some(broken_service_account()));
        search.endpoint = endpoint;

        let results = search.search(&params()).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].link, "https://apnews.com/article/x");
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_credentials_failing_returns_nothing() {
        let (endpoint, served) = serve("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let mut search = GoogleSearch::new(local_client(), Some("cx".into()))
            .with_api_key(Some("k".into()))
            .with_service_account(Some(broken_service_account()));
        search.endpoint = endpoint;

        assert!(search.search(&params()).await.is_empty());
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_service_account_without_api_key_returns_nothing() {
        let (endpoint, served) = serve("200 OK", r#"{"items":[]}"#).await;
        let mut search = GoogleSearch::new(local_client(), Some("cx".into()))
            .with_service_account(Some(broken_service_account()));
        search.endpoint = endpoint;

        assert!(search.search(&params()).await.is_empty());
        assert_eq!(served.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_normalize_custom_search_items() {
        let body = json!({
            "kind": "customsearch#search",
            "items": [
                {"link": "https://apnews.com/article/a", "title": "A", "snippet": "sa"},
                {"title": "no link"},
                {"link": "https://bbc.com/news/b", "title": "B"}
            ]
        });
        let results = normalize_results(&body);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].link, "https://apnews.com/article/a");
        assert_eq!(results[0].snippet, "sa");
        assert_eq!(results[1].snippet, "");
        assert!(results[0].source.is_none());
    }

    #[test]
    fn test_normalize_news_and_organic_shapes() {
        let body = json!({
            "news_results": [
                {"link": "https://reuters.com/x", "title": "X", "source": {"name": "Reuters"}, "date": "2 hours ago"}
            ],
            "organic_results": [
                {"link": "https://npr.org/y", "title": "Y", "source": "NPR"}
            ]
        });
        let results = normalize_results(&body);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source.as_deref(), Some("Reuters"));
        assert_eq!(results[0].date.as_deref(), Some("2 hours ago"));
        assert_eq!(results[1].source.as_deref(), Some("NPR"));
    }

    #[test]
    fn test_normalize_empty_body() {
        assert!(normalize_results(&json!({"searchInformation": {"totalResults": "0"}})).is_empty());
    }

    #[tokio::test]
    async fn test_service_account_key_inline_json() {
        let key = ServiceAccountKey::load(
            r#"{"client_email": "svc@project.iam.gserviceaccount.com", "private_key": "pem"}"#,
        )
        .await
        .unwrap();
        assert_eq!(key.client_email, "svc@project.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_sign_assertion_rejects_bad_pem() {
        let key = ServiceAccountKey {
            client_email: "svc@example.test".into(),
            private_key: "not a pem".into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
        };
        assert!(sign_assertion(&key, 0).is_err());
    }

    #[tokio::test]
    async fn test_missing_cx_returns_nothing() {
        let search = GoogleSearch::new(Client::new(), None).with_api_key(Some("k".into()));
        let params = SearchParams {
            query: "q".into(),
            date_restrict: None,
            sort: None,
            exclude_domain: None,
        };
        assert!(search.search(&params).await.is_empty());
        assert!(search.has_credentials());
    }
}
