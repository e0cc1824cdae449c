//! Client for the remote documentation provider.
//!
//! [`DocsProvider`] is the seam the resolver depends on; [`Context7Client`] is
//! the HTTP implementation talking to the Context7 API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::ApiKey;
use crate::error::LookupError;

/// Bodies the provider sends with a 200 status when it has nothing for the library.
const EMPTY_BODIES: [&str; 2] = ["No content available", "No context data available"];

/// A documentation request after defaults have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuery {
    pub library_id: String,
    pub version: Option<String>,
    pub topic: Option<String>,
    pub tokens: u32,
}

/// One library returned by the provider's search endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub total_snippets: Option<i64>,
    #[serde(default)]
    pub trust_score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub versions: Vec<String>,
}

/// The search endpoint sends `null` for fields it has no value for.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    results: Vec<LibrarySummary>,
}

/// Remote source of documentation.
#[async_trait]
pub trait DocsProvider: Send + Sync {
    /// Fetches the plain-text documentation for one library.
    async fn fetch(&self, query: &ProviderQuery) -> Result<String, LookupError>;

    /// Searches the provider's registry for libraries matching `query`.
    async fn search(&self, query: &str) -> Result<Vec<LibrarySummary>, LookupError>;
}

/// Context7 HTTP client.
///
/// Holds the API key for the lifetime of the process and attaches it to every
/// outbound call. Each call is a single attempt bounded by the client timeout.
#[derive(Debug, Clone)]
pub struct Context7Client {
    client: Client,
    base_url: Url,
    api_key: Option<ApiKey>,
}

impl Context7Client {
    pub fn new(base_url: Url, api_key: Option<ApiKey>, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::unavailable(format!("invalid provider base URL: {}", self.base_url)))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose()),
            None => request,
        }
    }

    /// Library IDs look like `/vercel/next.js`; each part becomes a path segment.
    fn library_segments(query: &ProviderQuery) -> Vec<&str> {
        query
            .library_id
            .split('/')
            .chain(query.version.as_deref())
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// Maps a non-success provider status to the local error taxonomy.
fn status_error(response: &Response) -> LookupError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LookupError::Unauthorized,
        StatusCode::NOT_FOUND => LookupError::NotFound("Documentation not found.".to_string()),
        StatusCode::TOO_MANY_REQUESTS => LookupError::RateLimited {
            retry_after_secs: response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok()),
        },
        _ => LookupError::unavailable(format!("provider responded with status {status}")),
    }
}

#[async_trait]
impl DocsProvider for Context7Client {
    async fn fetch(&self, query: &ProviderQuery) -> Result<String, LookupError> {
        let url = self.endpoint(&Self::library_segments(query))?;
        tracing::debug!("Fetching documentation from: {}", url);

        let mut params = vec![("tokens", query.tokens.to_string()), ("type", "txt".to_string())];
        if let Some(topic) = &query.topic {
            params.push(("topic", topic.clone()));
        }

        let response = self
            .authorized(self.client.get(url))
            .header("X-Context7-Source", "mcp-server")
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = status_error(&response);
            tracing::warn!(library_id = %query.library_id, "Provider fetch failed: {}", err);
            return Err(err);
        }

        let text = response.text().await?;
        let trimmed = text.trim();
        if trimmed.is_empty() || EMPTY_BODIES.contains(&trimmed) {
            return Err(LookupError::NotFound("Documentation not found.".to_string()));
        }
        Ok(text)
    }

    async fn search(&self, query: &str) -> Result<Vec<LibrarySummary>, LookupError> {
        let url = self.endpoint(&["search"])?;
        tracing::debug!("Searching libraries at: {} (query={:?})", url, query);

        let response = self
            .authorized(self.client.get(url))
            .query(&[("query", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            let err = status_error(&response);
            tracing::warn!(query, "Provider search failed: {}", err);
            return Err(err);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| LookupError::unavailable(format!("malformed search response: {e}")))?;
        Ok(body.results)
    }
}
