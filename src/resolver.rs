//! Lookup resolution: validation, provider delegation and truncation.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use itertools::Itertools;
use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::config::TokenLimits;
use crate::error::LookupError;
use crate::provider::{DocsProvider, LibrarySummary, ProviderQuery};
use crate::schema::{GetMultipleLibraryDocsRequest, GetMultipleLibraryDocsResponse};

/// A single documentation lookup, as received from either interface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct LookupRequest {
    #[schemars(description = "Context7 library ID, e.g. '/tiangolo/fastapi'. Use resolve_library_id to find it.")]
    pub library_id: String,
    #[schemars(description = "Library version, e.g. 'v14.3.0'. The latest documentation is used when omitted.")]
    #[serde(default)]
    pub version: Option<String>,
    #[schemars(description = "Topic to focus the documentation on, e.g. 'routing' or 'async requests'.")]
    #[serde(default)]
    pub topic: Option<String>,
    #[schemars(description = "Token budget requested from the provider. Small values are raised to the server minimum.")]
    #[serde(default)]
    pub tokens: Option<u32>,
    #[schemars(description = "Maximum number of characters to return. Longer documentation is cut and flagged as truncated.")]
    #[serde(default)]
    pub max_length: Option<usize>,
}

impl LookupRequest {
    pub fn new(library_id: impl Into<String>) -> Self {
        Self {
            library_id: library_id.into(),
            ..Default::default()
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// Documentation returned for a [`LookupRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentationResult {
    pub library_id: String,
    pub content: String,
    /// Set when `content` was cut to honor `max_length`.
    pub truncated: bool,
}

/// Cuts `content` to at most `max_chars` characters.
///
/// Returns the kept text and whether anything was removed.
pub fn truncate_chars(content: String, max_chars: usize) -> (String, bool) {
    match content.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => {
            let mut content = content;
            content.truncate(byte_offset);
            (content, true)
        }
        None => (content, false),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Renders search hits as the human-readable summary handed back to clients.
pub fn format_search_results(results: &[LibrarySummary]) -> String {
    results
        .iter()
        .map(|lib| {
            let mut lines = vec![
                format!("- Title: {}", lib.title),
                format!("- ID: {}", lib.id),
                format!("- Description: {}", lib.description),
            ];
            if let Some(snippets) = lib.total_snippets.filter(|n| *n > 0) {
                lines.push(format!("- Code Snippets: {snippets}"));
            }
            if let Some(score) = lib.trust_score.filter(|s| *s != 0.0) {
                lines.push(format!("- Trust Score: {score}"));
            }
            if !lib.versions.is_empty() {
                lines.push(format!("- Versions: {}", lib.versions.join(", ")));
            }
            lines.join("\n")
        })
        .join("\n----------\n")
}

/// Turns lookup requests into documentation using a [`DocsProvider`].
///
/// Holds no mutable state; one instance is shared by every concurrent call.
#[derive(Clone)]
pub struct Resolver {
    provider: Arc<dyn DocsProvider>,
    limits: TokenLimits,
}

impl Resolver {
    pub fn new(provider: Arc<dyn DocsProvider>, limits: TokenLimits) -> Self {
        Self { provider, limits }
    }

    fn query_for(&self, request: &LookupRequest) -> Result<ProviderQuery, LookupError> {
        let library_id = request.library_id.trim();
        if library_id.is_empty() {
            return Err(LookupError::invalid("library_id must not be empty"));
        }
        Ok(ProviderQuery {
            library_id: library_id.to_string(),
            version: non_empty(&request.version),
            topic: non_empty(&request.topic),
            tokens: self.limits.effective(request.tokens),
        })
    }

    /// Resolves one request. Provider failures are returned as-is.
    pub async fn resolve(&self, request: &LookupRequest) -> Result<DocumentationResult, LookupError> {
        let query = self.query_for(request)?;
        tracing::info!(library_id = %query.library_id, tokens = query.tokens, "Resolving documentation");

        let raw = self.provider.fetch(&query).await?;
        let (content, truncated) = match request.max_length {
            Some(max_length) => truncate_chars(raw, max_length),
            None => (raw, false),
        };
        if truncated {
            tracing::debug!(library_id = %query.library_id, max_length = ?request.max_length, "Documentation truncated");
        }

        Ok(DocumentationResult {
            library_id: query.library_id,
            content,
            truncated,
        })
    }

    /// Resolves all requests concurrently; the output is aligned with the input.
    pub async fn resolve_many(
        &self,
        requests: &[LookupRequest],
    ) -> Vec<Result<DocumentationResult, LookupError>> {
        join_all(requests.iter().map(|request| self.resolve(request))).await
    }

    /// Fetches documentation for several libraries at once.
    ///
    /// Libraries the provider has nothing for are reported inline so the rest
    /// of the batch still comes back; any other failure fails the whole call.
    pub async fn resolve_batch(
        &self,
        request: &GetMultipleLibraryDocsRequest,
    ) -> Result<GetMultipleLibraryDocsResponse, LookupError> {
        let lookups = request.lookups()?;
        let results = self.resolve_many(&lookups).await;

        let library_infos = lookups
            .iter()
            .zip(results)
            .map(|(lookup, result)| match result {
                Ok(doc) => Ok(doc.content),
                Err(LookupError::NotFound(_)) => Ok(format!(
                    "Documentation not found for {} with topic '{}'.",
                    lookup.library_id,
                    lookup.topic.as_deref().unwrap_or_default()
                )),
                Err(err) => Err(err),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GetMultipleLibraryDocsResponse { library_infos })
    }

    /// Searches the provider for `name` and formats the matches.
    pub async fn search(&self, name: &str) -> Result<String, LookupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LookupError::invalid("library_name must not be empty"));
        }
        tracing::info!(library_name = name, "Searching libraries");

        let results = self.provider.search(name).await?;
        if results.is_empty() {
            return Err(LookupError::NotFound(format!("No matching libraries found for '{name}'.")));
        }
        Ok(format_search_results(&results))
    }

    /// Searches for every name concurrently; the first failure fails the batch.
    pub async fn search_many(&self, names: &[String]) -> Result<Vec<String>, LookupError> {
        try_join_all(names.iter().map(|name| self.search(name))).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory provider that records every query it receives.
    #[derive(Default)]
    pub(crate) struct StubProvider {
        pub docs: HashMap<String, Result<String, LookupError>>,
        pub libraries: Vec<LibrarySummary>,
        pub calls: AtomicUsize,
        pub queries: Mutex<Vec<ProviderQuery>>,
    }

    impl StubProvider {
        pub(crate) fn with_doc(mut self, library_id: &str, doc: Result<String, LookupError>) -> Self {
            self.docs.insert(library_id.to_string(), doc);
            self
        }
    }

    #[async_trait]
    impl DocsProvider for StubProvider {
        async fn fetch(&self, query: &ProviderQuery) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.clone());
            self.docs
                .get(&query.library_id)
                .cloned()
                .unwrap_or_else(|| Err(LookupError::NotFound("Documentation not found.".to_string())))
        }

        async fn search(&self, query: &str) -> Result<Vec<LibrarySummary>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .libraries
                .iter()
                .filter(|lib| lib.title.to_lowercase().contains(&query.to_lowercase()))
                .cloned()
                .collect())
        }
    }

    fn resolver_with(provider: StubProvider) -> (Resolver, Arc<StubProvider>) {
        let provider = Arc::new(provider);
        (Resolver::new(provider.clone(), TokenLimits::default()), provider)
    }

    fn react_doc() -> String {
        "r".repeat(1200)
    }

    #[tokio::test]
    async fn test_resolve_without_budget() {
        let (resolver, _) = resolver_with(StubProvider::default().with_doc("react", Ok(react_doc())));

        let result = resolver.resolve(&LookupRequest::new("react")).await.unwrap();
        assert_eq!(result.content.chars().count(), 1200);
        assert!(!result.truncated);
        assert_eq!(result.library_id, "react");
    }

    #[tokio::test]
    async fn test_resolve_with_budget_truncates() {
        let (resolver, _) = resolver_with(StubProvider::default().with_doc("react", Ok(react_doc())));

        let request = LookupRequest::new("react").with_max_length(500);
        let result = resolver.resolve(&request).await.unwrap();
        assert_eq!(result.content.chars().count(), 500);
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn test_budget_equal_to_length_is_not_truncated() {
        let (resolver, _) = resolver_with(StubProvider::default().with_doc("react", Ok(react_doc())));

        let result = resolver
            .resolve(&LookupRequest::new("react").with_max_length(1200))
            .await
            .unwrap();
        assert_eq!(result.content.len(), 1200);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_empty_identifier_never_reaches_provider() {
        let (resolver, provider) = resolver_with(StubProvider::default());

        for id in ["", "   "] {
            let err = resolver.resolve(&LookupRequest::new(id)).await.unwrap_err();
            assert!(matches!(err, LookupError::InvalidRequest(_)));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_errors_propagate_unchanged() {
        let failures = [
            LookupError::Unauthorized,
            LookupError::NotFound("gone".to_string()),
            LookupError::RateLimited { retry_after_secs: Some(3) },
            LookupError::unavailable("timeout"),
        ];

        for failure in failures {
            let (resolver, _) =
                resolver_with(StubProvider::default().with_doc("lib", Err(failure.clone())));
            let err = resolver.resolve(&LookupRequest::new("lib")).await.unwrap_err();
            assert_eq!(err, failure);
        }
    }

    #[tokio::test]
    async fn test_repeated_resolves_are_identical() {
        let (resolver, _) = resolver_with(StubProvider::default().with_doc("react", Ok(react_doc())));
        let request = LookupRequest::new("react").with_max_length(700);

        let first = resolver.resolve(&request).await.unwrap();
        let second = resolver.resolve(&request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_query_applies_token_limits_and_drops_blanks() {
        let (resolver, provider) = resolver_with(StubProvider::default().with_doc("react", Ok("x".into())));

        let request = LookupRequest {
            library_id: " react ".to_string(),
            version: Some(String::new()),
            topic: Some(" hooks ".to_string()),
            tokens: Some(10),
            max_length: None,
        };
        resolver.resolve(&request).await.unwrap();

        let queries = provider.queries.lock().unwrap();
        assert_eq!(
            queries[0],
            ProviderQuery {
                library_id: "react".to_string(),
                version: None,
                topic: Some("hooks".to_string()),
                tokens: TokenLimits::default().minimum_tokens,
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_many_keeps_order() {
        let (resolver, _) = resolver_with(
            StubProvider::default()
                .with_doc("a", Ok("alpha".into()))
                .with_doc("c", Ok("gamma".into())),
        );

        let requests = vec![LookupRequest::new("a"), LookupRequest::new("b"), LookupRequest::new("c")];
        let results = resolver.resolve_many(&requests).await;

        assert_eq!(results[0].as_ref().unwrap().content, "alpha");
        assert!(matches!(results[1], Err(LookupError::NotFound(_))));
        assert_eq!(results[2].as_ref().unwrap().content, "gamma");
    }

    #[tokio::test]
    async fn test_resolve_batch_reports_missing_inline() {
        let (resolver, _) = resolver_with(StubProvider::default().with_doc("/a/a", Ok("alpha".into())));

        let request = GetMultipleLibraryDocsRequest {
            library_ids: vec!["/a/a".into(), "/b/b".into()],
            tokens: vec![2500, 2500],
            topics: vec!["intro".into(), "setup".into()],
        };
        let response = resolver.resolve_batch(&request).await.unwrap();

        assert_eq!(
            response.library_infos,
            vec![
                "alpha".to_string(),
                "Documentation not found for /b/b with topic 'setup'.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_batch_fails_on_other_errors() {
        let (resolver, _) = resolver_with(
            StubProvider::default()
                .with_doc("/a/a", Ok("alpha".into()))
                .with_doc("/b/b", Err(LookupError::Unauthorized)),
        );

        let request = GetMultipleLibraryDocsRequest {
            library_ids: vec!["/a/a".into(), "/b/b".into()],
            tokens: vec![2500, 2500],
            topics: vec![String::new(), String::new()],
        };
        let err = resolver.resolve_batch(&request).await.unwrap_err();
        assert_eq!(err, LookupError::Unauthorized);
    }

    #[tokio::test]
    async fn test_search_formats_and_reports_missing() {
        let provider = StubProvider {
            libraries: vec![LibrarySummary {
                id: "/tiangolo/fastapi".to_string(),
                title: "FastAPI".to_string(),
                description: "Web framework".to_string(),
                total_snippets: Some(0),
                trust_score: Some(9.0),
                versions: vec![],
            }],
            ..Default::default()
        };
        let (resolver, _) = resolver_with(provider);

        let text = resolver.search("fastapi").await.unwrap();
        assert_eq!(
            text,
            "- Title: FastAPI\n- ID: /tiangolo/fastapi\n- Description: Web framework\n- Trust Score: 9"
        );

        let err = resolver.search("django").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound(_)));

        let err = resolver.search_many(&["fastapi".to_string(), "django".to_string()]).await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let (text, truncated) = truncate_chars("héllo wörld".to_string(), 4);
        assert_eq!(text, "héll");
        assert!(truncated);

        let (text, truncated) = truncate_chars("short".to_string(), 10);
        assert_eq!(text, "short");
        assert!(!truncated);

        let (text, truncated) = truncate_chars("abc".to_string(), 0);
        assert_eq!(text, "");
        assert!(truncated);
    }

    #[test]
    fn test_format_joins_multiple_results() {
        let libs = vec![
            LibrarySummary {
                id: "/a/a".into(),
                title: "A".into(),
                total_snippets: Some(12),
                versions: vec!["v1".into(), "v2".into()],
                ..Default::default()
            },
            LibrarySummary { id: "/b/b".into(), title: "B".into(), ..Default::default() },
        ];

        let text = format_search_results(&libs);
        assert_eq!(
            text,
            "- Title: A\n- ID: /a/a\n- Description: \n- Code Snippets: 12\n- Versions: v1, v2\
             \n----------\n- Title: B\n- ID: /b/b\n- Description: "
        );
    }
}
