//! MCP tools over the resolver.
//!
//! [`DocsTools`] exposes each lookup operation as an MCP tool. Successful
//! calls return the JSON-serialized response as text content; failures are
//! returned as protocol errors whose `data.kind` names the lookup error kind.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use context7_gateway::config::TokenLimits;
//! use context7_gateway::mcp::DocsTools;
//! use context7_gateway::provider::Context7Client;
//! use context7_gateway::resolver::Resolver;
//!
//! fn example() -> Result<DocsTools, Box<dyn std::error::Error>> {
//!     let client = Context7Client::new("https://context7.com/api".parse()?, None, Duration::from_secs(30))?;
//!     let resolver = Arc::new(Resolver::new(Arc::new(client), TokenLimits::default()));
//!     Ok(DocsTools::new(resolver))
//! }
//! ```

use rmcp::model::{
    CallToolResult, Content, ErrorCode, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{Error as McpError, ServerHandler, tool};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::LookupError;
use crate::prompt::DEFAULT_PROMPT;
use crate::resolver::{LookupRequest, Resolver};
use crate::schema::{
    DefaultPromptResponse, GetMultipleLibraryDocsRequest, ResolveLibraryIdRequest, ResolveLibraryIdResponse,
    ResolveMultipleLibraryIdsRequest, ResolveMultipleLibraryIdsResponse,
};

impl From<LookupError> for McpError {
    fn from(err: LookupError) -> Self {
        let kind = err.kind();
        tracing::warn!("[{:?}] {}", kind, err);
        McpError::new(ErrorCode(kind.rpc_code()), err.to_string(), Some(json!({ "kind": kind })))
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// MCP server exposing the documentation lookups as tools.
///
/// Cloned once per client session. The resolver is the only state and it is
/// shared read-only.
#[derive(Clone)]
pub struct DocsTools {
    resolver: Arc<Resolver>,
}

#[tool(tool_box)]
impl DocsTools {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    #[tool(description = "Return the instructions to follow when answering software development \
        questions with Context7 documentation. Call this first.")]
    async fn get_default_prompt(&self) -> Result<CallToolResult, McpError> {
        tracing::info!("Tool call: get_default_prompt()");
        json_result(&DefaultPromptResponse {
            default_prompt: DEFAULT_PROMPT.to_string(),
        })
    }

    #[tool(description = "Search the Context7 registry for a library name and list the matching \
        libraries with their Context7 IDs, descriptions, trust scores and versions.")]
    async fn resolve_library_id(
        &self,
        #[tool(aggr)] request: ResolveLibraryIdRequest,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Tool call: resolve_library_id({:?})", request.library_name);
        let library_id = self.resolver.search(&request.library_name).await?;
        json_result(&ResolveLibraryIdResponse { library_id })
    }

    #[tool(description = "Search several library names concurrently. Results follow the order of \
        'library_names'.")]
    async fn resolve_multiple_library_ids(
        &self,
        #[tool(aggr)] request: ResolveMultipleLibraryIdsRequest,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Tool call: resolve_multiple_library_ids({:?})", request.library_names);
        let library_ids = self.resolver.search_many(&request.library_names).await?;
        json_result(&ResolveMultipleLibraryIdsResponse { library_ids })
    }

    #[tool(description = "Fetch documentation for a Context7 library ID. Optionally narrow it to a \
        topic, request a token budget and cap the returned length in characters.")]
    async fn get_library_docs(&self, #[tool(aggr)] request: LookupRequest) -> Result<CallToolResult, McpError> {
        tracing::info!("Tool call: get_library_docs({:?})", request.library_id);
        let result = self.resolver.resolve(&request).await?;
        json_result(&result)
    }

    #[tool(description = "Fetch documentation for several libraries in parallel. 'library_ids', \
        'tokens' and 'topics' must have the same length; position i of each describes one request.")]
    async fn get_multiple_library_docs(
        &self,
        #[tool(aggr)] request: GetMultipleLibraryDocsRequest,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Tool call: get_multiple_library_docs({:?})", request.library_ids);
        let response = self.resolver.resolve_batch(&request).await?;
        json_result(&response)
    }
}

#[tool(tool_box)]
impl ServerHandler for DocsTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "This server answers software development questions with library documentation \
                from Context7. Call 'get_default_prompt' for usage guidance, 'resolve_library_id' \
                to find a library ID and 'get_library_docs' to fetch its documentation."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenLimits;
    use crate::resolver::tests::StubProvider;
    use serde_json::Value;

    fn tools(provider: StubProvider) -> DocsTools {
        DocsTools::new(Arc::new(Resolver::new(Arc::new(provider), TokenLimits::default())))
    }

    fn text_of(result: &CallToolResult) -> Value {
        let text = &result.content[0].as_text().unwrap().text;
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_get_library_docs() {
        let tools = tools(StubProvider::default().with_doc("react", Ok("r".repeat(1200))));

        let result = tools
            .get_library_docs(LookupRequest::new("react").with_max_length(500))
            .await
            .unwrap();

        let body = text_of(&result);
        assert_eq!(body["content"].as_str().unwrap().len(), 500);
        assert_eq!(body["truncated"], json!(true));
    }

    #[tokio::test]
    async fn test_not_found_becomes_error_object() {
        let tools = tools(StubProvider::default());

        let err = tools.get_library_docs(LookupRequest::new("missing")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode(-32002));
        assert_eq!(err.data.unwrap()["kind"], json!("NotFound"));
    }

    #[tokio::test]
    async fn test_empty_identifier_is_invalid_params() {
        let provider = Arc::new(StubProvider::default());
        let tools = DocsTools::new(Arc::new(Resolver::new(provider.clone(), TokenLimits::default())));

        let err = tools.get_library_docs(LookupRequest::new("")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode(-32602));
        assert_eq!(err.data.unwrap()["kind"], json!("InvalidRequest"));
        assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_independent() {
        let tools = tools(
            StubProvider::default()
                .with_doc("a", Ok("alpha".into()))
                .with_doc("b", Err(LookupError::Unauthorized)),
        );

        let (a, b) = tokio::join!(
            tools.get_library_docs(LookupRequest::new("a")),
            tools.get_library_docs(LookupRequest::new("b")),
        );

        assert_eq!(text_of(&a.unwrap())["content"], json!("alpha"));
        assert_eq!(b.unwrap_err().data.unwrap()["kind"], json!("Unauthorized"));
    }

    #[tokio::test]
    async fn test_default_prompt_tool() {
        let result = tools(StubProvider::default()).get_default_prompt().await.unwrap();
        assert!(text_of(&result)["default_prompt"].as_str().unwrap().contains("get_library_docs"));
    }

    #[test]
    fn test_server_info_enables_tools() {
        let info = tools(StubProvider::default()).get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("get_library_docs"));
    }
}
