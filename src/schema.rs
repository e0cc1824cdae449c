//! Request and response bodies shared by the HTTP API and the MCP tools.

use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, LookupError};
use crate::resolver::LookupRequest;

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct ResolveLibraryIdRequest {
    #[schemars(description = "Plain name of the library to look up in the Context7 registry, e.g. 'FastAPI' or 'SQLAlchemy'.")]
    pub library_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveLibraryIdResponse {
    /// Formatted list of matching libraries with their IDs and metadata.
    pub library_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct ResolveMultipleLibraryIdsRequest {
    #[schemars(description = "Library names to look up. Each name is searched separately and concurrently.")]
    pub library_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveMultipleLibraryIdsResponse {
    pub library_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct GetMultipleLibraryDocsRequest {
    #[schemars(description = "Context7 library IDs such as '/tiangolo/fastapi'. Must line up with 'tokens' and 'topics'.")]
    #[serde(alias = "library_id")]
    pub library_ids: Vec<String>,
    #[schemars(description = "Token budget for each library ID, same length as 'library_ids'.")]
    pub tokens: Vec<u32>,
    #[schemars(description = "Topic for each library ID, same length as 'library_ids'.")]
    pub topics: Vec<String>,
}

impl GetMultipleLibraryDocsRequest {
    /// Splits the aligned arrays into one lookup per library.
    pub fn lookups(&self) -> Result<Vec<LookupRequest>, LookupError> {
        if self.library_ids.len() != self.tokens.len() || self.library_ids.len() != self.topics.len() {
            return Err(LookupError::invalid(
                "Lengths of library_ids, tokens, and topics must match.",
            ));
        }
        Ok(self
            .library_ids
            .iter()
            .zip(&self.tokens)
            .zip(&self.topics)
            .map(|((library_id, tokens), topic)| LookupRequest {
                library_id: library_id.clone(),
                version: None,
                topic: Some(topic.clone()),
                tokens: Some(*tokens),
                max_length: None,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetMultipleLibraryDocsResponse {
    /// Documentation per requested library, in request order.
    pub library_infos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultPromptResponse {
    pub default_prompt: String,
}

/// Error body returned by the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
    pub kind: ErrorKind,
}

impl From<&LookupError> for ErrorBody {
    fn from(err: &LookupError) -> Self {
        Self {
            detail: err.to_string(),
            kind: err.kind(),
        }
    }
}
