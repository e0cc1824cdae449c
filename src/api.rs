//! HTTP API over the resolver.
//!
//! Every lookup operation is a JSON endpoint under the configured API prefix.
//! Failures become a status code from the error kind and an [`ErrorBody`].
//! `/openapi.json` and `/docs` describe the API for discovery.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rmcp::schemars;
use serde_json::{Value, json};

use crate::config::RoutePaths;
use crate::error::LookupError;
use crate::prompt::DEFAULT_PROMPT;
use crate::resolver::{DocumentationResult, LookupRequest, Resolver};
use crate::schema::{
    DefaultPromptResponse, ErrorBody, GetMultipleLibraryDocsRequest, GetMultipleLibraryDocsResponse,
    ResolveLibraryIdRequest, ResolveLibraryIdResponse, ResolveMultipleLibraryIdsRequest,
    ResolveMultipleLibraryIdsResponse,
};

/// Route names under the API prefix, with the HTTP methods they accept.
pub const API_ROUTES: [(&str, &str); 5] = [
    ("/get_library_docs", "GET, POST"),
    ("/resolve_library_id", "POST"),
    ("/resolve_multiple_library_ids", "POST"),
    ("/get_multiple_library_docs", "POST"),
    ("/get_default_prompt", "POST"),
];

#[derive(Clone)]
struct ApiState {
    resolver: Arc<Resolver>,
    openapi: Arc<Value>,
}

/// Build the API router: the lookup routes under `paths.api` plus the
/// health and discovery routes at the root.
pub fn router(resolver: Arc<Resolver>, paths: &RoutePaths) -> Router {
    let state = ApiState {
        resolver,
        openapi: Arc::new(openapi_document(paths)),
    };

    let api = Router::new()
        .route("/get_library_docs", get(handle_docs_query).post(handle_docs))
        .route("/resolve_library_id", post(handle_resolve_library_id))
        .route("/resolve_multiple_library_ids", post(handle_resolve_multiple))
        .route("/get_multiple_library_docs", post(handle_docs_multiple))
        .route("/get_default_prompt", post(handle_default_prompt));

    let root = Router::new()
        .route("/health", get(handle_health))
        .route("/openapi.json", get(handle_openapi))
        .route("/docs", get(handle_docs_page));

    let routes = if paths.api.is_empty() {
        root.merge(api)
    } else {
        root.nest(&paths.api, api)
    };
    routes.with_state(state)
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::warn!(status = status.as_u16(), "[{:?}] {}", self.kind(), self);

        let mut response = (status, Json(ErrorBody::from(&self))).into_response();
        if let LookupError::RateLimited { retry_after_secs: Some(secs) } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, LookupError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| LookupError::invalid(rejection.body_text()))
}

async fn handle_docs(
    State(state): State<ApiState>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Result<Json<DocumentationResult>, LookupError> {
    let request = json_body(payload)?;
    tracing::info!("API call: get_library_docs({:?})", request.library_id);
    state.resolver.resolve(&request).await.map(Json)
}

async fn handle_docs_query(
    State(state): State<ApiState>,
    query: Result<Query<LookupRequest>, QueryRejection>,
) -> Result<Json<DocumentationResult>, LookupError> {
    let Query(request) = query.map_err(|rejection| LookupError::invalid(rejection.body_text()))?;
    tracing::info!("API call: get_library_docs({:?})", request.library_id);
    state.resolver.resolve(&request).await.map(Json)
}

async fn handle_resolve_library_id(
    State(state): State<ApiState>,
    payload: Result<Json<ResolveLibraryIdRequest>, JsonRejection>,
) -> Result<Json<ResolveLibraryIdResponse>, LookupError> {
    let request = json_body(payload)?;
    tracing::info!("API call: resolve_library_id({:?})", request.library_name);
    let library_id = state.resolver.search(&request.library_name).await?;
    Ok(Json(ResolveLibraryIdResponse { library_id }))
}

async fn handle_resolve_multiple(
    State(state): State<ApiState>,
    payload: Result<Json<ResolveMultipleLibraryIdsRequest>, JsonRejection>,
) -> Result<Json<ResolveMultipleLibraryIdsResponse>, LookupError> {
    let request = json_body(payload)?;
    tracing::info!("API call: resolve_multiple_library_ids({:?})", request.library_names);
    let library_ids = state.resolver.search_many(&request.library_names).await?;
    Ok(Json(ResolveMultipleLibraryIdsResponse { library_ids }))
}

async fn handle_docs_multiple(
    State(state): State<ApiState>,
    payload: Result<Json<GetMultipleLibraryDocsRequest>, JsonRejection>,
) -> Result<Json<GetMultipleLibraryDocsResponse>, LookupError> {
    let request = json_body(payload)?;
    tracing::info!("API call: get_multiple_library_docs({:?})", request.library_ids);
    state.resolver.resolve_batch(&request).await.map(Json)
}

async fn handle_default_prompt() -> Json<DefaultPromptResponse> {
    tracing::info!("API call: get_default_prompt()");
    Json(DefaultPromptResponse {
        default_prompt: DEFAULT_PROMPT.to_string(),
    })
}

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_openapi(State(state): State<ApiState>) -> Json<Value> {
    Json(state.openapi.as_ref().clone())
}

async fn handle_docs_page() -> Html<&'static str> {
    Html(DOCS_PAGE)
}

const DOCS_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
<title>Context7 Gateway - API docs</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>
window.ui = SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
</script>
</body>
</html>
"##;

fn schema_of<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

fn operation(operation_id: &str, description: &str, request: Option<Value>, response: Value) -> Value {
    let mut op = json!({
        "operationId": operation_id,
        "description": description,
        "responses": {
            "200": {
                "description": "Successful Response",
                "content": { "application/json": { "schema": response } }
            },
            "default": {
                "description": "Lookup failure",
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorBody" } } }
            }
        }
    });
    if let Some(schema) = request {
        op["requestBody"] = json!({
            "required": true,
            "content": { "application/json": { "schema": schema } }
        });
    }
    op
}

fn string_object(field: &str) -> Value {
    json!({ "type": "object", "properties": { field: { "type": "string" } }, "required": [field] })
}

fn string_array_object(field: &str) -> Value {
    json!({
        "type": "object",
        "properties": { field: { "type": "array", "items": { "type": "string" } } },
        "required": [field]
    })
}

/// OpenAPI 3 description of the lookup routes.
pub fn openapi_document(paths: &RoutePaths) -> Value {
    let path = |route: &str| format!("{}{}", paths.api, route);

    let docs_result = json!({
        "type": "object",
        "properties": {
            "library_id": { "type": "string" },
            "content": { "type": "string" },
            "truncated": { "type": "boolean" }
        },
        "required": ["library_id", "content", "truncated"]
    });

    let mut get_docs = operation(
        "get_library_docs_query",
        "Retrieve documentation for a Context7 library ID using query parameters.",
        None,
        docs_result.clone(),
    );
    get_docs["parameters"] = json!([
        { "name": "library_id", "in": "query", "required": true, "schema": { "type": "string" } },
        { "name": "version", "in": "query", "required": false, "schema": { "type": "string" } },
        { "name": "topic", "in": "query", "required": false, "schema": { "type": "string" } },
        { "name": "tokens", "in": "query", "required": false, "schema": { "type": "integer" } },
        { "name": "max_length", "in": "query", "required": false, "schema": { "type": "integer" } }
    ]);

    let mut paths_obj = serde_json::Map::new();
    paths_obj.insert(
        path("/get_library_docs"),
        json!({
            "get": get_docs,
            "post": operation(
                "get_library_docs",
                "Retrieve documentation for a Context7 library ID, optionally narrowed to a topic \
                 and limited to a token budget and a maximum length.",
                Some(schema_of::<LookupRequest>()),
                docs_result,
            ),
        }),
    );
    paths_obj.insert(
        path("/resolve_library_id"),
        json!({ "post": operation(
            "resolve_library_id",
            "Search the Context7 registry for a library name and list the matching library IDs.",
            Some(schema_of::<ResolveLibraryIdRequest>()),
            string_object("library_id"),
        )}),
    );
    paths_obj.insert(
        path("/resolve_multiple_library_ids"),
        json!({ "post": operation(
            "resolve_multiple_library_ids",
            "Search several library names concurrently. Results follow the request order.",
            Some(schema_of::<ResolveMultipleLibraryIdsRequest>()),
            string_array_object("library_ids"),
        )}),
    );
    paths_obj.insert(
        path("/get_multiple_library_docs"),
        json!({ "post": operation(
            "get_multiple_library_docs",
            "Retrieve documentation for several libraries in parallel from aligned arrays of IDs, \
             token budgets and topics.",
            Some(schema_of::<GetMultipleLibraryDocsRequest>()),
            string_array_object("library_infos"),
        )}),
    );
    paths_obj.insert(
        path("/get_default_prompt"),
        json!({ "post": operation(
            "get_default_prompt",
            "Return the instructions assistants should follow when using these tools.",
            None,
            string_object("default_prompt"),
        )}),
    );

    json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Context7 Gateway",
            "description": "Answers software development questions with documentation from Context7.",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": Value::Object(paths_obj),
        "components": {
            "schemas": {
                "ErrorBody": {
                    "type": "object",
                    "properties": {
                        "detail": { "type": "string" },
                        "kind": {
                            "type": "string",
                            "enum": ["InvalidRequest", "Unauthorized", "NotFound", "RateLimited", "ProviderUnavailable"]
                        }
                    },
                    "required": ["detail", "kind"]
                }
            }
        }
    })
}
