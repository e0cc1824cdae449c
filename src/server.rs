//! Process wiring: logging, router composition, TLS and the two transports.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::Request;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use rmcp::ServiceExt;
use rmcp::transport::sse_server::{SseServer, SseServerConfig};
use rmcp::transport::stdio;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as _;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{self, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{self, API_ROUTES};
use crate::config::{RoutePaths, ServerType, Settings};
use crate::mcp::DocsTools;
use crate::provider::Context7Client;
use crate::resolver::Resolver;

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Build the resolver backed by the Context7 client described by `settings`.
pub fn build_resolver(settings: &Settings) -> Result<Arc<Resolver>> {
    if settings.api_key.is_none() {
        tracing::warn!("No Context7 API key configured; the provider may reject requests.");
    }
    let client = Context7Client::new(
        settings.api_base_url.clone(),
        settings.api_key.clone(),
        settings.timeout(),
    )
    .context("failed to build provider client")?;
    Ok(Arc::new(Resolver::new(Arc::new(client), settings.token_limits())))
}

/// The HTTP API router with request tracing and CORS.
pub fn app(resolver: Arc<Resolver>, paths: &RoutePaths) -> Router {
    api::router(resolver, paths)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the MCP SSE endpoints on `bind` and serve a [`DocsTools`] per session.
///
/// Cancelling `ct` closes the listener and every open session.
pub async fn start_mcp_sse(
    resolver: Arc<Resolver>,
    paths: &RoutePaths,
    bind: SocketAddr,
    ct: CancellationToken,
) -> Result<()> {
    let tools = DocsTools::new(resolver);
    SseServer::serve_with_config(SseServerConfig {
        bind,
        sse_path: paths.mcp_sse.clone(),
        post_path: paths.mcp_message.clone(),
        ct,
    })
    .await
    .with_context(|| format!("failed to bind MCP listener on {bind}"))?
    .with_service(move || tools.clone());
    Ok(())
}

/// Serve the HTTP API on `listener` and MCP on `mcp_bind` until `shutdown` is cancelled.
///
/// The MCP listener and its sessions run on a child of `shutdown`. TLS covers
/// the HTTP API only.
pub async fn serve(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    resolver: Arc<Resolver>,
    paths: &RoutePaths,
    mcp_bind: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    start_mcp_sse(resolver.clone(), paths, mcp_bind, shutdown.child_token()).await?;
    let router = app(resolver, paths);

    match tls {
        Some(acceptor) => serve_tls(listener, acceptor, router, shutdown).await,
        None => {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?
        }
    }
    Ok(())
}

/// Load a rustls acceptor from PEM certificate and key files.
pub fn load_tls_acceptor(cert_file: &Path, key_file: &Path) -> Result<TlsAcceptor> {
    let cert_reader = File::open(cert_file)
        .with_context(|| format!("failed to open certificate file {}", cert_file.display()))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_reader))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificate file {}", cert_file.display()))?;
    if certs.is_empty() {
        anyhow::bail!("no certificate found in {}", cert_file.display());
    }

    let key_reader = File::open(key_file)
        .with_context(|| format!("failed to open key file {}", key_file.display()))?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_reader))
        .with_context(|| format!("failed to parse key file {}", key_file.display()))?
        .with_context(|| format!("no private key found in {}", key_file.display()))?;

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid TLS certificate or key")?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Accept TLS connections until `ct` is cancelled, serving each one on its own task.
async fn serve_tls(listener: TcpListener, acceptor: TlsAcceptor, app: Router, ct: CancellationToken) {
    loop {
        let (tcp, peer) = tokio::select! {
            _ = ct.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(tcp).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!("TLS handshake failed from {}: {}", peer, e);
                    return;
                }
            };
            let service =
                hyper::service::service_fn(move |request: Request<Incoming>| app.clone().oneshot(request));
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!("Connection error from {}: {}", peer, e);
            }
        });
    }
}

fn log_startup(settings: &Settings, paths: &RoutePaths, api_addr: SocketAddr, mcp_addr: SocketAddr, tls: bool) {
    for line in settings.to_string().lines() {
        tracing::info!("{}", line);
    }
    for (route, methods) in API_ROUTES {
        tracing::info!("Route  {:<40} {}", format!("{}{}", paths.api, route), methods);
    }
    tracing::info!("Route  {:<40} GET", "/docs");
    tracing::info!("Route  {:<40} GET", "/openapi.json");
    tracing::info!("MCP    {:<40} GET (SSE)", paths.mcp_sse);
    tracing::info!("MCP    {:<40} POST", paths.mcp_message);

    let scheme = if tls { "https" } else { "http" };
    tracing::info!("HTTP API listening on {}://{}", scheme, api_addr);
    tracing::info!("MCP SSE listening on http://{}", mcp_addr);
}

/// Serve the HTTP API and MCP SSE endpoints until Ctrl-C.
pub async fn start_http_server(settings: &Settings) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(&settings.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let paths = settings.routes();
    let resolver = build_resolver(settings)?;
    let tls = settings
        .tls_files()
        .map(|(cert, key)| load_tls_acceptor(cert, key))
        .transpose()?;

    let listener = TcpListener::bind(settings.bind_addr()?)
        .await
        .context("failed to bind listener")?;
    let api_addr = listener.local_addr()?;
    let mcp_addr = settings.mcp_bind_addr()?;
    log_startup(settings, &paths, api_addr, mcp_addr, tls.is_some());

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down");
            }
            shutdown.cancel();
        }
    });

    serve(listener, tls, resolver, &paths, mcp_addr, shutdown).await
}

/// Serve the MCP tools over stdin/stdout.
pub async fn start_stdio_server(settings: &Settings) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&settings.log_level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting MCP server on stdio");

    let resolver = build_resolver(settings)?;
    let service = DocsTools::new(resolver).serve(stdio()).await.inspect_err(|e| {
        tracing::error!("serving error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}

pub async fn run(settings: Settings) -> Result<()> {
    match settings.server_type {
        ServerType::Http => start_http_server(&settings).await,
        ServerType::Stdio => start_stdio_server(&settings).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_tls_missing_files() {
        let err = load_tls_acceptor(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("failed to open certificate file"));
    }

    #[test]
    fn test_tls_rejects_empty_pem() {
        let mut cert = NamedTempFile::new().unwrap();
        writeln!(cert, "not a certificate").unwrap();
        let key = NamedTempFile::new().unwrap();

        let err = load_tls_acceptor(cert.path(), key.path()).err().unwrap();
        assert!(err.to_string().contains("no certificate found"));
    }
}
