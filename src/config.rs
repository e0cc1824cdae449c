//! Process configuration.
//!
//! Every setting is a command-line flag backed by an environment variable and
//! is read exactly once at startup. The resulting [`Settings`] value is never
//! mutated afterwards.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use url::Url;

/// API key used to authenticate against the documentation provider.
///
/// Cheap to clone and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key.into())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServerType {
    /// Serve the HTTP API and the MCP SSE endpoints
    Http,
    /// Serve MCP tools over stdin/stdout
    Stdio,
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Interface to serve on
    #[arg(long, env = "SERVER_TYPE", value_enum, default_value_t = ServerType::Http)]
    pub server_type: ServerType,

    /// Address to bind the HTTP listener to
    #[arg(long, env = "APP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP listener to
    #[arg(long, env = "APP_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Port of the MCP SSE listener, bound on the same host
    #[arg(long, env = "MCP_PORT", default_value_t = 8001)]
    pub mcp_port: u16,

    /// Prefix of the HTTP API routes
    #[arg(long, env = "API_PATH", default_value = "/api")]
    pub api_path: String,

    /// Prefix of the MCP endpoints (`<path>/sse` and `<path>/message`)
    #[arg(long, env = "MCP_PATH", default_value = "/mcp")]
    pub mcp_path: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// PEM certificate chain; TLS is enabled when both this and --key-file are set
    #[arg(long, env = "CERT_FILE")]
    pub cert_file: Option<PathBuf>,

    /// PEM private key matching --cert-file
    #[arg(long, env = "KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// Base URL of the Context7 API
    #[arg(long, env = "CONTEXT7_API_BASE_URL", default_value = "https://context7.com/api")]
    pub api_base_url: Url,

    /// Context7 API key
    #[arg(long, env = "CONTEXT7_API_KEY", hide_env_values = true)]
    pub api_key: Option<ApiKey>,

    /// Token budget requested from the provider when a call does not give one
    #[arg(long, env = "DEFAULT_TOKENS", default_value_t = 10_000)]
    pub default_tokens: u32,

    /// Smaller token budgets are raised to this value
    #[arg(long, env = "MINIMUM_TOKENS", default_value_t = 1_000)]
    pub minimum_tokens: u32,

    /// Timeout for a single provider request, in seconds
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl Settings {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.resolve(self.port)
    }

    pub fn mcp_bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.resolve(self.mcp_port)
    }

    fn resolve(&self, port: u16) -> anyhow::Result<SocketAddr> {
        (self.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| anyhow::anyhow!("invalid listen address {}:{port}: {e}", self.host))?
            .next()
            .ok_or_else(|| anyhow::anyhow!("{} resolved to no address", self.host))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Certificate and key paths, if TLS is fully configured.
    pub fn tls_files(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }

    pub fn token_limits(&self) -> TokenLimits {
        TokenLimits {
            default_tokens: self.default_tokens,
            minimum_tokens: self.minimum_tokens,
        }
    }

    pub fn routes(&self) -> RoutePaths {
        RoutePaths::new(&self.api_path, &self.mcp_path)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T: fmt::Debug>(value: &Option<T>) -> String {
            value.as_ref().map_or("-".to_string(), |v| format!("{v:?}"))
        }

        writeln!(f, "Loaded config:")?;
        writeln!(f, "  server_type: {:?}", self.server_type)?;
        writeln!(f, "  host: {}", self.host)?;
        writeln!(f, "  port: {}", self.port)?;
        writeln!(f, "  mcp_port: {}", self.mcp_port)?;
        writeln!(f, "  api_path: {}", self.api_path)?;
        writeln!(f, "  mcp_path: {}", self.mcp_path)?;
        writeln!(f, "  log_level: {}", self.log_level)?;
        writeln!(f, "  cert_file: {}", opt(&self.cert_file))?;
        writeln!(f, "  key_file: {}", opt(&self.key_file))?;
        writeln!(f, "  api_base_url: {}", self.api_base_url)?;
        writeln!(
            f,
            "  api_key: {}",
            self.api_key.as_ref().map_or("-".to_string(), ApiKey::to_string)
        )?;
        writeln!(f, "  default_tokens: {}", self.default_tokens)?;
        writeln!(f, "  minimum_tokens: {}", self.minimum_tokens)?;
        write!(f, "  timeout_secs: {}", self.timeout_secs)
    }
}

/// Token budget policy applied before a request reaches the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    pub default_tokens: u32,
    pub minimum_tokens: u32,
}

impl TokenLimits {
    /// Picks the default for a missing budget and raises small ones to the minimum.
    pub fn effective(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.default_tokens).max(self.minimum_tokens)
    }
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            default_tokens: 10_000,
            minimum_tokens: 1_000,
        }
    }
}

/// Normalized mount points of both interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePaths {
    /// API prefix without trailing slash; empty when mounted at the root.
    pub api: String,
    pub mcp_sse: String,
    pub mcp_message: String,
}

impl RoutePaths {
    pub fn new(api_path: &str, mcp_path: &str) -> Self {
        let api = normalize_prefix(api_path);
        let mcp = normalize_prefix(mcp_path);
        Self {
            api,
            mcp_sse: format!("{mcp}/sse"),
            mcp_message: format!("{mcp}/message"),
        }
    }
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self::new("/api", "/mcp")
    }
}

fn normalize_prefix(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
