use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    time::Duration,
};

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for MCP (Model Context Protocol) settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpConfig {
    /// Whether MCP is enabled or disabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// The path for the MCP endpoint.
    #[serde(default = "default_path")]
    pub path: String,
    /// Caching behavior for the resolved downstream tool/server list.
    #[serde(default)]
    pub downstream_cache: McpDownstreamCacheConfig,
    /// Map of server names to their configurations.
    #[serde(default)]
    pub servers: BTreeMap<String, McpServer>,
    /// Whether to include structured content in tool call results.
    #[serde(default = "default_enable_structured_content")]
    pub enable_structured_content: bool,
    /// Extra headers forwarded to downstream MCP servers on every request.
    #[serde(default)]
    pub headers: Vec<HeaderRule>,
}

impl McpConfig {
    /// Whether MCP is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether any downstream servers are configured.
    pub fn has_servers(&self) -> bool {
        !self.servers.is_empty()
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/mcp".to_string(),
            downstream_cache: McpDownstreamCacheConfig::default(),
            servers: BTreeMap::new(),
            enable_structured_content: true,
            headers: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "/mcp".to_string()
}

fn default_enable_structured_content() -> bool {
    true
}

/// A single static header attached to every outgoing downstream request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRule {
    pub name: String,
    pub value: String,
}

/// How the resolved tool/server list for each downstream is cached before refreshing.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpDownstreamCacheConfig {
    /// Maximum number of downstream tool-list entries to keep cached.
    #[serde(default = "default_cache_max_size")]
    pub max_size: u64,
    /// How long an entry may sit idle before it is evicted.
    #[serde(default = "default_cache_idle_timeout", deserialize_with = "deserialize_duration")]
    pub idle_timeout: Duration,
}

impl Default for McpDownstreamCacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            idle_timeout: default_cache_idle_timeout(),
        }
    }
}

fn default_cache_max_size() -> u64 {
    1000
}

fn default_cache_idle_timeout() -> Duration {
    Duration::from_secs(600)
}

/// Per-server (or per-tool) request budget, independent of the gateway's own rate limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpServerRateLimit {
    pub limit: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

/// Per-tool allow/deny access control, layered under a server's own rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolAccessConfig {
    #[serde(default)]
    pub allow: Option<BTreeSet<String>>,
    #[serde(default)]
    pub deny: Option<BTreeSet<String>>,
}

/// Configuration for an individual MCP server.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged, rename_all = "kebab-case")]
pub enum McpServer {
    /// A server that runs as a subprocess with command and arguments.
    Stdio(Box<StdioConfig>),
    /// A server accessible via HTTP, either streamable-http or SSE.
    Http(Box<HttpConfig>),
}

impl McpServer {
    pub fn allow(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Stdio(config) => config.allow.as_ref(),
            Self::Http(config) => config.allow.as_ref(),
        }
    }

    pub fn deny(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Stdio(config) => config.deny.as_ref(),
            Self::Http(config) => config.deny.as_ref(),
        }
    }

    pub fn tool_access_configs(&self) -> &BTreeMap<String, ToolAccessConfig> {
        match self {
            Self::Stdio(config) => &config.tools,
            Self::Http(config) => &config.tools,
        }
    }

    pub fn rate_limits(&self) -> Option<&McpServerRateLimit> {
        match self {
            Self::Stdio(config) => config.rate_limits.as_ref(),
            Self::Http(config) => config.rate_limits.as_ref(),
        }
    }
}

/// A server run as a local subprocess, speaking MCP over stdio.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StdioConfig {
    /// Command and arguments used to spawn the server.
    pub cmd: Vec<String>,
    /// Extra environment variables passed to the subprocess.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory the subprocess is spawned in.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Where the subprocess's stderr stream is sent.
    #[serde(default)]
    pub stderr: StdioTarget,
    #[serde(default)]
    pub rate_limits: Option<McpServerRateLimit>,
    #[serde(default)]
    pub allow: Option<BTreeSet<String>>,
    #[serde(default)]
    pub deny: Option<BTreeSet<String>>,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolAccessConfig>,
}

/// A server reachable over HTTP, either via the streamable-http transport or legacy SSE.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    pub url: Url,
    #[serde(default)]
    pub message_url: Option<Url>,
    #[serde(default)]
    pub protocol: Option<HttpProtocol>,
    #[serde(default)]
    pub tls: Option<TlsClientConfig>,
    #[serde(default)]
    pub auth: Option<ClientAuthConfig>,
    #[serde(default)]
    pub rate_limits: Option<McpServerRateLimit>,
    #[serde(default)]
    pub allow: Option<BTreeSet<String>>,
    #[serde(default)]
    pub deny: Option<BTreeSet<String>>,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolAccessConfig>,
}

impl HttpConfig {
    pub fn uses_streamable_http(&self) -> bool {
        matches!(self.protocol, Some(HttpProtocol::StreamingHttp))
    }

    pub fn uses_sse(&self) -> bool {
        matches!(self.protocol, Some(HttpProtocol::Sse))
    }
}

/// Protocol type for HTTP-based MCP servers.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HttpProtocol {
    /// Server-Sent Events protocol.
    Sse,
    /// Streaming HTTP protocol.
    #[default]
    StreamingHttp,
}

/// TLS settings for outgoing connections to a downstream HTTP server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsClientConfig {
    #[serde(default = "default_verify_certs")]
    pub verify_certs: bool,
    #[serde(default)]
    pub accept_invalid_hostnames: bool,
    #[serde(default)]
    pub root_ca_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub client_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub client_key_path: Option<PathBuf>,
}

fn default_verify_certs() -> bool {
    true
}

/// Authentication used when connecting to a downstream HTTP MCP server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientAuthConfig {
    Token(TokenAuthConfig),
    Oauth(OauthClientAuthConfig),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenAuthConfig {
    pub token: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OauthClientAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Where a subprocess's stderr is redirected.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(untagged)]
pub enum StdioTarget {
    #[default]
    Inherit,
    Simple(StdioTargetType),
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StdioTargetType {
    Inherit,
    Null,
    Piped,
}
