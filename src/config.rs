use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Microsoft identity platform token endpoint
pub const DEFAULT_TOKEN_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Default location of the persisted credential set
pub const DEFAULT_TOKEN_STORE_PATH: &str = "~/.graph-token-manager/tokens.json";

/// Scopes requested on every token exchange. Never negotiated per call.
pub const DEFAULT_SCOPES: &[&str] = &[
    "offline_access",
    "User.Read",
    "Mail.Read",
    "Mail.Send",
    "Calendars.Read",
    "Calendars.ReadWrite",
    "Contacts.Read",
];

/// Graph Token Manager - credential lifecycle for Microsoft Graph
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the persisted token record
    #[arg(short = 's', long, env = "TOKEN_STORE_PATH")]
    pub token_store: Option<String>,

    /// Identity provider token endpoint
    #[arg(short = 'e', long, env = "MS_TOKEN_ENDPOINT")]
    pub token_endpoint: Option<String>,

    /// Use synthetic tokens instead of talking to the identity provider
    #[arg(long, env = "USE_TEST_MODE", default_value = "false")]
    pub test_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Report whether a credential set is stored
    Status,
    /// Print a currently valid access token, renewing it if needed
    Token,
    /// Store a synthetic one-hour credential set
    TestLogin,
    /// Exchange an authorization code for a new credential set
    Authorize {
        /// Authorization code returned by the consent redirect
        #[arg(long)]
        code: String,

        /// Redirect URI used when the code was issued
        #[arg(long)]
        redirect_uri: String,
    },
}

/// Settings consumed by the credential lifecycle core
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_endpoint: String,
    pub token_store_path: PathBuf,
    pub scopes: Vec<String>,
    pub test_mode: bool,
    pub http_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            token_store_path: expand_tilde(DEFAULT_TOKEN_STORE_PATH),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            test_mode: false,
            http_timeout_secs: 30,
        }
    }
}

impl AuthConfig {
    /// Apply process environment on top of this config (environment wins)
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty("MS_CLIENT_ID") {
            self.client_id = Some(id);
        }
        if let Some(secret) = non_empty("MS_CLIENT_SECRET") {
            self.client_secret = Some(secret);
        }
        if let Some(endpoint) = non_empty("MS_TOKEN_ENDPOINT") {
            self.token_endpoint = endpoint;
        }
        if let Some(path) = non_empty("TOKEN_STORE_PATH") {
            self.token_store_path = expand_tilde(&path);
        }
        if let Some(flag) = non_empty("USE_TEST_MODE") {
            self.test_mode = parse_bool(&flag);
        }

        self
    }
}

/// Binary configuration: parsed CLI plus the core settings it feeds
#[derive(Clone, Debug)]
pub struct Config {
    pub auth: AuthConfig,
    pub log_level: String,
    pub command: Command,
}

impl Config {
    /// Load configuration: CLI (with ENV fallback) > defaults, then the
    /// environment overrides from `AuthConfig::with_env_overrides`
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let mut auth = AuthConfig {
            test_mode: args.test_mode,
            http_timeout_secs: args.http_timeout,
            ..AuthConfig::default()
        };
        if let Some(path) = args.token_store {
            auth.token_store_path = expand_tilde(&path);
        }
        if let Some(endpoint) = args.token_endpoint {
            auth.token_endpoint = endpoint;
        }

        Ok(Config {
            auth: auth.with_env_overrides(),
            log_level: args.log_level,
            command: args.command,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.http_timeout_secs == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        let endpoint = self.auth.token_endpoint.as_str();
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            anyhow::bail!("MS_TOKEN_ENDPOINT must be an http(s) URL: {}", endpoint);
        }

        if let Some(parent) = self.auth.token_store_path.parent() {
            if parent.is_file() {
                anyhow::bail!(
                    "TOKEN_STORE_PATH is not usable, parent is a file: {}",
                    parent.display()
                );
            }
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
