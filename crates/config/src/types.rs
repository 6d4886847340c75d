use serde::Deserialize;
use std::{collections::HashMap, env};

/// Freshness window for an OAuth 2.0 CSRF token: one login round-trip.
pub const DEFAULT_CSRF_TOKEN_TIMEOUT_SECS: i64 = 60;

/// Providers whose credentials can be supplied through environment variables.
pub const ENV_CONFIGURABLE_PROVIDERS: [&str; 5] =
    ["google", "facebook", "windows_live", "twitter", "linkedin"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub csrf: CsrfConfig,
    /// Absolute base used to build `/auth/{provider}/callback` URLs
    pub callback_base_url: Option<String>,
    /// Consumer key/secret (and optional scope) per provider name
    pub providers: HashMap<String, ProviderCredentialsConfig>,
    /// Extra registry entries added (or overriding seeded ones) at startup
    pub custom_providers: HashMap<String, CustomProviderConfig>,
}

impl AuthConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let mut providers = HashMap::new();

        for provider in ENV_CONFIGURABLE_PROVIDERS {
            let prefix = provider.to_uppercase();
            if let (Ok(client_id), Ok(client_secret)) = (
                env::var(format!("{prefix}_CLIENT_ID")),
                env::var(format!("{prefix}_CLIENT_SECRET")),
            ) {
                providers.insert(
                    provider.to_string(),
                    ProviderCredentialsConfig {
                        client_id,
                        client_secret,
                        scope: env::var(format!("{prefix}_SCOPE")).ok(),
                    },
                );
            }
        }

        Ok(Self {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            csrf: CsrfConfig::from_env()?,
            callback_base_url: env::var("AUTH_CALLBACK_BASE_URL").ok(),
            providers,
            custom_providers: HashMap::new(),
        })
    }

    /// Credentials configured for a provider, if any
    pub fn credentials_for(&self, provider: &str) -> Option<&ProviderCredentialsConfig> {
        self.providers.get(provider)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| "SERVER_PORT must be a valid port number")?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Logging Configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub modules: HashMap<String, String>,
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let mut modules = HashMap::new();

        if let Ok(level) = env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }

        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            modules,
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("api".to_string(), "debug".to_string());
        modules.insert("services".to_string(), "debug".to_string());

        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            modules,
        }
    }
}

/// Anti-forgery protection for the OAuth 2.0 `state` round-trip.
/// Off by default so existing hosts keep their current redirect URLs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    pub enabled: bool,
    pub timeout_secs: i64,
}

impl CsrfConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            enabled: env::var("AUTH_CSRF_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .map_err(|_| "AUTH_CSRF_ENABLED must be true or false")?,
            timeout_secs: env::var("AUTH_CSRF_TIMEOUT_SECS")
                .ok()
                .map(|s| {
                    s.parse()
                        .map_err(|_| "AUTH_CSRF_TIMEOUT_SECS must be a number of seconds")
                })
                .transpose()?
                .unwrap_or(DEFAULT_CSRF_TOKEN_TIMEOUT_SECS),
        })
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: DEFAULT_CSRF_TOKEN_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderCredentialsConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderProtocol {
    OAuth1,
    OAuth2,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenResponseFormat {
    Json,
    QueryString,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProfileDocumentFormat {
    #[default]
    Json,
    Xml,
}

/// A host-defined provider entry
#[derive(Debug, Clone, Deserialize)]
pub struct CustomProviderConfig {
    pub protocol: ProviderProtocol,
    /// Authorization endpoint; `{query}` marks where the encoded query goes
    pub auth_url: String,
    pub token_url: String,
    #[serde(default)]
    pub request_token_url: Option<String>,
    /// Unset means `json` for OAuth 2.0 and `query_string` for OAuth 1.0a
    #[serde(default)]
    pub token_format: Option<TokenResponseFormat>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub profile_format: ProfileDocumentFormat,
    #[serde(default)]
    pub field_map: Vec<FieldMapConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FieldMapConfig {
    pub source: String,
    pub target: String,
    /// Optional template with a `{value}` placeholder
    #[serde(default)]
    pub template: Option<String>,
}
