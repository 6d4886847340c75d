use config::AuthConfig;
use std::collections::HashMap;

use super::ports::{CallbackUrlBuilder, ConsumerCredentials, CredentialsProvider};

/// Consumer credentials read from configuration at startup
#[derive(Debug, Clone, Default)]
pub struct ConfiguredCredentials {
    by_provider: HashMap<String, ConsumerCredentials>,
}

impl ConfiguredCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let by_provider = config
            .providers
            .iter()
            .map(|(name, provider)| {
                let mut credentials =
                    ConsumerCredentials::new(&provider.client_id, &provider.client_secret);
                credentials.scope = provider.scope.clone();
                (name.clone(), credentials)
            })
            .collect();
        Self { by_provider }
    }

    pub fn insert(&mut self, provider: impl Into<String>, credentials: ConsumerCredentials) {
        self.by_provider.insert(provider.into(), credentials);
    }
}

impl CredentialsProvider for ConfiguredCredentials {
    fn credentials_for(&self, provider: &str) -> Option<ConsumerCredentials> {
        self.by_provider.get(provider).cloned()
    }
}

/// Builds `{base}/auth/{provider}/callback`
#[derive(Debug, Clone)]
pub struct CallbackBaseUrl {
    base: String,
}

impl CallbackBaseUrl {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl CallbackUrlBuilder for CallbackBaseUrl {
    fn callback_url_for(&self, provider: &str) -> Option<String> {
        if provider.is_empty() {
            return None;
        }
        Some(format!(
            "{}/auth/{}/callback",
            self.base,
            urlencoding::encode(provider)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ProviderCredentialsConfig;

    #[test]
    fn test_credentials_from_config() {
        let mut config = AuthConfig::default();
        config.providers.insert(
            "google".to_string(),
            ProviderCredentialsConfig {
                client_id: "gid".to_string(),
                client_secret: "gsecret".to_string(),
                scope: Some("email".to_string()),
            },
        );

        let credentials = ConfiguredCredentials::from_config(&config);
        let google = credentials.credentials_for("google").unwrap();

        assert_eq!(google.key, "gid");
        assert_eq!(google.secret, "gsecret");
        assert_eq!(google.scope.as_deref(), Some("email"));
        assert!(credentials.credentials_for("twitter").is_none());
    }

    #[test]
    fn test_callback_url() {
        let builder = CallbackBaseUrl::new("https://app.example.com/");
        assert_eq!(
            builder.callback_url_for("windows_live").as_deref(),
            Some("https://app.example.com/auth/windows_live/callback")
        );
        assert_eq!(builder.callback_url_for(""), None);

        let relative = CallbackBaseUrl::new("");
        assert_eq!(
            relative.callback_url_for("google").as_deref(),
            Some("/auth/google/callback")
        );
    }
}
