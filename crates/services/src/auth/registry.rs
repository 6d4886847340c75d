use config::{
    CustomProviderConfig, FieldMapConfig, ProfileDocumentFormat, ProviderProtocol,
    TokenResponseFormat,
};
use std::collections::{BTreeMap, HashMap};

use super::parsers::{parse_json_object, parse_query_string, parse_xml_profile};
use super::ports::AuthError;

/// Placeholder in authorization URL templates for the encoded query string
pub const QUERY_PLACEHOLDER: &str = "{query}";
/// Placeholder in field templates for the source field's value
pub const VALUE_PLACEHOLDER: &str = "{value}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFamily {
    OAuth1,
    OAuth2,
    OpenId,
}

impl std::fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolFamily::OAuth1 => write!(f, "oauth1"),
            ProtocolFamily::OAuth2 => write!(f, "oauth2"),
            ProtocolFamily::OpenId => write!(f, "openid"),
        }
    }
}

/// How a provider encodes its token endpoint responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenFormat {
    #[default]
    Json,
    QueryString,
}

impl TokenFormat {
    pub fn parse(&self, body: &str) -> Result<BTreeMap<String, String>, AuthError> {
        match self {
            TokenFormat::Json => parse_json_object(body),
            TokenFormat::QueryString => Ok(parse_query_string(body)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileFormat {
    #[default]
    Json,
    Xml,
}

impl ProfileFormat {
    pub fn parse(&self, body: &str) -> Result<BTreeMap<String, String>, AuthError> {
        match self {
            ProfileFormat::Json => parse_json_object(body),
            ProfileFormat::Xml => parse_xml_profile(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEndpoint {
    pub url: String,
    pub format: ProfileFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTransform {
    Copy,
    /// Substitutes the source value for `{value}`
    Template(String),
}

/// One row of a provider's normalization table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
    pub transform: FieldTransform,
}

impl FieldMapping {
    pub fn copy(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            transform: FieldTransform::Copy,
        }
    }

    pub fn template(
        source: impl Into<String>,
        target: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            transform: FieldTransform::Template(template.into()),
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match &self.transform {
            FieldTransform::Copy => value.to_string(),
            FieldTransform::Template(template) => template.replace(VALUE_PLACEHOLDER, value),
        }
    }
}

impl From<&FieldMapConfig> for FieldMapping {
    fn from(config: &FieldMapConfig) -> Self {
        match &config.template {
            Some(template) => Self::template(&config.source, &config.target, template),
            None => Self::copy(&config.source, &config.target),
        }
    }
}

/// Static description of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub family: ProtocolFamily,
    /// Authorization endpoint template containing `{query}`
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    /// OAuth 1.0a temporary-credential endpoint
    pub request_token_url: Option<String>,
    /// Fixed OpenID identity; otherwise taken from the request
    pub openid_identity: Option<String>,
    pub token_format: TokenFormat,
    pub profile: Option<ProfileEndpoint>,
    pub field_map: Vec<FieldMapping>,
}

impl ProviderConfig {
    pub fn oauth2(auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            family: ProtocolFamily::OAuth2,
            auth_url: Some(auth_url.into()),
            token_url: Some(token_url.into()),
            request_token_url: None,
            openid_identity: None,
            token_format: TokenFormat::Json,
            profile: None,
            field_map: Vec::new(),
        }
    }

    pub fn oauth1(
        request_token_url: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            family: ProtocolFamily::OAuth1,
            request_token_url: Some(request_token_url.into()),
            token_format: TokenFormat::QueryString,
            ..Self::oauth2(auth_url, token_url)
        }
    }

    pub fn openid() -> Self {
        Self {
            family: ProtocolFamily::OpenId,
            auth_url: None,
            token_url: None,
            request_token_url: None,
            openid_identity: None,
            token_format: TokenFormat::Json,
            profile: None,
            field_map: Vec::new(),
        }
    }

    pub fn with_token_format(mut self, format: TokenFormat) -> Self {
        self.token_format = format;
        self
    }

    pub fn with_profile(mut self, url: impl Into<String>, format: ProfileFormat) -> Self {
        self.profile = Some(ProfileEndpoint {
            url: url.into(),
            format,
        });
        self
    }

    pub fn with_field(mut self, mapping: FieldMapping) -> Self {
        self.field_map.push(mapping);
        self
    }

    pub fn with_openid_identity(mut self, identity: impl Into<String>) -> Self {
        self.openid_identity = Some(identity.into());
        self
    }

    /// Substitutes an already-encoded query string into the auth URL template.
    /// A template without `{query}` gets the query appended.
    pub fn authorization_url(&self, query: &str) -> Option<String> {
        let template = self.auth_url.as_deref().filter(|url| !url.is_empty())?;
        if template.contains(QUERY_PLACEHOLDER) {
            return Some(template.replace(QUERY_PLACEHOLDER, query));
        }
        let separator = if template.contains('?') { '&' } else { '?' };
        Some(format!("{template}{separator}{query}"))
    }
}

impl From<&CustomProviderConfig> for ProviderConfig {
    fn from(custom: &CustomProviderConfig) -> Self {
        let base = match custom.protocol {
            ProviderProtocol::OAuth2 => {
                ProviderConfig::oauth2(&custom.auth_url, &custom.token_url)
            }
            ProviderProtocol::OAuth1 => ProviderConfig {
                family: ProtocolFamily::OAuth1,
                request_token_url: custom.request_token_url.clone(),
                token_format: TokenFormat::QueryString,
                ..ProviderConfig::oauth2(&custom.auth_url, &custom.token_url)
            },
        };

        let token_format = match custom.token_format {
            Some(TokenResponseFormat::Json) => TokenFormat::Json,
            Some(TokenResponseFormat::QueryString) => TokenFormat::QueryString,
            None => base.token_format,
        };
        let profile_format = match custom.profile_format {
            ProfileDocumentFormat::Json => ProfileFormat::Json,
            ProfileDocumentFormat::Xml => ProfileFormat::Xml,
        };

        let mut provider = base.with_token_format(token_format);
        if let Some(url) = &custom.profile_url {
            provider = provider.with_profile(url, profile_format);
        }
        provider.field_map = custom.field_map.iter().map(FieldMapping::from).collect();
        provider
    }
}

/// Provider name -> configuration. Seeded with the built-in providers;
/// hosts may add or override entries before serving requests.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry seeded with google, facebook, windows_live, twitter, linkedin and openid
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(
            "google",
            ProviderConfig::oauth2(
                "https://accounts.google.com/o/oauth2/auth?{query}",
                "https://accounts.google.com/o/oauth2/token",
            )
            .with_profile(
                "https://www.googleapis.com/oauth2/v1/userinfo",
                ProfileFormat::Json,
            )
            .with_field(FieldMapping::copy("picture", "avatar_url"))
            .with_field(FieldMapping::copy("name", "name"))
            .with_field(FieldMapping::copy("link", "link")),
        );

        registry.register(
            "windows_live",
            ProviderConfig::oauth2(
                "https://oauth.live.com/authorize?{query}",
                "https://oauth.live.com/token",
            )
            .with_profile("https://apis.live.net/v5.0/me", ProfileFormat::Json)
            .with_field(FieldMapping::template(
                "id",
                "avatar_url",
                "https://apis.live.net/v5.0/{value}/picture",
            ))
            .with_field(FieldMapping::copy("name", "name"))
            .with_field(FieldMapping::copy("link", "link")),
        );

        registry.register(
            "facebook",
            ProviderConfig::oauth2(
                "https://www.facebook.com/dialog/oauth?{query}",
                "https://graph.facebook.com/oauth/access_token",
            )
            .with_token_format(TokenFormat::QueryString)
            .with_profile("https://graph.facebook.com/me", ProfileFormat::Json)
            .with_field(FieldMapping::template(
                "id",
                "avatar_url",
                "http://graph.facebook.com/{value}/picture?type=large",
            ))
            .with_field(FieldMapping::copy("name", "name"))
            .with_field(FieldMapping::copy("link", "link")),
        );

        registry.register(
            "linkedin",
            ProviderConfig::oauth1(
                "https://api.linkedin.com/uas/oauth/requestToken",
                "https://www.linkedin.com/uas/oauth/authenticate?{query}",
                "https://api.linkedin.com/uas/oauth/accessToken",
            )
            .with_profile(
                "http://api.linkedin.com/v1/people/~:(id,first-name,last-name,picture-url,public-profile-url,headline)",
                ProfileFormat::Xml,
            )
            .with_field(FieldMapping::copy("picture-url", "avatar_url"))
            .with_field(FieldMapping::copy("first-name", "name"))
            .with_field(FieldMapping::copy("public-profile-url", "link")),
        );

        registry.register(
            "twitter",
            ProviderConfig::oauth1(
                "https://api.twitter.com/oauth/request_token",
                "https://api.twitter.com/oauth/authenticate?{query}",
                "https://api.twitter.com/oauth/access_token",
            )
            .with_profile(
                "https://api.twitter.com/1/account/verify_credentials.json",
                ProfileFormat::Json,
            )
            .with_field(FieldMapping::template(
                "screen_name",
                "link",
                "http://twitter.com/{value}",
            ))
            .with_field(FieldMapping::copy("profile_image_url", "avatar_url"))
            .with_field(FieldMapping::copy("screen_name", "name")),
        );

        registry.register(
            "openid",
            ProviderConfig::openid().with_field(FieldMapping::copy("nickname", "name")),
        );

        registry
    }

    /// Seeded registry plus host-defined providers from configuration
    pub fn with_custom(custom: &HashMap<String, CustomProviderConfig>) -> Self {
        let mut registry = Self::with_defaults();
        for (name, provider) in custom {
            registry.register(name.clone(), ProviderConfig::from(provider));
        }
        registry
    }

    /// Adds or replaces a provider, returning the previous entry
    pub fn register(
        &mut self,
        name: impl Into<String>,
        config: ProviderConfig,
    ) -> Option<ProviderConfig> {
        self.providers.insert(name.into(), config)
    }

    pub fn lookup(&self, name: &str) -> Result<&ProviderConfig, AuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| AuthError::ProviderNotSupported(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEEDED: [&str; 6] = [
        "google",
        "twitter",
        "linkedin",
        "openid",
        "facebook",
        "windows_live",
    ];

    #[test]
    fn test_seeded_providers_have_a_protocol_family() {
        let registry = ProviderRegistry::with_defaults();
        for name in SEEDED {
            let provider = registry.lookup(name).unwrap();
            assert!(matches!(
                provider.family,
                ProtocolFamily::OAuth1 | ProtocolFamily::OAuth2 | ProtocolFamily::OpenId
            ));
        }
        assert_eq!(registry.names().count(), SEEDED.len());
    }

    #[test]
    fn test_seeded_token_formats() {
        let registry = ProviderRegistry::default();
        let format = |name| registry.lookup(name).unwrap().token_format;

        assert_eq!(format("google"), TokenFormat::Json);
        assert_eq!(format("windows_live"), TokenFormat::Json);
        assert_eq!(format("facebook"), TokenFormat::QueryString);
        assert_eq!(format("linkedin"), TokenFormat::QueryString);
        assert_eq!(format("twitter"), TokenFormat::QueryString);
    }

    #[test]
    fn test_oauth_providers_carry_endpoints() {
        let registry = ProviderRegistry::with_defaults();
        for name in SEEDED {
            let provider = registry.lookup(name).unwrap();
            match provider.family {
                ProtocolFamily::OAuth2 => {
                    assert!(provider.auth_url.is_some());
                    assert!(provider.token_url.is_some());
                    assert!(provider.profile.is_some());
                }
                ProtocolFamily::OAuth1 => {
                    assert!(provider.request_token_url.is_some());
                    assert!(provider.auth_url.is_some());
                    assert!(provider.token_url.is_some());
                    assert!(provider.profile.is_some());
                }
                ProtocolFamily::OpenId => assert!(provider.auth_url.is_none()),
            }
        }
        assert_eq!(
            registry.lookup("linkedin").unwrap().profile.as_ref().unwrap().format,
            ProfileFormat::Xml
        );
    }

    #[test]
    fn test_unknown_provider_is_distinguished() {
        let registry = ProviderRegistry::with_defaults();
        let err = registry.lookup("xxx").unwrap_err();
        assert!(err.is_provider_not_supported());
        assert!(registry.lookup("").is_err());
        assert!(!registry.contains("xxx"));
    }

    #[test]
    fn test_register_overrides_entry() {
        let mut registry = ProviderRegistry::with_defaults();
        let previous = registry.register(
            "google",
            ProviderConfig::oauth2("https://proxy.example/auth?{query}", "https://proxy.example/token"),
        );

        assert!(previous.is_some());
        assert_eq!(
            registry.lookup("google").unwrap().auth_url.as_deref(),
            Some("https://proxy.example/auth?{query}")
        );
    }

    #[test]
    fn test_authorization_url_rendering() {
        let templated = ProviderConfig::oauth2("https://p.example/auth?{query}", "t");
        assert_eq!(
            templated.authorization_url("a=1").as_deref(),
            Some("https://p.example/auth?a=1")
        );

        let bare = ProviderConfig::oauth2("https://p.example/auth", "t");
        assert_eq!(
            bare.authorization_url("a=1").as_deref(),
            Some("https://p.example/auth?a=1")
        );

        let with_query = ProviderConfig::oauth2("https://p.example/auth?x=y", "t");
        assert_eq!(
            with_query.authorization_url("a=1").as_deref(),
            Some("https://p.example/auth?x=y&a=1")
        );

        assert_eq!(ProviderConfig::openid().authorization_url("a=1"), None);
    }

    #[test]
    fn test_field_mapping_apply() {
        assert_eq!(FieldMapping::copy("name", "name").apply("Dude"), "Dude");
        assert_eq!(
            FieldMapping::template("screen_name", "link", "http://twitter.com/{value}")
                .apply("dude"),
            "http://twitter.com/dude"
        );
    }

    #[test]
    fn test_custom_providers_from_config() {
        let mut custom = HashMap::new();
        custom.insert(
            "acme".to_string(),
            CustomProviderConfig {
                protocol: ProviderProtocol::OAuth1,
                auth_url: "https://acme.example/authorize?{query}".to_string(),
                token_url: "https://acme.example/access".to_string(),
                request_token_url: Some("https://acme.example/request".to_string()),
                token_format: None,
                profile_url: Some("https://acme.example/me.xml".to_string()),
                profile_format: ProfileDocumentFormat::Xml,
                field_map: vec![FieldMapConfig {
                    source: "login".to_string(),
                    target: "link".to_string(),
                    template: Some("https://acme.example/{value}".to_string()),
                }],
            },
        );

        let registry = ProviderRegistry::with_custom(&custom);
        let acme = registry.lookup("acme").unwrap();

        assert_eq!(acme.family, ProtocolFamily::OAuth1);
        assert_eq!(
            acme.request_token_url.as_deref(),
            Some("https://acme.example/request")
        );
        assert_eq!(acme.token_format, TokenFormat::QueryString);
        assert_eq!(acme.profile.as_ref().unwrap().format, ProfileFormat::Xml);
        assert_eq!(
            acme.field_map,
            vec![FieldMapping::template(
                "login",
                "link",
                "https://acme.example/{value}"
            )]
        );
        assert!(registry.contains("google"));
    }

    #[test]
    fn test_custom_token_format_defaults_per_protocol() {
        let custom = |protocol, token_format| CustomProviderConfig {
            protocol,
            auth_url: "https://legacy.example/authorize?{query}".to_string(),
            token_url: "https://legacy.example/access".to_string(),
            request_token_url: Some("https://legacy.example/request".to_string()),
            token_format,
            profile_url: None,
            profile_format: ProfileDocumentFormat::Json,
            field_map: Vec::new(),
        };

        let oauth1 = ProviderConfig::from(&custom(ProviderProtocol::OAuth1, None));
        assert_eq!(oauth1.token_format, TokenFormat::QueryString);
        let token = oauth1
            .token_format
            .parse("oauth_token=rt&oauth_token_secret=rs&oauth_callback_confirmed=true")
            .unwrap();
        assert_eq!(token.get("oauth_token").map(String::as_str), Some("rt"));

        let oauth2 = ProviderConfig::from(&custom(ProviderProtocol::OAuth2, None));
        assert_eq!(oauth2.token_format, TokenFormat::Json);

        let explicit = ProviderConfig::from(&custom(
            ProviderProtocol::OAuth1,
            Some(TokenResponseFormat::Json),
        ));
        assert_eq!(explicit.token_format, TokenFormat::Json);
    }
}
