use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

use super::registry::ProviderConfig;
use super::signing::OAuth1Signing;

// Domain models

/// Normalized profile of the signing-in user.
///
/// Keeps every raw field returned by the provider plus the common
/// vocabulary (`avatar_url`, `name`, `link`) added by the provider's
/// field mappings. `id` is always present on a completed handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserInfo(BTreeMap<String, String>);

impl UserInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id")
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.get("avatar_url")
    }

    pub fn link(&self) -> Option<&str> {
        self.get("link")
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), value.into())
    }

    /// Inserts only when the field is absent. Returns whether it was inserted.
    pub fn set_default(&mut self, field: &str, value: impl Into<String>) -> bool {
        if self.0.contains_key(field) {
            return false;
        }
        self.0.insert(field.to_string(), value.into());
        true
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for UserInfo {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserInfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Credential bundle produced by a completed handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum AuthInfo {
    OAuth2(OAuth2AuthInfo),
    OAuth1(OAuth1AuthInfo),
    OpenId(OpenIdAuthInfo),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2AuthInfo {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<String>,
    /// Full token response as parsed
    #[serde(default)]
    pub raw: BTreeMap<String, String>,
}

impl OAuth2AuthInfo {
    pub fn from_token_response(raw: BTreeMap<String, String>) -> Result<Self, AuthError> {
        let access_token = raw
            .get("access_token")
            .filter(|token| !token.is_empty())
            .cloned()
            .ok_or_else(|| {
                AuthError::InvalidTokenResponse("response has no access_token".to_string())
            })?;

        Ok(Self {
            access_token,
            token_type: raw.get("token_type").cloned(),
            expires_in: raw.get("expires_in").cloned(),
            raw,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth1AuthInfo {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub raw: BTreeMap<String, String>,
}

impl OAuth1AuthInfo {
    pub fn from_token_response(raw: BTreeMap<String, String>) -> Result<Self, AuthError> {
        let oauth_token = raw
            .get("oauth_token")
            .filter(|token| !token.is_empty())
            .cloned()
            .ok_or_else(|| {
                AuthError::InvalidTokenResponse("response has no oauth_token".to_string())
            })?;

        Ok(Self {
            oauth_token,
            oauth_token_secret: raw.get("oauth_token_secret").cloned().unwrap_or_default(),
            raw,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdAuthInfo {
    pub provider: String,
}

/// OAuth 1.0a temporary credentials held in session between init and callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToken {
    pub oauth_token: String,
    #[serde(default)]
    pub oauth_token_secret: String,
}

impl RequestToken {
    /// Builds a request token from a parsed provider response.
    /// Returns `None` when the response carries no token value.
    pub fn from_response(response: &BTreeMap<String, String>) -> Option<Self> {
        let oauth_token = response.get("oauth_token").filter(|t| !t.is_empty())?;
        Some(Self {
            oauth_token: oauth_token.clone(),
            oauth_token_secret: response
                .get("oauth_token_secret")
                .cloned()
                .unwrap_or_default(),
        })
    }
}

/// Identity resolved by the hosting platform after an OpenID round-trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedUser {
    pub federated_identity: Option<String>,
    pub federated_provider: Option<String>,
    pub nickname: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
    pub scope: Option<String>,
}

impl ConsumerCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub(crate) fn is_complete(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty()
    }
}

// Transport types

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// When set, the transport signs the request with OAuth 1.0a
    pub signed_with: Option<OAuth1Signing>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            signed_with: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    /// POST with an `application/x-www-form-urlencoded` body
    pub fn post_form(url: impl Into<String>, form: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        Self::post(url)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(body)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn signed_with(mut self, signing: OAuth1Signing) -> Self {
        self.signed_with = Some(signing);
        self
    }

    pub fn has_form_body(&self) -> bool {
        self.headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("content-type") && value.starts_with(FORM_CONTENT_TYPE)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Provider {0} is not supported")]
    ProviderNotSupported(String),

    #[error("Provider reported an error: {0}")]
    ProviderError(String),

    #[error("missing CSRF token")]
    MissingCsrfToken,

    #[error("invalid CSRF token")]
    InvalidCsrfToken,

    #[error("no request token found in session")]
    MissingRequestToken,

    #[error("no verifier was provided")]
    MissingVerifier,

    #[error("no authorization code was provided")]
    MissingAuthorizationCode,

    #[error("OpenID authentication failed")]
    OpenIdFailed,

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("Profile is missing required field: {0}")]
    MissingProfileField(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AuthError {
    /// Unknown providers and missing provider configuration are routed to the
    /// host's "provider not supported" hook rather than its error hook.
    pub fn is_provider_not_supported(&self) -> bool {
        matches!(self, AuthError::ProviderNotSupported(_))
    }
}

// Collaborator traits

/// Read access to the current request's query/form parameters
pub trait RequestParams: Send + Sync {
    fn param(&self, name: &str) -> Option<String>;
}

impl RequestParams for HashMap<String, String> {
    fn param(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl RequestParams for BTreeMap<String, String> {
    fn param(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Host-owned session storage that survives between the init and callback requests
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AuthError>;

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AuthError>;

    /// Removes and returns the value stored under `key`
    async fn pop(&self, key: &str) -> Result<Option<serde_json::Value>, AuthError>;
}

/// Per-request view handed to the protocol drivers
pub struct RequestContext<'a> {
    pub params: &'a dyn RequestParams,
    pub session: &'a dyn SessionStore,
}

impl<'a> RequestContext<'a> {
    pub fn new(params: &'a dyn RequestParams, session: &'a dyn SessionStore) -> Self {
        Self { params, session }
    }

    /// Request parameter, treating an empty value as absent
    pub fn param(&self, name: &str) -> Option<String> {
        self.params.param(name).filter(|value| !value.is_empty())
    }
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
pub trait CredentialsProvider: Send + Sync {
    /// Consumer key, secret and optional scope registered for `provider`
    fn credentials_for(&self, provider: &str) -> Option<ConsumerCredentials>;
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
pub trait CallbackUrlBuilder: Send + Sync {
    /// Absolute URL the provider should send the user back to
    fn callback_url_for(&self, provider: &str) -> Option<String>;
}

/// Outbound HTTP. Timeouts are the implementation's concern; any status is
/// returned as a response and judged by the caller.
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, AuthError>;
}

/// Platform primitives backing the OpenID driver
pub trait FederatedLogin: Send + Sync {
    fn login_url(&self, destination: &str, federated_identity: &str) -> Result<String, AuthError>;

    /// User the platform federated for this request, if any
    fn current_user(&self, params: &dyn RequestParams) -> Option<FederatedUser>;
}

/// Host callbacks invoked by the dispatcher once a step has finished
#[async_trait]
pub trait AuthHooks: Send + Sync {
    type Response: Send;

    fn redirect(&self, url: &str) -> Self::Response;

    /// The single success hook
    async fn on_sign_in(
        &self,
        user_info: UserInfo,
        auth_info: AuthInfo,
        provider: &str,
    ) -> Self::Response;

    fn provider_not_supported(&self, _provider: &str) -> Self::Response {
        self.redirect("/")
    }

    fn auth_error(&self, _provider: &str, _message: &str) -> Self::Response {
        self.redirect("/")
    }
}

/// One protocol family's handshake
#[async_trait]
pub trait ProtocolDriver: Send + Sync {
    /// Starts the handshake and returns the URL to redirect the user to
    async fn init(
        &self,
        provider: &str,
        config: &ProviderConfig,
        ctx: &RequestContext<'_>,
    ) -> Result<String, AuthError>;

    /// Finishes the handshake on the provider's callback
    async fn callback(
        &self,
        provider: &str,
        config: &ProviderConfig,
        ctx: &RequestContext<'_>,
    ) -> Result<(UserInfo, AuthInfo), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_user_info_set_default_keeps_existing() {
        let mut info: UserInfo = [("id", "42"), ("name", "Dude")].into_iter().collect();

        assert!(!info.set_default("name", "Other"));
        assert!(info.set_default("link", "http://example.org/dude"));
        assert_eq!(info.name(), Some("Dude"));
        assert_eq!(info.link(), Some("http://example.org/dude"));
        assert_eq!(info.id(), Some("42"));
        assert_eq!(info.avatar_url(), None);
    }

    #[test]
    fn test_oauth2_auth_info_requires_access_token() {
        let info = OAuth2AuthInfo::from_token_response(map(&[
            ("access_token", "at"),
            ("token_type", "Bearer"),
            ("expires_in", "3600"),
        ]))
        .unwrap();
        assert_eq!(info.access_token, "at");
        assert_eq!(info.token_type.as_deref(), Some("Bearer"));
        assert_eq!(info.expires_in.as_deref(), Some("3600"));
        assert_eq!(info.raw.len(), 3);

        let err = OAuth2AuthInfo::from_token_response(map(&[("error", "bad")])).unwrap_err();
        assert!(matches!(err, AuthError::InvalidTokenResponse(_)));
    }

    #[test]
    fn test_oauth1_auth_info_defaults_secret() {
        let info = OAuth1AuthInfo::from_token_response(map(&[("oauth_token", "t")])).unwrap();
        assert_eq!(info.oauth_token, "t");
        assert_eq!(info.oauth_token_secret, "");

        assert!(OAuth1AuthInfo::from_token_response(map(&[("oauth_token", "")])).is_err());
    }

    #[test]
    fn test_request_token_from_response() {
        let token = RequestToken::from_response(&map(&[
            ("oauth_token", "rt"),
            ("oauth_token_secret", "rs"),
            ("oauth_callback_confirmed", "true"),
        ]))
        .unwrap();
        assert_eq!(token.oauth_token, "rt");
        assert_eq!(token.oauth_token_secret, "rs");

        assert!(RequestToken::from_response(&map(&[("oauth_token_secret", "rs")])).is_none());
    }

    #[test]
    fn test_auth_info_serializes_with_protocol_tag() {
        let info = AuthInfo::OpenId(OpenIdAuthInfo {
            provider: "example.org".to_string(),
        });
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"protocol": "openid", "provider": "example.org"})
        );
    }

    #[test]
    fn test_post_form_encodes_body() {
        let request = HttpRequest::post_form(
            "https://example.org/token",
            &[("code", "a b"), ("redirect_uri", "/cb")],
        );
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some("code=a+b&redirect_uri=%2Fcb"));
        assert!(request.has_form_body());
        assert!(!HttpRequest::get("https://example.org").has_form_body());
    }

    #[test]
    fn test_provider_not_supported_classification() {
        assert!(AuthError::ProviderNotSupported("xxx".into()).is_provider_not_supported());
        assert!(!AuthError::MissingVerifier.is_provider_not_supported());
        assert!(!AuthError::InvalidCsrfToken.is_provider_not_supported());
    }
}
