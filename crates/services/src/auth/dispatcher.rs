use std::sync::Arc;
use tracing::{debug, error, info};

use super::csrf::CsrfTokenService;
use super::oauth1::OAuth1Driver;
use super::oauth2::OAuth2Driver;
use super::openid::OpenIdDriver;
use super::ports::{
    AuthError, AuthHooks, AuthInfo, CallbackUrlBuilder, CredentialsProvider, FederatedLogin,
    HttpTransport, ProtocolDriver, RequestContext, UserInfo,
};
use super::registry::{ProtocolFamily, ProviderRegistry};

/// Entry point for hosts: picks the provider's protocol driver, runs one
/// handshake step and hands the outcome to the host's hooks.
pub struct AuthEngine {
    registry: ProviderRegistry,
    oauth1: OAuth1Driver,
    oauth2: OAuth2Driver,
    openid: OpenIdDriver,
}

impl AuthEngine {
    pub fn builder() -> AuthEngineBuilder {
        AuthEngineBuilder::default()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    fn driver(&self, family: ProtocolFamily) -> &dyn ProtocolDriver {
        match family {
            ProtocolFamily::OAuth1 => &self.oauth1,
            ProtocolFamily::OAuth2 => &self.oauth2,
            ProtocolFamily::OpenId => &self.openid,
        }
    }

    /// First step: the URL to send the user to
    pub async fn init(
        &self,
        provider: &str,
        ctx: &RequestContext<'_>,
    ) -> Result<String, AuthError> {
        let config = self.registry.lookup(provider)?;
        debug!("Starting {} sign-in for {}", config.family, provider);
        self.driver(config.family).init(provider, config, ctx).await
    }

    /// Second step: the signed-in user and their credentials
    pub async fn callback(
        &self,
        provider: &str,
        ctx: &RequestContext<'_>,
    ) -> Result<(UserInfo, AuthInfo), AuthError> {
        let config = self.registry.lookup(provider)?;
        debug!("Completing {} sign-in for {}", config.family, provider);
        self.driver(config.family).callback(provider, config, ctx).await
    }

    /// Runs the init step and turns the outcome into a host response.
    /// Failures never escape; they are routed to the host's hooks.
    pub async fn begin_auth<H: AuthHooks>(
        &self,
        provider: &str,
        ctx: &RequestContext<'_>,
        hooks: &H,
    ) -> H::Response {
        match self.init(provider, ctx).await {
            Ok(target) => hooks.redirect(&target),
            Err(e) => route_failure(provider, e, hooks),
        }
    }

    /// Runs the callback step and calls `on_sign_in` on success
    pub async fn complete_auth<H: AuthHooks>(
        &self,
        provider: &str,
        ctx: &RequestContext<'_>,
        hooks: &H,
    ) -> H::Response {
        match self.callback(provider, ctx).await {
            Ok((user_info, auth_info)) => {
                info!("User signed in with {}", provider);
                hooks.on_sign_in(user_info, auth_info, provider).await
            }
            Err(e) => route_failure(provider, e, hooks),
        }
    }
}

fn route_failure<H: AuthHooks>(provider: &str, err: AuthError, hooks: &H) -> H::Response {
    if err.is_provider_not_supported() {
        error!("Provider {} is not supported", provider);
        hooks.provider_not_supported(provider)
    } else {
        error!("Authentication with {} failed: {}", provider, err);
        hooks.auth_error(provider, &err.to_string())
    }
}

/// Wires the engine's collaborators. Credentials, callback URLs and a
/// transport are required; OpenID support and CSRF protection are optional.
#[derive(Default)]
pub struct AuthEngineBuilder {
    registry: Option<ProviderRegistry>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    callbacks: Option<Arc<dyn CallbackUrlBuilder>>,
    transport: Option<Arc<dyn HttpTransport>>,
    federated_login: Option<Arc<dyn FederatedLogin>>,
    csrf: Option<CsrfTokenService>,
}

impl AuthEngineBuilder {
    /// Defaults to the seeded registry
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn callback_urls(mut self, callbacks: Arc<dyn CallbackUrlBuilder>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn federated_login(mut self, platform: Arc<dyn FederatedLogin>) -> Self {
        self.federated_login = Some(platform);
        self
    }

    pub fn csrf(mut self, csrf: Option<CsrfTokenService>) -> Self {
        self.csrf = csrf;
        self
    }

    pub fn build(self) -> Result<AuthEngine, AuthError> {
        let credentials = self
            .credentials
            .ok_or_else(|| AuthError::ConfigError("credentials provider is required".into()))?;
        let callbacks = self
            .callbacks
            .ok_or_else(|| AuthError::ConfigError("callback URL builder is required".into()))?;
        let transport = self
            .transport
            .ok_or_else(|| AuthError::ConfigError("HTTP transport is required".into()))?;

        let mut oauth2 =
            OAuth2Driver::new(credentials.clone(), callbacks.clone(), transport.clone());
        if let Some(csrf) = self.csrf {
            oauth2 = oauth2.with_csrf(csrf);
        }

        Ok(AuthEngine {
            registry: self.registry.unwrap_or_default(),
            oauth1: OAuth1Driver::new(credentials, callbacks.clone(), transport),
            oauth2,
            openid: OpenIdDriver::new(callbacks, self.federated_login),
        })
    }
}
