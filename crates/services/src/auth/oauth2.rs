use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::csrf::{CsrfTokenService, CSRF_SESSION_KEY, CSRF_STATE_PARAM};
use super::ports::{
    AuthError, AuthInfo, CallbackUrlBuilder, ConsumerCredentials, CredentialsProvider,
    HttpRequest, HttpTransport, OAuth2AuthInfo, ProtocolDriver, RequestContext, UserInfo,
};
use super::profile::{ensure_success, fetch_user_info, profile_endpoint, with_query};
use super::registry::ProviderConfig;

/// OAuth 2.0 authorization-code flow
pub struct OAuth2Driver {
    credentials: Arc<dyn CredentialsProvider>,
    callbacks: Arc<dyn CallbackUrlBuilder>,
    transport: Arc<dyn HttpTransport>,
    csrf: Option<CsrfTokenService>,
}

impl OAuth2Driver {
    pub fn new(
        credentials: Arc<dyn CredentialsProvider>,
        callbacks: Arc<dyn CallbackUrlBuilder>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            credentials,
            callbacks,
            transport,
            csrf: None,
        }
    }

    /// Enables the `state` round-trip check
    pub fn with_csrf(mut self, csrf: CsrfTokenService) -> Self {
        self.csrf = Some(csrf);
        self
    }

    fn client(&self, provider: &str) -> Result<(ConsumerCredentials, String), AuthError> {
        let credentials = self
            .credentials
            .credentials_for(provider)
            .filter(ConsumerCredentials::is_complete)
            .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))?;
        let callback_url = self
            .callbacks
            .callback_url_for(provider)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))?;
        Ok((credentials, callback_url))
    }

    /// Pops the session token before anything else so it is single use
    /// whatever the outcome of the callback.
    async fn take_session_token(
        &self,
        ctx: &RequestContext<'_>,
    ) -> Result<Option<String>, AuthError> {
        if self.csrf.is_none() {
            return Ok(None);
        }
        let stored = ctx.session.pop(CSRF_SESSION_KEY).await?;
        Ok(stored.and_then(|value| value.as_str().map(str::to_string)))
    }

    fn check_state(
        &self,
        provider: &str,
        stored: Option<String>,
        ctx: &RequestContext<'_>,
    ) -> Result<(), AuthError> {
        let Some(csrf) = &self.csrf else {
            return Ok(());
        };

        let Some(expected) = stored.filter(|token| !token.is_empty()) else {
            warn!("Rejected {} callback: no CSRF token in session", provider);
            return Err(AuthError::MissingCsrfToken);
        };

        let candidate = ctx.param(CSRF_STATE_PARAM).unwrap_or_default();
        if !csrf.validate(&candidate, &expected) {
            warn!("Rejected {} callback: CSRF token mismatch or expired", provider);
            return Err(AuthError::InvalidCsrfToken);
        }
        Ok(())
    }
}

#[async_trait]
impl ProtocolDriver for OAuth2Driver {
    async fn init(
        &self,
        provider: &str,
        config: &ProviderConfig,
        ctx: &RequestContext<'_>,
    ) -> Result<String, AuthError> {
        let (credentials, callback_url) = self.client(provider)?;

        let mut params: Vec<(&str, String)> = vec![
            ("response_type", "code".to_string()),
            ("client_id", credentials.key.clone()),
            ("redirect_uri", callback_url),
        ];
        if let Some(scope) = credentials.scope.filter(|scope| !scope.is_empty()) {
            params.push(("scope", scope));
        }

        let state = self.csrf.as_ref().map(CsrfTokenService::generate);
        if let Some(token) = &state {
            params.push((CSRF_STATE_PARAM, token.clone()));
        }

        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        let target = config
            .authorization_url(&query)
            .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))?;

        if let Some(token) = state {
            ctx.session
                .set(CSRF_SESSION_KEY, serde_json::Value::String(token))
                .await?;
        }

        debug!("Redirecting to {} authorization endpoint", provider);
        Ok(target)
    }

    async fn callback(
        &self,
        provider: &str,
        config: &ProviderConfig,
        ctx: &RequestContext<'_>,
    ) -> Result<(UserInfo, AuthInfo), AuthError> {
        let stored_state = self.take_session_token(ctx).await?;

        if let Some(error) = ctx.param("error") {
            return Err(AuthError::ProviderError(error));
        }

        self.check_state(provider, stored_state, ctx)?;

        let code = ctx
            .param("code")
            .ok_or(AuthError::MissingAuthorizationCode)?;
        let (credentials, callback_url) = self.client(provider)?;
        let token_url = config
            .token_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))?;

        debug!("Exchanging {} authorization code", provider);
        let request = HttpRequest::post_form(
            token_url,
            &[
                ("code", code.as_str()),
                ("client_id", credentials.key.as_str()),
                ("client_secret", credentials.secret.as_str()),
                ("redirect_uri", callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ],
        );
        let response = self.transport.fetch(request).await?;
        ensure_success(&response, token_url)?;

        let token_response = config.token_format.parse(&response.body)?;
        let auth_info = OAuth2AuthInfo::from_token_response(token_response)?;

        let profile_url = with_query(
            &profile_endpoint(provider, config)?.url,
            &[("access_token", auth_info.access_token.as_str())],
        );
        let user_info = fetch_user_info(
            self.transport.as_ref(),
            provider,
            config,
            HttpRequest::get(profile_url),
        )
        .await?;

        Ok((user_info, AuthInfo::OAuth2(auth_info)))
    }
}
