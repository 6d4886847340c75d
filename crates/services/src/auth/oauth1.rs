use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::ports::{
    AuthError, AuthInfo, CallbackUrlBuilder, ConsumerCredentials, CredentialsProvider,
    HttpRequest, HttpTransport, OAuth1AuthInfo, ProtocolDriver, RequestContext, RequestToken,
    UserInfo,
};
use super::profile::{ensure_success, fetch_user_info, profile_endpoint};
use super::registry::ProviderConfig;
use super::signing::{OAuth1Signing, OAuth1Token};

/// Session key holding the pending request token between init and callback
pub const REQUEST_TOKEN_SESSION_KEY: &str = "req_token";

/// OAuth 1.0a three-legged flow
pub struct OAuth1Driver {
    credentials: Arc<dyn CredentialsProvider>,
    callbacks: Arc<dyn CallbackUrlBuilder>,
    transport: Arc<dyn HttpTransport>,
}

impl OAuth1Driver {
    pub fn new(
        credentials: Arc<dyn CredentialsProvider>,
        callbacks: Arc<dyn CallbackUrlBuilder>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            credentials,
            callbacks,
            transport,
        }
    }

    fn consumer(&self, provider: &str) -> Result<ConsumerCredentials, AuthError> {
        self.credentials
            .credentials_for(provider)
            .filter(ConsumerCredentials::is_complete)
            .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))
    }
}

fn required<'a>(provider: &str, url: Option<&'a str>) -> Result<&'a str, AuthError> {
    url.filter(|url| !url.is_empty())
        .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))
}

#[async_trait]
impl ProtocolDriver for OAuth1Driver {
    async fn init(
        &self,
        provider: &str,
        config: &ProviderConfig,
        ctx: &RequestContext<'_>,
    ) -> Result<String, AuthError> {
        let consumer = self.consumer(provider)?;
        let callback_url = self
            .callbacks
            .callback_url_for(provider)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))?;
        let request_token_url = required(provider, config.request_token_url.as_deref())?;
        required(provider, config.auth_url.as_deref())?;

        let signing = OAuth1Signing::new(&consumer.key, &consumer.secret);
        let response = self
            .transport
            .fetch(HttpRequest::get(request_token_url).signed_with(signing))
            .await?;
        if response.status != 200 {
            return Err(AuthError::UnexpectedStatus {
                status: response.status,
                url: request_token_url.to_string(),
            });
        }

        let parsed = config.token_format.parse(&response.body)?;
        let request_token = RequestToken::from_response(&parsed).ok_or_else(|| {
            AuthError::InvalidTokenResponse(format!("{provider} returned no request token"))
        })?;

        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("oauth_token", &request_token.oauth_token)
            .append_pair("oauth_callback", &callback_url)
            .finish();
        let target = config
            .authorization_url(&query)
            .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))?;

        let stored = serde_json::to_value(&request_token)
            .map_err(|e| AuthError::SessionError(format!("Failed to store request token: {e}")))?;
        ctx.session.set(REQUEST_TOKEN_SESSION_KEY, stored).await?;

        debug!("Redirecting to {} authorization endpoint", provider);
        Ok(target)
    }

    async fn callback(
        &self,
        provider: &str,
        config: &ProviderConfig,
        ctx: &RequestContext<'_>,
    ) -> Result<(UserInfo, AuthInfo), AuthError> {
        let request_token: RequestToken = ctx
            .session
            .pop(REQUEST_TOKEN_SESSION_KEY)
            .await?
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or(AuthError::MissingRequestToken)?;
        let verifier = ctx
            .param("oauth_verifier")
            .ok_or(AuthError::MissingVerifier)?;

        let consumer = self.consumer(provider)?;
        let access_token_url = required(provider, config.token_url.as_deref())?;

        debug!("Exchanging {} request token for an access token", provider);
        let signing = OAuth1Signing::new(&consumer.key, &consumer.secret)
            .with_token(OAuth1Token::new(
                request_token.oauth_token,
                request_token.oauth_token_secret,
            ))
            .with_verifier(verifier);
        let response = self
            .transport
            .fetch(HttpRequest::post(access_token_url).signed_with(signing))
            .await?;
        ensure_success(&response, access_token_url)?;

        let token_response = config.token_format.parse(&response.body)?;
        let auth_info = OAuth1AuthInfo::from_token_response(token_response)?;

        let profile_url = profile_endpoint(provider, config)?.url.clone();
        let signing = OAuth1Signing::new(&consumer.key, &consumer.secret).with_token(
            OAuth1Token::new(&auth_info.oauth_token, &auth_info.oauth_token_secret),
        );
        let user_info = fetch_user_info(
            self.transport.as_ref(),
            provider,
            config,
            HttpRequest::get(profile_url).signed_with(signing),
        )
        .await?;

        Ok((user_info, AuthInfo::OAuth1(auth_info)))
    }
}
