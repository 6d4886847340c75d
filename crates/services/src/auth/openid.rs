use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

use super::ports::{
    AuthError, AuthInfo, CallbackUrlBuilder, FederatedLogin, OpenIdAuthInfo, ProtocolDriver,
    RequestContext, UserInfo,
};
use super::profile::normalize;
use super::registry::ProviderConfig;

/// Request parameter naming the identity to federate with
pub const IDENTITY_URL_PARAM: &str = "identity_url";

/// OpenID sign-in delegated to the hosting platform's federated login
pub struct OpenIdDriver {
    callbacks: Arc<dyn CallbackUrlBuilder>,
    platform: Option<Arc<dyn FederatedLogin>>,
}

impl OpenIdDriver {
    pub fn new(
        callbacks: Arc<dyn CallbackUrlBuilder>,
        platform: Option<Arc<dyn FederatedLogin>>,
    ) -> Self {
        Self {
            callbacks,
            platform,
        }
    }

    fn platform(&self, provider: &str) -> Result<&dyn FederatedLogin, AuthError> {
        self.platform
            .as_deref()
            .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))
    }
}

#[async_trait]
impl ProtocolDriver for OpenIdDriver {
    async fn init(
        &self,
        provider: &str,
        config: &ProviderConfig,
        ctx: &RequestContext<'_>,
    ) -> Result<String, AuthError> {
        let identity = config
            .openid_identity
            .clone()
            .filter(|identity| !identity.is_empty())
            .or_else(|| ctx.param(IDENTITY_URL_PARAM));
        let callback_url = self
            .callbacks
            .callback_url_for(provider)
            .filter(|url| !url.is_empty());

        let (Some(identity), Some(callback_url)) = (identity, callback_url) else {
            error!("Either identity or callback URL is missing for {}", provider);
            return Err(AuthError::ProviderNotSupported(provider.to_string()));
        };

        let target = self.platform(provider)?.login_url(&callback_url, &identity)?;
        debug!("Redirecting to federated login for {}", provider);
        Ok(target)
    }

    async fn callback(
        &self,
        provider: &str,
        config: &ProviderConfig,
        ctx: &RequestContext<'_>,
    ) -> Result<(UserInfo, AuthInfo), AuthError> {
        let user = self
            .platform(provider)?
            .current_user(ctx.params)
            .ok_or(AuthError::OpenIdFailed)?;
        let identity = user
            .federated_identity
            .filter(|identity| !identity.is_empty())
            .ok_or(AuthError::OpenIdFailed)?;

        let raw: BTreeMap<String, String> = [
            ("id", identity),
            ("nickname", user.nickname),
            ("email", user.email),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        let user_info = normalize(raw, &config.field_map)?;

        let auth_info = AuthInfo::OpenId(OpenIdAuthInfo {
            provider: user.federated_provider.unwrap_or_default(),
        });
        Ok((user_info, auth_info))
    }
}
