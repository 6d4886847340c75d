pub mod routes;
pub mod session;

use crate::{
    routes::auth::{auth_callback, begin_auth, index, logout, profile},
    session::InMemorySessionStore,
};
use axum::{routing::get, Router};
use config::AuthConfig;
use services::auth::{
    transport::DEFAULT_TRANSPORT_TIMEOUT_SECS, AuthEngine, AuthError, CallbackBaseUrl,
    ConfiguredCredentials, CsrfTokenService, FederatedLogin, ProviderRegistry, ReqwestTransport,
};
use std::{sync::Arc, time::Duration};

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuthEngine>,
    pub sessions: InMemorySessionStore,
}

impl AppState {
    pub fn new(engine: AuthEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            sessions: InMemorySessionStore::new(),
        }
    }
}

/// Build the sign-in engine from configuration.
///
/// Callback URLs default to `http://localhost:{port}` when no public base
/// URL is configured. OpenID is only available when the host supplies a
/// federated login platform.
pub fn init_auth_engine(
    config: &AuthConfig,
    federated_login: Option<Arc<dyn FederatedLogin>>,
) -> Result<AuthEngine, AuthError> {
    let registry = ProviderRegistry::with_custom(&config.custom_providers);
    let callback_base = config
        .callback_base_url
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", config.server.port));
    let transport = ReqwestTransport::new(Duration::from_secs(DEFAULT_TRANSPORT_TIMEOUT_SECS))?;

    let csrf = CsrfTokenService::from_config(&config.csrf);
    if csrf.is_some() {
        tracing::info!(
            timeout_secs = config.csrf.timeout_secs,
            "CSRF protection enabled for OAuth 2.0 providers"
        );
    }

    let mut builder = AuthEngine::builder()
        .registry(registry)
        .credentials(Arc::new(ConfiguredCredentials::from_config(config)))
        .callback_urls(Arc::new(CallbackBaseUrl::new(callback_base)))
        .transport(Arc::new(transport))
        .csrf(csrf);
    if let Some(platform) = federated_login {
        builder = builder.federated_login(platform);
    }
    builder.build()
}

/// Build authentication routes
pub fn build_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/{provider}", get(begin_auth))
        .route("/{provider}/callback", get(auth_callback))
}

/// Build the complete application router
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/profile", get(profile))
        .route("/logout", get(logout))
        .nest("/auth", build_auth_routes())
        .with_state(state)
}
