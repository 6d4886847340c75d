use crate::{session::RequestSession, AppState};
use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use services::auth::{AuthHooks, AuthInfo, RequestContext, SessionStore, UserInfo};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Session key holding the signed-in user
pub const USER_SESSION_KEY: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedInUser {
    pub provider: String,
    pub user_info: UserInfo,
}

/// Hooks backing the engine with redirects and session writes
pub struct SessionHooks {
    session: RequestSession,
}

impl SessionHooks {
    pub fn new(session: RequestSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl AuthHooks for SessionHooks {
    type Response = Response;

    fn redirect(&self, url: &str) -> Response {
        Redirect::to(url).into_response()
    }

    async fn on_sign_in(
        &self,
        user_info: UserInfo,
        _auth_info: AuthInfo,
        provider: &str,
    ) -> Response {
        let user = SignedInUser {
            provider: provider.to_string(),
            user_info,
        };
        let value = match serde_json::to_value(&user) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to serialize signed-in user: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        if let Err(e) = self.session.set(USER_SESSION_KEY, value).await {
            error!("Failed to store signed-in user: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }

        info!("Signed in user via {}", provider);
        self.redirect("/profile")
    }

    fn provider_not_supported(&self, provider: &str) -> Response {
        warn!("Sign-in requested for unsupported provider {}", provider);
        self.redirect("/")
    }

    fn auth_error(&self, provider: &str, message: &str) -> Response {
        warn!("Sign-in with {} failed: {}", provider, message);
        self.redirect("/")
    }
}

/// Landing page listing the configured providers
pub async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut providers: Vec<&str> = state.engine.registry().names().collect();
    providers.sort_unstable();

    Json(serde_json::json!({
        "providers": providers,
        "login": "/auth/{provider}",
    }))
}

/// Redirects the user to the provider
pub async fn begin_auth(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    debug!("Initiating {} sign-in", provider);

    let session = state.sessions.session_for(&headers).await;
    let ctx = RequestContext::new(&params, &session);
    let hooks = SessionHooks::new(session.clone());

    let response = state.engine.begin_auth(&provider, &ctx, &hooks).await;
    session.attach_cookie(response)
}

/// Handles the provider redirecting the user back
pub async fn auth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    debug!("{} callback received", provider);

    let session = state.sessions.session_for(&headers).await;
    let ctx = RequestContext::new(&params, &session);
    let hooks = SessionHooks::new(session.clone());

    let response = state.engine.complete_auth(&provider, &ctx, &hooks).await;
    session.attach_cookie(response)
}

/// Current user, or back to the landing page
pub async fn profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = state.sessions.session_for(&headers).await;

    let user = match session.get(USER_SESSION_KEY).await {
        Ok(Some(value)) => serde_json::from_value::<SignedInUser>(value).ok(),
        Ok(None) => None,
        Err(e) => {
            error!("Failed to read session: {}", e);
            None
        }
    };

    match user {
        Some(user) => Json(user).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = state.sessions.session_for(&headers).await;
    session.clear().await;
    debug!("Session cleared");
    Redirect::to("/").into_response()
}
