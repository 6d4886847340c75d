use async_trait::async_trait;
use axum::{
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::Response,
};
use headers::{Cookie, HeaderMapExt};
use serde_json::Value;
use services::auth::{AuthError, SessionStore};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "sid";

type SessionData = HashMap<String, Value>;

/// Process-local session storage keyed by session id.
/// In production, use Redis or similar so callbacks can land on any instance.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for the request's `sid` cookie, or a fresh one.
    /// Only ids issued by this store are honoured; anything else starts a new session.
    pub async fn session_for(&self, headers: &HeaderMap) -> RequestSession {
        let presented = headers
            .typed_get::<Cookie>()
            .and_then(|cookie| cookie.get(SESSION_COOKIE).map(str::to_string))
            .filter(|sid| !sid.is_empty());

        if let Some(id) = presented {
            if self.sessions.read().await.contains_key(&id) {
                return RequestSession {
                    store: self.clone(),
                    id,
                    is_new: false,
                };
            }
            debug!("Ignoring unknown session id");
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), SessionData::new());
        debug!("Starting new session");
        RequestSession {
            store: self.clone(),
            id,
            is_new: true,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// One request's view of its session
#[derive(Clone)]
pub struct RequestSession {
    store: InMemorySessionStore,
    id: String,
    is_new: bool,
}

impl RequestSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets the session cookie on responses for sessions created by this request
    pub fn attach_cookie(&self, mut response: Response) -> Response {
        if !self.is_new {
            return response;
        }
        let cookie = format!("{SESSION_COOKIE}={}; HttpOnly; SameSite=Lax; Path=/", self.id);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => error!("Failed to build session cookie: {}", e),
        }
        response
    }

    /// Drops every value held for this session
    pub async fn clear(&self) {
        self.store.sessions.write().await.remove(&self.id);
    }
}

#[async_trait]
impl SessionStore for RequestSession {
    async fn get(&self, key: &str) -> Result<Option<Value>, AuthError> {
        let sessions = self.store.sessions.read().await;
        Ok(sessions
            .get(&self.id)
            .and_then(|data| data.get(key))
            .cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), AuthError> {
        let mut sessions = self.store.sessions.write().await;
        sessions
            .entry(self.id.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<Value>, AuthError> {
        let mut sessions = self.store.sessions.write().await;
        Ok(sessions
            .get_mut(&self.id)
            .and_then(|data| data.remove(key)))
    }
}
