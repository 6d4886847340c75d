// Test utilities for services crate
#![cfg(test)]

use crate::auth::{AuthError, FederatedLogin, FederatedUser, RequestParams, SessionStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Request parameters from literal pairs
pub fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Session store backed by a map, inspectable from tests
#[derive(Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn peek(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn get(&self, key: &str) -> Result<Option<Value>, AuthError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), AuthError> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<Value>, AuthError> {
        Ok(self.values.lock().unwrap().remove(key))
    }
}

/// Federated login platform with a fixed current user
pub struct StubFederatedLogin {
    user: Option<FederatedUser>,
}

impl StubFederatedLogin {
    pub fn signed_out() -> Self {
        Self { user: None }
    }

    pub fn signed_in(user: FederatedUser) -> Self {
        Self { user: Some(user) }
    }
}

impl FederatedLogin for StubFederatedLogin {
    fn login_url(&self, destination: &str, federated_identity: &str) -> Result<String, AuthError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("claimid", federated_identity)
            .append_pair("continue", destination)
            .finish();
        Ok(format!("/_ah/login_redir?{query}"))
    }

    fn current_user(&self, _params: &dyn RequestParams) -> Option<FederatedUser> {
        self.user.clone()
    }
}
