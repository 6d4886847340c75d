use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::ports::{AuthError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};

pub const DEFAULT_TRANSPORT_TIMEOUT_SECS: u64 = 10;

/// Outbound HTTP over reqwest, signing OAuth 1.0a requests on the way out
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn authorization(request: &HttpRequest) -> Result<Option<String>, AuthError> {
        let Some(signing) = &request.signed_with else {
            return Ok(None);
        };

        // Form bodies take part in the signature
        let form: Vec<(String, String)> = match (&request.body, request.has_form_body()) {
            (Some(body), true) => url::form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect(),
            _ => Vec::new(),
        };

        signing
            .authorization_header(request.method, &request.url, &form)
            .map(Some)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        let authorization = Self::authorization(&request)?;

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(authorization) = authorization {
            builder = builder.header(reqwest::header::AUTHORIZATION, authorization);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!("{} {}", request.method, request.url);
        let response = builder
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Request to {} failed: {e}", request.url)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Failed to read response body: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}
