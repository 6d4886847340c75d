//! OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha1::Sha1;
use url::Url;

use super::ports::{AuthError, HttpMethod};

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth1Token {
    pub key: String,
    pub secret: String,
}

impl OAuth1Token {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

/// Everything needed to sign one request: consumer credentials plus the
/// optional token pair and verifier for the later handshake steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth1Signing {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: Option<OAuth1Token>,
    pub verifier: Option<String>,
}

impl OAuth1Signing {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: None,
            verifier: None,
        }
    }

    pub fn with_token(mut self, token: OAuth1Token) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }

    /// Builds the `Authorization` header value with a fresh nonce and timestamp.
    /// `form` holds the decoded pairs of an `application/x-www-form-urlencoded` body.
    pub fn authorization_header(
        &self,
        method: HttpMethod,
        url: &str,
        form: &[(String, String)],
    ) -> Result<String, AuthError> {
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);
        self.authorization_header_with(
            method,
            url,
            form,
            &hex::encode(nonce),
            Utc::now().timestamp(),
        )
    }

    pub fn authorization_header_with(
        &self,
        method: HttpMethod,
        url: &str,
        form: &[(String, String)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, AuthError> {
        let mut oauth_params = self.protocol_params(nonce, timestamp);
        let signature = self.signature(method, url, form, &oauth_params)?;
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields = oauth_params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", encode(key), encode(value)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {fields}"))
    }

    fn protocol_params(&self, nonce: &str, timestamp: i64) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                SIGNATURE_METHOD.to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        if let Some(token) = &self.token {
            params.push(("oauth_token".to_string(), token.key.clone()));
        }
        if let Some(verifier) = &self.verifier {
            params.push(("oauth_verifier".to_string(), verifier.clone()));
        }
        params
    }

    fn signature(
        &self,
        method: HttpMethod,
        url: &str,
        form: &[(String, String)],
        oauth_params: &[(String, String)],
    ) -> Result<String, AuthError> {
        let base = signature_base_string(method, url, form, oauth_params)?;
        let token_secret = self
            .token
            .as_ref()
            .map(|token| token.secret.as_str())
            .unwrap_or("");
        let key = format!("{}&{}", encode(&self.consumer_secret), encode(token_secret));

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| AuthError::ConfigError(format!("Invalid signing key: {e}")))?;
        mac.update(base.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

pub(crate) fn signature_base_string(
    method: HttpMethod,
    url: &str,
    form: &[(String, String)],
    oauth_params: &[(String, String)],
) -> Result<String, AuthError> {
    let parsed =
        Url::parse(url).map_err(|e| AuthError::ConfigError(format!("Invalid URL {url}: {e}")))?;

    let mut base_url = format!(
        "{}://{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default()
    );
    if let Some(port) = parsed.port() {
        base_url.push_str(&format!(":{port}"));
    }
    base_url.push_str(parsed.path());

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(form.iter().map(|(k, v)| (encode(k), encode(v))))
        .chain(oauth_params.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    params.sort();

    let normalized = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.as_str(),
        encode(&base_url),
        encode(&normalized)
    ))
}

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
