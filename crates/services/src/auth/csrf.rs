use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::{DateTime, Utc};
use config::CsrfConfig;
use rand_core::{OsRng, RngCore};

/// Session key holding the OAuth 2.0 CSRF token between init and callback
pub const CSRF_SESSION_KEY: &str = "oauth2_state";
/// Request parameter carrying the token back from the provider
pub const CSRF_STATE_PARAM: &str = "state";

const TOKEN_DELIMITER: char = '|';
const NONCE_BYTES: usize = 16;

/// Issues and checks the anti-forgery token sent through the OAuth 2.0
/// `state` parameter. A token is `base64url(hex_nonce|unix_timestamp)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrfTokenService {
    timeout_secs: i64,
}

impl CsrfTokenService {
    pub fn new(timeout_secs: i64) -> Self {
        Self { timeout_secs }
    }

    /// Returns the service only when CSRF protection is switched on
    pub fn from_config(config: &CsrfConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config.timeout_secs))
    }

    pub fn timeout_secs(&self) -> i64 {
        self.timeout_secs
    }

    pub fn generate(&self) -> String {
        self.generate_at(Utc::now())
    }

    pub fn generate_at(&self, now: DateTime<Utc>) -> String {
        let mut nonce = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);

        let raw = format!(
            "{}{}{}",
            hex::encode(nonce),
            TOKEN_DELIMITER,
            now.timestamp()
        );
        URL_SAFE.encode(raw)
    }

    pub fn validate(&self, candidate: &str, expected: &str) -> bool {
        self.validate_at(candidate, expected, Utc::now())
    }

    pub fn validate_at(&self, candidate: &str, expected: &str, now: DateTime<Utc>) -> bool {
        if candidate.is_empty() || expected.is_empty() {
            return false;
        }

        let Some(issued_at) = issued_at(candidate) else {
            return false;
        };

        if candidate != expected {
            return false;
        }

        now.timestamp()
            .checked_sub(issued_at)
            .is_some_and(|elapsed| elapsed <= self.timeout_secs)
    }
}

/// Issue timestamp of a structurally valid token
fn issued_at(token: &str) -> Option<i64> {
    let decoded = URL_SAFE.decode(token).ok()?;
    let raw = String::from_utf8(decoded).ok()?;
    let (nonce, timestamp) = raw.rsplit_once(TOKEN_DELIMITER)?;
    if nonce.is_empty() {
        return None;
    }
    timestamp.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_tokens_are_unique() {
        let service = CsrfTokenService::new(60);
        let first = service.generate_at(fixed_now());
        let second = service.generate_at(fixed_now());

        assert_ne!(first, second);
        assert_ne!(service.generate(), service.generate());
    }

    #[test]
    fn test_token_layout() {
        let token = CsrfTokenService::new(60).generate_at(fixed_now());
        let raw = String::from_utf8(URL_SAFE.decode(&token).unwrap()).unwrap();
        let (nonce, timestamp) = raw.split_once('|').unwrap();

        assert_eq!(nonce.len(), NONCE_BYTES * 2);
        assert_eq!(timestamp, "1700000000");
    }

    #[test]
    fn test_validate_fresh_token() {
        let service = CsrfTokenService::new(60);
        let token = service.generate();
        assert!(service.validate(&token, &token));
    }

    #[test]
    fn test_validate_rejects_expired_token() {
        let service = CsrfTokenService::new(1);
        let token = service.generate_at(fixed_now());

        assert!(service.validate_at(&token, &token, fixed_now() + Duration::seconds(1)));
        assert!(!service.validate_at(&token, &token, fixed_now() + Duration::seconds(2)));
    }

    #[test]
    fn test_validate_requires_exact_match() {
        let service = CsrfTokenService::new(60);
        let token = service.generate_at(fixed_now());
        let other = service.generate_at(fixed_now());

        assert!(!service.validate_at(&token, &other, fixed_now()));
        assert!(!service.validate_at(&token, "", fixed_now()));
        assert!(!service.validate_at("", &token, fixed_now()));
    }

    #[test]
    fn test_validate_rejects_malformed_tokens() {
        let service = CsrfTokenService::new(60);
        let now = fixed_now();

        let no_delimiter = URL_SAFE.encode("abcdef0123456789");
        let bad_timestamp = URL_SAFE.encode("abcdef0123456789|soon");
        let no_nonce = URL_SAFE.encode("|1700000000");
        let overflowing = URL_SAFE.encode(format!("abcdef0123456789|{}", i64::MIN));

        for token in [
            "",
            "not base64 at all!",
            no_delimiter.as_str(),
            bad_timestamp.as_str(),
            no_nonce.as_str(),
            overflowing.as_str(),
        ] {
            assert!(!service.validate_at(token, token, now), "accepted {token:?}");
        }
    }

    #[test]
    fn test_from_config_respects_flag() {
        assert!(CsrfTokenService::from_config(&CsrfConfig::default()).is_none());

        let service = CsrfTokenService::from_config(&CsrfConfig {
            enabled: true,
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(service.timeout_secs(), 5);
    }
}
