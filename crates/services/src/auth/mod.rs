//! Federated sign-in over OAuth 1.0a, OAuth 2.0 and OpenID.
//!
//! A host wires an [`AuthEngine`] once at startup and calls
//! [`AuthEngine::begin_auth`] / [`AuthEngine::complete_auth`] from its
//! `/auth/{provider}` and `/auth/{provider}/callback` handlers. All state that
//! crosses the redirect round-trip lives in the host's [`SessionStore`].

pub mod credentials;
pub mod csrf;
pub mod dispatcher;
pub mod oauth1;
pub mod oauth2;
pub mod openid;
pub mod parsers;
pub mod ports;
pub mod profile;
pub mod registry;
pub mod signing;
pub mod transport;

pub use credentials::{CallbackBaseUrl, ConfiguredCredentials};
pub use csrf::{CsrfTokenService, CSRF_SESSION_KEY, CSRF_STATE_PARAM};
pub use dispatcher::{AuthEngine, AuthEngineBuilder};
pub use oauth1::{OAuth1Driver, REQUEST_TOKEN_SESSION_KEY};
pub use oauth2::OAuth2Driver;
pub use openid::{OpenIdDriver, IDENTITY_URL_PARAM};
pub use ports::*;
pub use registry::{
    FieldMapping, FieldTransform, ProfileEndpoint, ProfileFormat, ProtocolFamily, ProviderConfig,
    ProviderRegistry, TokenFormat,
};
pub use signing::{OAuth1Signing, OAuth1Token};
pub use transport::ReqwestTransport;
