use std::collections::BTreeMap;
use tracing::debug;

use super::ports::{AuthError, HttpRequest, HttpResponse, HttpTransport, UserInfo};
use super::registry::{FieldMapping, ProfileEndpoint, ProviderConfig};

/// Field every normalized profile must carry
pub const REQUIRED_PROFILE_FIELD: &str = "id";

/// Applies a provider's field mappings on top of the raw profile.
///
/// Raw fields are kept as-is; a mapped target is only added when the raw
/// profile does not already carry it and the source field is present.
/// Missing optional fields are skipped, a missing `id` is an error.
pub fn normalize(
    raw: BTreeMap<String, String>,
    field_map: &[FieldMapping],
) -> Result<UserInfo, AuthError> {
    if raw
        .get(REQUIRED_PROFILE_FIELD)
        .map_or(true, |id| id.is_empty())
    {
        return Err(AuthError::MissingProfileField(
            REQUIRED_PROFILE_FIELD.to_string(),
        ));
    }

    let mapped: Vec<(String, String)> = field_map
        .iter()
        .filter_map(|mapping| {
            raw.get(&mapping.source)
                .filter(|value| !value.is_empty())
                .map(|value| (mapping.target.clone(), mapping.apply(value)))
        })
        .collect();

    let mut user_info = UserInfo::from(raw);
    for (target, value) in mapped {
        user_info.set_default(&target, value);
    }
    Ok(user_info)
}

/// Appends query pairs to a URL, keeping any query it already has
pub fn with_query(url: &str, pairs: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

/// Fails unless the provider answered with a 2xx status
pub(crate) fn ensure_success(response: &HttpResponse, url: &str) -> Result<(), AuthError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(AuthError::UnexpectedStatus {
            status: response.status,
            url: url.to_string(),
        })
    }
}

/// Runs the profile request built by a driver and normalizes the result
pub(crate) async fn fetch_user_info(
    transport: &dyn HttpTransport,
    provider: &str,
    config: &ProviderConfig,
    request: HttpRequest,
) -> Result<UserInfo, AuthError> {
    let endpoint = profile_endpoint(provider, config)?;
    let url = request.url.clone();

    debug!("Fetching {} profile", provider);
    let response = transport.fetch(request).await?;
    ensure_success(&response, &url)?;

    let raw = endpoint.format.parse(&response.body)?;
    normalize(raw, &config.field_map)
}

pub(crate) fn profile_endpoint<'a>(
    provider: &str,
    config: &'a ProviderConfig,
) -> Result<&'a ProfileEndpoint, AuthError> {
    config
        .profile
        .as_ref()
        .ok_or_else(|| AuthError::ProviderNotSupported(provider.to_string()))
}
