//! Registration and removal of push destinations.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use orderdesk_core::{Locale, StaffId};

use crate::db::{DestinationStore, RepositoryError};
use crate::models::{PushDestination, SubscriptionDestination, TokenDestination};

/// Uncompressed P-256 point: `0x04 || X || Y`.
const P256DH_LEN: usize = 65;
const AUTH_SECRET_LEN: usize = 16;
const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Mobile registration body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRegistration {
    pub token: String,
    #[serde(default, alias = "lang")]
    pub locale: Option<String>,
}

/// Browser registration body, in the shape of `PushSubscription.toJSON()`
/// plus a locale.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRegistration {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(default, alias = "lang")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone)]
pub enum RegistrationRequest {
    Token(TokenRegistration),
    Subscription(SubscriptionRegistration),
}

/// Validate `request` and store it, replacing any destination with the same
/// identity.
///
/// # Errors
///
/// `Invalid` when the token, endpoint, keys or locale are malformed.
pub async fn register(
    store: &dyn DestinationStore,
    request: RegistrationRequest,
    default_locale: &Locale,
    registered_by: Option<StaffId>,
) -> Result<PushDestination, RegistrationError> {
    let destination = validate(request, default_locale)?;
    store.upsert(&destination, registered_by).await?;

    tracing::info!(
        kind = ?destination.kind(),
        locale = %destination.locale(),
        staff_id = ?registered_by,
        "push destination registered"
    );
    Ok(destination)
}

/// Remove the destination with `identity`. Returns whether one existed.
///
/// # Errors
///
/// `Invalid` for a blank identity.
pub async fn unregister(
    store: &dyn DestinationStore,
    identity: &str,
) -> Result<bool, RegistrationError> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(RegistrationError::Invalid("identity is required".to_string()));
    }
    let removed = store.remove(identity).await?;
    tracing::info!(removed, "push destination unregistered");
    Ok(removed)
}

/// Turn a registration request into a destination.
///
/// # Errors
///
/// `Invalid` when any field is malformed.
pub fn validate(
    request: RegistrationRequest,
    default_locale: &Locale,
) -> Result<PushDestination, RegistrationError> {
    match request {
        RegistrationRequest::Token(r) => {
            let token = r.token.trim();
            if token.is_empty() {
                return Err(RegistrationError::Invalid("token is required".to_string()));
            }
            if token.len() > MAX_TOKEN_LEN || token.chars().any(char::is_whitespace) {
                return Err(RegistrationError::Invalid("token is malformed".to_string()));
            }
            Ok(PushDestination::Token(TokenDestination {
                token: token.to_string(),
                locale: resolve_locale(r.locale.as_deref(), default_locale)?,
            }))
        }
        RegistrationRequest::Subscription(r) => {
            let endpoint = Url::parse(r.endpoint.trim())
                .map_err(|e| RegistrationError::Invalid(format!("endpoint: {e}")))?;
            if endpoint.scheme() != "https" {
                return Err(RegistrationError::Invalid(
                    "endpoint must be an https URL".to_string(),
                ));
            }

            let p256dh = decode_key(&r.keys.p256dh, "p256dh")?;
            if p256dh.len() != P256DH_LEN || p256dh.first() != Some(&0x04) {
                return Err(RegistrationError::Invalid(
                    "p256dh must be an uncompressed P-256 public key".to_string(),
                ));
            }
            let auth = decode_key(&r.keys.auth, "auth")?;
            if auth.len() != AUTH_SECRET_LEN {
                return Err(RegistrationError::Invalid(format!(
                    "auth must be {AUTH_SECRET_LEN} bytes"
                )));
            }

            Ok(PushDestination::Subscription(SubscriptionDestination {
                endpoint: endpoint.to_string(),
                p256dh: URL_SAFE_NO_PAD.encode(p256dh),
                auth: URL_SAFE_NO_PAD.encode(auth),
                locale: resolve_locale(r.locale.as_deref(), default_locale)?,
            }))
        }
    }
}

fn resolve_locale(raw: Option<&str>, default: &Locale) -> Result<Locale, RegistrationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default.clone()),
        Some(raw) => Locale::parse(raw).map_err(|e| RegistrationError::Invalid(e.to_string())),
    }
}

/// Accepts base64url or standard base64, padded or not.
fn decode_key(raw: &str, field: &str) -> Result<Vec<u8>, RegistrationError> {
    let trimmed = raw.trim().trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| RegistrationError::Invalid(format!("{field}: {e}")))
}
