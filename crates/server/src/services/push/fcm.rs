//! Token-addressed channel: Firebase Cloud Messaging HTTP v1.
//!
//! # API Reference
//!
//! - Send: `POST https://fcm.googleapis.com/v1/projects/{project}/messages:send`
//! - Authentication: `OAuth2` access token obtained with a service-account JWT
//!   (RS256) exchanged at `https://oauth2.googleapis.com/token`
//!
//! The v1 API takes one token per request; a batch is sent as concurrent
//! requests and each response is classified on its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use super::{DeliveryOutcome, PushChannel, PushError, PushPayload};
use crate::config::FcmConfig;
use crate::models::TokenDestination;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SEND_URL_BASE: &str = "https://fcm.googleapis.com/v1/projects";
const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens per `send_batch` call.
pub const MAX_BATCH: usize = 500;

/// Service-account assertion lifetime.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh the access token this long before it expires.
const TOKEN_REFRESH_MARGIN: TimeDelta = TimeDelta::seconds(60);

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetailEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetailEntry {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

impl ErrorDetail {
    /// The FCM-specific `errorCode` when present, else the canonical status.
    fn code(&self) -> &str {
        self.details
            .iter()
            .find_map(|d| d.error_code.as_deref())
            .unwrap_or(&self.status)
    }
}

/// Classify a failed FCM send.
///
/// Only responses that say the token itself is invalid are permanent;
/// throttling, quota, authentication and server faults are transient.
/// `SENDER_ID_MISMATCH` is transient: FCM reports it for every token when the
/// configured project is wrong, and the tokens themselves are still valid.
#[must_use]
pub fn classify_fcm_error(status: u16, error_code: &str, message: &str) -> DeliveryOutcome {
    let permanent = match error_code {
        "UNREGISTERED" | "NOT_FOUND" => true,
        "SENDER_ID_MISMATCH" => {
            tracing::error!(
                status,
                detail = message,
                "FCM sender id mismatch; check FCM_PROJECT_ID and the service account"
            );
            false
        }
        "INVALID_ARGUMENT" => message.to_lowercase().contains("registration token"),
        _ => status == 404,
    };

    let reason = format!("{status} {error_code}: {message}");
    if permanent {
        DeliveryOutcome::Permanent(reason)
    } else {
        DeliveryOutcome::Transient(reason)
    }
}

/// FCM HTTP v1 client.
#[derive(Clone)]
pub struct FcmClient {
    inner: Arc<FcmClientInner>,
}

struct FcmClientInner {
    client: reqwest::Client,
    client_email: String,
    key: EncodingKey,
    send_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl FcmClient {
    /// Create a client from service-account credentials.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Config` if the private key is not a valid RSA PEM,
    /// or `PushError::Http` if the HTTP client fails to build.
    pub fn new(config: &FcmConfig, timeout: Duration) -> Result<Self, PushError> {
        let key = EncodingKey::from_rsa_pem(config.private_key.expose_secret().as_bytes())
            .map_err(|e| PushError::Config(format!("FCM private key: {e}")))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(FcmClientInner {
                client,
                client_email: config.client_email.clone(),
                key,
                send_url: format!("{SEND_URL_BASE}/{}/messages:send", config.project_id),
                token: Mutex::new(None),
            }),
        })
    }

    /// A valid access token, refreshed when close to expiry.
    async fn access_token(&self) -> Result<SecretString, PushError> {
        let mut cached = self.inner.token.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|t| t.expires_at - TOKEN_REFRESH_MARGIN > Utc::now())
        {
            return Ok(token.value.clone());
        }

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.inner.client_email,
            scope: MESSAGING_SCOPE,
            aud: TOKEN_URL,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.inner.key)
            .map_err(|e| PushError::Auth(format!("failed to sign assertion: {e}")))?;

        let response = self
            .inner
            .client
            .post(TOKEN_URL)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        let value = SecretString::from(token.access_token);
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Utc::now() + TimeDelta::seconds(token.expires_in),
        });
        tracing::debug!(expires_in = token.expires_in, "FCM access token refreshed");

        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.inner.token.lock().await = None;
    }

    async fn send_one(
        &self,
        access_token: &SecretString,
        destination: &TokenDestination,
        payload: &PushPayload,
    ) -> DeliveryOutcome {
        let message = json!({
            "message": {
                "token": destination.token,
                "notification": {
                    "title": payload.title,
                    "body": payload.body,
                },
                "data": payload.data,
                "android": {
                    "priority": "high",
                    "notification": { "sound": "default" },
                },
            }
        });

        let response = match self
            .inner
            .client
            .post(&self.inner.send_url)
            .bearer_auth(access_token.expose_secret())
            .json(&message)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return DeliveryOutcome::Transient("timeout".to_string()),
            Err(e) => return DeliveryOutcome::Transient(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return DeliveryOutcome::Delivered;
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        classify_fcm_error(status.as_u16(), body.error.code(), &body.error.message)
    }
}

#[async_trait]
impl PushChannel<TokenDestination> for FcmClient {
    fn name(&self) -> &'static str {
        "fcm"
    }

    fn max_batch(&self) -> usize {
        MAX_BATCH
    }

    async fn send_batch(
        &self,
        batch: &[TokenDestination],
        payload: &PushPayload,
    ) -> Result<Vec<DeliveryOutcome>, PushError> {
        let access_token = self.access_token().await?;
        Ok(join_all(
            batch
                .iter()
                .map(|destination| self.send_one(&access_token, destination, payload)),
        )
        .await)
    }
}
