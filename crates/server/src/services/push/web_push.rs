//! Subscription-addressed channel: Web Push with VAPID (RFC 8292) and
//! `aes128gcm` payload encryption (RFC 8291).
//!
//! The `web-push` crate builds the signed, encrypted message; delivery goes
//! through the shared `reqwest` stack.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use secrecy::ExposeSecret;
use web_push::{
    ContentEncoding, PartialVapidSignatureBuilder, SubscriptionInfo, VapidSignatureBuilder,
    WebPushMessage, WebPushMessageBuilder,
};

use super::{DeliveryOutcome, PushChannel, PushError, PushPayload};
use crate::config::WebPushConfig;
use crate::models::SubscriptionDestination;

/// Subscriptions per `send_batch` call.
pub const MAX_BATCH: usize = 100;

/// How long the push service keeps an undelivered message.
const MESSAGE_TTL_SECS: u32 = 86_400;

/// Classify a push service response status.
///
/// 404 and 410 mean the subscription expired or was revoked.
#[must_use]
pub fn classify_web_push_status(status: u16) -> DeliveryOutcome {
    match status {
        200..=299 => DeliveryOutcome::Delivered,
        404 | 410 => DeliveryOutcome::Permanent(format!("push service returned {status}")),
        _ => DeliveryOutcome::Transient(format!("push service returned {status}")),
    }
}

/// Web Push client.
#[derive(Clone)]
pub struct WebPushClient {
    inner: Arc<WebPushClientInner>,
}

struct WebPushClientInner {
    client: reqwest::Client,
    signer: PartialVapidSignatureBuilder,
    subject: String,
}

impl WebPushClient {
    /// Create a client from the VAPID key pair.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Config` if the private key PEM cannot be parsed,
    /// or `PushError::Http` if the HTTP client fails to build.
    pub fn new(config: &WebPushConfig, timeout: Duration) -> Result<Self, PushError> {
        let signer =
            VapidSignatureBuilder::from_pem_no_sub(config.private_key_pem.expose_secret().as_bytes())
                .map_err(|e| PushError::Config(format!("VAPID private key: {e}")))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(WebPushClientInner {
                client,
                signer,
                subject: config.subject.clone(),
            }),
        })
    }

    fn build_message(
        &self,
        destination: &SubscriptionDestination,
        body: &[u8],
    ) -> Result<WebPushMessage, PushError> {
        let subscription = SubscriptionInfo::new(
            &destination.endpoint,
            &destination.p256dh,
            &destination.auth,
        );

        let mut signature = self.inner.signer.clone().add_sub_info(&subscription);
        signature.add_claim("sub", self.inner.subject.as_str());
        let signature = signature
            .build()
            .map_err(|e| PushError::Encryption(e.to_string()))?;

        let mut builder = WebPushMessageBuilder::new(&subscription);
        builder.set_payload(ContentEncoding::Aes128Gcm, body);
        builder.set_vapid_signature(signature);
        builder.set_ttl(MESSAGE_TTL_SECS);
        builder
            .build()
            .map_err(|e| PushError::Encryption(e.to_string()))
    }

    async fn send_one(
        &self,
        destination: &SubscriptionDestination,
        body: &[u8],
    ) -> DeliveryOutcome {
        let message = match self.build_message(destination, body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(endpoint = %destination.endpoint, error = %e, "failed to build web push message");
                return DeliveryOutcome::Transient(e.to_string());
            }
        };

        let mut request = self
            .inner
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string())
            .header("Urgency", "high");

        if let Some(payload) = message.payload {
            request = request
                .header(CONTENT_ENCODING, "aes128gcm")
                .header(CONTENT_TYPE, "application/octet-stream");
            for (name, value) in &payload.crypto_headers {
                request = request.header(*name, value.as_str());
            }
            request = request.body(payload.content);
        }

        match request.send().await {
            Ok(response) => classify_web_push_status(response.status().as_u16()),
            Err(e) if e.is_timeout() => DeliveryOutcome::Transient("timeout".to_string()),
            Err(e) => DeliveryOutcome::Transient(e.to_string()),
        }
    }
}

#[async_trait]
impl PushChannel<SubscriptionDestination> for WebPushClient {
    fn name(&self) -> &'static str {
        "web_push"
    }

    fn max_batch(&self) -> usize {
        MAX_BATCH
    }

    async fn send_batch(
        &self,
        batch: &[SubscriptionDestination],
        payload: &PushPayload,
    ) -> Result<Vec<DeliveryOutcome>, PushError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| PushError::Encryption(format!("payload encoding: {e}")))?;

        Ok(join_all(batch.iter().map(|destination| self.send_one(destination, &body))).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_web_push_status() {
        assert_eq!(classify_web_push_status(201), DeliveryOutcome::Delivered);
        assert!(classify_web_push_status(404).is_permanent());
        assert!(classify_web_push_status(410).is_permanent());
        for status in [400, 413, 429, 500, 503] {
            assert!(matches!(
                classify_web_push_status(status),
                DeliveryOutcome::Transient(_)
            ));
        }
    }
}
