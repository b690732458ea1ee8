//! Push fan-out to offline operator devices.
//!
//! Two independent channels:
//! - token-addressed (FCM HTTP v1) for the mobile app
//! - subscription-addressed (Web Push, VAPID + aes128gcm) for browsers
//!
//! The [`PushDispatcher`] runs off the request path (see [`spawn_push_worker`]),
//! groups destinations by locale, and prunes destinations the provider reports
//! as permanently invalid.

pub mod dispatcher;
pub mod fcm;
pub mod messages;
pub mod registration;
pub mod web_push;
pub mod worker;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use orderdesk_core::Locale;

use crate::models::{SubscriptionDestination, TokenDestination};

pub use dispatcher::{DispatchReport, PushDispatcher};
pub use fcm::{FcmClient, classify_fcm_error};
pub use messages::PushMessages;
pub use registration::{RegistrationError, RegistrationRequest, register, unregister};
pub use web_push::{WebPushClient, classify_web_push_status};
pub use worker::spawn_push_worker;

/// Notification content for one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Opaque routing data for the client (order id, event, status).
    pub data: BTreeMap<String, String>,
}

/// Result of delivering to a single destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Throttling, timeout, provider or network fault. The destination stays.
    Transient(String),
    /// The provider confirmed the destination is gone. The destination is
    /// deleted.
    Permanent(String),
}

impl DeliveryOutcome {
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Provider-level failures that affect a whole batch.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("invalid provider configuration: {0}")]
    Config(String),

    #[error("payload encryption failed: {0}")]
    Encryption(String),
}

/// Something a push channel can address.
pub trait Destination: Clone + Send + Sync + 'static {
    /// Token or endpoint; the key used for pruning.
    fn identity(&self) -> &str;

    fn locale(&self) -> &Locale;
}

impl Destination for TokenDestination {
    fn identity(&self) -> &str {
        &self.token
    }

    fn locale(&self) -> &Locale {
        &self.locale
    }
}

impl Destination for SubscriptionDestination {
    fn identity(&self) -> &str {
        &self.endpoint
    }

    fn locale(&self) -> &Locale {
        &self.locale
    }
}

/// A push provider.
#[async_trait]
pub trait PushChannel<D: Destination>: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Largest batch one `send_batch` call accepts.
    fn max_batch(&self) -> usize;

    /// Deliver `payload` to every destination in `batch`.
    ///
    /// The returned outcomes are aligned with `batch`. A failure for one
    /// destination must not prevent delivery to the others.
    ///
    /// # Errors
    ///
    /// Returns `PushError` when the whole batch could not be attempted (for
    /// example, the provider credentials were rejected). The dispatcher treats
    /// this as transient for every destination in the batch.
    async fn send_batch(
        &self,
        batch: &[D],
        payload: &PushPayload,
    ) -> Result<Vec<DeliveryOutcome>, PushError>;
}
