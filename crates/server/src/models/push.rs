//! Push destination types.

use serde::{Deserialize, Serialize};

use orderdesk_core::Locale;

/// Which provider channel a destination belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "push_destination_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// FCM registration token (mobile app).
    Token,
    /// Web Push subscription (browser).
    Subscription,
}

/// A mobile device addressed by an FCM registration token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDestination {
    pub token: String,
    pub locale: Locale,
}

/// A browser addressed by a Web Push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDestination {
    pub endpoint: String,
    /// Base64url P-256 public key of the user agent.
    pub p256dh: String,
    /// Base64url authentication secret.
    pub auth: String,
    pub locale: Locale,
}

/// A registered push destination.
///
/// Identity is the token or the endpoint; re-registering the same identity
/// replaces the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PushDestination {
    Token(TokenDestination),
    Subscription(SubscriptionDestination),
}

impl PushDestination {
    /// Token or endpoint.
    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::Token(d) => &d.token,
            Self::Subscription(d) => &d.endpoint,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> DestinationKind {
        match self {
            Self::Token(_) => DestinationKind::Token,
            Self::Subscription(_) => DestinationKind::Subscription,
        }
    }

    #[must_use]
    pub const fn locale(&self) -> &Locale {
        match self {
            Self::Token(d) => &d.locale,
            Self::Subscription(d) => &d.locale,
        }
    }
}
