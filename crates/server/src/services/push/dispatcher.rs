//! Fan-out of one lifecycle event to every registered push destination.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use orderdesk_core::Locale;

use super::messages::PushMessages;
use super::{DeliveryOutcome, Destination, PushChannel};
use crate::db::{DestinationStore, RepositoryError};
use crate::events::OrderEvent;
use crate::models::{PushDestination, SubscriptionDestination, TokenDestination};

/// Counters for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Destinations a delivery was attempted for.
    pub attempted: usize,
    pub delivered: usize,
    /// Transient failures; the destinations were kept.
    pub transient: usize,
    /// Destinations deleted after a permanent failure.
    pub pruned: usize,
    /// Destinations whose channel is not configured.
    pub skipped: usize,
}

/// Sends lifecycle events to push destinations.
pub struct PushDispatcher {
    destinations: Arc<dyn DestinationStore>,
    tokens: Option<Arc<dyn PushChannel<TokenDestination>>>,
    subscriptions: Option<Arc<dyn PushChannel<SubscriptionDestination>>>,
    default_locale: Locale,
    currency: String,
}

impl PushDispatcher {
    #[must_use]
    pub fn new(
        destinations: Arc<dyn DestinationStore>,
        default_locale: Locale,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            destinations,
            tokens: None,
            subscriptions: None,
            default_locale,
            currency: currency.into(),
        }
    }

    /// Enable the token-addressed channel.
    #[must_use]
    pub fn with_token_channel(mut self, channel: Arc<dyn PushChannel<TokenDestination>>) -> Self {
        self.tokens = Some(channel);
        self
    }

    /// Enable the subscription-addressed channel.
    #[must_use]
    pub fn with_subscription_channel(
        mut self,
        channel: Arc<dyn PushChannel<SubscriptionDestination>>,
    ) -> Self {
        self.subscriptions = Some(channel);
        self
    }

    /// Deliver `event` to every destination.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` only if the destination list cannot be
    /// loaded. Delivery failures are reported in the [`DispatchReport`].
    #[instrument(
        skip(self, event),
        fields(order_id = %event.order.order.id, topic = %event.topic)
    )]
    pub async fn dispatch(&self, event: &OrderEvent) -> Result<DispatchReport, RepositoryError> {
        let all = self.destinations.list().await?;
        let mut report = DispatchReport::default();
        if all.is_empty() {
            return Ok(report);
        }

        let mut tokens = Vec::new();
        let mut subscriptions = Vec::new();
        for destination in all {
            match destination {
                PushDestination::Token(d) => tokens.push(d),
                PushDestination::Subscription(d) => subscriptions.push(d),
            }
        }

        let messages = PushMessages::for_event(event, &self.currency);
        self.deliver(self.tokens.as_deref(), tokens, &messages, &mut report)
            .await;
        self.deliver(
            self.subscriptions.as_deref(),
            subscriptions,
            &messages,
            &mut report,
        )
        .await;

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            transient = report.transient,
            pruned = report.pruned,
            skipped = report.skipped,
            "push dispatch finished"
        );
        Ok(report)
    }

    async fn deliver<D: Destination>(
        &self,
        channel: Option<&dyn PushChannel<D>>,
        destinations: Vec<D>,
        messages: &PushMessages,
        report: &mut DispatchReport,
    ) {
        if destinations.is_empty() {
            return;
        }
        let Some(channel) = channel else {
            debug!(count = destinations.len(), "push channel disabled, skipping");
            report.skipped += destinations.len();
            return;
        };

        let mut by_locale: BTreeMap<Locale, Vec<D>> = BTreeMap::new();
        for destination in destinations {
            by_locale
                .entry(destination.locale().clone())
                .or_default()
                .push(destination);
        }

        let batch_size = channel.max_batch().max(1);
        for (locale, group) in &by_locale {
            let payload = messages.select(locale, &self.default_locale);

            for batch in group.chunks(batch_size) {
                report.attempted += batch.len();
                let outcomes = match channel.send_batch(batch, payload).await {
                    Ok(outcomes) => outcomes,
                    Err(e) => {
                        warn!(
                            channel = channel.name(),
                            locale = %locale,
                            error = %e,
                            "push batch failed"
                        );
                        vec![DeliveryOutcome::Transient(e.to_string()); batch.len()]
                    }
                };

                if outcomes.len() != batch.len() {
                    warn!(
                        channel = channel.name(),
                        expected = batch.len(),
                        got = outcomes.len(),
                        "provider returned a mismatched outcome count"
                    );
                }

                for (index, destination) in batch.iter().enumerate() {
                    let outcome = outcomes.get(index).cloned().unwrap_or_else(|| {
                        DeliveryOutcome::Transient("no outcome reported".to_string())
                    });
                    self.record(channel.name(), destination, outcome, report)
                        .await;
                }
            }
        }
    }

    async fn record<D: Destination>(
        &self,
        channel: &'static str,
        destination: &D,
        outcome: DeliveryOutcome,
        report: &mut DispatchReport,
    ) {
        match outcome {
            DeliveryOutcome::Delivered => report.delivered += 1,
            DeliveryOutcome::Transient(reason) => {
                report.transient += 1;
                warn!(
                    channel,
                    destination = destination.identity(),
                    locale = %destination.locale(),
                    reason = %reason,
                    "transient push failure"
                );
            }
            DeliveryOutcome::Permanent(reason) => {
                match self.destinations.remove(destination.identity()).await {
                    Ok(removed) => {
                        if removed {
                            report.pruned += 1;
                        }
                        info!(
                            channel,
                            destination = destination.identity(),
                            reason = %reason,
                            "push destination pruned"
                        );
                    }
                    Err(e) => warn!(
                        channel,
                        destination = destination.identity(),
                        error = %e,
                        "failed to prune push destination"
                    ),
                }
            }
        }
    }
}
