//! Localized notification texts.

use std::collections::BTreeMap;

use orderdesk_core::{Locale, OrderStatus};

use super::PushPayload;
use crate::events::{OrderEvent, Topic};

/// Locale used when neither the recipient's nor the configured default locale
/// has a variant.
pub const FALLBACK_LOCALE: &str = "ro";

/// All locale variants of one notification.
#[derive(Debug, Clone)]
pub struct PushMessages {
    fallback: PushPayload,
    variants: BTreeMap<&'static str, PushPayload>,
}

#[derive(Clone, Copy)]
enum Lang {
    Ro,
    Ru,
    En,
}

impl Lang {
    const ALL: [Self; 3] = [Self::Ro, Self::Ru, Self::En];

    const fn code(self) -> &'static str {
        match self {
            Self::Ro => "ro",
            Self::Ru => "ru",
            Self::En => "en",
        }
    }

    fn title(self, topic: Topic, order_id: &str) -> String {
        match (self, topic) {
            (Self::Ro, Topic::OrderCreated) => format!("Comandă nouă #{order_id}"),
            (Self::Ru, Topic::OrderCreated) => format!("Новый заказ #{order_id}"),
            (Self::En, Topic::OrderCreated) => format!("New order #{order_id}"),
            (Self::Ro, Topic::OrderUpdated) => format!("Comanda #{order_id} actualizată"),
            (Self::Ru, Topic::OrderUpdated) => format!("Заказ #{order_id} обновлён"),
            (Self::En, Topic::OrderUpdated) => format!("Order #{order_id} updated"),
        }
    }

    const fn status(self, status: OrderStatus) -> &'static str {
        match (self, status) {
            (Self::Ro, OrderStatus::New) => "nouă",
            (Self::Ro, OrderStatus::Confirmed) => "confirmată",
            (Self::Ro, OrderStatus::Completed) => "finalizată",
            (Self::Ro, OrderStatus::Cancelled) => "anulată",
            (Self::Ru, OrderStatus::New) => "новый",
            (Self::Ru, OrderStatus::Confirmed) => "подтверждён",
            (Self::Ru, OrderStatus::Completed) => "выполнен",
            (Self::Ru, OrderStatus::Cancelled) => "отменён",
            (Self::En, OrderStatus::New) => "new",
            (Self::En, OrderStatus::Confirmed) => "confirmed",
            (Self::En, OrderStatus::Completed) => "completed",
            (Self::En, OrderStatus::Cancelled) => "cancelled",
        }
    }

    const fn status_label(self) -> &'static str {
        match self {
            Self::Ro => "Status",
            Self::Ru => "Статус",
            Self::En => "Status",
        }
    }
}

impl PushMessages {
    /// Build every locale variant for `event`.
    #[must_use]
    pub fn for_event(event: &OrderEvent, currency: &str) -> Self {
        let order = &event.order.order;
        let order_id = order.id.to_string();
        let total = format!("{} {currency}", order.total);

        let mut data = BTreeMap::new();
        data.insert("order_id".to_string(), order_id.clone());
        data.insert("event".to_string(), event.topic.as_str().to_string());
        data.insert("status".to_string(), order.status.as_str().to_string());

        let build = |lang: Lang| {
            let body = match event.topic {
                Topic::OrderCreated => format!("{}, {total}", order.customer.name),
                Topic::OrderUpdated => {
                    let mut body = format!(
                        "{}: {} · {total}",
                        lang.status_label(),
                        lang.status(order.status)
                    );
                    if let Some(reason) = &order.cancel_reason {
                        body.push_str(&format!(" ({reason})"));
                    }
                    body
                }
            };
            PushPayload {
                title: lang.title(event.topic, &order_id),
                body,
                data: data.clone(),
            }
        };

        Self {
            fallback: build(Lang::Ro),
            variants: Lang::ALL
                .into_iter()
                .map(|lang| (lang.code(), build(lang)))
                .collect(),
        }
    }

    /// Variant for `locale`, else for `default`, else the fallback locale.
    #[must_use]
    pub fn select(&self, locale: &Locale, default: &Locale) -> &PushPayload {
        self.variants
            .get(locale.as_str())
            .or_else(|| self.variants.get(default.as_str()))
            .unwrap_or(&self.fallback)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use orderdesk_core::{DeliveryType, Money, OrderId, PaymentMethod, Phone};

    use super::*;
    use crate::models::{CustomerDetails, Order, OrderSnapshot};

    fn event(topic: Topic, status: OrderStatus, reason: Option<&str>) -> OrderEvent {
        let now = Utc::now();
        OrderEvent::new(
            topic,
            OrderSnapshot {
                order: Order {
                    id: OrderId::new(17),
                    status,
                    customer: CustomerDetails {
                        name: "Ion".to_string(),
                        phone: Phone::parse("069123456").unwrap(),
                        email: None,
                        address: None,
                        comment: None,
                    },
                    delivery_type: DeliveryType::Delivery,
                    payment_method: PaymentMethod::Cash,
                    total: Money::from_minor(13_000),
                    cancel_reason: reason.map(str::to_string),
                    created_at: now,
                    updated_at: now,
                },
                items: Vec::new(),
                history: Vec::new(),
            },
        )
    }

    fn locale(s: &str) -> Locale {
        Locale::parse(s).unwrap()
    }

    #[test]
    fn test_selects_recipient_locale() {
        let messages = PushMessages::for_event(&event(Topic::OrderCreated, OrderStatus::New, None), "MDL");
        let ru = messages.select(&locale("ru"), &locale("ro"));
        assert_eq!(ru.title, "Новый заказ #17");
        assert_eq!(ru.data["order_id"], "17");
        assert_eq!(ru.data["event"], "order-created");
    }

    #[test]
    fn test_unknown_locale_falls_back_to_default() {
        let messages = PushMessages::for_event(&event(Topic::OrderCreated, OrderStatus::New, None), "MDL");
        assert_eq!(
            messages.select(&locale("de"), &locale("en")).title,
            "New order #17"
        );
        // A default without a variant ends at the fallback locale.
        assert_eq!(
            messages.select(&locale("de"), &locale("fr")).title,
            "Comandă nouă #17"
        );
    }

    #[test]
    fn test_cancellation_body_carries_reason() {
        let messages = PushMessages::for_event(
            &event(Topic::OrderUpdated, OrderStatus::Cancelled, Some("out of stock")),
            "MDL",
        );
        let en = messages.select(&locale("en"), &locale("ro"));
        assert!(en.body.starts_with("Status: cancelled"));
        assert!(en.body.ends_with("(out of stock)"));
        assert_eq!(en.data["status"], "cancelled");
    }
}
