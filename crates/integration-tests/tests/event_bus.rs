//! Integration tests for event publication and the live stream.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use futures::StreamExt;

use orderdesk_core::OrderStatus;
use orderdesk_integration_tests::{TestApp, actor, operator};
use orderdesk_server::events::{SubscriberConfig, Topic};
use orderdesk_server::services::StreamFrame;

#[tokio::test]
async fn test_only_earlier_subscribers_receive_event() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);

    let mut before = app.bus.subscribe(SubscriberConfig::new("before"));
    let created = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap();
    let mut after = app.bus.subscribe(SubscriberConfig::new("after"));

    let event = before.try_recv().unwrap();
    assert_eq!(event.topic, Topic::OrderCreated);
    assert_eq!(event.order.order.id, created.order.id);
    assert!(after.try_recv().is_none());
}

#[tokio::test]
async fn test_event_carries_full_snapshot() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);
    let id = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 2)]))
        .await
        .unwrap()
        .order
        .id;

    let mut sub = app.bus.subscribe(SubscriberConfig::new("operator"));
    app.lifecycle
        .change_status(id, OrderStatus::Confirmed, None, &actor(1, "Ana"))
        .await
        .unwrap();

    let event = sub.try_recv().unwrap();
    assert_eq!(event.topic, Topic::OrderUpdated);
    assert_eq!(event.order.order.status, OrderStatus::Confirmed);
    assert_eq!(event.order.items.len(), 1);
    assert_eq!(event.order.history.len(), 1);
    assert_eq!(event.order.order.total, event.order.items_total());
}

#[tokio::test]
async fn test_failed_mutation_publishes_nothing() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);
    let id = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap()
        .order
        .id;

    let mut sub = app.bus.subscribe(SubscriberConfig::new("operator"));
    let result = app
        .lifecycle
        .change_status(id, OrderStatus::Completed, None, &actor(1, "Ana"))
        .await;

    assert!(result.is_err());
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn test_topic_filter() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);

    let mut updates_only = app
        .bus
        .subscribe(SubscriberConfig::new("updates").topics(&[Topic::OrderUpdated]));
    let id = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap()
        .order
        .id;
    app.lifecycle
        .change_status(id, OrderStatus::Cancelled, None, &actor(1, "Ana"))
        .await
        .unwrap();

    let event = updates_only.try_recv().unwrap();
    assert_eq!(event.topic, Topic::OrderUpdated);
    assert!(updates_only.try_recv().is_none());
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let app = TestApp::new();
    let sub = app.bus.subscribe(SubscriberConfig::new("operator"));
    assert_eq!(app.bus.subscriber_count(), 1);

    sub.unsubscribe();
    sub.unsubscribe();
    assert_eq!(app.bus.subscriber_count(), 0);

    drop(sub);
    assert_eq!(app.bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_live_connection_receives_events_in_order() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);

    let connection = app.streams.open(&operator(1, "Ana"));
    assert_eq!(app.streams.connection_count(), 1);
    let mut frames = Box::pin(connection.frames());

    assert!(matches!(frames.next().await, Some(StreamFrame::Connected)));

    let id = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap()
        .order
        .id;
    app.lifecycle
        .change_status(id, OrderStatus::Confirmed, None, &actor(1, "Ana"))
        .await
        .unwrap();

    let timeout = Duration::from_secs(1);
    let next = tokio::time::timeout(timeout, frames.next()).await.unwrap();
    let Some(StreamFrame::Event(first)) = next else {
        panic!("expected an event frame");
    };
    let next = tokio::time::timeout(timeout, frames.next()).await.unwrap();
    let Some(StreamFrame::Event(second)) = next else {
        panic!("expected an event frame");
    };
    assert_eq!(first.topic, Topic::OrderCreated);
    assert_eq!(second.topic, Topic::OrderUpdated);
    assert_eq!(second.order.order.status, OrderStatus::Confirmed);

    drop(frames);
    assert_eq!(app.streams.connection_count(), 0);
    assert_eq!(app.bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_many_connections_all_receive() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);

    let mut streams: Vec<_> = (0..25)
        .map(|n| Box::pin(app.streams.open(&operator(n, "Operator")).frames()))
        .collect();
    for frames in &mut streams {
        assert!(matches!(frames.next().await, Some(StreamFrame::Connected)));
    }

    app.lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap();

    for frames in &mut streams {
        let frame = tokio::time::timeout(Duration::from_secs(1), frames.next())
            .await
            .unwrap();
        assert!(matches!(frame, Some(StreamFrame::Event(_))));
    }
    assert_eq!(app.streams.connection_count(), 25);

    streams.clear();
    assert_eq!(app.streams.connection_count(), 0);
}
