//! Integration tests for the order lifecycle: transitions, edits, totals and
//! audit history.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use orderdesk_core::{Money, OrderStatus};
use orderdesk_integration_tests::{TestApp, actor};
use orderdesk_server::models::{CustomerField, HistoryAction, HistoryDetails};
use orderdesk_server::services::{CustomerPatch, ItemEdit, LifecycleError};

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_accept_edit_complete_scenario() {
    let app = TestApp::new();
    let staff = actor(1, "Ana");
    let soup = app.catalog_item("Zeamă", 50);
    let bread = app.catalog_item("Plăcintă", 30);

    let created = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(soup, 2), (bread, 1)]))
        .await
        .unwrap();
    let id = created.order.id;
    assert_eq!(created.order.total, Money::from_minor(13_000));
    assert_eq!(created.order.status, OrderStatus::New);
    assert!(created.history.is_empty());

    let confirmed = app
        .lifecycle
        .change_status(id, OrderStatus::Confirmed, None, &staff)
        .await
        .unwrap();
    assert_eq!(confirmed.order.status, OrderStatus::Confirmed);

    let soup_item = confirmed
        .items
        .iter()
        .find(|i| i.catalog_item_id == soup)
        .unwrap()
        .id;
    let edited = app
        .lifecycle
        .edit_items(
            id,
            &[ItemEdit {
                item_id: soup_item,
                quantity: 0,
            }],
            &staff,
        )
        .await
        .unwrap();
    assert_eq!(edited.order.total, Money::from_minor(3_000));
    assert_eq!(edited.items.len(), 1);
    assert!(edited.item(soup_item).is_none());

    let item_edits: Vec<_> = edited
        .history
        .iter()
        .filter(|h| h.details.action() == HistoryAction::ItemEdit)
        .collect();
    assert_eq!(item_edits.len(), 1);
    match &item_edits[0].details {
        HistoryDetails::ItemEdit {
            changes,
            total_before,
            total_after,
        } => {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].from_qty, 2);
            assert_eq!(changes[0].to_qty, 0);
            assert_eq!(*total_before, Money::from_minor(13_000));
            assert_eq!(*total_after, Money::from_minor(3_000));
        }
        other => panic!("unexpected details: {other:?}"),
    }

    let completed = app
        .lifecycle
        .change_status(id, OrderStatus::Completed, None, &staff)
        .await
        .unwrap();
    assert_eq!(completed.order.status, OrderStatus::Completed);

    let bread_item = completed.items[0].id;
    let err = app
        .lifecycle
        .edit_items(
            id,
            &[ItemEdit {
                item_id: bread_item,
                quantity: 5,
            }],
            &staff,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));

    let after = app.lifecycle.snapshot(id).await.unwrap();
    assert_eq!(after.order.total, Money::from_minor(3_000));
    assert_eq!(after.history.len(), 3);
}

#[tokio::test]
async fn test_cancel_with_reason() {
    let app = TestApp::new();
    let item = app.catalog_item("Sarmale", 85);
    let created = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap();

    let cancelled = app
        .lifecycle
        .change_status(
            created.order.id,
            OrderStatus::Cancelled,
            Some("out of stock".to_string()),
            &actor(2, "Mihai"),
        )
        .await
        .unwrap();

    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.order.cancel_reason.as_deref(), Some("out of stock"));
    assert_eq!(cancelled.history.len(), 1);

    let entry = &cancelled.history[0];
    assert_eq!(entry.actor.name, "Mihai");
    assert_eq!(
        entry.details,
        HistoryDetails::StatusChange {
            from: OrderStatus::New,
            to: OrderStatus::Cancelled,
            reason: Some("out of stock".to_string()),
        }
    );
}

// =============================================================================
// Transition graph
// =============================================================================

#[tokio::test]
async fn test_new_cannot_complete_directly() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);
    let created = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap();

    let err = app
        .lifecycle
        .change_status(created.order.id, OrderStatus::Completed, None, &actor(1, "Ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));

    let unchanged = app.lifecycle.snapshot(created.order.id).await.unwrap();
    assert_eq!(unchanged.order.status, OrderStatus::New);
    assert!(unchanged.history.is_empty());
}

#[tokio::test]
async fn test_terminal_orders_accept_nothing() {
    let app = TestApp::new();
    let staff = actor(1, "Ana");
    let item = app.catalog_item("Compot", 20);

    for terminal in [OrderStatus::Completed, OrderStatus::Cancelled] {
        let id = app
            .lifecycle
            .create_order(TestApp::checkout_request(&[(item, 1)]))
            .await
            .unwrap()
            .order
            .id;
        if terminal == OrderStatus::Completed {
            app.lifecycle
                .change_status(id, OrderStatus::Confirmed, None, &staff)
                .await
                .unwrap();
        }
        app.lifecycle
            .change_status(id, terminal, None, &staff)
            .await
            .unwrap();

        for target in OrderStatus::ALL {
            let result = app.lifecycle.change_status(id, target, None, &staff).await;
            assert!(
                matches!(result, Err(LifecycleError::Validation(_))),
                "{terminal} -> {target} should fail"
            );
        }

        let err = app
            .lifecycle
            .edit_customer(
                id,
                &CustomerPatch {
                    name: Some("Altcineva".to_string()),
                    ..CustomerPatch::default()
                },
                &staff,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }
}

// =============================================================================
// Totals and history
// =============================================================================

#[tokio::test]
async fn test_total_matches_items_after_every_edit() {
    let app = TestApp::new();
    let staff = actor(1, "Ana");
    let a = app.catalog_item("A", 12);
    let b = app.catalog_item("B", 7);
    let c = app.catalog_item("C", 31);

    let created = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(a, 1), (b, 4), (c, 2)]))
        .await
        .unwrap();
    let id = created.order.id;
    let ids: Vec<_> = created.items.iter().map(|i| i.id).collect();

    let rounds: [&[(usize, i32)]; 4] = [
        &[(0, 3)],
        &[(1, 0), (2, 5)],
        &[(0, 1), (2, 1)],
        &[(2, -4)],
    ];

    let mut expected_entries = 0;
    for round in rounds {
        let edits: Vec<ItemEdit> = round
            .iter()
            .map(|&(index, quantity)| ItemEdit {
                item_id: ids[index],
                quantity,
            })
            .collect();
        let snapshot = app
            .lifecycle
            .edit_items(id, &edits, &staff)
            .await
            .unwrap();
        expected_entries += 1;

        assert_eq!(snapshot.order.total, snapshot.items_total());
        assert!(snapshot.items.iter().all(|i| i.quantity > 0));
        assert_eq!(snapshot.history.len(), expected_entries);
    }

    let last = app.lifecycle.snapshot(id).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.order.total, Money::from_minor(1_200));
}

#[tokio::test]
async fn test_customer_edit_records_changed_fields_only() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);
    let created = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap();

    let edited = app
        .lifecycle
        .edit_customer(
            created.order.id,
            &CustomerPatch {
                name: Some(created.order.customer.name.clone()),
                phone: Some("  ".to_string()),
                address: Some("str. Puşkin 5".to_string()),
                comment: None,
            },
            &actor(1, "Ana"),
        )
        .await
        .unwrap();

    assert_eq!(edited.order.customer.address.as_deref(), Some("str. Puşkin 5"));
    assert_eq!(edited.order.customer.name, created.order.customer.name);
    assert_eq!(edited.history.len(), 1);
    match &edited.history[0].details {
        HistoryDetails::CustomerEdit { changes } => {
            assert_eq!(changes.len(), 1);
            assert!(changes.contains_key(&CustomerField::Address));
        }
        other => panic!("unexpected details: {other:?}"),
    }
}

#[tokio::test]
async fn test_catalog_price_change_does_not_touch_orders() {
    let app = TestApp::new();
    let item = app.catalog_item("Sarmale", 85);
    let created = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 2)]))
        .await
        .unwrap();

    app.store.set_catalog_price(item, Money::from_minor(99_900));

    let item_id = created.items[0].id;
    let edited = app
        .lifecycle
        .edit_items(
            created.order.id,
            &[ItemEdit {
                item_id,
                quantity: 3,
            }],
            &actor(1, "Ana"),
        )
        .await
        .unwrap();
    assert_eq!(edited.order.total, Money::from_minor(25_500));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_item_edits_are_serialized() {
    let app = TestApp::new();
    let item = app.catalog_item("Plăcintă", 10);
    let created = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 2)]))
        .await
        .unwrap();
    let id = created.order.id;
    let item_id = created.items[0].id;

    let tasks: Vec<_> = (3..23)
        .map(|quantity| {
            let lifecycle = app.lifecycle.clone();
            tokio::spawn(async move {
                lifecycle
                    .edit_items(id, &[ItemEdit { item_id, quantity }], &actor(1, "Ana"))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let last = app.lifecycle.snapshot(id).await.unwrap();
    assert_eq!(last.history.len(), 20);
    assert_eq!(last.order.total, last.items_total());

    // Every entry starts from the quantity the previous one ended at.
    let mut previous = 2;
    for entry in &last.history {
        let HistoryDetails::ItemEdit { changes, .. } = &entry.details else {
            panic!("unexpected details: {:?}", entry.details);
        };
        assert_eq!(changes[0].from_qty, previous);
        previous = changes[0].to_qty;
    }
    assert_eq!(last.items[0].quantity, previous);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirmations_succeed_once() {
    let app = TestApp::new();
    let item = app.catalog_item("Compot", 20);
    let id = app
        .lifecycle
        .create_order(TestApp::checkout_request(&[(item, 1)]))
        .await
        .unwrap()
        .order
        .id;

    let tasks: Vec<_> = (0..10)
        .map(|n| {
            let lifecycle = app.lifecycle.clone();
            tokio::spawn(async move {
                lifecycle
                    .change_status(id, OrderStatus::Confirmed, None, &actor(n, "Operator"))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LifecycleError::Validation(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(app.lifecycle.snapshot(id).await.unwrap().history.len(), 1);
}
