use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use settlement_engine::{
    db_types::{AdjustmentStatus, AdjustmentType, Amount, NewPayoutAdjustment, OrderId},
    events::{EventHandlers, EventHooks, EventProducers},
    traits::AdjustmentQueryFilter,
    AdjustmentApi,
    AdjustmentError,
    SqliteDatabase,
};
use support::{add_order, prepare_test_env, tear_down, ts, TestClock};

mod support;

async fn setup_with(producers: EventProducers) -> (SqliteDatabase, TestClock, AdjustmentApi<SqliteDatabase>) {
    let db = prepare_test_env().await;
    let clock = TestClock::new(ts(10, 0));
    add_order(&db, "o1", "alice", "org-1", 1000, ts(1, 0)).await;
    add_order(&db, "o2", "bob", "org-1", 400, ts(2, 0)).await;
    add_order(&db, "o3", "carol", "org-2", 700, ts(2, 0)).await;
    let api = AdjustmentApi::new(db.clone(), producers).with_clock(clock.clock());
    (db, clock, api)
}

async fn setup() -> (SqliteDatabase, TestClock, AdjustmentApi<SqliteDatabase>) {
    setup_with(EventProducers::default()).await
}

fn refund(org: &str, order: &str, invoice: &str, amount: i64) -> NewPayoutAdjustment {
    NewPayoutAdjustment::new(org, OrderId::from(order), invoice, AdjustmentType::Refund, Amount::from(amount), "refund")
}

#[tokio::test]
async fn adjustments_are_recorded_once_as_deductions() {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();
    let mut hooks = EventHooks::default();
    hooks.on_adjustment_recorded(move |ev| {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().unwrap().push(ev.adjustment.id);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(4, hooks);
    let producers = handlers.producers();
    let tasks = handlers.start_handlers();
    let (db, clock, api) = setup_with(producers).await;

    let first = api.record_adjustment(refund("org-1", "o1", "INV-1", 250)).await.unwrap();
    assert!(!first.already_recorded);
    assert_eq!(first.adjustment.amount, Amount::from(-250));
    assert_eq!(first.adjustment.status, AdjustmentStatus::Pending);
    assert_eq!(first.adjustment.created_at, clock.now());
    assert!(first.adjustment.adjustment_invoice_id.is_none());

    // Negative inputs are stored the same way, and a redelivered event changes nothing
    let again = api.record_adjustment(refund("org-1", "o1", "INV-1", -999)).await.unwrap();
    assert!(again.already_recorded);
    assert_eq!(again.adjustment, first.adjustment);
    let cancel = NewPayoutAdjustment::new(
        "org-1",
        OrderId::from("o2"),
        "INV-1",
        AdjustmentType::Cancellation,
        Amount::from(-400),
        "cancelled",
    );
    let second = api.record_adjustment(cancel).await.unwrap();
    assert_eq!(second.adjustment.amount, Amount::from(-400));
    assert_eq!(second.adjustment.adjustment_type, AdjustmentType::Cancellation);

    drop(api);
    for task in tasks {
        task.await.unwrap();
    }
    let mut recorded = recorded.lock().unwrap().clone();
    recorded.sort();
    assert_eq!(recorded, vec![first.adjustment.id, second.adjustment.id]);
    tear_down(db).await;
}

#[tokio::test]
async fn invalid_adjustments_are_rejected() {
    let (db, _clock, api) = setup().await;
    let err = api.record_adjustment(refund("org-1", "o1", "INV-1", 0)).await.unwrap_err();
    assert!(matches!(err, AdjustmentError::InvariantViolation(_)));
    let err = api.record_adjustment(refund("org-1", "o1", " ", 10)).await.unwrap_err();
    assert!(matches!(err, AdjustmentError::InvariantViolation(_)));
    let err = api.record_adjustment(refund("org-1", "nope", "INV-1", 10)).await.unwrap_err();
    assert!(matches!(err, AdjustmentError::OrderNotFound(_)));
    let err = api.record_adjustment(refund("org-1", "o3", "INV-1", 10)).await.unwrap_err();
    assert!(matches!(err, AdjustmentError::InvariantViolation(_)));
    assert!(api.list_pending_adjustments("org-1").await.unwrap().is_empty());
    tear_down(db).await;
}

#[tokio::test]
async fn pending_adjustments_fold_into_the_next_payout() {
    let (db, clock, api) = setup().await;
    let a1 = api.record_adjustment(refund("org-1", "o1", "INV-1", 250)).await.unwrap().adjustment;
    let a2 = api.record_adjustment(refund("org-1", "o2", "INV-1", 400)).await.unwrap().adjustment;
    let other = api.record_adjustment(refund("org-2", "o3", "INV-9", 100)).await.unwrap().adjustment;

    let pending = api.list_pending_adjustments("org-1").await.unwrap();
    assert_eq!(pending.iter().map(|a| a.id).collect::<Vec<_>>(), vec![a1.id, a2.id]);

    let applied = api.apply_adjustments("org-1", "INV-2", &[a1.id, a2.id, a1.id]).await.unwrap();
    assert_eq!(applied.count(), 2);
    assert_eq!(applied.total(), Amount::from(-650));
    assert_eq!(applied.adjustment_invoice_id, "INV-2");
    for adj in &applied.adjustments {
        assert_eq!(adj.status, AdjustmentStatus::Applied);
        assert_eq!(adj.adjustment_invoice_id.as_deref(), Some("INV-2"));
        assert_eq!(adj.applied_at, Some(clock.now()));
    }
    assert!(api.list_pending_adjustments("org-1").await.unwrap().is_empty());

    // Running the payout again is harmless
    let again = api.apply_adjustments("org-1", "INV-2", &[a1.id, a2.id]).await.unwrap();
    assert_eq!(again.total(), Amount::from(-650));
    let err = api.apply_adjustments("org-1", "INV-3", &[a1.id]).await.unwrap_err();
    assert!(matches!(err, AdjustmentError::InvariantViolation(_)));

    let query = AdjustmentQueryFilter::default().with_adjustment_invoice_id("INV-2");
    assert_eq!(api.search_adjustments(query).await.unwrap().len(), 2);
    let found = api.adjustment_for_order(&OrderId::from("o1"), "INV-1").await.unwrap().unwrap();
    assert_eq!(found.id, a1.id);
    assert!(api.adjustment_for_order(&OrderId::from("o1"), "INV-2").await.unwrap().is_none());
    assert_eq!(api.fetch_adjustment(other.id).await.unwrap().status, AdjustmentStatus::Pending);
    tear_down(db).await;
}

#[tokio::test]
async fn applying_adjustments_is_all_or_nothing() {
    let (db, _clock, api) = setup().await;
    let a1 = api.record_adjustment(refund("org-1", "o1", "INV-1", 250)).await.unwrap().adjustment;
    let other = api.record_adjustment(refund("org-2", "o3", "INV-9", 100)).await.unwrap().adjustment;

    let err = api.apply_adjustments("org-1", "INV-2", &[a1.id, 9999]).await.unwrap_err();
    assert!(matches!(err, AdjustmentError::AdjustmentNotFound(9999)));
    let err = api.apply_adjustments("org-1", "INV-2", &[a1.id, other.id]).await.unwrap_err();
    assert!(matches!(err, AdjustmentError::AdjustmentNotFound(_)));
    let a1 = api.fetch_adjustment(a1.id).await.unwrap();
    assert_eq!(a1.status, AdjustmentStatus::Pending);
    assert!(a1.adjustment_invoice_id.is_none());

    let err = api.apply_adjustments("org-1", "", &[a1.id]).await.unwrap_err();
    assert!(matches!(err, AdjustmentError::InvariantViolation(_)));
    assert!(matches!(api.fetch_adjustment(12345).await, Err(AdjustmentError::AdjustmentNotFound(12345))));
    tear_down(db).await;
}
