use settlement_engine::{
    db_types::{DateRange, NewOrderBatch, OrderId},
    traits::{BatchCommand, BatchQueryFilter},
    BatchApi,
    BatchError,
    SqliteDatabase,
};
use support::{add_order, prepare_test_env, tear_down, ts, TestClock};

mod support;

async fn setup() -> (SqliteDatabase, TestClock, BatchApi<SqliteDatabase>) {
    let db = prepare_test_env().await;
    let clock = TestClock::new(ts(20, 0));
    let api = BatchApi::new(db.clone()).with_clock(clock.clock());
    (db, clock, api)
}

fn week(org: &str, name: &str, from: u32) -> NewOrderBatch {
    NewOrderBatch::new(org, name, DateRange::new(ts(from, 0), ts(from + 7, 0)), "admin")
}

#[tokio::test]
async fn batches_need_a_name_and_a_range() {
    let (db, clock, api) = setup().await;
    let batch = api.create_batch(week("org-1", "Week 1", 1).with_description("First week")).await.unwrap();
    assert_eq!(batch.name, "Week 1");
    assert_eq!(batch.description.as_deref(), Some("First week"));
    assert!(batch.is_active);
    assert_eq!(batch.created_at, clock.now());

    let err = api.create_batch(week("org-1", "  ", 1)).await.unwrap_err();
    assert!(matches!(err, BatchError::InvariantViolation(_)));
    let backwards = NewOrderBatch::new("org-1", "Backwards", DateRange::new(ts(8, 0), ts(1, 0)), "admin");
    assert!(matches!(api.create_batch(backwards).await, Err(BatchError::InvariantViolation(_))));
    let empty = NewOrderBatch::new("org-1", "Empty", DateRange::new(ts(8, 0), ts(8, 0)), "admin");
    assert!(matches!(api.create_batch(empty).await, Err(BatchError::InvariantViolation(_))));
    tear_down(db).await;
}

#[tokio::test]
async fn batches_can_be_edited_until_deleted() {
    let (db, _clock, api) = setup().await;
    let batch = api.create_batch(week("org-1", "Week 1", 1)).await.unwrap();
    let id = batch.id;

    let rename = BatchCommand::Rename { name: "Week one".into(), description: Some("renamed".into()) };
    let batch = api.edit_batch(id, rename).await.unwrap();
    assert_eq!(batch.name, "Week one");
    let blank = BatchCommand::Rename { name: "".into(), description: None };
    assert!(matches!(api.edit_batch(id, blank).await, Err(BatchError::InvariantViolation(_))));
    let bad_range = BatchCommand::Reschedule(DateRange::new(ts(9, 0), ts(2, 0)));
    assert!(matches!(api.edit_batch(id, bad_range).await, Err(BatchError::InvariantViolation(_))));
    let batch = api.edit_batch(id, BatchCommand::Reschedule(DateRange::new(ts(2, 0), ts(9, 0)))).await.unwrap();
    assert_eq!(batch.range(), DateRange::new(ts(2, 0), ts(9, 0)));

    assert!(!api.toggle_active(id).await.unwrap().is_active);
    assert!(api.toggle_active(id).await.unwrap().is_active);
    assert!(!api.set_active(id, false).await.unwrap().is_active);
    assert!(!api.set_active(id, false).await.unwrap().is_active);
    assert!(api.set_active(id, true).await.unwrap().is_active);

    let deleted = api.soft_delete(id).await.unwrap();
    assert!(deleted.is_deleted);
    assert!(!deleted.is_effectively_active());
    assert!(matches!(api.fetch_batch(id).await, Err(BatchError::BatchNotFound(_))));
    assert!(matches!(api.toggle_active(id).await, Err(BatchError::BatchNotFound(_))));
    assert!(matches!(api.soft_delete(id).await, Err(BatchError::BatchNotFound(_))));
    let rename = BatchCommand::Rename { name: "Zombie".into(), description: None };
    assert!(matches!(api.edit_batch(id, rename).await, Err(BatchError::BatchNotFound(_))));
    tear_down(db).await;
}

#[tokio::test]
async fn overlapping_batches() {
    let (db, _clock, api) = setup().await;
    let w1 = api.create_batch(week("org-1", "Week 1", 1)).await.unwrap();
    let w2 = api.create_batch(week("org-1", "Week 2", 8).inactive()).await.unwrap();
    let w3 = api.create_batch(week("org-1", "Week 3", 15)).await.unwrap();
    api.create_batch(week("org-2", "Other org", 1)).await.unwrap();

    // Touching ranges do not overlap
    let found = api.list_batches_overlapping("org-1", DateRange::new(ts(8, 0), ts(15, 0))).await.unwrap();
    assert_eq!(found.iter().map(|b| b.id).collect::<Vec<_>>(), vec![w2.id]);
    let found = api.list_batches_overlapping("org-1", DateRange::new(ts(7, 12), ts(15, 1))).await.unwrap();
    assert_eq!(found.iter().map(|b| b.id).collect::<Vec<_>>(), vec![w1.id, w2.id, w3.id]);

    let query = BatchQueryFilter::for_organization("org-1").overlapping(DateRange::new(ts(1, 0), ts(22, 0)));
    let active = api.search_batches(query.active_only()).await.unwrap();
    assert_eq!(active.iter().map(|b| b.id).collect::<Vec<_>>(), vec![w1.id, w3.id]);

    api.soft_delete(w3.id).await.unwrap();
    let all = api.search_batches(BatchQueryFilter::for_organization("org-1")).await.unwrap();
    assert_eq!(all.len(), 2);
    let bad = BatchQueryFilter::for_organization("org-1").overlapping(DateRange::new(ts(9, 0), ts(1, 0)));
    assert!(matches!(api.search_batches(bad).await, Err(BatchError::InvariantViolation(_))));
    tear_down(db).await;
}

#[tokio::test]
async fn batch_membership_is_half_open() {
    let (db, _clock, api) = setup().await;
    add_order(&db, "first", "alice", "org-1", 100, ts(1, 0)).await;
    add_order(&db, "middle", "bob", "org-1", 200, ts(4, 12)).await;
    add_order(&db, "boundary", "alice", "org-1", 300, ts(8, 0)).await;
    add_order(&db, "other-org", "alice", "org-2", 400, ts(2, 0)).await;
    let w1 = api.create_batch(week("org-1", "Week 1", 1)).await.unwrap();
    let w2 = api.create_batch(week("org-1", "Week 2", 8)).await.unwrap();

    let orders = api.orders_in_batch(w1.id).await.unwrap();
    let ids = orders.iter().map(|o| o.order_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids, vec![OrderId::from("first"), OrderId::from("middle")]);
    assert!(orders.iter().all(|o| w1.contains(o)));
    let orders = api.orders_in_batch(w2.id).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, OrderId::from("boundary"));

    api.soft_delete(w2.id).await.unwrap();
    assert!(matches!(api.orders_in_batch(w2.id).await, Err(BatchError::BatchNotFound(_))));
    tear_down(db).await;
}
