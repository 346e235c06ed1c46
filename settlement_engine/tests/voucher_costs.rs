use chrono::Duration;
use settlement_engine::{
    db_types::{Amount, DateRange, NewVoucherRedemptionCost, OrderId, OrderSnapshot, SellerSnapshot, VoucherSnapshot},
    traits::RedemptionCostQueryFilter,
    SqliteDatabase,
    VoucherCostApi,
    VoucherCostError,
};
use support::{prepare_test_env, tear_down, ts, TestClock};

mod support;

async fn setup() -> (SqliteDatabase, TestClock, VoucherCostApi<SqliteDatabase>) {
    let db = prepare_test_env().await;
    let clock = TestClock::new(ts(5, 0));
    let api = VoucherCostApi::new(db.clone()).with_clock(clock.clock());
    (db, clock, api)
}

fn redemption(voucher: &str, order: &str, seller: &str, covered: i64) -> NewVoucherRedemptionCost {
    NewVoucherRedemptionCost {
        voucher_id: voucher.to_string(),
        order_id: OrderId::from(order),
        seller_organization_id: seller.to_string(),
        amount_covered: Amount::from(covered),
        voucher_snapshot: VoucherSnapshot {
            code: format!("{voucher}-CODE"),
            name: "Ramadan refund voucher".into(),
            voucher_type: "refund".into(),
            value: Amount::from(covered),
        },
        order_snapshot: OrderSnapshot {
            order_id: OrderId::from(order),
            customer_id: "alice".into(),
            total_amount: Amount::from(5000),
            order_date: ts(1, 0),
        },
        seller_snapshot: SellerSnapshot {
            organization_id: seller.to_string(),
            name: format!("{seller} store"),
            payout_account: Some("BCA 1234".into()),
        },
    }
}

#[tokio::test]
async fn redemption_costs_keep_their_snapshots() {
    let (db, clock, api) = setup().await;
    let new = redemption("v1", "o1", "org-1", 1500);
    let cost = api.record_redemption_cost(new.clone()).await.unwrap();
    assert_eq!(cost.amount_covered, Amount::from(1500));
    assert_eq!(cost.created_at, clock.now());
    assert!(!cost.is_deleted);
    let fetched = api.fetch_redemption_cost(cost.id).await.unwrap();
    assert_eq!(fetched, cost);
    assert_eq!(fetched.voucher_snapshot, new.voucher_snapshot);
    assert_eq!(fetched.order_snapshot, new.order_snapshot);
    assert_eq!(fetched.seller_snapshot, new.seller_snapshot);
    assert!(matches!(api.fetch_redemption_cost(999).await, Err(VoucherCostError::RedemptionCostNotFound(999))));
    tear_down(db).await;
}

#[tokio::test]
async fn invalid_redemption_costs_are_rejected() {
    let (db, _clock, api) = setup().await;
    let zero = redemption("v1", "o1", "org-1", 0);
    assert!(matches!(api.record_redemption_cost(zero).await, Err(VoucherCostError::InvariantViolation(_))));
    let negative = redemption("v1", "o1", "org-1", -10);
    assert!(matches!(api.record_redemption_cost(negative).await, Err(VoucherCostError::InvariantViolation(_))));
    let mut mismatched = redemption("v1", "o1", "org-1", 10);
    mismatched.order_snapshot.order_id = OrderId::from("o2");
    assert!(matches!(api.record_redemption_cost(mismatched).await, Err(VoucherCostError::InvariantViolation(_))));
    assert!(api.redemption_costs_for_voucher("v1").await.unwrap().is_empty());
    tear_down(db).await;
}

#[tokio::test]
async fn seller_summaries_cover_a_date_range() {
    let (db, clock, api) = setup().await;
    api.record_redemption_cost(redemption("v1", "o1", "org-1", 1000)).await.unwrap();
    clock.advance(Duration::days(1));
    api.record_redemption_cost(redemption("v2", "o2", "org-1", 250)).await.unwrap();
    api.record_redemption_cost(redemption("v2", "o3", "org-2", 300)).await.unwrap();
    clock.advance(Duration::days(1));
    api.record_redemption_cost(redemption("v1", "o4", "org-1", 75)).await.unwrap();

    let whole_week = DateRange::new(ts(1, 0), ts(8, 0));
    let summary = api.redemption_costs_for_seller("org-1", whole_week).await.unwrap();
    assert_eq!(summary.costs.len(), 3);
    assert_eq!(summary.total_covered, Amount::from(1325));
    // The end of the range is exclusive
    let summary = api.redemption_costs_for_seller("org-1", DateRange::new(ts(5, 0), ts(7, 0))).await.unwrap();
    assert_eq!(summary.total_covered, Amount::from(1250));
    let summary = api.redemption_costs_for_seller("org-3", whole_week).await.unwrap();
    assert!(summary.costs.is_empty());
    assert_eq!(summary.total_covered, Amount::ZERO);

    assert_eq!(api.redemption_costs_for_voucher("v2").await.unwrap().len(), 2);
    assert_eq!(api.redemption_costs_for_order(&OrderId::from("o4")).await.unwrap().len(), 1);
    tear_down(db).await;
}

#[tokio::test]
async fn corrections_replace_the_original_record() {
    let (db, _clock, api) = setup().await;
    let original = api.record_redemption_cost(redemption("v1", "o1", "org-1", 1000)).await.unwrap();
    let corrected = api.correct_redemption_cost(original.id, redemption("v1", "o1", "org-1", 800)).await.unwrap();
    assert_ne!(corrected.id, original.id);
    assert_eq!(corrected.amount_covered, Amount::from(800));
    let old = api.fetch_redemption_cost(original.id).await.unwrap();
    assert!(old.is_deleted);
    assert_eq!(old.amount_covered, Amount::from(1000));

    let live = api.redemption_costs_for_order(&OrderId::from("o1")).await.unwrap();
    assert_eq!(live.iter().map(|c| c.id).collect::<Vec<_>>(), vec![corrected.id]);
    let query = RedemptionCostQueryFilter::default().with_order_id(OrderId::from("o1")).including_deleted();
    assert_eq!(api.search_redemption_costs(query).await.unwrap().len(), 2);

    // A deleted record cannot be corrected again, and nothing is inserted when that fails
    let err = api.correct_redemption_cost(original.id, redemption("v1", "o1", "org-1", 700)).await.unwrap_err();
    assert!(matches!(err, VoucherCostError::RedemptionCostNotFound(_)));
    assert_eq!(api.redemption_costs_for_order(&OrderId::from("o1")).await.unwrap().len(), 1);
    let invalid = api.correct_redemption_cost(corrected.id, redemption("v1", "o1", "org-1", 0)).await;
    assert!(matches!(invalid, Err(VoucherCostError::InvariantViolation(_))));
    tear_down(db).await;
}

#[tokio::test]
async fn soft_deleted_costs_leave_the_summaries() {
    let (db, _clock, api) = setup().await;
    let cost = api.record_redemption_cost(redemption("v1", "o1", "org-1", 1000)).await.unwrap();
    api.record_redemption_cost(redemption("v1", "o2", "org-1", 50)).await.unwrap();
    let deleted = api.soft_delete_redemption_cost(cost.id).await.unwrap();
    assert!(deleted.is_deleted);
    let summary = api.redemption_costs_for_seller("org-1", DateRange::new(ts(1, 0), ts(8, 0))).await.unwrap();
    assert_eq!(summary.total_covered, Amount::from(50));
    let again = api.soft_delete_redemption_cost(cost.id).await;
    assert!(matches!(again, Err(VoucherCostError::RedemptionCostNotFound(_))));
    tear_down(db).await;
}
