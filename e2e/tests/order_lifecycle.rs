use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use e2e::helpers::{new_checkout_api, seed_products, stock_of};
use order_engine::{
    db_types::{CartLine, NewOrderRequest, OrderStatusType, PaymentMethod, PaymentStatusType},
    events::{EventHandlers, EventHooks},
    order_objects::OrderQueryFilter,
    test_utils::{prepare_test_env, random_db_path},
    CheckoutApi,
    CheckoutError,
    OrderManagement,
    PricingConfig,
    SqliteDatabase,
};

async fn place_test_order(api: &CheckoutApi<SqliteDatabase>, quantity: i64) -> i64 {
    let products = seed_products(api, &[("Test article", 1000, 100)]).await;
    let request = NewOrderRequest::new(
        "1 Example St",
        "1 Example St",
        vec![CartLine::new(products[0].id, quantity)],
        PaymentMethod::Card,
    );
    api.place_order(request).await.expect("Error placing order").order.id
}

#[tokio::test]
async fn the_nominal_fulfilment_path_runs_to_completion() {
    let api = new_checkout_api().await;
    let order_id = place_test_order(&api, 1).await;

    let changed = api.update_order_status(order_id, OrderStatusType::Processing).await.unwrap();
    assert_eq!(changed.old_order.status, OrderStatusType::Pending);
    assert_eq!(changed.new_order.status, OrderStatusType::Processing);

    let changed = api.update_order_status(order_id, OrderStatusType::Shipped).await.unwrap();
    assert_eq!(changed.old_order.status, OrderStatusType::Processing);

    let changed = api.update_order_status(order_id, OrderStatusType::Delivered).await.unwrap();
    assert_eq!(changed.new_order.status, OrderStatusType::Delivered);

    // delivered is terminal
    let err = api.update_order_status(order_id, OrderStatusType::Processing).await.expect_err("Must fail");
    assert!(matches!(
        err,
        CheckoutError::InvalidStatusTransition { from: OrderStatusType::Delivered, to: OrderStatusType::Processing }
    ));
}

#[tokio::test]
async fn a_status_outside_the_enumerated_set_is_rejected_without_touching_the_order() {
    let api = new_checkout_api().await;
    let order_id = place_test_order(&api, 1).await;

    let err = api.update_order_status_str(order_id, "bogus").await.expect_err("Must fail");
    assert!(matches!(err, CheckoutError::UnknownStatus(ref s) if s == "bogus"));

    let order = api.db().fetch_order(order_id).await.unwrap().expect("Order not found");
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn a_same_status_update_is_a_noop() {
    let api = new_checkout_api().await;
    let order_id = place_test_order(&api, 1).await;

    let err = api.update_order_status(order_id, OrderStatusType::Pending).await.expect_err("Must fail");
    assert!(matches!(err, CheckoutError::OrderModificationNoOp));
}

#[tokio::test]
async fn updating_a_missing_order_fails_cleanly() {
    let api = new_checkout_api().await;
    let err = api.update_order_status(424242, OrderStatusType::Processing).await.expect_err("Must fail");
    assert!(matches!(err, CheckoutError::OrderNotFound(424242)));
}

#[tokio::test]
async fn cancelling_through_the_status_endpoint_still_restocks() {
    let api = new_checkout_api().await;
    let products = seed_products(&api, &[("Valve block", 6000, 5)]).await;
    let request = NewOrderRequest::new(
        "1 Example St",
        "1 Example St",
        vec![CartLine::new(products[0].id, 2)],
        PaymentMethod::Card,
    );
    let placed = api.place_order(request).await.expect("Error placing order");
    assert_eq!(stock_of(&api, products[0].id).await, 3);

    let changed = api.update_order_status(placed.order.id, OrderStatusType::Cancelled).await.unwrap();
    assert_eq!(changed.old_order.status, OrderStatusType::Pending);
    assert_eq!(changed.new_order.status, OrderStatusType::Cancelled);
    assert_eq!(stock_of(&api, products[0].id).await, 5);
}

#[tokio::test]
async fn the_payment_flow_supports_failure_and_retry() {
    let api = new_checkout_api().await;
    let order_id = place_test_order(&api, 1).await;

    let changed = api.update_payment_status(order_id, PaymentStatusType::Failed, None).await.unwrap();
    assert_eq!(changed.new_order.payment_status, PaymentStatusType::Failed);

    // a failed payment may be retried
    let changed = api
        .update_payment_status(order_id, PaymentStatusType::Paid, Some("txn_8813".to_string()))
        .await
        .unwrap();
    assert_eq!(changed.old_order.payment_status, PaymentStatusType::Failed);
    assert_eq!(changed.new_order.payment_status, PaymentStatusType::Paid);
    assert_eq!(changed.new_order.payment_reference.as_deref(), Some("txn_8813"));

    let changed = api.update_payment_status(order_id, PaymentStatusType::Refunded, None).await.unwrap();
    assert_eq!(changed.new_order.payment_status, PaymentStatusType::Refunded);
    // the reference survives a status change that does not supply one
    assert_eq!(changed.new_order.payment_reference.as_deref(), Some("txn_8813"));

    // refunded is terminal
    let err = api.update_payment_status(order_id, PaymentStatusType::Pending, None).await.expect_err("Must fail");
    assert!(matches!(err, CheckoutError::InvalidPaymentTransition { .. }));
}

#[tokio::test]
async fn a_pending_payment_cannot_jump_straight_to_refunded() {
    let api = new_checkout_api().await;
    let order_id = place_test_order(&api, 1).await;

    let err = api.update_payment_status(order_id, PaymentStatusType::Refunded, None).await.expect_err("Must fail");
    assert!(matches!(
        err,
        CheckoutError::InvalidPaymentTransition { from: PaymentStatusType::Pending, to: PaymentStatusType::Refunded }
    ));
    let err = api.update_payment_status_str(order_id, "Settled", None).await.expect_err("Must fail");
    assert!(matches!(err, CheckoutError::UnknownStatus(_)));
}

#[tokio::test]
async fn guest_orders_are_searchable_by_status() {
    let api = new_checkout_api().await;
    let products = seed_products(&api, &[("Coupling", 900, 20)]).await;
    let request = NewOrderRequest::new(
        "Pickup counter",
        "Pickup counter",
        vec![CartLine::new(products[0].id, 1)],
        PaymentMethod::CashOnDelivery,
    );
    let placed = api.place_order(request).await.expect("Error placing order");
    assert_eq!(placed.order.customer_id, None);

    let pending =
        api.db().search_orders(OrderQueryFilter::default().with_status(OrderStatusType::Pending)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, placed.order.id);

    let delivered =
        api.db().search_orders(OrderQueryFilter::default().with_status(OrderStatusType::Delivered)).await.unwrap();
    assert!(delivered.is_empty());

    assert!(api.db().fetch_orders_for_customer(1).await.unwrap().is_empty());

    let recent = api
        .db()
        .search_orders(
            OrderQueryFilter::default().since(chrono::Utc::now() - chrono::Duration::hours(1)).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn subscribed_hooks_see_lifecycle_events() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to the test database");

    let created_count = Arc::new(AtomicU64::new(0));
    let status_count = Arc::new(AtomicU64::new(0));
    let mut hooks = EventHooks::default();
    let c = created_count.clone();
    hooks.on_order_created(move |_ev| {
        let c = c.clone();
        Box::pin(async move {
            c.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    });
    let s = status_count.clone();
    hooks.on_order_status_changed(move |ev| {
        let s = s.clone();
        Box::pin(async move {
            assert_eq!(ev.old_status, OrderStatusType::Pending);
            assert_eq!(ev.new_status, OrderStatusType::Processing);
            s.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = CheckoutApi::new(db, PricingConfig::default(), producers);
    let order_id = place_test_order(&api, 2).await;
    api.update_order_status(order_id, OrderStatusType::Processing).await.unwrap();

    // the handlers run on background tasks; poll briefly rather than racing them
    for _ in 0..50 {
        if created_count.load(Ordering::SeqCst) == 1 && status_count.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(created_count.load(Ordering::SeqCst), 1);
    assert_eq!(status_count.load(Ordering::SeqCst), 1);
}
