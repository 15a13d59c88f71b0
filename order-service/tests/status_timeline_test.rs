use bigdecimal::BigDecimal;
use chrono::{Duration, TimeZone, Utc};
use order_service::{OrderService, StatusTimeline};
use shared::memory::{FailPoint, MemoryStore};
use shared::{
    Clock, ErrorKind, FulfillmentError, ManualClock, NewOrderInput, Order, OrderInputRepository,
    OrderStatus, StatusInterval, Store,
};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    store: MemoryStore,
    clock: ManualClock,
    service: OrderService<MemoryStore>,
}

fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
    let service = OrderService::new(store.clone(), Arc::new(clock.clone()));
    Fixture {
        store,
        clock,
        service,
    }
}

fn timeline(fx: &Fixture) -> &StatusTimeline<MemoryStore> {
    fx.service.timeline()
}

fn open_rows(history: &[StatusInterval]) -> usize {
    history.iter().filter(|row| row.is_open()).count()
}

#[tokio::test]
async fn test_create_order_opens_initial_interval() {
    let fx = fixture();

    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Received);
    let history = fx.store.history(order.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::Received);
    assert_eq!(history[0].started_at, fx.clock.now());
    assert!(history[0].is_open());
}

#[tokio::test]
async fn test_transition_after_ninety_minutes() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    fx.clock.advance(Duration::minutes(90));
    let transition = timeline(&fx)
        .transition_status(order.id, "In progress")
        .await
        .unwrap();

    let closed = transition.closed.expect("previous interval closed");
    assert_eq!(closed.status, OrderStatus::Received);
    assert_eq!(closed.duration_minutes, Some(90));
    assert_eq!(closed.ended_at, Some(transition.opened.started_at));
    assert_eq!(transition.opened.status, OrderStatus::InProgress);
    assert_eq!(transition.order.status, OrderStatus::InProgress);

    let computed = timeline(&fx).compute_timeline(order.id).await;
    assert_eq!(computed.get(OrderStatus::Received), Some("01:30:00"));
    assert_eq!(computed.get(OrderStatus::InProgress), Some("00:00:00"));
    assert_eq!(computed.average, "01:30:00");
}

#[tokio::test]
async fn test_duration_minutes_round_down() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    fx.clock.advance(Duration::seconds(150));
    let transition = timeline(&fx)
        .transition_status(order.id, "In diagnosis")
        .await
        .unwrap();

    assert_eq!(transition.closed.unwrap().duration_minutes, Some(2));
}

#[tokio::test]
async fn test_single_open_interval_after_many_transitions() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    for status in ["In diagnosis", "Awaiting approval", "In progress", "In progress", "Completed"] {
        fx.clock.advance(Duration::minutes(17));
        timeline(&fx).transition_status(order.id, status).await.unwrap();
    }

    let history = fx.store.history(order.id).await;
    assert_eq!(history.len(), 6);
    assert_eq!(open_rows(&history), 1);
    assert!(history
        .iter()
        .filter(|row| !row.is_open())
        .all(|row| row.duration_minutes == Some(17)));
    assert_eq!(history.last().unwrap().status, OrderStatus::Completed);
    assert_eq!(fx.store.order(order.id).await.unwrap().status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_invalid_status_touches_nothing() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    let before = fx.store.history(order.id).await;

    let err = timeline(&fx)
        .transition_status(order.id, "Unknown")
        .await
        .unwrap_err();

    assert!(matches!(err, FulfillmentError::InvalidStatus(_)));
    assert_eq!(err.to_string(), "invalid order status");
    assert_eq!(fx.store.history(order.id).await, before);
}

#[tokio::test]
async fn test_canceled_is_a_valid_status() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    let changed = fx.service.change_status(order.id, "Canceled").await.unwrap();

    assert_eq!(changed.status, OrderStatus::Canceled);
}

#[tokio::test]
async fn test_transition_without_open_interval_is_tolerated() {
    let fx = fixture();
    let now = fx.clock.now();
    let order = Order {
        id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        vehicle_id: Uuid::new_v4(),
        status: OrderStatus::Received,
        created_at: now,
        updated_at: now,
    };
    fx.store.insert_order(order.clone()).await;

    let transition = timeline(&fx)
        .transition_status(order.id, "In diagnosis")
        .await
        .unwrap();

    assert!(transition.closed.is_none());
    let history = fx.store.history(order.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::InDiagnosis);
    assert_eq!(open_rows(&history), 1);
}

#[tokio::test]
async fn test_failed_open_rolls_back_close() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    fx.store.fail_on(FailPoint::CreateInterval).await;
    fx.clock.advance(Duration::minutes(30));

    let err = timeline(&fx)
        .transition_status(order.id, "In progress")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    let history = fx.store.history(order.id).await;
    assert_eq!(history.len(), 1);
    assert!(history[0].is_open());
    assert_eq!(fx.store.order(order.id).await.unwrap().status, OrderStatus::Received);
}

#[tokio::test]
async fn test_failed_close_opens_nothing() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    fx.store.fail_on(FailPoint::CloseInterval).await;

    assert!(timeline(&fx)
        .transition_status(order.id, "In progress")
        .await
        .is_err());

    let history = fx.store.history(order.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::Received);
}

#[tokio::test]
async fn test_transition_unknown_order() {
    let fx = fixture();

    let err = timeline(&fx)
        .transition_status(Uuid::new_v4(), "In progress")
        .await
        .unwrap_err();

    assert!(matches!(err, FulfillmentError::OrderNotFound));
}

#[tokio::test]
async fn test_open_initial_status_creates_open_row() {
    let fx = fixture();
    let order_id = Uuid::new_v4();

    let interval = timeline(&fx)
        .open_initial_status(order_id, OrderStatus::Received)
        .await
        .unwrap();

    assert!(interval.is_open());
    assert_eq!(fx.store.history(order_id).await, vec![interval]);
}

#[tokio::test]
async fn test_timeline_degrades_on_storage_failure() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    fx.clock.advance(Duration::minutes(10));
    fx.service.change_status(order.id, "In progress").await.unwrap();
    fx.store.fail_on(FailPoint::ListHistory).await;

    let computed = timeline(&fx).compute_timeline(order.id).await;

    assert!(computed.is_empty());
    assert_eq!(computed.average, "00:00:00");
}

#[tokio::test]
async fn test_timeline_of_fresh_order_is_empty() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    let computed = timeline(&fx).compute_timeline(order.id).await;

    assert!(computed.is_empty());
    assert_eq!(computed.average, "00:00:00");
}

#[tokio::test]
async fn test_overview_of_missing_order() {
    let fx = fixture();

    let err = fx.service.overview(Uuid::new_v4()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_overview_includes_timeline() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    fx.clock.advance(Duration::hours(25));
    fx.service.change_status(order.id, "In progress").await.unwrap();

    let overview = fx.service.overview(order.id).await.unwrap();

    assert_eq!(overview.order.status, OrderStatus::InProgress);
    assert!(overview.items.is_empty());
    assert_eq!(overview.timeline.get(OrderStatus::Received), Some("25:00:00"));
}

#[tokio::test]
async fn test_overview_totals_line_items() {
    let fx = fixture();
    let order = fx
        .service
        .create_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    let order_id = order.id;
    fx.store
        .run(move |tx| {
            Box::pin(async move {
                for (quantity, unit_price) in [(2, "19.99"), (3, "40.00")] {
                    let unit_price = BigDecimal::from_str(unit_price).unwrap();
                    tx.create_order_input(&NewOrderInput::priced(
                        order_id,
                        Uuid::new_v4(),
                        quantity,
                        unit_price,
                    ))
                    .await?;
                }
                Ok::<_, FulfillmentError>(())
            })
        })
        .await
        .unwrap();

    let overview = fx.service.overview(order_id).await.unwrap();

    assert_eq!(overview.items.len(), 2);
    assert_eq!(overview.total, BigDecimal::from_str("159.98").unwrap());
    assert!(overview.timeline.is_empty());
}
