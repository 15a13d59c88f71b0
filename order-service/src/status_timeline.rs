use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    Clock, FulfillmentError, NewStatusInterval, Order, OrderRepository, OrderStatus, Repositories,
    Result, StatusHistoryRepository, StatusInterval, Store,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::timeline::{build_timeline, Timeline};

/// Outcome of a status change.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub closed: Option<StatusInterval>,
    pub opened: StatusInterval,
    pub order: Order,
}

/// Keeps each order's status history as a chain of non-overlapping intervals,
/// exactly one of which is open.
#[derive(Clone)]
pub struct StatusTimeline<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> StatusTimeline<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn open_initial_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<StatusInterval> {
        let clock = self.clock.clone();

        self.store
            .run(move |tx| {
                Box::pin(async move { open_interval(tx, order_id, status, clock.now()).await })
            })
            .await
            .inspect_err(|e| error!(%order_id, %status, "Failed to open initial status: {}", e))
    }

    /// Closes the open interval and opens one for `new_status`, updating the
    /// order's cached status in the same unit.
    pub async fn transition_status(&self, order_id: Uuid, new_status: &str) -> Result<Transition> {
        let status: OrderStatus = new_status
            .parse()
            .inspect_err(|_| error!(%order_id, new_status, "Rejected invalid order status"))?;
        let clock = self.clock.clone();

        self.store
            .run(move |tx| {
                Box::pin(async move { transition(tx, clock.as_ref(), order_id, status).await })
            })
            .await
            .inspect_err(|e| error!(%order_id, %status, "Status transition failed: {}", e))
    }

    /// Best-effort read: storage failures are logged and yield an empty timeline.
    pub async fn compute_timeline(&self, order_id: Uuid) -> Timeline {
        let history = self
            .store
            .run(move |tx| Box::pin(async move { tx.list_history(order_id).await }))
            .await;

        match history {
            Ok(history) => {
                let timeline = build_timeline(&history);
                info!(
                    %order_id,
                    rows = history.len(),
                    average = %timeline.average,
                    "Computed status timeline"
                );
                timeline
            }
            Err(e) => {
                error!(%order_id, "Failed to load status history: {}", e);
                Timeline::empty()
            }
        }
    }
}

/// Whole minutes between `started_at` and `now`, never negative.
pub fn elapsed_minutes(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started_at).num_minutes().max(0)
}

pub(crate) async fn open_interval(
    tx: &mut dyn Repositories,
    order_id: Uuid,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> Result<StatusInterval> {
    let interval = tx
        .create_interval(&NewStatusInterval::open(order_id, status, now))
        .await?;
    info!(%order_id, %status, interval_id = %interval.id, "Opened status interval");
    Ok(interval)
}

async fn transition(
    tx: &mut dyn Repositories,
    clock: &dyn Clock,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<Transition> {
    tx.lock_order(order_id)
        .await?
        .ok_or(FulfillmentError::OrderNotFound)?;
    let now = clock.now();

    let closed = match tx.find_open_interval(order_id).await? {
        Some(open) => {
            let minutes = elapsed_minutes(open.started_at, now);
            let closed = tx.close_interval(open.id, now, minutes).await?;
            info!(
                %order_id,
                from = %closed.status,
                duration_minutes = minutes,
                "Closed status interval"
            );
            Some(closed)
        }
        None => {
            warn!(%order_id, "No open status interval, skipping finalize");
            None
        }
    };

    let opened = open_interval(tx, order_id, status, now).await?;
    let order = tx.update_order_status(order_id, status, now).await?;

    Ok(Transition {
        closed,
        opened,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_elapsed_minutes_rounds_down() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert_eq!(elapsed_minutes(start, start + Duration::seconds(5399)), 89);
        assert_eq!(elapsed_minutes(start, start + Duration::minutes(90)), 90);
        assert_eq!(elapsed_minutes(start, start + Duration::seconds(59)), 0);
    }

    #[test]
    fn test_elapsed_minutes_clamps_clock_skew() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert_eq!(elapsed_minutes(start, start - Duration::minutes(3)), 0);
    }
}
