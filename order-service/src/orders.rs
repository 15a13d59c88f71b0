use bigdecimal::BigDecimal;
use num_traits::Zero;
use serde::Serialize;
use shared::{
    Clock, FulfillmentError, NewOrder, Order, OrderInput, OrderInputRepository, OrderRepository,
    OrderStatus, Result, Store,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::status_timeline::{open_interval, StatusTimeline};
use crate::timeline::Timeline;

/// Everything the shop floor needs to see about one order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderOverview {
    pub order: Order,
    pub items: Vec<OrderInput>,
    pub total: BigDecimal,
    pub timeline: Timeline,
}

/// Order use cases that drive the status timeline.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    timeline: StatusTimeline<S>,
}

impl<S: Store + Clone> OrderService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        let timeline = StatusTimeline::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            timeline,
        }
    }

    pub fn timeline(&self) -> &StatusTimeline<S> {
        &self.timeline
    }

    /// Inserts the order in its initial status together with its first open interval.
    pub async fn create_order(&self, customer_id: Uuid, vehicle_id: Uuid) -> Result<Order> {
        let clock = self.clock.clone();

        let order = self
            .store
            .run(move |tx| {
                Box::pin(async move {
                    let now = clock.now();
                    let order = tx
                        .create_order(&NewOrder {
                            id: Uuid::new_v4(),
                            customer_id,
                            vehicle_id,
                            status: OrderStatus::INITIAL,
                            created_at: now,
                        })
                        .await?;
                    open_interval(tx, order.id, order.status, now).await?;
                    Ok::<_, FulfillmentError>(order)
                })
            })
            .await
            .inspect_err(|e| error!(%customer_id, %vehicle_id, "Failed to create order: {}", e))?;

        info!(order_id = %order.id, status = %order.status, "Order created");
        Ok(order)
    }

    pub async fn change_status(&self, order_id: Uuid, status: &str) -> Result<Order> {
        let transition = self.timeline.transition_status(order_id, status).await?;
        info!(%order_id, status = %transition.order.status, "Order status changed");
        Ok(transition.order)
    }

    pub async fn overview(&self, order_id: Uuid) -> Result<OrderOverview> {
        let (order, items) = self
            .store
            .run(move |tx| {
                Box::pin(async move {
                    let order = tx
                        .find_order(order_id)
                        .await?
                        .ok_or(FulfillmentError::OrderNotFound)?;
                    let items = tx.list_order_inputs(order_id).await?;
                    Ok::<_, FulfillmentError>((order, items))
                })
            })
            .await
            .inspect_err(|e| error!(%order_id, "Failed to load order overview: {}", e))?;

        let total = items
            .iter()
            .fold(BigDecimal::zero(), |sum, item| sum + &item.total_price);
        let timeline = self.timeline.compute_timeline(order_id).await;

        Ok(OrderOverview {
            order,
            items,
            total,
            timeline,
        })
    }
}
