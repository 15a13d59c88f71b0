//! Storage ports consumed by the fulfillment engines.
//!
//! Every compound operation runs through [`Store::run`], which hands the
//! closure a [`Repositories`] handle scoped to one atomic unit. Adapters
//! commit the unit when the closure succeeds and discard it otherwise.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    Input, NewInput, NewOrder, NewOrderInput, NewStatusInterval, Order, OrderInput, OrderStatus,
    Result, StatusInterval,
};

#[async_trait]
pub trait OrderRepository {
    async fn create_order(&mut self, order: &NewOrder) -> Result<Order>;

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>>;

    /// Like `find_order`, but holds the row until the unit ends.
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>>;

    async fn update_order_status(
        &mut self,
        id: Uuid,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order>;
}

#[async_trait]
pub trait StatusHistoryRepository {
    async fn create_interval(&mut self, interval: &NewStatusInterval) -> Result<StatusInterval>;

    /// The single row with no `ended_at`, if any.
    async fn find_open_interval(&mut self, order_id: Uuid) -> Result<Option<StatusInterval>>;

    async fn close_interval(
        &mut self,
        id: Uuid,
        ended_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<StatusInterval>;

    /// All rows of an order, oldest `started_at` first.
    async fn list_history(&mut self, order_id: Uuid) -> Result<Vec<StatusInterval>>;
}

#[async_trait]
pub trait InputRepository {
    async fn create_input(&mut self, input: &NewInput) -> Result<Input>;

    async fn find_input(&mut self, id: Uuid) -> Result<Option<Input>>;

    /// Reads the input and holds its row until the unit ends.
    async fn lock_input(&mut self, id: Uuid) -> Result<Option<Input>>;

    async fn set_input_quantity(&mut self, id: Uuid, quantity: i32) -> Result<Input>;
}

#[async_trait]
pub trait OrderInputRepository {
    async fn create_order_input(&mut self, line: &NewOrderInput) -> Result<OrderInput>;

    /// Reads the line item for the pair and holds its row until the unit ends.
    async fn lock_order_input(&mut self, order_id: Uuid, input_id: Uuid)
        -> Result<Option<OrderInput>>;

    async fn update_order_input(
        &mut self,
        id: Uuid,
        quantity: i32,
        total_price: &BigDecimal,
    ) -> Result<OrderInput>;

    async fn delete_order_input(&mut self, id: Uuid) -> Result<()>;

    async fn list_order_inputs(&mut self, order_id: Uuid) -> Result<Vec<OrderInput>>;
}

/// All four repositories over one atomic unit.
pub trait Repositories:
    OrderRepository + StatusHistoryRepository + InputRepository + OrderInputRepository + Send
{
}

impl<T> Repositories for T where
    T: OrderRepository + StatusHistoryRepository + InputRepository + OrderInputRepository + Send
{
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Runs `op` as one atomic unit. Nothing `op` wrote survives an `Err`.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn Repositories) -> BoxFuture<'c, Result<T>> + Send + 'static;
}
