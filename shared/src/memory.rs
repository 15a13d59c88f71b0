//! In-memory [`Store`] used by tests and local tooling.
//!
//! Units are serialized by a single mutex. Each unit works on a copy of the
//! state which replaces the shared state only when the unit succeeds.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{
    InputRepository, OrderInputRepository, OrderRepository, Repositories, StatusHistoryRepository,
    Store,
};
use crate::{
    FulfillmentError, Input, NewInput, NewOrder, NewOrderInput, NewStatusInterval, Order,
    OrderInput, OrderStatus, Result, StatusInterval,
};

/// Repository calls that can be made to fail with a storage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateOrder,
    UpdateOrderStatus,
    CreateInterval,
    CloseInterval,
    ListHistory,
    SetInputQuantity,
    CreateOrderInput,
    UpdateOrderInput,
    DeleteOrderInput,
}

#[derive(Debug, Clone, Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    history: Vec<StatusInterval>,
    inputs: HashMap<Uuid, Input>,
    order_inputs: HashMap<Uuid, OrderInput>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    failures: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_on(&self, point: FailPoint) {
        self.failures.lock().await.insert(point);
    }

    pub async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    pub async fn order(&self, id: Uuid) -> Option<Order> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    pub async fn input(&self, id: Uuid) -> Option<Input> {
        self.state.lock().await.inputs.get(&id).cloned()
    }

    pub async fn history(&self, order_id: Uuid) -> Vec<StatusInterval> {
        let state = self.state.lock().await;
        sorted_history(&state.history, order_id)
    }

    pub async fn order_inputs(&self, order_id: Uuid) -> Vec<OrderInput> {
        let state = self.state.lock().await;
        state
            .order_inputs
            .values()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Seeds an order without any status history.
    pub async fn insert_order(&self, order: Order) {
        self.state.lock().await.orders.insert(order.id, order);
    }

    pub async fn insert_input(&self, input: Input) {
        self.state.lock().await.inputs.insert(input.id, input);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn Repositories) -> BoxFuture<'c, Result<T>> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        let failures = self.failures.lock().await.clone();

        let mut tx = MemoryRepositories {
            state: state.clone(),
            failures,
        };
        let result = op(&mut tx).await;

        if result.is_ok() {
            *state = tx.state;
        }
        result
    }
}

struct MemoryRepositories {
    state: State,
    failures: HashSet<FailPoint>,
}

impl MemoryRepositories {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.failures.contains(&point) {
            return Err(FulfillmentError::storage(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

fn sorted_history(history: &[StatusInterval], order_id: Uuid) -> Vec<StatusInterval> {
    let mut rows: Vec<StatusInterval> = history
        .iter()
        .filter(|row| row.order_id == order_id)
        .cloned()
        .collect();
    rows.sort_by_key(|row| row.started_at);
    rows
}

fn missing(what: &str, id: Uuid) -> FulfillmentError {
    FulfillmentError::storage(format!("{} {} does not exist", what, id))
}

#[async_trait]
impl OrderRepository for MemoryRepositories {
    async fn create_order(&mut self, order: &NewOrder) -> Result<Order> {
        self.check(FailPoint::CreateOrder)?;
        if self.state.orders.contains_key(&order.id) {
            return Err(FulfillmentError::storage(format!("order {} already exists", order.id)));
        }
        let created = Order {
            id: order.id,
            customer_id: order.customer_id,
            vehicle_id: order.vehicle_id,
            status: order.status,
            created_at: order.created_at,
            updated_at: order.created_at,
        };
        self.state.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        self.find_order(id).await
    }

    async fn update_order_status(
        &mut self,
        id: Uuid,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order> {
        self.check(FailPoint::UpdateOrderStatus)?;
        let order = self.state.orders.get_mut(&id).ok_or_else(|| missing("order", id))?;
        order.status = status;
        order.updated_at = at;
        Ok(order.clone())
    }
}

#[async_trait]
impl StatusHistoryRepository for MemoryRepositories {
    async fn create_interval(&mut self, interval: &NewStatusInterval) -> Result<StatusInterval> {
        self.check(FailPoint::CreateInterval)?;
        let already_open = self
            .state
            .history
            .iter()
            .any(|row| row.order_id == interval.order_id && row.is_open());
        if already_open {
            return Err(FulfillmentError::storage(format!(
                "order {} already has an open status interval",
                interval.order_id
            )));
        }
        let created = StatusInterval {
            id: interval.id,
            order_id: interval.order_id,
            status: interval.status,
            started_at: interval.started_at,
            ended_at: None,
            duration_minutes: None,
        };
        self.state.history.push(created.clone());
        Ok(created)
    }

    async fn find_open_interval(&mut self, order_id: Uuid) -> Result<Option<StatusInterval>> {
        Ok(self
            .state
            .history
            .iter()
            .find(|row| row.order_id == order_id && row.is_open())
            .cloned())
    }

    async fn close_interval(
        &mut self,
        id: Uuid,
        ended_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<StatusInterval> {
        self.check(FailPoint::CloseInterval)?;
        let row = self
            .state
            .history
            .iter_mut()
            .find(|row| row.id == id && row.is_open())
            .ok_or_else(|| missing("open status interval", id))?;
        row.ended_at = Some(ended_at);
        row.duration_minutes = Some(duration_minutes);
        Ok(row.clone())
    }

    async fn list_history(&mut self, order_id: Uuid) -> Result<Vec<StatusInterval>> {
        self.check(FailPoint::ListHistory)?;
        Ok(sorted_history(&self.state.history, order_id))
    }
}

#[async_trait]
impl InputRepository for MemoryRepositories {
    async fn create_input(&mut self, input: &NewInput) -> Result<Input> {
        let created = Input {
            id: input.id,
            name: input.name.clone(),
            price: input.price.clone(),
            quantity: input.quantity,
            kind: input.kind,
        };
        self.state.inputs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_input(&mut self, id: Uuid) -> Result<Option<Input>> {
        Ok(self.state.inputs.get(&id).cloned())
    }

    async fn lock_input(&mut self, id: Uuid) -> Result<Option<Input>> {
        self.find_input(id).await
    }

    async fn set_input_quantity(&mut self, id: Uuid, quantity: i32) -> Result<Input> {
        self.check(FailPoint::SetInputQuantity)?;
        let input = self.state.inputs.get_mut(&id).ok_or_else(|| missing("input", id))?;
        if input.kind.is_stock_tracked() && quantity < 0 {
            return Err(FulfillmentError::storage(format!(
                "input {} quantity would become negative",
                id
            )));
        }
        input.quantity = quantity;
        Ok(input.clone())
    }
}

#[async_trait]
impl OrderInputRepository for MemoryRepositories {
    async fn create_order_input(&mut self, line: &NewOrderInput) -> Result<OrderInput> {
        self.check(FailPoint::CreateOrderInput)?;
        let duplicate = self
            .state
            .order_inputs
            .values()
            .any(|row| row.order_id == line.order_id && row.input_id == line.input_id);
        if duplicate {
            return Err(FulfillmentError::storage(format!(
                "order {} already has a line item for input {}",
                line.order_id, line.input_id
            )));
        }
        let created = OrderInput {
            id: line.id,
            order_id: line.order_id,
            input_id: line.input_id,
            quantity: line.quantity,
            unit_price: line.unit_price.clone(),
            total_price: line.total_price.clone(),
        };
        self.state.order_inputs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn lock_order_input(
        &mut self,
        order_id: Uuid,
        input_id: Uuid,
    ) -> Result<Option<OrderInput>> {
        Ok(self
            .state
            .order_inputs
            .values()
            .find(|row| row.order_id == order_id && row.input_id == input_id)
            .cloned())
    }

    async fn update_order_input(
        &mut self,
        id: Uuid,
        quantity: i32,
        total_price: &BigDecimal,
    ) -> Result<OrderInput> {
        self.check(FailPoint::UpdateOrderInput)?;
        let row = self
            .state
            .order_inputs
            .get_mut(&id)
            .ok_or_else(|| missing("order input", id))?;
        row.quantity = quantity;
        row.total_price = total_price.clone();
        Ok(row.clone())
    }

    async fn delete_order_input(&mut self, id: Uuid) -> Result<()> {
        self.check(FailPoint::DeleteOrderInput)?;
        self.state
            .order_inputs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("order input", id))
    }

    async fn list_order_inputs(&mut self, order_id: Uuid) -> Result<Vec<OrderInput>> {
        Ok(self
            .state
            .order_inputs
            .values()
            .filter(|row| row.order_id == order_id)
            .cloned()
            .collect())
    }
}
