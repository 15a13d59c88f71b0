use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use futures::future::BoxFuture;
use uuid::Uuid;

use super::models::*;
use super::schema::*;
use super::DbPool;
use crate::store::{
    InputRepository, OrderInputRepository, OrderRepository, Repositories, StatusHistoryRepository,
    Store,
};
use crate::{
    FulfillmentError, Input, NewInput, NewOrder, NewOrderInput, NewStatusInterval, Order,
    OrderInput, OrderStatus, Result, StatusInterval,
};

/// Postgres-backed [`Store`]. Each unit is one database transaction; rows
/// that are read to be modified are taken with `FOR UPDATE`.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn Repositories) -> BoxFuture<'c, Result<T>> + Send + 'static,
    {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<T, FulfillmentError, _>(|conn| {
            Box::pin(async move {
                let mut repos = PgRepositories { conn };
                op(&mut repos).await
            })
        })
        .await
    }
}

struct PgRepositories<'c> {
    conn: &'c mut AsyncPgConnection,
}

impl PgRepositories<'_> {
    fn conn(&mut self) -> &mut AsyncPgConnection {
        self.conn
    }
}

#[async_trait]
impl OrderRepository for PgRepositories<'_> {
    async fn create_order(&mut self, order: &NewOrder) -> Result<Order> {
        let row = diesel::insert_into(orders::table)
            .values(NewDbOrder::from(order))
            .get_result::<DbOrder>(self.conn())
            .await?;
        row.try_into()
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        orders::table
            .find(id)
            .first::<DbOrder>(self.conn())
            .await
            .optional()?
            .map(Order::try_from)
            .transpose()
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        orders::table
            .find(id)
            .for_update()
            .first::<DbOrder>(self.conn())
            .await
            .optional()?
            .map(Order::try_from)
            .transpose()
    }

    async fn update_order_status(
        &mut self,
        id: Uuid,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order> {
        let row = diesel::update(orders::table.find(id))
            .set((orders::status.eq(status.as_str()), orders::updated_at.eq(at)))
            .get_result::<DbOrder>(self.conn())
            .await?;
        row.try_into()
    }
}

#[async_trait]
impl StatusHistoryRepository for PgRepositories<'_> {
    async fn create_interval(&mut self, interval: &NewStatusInterval) -> Result<StatusInterval> {
        let row = diesel::insert_into(order_status_history::table)
            .values(NewDbStatusInterval::from(interval))
            .get_result::<DbStatusInterval>(self.conn())
            .await?;
        row.try_into()
    }

    async fn find_open_interval(&mut self, order_id: Uuid) -> Result<Option<StatusInterval>> {
        order_status_history::table
            .filter(order_status_history::order_id.eq(order_id))
            .filter(order_status_history::ended_at.is_null())
            .for_update()
            .first::<DbStatusInterval>(self.conn())
            .await
            .optional()?
            .map(StatusInterval::try_from)
            .transpose()
    }

    async fn close_interval(
        &mut self,
        id: Uuid,
        ended_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<StatusInterval> {
        let row = diesel::update(
            order_status_history::table
                .filter(order_status_history::id.eq(id))
                .filter(order_status_history::ended_at.is_null()),
        )
        .set((
            order_status_history::ended_at.eq(Some(ended_at)),
            order_status_history::duration_minutes.eq(Some(duration_minutes)),
        ))
        .get_result::<DbStatusInterval>(self.conn())
        .await?;
        row.try_into()
    }

    async fn list_history(&mut self, order_id: Uuid) -> Result<Vec<StatusInterval>> {
        order_status_history::table
            .filter(order_status_history::order_id.eq(order_id))
            .order((
                order_status_history::started_at.asc(),
                order_status_history::id.asc(),
            ))
            .load::<DbStatusInterval>(self.conn())
            .await?
            .into_iter()
            .map(StatusInterval::try_from)
            .collect()
    }
}

#[async_trait]
impl InputRepository for PgRepositories<'_> {
    async fn create_input(&mut self, input: &NewInput) -> Result<Input> {
        let row = diesel::insert_into(inputs::table)
            .values(NewDbInput::from(input))
            .get_result::<DbInput>(self.conn())
            .await?;
        Ok(row.into())
    }

    async fn find_input(&mut self, id: Uuid) -> Result<Option<Input>> {
        let row = inputs::table
            .find(id)
            .first::<DbInput>(self.conn())
            .await
            .optional()?;
        Ok(row.map(Input::from))
    }

    async fn lock_input(&mut self, id: Uuid) -> Result<Option<Input>> {
        let row = inputs::table
            .find(id)
            .for_update()
            .first::<DbInput>(self.conn())
            .await
            .optional()?;
        Ok(row.map(Input::from))
    }

    async fn set_input_quantity(&mut self, id: Uuid, quantity: i32) -> Result<Input> {
        let row = diesel::update(inputs::table.find(id))
            .set((
                inputs::quantity.eq(quantity),
                inputs::updated_at.eq(Utc::now()),
            ))
            .get_result::<DbInput>(self.conn())
            .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl OrderInputRepository for PgRepositories<'_> {
    async fn create_order_input(&mut self, line: &NewOrderInput) -> Result<OrderInput> {
        let row = diesel::insert_into(order_inputs::table)
            .values(NewDbOrderInput::from(line))
            .get_result::<DbOrderInput>(self.conn())
            .await?;
        Ok(row.into())
    }

    async fn lock_order_input(
        &mut self,
        order_id: Uuid,
        input_id: Uuid,
    ) -> Result<Option<OrderInput>> {
        let row = order_inputs::table
            .filter(order_inputs::order_id.eq(order_id))
            .filter(order_inputs::input_id.eq(input_id))
            .for_update()
            .first::<DbOrderInput>(self.conn())
            .await
            .optional()?;
        Ok(row.map(OrderInput::from))
    }

    async fn update_order_input(
        &mut self,
        id: Uuid,
        quantity: i32,
        total_price: &BigDecimal,
    ) -> Result<OrderInput> {
        let row = diesel::update(order_inputs::table.find(id))
            .set((
                order_inputs::quantity.eq(quantity),
                order_inputs::total_price.eq(total_price.clone()),
                order_inputs::updated_at.eq(Utc::now()),
            ))
            .get_result::<DbOrderInput>(self.conn())
            .await?;
        Ok(row.into())
    }

    async fn delete_order_input(&mut self, id: Uuid) -> Result<()> {
        let deleted = diesel::delete(order_inputs::table.find(id))
            .execute(self.conn())
            .await?;
        if deleted == 0 {
            return Err(FulfillmentError::storage(format!(
                "order input {} vanished before delete",
                id
            )));
        }
        Ok(())
    }

    async fn list_order_inputs(&mut self, order_id: Uuid) -> Result<Vec<OrderInput>> {
        let rows = order_inputs::table
            .filter(order_inputs::order_id.eq(order_id))
            .order(order_inputs::created_at.asc())
            .load::<DbOrderInput>(self.conn())
            .await?;
        Ok(rows.into_iter().map(OrderInput::from).collect())
    }
}
