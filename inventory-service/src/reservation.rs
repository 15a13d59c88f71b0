use bigdecimal::BigDecimal;
use num_traits::Zero;
use shared::{
    line_total, FulfillmentError, Input, InputRepository, NewOrderInput, OrderInput,
    OrderInputRepository, OrderRepository, Repositories, Result, Store,
};
use tracing::{error, info};
use uuid::Uuid;

/// Attaches inputs to orders and keeps catalog stock in step with the
/// attached quantities. Every public operation is one atomic unit.
#[derive(Clone)]
pub struct InventoryReservation<S> {
    store: S,
}

impl<S: Store> InventoryReservation<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Attaches `quantity` of an input to an order, aggregating into an
    /// existing line item at its original unit price.
    pub async fn add_input(&self, order_id: Uuid, input_id: Uuid, quantity: i32) -> Result<OrderInput> {
        self.store
            .run(move |tx| Box::pin(async move { add_input(tx, order_id, input_id, quantity).await }))
            .await
            .inspect_err(|e| {
                error!(%order_id, %input_id, quantity, "Failed to add input to order: {}", e)
            })
    }

    /// Detaches `quantity` of an input from an order. Returns `None` once the
    /// line item reached zero and was deleted.
    pub async fn remove_input(
        &self,
        order_id: Uuid,
        input_id: Uuid,
        quantity: i32,
    ) -> Result<Option<OrderInput>> {
        self.store
            .run(move |tx| {
                Box::pin(async move { remove_input(tx, order_id, input_id, quantity).await })
            })
            .await
            .inspect_err(|e| {
                error!(%order_id, %input_id, quantity, "Failed to remove input from order: {}", e)
            })
    }

    pub async fn increase_quantity(&self, input_id: Uuid, amount: i32) -> Result<Input> {
        self.store
            .run(move |tx| Box::pin(async move { increase_stock(tx, input_id, amount).await }))
            .await
            .inspect_err(|e| error!(%input_id, amount, "Failed to increase stock: {}", e))
    }

    pub async fn decrease_quantity(&self, input_id: Uuid, amount: i32) -> Result<Input> {
        self.store
            .run(move |tx| Box::pin(async move { decrease_stock(tx, input_id, amount).await }))
            .await
            .inspect_err(|e| error!(%input_id, amount, "Failed to decrease stock: {}", e))
    }
}

async fn add_input(
    tx: &mut dyn Repositories,
    order_id: Uuid,
    input_id: Uuid,
    quantity: i32,
) -> Result<OrderInput> {
    if quantity <= 0 {
        return Err(FulfillmentError::InvalidQuantity);
    }
    tx.find_order(order_id)
        .await?
        .ok_or(FulfillmentError::OrderNotFound)?;
    let input = tx
        .lock_input(input_id)
        .await?
        .ok_or(FulfillmentError::InputNotFound)?;

    if input.price <= BigDecimal::zero() {
        return Err(FulfillmentError::InvalidPrice);
    }
    let stocked = input.kind.is_stock_tracked();
    if stocked && input.quantity < quantity {
        return Err(FulfillmentError::InsufficientInputQuantity);
    }

    match tx.lock_order_input(order_id, input_id).await? {
        Some(existing) => {
            let new_quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or(FulfillmentError::InvalidQuantity)?;
            if stocked {
                decrease_stock(tx, input_id, quantity).await?;
            }
            let total = line_total(new_quantity, &existing.unit_price);
            let line = tx.update_order_input(existing.id, new_quantity, &total).await?;
            info!(
                %order_id,
                %input_id,
                added = quantity,
                quantity = line.quantity,
                "Aggregated input into existing line item"
            );
            Ok(line)
        }
        None => {
            if stocked {
                decrease_stock(tx, input_id, quantity).await?;
            }
            let line = tx
                .create_order_input(&NewOrderInput::priced(
                    order_id,
                    input_id,
                    quantity,
                    input.price.clone(),
                ))
                .await?;
            info!(
                %order_id,
                %input_id,
                quantity,
                unit_price = %line.unit_price,
                "Created line item"
            );
            Ok(line)
        }
    }
}

async fn remove_input(
    tx: &mut dyn Repositories,
    order_id: Uuid,
    input_id: Uuid,
    quantity: i32,
) -> Result<Option<OrderInput>> {
    tx.find_order(order_id)
        .await?
        .ok_or(FulfillmentError::OrderNotFound)?;
    let input = tx
        .lock_input(input_id)
        .await?
        .ok_or(FulfillmentError::InputNotFound)?;
    if quantity <= 0 {
        return Err(FulfillmentError::InvalidRemoveQuantity);
    }

    let existing = tx
        .lock_order_input(order_id, input_id)
        .await?
        .ok_or(FulfillmentError::OrderInputNotFound)?;
    if existing.quantity <= 0 {
        return Err(FulfillmentError::InvalidOrderInputQuantity);
    }
    if existing.quantity < quantity {
        return Err(FulfillmentError::InsufficientOrderInputQuantity);
    }

    if input.kind.is_stock_tracked() {
        increase_stock(tx, input_id, quantity).await?;
    }

    let new_quantity = existing.quantity - quantity;
    if new_quantity == 0 {
        tx.delete_order_input(existing.id).await?;
        info!(%order_id, %input_id, "Removed line item");
        return Ok(None);
    }

    let total = line_total(new_quantity, &existing.unit_price);
    let line = tx.update_order_input(existing.id, new_quantity, &total).await?;
    info!(
        %order_id,
        %input_id,
        removed = quantity,
        quantity = line.quantity,
        "Reduced line item"
    );
    Ok(Some(line))
}

async fn decrease_stock(tx: &mut dyn Repositories, input_id: Uuid, amount: i32) -> Result<Input> {
    if amount <= 0 {
        return Err(FulfillmentError::InvalidQuantity);
    }
    let input = tx
        .lock_input(input_id)
        .await?
        .ok_or(FulfillmentError::InputNotFound)?;
    if input.quantity < amount {
        return Err(FulfillmentError::InsufficientQuantity);
    }

    let updated = tx.set_input_quantity(input_id, input.quantity - amount).await?;
    info!(%input_id, amount, stock = updated.quantity, "Decreased stock");
    Ok(updated)
}

async fn increase_stock(tx: &mut dyn Repositories, input_id: Uuid, amount: i32) -> Result<Input> {
    if amount <= 0 {
        return Err(FulfillmentError::InvalidQuantity);
    }
    let input = tx
        .lock_input(input_id)
        .await?
        .ok_or(FulfillmentError::InputNotFound)?;
    let quantity = input
        .quantity
        .checked_add(amount)
        .ok_or(FulfillmentError::InvalidQuantity)?;

    let updated = tx.set_input_quantity(input_id, quantity).await?;
    info!(%input_id, amount, stock = updated.quantity, "Increased stock");
    Ok(updated)
}
