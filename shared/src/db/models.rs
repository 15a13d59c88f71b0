use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    FulfillmentError, Input, InputKind, NewInput, NewOrder, NewOrderInput, NewStatusInterval,
    Order, OrderInput, OrderStatus, StatusInterval,
};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::db::schema::orders)]
pub struct DbOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::db::schema::orders)]
pub struct NewDbOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::db::schema::order_status_history)]
pub struct DbStatusInterval {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::db::schema::order_status_history)]
pub struct NewDbStatusInterval {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::db::schema::inputs)]
pub struct DbInput {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub input_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::db::schema::inputs)]
pub struct NewDbInput {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub input_type: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::db::schema::order_inputs)]
pub struct DbOrderInput {
    pub id: Uuid,
    pub order_id: Uuid,
    pub input_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::db::schema::order_inputs)]
pub struct NewDbOrderInput {
    pub id: Uuid,
    pub order_id: Uuid,
    pub input_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
}

impl From<&NewOrder> for NewDbOrder {
    fn from(order: &NewOrder) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            vehicle_id: order.vehicle_id,
            status: order.status.to_string(),
            created_at: order.created_at,
            updated_at: order.created_at,
        }
    }
}

impl TryFrom<DbOrder> for Order {
    type Error = FulfillmentError;

    fn try_from(row: DbOrder) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            vehicle_id: row.vehicle_id,
            status: stored_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&NewStatusInterval> for NewDbStatusInterval {
    fn from(interval: &NewStatusInterval) -> Self {
        Self {
            id: interval.id,
            order_id: interval.order_id,
            status: interval.status.to_string(),
            started_at: interval.started_at,
        }
    }
}

impl TryFrom<DbStatusInterval> for StatusInterval {
    type Error = FulfillmentError;

    fn try_from(row: DbStatusInterval) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            status: stored_status(&row.status)?,
            started_at: row.started_at,
            ended_at: row.ended_at,
            duration_minutes: row.duration_minutes,
        })
    }
}

impl From<&NewInput> for NewDbInput {
    fn from(input: &NewInput) -> Self {
        Self {
            id: input.id,
            name: input.name.clone(),
            price: input.price.clone(),
            quantity: input.quantity,
            input_type: input.kind.as_input_type().to_string(),
        }
    }
}

impl From<DbInput> for Input {
    fn from(row: DbInput) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            quantity: row.quantity,
            kind: InputKind::from_input_type(&row.input_type),
        }
    }
}

impl From<&NewOrderInput> for NewDbOrderInput {
    fn from(line: &NewOrderInput) -> Self {
        Self {
            id: line.id,
            order_id: line.order_id,
            input_id: line.input_id,
            quantity: line.quantity,
            unit_price: line.unit_price.clone(),
            total_price: line.total_price.clone(),
        }
    }
}

impl From<DbOrderInput> for OrderInput {
    fn from(row: DbOrderInput) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            input_id: row.input_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_price: row.total_price,
        }
    }
}

/// A status string that made it into the database but is not in the enum
/// is a data problem, not a caller mistake.
fn stored_status(raw: &str) -> Result<OrderStatus, FulfillmentError> {
    raw.parse()
        .map_err(|_| FulfillmentError::storage(format!("unknown status {:?} stored", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_stored_status_is_a_storage_error() {
        let row = DbStatusInterval {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            status: "Lost".to_string(),
            started_at: Utc::now(),
            ended_at: None,
            duration_minutes: None,
        };

        let err = StatusInterval::try_from(row).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
    }

    #[test]
    fn test_input_row_maps_service_type() {
        let row = DbInput {
            id: Uuid::new_v4(),
            name: "Alignment".to_string(),
            price: BigDecimal::from(40),
            quantity: 0,
            input_type: "service".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(Input::from(row).kind, InputKind::Unstocked);
    }
}
