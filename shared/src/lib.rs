use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, FulfillmentError};
pub use store::{
    InputRepository, OrderInputRepository, OrderRepository, Repositories, StatusHistoryRepository,
    Store,
};

pub type Result<T, E = FulfillmentError> = std::result::Result<T, E>;

/// Every status an order can be in, in lifecycle order.
///
/// `Canceled` is part of the set even though not every front end offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Received")]
    Received,
    #[serde(rename = "In diagnosis")]
    InDiagnosis,
    #[serde(rename = "Awaiting approval")]
    AwaitingApproval,
    #[serde(rename = "In progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Delivered")]
    Delivered,
    #[serde(rename = "Canceled")]
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Received,
        OrderStatus::InDiagnosis,
        OrderStatus::AwaitingApproval,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
    ];

    /// Status every new order starts in.
    pub const INITIAL: OrderStatus = OrderStatus::Received;

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "Received",
            OrderStatus::InDiagnosis => "In diagnosis",
            OrderStatus::AwaitingApproval => "Awaiting approval",
            OrderStatus::InProgress => "In progress",
            OrderStatus::Completed => "Completed",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = FulfillmentError;

    fn from_str(s: &str) -> Result<Self> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| FulfillmentError::InvalidStatus(s.to_string()))
    }
}

/// Whether an input is a stocked part or labor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    /// A part ("supplie") whose on-hand quantity is reserved and released.
    Stocked,
    /// A service; its quantity is not a stock signal.
    Unstocked,
}

impl InputKind {
    pub const SUPPLIE: &'static str = "supplie";
    pub const SERVICE: &'static str = "service";

    /// Maps the persisted `input_type`. Anything but "service" is stocked.
    pub fn from_input_type(input_type: &str) -> Self {
        if input_type == Self::SERVICE {
            InputKind::Unstocked
        } else {
            InputKind::Stocked
        }
    }

    pub fn as_input_type(&self) -> &'static str {
        match self {
            InputKind::Stocked => Self::SUPPLIE,
            InputKind::Unstocked => Self::SERVICE,
        }
    }

    pub fn is_stock_tracked(&self) -> bool {
        matches!(self, InputKind::Stocked)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// One row of an order's status history. Open while `ended_at` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInterval {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

impl StatusInterval {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewStatusInterval {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub started_at: DateTime<Utc>,
}

impl NewStatusInterval {
    pub fn open(order_id: Uuid, status: OrderStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            status,
            started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub kind: InputKind,
}

#[derive(Debug, Clone)]
pub struct NewInput {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub kind: InputKind,
}

/// A line item linking an order to an input with a price snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInput {
    pub id: Uuid,
    pub order_id: Uuid,
    pub input_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct NewOrderInput {
    pub id: Uuid,
    pub order_id: Uuid,
    pub input_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
}

impl NewOrderInput {
    pub fn priced(order_id: Uuid, input_id: Uuid, quantity: i32, unit_price: BigDecimal) -> Self {
        let total_price = line_total(quantity, &unit_price);
        Self {
            id: Uuid::new_v4(),
            order_id,
            input_id,
            quantity,
            unit_price,
            total_price,
        }
    }
}

/// `quantity × unit_price`, the only price arithmetic the engine performs.
pub fn line_total(quantity: i32, unit_price: &BigDecimal) -> BigDecimal {
    unit_price * &BigDecimal::from(quantity)
}
