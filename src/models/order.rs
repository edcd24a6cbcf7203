use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

/// Dispatch-facing status vocabulary. The main line is
/// pending → preparing → ready → processing_delivery → out_for_delivery →
/// delivered; the remaining variants are side branches reachable from
/// active states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    ProcessingDelivery,
    Accepted,
    PickedUp,
    InTransit,
    OnTheWay,
    OutForDelivery,
    Delivered,
    Rejected,
    Failed,
    Cancelled,
}

/// Customer/channel-facing status vocabulary. Same lifecycle, separately
/// spelled (kebab-case on the wire, `processing` for the dispatch-side
/// `processing_delivery`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ViewStatus {
    Pending,
    Preparing,
    Ready,
    Processing,
    Accepted,
    PickedUp,
    InTransit,
    OnTheWay,
    OutForDelivery,
    Delivered,
    Rejected,
    Failed,
    Cancelled,
}

impl OrderStatus {
    /// Total mapping into the view vocabulary. Every canonical status has
    /// exactly one view spelling; there is no undefined combination.
    pub fn view_status(self) -> ViewStatus {
        match self {
            OrderStatus::Pending => ViewStatus::Pending,
            OrderStatus::Preparing => ViewStatus::Preparing,
            OrderStatus::Ready => ViewStatus::Ready,
            OrderStatus::ProcessingDelivery => ViewStatus::Processing,
            OrderStatus::Accepted => ViewStatus::Accepted,
            OrderStatus::PickedUp => ViewStatus::PickedUp,
            OrderStatus::InTransit => ViewStatus::InTransit,
            OrderStatus::OnTheWay => ViewStatus::OnTheWay,
            OrderStatus::OutForDelivery => ViewStatus::OutForDelivery,
            OrderStatus::Delivered => ViewStatus::Delivered,
            OrderStatus::Rejected => ViewStatus::Rejected,
            OrderStatus::Failed => ViewStatus::Failed,
            OrderStatus::Cancelled => ViewStatus::Cancelled,
        }
    }

    /// Terminal statuses archive the order; the active pair ceases to exist.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Whether an order in this status counts against courier capacity.
    pub fn occupies_courier(self) -> bool {
        !self.is_terminal() && self != OrderStatus::Rejected
    }
}

impl ViewStatus {
    pub fn canonical(self) -> OrderStatus {
        match self {
            ViewStatus::Pending => OrderStatus::Pending,
            ViewStatus::Preparing => OrderStatus::Preparing,
            ViewStatus::Ready => OrderStatus::Ready,
            ViewStatus::Processing => OrderStatus::ProcessingDelivery,
            ViewStatus::Accepted => OrderStatus::Accepted,
            ViewStatus::PickedUp => OrderStatus::PickedUp,
            ViewStatus::InTransit => OrderStatus::InTransit,
            ViewStatus::OnTheWay => OrderStatus::OnTheWay,
            ViewStatus::OutForDelivery => OrderStatus::OutForDelivery,
            ViewStatus::Delivered => OrderStatus::Delivered,
            ViewStatus::Rejected => OrderStatus::Rejected,
            ViewStatus::Failed => OrderStatus::Failed,
            ViewStatus::Cancelled => OrderStatus::Cancelled,
        }
    }
}

pub const ALL_STATUSES: [OrderStatus; 13] = [
    OrderStatus::Pending,
    OrderStatus::Preparing,
    OrderStatus::Ready,
    OrderStatus::ProcessingDelivery,
    OrderStatus::Accepted,
    OrderStatus::PickedUp,
    OrderStatus::InTransit,
    OrderStatus::OnTheWay,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
    OrderStatus::Rejected,
    OrderStatus::Failed,
    OrderStatus::Cancelled,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl LineItem {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// Canonical, dispatch-facing order record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Vec<LineItem>,
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_type: OrderType,
    pub delivery_address: String,
    pub delivery_point: GeoPoint,
    pub delivery_fee: f64,
    pub assigned_courier: Option<Uuid>,
    pub status: OrderStatus,
    /// Cross-reference to the paired customer-facing view.
    pub view_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn item_total(&self) -> f64 {
        self.items.iter().map(LineItem::subtotal).sum()
    }
}

/// Reduced customer/channel-facing mirror of an [`Order`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub id: Uuid,
    /// Cross-reference back to the canonical order.
    pub order_ref: String,
    pub items: Vec<LineItem>,
    pub delivery_address: String,
    pub delivery_fee: f64,
    pub status: ViewStatus,
    pub created_at: DateTime<Utc>,
}
