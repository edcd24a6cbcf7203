use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{LineItem, Order};

/// Immutable snapshot of a successfully delivered order. Written once by the
/// dispatch manager when the active pair is archived, never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedOrder {
    pub order_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub courier_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub delivery_fee: f64,
    pub total: f64,
    pub archived_at: DateTime<Utc>,
}

impl CompletedOrder {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            delivery_address: order.delivery_address.clone(),
            courier_id: order.assigned_courier,
            items: order.items.clone(),
            delivery_fee: order.delivery_fee,
            total: order.item_total() + order.delivery_fee,
            archived_at: Utc::now(),
        }
    }
}

/// Immutable snapshot of an order that ended without delivery: a failed
/// delivery attempt or a customer cancellation inside the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedOrder {
    pub order_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub courier_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub delivery_fee: f64,
    pub total: f64,
    pub reason: String,
    pub archived_at: DateTime<Utc>,
}

impl FailedOrder {
    pub fn from_order(order: &Order, reason: String) -> Self {
        Self {
            order_id: order.id.clone(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            delivery_address: order.delivery_address.clone(),
            courier_id: order.assigned_courier,
            items: order.items.clone(),
            delivery_fee: order.delivery_fee,
            total: order.item_total() + order.delivery_fee,
            reason,
            archived_at: Utc::now(),
        }
    }
}
