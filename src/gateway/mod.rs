use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::geo::geocode::resolve_delivery_location;
use crate::models::archive::{CompletedOrder, FailedOrder};
use crate::models::order::{
    LineItem, Order, OrderStatus, OrderType, OrderView, PaymentMethod, PaymentStatus,
};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Vec<LineItem>,
    pub address: Option<String>,
    pub payment_method: PaymentMethod,
    pub order_type: OrderType,
}

/// Result of the merged lookup across the active store and the two archives.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record_state", rename_all = "snake_case")]
pub enum OrderRecord {
    Active(Order),
    Completed(CompletedOrder),
    Failed(FailedOrder),
}

fn validate(request: &NewOrder) -> Result<(), AppError> {
    if request.customer_name.trim().is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }
    if request.customer_phone.trim().is_empty() {
        return Err(AppError::Validation("customer phone is required".to_string()));
    }
    if request.items.is_empty() {
        return Err(AppError::Validation("order needs at least one item".to_string()));
    }

    for item in &request.items {
        if item.name.trim().is_empty() {
            return Err(AppError::Validation("item name is required".to_string()));
        }
        if item.quantity < 1 {
            return Err(AppError::Validation(format!(
                "item {} must have quantity >= 1",
                item.name
            )));
        }
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(AppError::Validation(format!(
                "item {} must have a non-negative price",
                item.name
            )));
        }
    }

    Ok(())
}

/// Validates the request, resolves delivery eligibility, and creates the
/// Order/OrderView pair as one unit with the cross-reference populated both
/// ways. On an eligibility rejection no records are created.
pub async fn create_order(state: &AppState, request: NewOrder) -> Result<Order, AppError> {
    validate(&request)?;

    let (address, point) = resolve_delivery_location(
        state.geocoder.as_ref(),
        request.address.as_deref(),
        &state.config,
    )
    .await;

    let eligibility = geo::assess_eligibility(&state.config.origin, &point, &state.config)
        .inspect_err(|_| {
            state
                .metrics
                .orders_created_total
                .with_label_values(&["rejected"])
                .inc();
        })?;

    let now = Utc::now();
    let order_id = state.next_order_id();
    let view_id = Uuid::new_v4();
    let total: f64 = request.items.iter().map(LineItem::subtotal).sum();

    let view = OrderView {
        id: view_id,
        order_ref: order_id.clone(),
        items: request.items.clone(),
        delivery_address: address.clone(),
        delivery_fee: eligibility.fee,
        status: OrderStatus::Pending.view_status(),
        created_at: now,
    };

    let order = Order {
        id: order_id.clone(),
        customer_name: request.customer_name.trim().to_string(),
        customer_phone: request.customer_phone.trim().to_string(),
        items: request.items,
        total,
        payment_method: request.payment_method,
        payment_status: PaymentStatus::Unpaid,
        order_type: request.order_type,
        delivery_address: address,
        delivery_point: point,
        delivery_fee: eligibility.fee,
        assigned_courier: None,
        status: OrderStatus::Pending,
        view_id,
        created_at: now,
        updated_at: now,
    };

    // The pair goes in together; the id is fresh so no writer can observe a
    // half-created pair.
    state.order_views.insert(view_id, view);
    state.orders.insert(order_id.clone(), order.clone());

    state
        .metrics
        .orders_created_total
        .with_label_values(&["created"])
        .inc();
    state.metrics.active_orders.inc();

    info!(
        order_id = %order_id,
        distance_km = eligibility.distance_km,
        fee = eligibility.fee,
        "order created"
    );

    Ok(order)
}

/// Customer-facing views of a customer's active orders.
pub fn orders_for_customer(state: &AppState, phone: &str) -> Result<Vec<OrderView>, AppError> {
    let mut views = Vec::new();

    for entry in state.orders.iter() {
        let order = entry.value();
        if order.customer_phone != phone {
            continue;
        }

        let view = state
            .order_views
            .get(&order.view_id)
            .map(|v| v.value().clone())
            .ok_or_else(|| {
                AppError::Consistency(format!("order {} has no paired view", order.id))
            })?;
        views.push(view);
    }

    views.sort_by(|a, b| a.order_ref.cmp(&b.order_ref));
    Ok(views)
}

/// Merged lookup: active store first, then the completed archive, then the
/// failed archive.
pub fn find_order_record(state: &AppState, order_id: &str) -> Result<OrderRecord, AppError> {
    if let Some(order) = state.orders.get(order_id) {
        return Ok(OrderRecord::Active(order.value().clone()));
    }
    if let Some(done) = state.completed_orders.get(order_id) {
        return Ok(OrderRecord::Completed(done.value().clone()));
    }
    if let Some(failed) = state.failed_orders.get(order_id) {
        return Ok(OrderRecord::Failed(failed.value().clone()));
    }

    Err(AppError::NotFound(format!("order {order_id} not found")))
}
