use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch;
use crate::error::AppError;
use crate::gateway::{self, NewOrder, OrderRecord};
use crate::geo;
use crate::models::archive::{CompletedOrder, FailedOrder};
use crate::models::order::{Order, OrderStatus, OrderView};
use crate::state::AppState;
use crate::sync;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_status))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/assign", post(assign_courier))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/reject", post(reject_order))
        .route("/orders/:id/transit", post(mark_in_transit))
        .route("/orders/:id/complete", post(complete_delivery))
        .route("/orders/:id/fail", post(fail_delivery))
        .route("/orders/:id/estimate", get(delivery_estimate))
        .route("/customers/:phone/orders", get(customer_orders))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    let order = gateway::create_order(&state, payload).await?;
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderRecord>, AppError> {
    let record = gateway::find_order_record(&state, &id)?;
    Ok(Json(record))
}

async fn customer_orders(
    State(state): State<Arc<AppState>>,
    Path(phone): Path<String>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    let views = gateway::orders_for_customer(&state, &phone)?;
    Ok(Json(views))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let status: OrderStatus =
        serde_json::from_value(serde_json::Value::String(payload.status.clone())).map_err(
            |_| AppError::Validation(format!("unknown order status: {}", payload.status)),
        )?;

    let order = sync::update_status(&state, &id, status).await?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FailedOrder>, AppError> {
    let archived = sync::cancel_order(&state, &id).await?;
    Ok(Json(archived))
}

#[derive(Deserialize)]
pub struct CourierOpRequest {
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct FailDeliveryRequest {
    pub courier_id: Uuid,
    pub reason: String,
}

async fn assign_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CourierOpRequest>,
) -> Result<Json<Order>, AppError> {
    let order = dispatch::assign(&state, &id, payload.courier_id).await?;
    Ok(Json(order))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CourierOpRequest>,
) -> Result<Json<Order>, AppError> {
    let order = dispatch::accept(&state, &id, payload.courier_id).await?;
    Ok(Json(order))
}

async fn reject_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CourierOpRequest>,
) -> Result<Json<Order>, AppError> {
    let order = dispatch::reject(&state, &id, payload.courier_id).await?;
    Ok(Json(order))
}

async fn mark_in_transit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CourierOpRequest>,
) -> Result<Json<Order>, AppError> {
    let order = dispatch::mark_in_transit(&state, &id, payload.courier_id).await?;
    Ok(Json(order))
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CourierOpRequest>,
) -> Result<Json<CompletedOrder>, AppError> {
    let snapshot = dispatch::complete(&state, &id, payload.courier_id).await?;
    Ok(Json(snapshot))
}

async fn fail_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<FailDeliveryRequest>,
) -> Result<Json<FailedOrder>, AppError> {
    let snapshot = dispatch::fail(&state, &id, payload.courier_id, &payload.reason).await?;
    Ok(Json(snapshot))
}

/// Non-authoritative delivery estimate derived from the courier's last-known
/// position. Consumers get the position age and decide for themselves how
/// much staleness they tolerate.
#[derive(Serialize)]
pub struct DeliveryEstimate {
    pub order_id: String,
    pub courier_id: Uuid,
    pub remaining_km: f64,
    pub estimated_minutes: f64,
    pub position_age_seconds: i64,
}

async fn delivery_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryEstimate>, AppError> {
    let order = state
        .orders
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    let courier_id = order
        .assigned_courier
        .ok_or_else(|| AppError::NotFound(format!("order {id} has no assigned courier")))?;

    let position = state
        .couriers
        .get(&courier_id)
        .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?
        .position
        .clone()
        .ok_or_else(|| {
            AppError::NotFound(format!("courier {courier_id} has not reported a position"))
        })?;

    let remaining_km = geo::haversine_km(&position.point, &order.delivery_point);
    let estimated_minutes = remaining_km / state.config.estimate_speed_kmh * 60.0;

    Ok(Json(DeliveryEstimate {
        order_id: order.id,
        courier_id,
        remaining_km,
        estimated_minutes,
        position_age_seconds: (Utc::now() - position.reported_at).num_seconds(),
    }))
}
