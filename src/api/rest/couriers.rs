use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::hub::LocationUpdate;
use crate::models::courier::{Courier, CourierPosition, CourierStatus, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", post(create_courier).get(list_couriers))
        .route("/couriers/:id/status", patch(update_courier_status))
        .route("/couriers/:id/location", post(report_location))
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CourierStatus,
}

#[derive(Deserialize)]
pub struct ReportLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let courier = Courier::new(payload.name.trim().to_string());
    state.couriers.insert(courier.id, courier.clone());
    Ok(Json(courier))
}

async fn list_couriers(State(state): State<Arc<AppState>>) -> Json<Vec<Courier>> {
    let couriers = state
        .couriers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(couriers)
}

/// Manual status changes cover the off-shift states only; `busy` is owned by
/// the dispatch manager and cannot be set by hand.
async fn update_courier_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Courier>, AppError> {
    if payload.status == CourierStatus::Busy {
        return Err(AppError::Validation(
            "busy is managed by dispatch and cannot be set directly".to_string(),
        ));
    }

    let mut courier = state
        .couriers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

    if courier.status == CourierStatus::Busy && payload.status != CourierStatus::Offline {
        return Err(AppError::CapacityConflict(format!(
            "courier {id} has active deliveries"
        )));
    }

    courier.status = payload.status;
    courier.updated_at = Utc::now();

    Ok(Json(courier.clone()))
}

/// Ingests a periodic position report: updates the authoritative last-known
/// position, then fans the update out to the courier's channel and to the
/// channel of every order currently assigned to the courier. Fire-and-forget
/// from the courier's perspective.
async fn report_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportLocationRequest>,
) -> Result<Json<Courier>, AppError> {
    let point = GeoPoint {
        lat: payload.latitude,
        lng: payload.longitude,
    };
    let reported_at = Utc::now();

    let (courier, channels) = {
        let mut courier = state
            .couriers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

        courier.position = Some(CourierPosition {
            point,
            address: payload.address.clone(),
            reported_at,
        });
        courier.updated_at = reported_at;

        let mut channels: Vec<String> = courier.assigned_orders.iter().cloned().collect();
        channels.push(id.to_string());

        (courier.clone(), channels)
    };

    state.metrics.location_updates_total.inc();

    state.hub.publish(
        channels,
        LocationUpdate {
            courier_id: id,
            point,
            address: payload.address,
            reported_at,
        },
    );

    Ok(Json(courier))
}
