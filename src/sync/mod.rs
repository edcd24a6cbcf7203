use chrono::{Duration, Utc};
use tracing::info;

use crate::dispatch;
use crate::error::AppError;
use crate::models::archive::FailedOrder;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub const CANCEL_REASON: &str = "cancelled by customer within the cancellation window";

/// The dual-write primitive: mutates the canonical order and propagates the
/// mapped status to its paired view as one unit. The paired view is resolved
/// before anything is written, so a missing view fails the whole transition
/// instead of leaving the records divergent.
///
/// Callers must hold the per-order lock.
pub(crate) fn apply_to_pair<F>(
    state: &AppState,
    order_id: &str,
    mutate: F,
) -> Result<Order, AppError>
where
    F: FnOnce(&mut Order) -> Result<(), AppError>,
{
    let mut order = state
        .orders
        .get_mut(order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let mut view = state.order_views.get_mut(&order.view_id).ok_or_else(|| {
        AppError::Consistency(format!("order {order_id} has no paired view"))
    })?;

    mutate(&mut order)?;
    order.updated_at = Utc::now();
    view.status = order.status.view_status();

    Ok(order.clone())
}

/// Writes `status` to the order and the mapped spelling to its view. The
/// requested status has already been parsed into the canonical vocabulary by
/// the caller; rejection additionally releases the courier, and terminal
/// statuses are refused here.
pub async fn update_status(
    state: &AppState,
    order_id: &str,
    status: OrderStatus,
) -> Result<Order, AppError> {
    // Terminal states archive the pair and belong to the dispatch manager;
    // reaching them through a plain status write would leave a terminal order
    // in the active store.
    if status.is_terminal() {
        return Err(AppError::Validation(format!(
            "{status:?} is set by delivery completion, failure, or cancellation"
        )));
    }

    let _guard = state.lock_order(order_id).await;

    let previous_courier = state
        .orders
        .get(order_id)
        .and_then(|entry| entry.assigned_courier);

    let order = apply_to_pair(state, order_id, |order| {
        order.status = status;
        // A rejected order no longer occupies its courier; clearing the
        // assignment here keeps the busy-iff-active-assignment invariant,
        // same as a courier-initiated reject.
        if status == OrderStatus::Rejected {
            order.assigned_courier = None;
        }
        Ok(())
    })?;

    if status == OrderStatus::Rejected {
        if let Some(courier_id) = previous_courier {
            dispatch::release_capacity(state, courier_id, order_id);
        }
    }

    info!(order_id = %order_id, status = ?status, "order status updated");
    Ok(order)
}

/// Cancellation is time-boxed: honored only while the order is still pending
/// and the configured window since creation has not elapsed. The deadline is
/// checked lazily at request time; no background timer exists.
pub async fn cancel_order(state: &AppState, order_id: &str) -> Result<FailedOrder, AppError> {
    let _guard = state.lock_order(order_id).await;

    let order = state
        .orders
        .get(order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.status != OrderStatus::Pending {
        return Err(AppError::Validation(format!(
            "only pending orders can be cancelled, order {order_id} is {:?}",
            order.status
        )));
    }

    let window = Duration::minutes(state.config.cancel_window_minutes);
    if Utc::now() - order.created_at > window {
        return Err(AppError::CancelWindowExpired(order_id.to_string()));
    }

    let archived = dispatch::archive_failed_locked(state, &order, CANCEL_REASON.to_string())?;

    info!(order_id = %order_id, "order cancelled");
    Ok(archived)
}
