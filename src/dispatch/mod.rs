use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::archive::{CompletedOrder, FailedOrder};
use crate::models::courier::CourierStatus;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;
use crate::sync::apply_to_pair;

const MIN_FAILURE_REASON_CHARS: usize = 10;

/// Statuses a delivery can fail from. `in_transit` is included alongside the
/// courier-reported spellings since `MarkInTransit` is the only route into
/// transit.
const FAILABLE: [OrderStatus; 4] = [
    OrderStatus::Accepted,
    OrderStatus::PickedUp,
    OrderStatus::OnTheWay,
    OrderStatus::InTransit,
];

fn read_order(state: &AppState, order_id: &str) -> Result<Order, AppError> {
    state
        .orders
        .get(order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
}

fn require_assigned_to(order: &Order, courier_id: Uuid) -> Result<(), AppError> {
    if order.assigned_courier != Some(courier_id) {
        return Err(AppError::CapacityConflict(format!(
            "order {} is not assigned to courier {courier_id}",
            order.id
        )));
    }
    Ok(())
}

/// Assigns an order to a courier and reserves the courier's capacity in the
/// same step: the status flip available→busy is a compare-and-set on the
/// courier entry, so two concurrent assignments cannot both claim the same
/// courier. Re-assigning the same order to the same courier is idempotent.
pub async fn assign(state: &AppState, order_id: &str, courier_id: Uuid) -> Result<Order, AppError> {
    let _guard = state.lock_order(order_id).await;

    let order = read_order(state, order_id)?;
    if let Some(current) = order.assigned_courier {
        if current != courier_id {
            return Err(AppError::CapacityConflict(format!(
                "order {order_id} is already assigned to courier {current}"
            )));
        }
        // Already assigned to this courier: a repeat is a no-op, not a
        // lifecycle reset back to processing_delivery.
        return Ok(order);
    }

    // Surface a broken pair before touching courier capacity, so a failed
    // transition leaves the courier untouched.
    if !state.order_views.contains_key(&order.view_id) {
        return Err(AppError::Consistency(format!(
            "order {order_id} has no paired view"
        )));
    }

    {
        let mut courier = state.couriers.get_mut(&courier_id).ok_or_else(|| {
            AppError::NotFound(format!("courier {courier_id} not found"))
        })?;

        if !courier.assigned_orders.contains(order_id) {
            if courier.status != CourierStatus::Available {
                return Err(AppError::CapacityConflict(format!(
                    "courier {courier_id} is {:?}",
                    courier.status
                )));
            }
            courier.status = CourierStatus::Busy;
            courier.assigned_orders.insert(order_id.to_string());
            courier.updated_at = Utc::now();
        }
    }

    let order = apply_to_pair(state, order_id, |order| {
        order.assigned_courier = Some(courier_id);
        order.status = OrderStatus::ProcessingDelivery;
        Ok(())
    })?;

    info!(order_id = %order_id, courier_id = %courier_id, "courier assigned");
    Ok(order)
}

/// The courier takes the job. Capacity was already reserved at assignment;
/// this transition only moves the order forward.
pub async fn accept(state: &AppState, order_id: &str, courier_id: Uuid) -> Result<Order, AppError> {
    let _guard = state.lock_order(order_id).await;

    let order = read_order(state, order_id)?;
    require_assigned_to(&order, courier_id)?;

    let order = apply_to_pair(state, order_id, |order| {
        order.status = OrderStatus::Accepted;
        Ok(())
    })?;

    info!(order_id = %order_id, courier_id = %courier_id, "order accepted");
    Ok(order)
}

/// The courier turns the job down. The order goes back to the pool
/// unassigned, and the courier's capacity is released when no other active
/// assignment remains.
pub async fn reject(state: &AppState, order_id: &str, courier_id: Uuid) -> Result<Order, AppError> {
    let _guard = state.lock_order(order_id).await;

    let order = read_order(state, order_id)?;
    require_assigned_to(&order, courier_id)?;

    let order = apply_to_pair(state, order_id, |order| {
        order.status = OrderStatus::Rejected;
        order.assigned_courier = None;
        Ok(())
    })?;

    release_capacity(state, courier_id, order_id);

    info!(order_id = %order_id, courier_id = %courier_id, "order rejected by courier");
    Ok(order)
}

pub async fn mark_in_transit(
    state: &AppState,
    order_id: &str,
    courier_id: Uuid,
) -> Result<Order, AppError> {
    let _guard = state.lock_order(order_id).await;

    let order = read_order(state, order_id)?;
    require_assigned_to(&order, courier_id)?;

    if !matches!(
        order.status,
        OrderStatus::Accepted | OrderStatus::PickedUp | OrderStatus::OnTheWay
    ) {
        return Err(AppError::Validation(format!(
            "order {order_id} cannot move to in_transit from {:?}",
            order.status
        )));
    }

    let order = apply_to_pair(state, order_id, |order| {
        order.status = OrderStatus::InTransit;
        Ok(())
    })?;

    info!(order_id = %order_id, courier_id = %courier_id, "order in transit");
    Ok(order)
}

/// Terminal success path: snapshot into the completed archive, credit the
/// courier, release capacity, and delete the active pair. The archive write
/// and the pair delete happen under the per-order lock as one unit, so a
/// repeated completion finds nothing and gets a 404 instead of producing a
/// duplicate archive record.
pub async fn complete(
    state: &AppState,
    order_id: &str,
    courier_id: Uuid,
) -> Result<CompletedOrder, AppError> {
    let _guard = state.lock_order(order_id).await;

    let order = read_order(state, order_id)?;
    require_assigned_to(&order, courier_id)?;

    let snapshot = CompletedOrder::from_order(&order);
    state
        .completed_orders
        .insert(snapshot.order_id.clone(), snapshot.clone());

    if let Some(mut courier) = state.couriers.get_mut(&courier_id) {
        courier.completed_count += 1;
        courier.earnings += order.delivery_fee;
        courier.updated_at = Utc::now();
    }

    remove_active_pair(state, &order);
    release_capacity(state, courier_id, order_id);

    state
        .metrics
        .deliveries_total
        .with_label_values(&["completed"])
        .inc();

    info!(
        order_id = %order_id,
        courier_id = %courier_id,
        total = snapshot.total,
        "delivery completed"
    );
    Ok(snapshot)
}

/// Terminal failure path. The reason is mandatory context for the archive
/// record and must carry at least ten characters.
pub async fn fail(
    state: &AppState,
    order_id: &str,
    courier_id: Uuid,
    reason: &str,
) -> Result<FailedOrder, AppError> {
    let reason = reason.trim();
    if reason.chars().count() < MIN_FAILURE_REASON_CHARS {
        return Err(AppError::Validation(format!(
            "failure reason must be at least {MIN_FAILURE_REASON_CHARS} characters"
        )));
    }

    let _guard = state.lock_order(order_id).await;

    let order = read_order(state, order_id)?;
    require_assigned_to(&order, courier_id)?;

    if !FAILABLE.contains(&order.status) {
        return Err(AppError::Validation(format!(
            "order {order_id} cannot fail from {:?}",
            order.status
        )));
    }

    if let Some(mut courier) = state.couriers.get_mut(&courier_id) {
        courier.failed_count += 1;
        courier.updated_at = Utc::now();
    }

    let snapshot = archive_failed_locked(state, &order, reason.to_string())?;
    release_capacity(state, courier_id, order_id);

    state
        .metrics
        .deliveries_total
        .with_label_values(&["failed"])
        .inc();

    info!(order_id = %order_id, courier_id = %courier_id, reason = %reason, "delivery failed");
    Ok(snapshot)
}

/// Snapshots the order into the failed archive and deletes the active pair.
/// Caller must hold the per-order lock. Also used by customer cancellation.
pub(crate) fn archive_failed_locked(
    state: &AppState,
    order: &Order,
    reason: String,
) -> Result<FailedOrder, AppError> {
    let snapshot = FailedOrder::from_order(order, reason);
    state
        .failed_orders
        .insert(snapshot.order_id.clone(), snapshot.clone());

    remove_active_pair(state, order);
    Ok(snapshot)
}

fn remove_active_pair(state: &AppState, order: &Order) {
    state.orders.remove(&order.id);
    state.order_views.remove(&order.view_id);
    state.metrics.active_orders.dec();
    state.discard_order_lock(&order.id);
}

/// Drops the order from the courier's assigned set and flips the courier back
/// to available when no other non-terminal, non-rejected assignment remains.
///
/// The remove, the recheck of the assigned set, and the status flip all run
/// under one courier entry guard, so a concurrent assignment cannot land
/// between the decision and the flip and be wiped out. Lock order is the
/// courier entry first, then order reads; no path takes these in reverse.
pub(crate) fn release_capacity(state: &AppState, courier_id: Uuid, order_id: &str) {
    let Some(mut courier) = state.couriers.get_mut(&courier_id) else {
        return;
    };

    courier.assigned_orders.remove(order_id);
    courier.updated_at = Utc::now();

    let has_active = courier.assigned_orders.iter().any(|id| {
        state
            .orders
            .get(id)
            .map(|order| order.status.occupies_courier())
            .unwrap_or(false)
    });

    if !has_active && courier.status == CourierStatus::Busy {
        courier.status = CourierStatus::Available;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gateway::{self, NewOrder};
    use crate::geo::geocode::NoopGeocoder;
    use crate::models::courier::{Courier, CourierStatus};
    use crate::models::order::{LineItem, OrderType, PaymentMethod};

    fn state() -> AppState {
        AppState::new(Config::default(), Box::new(NoopGeocoder))
    }

    async fn seed_order(state: &AppState) -> Order {
        gateway::create_order(
            state,
            NewOrder {
                customer_name: "Lin".to_string(),
                customer_phone: "+4915200000003".to_string(),
                items: vec![LineItem {
                    name: "dumplings".to_string(),
                    unit_price: 8.0,
                    quantity: 2,
                }],
                address: None,
                payment_method: PaymentMethod::Online,
                order_type: OrderType::Delivery,
            },
        )
        .await
        .unwrap()
    }

    fn seed_courier(state: &AppState) -> Uuid {
        let courier = Courier::new("Kenji".to_string());
        let id = courier.id;
        state.couriers.insert(id, courier);
        id
    }

    #[tokio::test]
    async fn assign_reserves_capacity_and_moves_the_pair() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        let assigned = assign(&state, &order.id, courier_id).await.unwrap();
        assert_eq!(assigned.status, OrderStatus::ProcessingDelivery);
        assert_eq!(assigned.assigned_courier, Some(courier_id));

        let courier = state.couriers.get(&courier_id).unwrap();
        assert_eq!(courier.status, CourierStatus::Busy);
        assert!(courier.assigned_orders.contains(&order.id));

        let view = state.order_views.get(&order.view_id).unwrap();
        assert_eq!(view.status, OrderStatus::ProcessingDelivery.view_status());
    }

    #[tokio::test]
    async fn assign_is_idempotent_for_the_same_courier() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();
        assign(&state, &order.id, courier_id).await.unwrap();

        let courier = state.couriers.get(&courier_id).unwrap();
        assert_eq!(courier.assigned_orders.len(), 1);
    }

    #[tokio::test]
    async fn reassign_does_not_regress_an_accepted_order() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();
        accept(&state, &order.id, courier_id).await.unwrap();

        let repeated = assign(&state, &order.id, courier_id).await.unwrap();
        assert_eq!(repeated.status, OrderStatus::Accepted);

        let stored = state.orders.get(&order.id).unwrap();
        assert_eq!(stored.status, OrderStatus::Accepted);
        let view = state.order_views.get(&order.view_id).unwrap();
        assert_eq!(view.status, OrderStatus::Accepted.view_status());
    }

    #[tokio::test]
    async fn release_keeps_courier_busy_while_another_assignment_is_active() {
        let state = state();
        let first = seed_order(&state).await;
        let second = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &first.id, courier_id).await.unwrap();
        accept(&state, &first.id, courier_id).await.unwrap();

        // A second active assignment landing just before capacity release;
        // the release must re-check the assigned set under its own guard
        // instead of flipping on a stale decision.
        {
            let mut courier = state.couriers.get_mut(&courier_id).unwrap();
            courier.assigned_orders.insert(second.id.clone());
        }
        {
            let mut order = state.orders.get_mut(&second.id).unwrap();
            order.assigned_courier = Some(courier_id);
            order.status = OrderStatus::ProcessingDelivery;
        }

        complete(&state, &first.id, courier_id).await.unwrap();

        let courier = state.couriers.get(&courier_id).unwrap();
        assert_eq!(courier.status, CourierStatus::Busy);
        assert!(courier.assigned_orders.contains(&second.id));
    }

    #[tokio::test]
    async fn busy_courier_cannot_take_a_second_order() {
        let state = state();
        let first = seed_order(&state).await;
        let second = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &first.id, courier_id).await.unwrap();
        let err = assign(&state, &second.id, courier_id).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityConflict(_)));
    }

    #[tokio::test]
    async fn accept_requires_the_assigned_courier() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);
        let impostor = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();

        let err = accept(&state, &order.id, impostor).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityConflict(_)));

        let accepted = accept(&state, &order.id, courier_id).await.unwrap();
        assert_eq!(accepted.status, OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn reject_releases_capacity_and_unassigns() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();
        let rejected = reject(&state, &order.id, courier_id).await.unwrap();

        assert_eq!(rejected.status, OrderStatus::Rejected);
        assert_eq!(rejected.assigned_courier, None);

        let courier = state.couriers.get(&courier_id).unwrap();
        assert_eq!(courier.status, CourierStatus::Available);
        assert!(courier.assigned_orders.is_empty());
    }

    #[tokio::test]
    async fn in_transit_only_from_accepted_or_picked_up() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();
        let err = mark_in_transit(&state, &order.id, courier_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        accept(&state, &order.id, courier_id).await.unwrap();
        let moved = mark_in_transit(&state, &order.id, courier_id).await.unwrap();
        assert_eq!(moved.status, OrderStatus::InTransit);
    }

    #[tokio::test]
    async fn complete_archives_credits_and_frees_the_courier() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();
        accept(&state, &order.id, courier_id).await.unwrap();
        let snapshot = complete(&state, &order.id, courier_id).await.unwrap();

        assert_eq!(snapshot.total, order.item_total() + order.delivery_fee);
        assert!(state.completed_orders.contains_key(&order.id));
        assert!(!state.orders.contains_key(&order.id));
        assert!(!state.order_views.contains_key(&order.view_id));

        let courier = state.couriers.get(&courier_id).unwrap();
        assert_eq!(courier.status, CourierStatus::Available);
        assert_eq!(courier.completed_count, 1);
        assert!(courier.assigned_orders.is_empty());
    }

    #[tokio::test]
    async fn repeated_complete_returns_not_found_without_duplicate_archive() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();
        accept(&state, &order.id, courier_id).await.unwrap();
        complete(&state, &order.id, courier_id).await.unwrap();

        let err = complete(&state, &order.id, courier_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(state.completed_orders.len(), 1);
    }

    #[tokio::test]
    async fn fail_requires_a_real_reason() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();
        accept(&state, &order.id, courier_id).await.unwrap();

        let err = fail(&state, &order.id, courier_id, "bad").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        // No state change on a rejected reason.
        assert!(state.orders.contains_key(&order.id));
        let courier = state.couriers.get(&courier_id).unwrap();
        assert_eq!(courier.status, CourierStatus::Busy);
        assert_eq!(courier.failed_count, 0);
    }

    #[tokio::test]
    async fn fail_archives_with_reason_and_frees_the_courier() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();
        accept(&state, &order.id, courier_id).await.unwrap();

        let snapshot = fail(&state, &order.id, courier_id, "customer unreachable at door")
            .await
            .unwrap();
        assert_eq!(snapshot.reason, "customer unreachable at door");
        assert_eq!(snapshot.courier_id, Some(courier_id));

        assert!(state.failed_orders.contains_key(&order.id));
        assert!(!state.orders.contains_key(&order.id));

        let courier = state.couriers.get(&courier_id).unwrap();
        assert_eq!(courier.status, CourierStatus::Available);
        assert_eq!(courier.failed_count, 1);
    }

    #[tokio::test]
    async fn fail_is_rejected_before_acceptance() {
        let state = state();
        let order = seed_order(&state).await;
        let courier_id = seed_courier(&state);

        assign(&state, &order.id, courier_id).await.unwrap();

        let err = fail(&state, &order.id, courier_id, "vehicle broke down on route")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
