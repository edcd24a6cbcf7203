use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::config::Config;
use crate::geo::geocode::Geocoder;
use crate::hub::LocationHub;
use crate::models::archive::{CompletedOrder, FailedOrder};
use crate::models::courier::Courier;
use crate::models::order::{Order, OrderView};
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub config: Config,
    pub geocoder: Box<dyn Geocoder>,
    pub orders: DashMap<String, Order>,
    pub order_views: DashMap<Uuid, OrderView>,
    pub couriers: DashMap<Uuid, Courier>,
    pub completed_orders: DashMap<String, CompletedOrder>,
    pub failed_orders: DashMap<String, FailedOrder>,
    pub hub: LocationHub,
    pub metrics: Metrics,
    order_locks: DashMap<String, Arc<Mutex<()>>>,
    next_order_seq: AtomicU64,
}

impl AppState {
    pub fn new(config: Config, geocoder: Box<dyn Geocoder>) -> Self {
        let hub = LocationHub::new(config.event_buffer_size, config.min_broadcast_interval_ms);

        Self {
            config,
            geocoder,
            orders: DashMap::new(),
            order_views: DashMap::new(),
            couriers: DashMap::new(),
            completed_orders: DashMap::new(),
            failed_orders: DashMap::new(),
            hub,
            metrics: Metrics::new(),
            order_locks: DashMap::new(),
            next_order_seq: AtomicU64::new(0),
        }
    }

    /// Sequential human-readable order ids from a dedicated atomic counter,
    /// safe under parallel creation.
    pub fn next_order_id(&self) -> String {
        let seq = self.next_order_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ORD-{seq:05}")
    }

    /// Per-order mutex serializing every mutating operation on one order.
    /// Concurrent cancel and assign on the same order cannot both succeed.
    pub async fn lock_order(&self, order_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .order_locks
            .entry(order_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Called after a terminal transition; archived orders no longer need a
    /// lock entry.
    pub fn discard_order_lock(&self, order_id: &str) {
        self.order_locks.remove(order_id);
    }
}
