use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::courier::GeoPoint;

/// One position report fanned out to observers. Delivery is best-effort,
/// at-most-once, last value wins; lagging subscribers lose the oldest
/// updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub courier_id: Uuid,
    pub point: GeoPoint,
    pub address: Option<String>,
    pub reported_at: DateTime<Utc>,
}

/// Single fan-out hub shared by every transport. Observers subscribe to a
/// named channel (an order id or a courier id); couriers publish into all
/// channels associated with them.
pub struct LocationHub {
    channels: DashMap<String, broadcast::Sender<LocationUpdate>>,
    last_publish: DashMap<Uuid, Instant>,
    buffer_size: usize,
    min_interval: Duration,
}

impl LocationHub {
    pub fn new(buffer_size: usize, min_interval_ms: u64) -> Self {
        Self {
            channels: DashMap::new(),
            last_publish: DashMap::new(),
            buffer_size,
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<LocationUpdate> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe()
    }

    /// Publishes `update` to every named channel. Never blocks and never
    /// fails: channels without subscribers are pruned, and reports arriving
    /// faster than the coalescing interval are dropped from fan-out (the
    /// caller has already applied them to the authoritative read model).
    pub fn publish<I>(&self, channel_names: I, update: LocationUpdate)
    where
        I: IntoIterator<Item = String>,
    {
        if !self.should_publish(update.courier_id) {
            debug!(courier_id = %update.courier_id, "coalesced location update");
            return;
        }

        let mut dead = Vec::new();
        for name in channel_names {
            if let Some(tx) = self.channels.get(&name) {
                if tx.send(update.clone()).is_err() {
                    dead.push(name);
                }
            }
        }

        // Last subscriber left; drop the channel entry.
        for name in dead {
            self.channels.remove(&name);
        }
    }

    /// Per-courier coalescing keyed on the time of the last fan-out.
    fn should_publish(&self, courier_id: Uuid) -> bool {
        if self.min_interval.is_zero() {
            return true;
        }

        let now = Instant::now();
        match self.last_publish.entry(courier_id) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.min_interval {
                    return false;
                }
                *entry.get_mut() = now;
                true
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
