use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    Available,
    Busy,
    Offline,
    OnBreak,
}

/// Last-known position of a courier, updated by the location hub.
/// `reported_at` is the freshness marker consumers use to judge staleness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierPosition {
    pub point: GeoPoint,
    pub address: Option<String>,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub status: CourierStatus,
    pub position: Option<CourierPosition>,
    /// Order ids currently assigned to this courier. Set semantics keep
    /// assignment and removal idempotent.
    pub assigned_orders: BTreeSet<String>,
    pub completed_count: u64,
    pub failed_count: u64,
    pub earnings: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            status: CourierStatus::Available,
            position: None,
            assigned_orders: BTreeSet::new(),
            completed_count: 0,
            failed_count: 0,
            earnings: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}
