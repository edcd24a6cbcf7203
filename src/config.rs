use std::env;

use crate::error::AppError;
use crate::models::courier::GeoPoint;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Fixed service origin all delivery distances are measured from.
    pub origin: GeoPoint,
    /// Fallback when no address is supplied or geocoding fails.
    pub default_address: String,
    pub default_point: GeoPoint,
    pub max_delivery_km: f64,
    pub tier1_fee: f64,
    pub tier2_fee: f64,
    pub cancel_window_minutes: i64,
    /// Nominatim-style geocoder endpoint; unset means geocoding always
    /// degrades to the default location.
    pub geocoder_url: Option<String>,
    pub geocoder_timeout_ms: u64,
    pub event_buffer_size: usize,
    /// Minimum gap between broadcast fan-outs per courier. Position state is
    /// still updated on every report; only re-publishing is throttled.
    pub min_broadcast_interval_ms: u64,
    /// Average courier speed assumed by the non-authoritative estimate
    /// endpoint.
    pub estimate_speed_kmh: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            origin: GeoPoint {
                lat: parse_or_default("SERVICE_ORIGIN_LAT", 52.52)?,
                lng: parse_or_default("SERVICE_ORIGIN_LNG", 13.405)?,
            },
            default_address: env::var("DEFAULT_DELIVERY_ADDRESS")
                .unwrap_or_else(|_| "restaurant pickup counter".to_string()),
            default_point: GeoPoint {
                lat: parse_or_default("DEFAULT_DELIVERY_LAT", 52.52)?,
                lng: parse_or_default("DEFAULT_DELIVERY_LNG", 13.405)?,
            },
            max_delivery_km: parse_or_default("MAX_DELIVERY_KM", 10.0)?,
            tier1_fee: parse_or_default("DELIVERY_FEE_TIER1", 2.5)?,
            tier2_fee: parse_or_default("DELIVERY_FEE_TIER2", 5.0)?,
            cancel_window_minutes: parse_or_default("CANCEL_WINDOW_MINUTES", 10)?,
            geocoder_url: env::var("GEOCODER_URL").ok(),
            geocoder_timeout_ms: parse_or_default("GEOCODER_TIMEOUT_MS", 2_000)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 64)?,
            min_broadcast_interval_ms: parse_or_default("MIN_BROADCAST_INTERVAL_MS", 250)?,
            estimate_speed_kmh: parse_or_default("ESTIMATE_SPEED_KMH", 25.0)?,
        })
    }
}

impl Default for Config {
    /// Defaults mirroring `from_env` with no environment set; used by tests.
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            origin: GeoPoint {
                lat: 52.52,
                lng: 13.405,
            },
            default_address: "restaurant pickup counter".to_string(),
            default_point: GeoPoint {
                lat: 52.52,
                lng: 13.405,
            },
            max_delivery_km: 10.0,
            tier1_fee: 2.5,
            tier2_fee: 5.0,
            cancel_window_minutes: 10,
            geocoder_url: None,
            geocoder_timeout_ms: 2_000,
            event_buffer_size: 64,
            min_broadcast_interval_ms: 0,
            estimate_speed_kmh: 25.0,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
