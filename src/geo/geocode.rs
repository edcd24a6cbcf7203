use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::models::courier::GeoPoint;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Request(String),

    #[error("no result for address")]
    NoResult,
}

/// External address-resolution collaborator. Implementations may fail; the
/// caller degrades to the configured default location instead of aborting
/// order creation.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError>;
}

/// Nominatim-style HTTP geocoder (`?q=<address>&format=json`).
pub struct HttpGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}

impl HttpGeocoder {
    pub fn new(base_url: String, timeout_ms: u64) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| GeocodeError::Request(err.to_string()))?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError> {
        let hits: Vec<NominatimHit> = self
            .client
            .get(&self.base_url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|err| GeocodeError::Request(err.to_string()))?
            .json()
            .await
            .map_err(|err| GeocodeError::Request(err.to_string()))?;

        let hit = hits.first().ok_or(GeocodeError::NoResult)?;
        let lat = hit
            .lat
            .parse::<f64>()
            .map_err(|err| GeocodeError::Request(format!("bad latitude: {err}")))?;
        let lng = hit
            .lon
            .parse::<f64>()
            .map_err(|err| GeocodeError::Request(format!("bad longitude: {err}")))?;

        Ok(GeoPoint { lat, lng })
    }
}

/// Used when no geocoder endpoint is configured; every lookup falls back to
/// the default location.
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn geocode(&self, _address: &str) -> Result<GeoPoint, GeocodeError> {
        Err(GeocodeError::NoResult)
    }
}

pub fn geocoder_from_config(config: &Config) -> Result<Box<dyn Geocoder>, GeocodeError> {
    match &config.geocoder_url {
        Some(url) => Ok(Box::new(HttpGeocoder::new(
            url.clone(),
            config.geocoder_timeout_ms,
        )?)),
        None => Ok(Box::new(NoopGeocoder)),
    }
}

/// Resolves a delivery address to coordinates, degrading to the configured
/// default location when no address is given or resolution fails. The
/// eligibility check downstream still applies to the fallback point.
pub async fn resolve_delivery_location(
    geocoder: &dyn Geocoder,
    address: Option<&str>,
    config: &Config,
) -> (String, GeoPoint) {
    let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) else {
        return (config.default_address.clone(), config.default_point);
    };

    match geocoder.geocode(address).await {
        Ok(point) => (address.to_string(), point),
        Err(err) => {
            warn!(address = %address, error = %err, "geocoding failed; using default location");
            (config.default_address.clone(), config.default_point)
        }
    }
}
