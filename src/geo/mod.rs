pub mod geocode;

use crate::config::Config;
use crate::error::AppError;
use crate::models::courier::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eligibility {
    pub distance_km: f64,
    pub fee: f64,
}

/// Distance policy: outside the service radius the order is rejected with the
/// computed distance; inside it the fee is a step function of distance
/// (≤2 km free, ≤5 km tier 1, ≤10 km tier 2).
pub fn assess_eligibility(origin: &GeoPoint, point: &GeoPoint, config: &Config) -> Result<Eligibility, AppError> {
    let distance_km = haversine_km(origin, point);

    if distance_km > config.max_delivery_km {
        return Err(AppError::Eligibility {
            distance_km,
            max_km: config.max_delivery_km,
        });
    }

    let fee = if distance_km <= 2.0 {
        0.0
    } else if distance_km <= 5.0 {
        config.tier1_fee
    } else {
        config.tier2_fee
    };

    Ok(Eligibility { distance_km, fee })
}
