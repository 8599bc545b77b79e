use crate::models::{GeoPoint, SafePoint};

pub const EARTH_RADIUS_KM: f64 = 6_371.0;
/// Flat-earth conversion used for candidate placement.
pub const KM_PER_DEGREE: f64 = 111.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("nearest-point query against an empty reference set")]
pub struct EmptyInputError;

/// Anything with a WGS84 position that can be searched by [`nearest`].
pub trait Positioned {
    fn position(&self) -> GeoPoint;
}

impl Positioned for GeoPoint {
    fn position(&self) -> GeoPoint {
        *self
    }
}

impl Positioned for SafePoint {
    fn position(&self) -> GeoPoint {
        SafePoint::position(self)
    }
}

pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlng = (dlng / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Linear scan for the element closest to `point`.
pub fn nearest<T: Positioned>(point: GeoPoint, set: &[T]) -> Result<(&T, f64), EmptyInputError> {
    set.iter()
        .map(|item| (item, haversine_km(point, item.position())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or(EmptyInputError)
}

pub fn path_length_km(path: &[GeoPoint]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Move `distance_km` from `origin` along `bearing_rad` (0 = north, clockwise)
/// using the 111 km/degree approximation, with the longitude offset widened by
/// `1/cos(lat)` for meridian convergence.
pub fn offset_point(origin: GeoPoint, distance_km: f64, bearing_rad: f64) -> GeoPoint {
    let radius_deg = distance_km / KM_PER_DEGREE;
    let lat_offset = radius_deg * bearing_rad.cos();
    let lng_offset = radius_deg * bearing_rad.sin() / origin.lat.to_radians().cos();

    GeoPoint {
        lat: origin.lat + lat_offset,
        lng: origin.lng + lng_offset,
    }
}

/// Planar distance in degrees, only meaningful for comparing nearby points.
pub fn degree_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = b.lat - a.lat;
    let dlng = b.lng - a.lng;
    (dlat * dlat + dlng * dlng).sqrt()
}
