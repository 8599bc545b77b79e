use super::{Overview, RoutingError, RoutingService};
use crate::{
    geo::{haversine_km, path_length_km},
    models::{GeoPoint, RouteResult},
};

/// Offline router that follows great-circle legs between the requested points.
///
/// Distances are inflated by `detour_factor` to approximate the road network.
/// Used when no routing service is reachable and as a deterministic test double.
#[derive(Debug, Clone, Copy)]
pub struct GeodesicRouter {
    pub detour_factor: f64,
    /// Spacing of interpolated points in the returned path.
    pub step_km: f64,
}

impl Default for GeodesicRouter {
    fn default() -> Self {
        Self {
            detour_factor: 1.3,
            step_km: 0.05,
        }
    }
}

impl GeodesicRouter {
    pub fn with_detour_factor(detour_factor: f64) -> Self {
        Self {
            detour_factor,
            ..Self::default()
        }
    }

    fn densify(&self, points: &[GeoPoint]) -> Vec<GeoPoint> {
        let mut path = Vec::with_capacity(points.len());
        for leg in points.windows(2) {
            let (from, to) = (leg[0], leg[1]);
            let steps = (haversine_km(from, to) / self.step_km).ceil().max(1.0) as usize;
            path.extend((0..steps).map(|i| from.interpolate(to, i as f64 / steps as f64)));
        }
        if let Some(last) = points.last() {
            path.push(*last);
        }
        path
    }
}

impl RoutingService for GeodesicRouter {
    async fn route(
        &self,
        points: &[GeoPoint],
        overview: Overview,
    ) -> Result<RouteResult, RoutingError> {
        if points.len() < 2 {
            return Err(RoutingError::NoRoute);
        }
        let distance_m = path_length_km(points) * self.detour_factor * 1000.0;
        let path = match overview {
            Overview::Full => self.densify(points),
            Overview::None => Vec::new(),
        };
        Ok(RouteResult { path, distance_m })
    }

    async fn nearest_road(&self, point: GeoPoint) -> Result<GeoPoint, RoutingError> {
        Ok(point)
    }
}
