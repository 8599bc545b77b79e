use std::future::Future;

use thiserror::Error;

use crate::models::GeoPoint;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Source of the runner's current position.
pub trait LocationProvider: Send + Sync {
    fn current_position(&self) -> impl Future<Output = Result<GeoPoint, LocationError>> + Send;
}

/// Provider for hosts that already know where the runner is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLocation(pub GeoPoint);

impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<GeoPoint, LocationError> {
        if !self.0.is_valid() {
            return Err(LocationError::Unavailable(format!(
                "invalid coordinate ({}, {})",
                self.0.lat, self.0.lng
            )));
        }
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_location_reports_its_point() {
        let point = GeoPoint::new(37.5665, 126.9780);
        assert_eq!(FixedLocation(point).current_position().await, Ok(point));
    }

    #[tokio::test]
    async fn fixed_location_rejects_out_of_range_point() {
        let result = FixedLocation(GeoPoint::new(120.0, 0.0)).current_position().await;
        assert!(matches!(result, Err(LocationError::Unavailable(_))));
    }
}
