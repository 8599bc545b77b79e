//! Road-routing boundary.
//!
//! Everything above this module speaks `(lat, lng)`; the `[lng, lat]` wire
//! order of OSRM-style services is handled inside the concrete clients.

pub mod error;
pub mod geodesic;
pub mod osrm;
pub mod retry;

use std::{future::Future, sync::Arc};

use crate::models::{GeoPoint, RouteResult};

pub use error::{RoutingError, RoutingErrorKind};
pub use geodesic::GeodesicRouter;
pub use osrm::{OsrmClient, OsrmConfig};
pub use retry::RetryPolicy;

/// How much route geometry the service should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overview {
    /// Full polyline for rendering.
    Full,
    /// Distance only; `RouteResult::path` may be empty.
    None,
}

impl Overview {
    pub fn as_query(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::None => "false",
        }
    }
}

/// Foot-profile road routing used by the course engine.
///
/// Implementations own their own retry and timeout policy; callers treat a
/// returned error as final.
pub trait RoutingService: Send + Sync {
    /// Route through `points` in order (at least two).
    fn route(
        &self,
        points: &[GeoPoint],
        overview: Overview,
    ) -> impl Future<Output = Result<RouteResult, RoutingError>> + Send;

    /// Snap a free coordinate to the nearest routable road node.
    fn nearest_road(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<GeoPoint, RoutingError>> + Send;
}

/// Routing backend chosen at start-up.
#[derive(Debug, Clone)]
pub enum AnyRouter {
    Osrm(OsrmClient),
    Geodesic(GeodesicRouter),
}

impl RoutingService for AnyRouter {
    async fn route(
        &self,
        points: &[GeoPoint],
        overview: Overview,
    ) -> Result<RouteResult, RoutingError> {
        match self {
            Self::Osrm(client) => client.route(points, overview).await,
            Self::Geodesic(router) => router.route(points, overview).await,
        }
    }

    async fn nearest_road(&self, point: GeoPoint) -> Result<GeoPoint, RoutingError> {
        match self {
            Self::Osrm(client) => client.nearest_road(point).await,
            Self::Geodesic(router) => router.nearest_road(point).await,
        }
    }
}

impl<T: RoutingService> RoutingService for Arc<T> {
    fn route(
        &self,
        points: &[GeoPoint],
        overview: Overview,
    ) -> impl Future<Output = Result<RouteResult, RoutingError>> + Send {
        T::route(&**self, points, overview)
    }

    fn nearest_road(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<GeoPoint, RoutingError>> + Send {
        T::nearest_road(&**self, point)
    }
}

impl<T: RoutingService> RoutingService for &T {
    fn route(
        &self,
        points: &[GeoPoint],
        overview: Overview,
    ) -> impl Future<Output = Result<RouteResult, RoutingError>> + Send {
        T::route(*self, points, overview)
    }

    fn nearest_road(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<GeoPoint, RoutingError>> + Send {
        T::nearest_road(*self, point)
    }
}
