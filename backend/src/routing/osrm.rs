use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};

use super::{Overview, RetryPolicy, RoutingError, RoutingService, error::OsrmErrorPayload};
use crate::models::{GeoPoint, RouteResult};

pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";
pub const DEFAULT_PROFILE: &str = "foot";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub route_timeout: Duration,
    /// Snapping is a lighter call and gets a shorter budget.
    pub snap_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OSRM_URL.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            route_timeout: Duration::from_secs(20),
            snap_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP client for OSRM-compatible `route` and `nearest` services.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    http: Client,
    config: OsrmConfig,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    #[serde(default)]
    geometry: Option<OsrmGeometry>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsrmNearestResponse {
    code: String,
    #[serde(default)]
    waypoints: Vec<OsrmWaypoint>,
}

#[derive(Debug, Deserialize)]
struct OsrmWaypoint {
    location: [f64; 2],
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, RoutingError> {
        let http = Client::builder()
            .user_agent(concat!("course-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| RoutingError::Transport(err.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    pub fn route_url(&self, points: &[GeoPoint], overview: Overview) -> String {
        let coordinates = points
            .iter()
            .map(|p| format_lng_lat(*p))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/route/v1/{}/{}?overview={}&geometries=geojson&steps=false",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coordinates,
            overview.as_query()
        )
    }

    pub fn nearest_url(&self, point: GeoPoint) -> String {
        format!(
            "{}/nearest/v1/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            format_lng_lat(point)
        )
    }

    async fn route_once(
        &self,
        points: &[GeoPoint],
        overview: Overview,
    ) -> Result<RouteResult, RoutingError> {
        let url = self.route_url(points, overview);
        let response: OsrmRouteResponse = self.get_json(&url, self.config.route_timeout).await?;
        decode_route(response, overview)
    }

    async fn nearest_once(&self, point: GeoPoint) -> Result<GeoPoint, RoutingError> {
        let url = self.nearest_url(point);
        let response: OsrmNearestResponse = self.get_json(&url, self.config.snap_timeout).await?;
        decode_nearest(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<T, RoutingError> {
        tracing::debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| RoutingError::from_reqwest(err, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| RoutingError::from_reqwest(err, timeout))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<OsrmErrorPayload>(&body) {
                Ok(payload) if payload.code == "NoRoute" => RoutingError::NoRoute,
                Ok(payload) => RoutingError::Status {
                    status: status.as_u16(),
                    message: payload.message.unwrap_or(payload.code),
                },
                Err(_) => RoutingError::Status {
                    status: status.as_u16(),
                    message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                },
            });
        }

        serde_json::from_str(&body).map_err(|err| RoutingError::Malformed(err.to_string()))
    }
}

impl RoutingService for OsrmClient {
    async fn route(
        &self,
        points: &[GeoPoint],
        overview: Overview,
    ) -> Result<RouteResult, RoutingError> {
        if points.len() < 2 {
            tracing::warn!("route requested with {} point(s)", points.len());
            return Err(RoutingError::NoRoute);
        }
        self.config
            .retry
            .run("route", move || self.route_once(points, overview))
            .await
    }

    async fn nearest_road(&self, point: GeoPoint) -> Result<GeoPoint, RoutingError> {
        self.config
            .retry
            .run("nearest", move || self.nearest_once(point))
            .await
    }
}

fn format_lng_lat(point: GeoPoint) -> String {
    format!("{:.6},{:.6}", point.lng, point.lat)
}

/// Swap `[lng, lat]` wire pairs into `(lat, lng)` points, preserving order.
pub fn decode_geometry(coordinates: &[[f64; 2]]) -> Vec<GeoPoint> {
    coordinates.iter().copied().map(GeoPoint::from_lng_lat).collect()
}

pub(crate) fn decode_route(
    response: OsrmRouteResponse,
    overview: Overview,
) -> Result<RouteResult, RoutingError> {
    if response.code == "NoRoute" {
        return Err(RoutingError::NoRoute);
    }
    if response.code != "Ok" {
        return Err(RoutingError::Malformed(format!(
            "unexpected response code {}",
            response.code
        )));
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or(RoutingError::NoRoute)?;

    if !route.distance.is_finite() || route.distance < 0.0 {
        return Err(RoutingError::Malformed(format!(
            "invalid route distance {}",
            route.distance
        )));
    }

    let path = route
        .geometry
        .map(|geometry| decode_geometry(&geometry.coordinates))
        .unwrap_or_default();
    if overview == Overview::Full && path.is_empty() {
        return Err(RoutingError::Malformed("route geometry is empty".into()));
    }

    Ok(RouteResult {
        path,
        distance_m: route.distance,
    })
}

pub(crate) fn decode_nearest(response: OsrmNearestResponse) -> Result<GeoPoint, RoutingError> {
    if response.code != "Ok" {
        return Err(RoutingError::Malformed(format!(
            "unexpected response code {}",
            response.code
        )));
    }
    response
        .waypoints
        .first()
        .map(|waypoint| GeoPoint::from_lng_lat(waypoint.location))
        .ok_or(RoutingError::NoRoute)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OsrmClient {
        OsrmClient::new(OsrmConfig {
            base_url: "http://osrm.test/".into(),
            ..OsrmConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn default_timeouts() {
        let config = OsrmConfig::default();
        assert_eq!(config.route_timeout, Duration::from_secs(20));
        assert_eq!(config.snap_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts(), 3);
        assert_eq!(config.profile, "foot");
    }

    #[test]
    fn route_url_uses_lng_lat_order() {
        let url = client().route_url(
            &[GeoPoint::new(37.5, 126.9), GeoPoint::new(37.6, 127.0)],
            Overview::Full,
        );
        assert_eq!(
            url,
            "http://osrm.test/route/v1/foot/126.900000,37.500000;127.000000,37.600000\
             ?overview=full&geometries=geojson&steps=false"
        );
    }

    #[test]
    fn route_url_without_overview() {
        let url = client().route_url(
            &[GeoPoint::new(37.5, 126.9), GeoPoint::new(37.6, 127.0)],
            Overview::None,
        );
        assert!(url.contains("overview=false"));
    }

    #[test]
    fn nearest_url_uses_lng_lat_order() {
        let url = client().nearest_url(GeoPoint::new(37.5665, 126.978));
        assert_eq!(url, "http://osrm.test/nearest/v1/foot/126.978000,37.566500");
    }

    #[test]
    fn decode_geometry_swaps_pairs() {
        let path = decode_geometry(&[[126.9, 37.5], [127.0, 37.6]]);
        assert_eq!(
            path,
            vec![GeoPoint::new(37.5, 126.9), GeoPoint::new(37.6, 127.0)]
        );
        let back: Vec<[f64; 2]> = path.iter().map(|p| p.to_lng_lat()).collect();
        assert_eq!(decode_geometry(&back), path);
    }

    #[test]
    fn decode_route_reads_first_route() {
        let response: OsrmRouteResponse = serde_json::from_str(
            r#"{"code":"Ok","routes":[
                {"distance":1234.5,"geometry":{"type":"LineString","coordinates":[[126.9,37.5],[127.0,37.6]]}},
                {"distance":9999.0,"geometry":{"type":"LineString","coordinates":[[0.0,0.0],[1.0,1.0]]}}
            ]}"#,
        )
        .unwrap();
        let route = decode_route(response, Overview::Full).unwrap();
        assert_eq!(route.distance_m, 1234.5);
        assert_eq!(route.path[0], GeoPoint::new(37.5, 126.9));
        assert_eq!(route.path[1], GeoPoint::new(37.6, 127.0));
    }

    #[test]
    fn decode_route_without_geometry_when_overview_disabled() {
        let response: OsrmRouteResponse =
            serde_json::from_str(r#"{"code":"Ok","routes":[{"distance":800.0}]}"#).unwrap();
        let route = decode_route(response, Overview::None).unwrap();
        assert!(route.path.is_empty());
        assert_eq!(route.distance_m, 800.0);
    }

    #[test]
    fn decode_route_requires_geometry_for_full_overview() {
        let response: OsrmRouteResponse =
            serde_json::from_str(r#"{"code":"Ok","routes":[{"distance":800.0}]}"#).unwrap();
        assert!(matches!(
            decode_route(response, Overview::Full),
            Err(RoutingError::Malformed(_))
        ));
    }

    #[test]
    fn decode_route_with_no_routes() {
        let response: OsrmRouteResponse =
            serde_json::from_str(r#"{"code":"Ok","routes":[]}"#).unwrap();
        assert_eq!(decode_route(response, Overview::Full), Err(RoutingError::NoRoute));

        let response: OsrmRouteResponse = serde_json::from_str(r#"{"code":"NoRoute"}"#).unwrap();
        assert_eq!(decode_route(response, Overview::Full), Err(RoutingError::NoRoute));
    }

    #[test]
    fn decode_nearest_swaps_location() {
        let response: OsrmNearestResponse = serde_json::from_str(
            r#"{"code":"Ok","waypoints":[{"location":[126.9781,37.5664],"distance":3.2}]}"#,
        )
        .unwrap();
        assert_eq!(
            decode_nearest(response).unwrap(),
            GeoPoint::new(37.5664, 126.9781)
        );
    }

    #[tokio::test]
    async fn single_point_route_is_rejected_without_a_request() {
        let result = client()
            .route(&[GeoPoint::new(37.5, 126.9)], Overview::Full)
            .await;
        assert_eq!(result, Err(RoutingError::NoRoute));
    }
}
