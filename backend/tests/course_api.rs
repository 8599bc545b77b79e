use axum::{
    body::{Body, to_bytes},
    http::Request,
};
use course_backend::{
    AppState, create_router,
    course::CourseGenerator,
    models::{ApiError, CourseResponse, GeoPoint, RouteResult, TripMode},
    points::PointCalculator,
    routing::{GeodesicRouter, Overview, RoutingError, RoutingService},
    safe_points::SafePointIndex,
};
use hyper::StatusCode;
use serde_json::{Value, json};
use tower::ServiceExt;

struct Unreachable;

impl RoutingService for Unreachable {
    async fn route(
        &self,
        _points: &[GeoPoint],
        _overview: Overview,
    ) -> Result<RouteResult, RoutingError> {
        Err(RoutingError::Transport("connection refused".into()))
    }

    async fn nearest_road(&self, _point: GeoPoint) -> Result<GeoPoint, RoutingError> {
        Err(RoutingError::Transport("connection refused".into()))
    }
}

fn app_with<R: RoutingService + 'static>(routing: R) -> axum::Router {
    let points = PointCalculator::new(SafePointIndex::builtin()).expect("catalogue");
    create_router(AppState::new(CourseGenerator::new(routing, points)))
}

fn test_app() -> axum::Router {
    app_with(GeodesicRouter::default())
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), 4 * 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn round_trip_endpoint_returns_course_with_gpx() {
    let payload = json!({
        "start": {"lat": 37.5665, "lng": 126.9780},
        "target_distance_m": 6000.0,
        "seed": 7
    });
    let response = test_app()
        .oneshot(post_json("/api/course/round-trip", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: CourseResponse = read_json(response).await;
    assert_eq!(body.course.mode, TripMode::RoundTrip);
    assert!(!body.gpx_base64.is_empty());
    assert!(body.course.route_path.len() >= 3);
    assert_eq!(body.course.route_path.first(), body.course.route_path.last());
    assert!(body.course.attempts >= 1 && body.course.attempts <= 4);

    let metadata = body.metadata.expect("metadata");
    assert_eq!(metadata.point_count, body.course.route_path.len());
    assert!(metadata.bounds.min_lat <= 37.5665 && metadata.bounds.max_lat >= 37.5665);
}

#[tokio::test]
async fn seeded_requests_are_reproducible() {
    let payload = json!({
        "start": {"lat": 37.5665, "lng": 126.9780},
        "target_distance_m": 5000.0,
        "seed": 99
    });
    let first: CourseResponse = read_json(
        test_app()
            .oneshot(post_json("/api/course/round-trip", &payload))
            .await
            .unwrap(),
    )
    .await;
    let second: CourseResponse = read_json(
        test_app()
            .oneshot(post_json("/api/course/round-trip", &payload))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first.course.route_path, second.course.route_path);
}

#[tokio::test]
async fn one_way_endpoint_ends_at_turnaround() {
    let payload = json!({
        "start": {"lat": 37.5665, "lng": 126.9780},
        "target_distance_m": 4000.0,
        "waypoints": [],
        "seed": 3
    });
    let response = test_app()
        .oneshot(post_json("/api/course/one-way", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: CourseResponse = read_json(response).await;
    assert_eq!(body.course.mode, TripMode::OneWay);
    assert_eq!(
        body.course.route_path.last(),
        Some(&body.course.turnaround_point)
    );
    assert!(body.course.within_tolerance);
}

#[tokio::test]
async fn too_short_target_is_bad_request() {
    let payload = json!({
        "start": {"lat": 37.5665, "lng": 126.9780},
        "target_distance_m": 100.0
    });
    let response = test_app()
        .oneshot(post_json("/api/course/round-trip", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiError = read_json(response).await;
    assert!(body.message.contains("target distance"));
}

#[tokio::test]
async fn unreachable_routing_is_service_unavailable() {
    let payload = json!({
        "preset": {
            "name": "Namsan",
            "start": {"lat": 37.5665, "lng": 126.9780},
            "waypoints": [{"lat": 37.5509, "lng": 126.9908}]
        }
    });
    let response = app_with(Unreachable)
        .oneshot(post_json("/api/course/preset", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: ApiError = read_json(response).await;
    assert!(body.message.contains("connection refused"));
}

#[tokio::test]
async fn preset_endpoint_routes_closed_loop() {
    let payload = json!({
        "preset": {
            "name": "Namsan",
            "start": {"lat": 37.5665, "lng": 126.9780},
            "waypoints": [{"lat": 37.5509, "lng": 126.9908}]
        }
    });
    let response = test_app()
        .oneshot(post_json("/api/course/preset", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: CourseResponse = read_json(response).await;
    assert_eq!(body.course.mode, TripMode::Preset);
    assert!(body.course.error_ratio.is_none());
    assert!(body.course.actual_distance_m.unwrap() > 0.0);
}

#[tokio::test]
async fn turnaround_endpoint_returns_point() {
    let payload = json!({
        "origin": {"lat": 37.5665, "lng": 126.9780},
        "target_extra_distance_m": 3000.0,
        "seed": 1
    });
    let response = test_app()
        .oneshot(post_json("/api/turnaround", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let point: GeoPoint = read_json(response).await;
    assert!(point.is_valid());
    assert_ne!(point, GeoPoint::new(37.5665, 126.9780));
}

#[tokio::test]
async fn loop_waypoints_endpoint_honours_count() {
    let payload = json!({
        "origin": {"lat": 37.5665, "lng": 126.9780},
        "target_distance_m": 10000.0,
        "count": 4,
        "seed": 5
    });
    let response = test_app()
        .oneshot(post_json("/api/loop-waypoints", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let points: Vec<GeoPoint> = read_json(response).await;
    assert_eq!(points.len(), 4);
}
