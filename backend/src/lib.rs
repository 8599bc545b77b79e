pub mod config;
pub mod course;
pub mod error;
pub mod geo;
pub mod gpx_export;
pub mod location;
pub mod models;
pub mod points;
pub mod routing;
pub mod safe_points;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use rand::{SeedableRng, rngs::StdRng};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::course::CourseGenerator;
use crate::error::CourseError;
use crate::gpx_export::encode_course_as_gpx;
use crate::models::{
    ApiError, CourseBounds, CourseMetadata, CourseRequest, CourseResponse, CourseResult, GeoPoint,
    LoopWaypointsRequest, PresetCourseRequest, TurnaroundRequest,
};
use crate::routing::RoutingService;

pub struct AppState<R> {
    pub generator: Arc<CourseGenerator<R>>,
    /// Seed used when a request carries none; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            seed: self.seed,
        }
    }
}

impl<R> AppState<R> {
    pub fn new(generator: CourseGenerator<R>) -> Self {
        Self {
            generator: Arc::new(generator),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn rng(&self, request_seed: Option<u64>) -> StdRng {
        match request_seed.or(self.seed) {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

pub fn create_router<R: RoutingService + 'static>(state: AppState<R>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/course/round-trip", post(round_trip_handler::<R>))
        .route("/api/course/one-way", post(one_way_handler::<R>))
        .route("/api/course/preset", post(preset_handler::<R>))
        .route("/api/turnaround", post(turnaround_handler::<R>))
        .route("/api/loop-waypoints", post(loop_waypoints_handler::<R>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

async fn health_handler() -> &'static str {
    "ok"
}

async fn round_trip_handler<R: RoutingService + 'static>(
    State(state): State<AppState<R>>,
    Json(req): Json<CourseRequest>,
) -> ApiResult<CourseResponse> {
    let mut rng = state.rng(req.seed);
    let course = state
        .generator
        .generate_course_from_point(&mut rng, req.start, req.target_distance_m, &req.waypoints)
        .await
        .map_err(api_error)?;
    course_response(course).map(Json).map_err(api_error)
}

async fn one_way_handler<R: RoutingService + 'static>(
    State(state): State<AppState<R>>,
    Json(req): Json<CourseRequest>,
) -> ApiResult<CourseResponse> {
    let mut rng = state.rng(req.seed);
    let course = state
        .generator
        .generate_one_way_course(&mut rng, req.start, req.target_distance_m, &req.waypoints)
        .await
        .map_err(api_error)?;
    course_response(course).map(Json).map_err(api_error)
}

async fn preset_handler<R: RoutingService + 'static>(
    State(state): State<AppState<R>>,
    Json(req): Json<PresetCourseRequest>,
) -> ApiResult<CourseResponse> {
    let course = state
        .generator
        .generate_preset_course(&req.preset)
        .await
        .map_err(api_error)?;
    course_response(course).map(Json).map_err(api_error)
}

async fn turnaround_handler<R: RoutingService + 'static>(
    State(state): State<AppState<R>>,
    Json(req): Json<TurnaroundRequest>,
) -> ApiResult<GeoPoint> {
    let mut rng = state.rng(req.seed);
    state
        .generator
        .calculate_turnaround(&mut rng, req.origin, req.target_extra_distance_m)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn loop_waypoints_handler<R: RoutingService + 'static>(
    State(state): State<AppState<R>>,
    Json(req): Json<LoopWaypointsRequest>,
) -> ApiResult<Vec<GeoPoint>> {
    let mut rng = state.rng(req.seed);
    state
        .generator
        .calculate_loop_waypoints(&mut rng, req.origin, req.target_distance_m, req.count)
        .await
        .map(Json)
        .map_err(api_error)
}

fn course_response(course: CourseResult) -> Result<CourseResponse, CourseError> {
    let gpx_base64 = encode_course_as_gpx(&course)?;
    let metadata = build_metadata(&course.route_path);
    Ok(CourseResponse {
        course,
        gpx_base64,
        metadata,
    })
}

pub fn build_metadata(path: &[GeoPoint]) -> Option<CourseMetadata> {
    let first = path.first()?;
    let bounds = path.iter().fold(
        CourseBounds {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lng: first.lng,
            max_lng: first.lng,
        },
        |bounds, p| CourseBounds {
            min_lat: bounds.min_lat.min(p.lat),
            max_lat: bounds.max_lat.max(p.lat),
            min_lng: bounds.min_lng.min(p.lng),
            max_lng: bounds.max_lng.max(p.lng),
        },
    );
    Some(CourseMetadata {
        point_count: path.len(),
        bounds,
    })
}

fn api_error(err: impl Into<CourseError>) -> (StatusCode, Json<ApiError>) {
    let err = err.into();
    let status = err.status();
    if status.is_server_error() {
        tracing::error!("course request failed: {err}");
    } else {
        tracing::warn!("course request rejected: {err}");
    }
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
