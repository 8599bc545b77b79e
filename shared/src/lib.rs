use serde::{Deserialize, Serialize};

/// WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a `[lng, lat]` pair as used by GeoJSON and OSRM.
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[1],
            lng: pair[0],
        }
    }

    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeCategory {
    Park,
    Bridge,
    Stream,
}

/// Landmark used as a safety reference when scoring candidate points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafePoint {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub category: SafeCategory,
}

impl SafePoint {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64, category: SafeCategory) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
            category,
        }
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Output of a single routing-service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub path: Vec<GeoPoint>,
    /// Road-network length, not geodesic.
    pub distance_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripMode {
    RoundTrip,
    OneWay,
    Preset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseResult {
    pub mode: TripMode,
    pub start_point: GeoPoint,
    pub turnaround_point: GeoPoint,
    pub route_path: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_distance_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_distance_m: Option<f64>,
    /// `|actual - target| / target`, absent for preset courses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_ratio: Option<f64>,
    /// False when the course is a best-effort result outside the tolerance.
    pub within_tolerance: bool,
    pub attempts: u32,
}

/// Curated course with fixed waypoints, routed as a closed loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetCourse {
    pub name: String,
    pub start: GeoPoint,
    #[serde(default)]
    pub waypoints: Vec<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRequest {
    pub start: GeoPoint,
    pub target_distance_m: f64,
    #[serde(default)]
    pub waypoints: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetCourseRequest {
    pub preset: PresetCourse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnaroundRequest {
    pub origin: GeoPoint,
    pub target_extra_distance_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopWaypointsRequest {
    pub origin: GeoPoint,
    pub target_distance_m: f64,
    #[serde(default = "default_loop_waypoint_count")]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub point_count: usize,
    pub bounds: CourseBounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseResponse {
    pub course: CourseResult,
    pub gpx_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CourseMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

pub fn default_loop_waypoint_count() -> usize {
    3
}
