use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use crate::{
    geo::degree_distance,
    location::{LocationError, LocationProvider},
    models::{CourseResult, GeoPoint, PresetCourse, RouteResult, TripMode},
    points::PointCalculator,
    routing::{Overview, RoutingError, RoutingService},
};

/// Accepted relative deviation between routed and requested distance.
pub const DISTANCE_TOLERANCE: f64 = 0.15;
/// Corrections after the first attempt.
pub const MAX_CORRECTION_ATTEMPTS: u32 = 3;
pub const MIN_TARGET_DISTANCE_M: f64 = 500.0;
pub const MAX_USER_WAYPOINTS: usize = 5;
pub const MAX_LOOP_WAYPOINTS: usize = 12;

const MIN_CORRECTION: f64 = 0.3;
const MAX_CORRECTION: f64 = 2.0;
const LONG_LOOP_M: f64 = 8_000.0;
const ROUND_TRIP_SLACK_M: f64 = 500.0;
const ONE_WAY_SLACK_M: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CourseGenerationError {
    #[error("no course could be generated for the requested distance")]
    NoConvergence,
    #[error("routing service unavailable: {0}")]
    RoutingUnavailable(RoutingError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Location(#[from] LocationError),
}

/// Outcome of one routed attempt, reported through [`ProgressCallback`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionProgress {
    pub attempt: u32,
    pub target_m: f64,
    pub actual_m: f64,
    pub error_ratio: f64,
}

pub type ProgressCallback = Arc<dyn Fn(CorrectionProgress) + Send + Sync>;

/// Feedback state of the distance-correction loop.
///
/// `baseline_m` is the part of the course that is fixed (user waypoints); only
/// the remaining `target - baseline` is corrected.
#[derive(Debug, Clone)]
pub struct CorrectionState {
    target_m: f64,
    baseline_m: f64,
    goal_m: f64,
    current_goal_m: f64,
    best: Option<CourseResult>,
    attempts: u32,
}

impl CorrectionState {
    pub fn new(target_m: f64, baseline_m: f64) -> Self {
        let goal_m = (target_m - baseline_m).max(0.0);
        Self {
            target_m,
            baseline_m,
            goal_m,
            current_goal_m: goal_m,
            best: None,
            attempts: 0,
        }
    }

    /// Distance to request from point placement on the next attempt.
    pub fn current_goal_m(&self) -> f64 {
        self.current_goal_m
    }

    pub fn best(&self) -> Option<&CourseResult> {
        self.best.as_ref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a routed course, update the best result and the next goal.
    /// Returns the course's error ratio against the total target.
    pub fn observe(&mut self, mut course: CourseResult) -> f64 {
        self.attempts += 1;
        let actual_m = course.actual_distance_m.unwrap_or(0.0);
        let error_ratio = (actual_m - self.target_m).abs() / self.target_m;

        course.target_distance_m = Some(self.target_m);
        course.error_ratio = Some(error_ratio);
        course.within_tolerance = error_ratio <= DISTANCE_TOLERANCE;

        let improves = self
            .best
            .as_ref()
            .and_then(|best| best.error_ratio)
            .map_or(true, |best_error| error_ratio < best_error);
        if improves {
            self.best = Some(course);
        }

        let produced_m = actual_m - self.baseline_m;
        let next_m = if produced_m > 0.0 {
            self.current_goal_m * self.goal_m / produced_m
        } else {
            self.goal_m * MAX_CORRECTION
        };
        self.current_goal_m = next_m.clamp(self.goal_m * MIN_CORRECTION, self.goal_m * MAX_CORRECTION);

        error_ratio
    }

    pub fn record_failure(&mut self) {
        self.attempts += 1;
    }

    pub fn finish(self) -> Result<CourseResult, CourseGenerationError> {
        let attempts = self.attempts;
        self.best
            .map(|mut course| {
                course.attempts = attempts;
                course
            })
            .ok_or(CourseGenerationError::NoConvergence)
    }
}

/// What gets placed on each attempt of the correction loop.
#[derive(Debug, Clone, Copy)]
enum CoursePlan<'a> {
    Loop { waypoint_count: usize },
    OneWay,
    RoundTripVia(&'a [GeoPoint]),
    OneWayVia(&'a [GeoPoint]),
}

impl CoursePlan<'_> {
    fn mode(self) -> TripMode {
        match self {
            Self::Loop { .. } | Self::RoundTripVia(_) => TripMode::RoundTrip,
            Self::OneWay | Self::OneWayVia(_) => TripMode::OneWay,
        }
    }
}

struct Candidate {
    stops: Vec<GeoPoint>,
    turnaround: GeoPoint,
}

/// Generates round-trip, one-way and preset courses against a routing service.
pub struct CourseGenerator<R> {
    routing: R,
    points: PointCalculator,
    progress: Option<ProgressCallback>,
}

impl<R: RoutingService> CourseGenerator<R> {
    pub fn new(routing: R, points: PointCalculator) -> Self {
        Self {
            routing,
            points,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn routing(&self) -> &R {
        &self.routing
    }

    pub fn points(&self) -> &PointCalculator {
        &self.points
    }

    /// Round-trip course of roughly `target_m`, optionally through `waypoints`.
    pub async fn generate_course_from_point<G: Rng + Send>(
        &self,
        rng: &mut G,
        start: GeoPoint,
        target_m: f64,
        waypoints: &[GeoPoint],
    ) -> Result<CourseResult, CourseGenerationError> {
        validate_course(start, target_m, waypoints)?;
        tracing::info!(
            "round-trip course: {target_m:.0}m from ({:.5}, {:.5}) via {} waypoint(s)",
            start.lat,
            start.lng,
            waypoints.len()
        );

        if !waypoints.is_empty() {
            return self
                .generate_via_waypoints(rng, start, target_m, waypoints, TripMode::RoundTrip)
                .await;
        }
        let waypoint_count = if target_m >= LONG_LOOP_M { 4 } else { 3 };
        self.run_correction_loop(rng, start, target_m, 0.0, CoursePlan::Loop { waypoint_count })
            .await
    }

    /// One-way course of roughly `target_m`, optionally through `waypoints`.
    pub async fn generate_one_way_course<G: Rng + Send>(
        &self,
        rng: &mut G,
        start: GeoPoint,
        target_m: f64,
        waypoints: &[GeoPoint],
    ) -> Result<CourseResult, CourseGenerationError> {
        validate_course(start, target_m, waypoints)?;
        tracing::info!(
            "one-way course: {target_m:.0}m from ({:.5}, {:.5}) via {} waypoint(s)",
            start.lat,
            start.lng,
            waypoints.len()
        );

        if !waypoints.is_empty() {
            return self
                .generate_via_waypoints(rng, start, target_m, waypoints, TripMode::OneWay)
                .await;
        }
        self.run_correction_loop(rng, start, target_m, 0.0, CoursePlan::OneWay)
            .await
    }

    /// Route a curated course once as a closed loop. No distance correction.
    pub async fn generate_preset_course(
        &self,
        preset: &PresetCourse,
    ) -> Result<CourseResult, CourseGenerationError> {
        validate_point("preset start", preset.start)?;
        if preset.waypoints.is_empty() {
            return Err(CourseGenerationError::InvalidRequest(format!(
                "preset {} has no waypoints",
                preset.name
            )));
        }
        for (i, waypoint) in preset.waypoints.iter().enumerate() {
            validate_point(&format!("preset waypoint {}", i + 1), *waypoint)?;
        }

        let mut stops = Vec::with_capacity(preset.waypoints.len() + 2);
        stops.push(preset.start);
        stops.extend_from_slice(&preset.waypoints);
        stops.push(preset.start);

        let route = self
            .routing
            .route(&stops, Overview::Full)
            .await
            .map_err(CourseGenerationError::RoutingUnavailable)?;
        tracing::info!("preset {}: {:.0}m", preset.name, route.distance_m);

        let turnaround = farthest_from(preset.start, &preset.waypoints).unwrap_or(preset.start);
        Ok(CourseResult {
            mode: TripMode::Preset,
            start_point: preset.start,
            turnaround_point: turnaround,
            route_path: route.path,
            actual_distance_m: Some(route.distance_m),
            target_distance_m: None,
            error_ratio: None,
            within_tolerance: true,
            attempts: 1,
        })
    }

    /// Turnaround point for `target_extra_m` of out-and-back running from `origin`.
    pub async fn calculate_turnaround<G: Rng + Send>(
        &self,
        rng: &mut G,
        origin: GeoPoint,
        target_extra_m: f64,
    ) -> Result<GeoPoint, CourseGenerationError> {
        validate_point("origin", origin)?;
        if !target_extra_m.is_finite() || target_extra_m <= 0.0 {
            return Err(CourseGenerationError::InvalidRequest(format!(
                "extra distance must be positive, got {target_extra_m}"
            )));
        }
        Ok(self
            .points
            .calculate_endpoint(&self.routing, rng, origin, target_extra_m)
            .await)
    }

    pub async fn calculate_loop_waypoints<G: Rng + Send>(
        &self,
        rng: &mut G,
        origin: GeoPoint,
        target_m: f64,
        count: usize,
    ) -> Result<Vec<GeoPoint>, CourseGenerationError> {
        validate_point("origin", origin)?;
        validate_target(target_m)?;
        if !(1..=MAX_LOOP_WAYPOINTS).contains(&count) {
            return Err(CourseGenerationError::InvalidRequest(format!(
                "waypoint count must be between 1 and {MAX_LOOP_WAYPOINTS}, got {count}"
            )));
        }
        Ok(self
            .points
            .calculate_loop_waypoints(&self.routing, rng, origin, target_m, count)
            .await)
    }

    /// Like the point-based generators, starting wherever `provider` says the runner is.
    pub async fn generate_course_from_location<L, G>(
        &self,
        provider: &L,
        rng: &mut G,
        mode: TripMode,
        target_m: f64,
        waypoints: &[GeoPoint],
    ) -> Result<CourseResult, CourseGenerationError>
    where
        L: LocationProvider,
        G: Rng + Send,
    {
        let start = provider.current_position().await?;
        match mode {
            TripMode::RoundTrip => {
                self.generate_course_from_point(rng, start, target_m, waypoints)
                    .await
            }
            TripMode::OneWay => {
                self.generate_one_way_course(rng, start, target_m, waypoints)
                    .await
            }
            TripMode::Preset => Err(CourseGenerationError::InvalidRequest(
                "preset courses carry their own start".into(),
            )),
        }
    }

    /// Measure the fixed waypoint route first and only correct the shortfall.
    async fn generate_via_waypoints<G: Rng + Send>(
        &self,
        rng: &mut G,
        start: GeoPoint,
        target_m: f64,
        waypoints: &[GeoPoint],
        mode: TripMode,
    ) -> Result<CourseResult, CourseGenerationError> {
        let round_trip = mode == TripMode::RoundTrip;
        let mut fixed = Vec::with_capacity(waypoints.len() + 2);
        fixed.push(start);
        fixed.extend_from_slice(waypoints);
        if round_trip {
            fixed.push(start);
        }

        let measured = self
            .routing
            .route(&fixed, Overview::None)
            .await
            .map_err(CourseGenerationError::RoutingUnavailable)?;
        let slack_m = if round_trip { ROUND_TRIP_SLACK_M } else { ONE_WAY_SLACK_M };

        if measured.distance_m >= target_m - slack_m {
            tracing::info!(
                "waypoints cover {:.0}m of {target_m:.0}m, skipping correction",
                measured.distance_m
            );
            let route = self
                .routing
                .route(&fixed, Overview::Full)
                .await
                .map_err(CourseGenerationError::RoutingUnavailable)?;
            let turnaround = if round_trip {
                farthest_from(start, waypoints)
            } else {
                waypoints.last().copied()
            }
            .unwrap_or(start);

            let mut state = CorrectionState::new(target_m, 0.0);
            state.observe(course_from_route(mode, start, turnaround, route));
            return state.finish();
        }

        tracing::debug!(
            "waypoints cover {:.0}m, correcting the remaining {:.0}m",
            measured.distance_m,
            target_m - measured.distance_m
        );
        let plan = if round_trip {
            CoursePlan::RoundTripVia(waypoints)
        } else {
            CoursePlan::OneWayVia(waypoints)
        };
        self.run_correction_loop(rng, start, target_m, measured.distance_m, plan)
            .await
    }

    async fn run_correction_loop<G: Rng + Send>(
        &self,
        rng: &mut G,
        start: GeoPoint,
        target_m: f64,
        baseline_m: f64,
        plan: CoursePlan<'_>,
    ) -> Result<CourseResult, CourseGenerationError> {
        let mut state = CorrectionState::new(target_m, baseline_m);

        for attempt in 0..=MAX_CORRECTION_ATTEMPTS {
            let goal_m = state.current_goal_m();
            let candidate = self.place(rng, start, goal_m, plan).await;

            let route = match self.routing.route(&candidate.stops, Overview::Full).await {
                Ok(route) => route,
                Err(err) => {
                    tracing::warn!("attempt {attempt}: routing failed: {err}");
                    state.record_failure();
                    if state.best().is_some() {
                        break;
                    }
                    if attempt == MAX_CORRECTION_ATTEMPTS {
                        return Err(CourseGenerationError::RoutingUnavailable(err));
                    }
                    continue;
                }
            };

            let actual_m = route.distance_m;
            let course = course_from_route(plan.mode(), start, candidate.turnaround, route);
            let error_ratio = state.observe(course);
            tracing::info!(
                "attempt {attempt}: requested {goal_m:.0}m, routed {actual_m:.0}m of {target_m:.0}m ({:.1}% off)",
                error_ratio * 100.0
            );
            self.report(CorrectionProgress {
                attempt,
                target_m,
                actual_m,
                error_ratio,
            });

            if error_ratio <= DISTANCE_TOLERANCE {
                break;
            }
        }

        let result = state.finish();
        if let Ok(course) = &result {
            if !course.within_tolerance {
                tracing::warn!(
                    "returning best effort course: {:.0}m for {target_m:.0}m",
                    course.actual_distance_m.unwrap_or_default()
                );
            }
        }
        result
    }

    async fn place<G: Rng + Send>(
        &self,
        rng: &mut G,
        start: GeoPoint,
        goal_m: f64,
        plan: CoursePlan<'_>,
    ) -> Candidate {
        match plan {
            CoursePlan::Loop { waypoint_count } => {
                let ring = self
                    .points
                    .calculate_loop_waypoints(&self.routing, rng, start, goal_m, waypoint_count)
                    .await;
                let turnaround = farthest_from(start, &ring).unwrap_or(start);
                let mut stops = Vec::with_capacity(ring.len() + 2);
                stops.push(start);
                stops.extend(ring);
                stops.push(start);
                Candidate { stops, turnaround }
            }
            CoursePlan::OneWay => {
                let end = self
                    .points
                    .calculate_endpoint(&self.routing, rng, start, goal_m * 2.0)
                    .await;
                Candidate {
                    stops: vec![start, end],
                    turnaround: end,
                }
            }
            CoursePlan::RoundTripVia(waypoints) | CoursePlan::OneWayVia(waypoints) => {
                let round_trip = matches!(plan, CoursePlan::RoundTripVia(_));
                let from = waypoints.last().copied().unwrap_or(start);
                let extra_m = if round_trip { goal_m } else { goal_m * 2.0 };
                let extra = self
                    .points
                    .calculate_endpoint(&self.routing, rng, from, extra_m)
                    .await;

                let mut stops = Vec::with_capacity(waypoints.len() + 3);
                stops.push(start);
                stops.extend_from_slice(waypoints);
                stops.push(extra);
                if round_trip {
                    stops.push(start);
                }
                Candidate {
                    stops,
                    turnaround: extra,
                }
            }
        }
    }

    fn report(&self, progress: CorrectionProgress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }
}

fn course_from_route(
    mode: TripMode,
    start: GeoPoint,
    turnaround: GeoPoint,
    route: RouteResult,
) -> CourseResult {
    CourseResult {
        mode,
        start_point: start,
        turnaround_point: turnaround,
        route_path: route.path,
        actual_distance_m: Some(route.distance_m),
        target_distance_m: None,
        error_ratio: None,
        within_tolerance: false,
        attempts: 0,
    }
}

fn farthest_from(origin: GeoPoint, points: &[GeoPoint]) -> Option<GeoPoint> {
    points.iter().copied().max_by(|a, b| {
        degree_distance(origin, *a).total_cmp(&degree_distance(origin, *b))
    })
}

fn validate_point(label: &str, point: GeoPoint) -> Result<(), CourseGenerationError> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(CourseGenerationError::InvalidRequest(format!(
            "{label} ({}, {}) is not a valid coordinate",
            point.lat, point.lng
        )))
    }
}

fn validate_target(target_m: f64) -> Result<(), CourseGenerationError> {
    if !target_m.is_finite() || target_m < MIN_TARGET_DISTANCE_M {
        return Err(CourseGenerationError::InvalidRequest(format!(
            "target distance must be at least {MIN_TARGET_DISTANCE_M}m, got {target_m}"
        )));
    }
    Ok(())
}

fn validate_course(
    start: GeoPoint,
    target_m: f64,
    waypoints: &[GeoPoint],
) -> Result<(), CourseGenerationError> {
    validate_point("start", start)?;
    validate_target(target_m)?;
    if waypoints.len() > MAX_USER_WAYPOINTS {
        return Err(CourseGenerationError::InvalidRequest(format!(
            "at most {MAX_USER_WAYPOINTS} waypoints are supported, got {}",
            waypoints.len()
        )));
    }
    for (i, waypoint) in waypoints.iter().enumerate() {
        validate_point(&format!("waypoint {}", i + 1), *waypoint)?;
    }
    Ok(())
}
