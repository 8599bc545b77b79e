use std::{f64::consts::TAU, sync::Arc};

use rand::Rng;

use crate::{
    geo::{EmptyInputError, offset_point},
    models::GeoPoint,
    routing::RoutingService,
    safe_points::SafePointIndex,
};

/// Origins within this distance of a safe point get the dense, river-weighted search.
pub const NEAR_SAFE_THRESHOLD_KM: f64 = 3.0;

const SAFE_WEIGHT: f64 = 0.7;
const RIVER_WEIGHT: f64 = 0.3;

const DENSE_CANDIDATES: usize = 24;
const SPARSE_CANDIDATES: usize = 8;
const SPARSE_JITTER_DEG: f64 = 15.0;

/// Road distance of a loop is roughly this much longer than its circumference.
const LOOP_DETOUR_FACTOR: f64 = 1.3;
const LOOP_ROTATIONS: usize = 6;
const LOOP_RADIAL_JITTER: f64 = 0.15;

/// Places turnaround points and loop waypoints biased toward the safe-point catalogue.
#[derive(Debug, Clone)]
pub struct PointCalculator {
    index: Arc<SafePointIndex>,
}

impl PointCalculator {
    pub fn new(index: Arc<SafePointIndex>) -> Result<Self, EmptyInputError> {
        if index.is_empty() {
            return Err(EmptyInputError);
        }
        Ok(Self { index })
    }

    pub fn index(&self) -> &SafePointIndex {
        &self.index
    }

    /// Weighted distance to safety: `0.7 * nearest safe point + 0.3 * nearest river landmark`.
    ///
    /// Lower is better. Infinite when the river category is empty.
    pub fn safety_score(&self, point: GeoPoint) -> f64 {
        match (
            self.index.nearest_safe_point(point.lat, point.lng),
            self.index.nearest_river_point(point.lat, point.lng),
        ) {
            (Ok(safe), Ok(river)) => SAFE_WEIGHT * safe + RIVER_WEIGHT * river,
            _ => f64::INFINITY,
        }
    }

    fn safe_distance(&self, point: GeoPoint) -> f64 {
        self.index
            .nearest_safe_point(point.lat, point.lng)
            .unwrap_or(f64::INFINITY)
    }

    /// Pick an out-and-back turnaround point for `target_extra_m` of extra running.
    ///
    /// # Candidate search
    /// - Candidates sit on a circle of radius `target / 2` around `origin`.
    /// - Origins within [`NEAR_SAFE_THRESHOLD_KM`] of the catalogue get 24
    ///   candidates (every 15°) scored by [`Self::safety_score`].
    /// - Other origins, or a dense search without a finite score, get 8
    ///   candidates (every 45° with ±15° jitter) scored by distance to the
    ///   nearest safe point alone.
    /// - With no finite score at all, one uniformly random bearing is used.
    ///
    /// The winner is snapped to the road network. Snapping failures are logged
    /// and the unsnapped candidate is returned.
    pub async fn calculate_endpoint<R, G>(
        &self,
        routing: &R,
        rng: &mut G,
        origin: GeoPoint,
        target_extra_m: f64,
    ) -> GeoPoint
    where
        R: RoutingService,
        G: Rng + Send,
    {
        let radius_km = target_extra_m / 1000.0 / 2.0;
        let candidate = self.pick_endpoint(rng, origin, radius_km);
        snap_to_road(routing, candidate).await
    }

    fn pick_endpoint<G: Rng>(&self, rng: &mut G, origin: GeoPoint, radius_km: f64) -> GeoPoint {
        let near = self
            .index
            .is_near(origin.lat, origin.lng, NEAR_SAFE_THRESHOLD_KM)
            .unwrap_or(false);

        if near {
            let step = TAU / DENSE_CANDIDATES as f64;
            let best = (0..DENSE_CANDIDATES)
                .map(|i| offset_point(origin, radius_km, i as f64 * step))
                .map(|p| (p, self.safety_score(p)))
                .filter(|(_, score)| score.is_finite())
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((point, score)) = best {
                tracing::debug!("dense endpoint search: score {score:.3}");
                return point;
            }
        }

        let step = TAU / SPARSE_CANDIDATES as f64;
        let jitter = SPARSE_JITTER_DEG.to_radians();
        let best = (0..SPARSE_CANDIDATES)
            .map(|i| {
                let bearing = i as f64 * step + rng.random_range(-jitter..=jitter);
                offset_point(origin, radius_km, bearing)
            })
            .map(|p| (p, self.safe_distance(p)))
            .filter(|(_, distance)| distance.is_finite())
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((point, distance)) = best {
            tracing::debug!("sparse endpoint search: nearest safe point {distance:.2}km");
            return point;
        }

        tracing::debug!("no scored endpoint candidate, using a random bearing");
        offset_point(origin, radius_km, rng.random_range(0.0..TAU))
    }

    /// Place `count` loop waypoints around `origin` for a loop of `target_total_m`.
    ///
    /// Six rings are tried, each rotated 60° from the previous one starting at a
    /// random base bearing, with points spaced evenly and independently
    /// jittered ±15 % in radius. The ring with the lowest summed safety score
    /// wins, the earliest one on ties. Every point is snapped on its own.
    pub async fn calculate_loop_waypoints<R, G>(
        &self,
        routing: &R,
        rng: &mut G,
        origin: GeoPoint,
        target_total_m: f64,
        count: usize,
    ) -> Vec<GeoPoint>
    where
        R: RoutingService,
        G: Rng + Send,
    {
        let ring = self.pick_ring(rng, origin, target_total_m, count);
        let mut snapped = Vec::with_capacity(ring.len());
        for point in ring {
            snapped.push(snap_to_road(routing, point).await);
        }
        snapped
    }

    fn pick_ring<G: Rng>(
        &self,
        rng: &mut G,
        origin: GeoPoint,
        target_total_m: f64,
        count: usize,
    ) -> Vec<GeoPoint> {
        if count == 0 {
            return Vec::new();
        }

        let radius_km = target_total_m / 1000.0 / (TAU * LOOP_DETOUR_FACTOR);
        let spacing = TAU / count as f64;
        let rotation = TAU / LOOP_ROTATIONS as f64;
        let base = rng.random_range(0.0..TAU);

        let mut best: Option<(Vec<GeoPoint>, f64)> = None;
        for r in 0..LOOP_ROTATIONS {
            let offset = base + r as f64 * rotation;
            let ring: Vec<GeoPoint> = (0..count)
                .map(|i| {
                    let jitter =
                        rng.random_range(1.0 - LOOP_RADIAL_JITTER..=1.0 + LOOP_RADIAL_JITTER);
                    offset_point(origin, radius_km * jitter, offset + i as f64 * spacing)
                })
                .collect();
            let score: f64 = ring.iter().map(|p| self.safety_score(*p)).sum();

            match &best {
                Some((_, best_score)) if score >= *best_score => {}
                _ => best = Some((ring, score)),
            }
        }

        let (ring, score) = best.unwrap_or_default();
        tracing::debug!(
            "loop ring: {} points at {:.2}km radius, score {score:.3}",
            ring.len(),
            radius_km
        );
        ring
    }
}

async fn snap_to_road<R: RoutingService>(routing: &R, point: GeoPoint) -> GeoPoint {
    match routing.nearest_road(point).await {
        Ok(snapped) => snapped,
        Err(err) => {
            tracing::warn!(
                "road snapping failed at ({:.5}, {:.5}), keeping raw point: {err}",
                point.lat,
                point.lng
            );
            point
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        geo::haversine_km,
        models::{RouteResult, SafeCategory, SafePoint},
        routing::{GeodesicRouter, Overview, RoutingError},
    };

    const CITY_HALL: GeoPoint = GeoPoint::new(37.5665, 126.9780);
    const BUSAN: GeoPoint = GeoPoint::new(35.1796, 129.0756);

    /// Router whose snapping always fails.
    #[derive(Default)]
    struct BrokenSnap {
        snaps: AtomicU32,
    }

    impl RoutingService for BrokenSnap {
        async fn route(
            &self,
            _points: &[GeoPoint],
            _overview: Overview,
        ) -> Result<RouteResult, RoutingError> {
            Err(RoutingError::NoRoute)
        }

        async fn nearest_road(&self, _point: GeoPoint) -> Result<GeoPoint, RoutingError> {
            self.snaps.fetch_add(1, Ordering::SeqCst);
            Err(RoutingError::Transport("connection refused".into()))
        }
    }

    /// Router that moves every snapped point by a fixed offset.
    struct ShiftingSnap;

    impl RoutingService for ShiftingSnap {
        async fn route(
            &self,
            _points: &[GeoPoint],
            _overview: Overview,
        ) -> Result<RouteResult, RoutingError> {
            Err(RoutingError::NoRoute)
        }

        async fn nearest_road(&self, point: GeoPoint) -> Result<GeoPoint, RoutingError> {
            Ok(GeoPoint::new(point.lat + 0.001, point.lng))
        }
    }

    fn calculator() -> PointCalculator {
        PointCalculator::new(SafePointIndex::builtin()).unwrap()
    }

    #[test]
    fn empty_catalogue_is_rejected() {
        let index = Arc::new(SafePointIndex::new(Vec::new()));
        assert_eq!(PointCalculator::new(index).unwrap_err(), EmptyInputError);
    }

    #[test]
    fn safety_score_weights_river_distance() {
        let calc = calculator();
        let index = calc.index();
        let p = GeoPoint::new(37.55, 127.0);
        let safe = index.nearest_safe_point(p.lat, p.lng).unwrap();
        let river = index.nearest_river_point(p.lat, p.lng).unwrap();
        assert!((calc.safety_score(p) - (0.7 * safe + 0.3 * river)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn snap_failure_returns_unsnapped_candidate() {
        let router = BrokenSnap::default();
        let mut rng = StdRng::seed_from_u64(7);
        let end = calculator()
            .calculate_endpoint(&router, &mut rng, CITY_HALL, 4000.0)
            .await;

        assert_eq!(router.snaps.load(Ordering::SeqCst), 1);
        assert!(end.lat.is_finite() && end.lng.is_finite());
        let distance = haversine_km(CITY_HALL, end);
        assert!((distance - 2.0).abs() < 0.1, "got {distance}km");
    }

    #[tokio::test]
    async fn endpoint_is_snapped_when_possible() {
        let calc = calculator();
        let raw = calc.pick_endpoint(&mut StdRng::seed_from_u64(1), CITY_HALL, 2.0);
        let snapped = calc
            .calculate_endpoint(&ShiftingSnap, &mut StdRng::seed_from_u64(1), CITY_HALL, 4000.0)
            .await;
        assert!((snapped.lat - (raw.lat + 0.001)).abs() < 1e-12);
        assert_eq!(snapped.lng, raw.lng);
    }

    #[test]
    fn dense_search_near_safe_points_is_deterministic() {
        let calc = calculator();
        assert!(calc.index().is_near(CITY_HALL.lat, CITY_HALL.lng, 3.0).unwrap());

        let a = calc.pick_endpoint(&mut StdRng::seed_from_u64(1), CITY_HALL, 2.0);
        let b = calc.pick_endpoint(&mut StdRng::seed_from_u64(99), CITY_HALL, 2.0);
        assert_eq!(a, b);

        let best_score = (0..24)
            .map(|i| offset_point(CITY_HALL, 2.0, (i as f64 * 15.0).to_radians()))
            .map(|p| calc.safety_score(p))
            .fold(f64::INFINITY, f64::min);
        assert_eq!(calc.safety_score(a), best_score);
    }

    #[test]
    fn sparse_search_far_from_catalogue() {
        let calc = calculator();
        assert!(!calc.index().is_near(BUSAN.lat, BUSAN.lng, 3.0).unwrap());

        let end = calc.pick_endpoint(&mut StdRng::seed_from_u64(3), BUSAN, 2.5);
        let distance = haversine_km(BUSAN, end);
        assert!((distance - 2.5).abs() < 0.1, "got {distance}km");
    }

    #[test]
    fn catalogue_without_river_falls_back_to_safe_distance() {
        let index = SafePointIndex::new(vec![SafePoint::new(
            "Lone Park",
            37.5700,
            126.9800,
            SafeCategory::Park,
        )]);
        let calc = PointCalculator::new(Arc::new(index)).unwrap();
        assert!(calc.safety_score(CITY_HALL).is_infinite());

        let end = calc.pick_endpoint(&mut StdRng::seed_from_u64(5), CITY_HALL, 1.0);
        assert!(end.lat.is_finite() && end.lng.is_finite());
        assert!((haversine_km(CITY_HALL, end) - 1.0).abs() < 0.05);
    }

    #[tokio::test]
    async fn loop_waypoints_respect_count_and_radius() {
        let calc = calculator();
        let target_m = 10_000.0;
        let radius_km = target_m / 1000.0 / (TAU * 1.3);

        for count in [3, 4] {
            let mut rng = StdRng::seed_from_u64(count as u64);
            let ring = calc
                .calculate_loop_waypoints(&GeodesicRouter::default(), &mut rng, CITY_HALL, target_m, count)
                .await;
            assert_eq!(ring.len(), count);
            for p in &ring {
                let d = haversine_km(CITY_HALL, *p);
                assert!(d >= radius_km * 0.84 && d <= radius_km * 1.16, "got {d}km");
            }
        }
    }

    #[tokio::test]
    async fn loop_waypoints_are_reproducible_per_seed() {
        let calc = calculator();
        let router = GeodesicRouter::default();
        let a = calc
            .calculate_loop_waypoints(&router, &mut StdRng::seed_from_u64(42), CITY_HALL, 6000.0, 3)
            .await;
        let b = calc
            .calculate_loop_waypoints(&router, &mut StdRng::seed_from_u64(42), CITY_HALL, 6000.0, 3)
            .await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn loop_snap_failures_are_per_point() {
        let router = BrokenSnap::default();
        let mut rng = StdRng::seed_from_u64(11);
        let ring = calculator()
            .calculate_loop_waypoints(&router, &mut rng, CITY_HALL, 8000.0, 4)
            .await;
        assert_eq!(ring.len(), 4);
        assert_eq!(router.snaps.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn zero_waypoints_is_empty() {
        let ring = calculator().pick_ring(&mut StdRng::seed_from_u64(0), CITY_HALL, 5000.0, 0);
        assert!(ring.is_empty());
    }
}
