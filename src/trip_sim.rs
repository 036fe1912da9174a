use std::str::FromStr;

use chrono::NaiveDateTime;
use itertools::iproduct;
use ndarray::prelude::*;

use super::departure;
use super::errors::SimError;
use super::geo_search::GeoSearch;
use super::geometry::GeoPoint;
use super::routing::GeometricRouter;
use super::routing::RoutingService;
use super::routing::TravelMode;
use super::sampling::SamplePoint;
use super::stations::Station;
use super::stations::StationRegistry;
use super::stations::TripMode;
use super::virtual_station::VirtualStationResolver;

static DEFAULT_RESOLVE_RADIUS_KM: f64 = 5.0;
static DEFAULT_DEPARTURE_HOUR: u32 = 8;
static DEFAULT_DEPARTURE_MINUTE: u32 = 0;

/// Total durations in seconds; NaN marks an unresolved pair.
pub type TimeMatrix = Array<f64, Ix2>;
/// Waypoint lists paired index-for-index with the time matrix; an empty list
/// marks an unresolved pair.
pub type RouteMatrix = Array<Vec<GeoPoint>, Ix2>;

/// How subway transit legs are resolved.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TransitLegStrategy {
    /// Straight-line distance at metro speed.  The default: transit routing
    /// apis underrepresent underground topology, and this keeps the whole
    /// subway matrix to zero external calls.
    Geometric,
    /// One external transit-directions call per station pair, honoring the
    /// departure time.
    Directions,
}

impl FromStr for TransitLegStrategy {
    type Err = SimError;

    fn from_str(ss: &str) -> Result<TransitLegStrategy, SimError> {
        match ss {
            "geometric" => Ok(TransitLegStrategy::Geometric),
            "directions" => Ok(TransitLegStrategy::Directions),
            other => Err(SimError::InvalidMode(String::from(other))),
        }
    }
}


/// Composes walk -> transit -> walk journeys between sample points and
/// builds the full origin x destination duration and route matrices.
pub struct TripSimulator<'a> {
    registry: &'a StationRegistry,
    search: GeoSearch,
    router: Box<dyn RoutingService>,
    resolve_radius_km: f64,
    transit_strategy: TransitLegStrategy,
    departure_hour: u32,
    departure_minute: u32,
}

impl<'a> TripSimulator<'a> {
    pub fn new(registry: &'a StationRegistry, router: Box<dyn RoutingService>)
               -> TripSimulator<'a> {
        TripSimulator::with_settings(registry, router, DEFAULT_RESOLVE_RADIUS_KM,
                                     TransitLegStrategy::Geometric,
                                     DEFAULT_DEPARTURE_HOUR, DEFAULT_DEPARTURE_MINUTE)
    }

    pub fn with_settings(registry: &'a StationRegistry, router: Box<dyn RoutingService>,
                         resolve_radius_km: f64, transit_strategy: TransitLegStrategy,
                         departure_hour: u32, departure_minute: u32)
                         -> TripSimulator<'a> {
        TripSimulator {
            registry,
            search: GeoSearch::new(registry),
            router,
            resolve_radius_km,
            transit_strategy,
            departure_hour,
            departure_minute,
        }
    }

    /// Build the travel time and route matrices between all start and end
    /// points for one mode.  Unresolved pairs are NaN with an empty route;
    /// empty inputs give empty matrices.  When no departure time is given,
    /// trips are anchored to the next Monday at the configured hour.
    pub fn time_matrix(&self, starts: &[SamplePoint], ends: &[SamplePoint],
                       mode: TripMode, radius_km: f64,
                       departure: Option<NaiveDateTime>)
                       -> (TimeMatrix, RouteMatrix) {
        let num_starts = starts.len();
        let num_ends = ends.len();
        let mut time_matrix = Array::from_elem((num_starts, num_ends), f64::NAN);
        let mut route_matrix = Array::from_elem((num_starts, num_ends), vec![]);
        if num_starts == 0 || num_ends == 0 {
            return (time_matrix, route_matrix);
        }

        let departure = match departure {
            Some(dep) => dep,
            None => departure::upcoming_monday(self.departure_hour,
                                               self.departure_minute),
        };

        // resolve each point's station up front, widening the search radius
        // so border points still get a station instead of an empty row
        let resolve_radius_km = self.resolve_radius_km.max(radius_km);
        let src_stations = self.resolve_nearest_stations(starts, mode, resolve_radius_km);
        let dst_stations = self.resolve_nearest_stations(ends, mode, resolve_radius_km);

        let valid_src: Vec<usize> = (0..num_starts).
            filter(|ii| src_stations[*ii].is_some()).collect();
        let valid_dst: Vec<usize> = (0..num_ends).
            filter(|jj| dst_stations[*jj].is_some()).collect();
        if valid_src.is_empty() || valid_dst.is_empty() {
            log::warn!("No points could be matched to a station; \
                        the whole matrix is unresolved");
            return (time_matrix, route_matrix);
        }

        let start_coords: Vec<GeoPoint> = valid_src.iter().
            map(|ii| starts[*ii].position.clone()).collect();
        let end_coords: Vec<GeoPoint> = valid_dst.iter().
            map(|jj| ends[*jj].position.clone()).collect();
        let resolved_src: Vec<Station> = valid_src.iter().
            map(|ii| src_stations[*ii].as_ref().unwrap().0.clone()).collect();
        let resolved_dst: Vec<Station> = valid_dst.iter().
            map(|jj| dst_stations[*jj].as_ref().unwrap().0.clone()).collect();
        let src_station_coords: Vec<GeoPoint> = resolved_src.iter().
            map(|station| station.position.clone()).collect();
        let dst_station_coords: Vec<GeoPoint> = resolved_dst.iter().
            map(|station| station.position.clone()).collect();

        // legs 1 and 3: one batched walking call each.  The batch computes
        // all cross combinations, but only same-index pairs mean anything
        // (point ii walks to its own station), so only the diagonal is read.
        let walk_to = self.router.batch_durations(&start_coords, &src_station_coords,
                                                  TravelMode::Walking, Some(departure));
        let walk_from = self.router.batch_durations(&dst_station_coords, &end_coords,
                                                    TravelMode::Walking, Some(departure));

        match mode {
            TripMode::Bike => {
                // leg 2: one batched bicycling call between all station pairs
                let ride = self.router.batch_durations(
                    &src_station_coords, &dst_station_coords,
                    TravelMode::Bicycling, Some(departure));

                for (i_idx, j_idx) in iproduct!(0..valid_src.len(), 0..valid_dst.len()) {
                    let total = walk_to[[i_idx, i_idx]] + ride[[i_idx, j_idx]] +
                                walk_from[[j_idx, j_idx]];
                    // an unresolved leg is NaN and poisons the sum
                    if ! total.is_finite() {
                        continue;
                    }
                    let ii = valid_src[i_idx];
                    let jj = valid_dst[j_idx];
                    time_matrix[[ii, jj]] = total;
                    route_matrix[[ii, jj]] = vec![
                        starts[ii].position.clone(),
                        src_station_coords[i_idx].clone(),
                        dst_station_coords[j_idx].clone(),
                        ends[jj].position.clone(),
                    ];
                }
            }

            TripMode::Subway => {
                let resolver = VirtualStationResolver::new(self.registry, &self.search);
                for (i_idx, j_idx) in iproduct!(0..valid_src.len(), 0..valid_dst.len()) {
                    let walk1 = walk_to[[i_idx, i_idx]];
                    let walk2 = walk_from[[j_idx, j_idx]];
                    if ! walk1.is_finite() || ! walk2.is_finite() {
                        continue;
                    }

                    let src_station = &resolved_src[i_idx];
                    let dst_station = &resolved_dst[j_idx];
                    let (ride, via) = match self.subway_transit_leg(
                            &resolver, src_station, dst_station, departure) {
                        Some(leg) => leg,
                        None => continue,
                    };

                    let ii = valid_src[i_idx];
                    let jj = valid_dst[j_idx];
                    time_matrix[[ii, jj]] = walk1 + ride + walk2;
                    let mut route = vec![starts[ii].position.clone(),
                                         src_station.position.clone()];
                    if let Some(real_station) = &via {
                        route.push(real_station.position.clone());
                    }
                    route.push(dst_station.position.clone());
                    route.push(ends[jj].position.clone());
                    route_matrix[[ii, jj]] = route;
                }
            }
        }

        return (time_matrix, route_matrix);
    }

    /// The subway leg between two resolved stations.  When the origin
    /// station is virtual, the ride is re-rooted at the nearest genuine
    /// station and the gap is covered at metro speed; the returned station
    /// is the extra route waypoint.  None means the leg is unresolved.
    fn subway_transit_leg(&self, resolver: &VirtualStationResolver,
                          src_station: &Station, dst_station: &Station,
                          departure: NaiveDateTime)
                          -> Option<(f64, Option<Station>)> {
        if resolver.is_virtual(src_station) {
            let (real_station, gap_km) =
                resolver.nearest_real(src_station, self.resolve_radius_km)?;
            let gap_s = GeometricRouter::
                duration_for_distance(gap_km, TravelMode::Transit).ceil();
            let ride_s = self.transit_ride(&real_station.position,
                                           &dst_station.position, departure);
            Some((gap_s + ride_s, Some(real_station)))
        } else {
            let ride_s = self.transit_ride(&src_station.position,
                                           &dst_station.position, departure);
            Some((ride_s, None))
        }
    }

    fn transit_ride(&self, from: &GeoPoint, to: &GeoPoint,
                    departure: NaiveDateTime) -> f64 {
        let geometric = || {
            let dist_km = from.haversine_distance(to);
            GeometricRouter::duration_for_distance(dist_km, TravelMode::Transit).ceil()
        };

        match self.transit_strategy {
            TransitLegStrategy::Geometric => geometric(),
            TransitLegStrategy::Directions => {
                match self.router.leg_duration(from, to, TravelMode::Transit,
                                               Some(departure)) {
                    Some(ride_s) => ride_s,
                    None => {
                        log::warn!("Transit directions failed between ({}, {}) and \
                                    ({}, {}); falling back to the speed model",
                                   from.lat_deg, from.lon_deg, to.lat_deg, to.lon_deg);
                        geometric()
                    }
                }
            }
        }
    }

    fn resolve_nearest_stations(&self, points: &[SamplePoint], mode: TripMode,
                                radius_km: f64) -> Vec<Option<(Station, f64)>> {
        points.iter().map(|point| {
            let mut within = self.search.
                within_radius(&point.position, radius_km, mode);
            if ! within.is_empty() {
                return Some(within.remove(0));
            }

            // nothing in radius: take the nearest station overall, however
            // far.  Leaving the point unassigned would empty its whole
            // row/column.
            let nearest = self.search.nearest(&point.position, mode);
            match &nearest {
                Some((station, dist)) => {
                    log::info!("No {:?} station within {} km of point {}; \
                                using {} at {:.2} km",
                               mode, radius_km, point.point_id, station.name, dist);
                }
                None => {
                    log::warn!("No {:?} station found at all for point {}",
                               mode, point.point_id);
                }
            }
            nearest
        }).collect()
    }
}


#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use super::*;
    use super::super::routing::METRO_SPEED_KMH;
    use super::super::routing::WALK_SPEED_KMH;

    fn sample(point_id: usize, lat_deg: f64, lon_deg: f64) -> SamplePoint {
        SamplePoint {
            point_id,
            position: GeoPoint::new(lat_deg, lon_deg),
            distance_from_center_km: 0.0,
        }
    }

    fn test_registry() -> StationRegistry {
        let bikes = vec![
            Station::new("dock a", 40.700, -74.000),
            Station::new("dock b", 40.720, -73.980),
            Station::new("dock c", 40.740, -73.960),
        ];
        let subways = vec![
            Station::new("stop a", 40.701, -74.001),
            Station::new("stop b", 40.721, -73.981),
            Station::new("stop c", 40.741, -73.961),
        ];
        StationRegistry::from_tables(bikes, subways).unwrap()
    }

    fn test_points() -> (Vec<SamplePoint>, Vec<SamplePoint>) {
        let starts = vec![
            sample(1, 40.702, -74.002),
            sample(2, 40.719, -73.979),
            sample(3, 40.742, -73.963),
        ];
        let ends = vec![
            sample(1, 40.703, -73.998),
            sample(2, 40.722, -73.983),
            sample(3, 40.738, -73.958),
        ];
        (starts, ends)
    }

    /// A router whose every element is unresolved, like an external service
    /// that always answers status != OK.
    struct FailingRouter;

    impl RoutingService for FailingRouter {
        fn leg_duration(&self, _origin: &GeoPoint, _destination: &GeoPoint,
                        _mode: TravelMode, _departure: Option<NaiveDateTime>)
                        -> Option<f64> {
            None
        }

        fn batch_durations(&self, origins: &[GeoPoint], destinations: &[GeoPoint],
                           _mode: TravelMode, _departure: Option<NaiveDateTime>)
                           -> Array<f64, Ix2> {
            Array::from_elem((origins.len(), destinations.len()), f64::NAN)
        }
    }

    fn walk_seconds(from: &GeoPoint, to: &GeoPoint) -> f64 {
        from.haversine_distance(to) / WALK_SPEED_KMH * 3600.0
    }

    #[test]
    fn test_bike_matrix_fully_resolved() {
        let registry = test_registry();
        let sim = TripSimulator::new(&registry, Box::new(GeometricRouter));
        let (starts, ends) = test_points();

        let (times, routes) = sim.time_matrix(&starts, &ends, TripMode::Bike,
                                              1.0, None);
        assert_eq!(times.shape(), &[3, 3]);
        assert_eq!(routes.shape(), &[3, 3]);
        for (ii, jj) in iproduct!(0..3, 0..3) {
            assert!(times[[ii, jj]].is_finite(),
                    "cell ({}, {}) should be resolved", ii, jj);
            assert!(times[[ii, jj]] > 0.0);
            // a bike journey has exactly four waypoints
            assert_eq!(routes[[ii, jj]].len(), 4);
            assert_eq!(routes[[ii, jj]][0], starts[ii].position);
            assert_eq!(routes[[ii, jj]][3], ends[jj].position);
        }
    }

    #[test]
    fn test_bike_totals_use_leg_diagonals() {
        let registry = test_registry();
        let sim = TripSimulator::new(&registry, Box::new(GeometricRouter));
        let (starts, ends) = test_points();

        let (times, routes) = sim.time_matrix(&starts, &ends, TripMode::Bike,
                                              1.0, None);
        for (ii, jj) in iproduct!(0..3, 0..3) {
            let route = &routes[[ii, jj]];
            let src_station = &route[1];
            let dst_station = &route[2];
            // walk legs are each point's walk to its *own* station
            let expected = walk_seconds(&starts[ii].position, src_station) +
                src_station.haversine_distance(dst_station) / 18.0 * 3600.0 +
                walk_seconds(dst_station, &ends[jj].position);
            assert_relative_eq!(times[[ii, jj]], expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_subway_matrix_and_route_invariant() {
        let registry = test_registry();
        let sim = TripSimulator::new(&registry, Box::new(GeometricRouter));
        let (starts, ends) = test_points();

        let (times, routes) = sim.time_matrix(&starts, &ends, TripMode::Subway,
                                              1.0, None);
        for (ii, jj) in iproduct!(0..3, 0..3) {
            // routes and times are resolved or unresolved together
            assert_eq!(times[[ii, jj]].is_finite(), ! routes[[ii, jj]].is_empty());
            assert!(times[[ii, jj]].is_finite());
            // no virtual stations here, so journeys have four waypoints
            assert_eq!(routes[[ii, jj]].len(), 4);
        }
    }

    #[test]
    fn test_virtual_station_detour() {
        let mut registry = test_registry();
        // a border point far northeast of every real stop, registered as a
        // synthetic subway station at its own position
        let border = GeoPoint::new(40.800, -73.900);
        assert!(registry.insert_subway_station("border point", border.clone()));
        let sim = TripSimulator::new(&registry, Box::new(GeometricRouter));

        let starts = vec![sample(1, 40.800, -73.900)];
        let ends = vec![sample(1, 40.703, -73.998)];
        let (times, routes) = sim.time_matrix(&starts, &ends, TripMode::Subway,
                                              1.0, None);

        let route = &routes[[0, 0]];
        // the detour through the nearest genuine station is explicit
        assert_eq!(route.len(), 5);
        assert_eq!(route[1], border);
        let real = &route[2];
        let dst_station = &route[3];
        assert_eq!(real, &registry.subway_stations()[2].position); // stop c

        let gap_s = (border.haversine_distance(real) / METRO_SPEED_KMH * 3600.0).ceil();
        let ride_s = (real.haversine_distance(dst_station) / METRO_SPEED_KMH
                      * 3600.0).ceil();
        let expected = walk_seconds(&starts[0].position, &border) + gap_s + ride_s +
                       walk_seconds(dst_station, &ends[0].position);
        assert_relative_eq!(times[[0, 0]], expected, epsilon = 1e-9);
    }

    #[test]
    fn test_failing_service_leaves_bike_unresolved() {
        let registry = test_registry();
        let sim = TripSimulator::new(&registry, Box::new(FailingRouter));
        let (starts, ends) = test_points();

        let (times, routes) = sim.time_matrix(&starts, &ends, TripMode::Bike,
                                              1.0, None);
        for (ii, jj) in iproduct!(0..3, 0..3) {
            assert!(times[[ii, jj]].is_nan());
            assert!(routes[[ii, jj]].is_empty());
        }

        // with the geometric fallback injected instead, subway cells resolve
        // to speed-model values
        let sim = TripSimulator::new(&registry, Box::new(GeometricRouter));
        let (times, _) = sim.time_matrix(&starts, &ends, TripMode::Subway, 1.0, None);
        assert!(times.iter().all(|tt| tt.is_finite()));
    }

    #[test]
    fn test_directions_strategy_falls_back_per_leg() {
        // batches succeed (geometric walks), but per-pair directions fail:
        // the transit leg must degrade to the speed model, not the cell
        struct WalkOnlyRouter;
        impl RoutingService for WalkOnlyRouter {
            fn leg_duration(&self, _origin: &GeoPoint, _destination: &GeoPoint,
                            _mode: TravelMode, _departure: Option<NaiveDateTime>)
                            -> Option<f64> {
                None
            }

            fn batch_durations(&self, origins: &[GeoPoint], destinations: &[GeoPoint],
                               mode: TravelMode, departure: Option<NaiveDateTime>)
                               -> Array<f64, Ix2> {
                GeometricRouter.batch_durations(origins, destinations, mode, departure)
            }
        }

        let registry = test_registry();
        let sim = TripSimulator::with_settings(
            &registry, Box::new(WalkOnlyRouter), 5.0,
            TransitLegStrategy::Directions, 8, 0);
        let (starts, ends) = test_points();

        let (times, routes) = sim.time_matrix(&starts, &ends, TripMode::Subway,
                                              1.0, None);
        for (ii, jj) in iproduct!(0..3, 0..3) {
            assert!(times[[ii, jj]].is_finite());
            let route = &routes[[ii, jj]];
            let expected_ride = (route[1].haversine_distance(&route[2])
                                 / METRO_SPEED_KMH * 3600.0).ceil();
            let expected = walk_seconds(&starts[ii].position, &route[1]) +
                           expected_ride +
                           walk_seconds(&route[2], &ends[jj].position);
            assert_relative_eq!(times[[ii, jj]], expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_empty_inputs_give_empty_matrices() {
        let registry = test_registry();
        let sim = TripSimulator::new(&registry, Box::new(GeometricRouter));
        let (starts, _) = test_points();

        let (times, routes) = sim.time_matrix(&[], &[], TripMode::Bike, 1.0, None);
        assert_eq!(times.shape(), &[0, 0]);
        assert_eq!(routes.shape(), &[0, 0]);

        let (times, routes) = sim.time_matrix(&starts, &[], TripMode::Subway,
                                              1.0, None);
        assert_eq!(times.shape(), &[3, 0]);
        assert_eq!(routes.shape(), &[3, 0]);
    }

    #[test]
    fn test_transit_strategy_parsing() {
        assert_eq!("geometric".parse::<TransitLegStrategy>().unwrap(),
                   TransitLegStrategy::Geometric);
        assert_eq!("directions".parse::<TransitLegStrategy>().unwrap(),
                   TransitLegStrategy::Directions);
        assert!("teleport".parse::<TransitLegStrategy>().is_err());
    }
}
