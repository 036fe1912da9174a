use std::cmp::max;
use std::cmp::min;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use itertools::Itertools;
use ndarray::prelude::*;
use serde::Deserialize;

use super::errors::SimError;
use super::geometry::haversine_distances;
use super::geometry::GeoPoint;

pub static WALK_SPEED_KMH: f64 = 5.0;
pub static BIKE_SPEED_KMH: f64 = 18.0;
pub static METRO_SPEED_KMH: f64 = 28.0;

// the routing api caps origins and destinations at 25 each per request
static API_AXIS_LIMIT: usize = 25;
static API_CALL_TIMEOUT_S: u64 = 30;
pub static DEFAULT_MAX_ELEMENTS: usize = 100;


/// One mode-homogeneous travel leg's means of movement.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum TravelMode {
    Walking,
    Bicycling,
    Transit,
}

impl TravelMode {
    pub fn speed_kmh(&self) -> f64 {
        match self {
            TravelMode::Walking => WALK_SPEED_KMH,
            TravelMode::Bicycling => BIKE_SPEED_KMH,
            TravelMode::Transit => METRO_SPEED_KMH,
        }
    }

    /// The mode name used on the wire by the routing api.
    pub fn api_name(&self) -> &'static str {
        match self {
            TravelMode::Walking => "walking",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Transit => "transit",
        }
    }
}

impl FromStr for TravelMode {
    type Err = SimError;

    fn from_str(ss: &str) -> Result<TravelMode, SimError> {
        match ss {
            "walking" => Ok(TravelMode::Walking),
            "bicycling" => Ok(TravelMode::Bicycling),
            "transit" => Ok(TravelMode::Transit),
            other => Err(SimError::InvalidMode(String::from(other))),
        }
    }
}


/// Resolves travel durations for single legs and for whole origin x
/// destination batches.  Unresolved legs are None (single) or NaN (batch);
/// implementations never fail a whole batch for one bad element.
pub trait RoutingService {
    fn leg_duration(&self, origin: &GeoPoint, destination: &GeoPoint, mode: TravelMode,
                    departure: Option<NaiveDateTime>) -> Option<f64>;

    fn batch_durations(&self, origins: &[GeoPoint], destinations: &[GeoPoint],
                       mode: TravelMode, departure: Option<NaiveDateTime>)
                       -> Array<f64, Ix2>;
}


/// Speed-model fallback: every leg is the great-circle distance at a fixed
/// speed for the mode.  Used when no external service is available, and as
/// the stand-in for subway legs, which routing apis underestimate anyway.
pub struct GeometricRouter;

impl GeometricRouter {
    pub fn duration_for_distance(distance_km: f64, mode: TravelMode) -> f64 {
        return distance_km / mode.speed_kmh() * 3600.0;
    }
}

impl RoutingService for GeometricRouter {
    fn leg_duration(&self, origin: &GeoPoint, destination: &GeoPoint, mode: TravelMode,
                    _departure: Option<NaiveDateTime>) -> Option<f64> {
        let distance_km = origin.haversine_distance(destination);
        Some(GeometricRouter::duration_for_distance(distance_km, mode))
    }

    fn batch_durations(&self, origins: &[GeoPoint], destinations: &[GeoPoint],
                       mode: TravelMode, _departure: Option<NaiveDateTime>)
                       -> Array<f64, Ix2> {
        let mut durations = haversine_distances(&origins.to_vec(),
                                                Some(&destinations.to_vec()));
        let speed_kmh = mode.speed_kmh();
        durations.mapv_inplace(|dist_km| dist_km / speed_kmh * 3600.0);
        return durations;
    }
}


// wire format of the external routing service

#[derive(Deserialize, Debug, PartialEq)]
struct MatrixResponse {
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Deserialize, Debug, PartialEq)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Deserialize, Debug, PartialEq)]
struct MatrixElement {
    status: String,
    duration: Option<LegDuration>,
}

#[derive(Deserialize, Debug, PartialEq)]
struct LegDuration {
    value: f64,
}

#[derive(Deserialize, Debug)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize, Debug)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
}

#[derive(Deserialize, Debug)]
struct DirectionsLeg {
    duration: LegDuration,
}


/// Batch sizes honoring the per-call element quota: origins x destinations
/// per sub-request never exceeds max_elements.
pub fn quota_batch_sizes(max_elements: usize) -> (usize, usize) {
    let max_origins = max(1, min(API_AXIS_LIMIT, (max_elements as f64).sqrt() as usize));
    let max_dests = max(1, min(API_AXIS_LIMIT, max_elements / max_origins));
    return (max_origins, max_dests);
}

/// Copy one sub-batch response into the right block of the full matrix.
/// Elements with a non-OK status leave their cell unresolved; they never
/// abort the rest of the block.
fn write_matrix_block(matrix: &mut Array<f64, Ix2>, response: &MatrixResponse,
                      row_offset: usize, col_offset: usize) {
    for (oi, row) in response.rows.iter().enumerate() {
        if row_offset + oi >= matrix.nrows() {
            log::warn!("Response has more rows than requested; ignoring extras");
            break;
        }
        for (di, element) in row.elements.iter().enumerate() {
            if col_offset + di >= matrix.ncols() {
                log::warn!("Response row has more elements than requested; ignoring extras");
                break;
            }
            match (&element.status[..], &element.duration) {
                ("OK", Some(duration)) => {
                    matrix[[row_offset + oi, col_offset + di]] = duration.value;
                }
                _ => {
                    log::warn!("No route found for origin {} to dest {}",
                               row_offset + oi, col_offset + di);
                }
            }
        }
    }
}

fn coords_param(points: &[GeoPoint]) -> String {
    points.iter().map(|pp| format!("{},{}", pp.lat_deg, pp.lon_deg)).join("|")
}


/// Client for an external distance-matrix/directions routing api.  Splits
/// batch requests to honor the element quota and degrades per element or per
/// sub-block on failure, so one bad request never empties a whole matrix.
pub struct MatrixApiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    max_elements: usize,
}

impl MatrixApiClient {
    pub fn new(base_url: &str, api_key: &str) -> MatrixApiClient {
        MatrixApiClient::with_quota(base_url, api_key, DEFAULT_MAX_ELEMENTS)
    }

    pub fn with_quota(base_url: &str, api_key: &str, max_elements: usize)
                      -> MatrixApiClient {
        let client = reqwest::blocking::Client::builder().
            timeout(Duration::from_secs(API_CALL_TIMEOUT_S)).
            build().
            expect("Failed to build http client!");
        MatrixApiClient {
            client,
            base_url: String::from(base_url.trim_end_matches('/')),
            api_key: String::from(api_key),
            max_elements,
        }
    }

    fn base_query(&self, mode: TravelMode, departure: Option<NaiveDateTime>)
                  -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("mode", String::from(mode.api_name())),
            ("key", self.api_key.clone()),
        ];
        if mode == TravelMode::Transit {
            query.push(("transit_mode", String::from("subway")));
        }
        if let Some(dep) = departure {
            query.push(("departure_time", format!("{}", dep.and_utc().timestamp())));
        }
        query
    }

    fn request_matrix(&self, origins: &[GeoPoint], destinations: &[GeoPoint],
                      mode: TravelMode, departure: Option<NaiveDateTime>)
                      -> Result<MatrixResponse, reqwest::Error> {
        let url = format!("{}/distancematrix/json", self.base_url);
        let mut query = self.base_query(mode, departure);
        query.push(("origins", coords_param(origins)));
        query.push(("destinations", coords_param(destinations)));
        let response = self.client.get(&url).query(&query).send()?.
            error_for_status()?;
        return response.json();
    }

    fn request_directions(&self, origin: &GeoPoint, destination: &GeoPoint,
                          mode: TravelMode, departure: Option<NaiveDateTime>)
                          -> Result<DirectionsResponse, reqwest::Error> {
        let url = format!("{}/directions/json", self.base_url);
        let mut query = self.base_query(mode, departure);
        query.push(("origin", coords_param(std::slice::from_ref(origin))));
        query.push(("destination", coords_param(std::slice::from_ref(destination))));
        let response = self.client.get(&url).query(&query).send()?.
            error_for_status()?;
        return response.json();
    }
}

impl RoutingService for MatrixApiClient {
    fn leg_duration(&self, origin: &GeoPoint, destination: &GeoPoint, mode: TravelMode,
                    departure: Option<NaiveDateTime>) -> Option<f64> {
        match self.request_directions(origin, destination, mode, departure) {
            Ok(response) => {
                // the journey duration is carried on the first leg of the
                // first returned route
                let duration = response.routes.get(0).
                    and_then(|route| route.legs.get(0)).
                    map(|leg| leg.duration.value);
                if duration.is_none() {
                    log::warn!("No {} route found between ({}, {}) and ({}, {})",
                               mode.api_name(), origin.lat_deg, origin.lon_deg,
                               destination.lat_deg, destination.lon_deg);
                }
                duration
            }
            Err(err) => {
                log::warn!("Directions call failed: {}", err);
                None
            }
        }
    }

    fn batch_durations(&self, origins: &[GeoPoint], destinations: &[GeoPoint],
                       mode: TravelMode, departure: Option<NaiveDateTime>)
                       -> Array<f64, Ix2> {
        let num_origins = origins.len();
        let num_dests = destinations.len();
        let mut time_matrix = Array::from_elem((num_origins, num_dests), f64::NAN);
        let (max_origins, max_dests) = quota_batch_sizes(self.max_elements);

        let mut ii = 0;
        while ii < num_origins {
            let batch_origins = &origins[ii..min(ii + max_origins, num_origins)];
            let mut jj = 0;
            while jj < num_dests {
                let batch_dests = &destinations[jj..min(jj + max_dests, num_dests)];
                match self.request_matrix(batch_origins, batch_dests, mode, departure) {
                    Ok(response) => {
                        write_matrix_block(&mut time_matrix, &response, ii, jj);
                    }
                    Err(err) => {
                        // leave this sub-block unresolved and move on to the
                        // remaining sub-batches
                        log::warn!("Matrix call failed for origins {}..{}, dests {}..{}: {}",
                                   ii, ii + batch_origins.len(), jj,
                                   jj + batch_dests.len(), err);
                    }
                }
                jj += max_dests;
            }
            ii += max_origins;
        }

        return time_matrix;
    }
}
