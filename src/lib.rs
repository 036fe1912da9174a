// imports of other modules from this crate
mod errors;
pub use errors::SimError;

mod geometry;
pub use geometry::{haversine_distances, GeoPoint, EARTH_RADIUS_KM};

mod stations;
pub use stations::{bike_graph_from_csv, stations_from_csv, BikeTrips, Station,
                   StationNode, StationRegistry, TripMode};

mod geo_search;
pub use geo_search::GeoSearch;

mod sampling;
pub use sampling::{RandomPointSampler, SamplePoint};

mod departure;
pub use departure::{next_monday_from, upcoming_monday};

mod routing;
pub use routing::{quota_batch_sizes, GeometricRouter, MatrixApiClient,
                  RoutingService, TravelMode, BIKE_SPEED_KMH, METRO_SPEED_KMH,
                  WALK_SPEED_KMH};

mod virtual_station;
pub use virtual_station::VirtualStationResolver;

mod trip_sim;
pub use trip_sim::{RouteMatrix, TimeMatrix, TransitLegStrategy, TripSimulator};

mod config;
pub use config::SimConfig;

mod output;
pub use output::{write_route_matrix_json, write_sample_points_csv,
                 write_station_table_csv, write_time_matrix_csv};
