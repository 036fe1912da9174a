use std::collections::HashMap;
use std::collections::HashSet;
use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use petgraph::graph::DiGraph;
use petgraph::graph::UnGraph;

use super::errors::SimError;
use super::geometry::GeoPoint;


/// Which of the two station networks a trip travels on.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum TripMode {
    Bike,
    Subway,
}

impl FromStr for TripMode {
    type Err = SimError;

    fn from_str(ss: &str) -> Result<TripMode, SimError> {
        match ss {
            "bike" | "citibike" => Ok(TripMode::Bike),
            "subway" => Ok(TripMode::Subway),
            other => Err(SimError::InvalidMode(String::from(other))),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Station {
    pub name: String,
    pub position: GeoPoint,
}

impl Station {
    pub fn new(name: &str, lat_deg: f64, lon_deg: f64) -> Station {
        Station {
            name: String::from(name),
            position: GeoPoint::new(lat_deg, lon_deg),
        }
    }
}

/// Node weight of an input station graph.
#[derive(PartialEq, Debug, Clone)]
pub struct StationNode {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Edge weight of the directed bike trip graph.
#[derive(PartialEq, Debug, Clone)]
pub struct BikeTrips {
    pub trip_count: u32,
}

// A convenience type for parsing csv data
type Row = HashMap<String, String>;


pub struct StationRegistry {
    bike_stations: Vec<Station>,
    subway_stations: Vec<Station>,
    // names of the subway stations present in the loaded network, before any
    // synthetic insertions.  Membership here is what makes a station "real".
    original_subway_names: HashSet<String>,
}

impl StationRegistry {
    /// Build the registry from flat station tables.  Rows with non-finite or
    /// out-of-bounds coordinates are dropped, and duplicate names within a
    /// network collapse to the first record.  An empty table after filtering
    /// means a coordinate source couldn't be resolved, which is fatal.
    pub fn from_tables(bike_stations: Vec<Station>, subway_stations: Vec<Station>)
                       -> Result<StationRegistry, SimError> {
        let bike_stations = sanitize_table(bike_stations, "bike");
        let subway_stations = sanitize_table(subway_stations, "subway");
        if bike_stations.is_empty() {
            return Err(SimError::MissingCoordinateData(
                String::from("no bike stations with valid coordinates")));
        }
        if subway_stations.is_empty() {
            return Err(SimError::MissingCoordinateData(
                String::from("no subway stations with valid coordinates")));
        }

        let original_subway_names = subway_stations.iter().
            map(|station| station.name.clone()).collect();
        Ok(StationRegistry {
            bike_stations,
            subway_stations,
            original_subway_names,
        })
    }

    /// Build the registry from the two input graphs: the directed bike trip
    /// graph and the subway network graph.  Only node coordinate attributes
    /// are read; edges are the ETL stage's concern.
    pub fn from_graphs<E1, E2>(bike_graph: &DiGraph<StationNode, E1>,
                               subway_graph: &UnGraph<StationNode, E2>)
                               -> Result<StationRegistry, SimError> {
        let bike_stations = bike_graph.node_weights().
            map(|node| Station::new(&node.name, node.latitude, node.longitude)).collect();
        let subway_stations = subway_graph.node_weights().
            map(|node| Station::new(&node.name, node.latitude, node.longitude)).collect();
        StationRegistry::from_tables(bike_stations, subway_stations)
    }

    pub fn stations(&self, mode: TripMode) -> &Vec<Station> {
        match mode {
            TripMode::Bike => &self.bike_stations,
            TripMode::Subway => &self.subway_stations,
        }
    }

    pub fn bike_stations(&self) -> &Vec<Station> {
        &self.bike_stations
    }

    pub fn subway_stations(&self) -> &Vec<Station> {
        &self.subway_stations
    }

    /// Whether this name belongs to the originally loaded subway network, as
    /// opposed to a station inserted synthetically after loading.
    pub fn is_original_subway(&self, name: &str) -> bool {
        self.original_subway_names.contains(name)
    }

    /// Append a synthetic station to the subway table.  The name is *not*
    /// added to the original-names set, so the station is treated as virtual
    /// by the resolver.  Returns false without modifying anything if a
    /// station of that name already exists.  Callers must rebuild any
    /// GeoSearch built from this registry afterwards.
    pub fn insert_subway_station(&mut self, name: &str, position: GeoPoint) -> bool {
        if self.subway_stations.iter().any(|station| station.name == name) {
            return false;
        }
        log::info!("Inserting synthetic subway station {} at ({}, {})",
                   name, position.lat_deg, position.lon_deg);
        self.subway_stations.push(Station{name: String::from(name), position});
        return true;
    }
}

fn sanitize_table(stations: Vec<Station>, network: &str) -> Vec<Station> {
    let mut seen_names = HashSet::new();
    let mut kept = vec![];
    for station in stations {
        if ! station.position.is_sane() {
            log::warn!("Dropping {} station {} with bad coordinates ({}, {})",
                       network, station.name, station.position.lat_deg,
                       station.position.lon_deg);
            continue;
        }
        if ! seen_names.insert(station.name.clone()) {
            continue;
        }
        kept.push(station);
    }

    kept
}


/// Parse a station coordinate table from csv.  Expects columns station_name,
/// latitude, longitude; gtfs-style stop_name, stop_lat, stop_lon are accepted
/// as aliases.
pub fn stations_from_csv(csv_path: &Path) -> Result<Vec<Station>, Box<dyn Error>> {
    let file = File::open(csv_path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut stations = vec![];
    for result in reader.deserialize() {
        let row: Row = result?;
        let name = get_aliased(&row, "station_name", "stop_name").
            ok_or_else(|| missing_column(csv_path, "station_name"))?;
        let latitude = get_aliased(&row, "latitude", "stop_lat").
            ok_or_else(|| missing_column(csv_path, "latitude"))?;
        let longitude = get_aliased(&row, "longitude", "stop_lon").
            ok_or_else(|| missing_column(csv_path, "longitude"))?;
        stations.push(Station::new(&name, latitude.parse()?, longitude.parse()?));
    }

    Ok(stations)
}

/// Parse the directed bike trip graph from a node table and an edge list with
/// columns start_station, end_station, trip_count.
pub fn bike_graph_from_csv(nodes_path: &Path, edges_path: &Path)
                           -> Result<DiGraph<StationNode, BikeTrips>, Box<dyn Error>> {
    let mut graph = DiGraph::new();
    let mut idxs_by_name = HashMap::new();
    for station in stations_from_csv(nodes_path)? {
        let name = station.name.clone();
        let node = StationNode {
            name: station.name,
            latitude: station.position.lat_deg,
            longitude: station.position.lon_deg,
        };
        let idx = graph.add_node(node);
        idxs_by_name.entry(name).or_insert(idx);
    }

    let file = File::open(edges_path)?;
    let mut reader = csv::Reader::from_reader(file);
    for result in reader.deserialize() {
        let row: Row = result?;
        let start = row.get("start_station").
            ok_or_else(|| missing_column(edges_path, "start_station"))?;
        let end = row.get("end_station").
            ok_or_else(|| missing_column(edges_path, "end_station"))?;
        let trip_count: u32 = row.get("trip_count").
            ok_or_else(|| missing_column(edges_path, "trip_count"))?.parse()?;
        match (idxs_by_name.get(start), idxs_by_name.get(end)) {
            (Some(start_idx), Some(end_idx)) => {
                graph.add_edge(*start_idx, *end_idx, BikeTrips{trip_count});
            }
            _ => {
                log::warn!("Skipping trip edge between unknown stations ({}, {})",
                           start, end);
            }
        }
    }

    Ok(graph)
}

fn get_aliased(row: &Row, name: &str, alias: &str) -> Option<String> {
    row.get(name).or_else(|| row.get(alias)).map(|val| val.clone())
}

fn missing_column(path: &Path, column: &str) -> SimError {
    SimError::MissingCoordinateData(
        format!("{} has no {} column", path.display(), column))
}
