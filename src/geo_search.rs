use kdtree::distance::squared_euclidean;
use kdtree::KdTree;

use super::geometry::GeoPoint;
use super::geometry::EARTH_RADIUS_KM;
use super::stations::Station;
use super::stations::StationRegistry;
use super::stations::TripMode;

// padding on the indexed radius query, to cover the distortion of the flat
// projection relative to exact great-circle distances.
static RADIUS_PAD_FACTOR: f64 = 1.05;

/// Spatial index over one station table.  The kd-tree holds positions in a
/// local equirectangular projection scaled to kilometers; query results are
/// always refined with exact haversine distances, so the projection only
/// affects speed, not answers.
struct StationIndex {
    stations: Vec<Station>,
    tree: KdTree<f64, usize, [f64; 2]>,
    lon_scale: f64,
}

fn project(point: &GeoPoint, lon_scale: f64) -> [f64; 2] {
    let km_per_deg = EARTH_RADIUS_KM.to_radians();
    [point.lat_deg * km_per_deg, point.lon_deg * km_per_deg * lon_scale]
}

impl StationIndex {
    fn build(stations: &Vec<Station>) -> StationIndex {
        let mean_lat: f64 = match stations.len() {
            0 => 0.0,
            count => stations.iter().map(|ss| ss.position.lat_deg).sum::<f64>()
                     / count as f64,
        };
        let lon_scale = mean_lat.to_radians().cos();

        let mut tree = KdTree::new(2);
        for (ii, station) in stations.iter().enumerate() {
            // registry sanitization guarantees finite coordinates
            tree.add(project(&station.position, lon_scale), ii).unwrap();
        }

        StationIndex{stations: stations.clone(), tree, lon_scale}
    }

    fn within_radius(&self, center: &GeoPoint, radius_km: f64) -> Vec<(Station, f64)> {
        let padded = radius_km * RADIUS_PAD_FACTOR;
        let candidates = self.tree.
            within(&project(center, self.lon_scale), padded * padded,
                   &squared_euclidean).unwrap();

        let mut found: Vec<(Station, f64)> = candidates.iter().
            map(|(_, idx)| {
                let station = &self.stations[**idx];
                (station.clone(), center.haversine_distance(&station.position))
            }).
            filter(|(_, dist)| *dist <= radius_km).
            collect();
        found.sort_by(|aa, bb| aa.1.partial_cmp(&bb.1).unwrap());
        found
    }

    fn nearest(&self, center: &GeoPoint) -> Option<(Station, f64)> {
        // a full scan keeps the unbounded search exact regardless of
        // projection distortion
        let mut best: Option<(Station, f64)> = None;
        for station in &self.stations {
            let dist = center.haversine_distance(&station.position);
            match &best {
                Some((_, best_dist)) if *best_dist <= dist => (),
                _ => best = Some((station.clone(), dist)),
            }
        }

        best
    }
}


pub struct GeoSearch {
    bike_index: StationIndex,
    subway_index: StationIndex,
}

impl GeoSearch {
    pub fn new(registry: &StationRegistry) -> GeoSearch {
        GeoSearch {
            bike_index: StationIndex::build(registry.bike_stations()),
            subway_index: StationIndex::build(registry.subway_stations()),
        }
    }

    fn index(&self, mode: TripMode) -> &StationIndex {
        match mode {
            TripMode::Bike => &self.bike_index,
            TripMode::Subway => &self.subway_index,
        }
    }

    /// All stations of the given network within radius_km of center, sorted
    /// ascending by great-circle distance.  Empty when none are in range;
    /// never an error.
    pub fn within_radius(&self, center: &GeoPoint, radius_km: f64, mode: TripMode)
                         -> Vec<(Station, f64)> {
        self.index(mode).within_radius(center, radius_km)
    }

    /// The nearest station of the given network, at any distance.  None only
    /// when the station table is empty.
    pub fn nearest(&self, center: &GeoPoint, mode: TripMode) -> Option<(Station, f64)> {
        self.index(mode).nearest(center)
    }
}
