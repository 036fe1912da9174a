use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;
use yaml_rust::YamlLoader;

use super::geometry::GeoPoint;
use super::routing::DEFAULT_MAX_ELEMENTS;
use super::trip_sim::TransitLegStrategy;

static DEFAULT_API_BASE_URL: &str = "https://maps.googleapis.com/maps/api";


pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}


/// Everything one simulation run needs, read from a yaml file once at
/// startup.  Dataset paths are resolved relative to the config file's own
/// directory.
pub struct SimConfig {
    pub bike_nodes_path: PathBuf,
    pub bike_edges_path: PathBuf,
    pub subway_coords_path: PathBuf,
    pub center: GeoPoint,
    pub sample_radius_km: f64,
    pub num_points: usize,
    pub station_radius_km: f64,
    pub resolve_radius_km: f64,
    pub seed: u64,
    pub departure_hour: u32,
    pub departure_minute: u32,
    pub transit_strategy: TransitLegStrategy,
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub max_elements: usize,
    pub output_dir: PathBuf,
}

impl SimConfig {
    pub fn from_file(config_path_str: &str) -> SimConfig {
        let config_path = PathBuf::from(config_path_str);
        let file_contents = std::fs::read_to_string(&config_path).
            expect("Failed to read simulator config file!");
        let yaml_cfg = YamlLoader::load_from_str(&file_contents).
            expect("Failed to parse sim config as yaml!");
        let base_dir = config_path.parent().unwrap_or(Path::new("."));
        SimConfig::from_yaml(&yaml_cfg[0], base_dir)
    }

    pub fn from_yaml(yaml_cfg: &Yaml, base_dir: &Path) -> SimConfig {
        let dataset_cfg = &yaml_cfg["dataset"];
        let dataset_path = |key: &str| {
            let path_str = dataset_cfg[key].as_str().
                unwrap_or_else(|| panic!("no {} in dataset config", key));
            str_to_absolute_path(path_str, base_dir)
        };
        let bike_nodes_path = dataset_path("bike_nodes_path");
        let bike_edges_path = dataset_path("bike_edges_path");
        let subway_coords_path = dataset_path("subway_coords_path");

        let sim_cfg = &yaml_cfg["simulation"];
        let center_cfg = sim_cfg["center"].as_vec().expect("no center in sim config");
        let center = GeoPoint::new(
            yaml_f64(&center_cfg[0]).expect("bad center latitude"),
            yaml_f64(&center_cfg[1]).expect("bad center longitude"),
        );
        let sample_radius_km = yaml_f64(&sim_cfg["sample_radius_km"]).
            expect("no sample_radius_km in sim config");
        let num_points = sim_cfg["num_points"].as_i64().
            expect("no num_points in sim config") as usize;
        let station_radius_km = yaml_f64(&sim_cfg["station_radius_km"]).unwrap_or(1.0);
        let resolve_radius_km = yaml_f64(&sim_cfg["resolve_radius_km"]).unwrap_or(5.0);
        let seed = sim_cfg["seed"].as_i64().unwrap_or(100) as u64;
        let departure_hour = sim_cfg["departure_hour"].as_i64().unwrap_or(8) as u32;
        let departure_minute = sim_cfg["departure_minute"].as_i64().unwrap_or(0) as u32;
        assert!(departure_hour < 24 && departure_minute < 60,
                "departure time {}:{} is out of range", departure_hour, departure_minute);
        let transit_strategy = match sim_cfg["transit_legs"].as_str() {
            Some(ss) => ss.parse().expect("bad transit_legs in sim config"),
            None => TransitLegStrategy::Geometric,
        };

        let routing_cfg = &yaml_cfg["routing"];
        let api_base_url = match routing_cfg["api_base_url"].as_str() {
            Some(url) => String::from(url),
            None => String::from(DEFAULT_API_BASE_URL),
        };
        let api_key = routing_cfg["api_key"].as_str().map(String::from);
        let max_elements = match routing_cfg["max_elements"].as_i64() {
            Some(quota) => quota as usize,
            None => DEFAULT_MAX_ELEMENTS,
        };

        let output_dir = match yaml_cfg["output_dir"].as_str() {
            Some(dir) => str_to_absolute_path(dir, base_dir),
            None => PathBuf::from(base_dir),
        };

        SimConfig {
            bike_nodes_path,
            bike_edges_path,
            subway_coords_path,
            center,
            sample_radius_km,
            num_points,
            station_radius_km,
            resolve_radius_km,
            seed,
            departure_hour,
            departure_minute,
            transit_strategy,
            api_base_url,
            api_key,
            max_elements,
            output_dir,
        }
    }
}

// yaml numbers may parse as integers or reals depending on how they're written
fn yaml_f64(value: &Yaml) -> Option<f64> {
    match value.as_f64() {
        Some(val) => Some(val),
        None => value.as_i64().map(|val| val as f64),
    }
}
