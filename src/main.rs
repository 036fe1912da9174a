use rust_bike_subway_sim::{
    bike_graph_from_csv, stations_from_csv, write_route_matrix_json,
    write_sample_points_csv, write_station_table_csv, write_time_matrix_csv,
    GeometricRouter, MatrixApiClient, RandomPointSampler, RoutingService,
    SimConfig, Station, StationRegistry, TimeMatrix, TripMode, TripSimulator,
};
use env_logger;


fn mean_minutes(matrix: &TimeMatrix) -> Option<f64> {
    let resolved: Vec<f64> = matrix.iter().filter(|tt| tt.is_finite()).
        map(|tt| *tt).collect();
    if resolved.is_empty() {
        return None;
    }
    Some(resolved.iter().sum::<f64>() / resolved.len() as f64 / 60.0)
}

fn main() {
    env_logger::init();
    let cfg_path = std::env::args().nth(1).
        unwrap_or_else(|| String::from("sim_cfg.yaml"));
    let cfg = SimConfig::from_file(&cfg_path);

    // load the two station networks
    let bike_graph = bike_graph_from_csv(&cfg.bike_nodes_path, &cfg.bike_edges_path).
        expect("Failed to load bike trip graph!");
    let bike_stations: Vec<Station> = bike_graph.node_weights().
        map(|node| Station::new(&node.name, node.latitude, node.longitude)).collect();
    let subway_stations = stations_from_csv(&cfg.subway_coords_path).
        expect("Failed to load subway coordinate table!");
    let registry = StationRegistry::from_tables(bike_stations, subway_stations).
        expect("Failed to build station registry!");
    log::info!("Loaded {} bike and {} subway stations",
               registry.bike_stations().len(), registry.subway_stations().len());

    // draw the trip endpoints
    let mut sampler = RandomPointSampler::new(cfg.seed);
    let start_points = sampler.sample(&cfg.center, cfg.sample_radius_km,
                                      cfg.num_points);
    let end_points = sampler.sample(&cfg.center, cfg.sample_radius_km,
                                    cfg.num_points);

    let router: Box<dyn RoutingService> = match &cfg.api_key {
        Some(key) => Box::new(MatrixApiClient::with_quota(&cfg.api_base_url, key,
                                                          cfg.max_elements)),
        None => {
            log::info!("No routing api key configured; using the speed model");
            Box::new(GeometricRouter)
        }
    };
    let sim = TripSimulator::with_settings(&registry, router, cfg.resolve_radius_km,
                                           cfg.transit_strategy, cfg.departure_hour,
                                           cfg.departure_minute);

    println!("Simulating travel for {} start/end pairs...", cfg.num_points);
    let (bike_times, bike_routes) = sim.time_matrix(
        &start_points, &end_points, TripMode::Bike, cfg.station_radius_km, None);
    let (subway_times, subway_routes) = sim.time_matrix(
        &start_points, &end_points, TripMode::Subway, cfg.station_radius_km, None);

    // write everything the rendering side needs
    std::fs::create_dir_all(&cfg.output_dir).expect("Failed to create output dir!");
    let out = |name: &str| cfg.output_dir.join(name);
    write_time_matrix_csv(&out("bike_times.csv"), &bike_times).unwrap();
    write_time_matrix_csv(&out("subway_times.csv"), &subway_times).unwrap();
    write_route_matrix_json(&out("bike_routes.json"), &bike_routes).unwrap();
    write_route_matrix_json(&out("subway_routes.json"), &subway_routes).unwrap();
    write_station_table_csv(&out("bike_stations.csv"), registry.bike_stations()).
        unwrap();
    write_station_table_csv(&out("subway_stations.csv"),
                            registry.subway_stations()).unwrap();
    write_sample_points_csv(&out("start_points.csv"), &start_points).unwrap();
    write_sample_points_csv(&out("end_points.csv"), &end_points).unwrap();

    // summary comparison over pairs both modes resolved
    match mean_minutes(&bike_times) {
        Some(avg) => println!("Average bike travel time: {:.2} minutes", avg),
        None => println!("No bike journeys were resolved"),
    }
    match mean_minutes(&subway_times) {
        Some(avg) => println!("Average subway travel time: {:.2} minutes", avg),
        None => println!("No subway journeys were resolved"),
    }

    let mut bike_faster = 0;
    let mut subway_faster = 0;
    for (bike_tt, subway_tt) in bike_times.iter().zip(subway_times.iter()) {
        if ! bike_tt.is_finite() || ! subway_tt.is_finite() {
            continue;
        }
        if bike_tt < subway_tt {
            bike_faster += 1;
        } else if subway_tt < bike_tt {
            subway_faster += 1;
        }
    }
    println!("Bike faster on {} routes, subway faster on {} routes",
             bike_faster, subway_faster);
}
