use std::error::Error;
use std::fs::File;
use std::path::Path;

use super::sampling::SamplePoint;
use super::stations::Station;
use super::trip_sim::RouteMatrix;
use super::trip_sim::TimeMatrix;

// Writers for the rendering collaborator: plain csv grids and tables, plus
// routes as json waypoint lists.  The renderer only reads these files; the
// engine never reads them back.

/// Write a travel time matrix as a headerless csv grid.  Unresolved cells
/// are written as NaN, never as a number.
pub fn write_time_matrix_csv(path: &Path, matrix: &TimeMatrix)
                             -> Result<(), Box<dyn Error>> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).
        from_path(path)?;
    for row in matrix.rows() {
        let record: Vec<String> = row.iter().map(|val| val.to_string()).collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a route matrix as nested json arrays of [lat, lon] waypoints.
/// Unresolved pairs are empty arrays.
pub fn write_route_matrix_json(path: &Path, routes: &RouteMatrix)
                               -> Result<(), Box<dyn Error>> {
    let as_lists: Vec<Vec<Vec<[f64; 2]>>> = routes.rows().into_iter().
        map(|row| row.iter().
            map(|route| route.iter().map(|point| point.as_array()).collect()).
            collect()).
        collect();
    let file = File::create(path)?;
    serde_json::to_writer(file, &as_lists)?;
    Ok(())
}

pub fn write_station_table_csv(path: &Path, stations: &Vec<Station>)
                               -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&["station_name", "latitude", "longitude"])?;
    for station in stations {
        writer.write_record(&[
            station.name.clone(),
            station.position.lat_deg.to_string(),
            station.position.lon_deg.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_sample_points_csv(path: &Path, points: &Vec<SamplePoint>)
                               -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&["point_id", "latitude", "longitude",
                          "distance_from_center_km"])?;
    for point in points {
        writer.write_record(&[
            point.point_id.to_string(),
            point.position.lat_deg.to_string(),
            point.position.lon_deg.to_string(),
            point.distance_from_center_km.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
