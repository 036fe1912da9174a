use ndarray::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

pub static EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> GeoPoint {
        GeoPoint{lat_deg, lon_deg}
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.lat_deg, self.lon_deg]
    }

    /// Great-circle distance to another point, in kilometers.
    pub fn haversine_distance(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat_deg.to_radians();
        let lat2 = other.lat_deg.to_radians();
        let dlat = (other.lat_deg - self.lat_deg).to_radians();
        let dlon = (other.lon_deg - self.lon_deg).to_radians();

        let aa = (dlat / 2.0).sin().powi(2) +
                 lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        return 2.0 * EARTH_RADIUS_KM * aa.sqrt().asin();
    }

    /// True if both coordinates are finite and within geographic bounds.
    pub fn is_sane(&self) -> bool {
        self.lat_deg.is_finite() && self.lon_deg.is_finite() &&
            self.lat_deg.abs() <= 90.0 && self.lon_deg.abs() <= 180.0
    }
}


/// If a second vector is provided, computes the haversine distances between all points in the
/// first and all points in the second vector.  Otherwise, computes distances between each pair
/// of points in the first.
pub fn haversine_distances(points1: &Vec<GeoPoint>, points2: Option<&Vec<GeoPoint>>)
    -> Array<f64, Ix2> {
    let points2 = match points2 {
        Some(p2) => p2,
        None => points1,
    };

    let mut dists_mat = Array::zeros((points1.len(), points2.len()));
    dists_mat.axis_iter_mut(Axis(0)).into_par_iter().enumerate().
        for_each(|(ii, mut row)| {
            for (jj, point2) in points2.iter().enumerate() {
                row[jj] = points1[ii].haversine_distance(point2);
            }
        });

    return dists_mat;
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_haversine_known_distance() {
        // Times Square to a bike dock one block north, roughly 120 metres.
        let times_square = GeoPoint::new(40.7580, -73.9855);
        let dock = GeoPoint::new(40.7590, -73.9850);
        let dist = times_square.haversine_distance(&dock);
        assert!(dist > 0.1 && dist < 0.13, "distance was {}", dist);

        // distance to self is zero
        assert_relative_eq!(times_square.haversine_distance(&times_square), 0.0);
    }

    #[test]
    fn test_haversine_symmetric() {
        let pp = GeoPoint::new(40.6535, -73.9311);
        let qq = GeoPoint::new(40.7580, -73.9855);
        assert_relative_eq!(pp.haversine_distance(&qq), qq.haversine_distance(&pp),
                            epsilon = 1e-12);
    }

    #[test]
    fn test_haversine_distances_pairwise() {
        let points1 = vec![GeoPoint::new(40.70, -74.00), GeoPoint::new(40.75, -73.98)];
        let points2 = vec![GeoPoint::new(40.72, -73.95),
                           GeoPoint::new(40.80, -73.96),
                           GeoPoint::new(40.70, -74.00)];
        let dists = haversine_distances(&points1, Some(&points2));
        assert_eq!(dists.shape(), &[2, 3]);
        for ii in 0..2 {
            for jj in 0..3 {
                assert_relative_eq!(dists[[ii, jj]],
                                    points1[ii].haversine_distance(&points2[jj]),
                                    epsilon = 1e-12);
            }
        }
        // third column is the first point itself
        assert_relative_eq!(dists[[0, 2]], 0.0);

        // with no second vector, the matrix is square with a zero diagonal
        let self_dists = haversine_distances(&points1, None);
        assert_eq!(self_dists.shape(), &[2, 2]);
        assert_relative_eq!(self_dists[[0, 0]], 0.0);
        assert_relative_eq!(self_dists[[1, 1]], 0.0);
    }

    #[test]
    fn test_is_sane() {
        assert!(GeoPoint::new(40.7, -74.0).is_sane());
        assert!(! GeoPoint::new(f64::NAN, -74.0).is_sane());
        assert!(! GeoPoint::new(40.7, f64::INFINITY).is_sane());
        assert!(! GeoPoint::new(91.0, 0.0).is_sane());
        assert!(! GeoPoint::new(0.0, -181.0).is_sane());
    }
}
