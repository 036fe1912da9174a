use rand::Rng;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;

use super::geometry::GeoPoint;
use super::geometry::EARTH_RADIUS_KM;

/// A randomly drawn trip endpoint.  Immutable once generated; point ids are
/// 1-based within one sampling call.
#[derive(PartialEq, Debug, Clone)]
pub struct SamplePoint {
    pub point_id: usize,
    pub position: GeoPoint,
    pub distance_from_center_km: f64,
}

/// Draws points uniformly over the *area* of a disk around a center.  The
/// seed is explicit so runs are reproducible.
pub struct RandomPointSampler {
    rng: Isaac64Rng,
}

impl RandomPointSampler {
    pub fn new(seed: u64) -> RandomPointSampler {
        RandomPointSampler {
            rng: Isaac64Rng::seed_from_u64(seed),
        }
    }

    pub fn sample(&mut self, center: &GeoPoint, radius_km: f64, num_points: usize)
                  -> Vec<SamplePoint> {
        let radius_deg = (radius_km / EARTH_RADIUS_KM).to_degrees();
        // longitude degrees shrink with latitude, so stretch the east-west
        // offset to keep the disk round on the ground
        let lon_correction = 1.0 / center.lat_deg.to_radians().cos();

        let mut points = vec![];
        for ii in 0..num_points {
            // sqrt of the uniform draw makes density constant per unit area,
            // not per unit radius
            let rr = radius_deg * self.rng.gen::<f64>().sqrt();
            let theta = 2.0 * std::f64::consts::PI * self.rng.gen::<f64>();

            let lat_deg = center.lat_deg + rr * theta.cos();
            let lon_deg = center.lon_deg + rr * theta.sin() * lon_correction;
            let position = GeoPoint::new(lat_deg, lon_deg);
            let distance_from_center_km = center.haversine_distance(&position);

            points.push(SamplePoint {
                point_id: ii + 1,
                position,
                distance_from_center_km,
            });
        }

        points
    }
}
