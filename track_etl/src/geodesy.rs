use geo::{Distance, Geodesic, Point};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// How the surface distance between two fixes is measured.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceModel {
    /// Haversine on a sphere of mean Earth radius.
    GreatCircle,
    /// Geodesic on the WGS-84 ellipsoid (Karney).
    Ellipsoidal,
}

impl Default for DistanceModel {
    fn default() -> Self {
        DistanceModel::GreatCircle
    }
}

impl DistanceModel {
    /// Distance in meters, or `None` for out-of-range or non-finite
    /// coordinates.
    pub fn distance(self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
        if !valid_coordinate(lat1, lon1) || !valid_coordinate(lat2, lon2) {
            return None;
        }
        let d = match self {
            DistanceModel::GreatCircle => haversine_distance(lat1, lon1, lat2, lon2),
            DistanceModel::Ellipsoidal => geodesic_distance(lat1, lon1, lat2, lon2),
        };
        d.is_finite().then_some(d.max(0.0))
    }
}

fn valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(lat2 - lat1);
    let dlon = to_rad(lon2 - lon1);
    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlon / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

fn geodesic_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Geodesic::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}
