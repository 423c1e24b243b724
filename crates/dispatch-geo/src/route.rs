use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<Coordinate>,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl Route {
    pub fn summary(&self) -> RouteSummary {
        RouteSummary::new(self.distance_m, self.duration_s)
    }
}

/// Distance in kilometres (two decimals) and ETA in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_km: f64,
    pub duration_min: u64,
}

impl RouteSummary {
    pub fn new(distance_m: f64, duration_s: f64) -> Self {
        let distance_km = (distance_m.max(0.0) / 10.0).round() / 100.0;
        let duration_min = (duration_s.max(0.0) / 60.0).round() as u64;
        Self {
            distance_km,
            duration_min,
        }
    }
}

impl fmt::Display for RouteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} km, {} mins", self.distance_km, self.duration_min)
    }
}
