//! Route model: polyline plus ordered turn-by-turn steps.
//!
//! A `Route` is immutable once built. Re-routing produces a new `Route`.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo_utils::polyline_length;
use crate::GeoPoint;

/// One maneuver along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    /// Human-readable instruction text
    pub instruction: String,
    /// Where the maneuver applies
    pub location: GeoPoint,
    /// Distance from the previous step (or route start) in meters
    pub distance_m: f64,
}

impl RouteStep {
    pub fn new(instruction: impl Into<String>, location: GeoPoint, distance_m: f64) -> Self {
        Self {
            instruction: instruction.into(),
            location,
            distance_m,
        }
    }
}

/// A walkable route between two points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    polyline: Vec<GeoPoint>,
    steps: Vec<RouteStep>,
    /// Route length in meters (as reported by the provider, or computed)
    pub distance_m: f64,
    /// Estimated duration in seconds, if the provider reported one
    pub duration_s: Option<f64>,
}

impl Route {
    /// Build a route. Fails with `InvalidRoute` for fewer than 2 points or
    /// invalid coordinates.
    pub fn new(polyline: Vec<GeoPoint>, steps: Vec<RouteStep>) -> Result<Self> {
        if polyline.len() < 2 {
            return Err(NavError::InvalidRoute {
                point_count: polyline.len(),
                minimum_required: 2,
                message: "polyline needs at least one segment".to_string(),
            });
        }
        if let Some(bad) = polyline.iter().find(|p| !p.is_valid()) {
            return Err(NavError::InvalidRoute {
                point_count: polyline.len(),
                minimum_required: 2,
                message: format!(
                    "vertex ({}, {}) is out of range",
                    bad.latitude, bad.longitude
                ),
            });
        }

        let distance_m = polyline_length(&polyline);
        Ok(Self {
            polyline,
            steps,
            distance_m,
            duration_s: None,
        })
    }

    /// Route without instructions.
    pub fn from_points(polyline: Vec<GeoPoint>) -> Result<Self> {
        Self::new(polyline, Vec::new())
    }

    /// Override the summary with provider-reported values.
    pub fn with_summary(mut self, distance_m: f64, duration_s: Option<f64>) -> Self {
        if distance_m.is_finite() && distance_m >= 0.0 {
            self.distance_m = distance_m;
        }
        self.duration_s = duration_s;
        self
    }

    pub fn polyline(&self) -> &[GeoPoint] {
        &self.polyline
    }

    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    pub fn start(&self) -> GeoPoint {
        self.polyline[0]
    }

    pub fn end(&self) -> GeoPoint {
        self.polyline[self.polyline.len() - 1]
    }
}
