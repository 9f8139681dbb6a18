//! # livenav
//!
//! Live turn-by-turn walking navigation for the AED locator app.
//!
//! This library provides:
//! - Route fetching from openrouteservice (pedestrian, cycling or driving profile)
//! - Projection of live GPS fixes onto the active route (snap, cross-track distance)
//! - A navigation session state machine: step narration, deviation re-routing, arrival
//! - An async navigator that drives a session from a position stream
//!
//! ## Quick Start
//!
//! ```rust
//! use livenav::{project, GeoPoint, Route};
//!
//! let route = Route::from_points(vec![
//!     GeoPoint::new(40.4168, -3.7038),
//!     GeoPoint::new(40.4178, -3.7038),
//! ])
//! .unwrap();
//!
//! let fix = GeoPoint::new(40.4173, -3.7037);
//! let projection = project(&fix, &route).unwrap();
//! println!("{:.1} m off route", projection.cross_track_m);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{NavError, OptionExt, Result};

// Geographic utilities (distance, bearings, segment projection)
pub mod geo_utils;

// Thresholds, travel profiles and provider settings
pub mod config;
pub use config::{NavigationConfig, ProviderConfig, TravelProfile};

// Route and step model
pub mod route;
pub use route::{Route, RouteStep};

// Position projector
pub mod projection;
pub use projection::{project, ProjectionResult};

// Directions API client
pub mod provider;
pub use provider::{OrsProvider, RouteProvider};

// Speech output
pub mod narration;
pub use narration::{LogNarrator, NarrationSink, WatchNarrator};

// Remaining-path rendering
pub mod map;
pub use map::{MapFrame, MapSink, WatchMap};

// Navigation state machine
pub mod session;
pub use session::{
    DisplayedPosition, NavigationSession, PositionOutcome, RequestKind, RouteRequest,
    SessionSnapshot, SessionState,
};

// Async driver
pub mod navigator;
pub use navigator::{CancelHandle, NavigationEnd, Navigator};

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("livenav"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate in decimal degrees.
///
/// # Example
/// ```
/// use livenav::GeoPoint;
/// let point = GeoPoint::new(40.4168, -3.7038); // Madrid
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Return the point itself, or `InvalidCoordinates` if it is out of range.
    pub fn validated(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(NavError::InvalidCoordinates {
                message: format!("({}, {})", self.latitude, self.longitude),
            })
        }
    }

    /// Linear interpolation towards `other` in degree space.
    pub fn lerp(&self, other: &GeoPoint, t: f64) -> GeoPoint {
        GeoPoint::new(
            self.latitude + t * (other.latitude - self.latitude),
            self.longitude + t * (other.longitude - self.longitude),
        )
    }
}
