//! Shared fixtures: an L-shaped walking route in central Madrid plus
//! recording sinks and a scripted route provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use livenav::map::MapFrame;
use livenav::{
    GeoPoint, MapSink, NarrationSink, NavError, Result, Route, RouteProvider, RouteStep,
};

/// Meters per degree of latitude on the haversine sphere.
pub const M_PER_DEG_LAT: f64 = 111_195.0;

pub const START: GeoPoint = GeoPoint {
    latitude: 40.4000,
    longitude: -3.7000,
};
pub const CORNER: GeoPoint = GeoPoint {
    latitude: 40.4040,
    longitude: -3.7000,
};
pub const DESTINATION: GeoPoint = GeoPoint {
    latitude: 40.4040,
    longitude: -3.6950,
};

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Point `meters` north of `p`.
pub fn north(p: GeoPoint, meters: f64) -> GeoPoint {
    GeoPoint::new(p.latitude + meters / M_PER_DEG_LAT, p.longitude)
}

/// Point `meters` east of `p` (negative for west).
pub fn east(p: GeoPoint, meters: f64) -> GeoPoint {
    let m_per_deg_lon = M_PER_DEG_LAT * p.latitude.to_radians().cos();
    GeoPoint::new(p.latitude, p.longitude + meters / m_per_deg_lon)
}

/// North ~445 m, then east ~425 m to the destination.
pub fn l_route() -> Route {
    Route::new(
        vec![START, CORNER, DESTINATION],
        vec![
            RouteStep::new("Head north on Calle de Atocha", START, 0.0),
            RouteStep::new("Turn right onto Calle Mayor", CORNER, 445.0),
            RouteStep::new("Arrive at your destination", DESTINATION, 425.0),
        ],
    )
    .unwrap()
}

/// Straight route from `origin` to the destination with a single step.
pub fn direct_route(origin: GeoPoint) -> Route {
    Route::new(
        vec![origin, DESTINATION],
        vec![RouteStep::new("Head east", origin, 0.0)],
    )
    .unwrap()
}

// ============================================================================
// Recording sinks
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingNarrator {
    pub spoken: Vec<String>,
    pub silenced: u32,
}

impl NarrationSink for RecordingNarrator {
    fn speak(&mut self, utterance: &str) -> Result<()> {
        self.spoken.push(utterance.to_string());
        Ok(())
    }

    fn silence(&mut self) {
        self.silenced += 1;
    }
}

#[derive(Debug, Default)]
pub struct RecordingMap {
    pub frame: MapFrame,
    pub updates: u32,
    pub cleared: u32,
}

impl MapSink for RecordingMap {
    fn draw_remaining(&mut self, polyline: &[GeoPoint]) {
        self.frame.remaining = polyline.to_vec();
        self.updates += 1;
    }

    fn show_position(&mut self, position: GeoPoint, snapped: bool) {
        self.frame.position = Some(position);
        self.frame.snapped = snapped;
        self.updates += 1;
    }

    fn clear(&mut self) {
        self.frame = MapFrame::default();
        self.cleared += 1;
    }
}

// ============================================================================
// Scripted provider
// ============================================================================

pub enum Scripted {
    Route(Route),
    Fail,
    /// Never resolves
    Hang,
    Delayed(Duration, Route),
}

/// Hands out scripted responses in order; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    pub origins: Mutex<Vec<GeoPoint>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            origins: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RouteProvider for ScriptedProvider {
    fn fetch_route(
        &self,
        origin: GeoPoint,
        _destination: GeoPoint,
    ) -> BoxFuture<'_, Result<Route>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.origins.lock().unwrap().push(origin);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Route(route)) => futures::future::ready(Ok(route)).boxed(),
            Some(Scripted::Delayed(delay, route)) => async move {
                tokio::time::sleep(delay).await;
                Ok(route)
            }
            .boxed(),
            Some(Scripted::Hang) => futures::future::pending().boxed(),
            Some(Scripted::Fail) | None => {
                futures::future::ready(Err(NavError::RouteUnavailable {
                    message: "scripted failure".to_string(),
                    status_code: Some(503),
                }))
                .boxed()
            }
        }
    }
}
