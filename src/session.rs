//! # Navigation Session
//!
//! Stateful lifecycle of one navigation towards a fixed destination.
//!
//! ## States
//!
//! ```text
//! Idle --begin--> Routing --route--> Active <--> Recalculating
//!   ^                |                  |              |
//!   +---- failed ----+                  +--> Arrived   |
//!                                                      |
//! any non-terminal state --cancel--> Cancelled         |
//! ```
//!
//! The session never performs I/O itself. Whenever it needs a route it
//! hands back a [`RouteRequest`] carrying a ticket; the driver fetches the
//! route and returns the outcome through [`NavigationSession::route_ready`].
//! Outcomes for a ticket that is no longer outstanding (superseded, or the
//! session was cancelled meanwhile) are discarded.
//!
//! Side effects go to two injected sinks: narration and map rendering.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::NavigationConfig;
use crate::error::{NavError, Result};
use crate::geo_utils::{bearing, haversine_distance};
use crate::map::MapSink;
use crate::narration::{
    arrival_utterance, recalculation_utterance, step_utterance, NarrationSink, Narrator,
};
use crate::projection::{project, ProjectionResult};
use crate::route::Route;
use crate::GeoPoint;

// ============================================================================
// Types
// ============================================================================

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No route requested yet, or the initial fetch failed
    Idle,
    /// Initial route fetch in flight
    Routing,
    /// Route held, tracking live position
    Active,
    /// Replacement route in flight; the old route is still tracked
    Recalculating,
    Arrived,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Arrived | SessionState::Cancelled)
    }

    /// Whether position updates are acted on in this state.
    pub fn is_tracking(&self) -> bool {
        matches!(self, SessionState::Active | SessionState::Recalculating)
    }

    fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Routing => "routing",
            SessionState::Active => "active",
            SessionState::Recalculating => "recalculating",
            SessionState::Arrived => "arrived",
            SessionState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a route is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Initial,
    Recalculation,
}

/// A route the session wants fetched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    /// Must be passed back to `route_ready` with the outcome
    pub ticket: u64,
    pub kind: RequestKind,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

/// Position reported to the "you are here" marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayedPosition {
    pub point: GeoPoint,
    /// True when `point` is the nearest point on the route, not the raw fix
    pub snapped: bool,
}

/// What a position update led to.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionOutcome {
    /// The session is not tracking; nothing happened
    Ignored,
    /// Normal tracking tick
    Tracking {
        displayed: DisplayedPosition,
        cross_track_m: f64,
        /// Step narrated on this tick, if any
        announced_step: Option<usize>,
    },
    /// Deviation detected; the driver must fetch this route
    Recalculate(RouteRequest),
    /// Destination reached; the session is finished
    Arrived,
}

/// Serializable view of the session for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub destination: GeoPoint,
    pub displayed: Option<DisplayedPosition>,
    pub distance_to_destination_m: Option<f64>,
    pub remaining_route_m: Option<f64>,
    /// Route distance covered up to the displayed position, in meters
    pub distance_travelled_m: Option<f64>,
    /// Bearing of the route ahead of the displayed position, in degrees
    pub heading_deg: Option<f64>,
    pub next_step: Option<NextStep>,
    pub announced_steps: usize,
    pub recalculations: u32,
}

/// The first step not yet narrated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextStep {
    pub index: usize,
    pub instruction: String,
    /// Distance from the last displayed position, in meters
    pub distance_m: Option<f64>,
}

/// Narration bookkeeping for the current route.
#[derive(Debug, Default)]
struct Announcements {
    steps: HashSet<usize>,
    arrival: bool,
}

// ============================================================================
// Navigation Session
// ============================================================================

/// One navigation towards a fixed destination.
pub struct NavigationSession<N, M> {
    destination: GeoPoint,
    config: NavigationConfig,
    state: SessionState,
    route: Option<Route>,

    // Idempotency: steps and arrival once per route, recalculation once per
    // deviation episode
    announced: Announcements,
    recalculation_triggered: bool,

    pending: Option<RouteRequest>,
    next_ticket: u64,

    last_fix: Option<GeoPoint>,
    displayed: Option<DisplayedPosition>,
    last_projection: Option<ProjectionResult>,
    recalculations: u32,

    narrator: Narrator<N>,
    map: M,
}

impl<N: NarrationSink, M: MapSink> NavigationSession<N, M> {
    /// Create an idle session. Fails on an invalid destination or config.
    pub fn new(
        destination: GeoPoint,
        config: NavigationConfig,
        narration: N,
        map: M,
    ) -> Result<Self> {
        let destination = destination.validated()?;
        config.validate()?;

        Ok(Self {
            destination,
            narrator: Narrator::new(narration, config.narration_enabled),
            config,
            state: SessionState::Idle,
            route: None,
            announced: Announcements::default(),
            recalculation_triggered: false,
            pending: None,
            next_ticket: 1,
            last_fix: None,
            displayed: None,
            last_projection: None,
            recalculations: 0,
            map,
        })
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// `Idle -> Routing`: request the initial route from `origin`.
    pub fn begin(&mut self, origin: GeoPoint) -> Result<RouteRequest> {
        if self.state != SessionState::Idle {
            return Err(self.invalid_transition("begin routing"));
        }
        let origin = origin.validated()?;

        self.last_fix = Some(origin);
        self.state = SessionState::Routing;
        let request = self.issue_request(RequestKind::Initial, origin);

        info!(
            "[NavigationSession] Routing ({:.5}, {:.5}) -> ({:.5}, {:.5}), ticket {}",
            origin.latitude,
            origin.longitude,
            self.destination.latitude,
            self.destination.longitude,
            request.ticket
        );
        Ok(request)
    }

    /// Deliver the outcome of a route fetch.
    ///
    /// A failed initial fetch returns the error and puts the session back
    /// to `Idle`. A failed recalculation is absorbed: the old route stays
    /// and a later deviation may try again. Outcomes for stale tickets and
    /// anything arriving after the session ended are ignored.
    pub fn route_ready(&mut self, ticket: u64, outcome: Result<Route>) -> Result<()> {
        if self.state.is_terminal() {
            debug!(
                "[NavigationSession] Ignoring route for ticket {} in state {}",
                ticket, self.state
            );
            return Ok(());
        }

        let request = match self.pending {
            Some(request) if request.ticket == ticket => request,
            _ => {
                debug!("[NavigationSession] Ignoring stale route ticket {}", ticket);
                return Ok(());
            }
        };
        self.pending = None;

        match (request.kind, outcome) {
            (RequestKind::Initial, Ok(route)) => {
                self.adopt_route(route);
                self.state = SessionState::Active;

                // Kick off with the first instruction
                if let Some(first) = self.route.as_ref().and_then(|r| r.steps().first()) {
                    let utterance = step_utterance(&first.instruction, first.distance_m);
                    self.narrator.announce(&utterance);
                    self.announced.steps.insert(0);
                }
                if let Some(route) = &self.route {
                    self.map.draw_remaining(route.polyline());
                }
                Ok(())
            }
            (RequestKind::Initial, Err(e)) => {
                warn!("[NavigationSession] Initial route failed: {}", e);
                self.state = SessionState::Idle;
                Err(e)
            }
            (RequestKind::Recalculation, Ok(route)) => {
                self.adopt_route(route);
                self.state = SessionState::Active;
                if let Some(route) = &self.route {
                    self.map.draw_remaining(route.polyline());
                }
                Ok(())
            }
            (RequestKind::Recalculation, Err(e)) => {
                warn!(
                    "[NavigationSession] Recalculation failed, keeping previous route: {}",
                    e
                );
                self.recalculation_triggered = false;
                self.state = SessionState::Active;
                Ok(())
            }
        }
    }

    /// Process one live position fix.
    pub fn update_position(&mut self, fix: GeoPoint) -> PositionOutcome {
        if !self.state.is_tracking() {
            if self.state == SessionState::Routing && fix.is_valid() {
                self.last_fix = Some(fix);
            }
            return PositionOutcome::Ignored;
        }
        if !fix.is_valid() {
            warn!(
                "[NavigationSession] Dropping invalid fix ({}, {})",
                fix.latitude, fix.longitude
            );
            return PositionOutcome::Ignored;
        }
        self.last_fix = Some(fix);

        let projection = match self.route.as_ref().map(|route| project(&fix, route)) {
            Some(Ok(projection)) => projection,
            Some(Err(e)) => {
                warn!("[NavigationSession] Projection failed: {}", e);
                return PositionOutcome::Ignored;
            }
            None => return PositionOutcome::Ignored,
        };

        // Arrival wins over everything else: the destination may sit off the
        // routable network, where the fix is legitimately far from the route.
        let to_destination = haversine_distance(&fix, &self.destination);
        if to_destination <= self.config.arrival_threshold_m {
            self.arrive(to_destination);
            return PositionOutcome::Arrived;
        }

        if projection.cross_track_m > self.config.recalculation_threshold_m
            && !self.recalculation_triggered
        {
            return PositionOutcome::Recalculate(self.start_recalculation(fix, &projection));
        }

        let announced_step = self.announce_due_step(&projection);

        let displayed = if projection.cross_track_m < self.config.snap_threshold_m {
            DisplayedPosition {
                point: projection.nearest,
                snapped: true,
            }
        } else {
            DisplayedPosition {
                point: fix,
                snapped: false,
            }
        };

        self.map.draw_remaining(&projection.remaining);
        self.map.show_position(displayed.point, displayed.snapped);

        debug!(
            "[NavigationSession] Fix: cross-track {:.1} m, segment {}, {:.0} m remaining",
            projection.cross_track_m, projection.segment_index, projection.remaining_distance_m
        );

        let cross_track_m = projection.cross_track_m;
        self.displayed = Some(displayed);
        self.last_projection = Some(projection);

        PositionOutcome::Tracking {
            displayed,
            cross_track_m,
            announced_step,
        }
    }

    /// The position source reported an error. The session keeps its last
    /// known position and display state and waits for fixes to resume.
    pub fn position_unavailable(&mut self, error: &NavError) {
        warn!(
            "[NavigationSession] {} (state {}, keeping last position)",
            error, self.state
        );
    }

    /// Cancel the session: silence narration, drop the overlay and ignore
    /// any route still in flight. No-op once the session has ended.
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        info!("[NavigationSession] Cancelled in state {}", self.state);
        self.state = SessionState::Cancelled;
        self.pending = None;
        self.narrator.silence();
        self.map.clear();
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn issue_request(&mut self, kind: RequestKind, origin: GeoPoint) -> RouteRequest {
        let request = RouteRequest {
            ticket: self.next_ticket,
            kind,
            origin,
            destination: self.destination,
        };
        self.next_ticket += 1;
        self.pending = Some(request);
        request
    }

    fn adopt_route(&mut self, route: Route) {
        info!(
            "[NavigationSession] Route adopted: {} points, {} steps, {:.0} m",
            route.polyline().len(),
            route.steps().len(),
            route.distance_m
        );
        self.route = Some(route);
        self.announced = Announcements::default();
        self.recalculation_triggered = false;
        self.last_projection = None;
    }

    fn start_recalculation(
        &mut self,
        fix: GeoPoint,
        projection: &ProjectionResult,
    ) -> RouteRequest {
        self.recalculation_triggered = true;
        self.recalculations += 1;
        self.state = SessionState::Recalculating;
        self.narrator.announce(recalculation_utterance());

        // Re-route from the raw fix, not the snapped point
        let request = self.issue_request(RequestKind::Recalculation, fix);
        info!(
            "[NavigationSession] Off route by {:.0} m, recalculating (ticket {})",
            projection.cross_track_m, request.ticket
        );
        request
    }

    /// Narrate the closest unannounced step near the route position.
    /// At most one step per tick.
    fn announce_due_step(&mut self, projection: &ProjectionResult) -> Option<usize> {
        let route = self.route.as_ref()?;

        let mut due: Option<(usize, f64)> = None;
        for (index, step) in route.steps().iter().enumerate() {
            if self.announced.steps.contains(&index) {
                continue;
            }
            let distance = haversine_distance(&projection.nearest, &step.location);
            if distance > self.config.announcement_threshold_m {
                continue;
            }
            let is_closer = match due {
                Some((_, best)) => distance < best,
                None => true,
            };
            if is_closer {
                due = Some((index, distance));
            }
        }

        let (index, distance) = due?;
        let utterance = step_utterance(&route.steps()[index].instruction, distance);
        self.narrator.announce(&utterance);
        self.announced.steps.insert(index);
        debug!("[NavigationSession] Announced step {}: {}", index, utterance);
        Some(index)
    }

    fn arrive(&mut self, distance_m: f64) {
        self.state = SessionState::Arrived;
        self.pending = None;
        if !self.announced.arrival {
            self.narrator.announce(arrival_utterance());
            self.announced.arrival = true;
        }
        self.map.clear();
        info!(
            "[NavigationSession] Arrived ({:.1} m from destination)",
            distance_m
        );
    }

    fn invalid_transition(&self, action: &str) -> NavError {
        NavError::InvalidTransition {
            from: self.state.to_string(),
            action: action.to_string(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn destination(&self) -> GeoPoint {
        self.destination
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// The route request currently in flight, if any.
    pub fn pending_request(&self) -> Option<RouteRequest> {
        self.pending
    }

    pub fn is_step_announced(&self, index: usize) -> bool {
        self.announced.steps.contains(&index)
    }

    pub fn arrival_announced(&self) -> bool {
        self.announced.arrival
    }

    /// True between a deviation trigger and the adoption (or failure) of
    /// its replacement route.
    pub fn recalculation_triggered(&self) -> bool {
        self.recalculation_triggered
    }

    pub fn last_fix(&self) -> Option<GeoPoint> {
        self.last_fix
    }

    pub fn displayed_position(&self) -> Option<DisplayedPosition> {
        self.displayed
    }

    pub fn narrator(&self) -> &Narrator<N> {
        &self.narrator
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let reference = self.displayed.map(|d| d.point).or(self.last_fix);

        let next_step = self.route.as_ref().and_then(|route| {
            route
                .steps()
                .iter()
                .enumerate()
                .find(|(i, _)| !self.announced.steps.contains(i))
                .map(|(index, step)| NextStep {
                    index,
                    instruction: step.instruction.clone(),
                    distance_m: reference.map(|p| haversine_distance(&p, &step.location)),
                })
        });

        let remaining_route_m = match (&self.last_projection, &self.route) {
            (Some(projection), _) => Some(projection.remaining_distance_m),
            (None, Some(route)) => Some(route.distance_m),
            (None, None) => None,
        };

        let heading_deg = self
            .last_projection
            .as_ref()
            .and_then(|projection| {
                // At a vertex the nearest point repeats the next one
                let from = projection.remaining.first()?;
                let to = projection.remaining.iter().find(|p| *p != from)?;
                Some(bearing(from, to))
            });

        SessionSnapshot {
            state: self.state,
            destination: self.destination,
            displayed: self.displayed,
            distance_to_destination_m: self
                .last_fix
                .map(|p| haversine_distance(&p, &self.destination)),
            remaining_route_m,
            distance_travelled_m: self
                .last_projection
                .as_ref()
                .map(|projection| projection.distance_along_m),
            heading_deg,
            next_step,
            announced_steps: self.announced.steps.len(),
            recalculations: self.recalculations,
        }
    }

    /// Snapshot rendered as JSON.
    pub fn snapshot_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}
