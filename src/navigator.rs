//! Async driver for a navigation session.
//!
//! Runs one session on a single task: route fetches, position fixes and
//! cancellation are multiplexed with a biased `tokio::select!`, so each
//! event is handled to completion before the next is looked at. At most
//! one route fetch is in flight; issuing a new one drops the old.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{NavError, Result};
use crate::map::MapSink;
use crate::narration::NarrationSink;
use crate::provider::RouteProvider;
use crate::route::Route;
use crate::session::{NavigationSession, PositionOutcome, RouteRequest};
use crate::GeoPoint;

/// One fix from the device location stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub point: GeoPoint,
    /// Horizontal accuracy radius in meters, if reported
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    /// A fix taken now with unknown accuracy.
    pub fn now(point: GeoPoint) -> Self {
        Self {
            point,
            accuracy_m: None,
            timestamp: Utc::now(),
        }
    }
}

/// How a navigation run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEnd {
    Arrived,
    Cancelled,
    /// The position source ended before arrival. The session is left in
    /// its tracking state with the overlay still drawn; call
    /// `NavigationSession::cancel` on it to release both.
    PositionStreamClosed,
}

/// Cancels a running navigator from anywhere. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

struct InFlight {
    ticket: u64,
    future: BoxFuture<'static, Result<Route>>,
}

/// Resolves when the in-flight fetch completes; pends forever when there
/// is none (the select branch is disabled in that case anyway).
async fn next_route(slot: &mut Option<InFlight>) -> (u64, Result<Route>) {
    match slot.as_mut() {
        Some(in_flight) => {
            let outcome = (&mut in_flight.future).await;
            (in_flight.ticket, outcome)
        }
        None => futures::future::pending().await,
    }
}

/// Drives a `NavigationSession` with a route provider and a position stream.
pub struct Navigator<N, M> {
    session: NavigationSession<N, M>,
    provider: Arc<dyn RouteProvider>,
    cancel_handle: CancelHandle,
    cancelled: watch::Receiver<bool>,
}

impl<N: NarrationSink, M: MapSink> Navigator<N, M> {
    pub fn new(session: NavigationSession<N, M>, provider: Arc<dyn RouteProvider>) -> Self {
        let (sender, cancelled) = watch::channel(false);
        Self {
            session,
            provider,
            cancel_handle: CancelHandle {
                sender: Arc::new(sender),
            },
            cancelled,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    pub fn session(&self) -> &NavigationSession<N, M> {
        &self.session
    }

    pub fn into_session(self) -> NavigationSession<N, M> {
        self.session
    }

    /// Navigate from `origin` until arrival, cancellation or the end of
    /// the position stream.
    ///
    /// Returns `Err(RouteUnavailable)` if the initial route cannot be
    /// fetched; the session is then back in `Idle`. Failed recalculations
    /// and position errors are absorbed. The stream is dropped on return.
    ///
    /// Only arrival and cancellation end the session itself. After
    /// `PositionStreamClosed` it stays `Active` (or `Recalculating`), so
    /// the caller either cancels it or keeps it for inspection.
    pub async fn run<S>(&mut self, origin: GeoPoint, positions: S) -> Result<NavigationEnd>
    where
        S: Stream<Item = Result<PositionFix>> + Unpin,
    {
        let start = Instant::now();
        let mut positions = positions;

        if self.cancel_handle.is_cancelled() {
            self.session.cancel();
            return Ok(NavigationEnd::Cancelled);
        }

        let request = self.session.begin(origin)?;
        let mut in_flight = Some(self.fetch(request));

        let end = loop {
            tokio::select! {
                biased;

                changed = self.cancelled.changed() => {
                    // The navigator holds the sender, so `changed` cannot fail
                    // while we are running; treat it as a cancel regardless.
                    if changed.is_err() || *self.cancelled.borrow() {
                        self.session.cancel();
                        break NavigationEnd::Cancelled;
                    }
                }

                (ticket, outcome) = next_route(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    self.session.route_ready(ticket, outcome)?;
                }

                next = positions.next() => match next {
                    Some(Ok(fix)) => {
                        if let Some(accuracy) = fix.accuracy_m {
                            debug!(
                                "[Navigator] Fix at {} (±{:.0} m)",
                                fix.timestamp.format("%H:%M:%S"),
                                accuracy
                            );
                        }
                        match self.session.update_position(fix.point) {
                            PositionOutcome::Recalculate(request) => {
                                in_flight = Some(self.fetch(request));
                            }
                            PositionOutcome::Arrived => break NavigationEnd::Arrived,
                            PositionOutcome::Tracking { .. } | PositionOutcome::Ignored => {}
                        }
                    }
                    Some(Err(e)) => self.session.position_unavailable(&e),
                    None => break NavigationEnd::PositionStreamClosed,
                },
            }
        };

        info!(
            "[Navigator] Finished: {:?} after {:.1}s",
            end,
            start.elapsed().as_secs_f64()
        );
        Ok(end)
    }

    /// Start fetching a route, bounded by the configured timeout.
    fn fetch(&self, request: RouteRequest) -> InFlight {
        let provider = Arc::clone(&self.provider);
        let timeout = self.session.config().fetch_timeout();

        debug!(
            "[Navigator] Fetching {:?} route (ticket {})",
            request.kind, request.ticket
        );

        let future = async move {
            match tokio::time::timeout(
                timeout,
                provider.fetch_route(request.origin, request.destination),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(NavError::route_unavailable(format!(
                    "no response within {} ms",
                    timeout.as_millis()
                ))),
            }
        }
        .boxed();

        InFlight {
            ticket: request.ticket,
            future,
        }
    }
}
