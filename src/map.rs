//! Map rendering sink: remaining path and "you are here" marker.
//!
//! Purely a rendering hint. Nothing flows back into the session.

use serde::Serialize;
use tokio::sync::watch;

use crate::GeoPoint;

/// Destination for map updates.
pub trait MapSink: Send {
    /// Replace the drawn remaining path.
    fn draw_remaining(&mut self, polyline: &[GeoPoint]);

    /// Move the position marker. `snapped` is true when the point is on
    /// the route rather than the raw fix.
    fn show_position(&mut self, position: GeoPoint, snapped: bool);

    /// Remove the overlay entirely.
    fn clear(&mut self);
}

/// What the map should currently show.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapFrame {
    pub remaining: Vec<GeoPoint>,
    pub position: Option<GeoPoint>,
    pub snapped: bool,
}

/// Sink that publishes the latest frame on a `tokio::sync::watch` channel.
///
/// Rendering reads whatever frame is current; intermediate frames are
/// never queued.
#[derive(Debug)]
pub struct WatchMap {
    sender: watch::Sender<MapFrame>,
}

impl WatchMap {
    pub fn new() -> (Self, watch::Receiver<MapFrame>) {
        let (sender, receiver) = watch::channel(MapFrame::default());
        (Self { sender }, receiver)
    }
}

impl MapSink for WatchMap {
    fn draw_remaining(&mut self, polyline: &[GeoPoint]) {
        self.sender.send_modify(|frame| {
            frame.remaining.clear();
            frame.remaining.extend_from_slice(polyline);
        });
    }

    fn show_position(&mut self, position: GeoPoint, snapped: bool) {
        self.sender.send_modify(|frame| {
            frame.position = Some(position);
            frame.snapped = snapped;
        });
    }

    fn clear(&mut self) {
        self.sender.send_replace(MapFrame::default());
    }
}
