//! Speech narration: the sink seam and utterance phrasing.
//!
//! There is one speech channel. A new utterance cuts off the previous one
//! instead of queueing behind it, so rapid position updates never build a
//! backlog of stale instructions.

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{NavError, Result};

/// Destination for spoken instructions.
pub trait NarrationSink: Send {
    /// Start speaking `utterance`. Anything still playing is cut off first.
    fn speak(&mut self, utterance: &str) -> Result<()>;

    /// Stop whatever is playing.
    fn silence(&mut self);
}

/// Sink that only writes utterances to the log.
#[derive(Debug, Default)]
pub struct LogNarrator;

impl NarrationSink for LogNarrator {
    fn speak(&mut self, utterance: &str) -> Result<()> {
        info!("[Narration] {}", utterance);
        Ok(())
    }

    fn silence(&mut self) {
        debug!("[Narration] silenced");
    }
}

/// An utterance published on a watch channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    /// Increases with every `speak`, so a listener can tell repeats apart.
    pub sequence: u64,
    pub text: String,
}

/// Sink that publishes the current utterance on a `tokio::sync::watch`
/// channel. The channel only holds the latest value, which gives
/// supplant-not-queue behaviour for free. `None` means silence.
#[derive(Debug)]
pub struct WatchNarrator {
    sender: watch::Sender<Option<Utterance>>,
    sequence: u64,
}

impl WatchNarrator {
    pub fn new() -> (Self, watch::Receiver<Option<Utterance>>) {
        let (sender, receiver) = watch::channel(None);
        (
            Self {
                sender,
                sequence: 0,
            },
            receiver,
        )
    }
}

impl NarrationSink for WatchNarrator {
    fn speak(&mut self, utterance: &str) -> Result<()> {
        self.sequence += 1;
        self.sender
            .send(Some(Utterance {
                sequence: self.sequence,
                text: utterance.to_string(),
            }))
            .map_err(|_| NavError::NarrationFailure {
                message: "no speech listener attached".to_string(),
            })
    }

    fn silence(&mut self) {
        self.sender.send_replace(None);
    }
}

/// Session-side wrapper around a sink: applies the `narration_enabled`
/// switch and turns sink failures into log lines.
#[derive(Debug)]
pub struct Narrator<S> {
    sink: S,
    enabled: bool,
    spoken: u32,
}

impl<S: NarrationSink> Narrator<S> {
    pub fn new(sink: S, enabled: bool) -> Self {
        Self {
            sink,
            enabled,
            spoken: 0,
        }
    }

    /// Cancel-then-issue. Failures are logged and swallowed.
    pub fn announce(&mut self, utterance: &str) {
        if !self.enabled {
            debug!("[Narrator] disabled, dropping: {}", utterance);
            return;
        }
        self.sink.silence();
        match self.sink.speak(utterance) {
            Ok(()) => self.spoken += 1,
            Err(e) => warn!("[Narrator] {}", e),
        }
    }

    pub fn silence(&mut self) {
        self.sink.silence();
    }

    /// Utterances handed to the sink successfully.
    pub fn spoken(&self) -> u32 {
        self.spoken
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

// ============================================================================
// Phrasing
// ============================================================================

/// Human-friendly distance: tens of meters below 1 km, tenths of km above.
pub fn format_distance(meters: f64) -> String {
    let rounded = (meters / 10.0).round() as i64 * 10;
    if rounded >= 1000 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{} m", rounded)
    }
}

/// Utterance for a step, prefixed with the distance to it when that is
/// worth saying.
pub fn step_utterance(instruction: &str, distance_m: f64) -> String {
    if distance_m >= 5.0 {
        format!("In {}, {}", format_distance(distance_m), lowercase_first(instruction))
    } else {
        instruction.to_string()
    }
}

pub fn arrival_utterance() -> &'static str {
    "You have arrived at your destination"
}

pub fn recalculation_utterance() -> &'static str {
    "You are off route. Recalculating"
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
