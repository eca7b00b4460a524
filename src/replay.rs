//! Headless replay of recorded input transcripts.
//!
//! A transcript is the event stream a host captured during a session,
//! each event stamped with the time it arrived. Replaying it through a
//! [`PracticeSession`] driven by a [`ManualClock`] reproduces the exact
//! states and metrics the user saw.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{ManualClock, Millis};
use crate::config::Config;
use crate::error::Error;
use crate::metrics::LiveMetrics;
use crate::platform::Capabilities;
use crate::practice::{InputEvent, PracticeSession};
use crate::progress::CompletedSession;
use crate::session::Mistake;
use crate::time_series::wpm_std_dev;

/// Host-side controls that can appear in a transcript besides input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    Pause,
    Resume,
    Tick,
    Countdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptEvent {
    Input(InputEvent),
    Control(Control),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimedEvent {
    pub at_ms: Millis,
    pub event: TranscriptEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transcript {
    pub target: String,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub countdown_ms: Option<Millis>,
    pub events: Vec<TimedEvent>,
}

impl Transcript {
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Identity of the recorded session: same target and events, same id
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub target: String,
    pub completed: bool,
    pub committed: String,
    pub metrics: LiveMetrics,
    pub elapsed_ms: Millis,
    /// Timestamp of the last event
    pub ended_at_ms: Millis,
    pub mistakes: Vec<Mistake>,
    /// Spread of the live WPM samples taken on ticks
    pub wpm_std_dev: f64,
    pub session: Option<CompletedSession>,
}

/// Drive a fresh session through every event of `transcript`, in order
pub fn replay(transcript: &Transcript, config: &Config) -> crate::Result<ReplayReport> {
    let start = transcript.events.first().map_or(0, |e| e.at_ms);
    let clock = ManualClock::new(start);
    let config = Config {
        countdown_ms: transcript.countdown_ms.or(config.countdown_ms),
        ..config.clone()
    };
    let mut session = PracticeSession::with_clock(
        transcript.target.as_str(),
        transcript.capabilities,
        &config,
        clock.clone(),
    );

    let mut last_at = start;
    for (idx, timed) in transcript.events.iter().enumerate() {
        if timed.at_ms < last_at {
            return Err(Error::Transcript(format!(
                "event {idx} at {}ms precedes previous event at {last_at}ms",
                timed.at_ms
            )));
        }
        last_at = timed.at_ms;
        clock.set(timed.at_ms);

        match &timed.event {
            TranscriptEvent::Input(input) => {
                session.handle(input);
            }
            TranscriptEvent::Control(Control::Pause) => session.pause(),
            TranscriptEvent::Control(Control::Resume) => session.resume(),
            TranscriptEvent::Control(Control::Tick) => session.on_tick(),
            TranscriptEvent::Control(Control::Countdown) => session.start_countdown(),
        }
    }
    debug!(events = transcript.events.len(), "transcript replayed");

    let tracker = session.tracker();
    // Transcript timestamps may be relative, so they cannot identify the session
    let finished = session.finish().map(|done| CompletedSession {
        id: transcript.fingerprint(),
        ..done
    });
    let report = ReplayReport {
        target: transcript.target.clone(),
        completed: finished.is_some(),
        committed: tracker.committed_input(),
        metrics: session.metrics(),
        elapsed_ms: session.elapsed_ms(),
        ended_at_ms: last_at,
        mistakes: tracker.mistakes().values().copied().collect(),
        wpm_std_dev: wpm_std_dev(session.wpm_series()),
        session: finished,
    };
    info!(
        completed = report.completed,
        wpm = report.metrics.wpm,
        accuracy = report.metrics.accuracy,
        "replay finished"
    );
    Ok(report)
}
