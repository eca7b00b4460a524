use chrono::{Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::{Clock, Millis, SystemClock};
use crate::config::Config;
use crate::metrics::LiveMetrics;
use crate::normalizer::{InputAction, Key, Normalizer};
use crate::platform::{Capabilities, InputPolicy};
use crate::progress::CompletedSession;
use crate::session::{SessionPhase, SessionTracker};
use crate::states::{group_words, CharacterState};
use crate::time_series::TimeSeriesPoint;

/// Raw input as the host delivers it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Key { key: Key },
    CompositionStart,
    CompositionUpdate { data: String },
    CompositionEnd { data: String },
}

/// One practice run: input normalization feeding the session tracker,
/// with rendering state and live metrics pulled on demand.
#[derive(Debug)]
pub struct PracticeSession<C: Clock = SystemClock> {
    clock: C,
    normalizer: Normalizer,
    tracker: SessionTracker,
    sample_interval_ms: Millis,
    wpm_series: Vec<TimeSeriesPoint>,
    last_sample_at: Option<Millis>,
}

impl PracticeSession<SystemClock> {
    pub fn new(target: impl Into<String>, capabilities: Capabilities, config: &Config) -> Self {
        Self::with_clock(target, capabilities, config, SystemClock)
    }
}

impl<C: Clock> PracticeSession<C> {
    pub fn with_clock(
        target: impl Into<String>,
        capabilities: Capabilities,
        config: &Config,
        clock: C,
    ) -> Self {
        let policy =
            InputPolicy::for_capabilities(&capabilities).with_dedup_override(config.dedup_window_ms);
        Self {
            clock,
            normalizer: Normalizer::new(policy),
            tracker: SessionTracker::new(target).with_countdown(config.countdown_ms),
            sample_interval_ms: config.sample_interval_ms,
            wpm_series: Vec::new(),
            last_sample_at: None,
        }
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Run one raw event through the pipeline; returns how many actions were applied
    pub fn handle(&mut self, event: &InputEvent) -> usize {
        let now = self.clock.now_ms();
        let actions = match event {
            InputEvent::Key { key } => self.normalizer.on_direct_key(key, now),
            InputEvent::CompositionStart => self.normalizer.on_composition_start(now),
            InputEvent::CompositionUpdate { data } => {
                self.normalizer.on_composition_update(data);
                Vec::new()
            }
            InputEvent::CompositionEnd { data } => self.normalizer.on_composition_end(data, now),
        };

        self.tracker
            .set_composing(self.normalizer.is_composing(), now);

        let mut applied = 0;
        for action in actions {
            let accepted = match action {
                InputAction::Commit(ch) => self.tracker.record_commit(ch, now),
                InputAction::Remove => self.tracker.record_removal(),
            };
            if accepted {
                applied += 1;
            }
        }
        trace!(?event, applied, "event handled");
        applied
    }

    pub fn start_countdown(&mut self) {
        let now = self.clock.now_ms();
        self.tracker.start_countdown(now);
    }

    pub fn pause(&mut self) {
        let now = self.clock.now_ms();
        self.tracker.pause(now);
    }

    pub fn resume(&mut self) {
        let now = self.clock.now_ms();
        self.tracker.resume(now);
    }

    pub fn restart(&mut self) {
        self.normalizer.reset();
        self.tracker.restart();
        self.wpm_series.clear();
        self.last_sample_at = None;
    }

    /// Periodic timer: countdown expiry and live WPM sampling
    pub fn on_tick(&mut self) {
        let now = self.clock.now_ms();
        self.tracker.tick(now);

        if self.tracker.phase() != SessionPhase::Active {
            return;
        }
        if self.tracker.timing().base_time().is_none() {
            return;
        }
        let due = self
            .last_sample_at
            .map_or(true, |last| now.saturating_sub(last) >= self.sample_interval_ms);
        if due {
            let t = self.tracker.elapsed_ms(now) as f64 / 1000.0;
            let wpm = self.tracker.live_metrics(now).wpm;
            self.wpm_series.push(TimeSeriesPoint::new(t, wpm));
            self.last_sample_at = Some(now);
        }
    }

    pub fn states(&self) -> Vec<CharacterState> {
        self.tracker.character_states()
    }

    /// Character states grouped into words for layout
    pub fn words(&self) -> Vec<Vec<CharacterState>> {
        let states = self.states();
        group_words(&states).into_iter().map(<[_]>::to_vec).collect()
    }

    pub fn metrics(&self) -> LiveMetrics {
        self.tracker.live_metrics(self.clock.now_ms())
    }

    pub fn elapsed_ms(&self) -> Millis {
        self.tracker.elapsed_ms(self.clock.now_ms())
    }

    pub fn wpm_series(&self) -> &[TimeSeriesPoint] {
        &self.wpm_series
    }

    pub fn is_complete(&self) -> bool {
        self.tracker.is_complete()
    }

    /// The finished session, or `None` while it is still running
    pub fn finish(&self) -> Option<CompletedSession> {
        if !self.is_complete() {
            return None;
        }
        let timing = self.tracker.timing();
        let done = self.tracker.completed_at()?;
        let metrics = self.tracker.live_metrics(done);

        Some(CompletedSession {
            id: timing.base_time().unwrap_or(done),
            completed_on: local_date(done),
            wpm: metrics.wpm,
            cpm: metrics.cpm,
            accuracy: metrics.accuracy,
            consistency: metrics.consistency,
            characters_typed: self.tracker.committed_len() as u64,
            duration_seconds: self.tracker.elapsed_ms(done) as f64 / 1000.0,
            wpm_series: self.wpm_series.clone(),
        })
    }
}

/// Calendar day of a millisecond timestamp in local time
pub fn local_date(at: Millis) -> NaiveDate {
    Local
        .timestamp_millis_opt(at as i64)
        .earliest()
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Local::now().date_naive())
}
