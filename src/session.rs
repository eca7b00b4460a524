use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::Millis;
use crate::metrics::{self, LiveMetrics, MetricCounts, RhythmStats};
use crate::states::{compute_states, CharacterState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    CountingDown { ends_at: Millis },
    Active,
    Paused,
    Completed,
}

/// One accepted commit. The log is append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystroke {
    pub ch: char,
    pub at: Millis,
    pub correct: bool,
    /// Time since the previous commit in the same unpaused stretch
    pub interval_ms: Option<Millis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mistake {
    pub position: usize,
    pub expected: char,
    pub actual: char,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTiming {
    pub start_time: Option<Millis>,
    pub first_keystroke_time: Option<Millis>,
    pub paused_accumulated_ms: Millis,
    pub pause_started_at: Option<Millis>,
}

impl SessionTiming {
    /// `first_keystroke_time`, falling back to `start_time`
    pub fn base_time(&self) -> Option<Millis> {
        self.first_keystroke_time.or(self.start_time)
    }
}

/// Authoritative input, keystroke log, mistakes and timing for one session
#[derive(Debug, Clone)]
pub struct SessionTracker {
    target: String,
    target_chars: Vec<char>,
    countdown_ms: Option<Millis>,
    phase: SessionPhase,
    committed: Vec<char>,
    keystrokes: Vec<Keystroke>,
    mistakes: BTreeMap<usize, Mistake>,
    timing: SessionTiming,
    rhythm: RhythmStats,
    last_keystroke_at: Option<Millis>,
    completed_at: Option<Millis>,
    composing: bool,
}

impl SessionTracker {
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        let target_chars = target.chars().collect();
        Self {
            target,
            target_chars,
            countdown_ms: None,
            phase: SessionPhase::Idle,
            committed: Vec::new(),
            keystrokes: Vec::new(),
            mistakes: BTreeMap::new(),
            timing: SessionTiming::default(),
            rhythm: RhythmStats::default(),
            last_keystroke_at: None,
            completed_at: None,
            composing: false,
        }
    }

    pub fn with_countdown(mut self, countdown_ms: Option<Millis>) -> Self {
        self.countdown_ms = countdown_ms;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn committed_input(&self) -> String {
        self.committed.iter().collect()
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    pub fn target_len(&self) -> usize {
        self.target_chars.len()
    }

    pub fn keystrokes(&self) -> &[Keystroke] {
        &self.keystrokes
    }

    pub fn mistakes(&self) -> &BTreeMap<usize, Mistake> {
        &self.mistakes
    }

    pub fn timing(&self) -> SessionTiming {
        self.timing
    }

    pub fn completed_at(&self) -> Option<Millis> {
        self.completed_at
    }

    /// Completed once every target character is committed and no IME
    /// composition is in flight. A full input with a pending composition
    /// completes when that composition ends.
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// Track whether the input source has a composition in flight
    pub fn set_composing(&mut self, composing: bool, now: Millis) {
        self.composing = composing;
        if !composing {
            self.try_complete(now);
        }
    }

    pub fn expected_char(&self, idx: usize) -> Option<char> {
        self.target_chars.get(idx).copied()
    }

    /// Begin the countdown, if one is configured; otherwise a no-op
    pub fn start_countdown(&mut self, now: Millis) {
        match (self.phase, self.countdown_ms) {
            (SessionPhase::Idle, Some(ms)) => {
                self.set_phase(SessionPhase::CountingDown {
                    ends_at: now.saturating_add(ms),
                });
            }
            _ => trace!(phase = %self.phase, "countdown not started"),
        }
    }

    /// Advance timers; promotes an expired countdown to `Active`
    pub fn tick(&mut self, now: Millis) {
        if let SessionPhase::CountingDown { ends_at } = self.phase {
            if now >= ends_at {
                self.timing.start_time = Some(ends_at);
                self.set_phase(SessionPhase::Active);
            }
        }
    }

    /// Append a committed character; returns whether it was accepted
    pub fn record_commit(&mut self, ch: char, now: Millis) -> bool {
        if matches!(self.phase, SessionPhase::Paused | SessionPhase::Completed) {
            debug!(phase = %self.phase, ch = %ch, "commit ignored");
            return false;
        }

        let position = self.committed.len();
        let Some(expected) = self.expected_char(position) else {
            debug!(ch = %ch, "commit past end of target ignored");
            return false;
        };

        if self.phase != SessionPhase::Active {
            self.activate(now);
        }

        if self.timing.first_keystroke_time.is_none() {
            self.timing.first_keystroke_time = Some(now);
        }

        let interval_ms = self
            .last_keystroke_at
            .map(|last| now.saturating_sub(last))
            .filter(|&ms| ms > 0);
        if let Some(ms) = interval_ms {
            self.rhythm.push(ms as f64);
        }
        self.last_keystroke_at = Some(now);

        let correct = ch == expected;
        self.keystrokes.push(Keystroke {
            ch,
            at: now,
            correct,
            interval_ms,
        });
        if correct {
            self.mistakes.remove(&position);
        } else {
            self.mistakes.insert(
                position,
                Mistake {
                    position,
                    expected,
                    actual: ch,
                },
            );
        }
        self.committed.push(ch);
        self.try_complete(now);
        true
    }

    /// Un-type the last committed character; the keystroke log keeps it
    pub fn record_removal(&mut self) -> bool {
        if !matches!(self.phase, SessionPhase::Active | SessionPhase::Paused) {
            debug!(phase = %self.phase, "removal ignored");
            return false;
        }
        if self.committed.pop().is_none() {
            return false;
        }
        self.mistakes.remove(&self.committed.len());
        true
    }

    pub fn pause(&mut self, now: Millis) {
        if self.phase != SessionPhase::Active {
            debug!(phase = %self.phase, "pause ignored");
            return;
        }
        self.timing.pause_started_at = Some(now);
        // No interval is measured across a pause
        self.last_keystroke_at = None;
        self.set_phase(SessionPhase::Paused);
    }

    pub fn resume(&mut self, now: Millis) {
        if self.phase != SessionPhase::Paused {
            debug!(phase = %self.phase, "resume ignored");
            return;
        }
        let started = self.timing.pause_started_at.take();
        // Pauses before the first keystroke fall before the base time
        if let (Some(started), Some(first)) = (started, self.timing.first_keystroke_time) {
            self.timing.paused_accumulated_ms += now.saturating_sub(started.max(first));
        }
        self.set_phase(SessionPhase::Active);
        self.try_complete(now);
    }

    /// Back to `Idle` with everything cleared
    pub fn restart(&mut self) {
        let target = std::mem::take(&mut self.target);
        let countdown_ms = self.countdown_ms;
        *self = SessionTracker::new(target).with_countdown(countdown_ms);
        debug!("session restarted");
    }

    pub fn stop(&mut self) {
        self.restart();
    }

    /// Active time, excluding pauses; frozen once completed
    pub fn elapsed_ms(&self, now: Millis) -> Millis {
        let Some(base) = self.timing.base_time() else {
            return 0;
        };
        let end = match (self.phase, self.completed_at, self.timing.pause_started_at) {
            (SessionPhase::Completed, Some(done), _) => done,
            (SessionPhase::Paused, _, Some(paused)) => paused.max(base),
            _ => now,
        };
        end.saturating_sub(base)
            .saturating_sub(self.timing.paused_accumulated_ms)
    }

    pub fn character_states(&self) -> Vec<CharacterState> {
        compute_states(
            &self.target,
            self.committed.len(),
            self.mistakes.keys().copied(),
        )
    }

    /// Metrics from running counters, O(1)
    pub fn live_metrics(&self, now: Millis) -> LiveMetrics {
        let counts = MetricCounts {
            committed: self.committed.len(),
            keystrokes: self.keystrokes.len(),
            mistakes: self.mistakes.len(),
        };
        let elapsed_secs = self.elapsed_ms(now) as f64 / 1000.0;
        metrics::from_counts(counts, elapsed_secs, self.rhythm.consistency())
    }

    fn activate(&mut self, now: Millis) {
        if self.timing.start_time.is_none() {
            self.timing.start_time = Some(now);
        }
        self.set_phase(SessionPhase::Active);
    }

    fn try_complete(&mut self, now: Millis) {
        let full = self.committed.len() >= self.target_chars.len();
        if self.phase == SessionPhase::Active && full && !self.composing {
            self.completed_at = Some(now);
            self.set_phase(SessionPhase::Completed);
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "session phase");
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn type_str(tracker: &mut SessionTracker, text: &str, start: Millis, step: Millis) -> Millis {
        let mut now = start;
        for ch in text.chars() {
            tracker.record_commit(ch, now);
            now += step;
        }
        now
    }

    #[test]
    fn test_completion_waits_for_composition() {
        let mut tracker = SessionTracker::new("ab");
        tracker.record_commit('a', 0);
        tracker.set_composing(true, 50);
        tracker.record_commit('b', 100);
        assert_eq!(tracker.committed_len(), 2);
        assert!(!tracker.is_complete());
        assert_eq!(tracker.phase(), SessionPhase::Active);

        tracker.set_composing(false, 300);
        assert!(tracker.is_complete());
        assert_eq!(tracker.completed_at(), Some(300));
        assert_eq!(tracker.elapsed_ms(1_000), 300);
    }

    #[test]
    fn test_new_tracker_is_idle() {
        let tracker = SessionTracker::new("hello");
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        assert_eq!(tracker.committed_len(), 0);
        assert_eq!(tracker.target_len(), 5);
        assert_eq!(tracker.elapsed_ms(10_000), 0);
    }

    #[test]
    fn test_first_commit_activates() {
        let mut tracker = SessionTracker::new("hi");
        assert!(tracker.record_commit('h', 1_000));
        assert_eq!(tracker.phase(), SessionPhase::Active);
        assert_eq!(tracker.timing().start_time, Some(1_000));
        assert_eq!(tracker.timing().first_keystroke_time, Some(1_000));
    }

    #[test]
    fn test_completion_on_full_input() {
        let mut tracker = SessionTracker::new("hello world");
        type_str(&mut tracker, "hello world", 0, 100);

        assert!(tracker.is_complete());
        assert_eq!(tracker.committed_input(), "hello world");
        assert!(tracker.mistakes().is_empty());
        let m = tracker.live_metrics(5_000);
        assert_eq!(m.accuracy, 100.0);
        // 11 correct characters in 1.0s of typing
        assert_eq!(tracker.elapsed_ms(5_000), 1_000);
        assert_eq!(m.cpm, 660.0);
    }

    #[test]
    fn test_mistake_recorded_at_position() {
        let mut tracker = SessionTracker::new("test");
        type_str(&mut tracker, "tezt", 0, 100);

        assert_eq!(
            tracker.mistakes().get(&2),
            Some(&Mistake {
                position: 2,
                expected: 's',
                actual: 'z'
            })
        );
        assert_eq!(tracker.live_metrics(400).accuracy, 75.0);
    }

    #[test]
    fn test_backspace_clears_mistake() {
        let mut tracker = SessionTracker::new("test");
        let now = type_str(&mut tracker, "tez", 0, 100);
        assert!(tracker.record_removal());
        assert!(tracker.mistakes().is_empty());
        type_str(&mut tracker, "st", now + 100, 100);

        assert!(tracker.is_complete());
        assert_eq!(tracker.keystrokes().len(), 5);
        assert_eq!(tracker.live_metrics(1_000).accuracy, 100.0);
    }

    #[test]
    fn test_commits_rejected_when_paused_or_completed() {
        let mut tracker = SessionTracker::new("ab");
        tracker.record_commit('a', 0);
        tracker.pause(10);
        assert!(!tracker.record_commit('b', 20));
        assert_eq!(tracker.committed_len(), 1);

        tracker.resume(30);
        assert!(tracker.record_commit('b', 40));
        assert!(tracker.is_complete());
        assert!(!tracker.record_commit('c', 50));
        assert_eq!(tracker.keystrokes().len(), 2);
    }

    #[test]
    fn test_removal_outside_valid_phase_is_noop() {
        let mut tracker = SessionTracker::new("ab");
        assert!(!tracker.record_removal());

        type_str(&mut tracker, "ab", 0, 10);
        assert!(!tracker.record_removal());
        assert_eq!(tracker.committed_len(), 2);
    }

    #[test]
    fn test_removal_while_paused_allowed() {
        let mut tracker = SessionTracker::new("abc");
        type_str(&mut tracker, "ab", 0, 10);
        tracker.pause(50);
        assert!(tracker.record_removal());
        assert_eq!(tracker.committed_input(), "a");
    }

    #[test]
    fn test_removal_on_empty_input() {
        let mut tracker = SessionTracker::new("abc");
        tracker.record_commit('a', 0);
        assert!(tracker.record_removal());
        assert!(!tracker.record_removal());
        assert_eq!(tracker.committed_len(), 0);
    }

    #[test]
    fn test_pause_excluded_from_elapsed() {
        let mut tracker = SessionTracker::new("abcdef");
        tracker.record_commit('a', 0);
        tracker.pause(2_000);
        assert_eq!(tracker.elapsed_ms(4_000), 2_000);
        tracker.resume(7_000);
        tracker.record_commit('b', 10_000);

        assert_eq!(tracker.timing().paused_accumulated_ms, 5_000);
        assert_eq!(tracker.elapsed_ms(10_000), 5_000);
    }

    #[test]
    fn test_repeated_pauses_accumulate() {
        let mut tracker = SessionTracker::new("abcdef");
        tracker.record_commit('a', 0);
        let mut paused_total = 0;
        let mut now = 0;
        for _ in 0..4 {
            now += 1_000;
            tracker.pause(now);
            now += 500;
            tracker.resume(now);
            paused_total += 500;
        }
        now += 1_000;
        assert_eq!(tracker.elapsed_ms(now), now - paused_total);
    }

    #[test]
    fn test_pause_and_resume_ignored_in_wrong_phase() {
        let mut tracker = SessionTracker::new("ab");
        tracker.pause(0);
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        tracker.resume(10);
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        assert_eq!(tracker.timing().paused_accumulated_ms, 0);
    }

    #[test]
    fn test_pause_before_first_keystroke_not_subtracted() {
        let mut tracker = SessionTracker::new("ab").with_countdown(Some(1_000));
        tracker.start_countdown(0);
        tracker.tick(1_000);
        tracker.pause(1_200);
        tracker.resume(1_800);
        tracker.record_commit('a', 3_000);

        assert_eq!(tracker.timing().paused_accumulated_ms, 0);
        assert_eq!(tracker.elapsed_ms(3_500), 500);
    }

    #[test]
    fn test_elapsed_never_negative() {
        let mut tracker = SessionTracker::new("ab");
        tracker.record_commit('a', 5_000);
        assert_eq!(tracker.elapsed_ms(1_000), 0);
    }

    #[test]
    fn test_elapsed_frozen_after_completion() {
        let mut tracker = SessionTracker::new("ab");
        tracker.record_commit('a', 0);
        tracker.record_commit('b', 800);
        assert_eq!(tracker.elapsed_ms(60_000), 800);
    }

    #[test]
    fn test_countdown_then_active() {
        let mut tracker = SessionTracker::new("ab").with_countdown(Some(3_000));
        tracker.start_countdown(1_000);
        assert_matches!(tracker.phase(), SessionPhase::CountingDown { ends_at: 4_000 });

        tracker.tick(3_999);
        assert_matches!(tracker.phase(), SessionPhase::CountingDown { .. });
        tracker.tick(4_000);
        assert_eq!(tracker.phase(), SessionPhase::Active);
        assert_eq!(tracker.timing().start_time, Some(4_000));
        assert_eq!(tracker.elapsed_ms(5_000), 1_000);
    }

    #[test]
    fn test_commit_during_countdown_activates() {
        let mut tracker = SessionTracker::new("ab").with_countdown(Some(3_000));
        tracker.start_countdown(0);
        assert!(tracker.record_commit('a', 1_000));
        assert_eq!(tracker.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_countdown_without_config_is_noop() {
        let mut tracker = SessionTracker::new("ab");
        tracker.start_countdown(0);
        assert_eq!(tracker.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_restart_clears_everything() {
        let mut tracker = SessionTracker::new("abc").with_countdown(Some(1_000));
        tracker.record_commit('x', 0);
        tracker.restart();

        assert_eq!(tracker.phase(), SessionPhase::Idle);
        assert_eq!(tracker.target(), "abc");
        assert!(tracker.keystrokes().is_empty());
        assert!(tracker.mistakes().is_empty());
        assert_eq!(tracker.timing(), SessionTiming::default());

        tracker.start_countdown(0);
        assert_matches!(tracker.phase(), SessionPhase::CountingDown { .. });
    }

    #[test]
    fn test_empty_target_never_accepts() {
        let mut tracker = SessionTracker::new("");
        assert!(!tracker.record_commit('a', 0));
        assert!(tracker.character_states().is_empty());
    }

    #[test]
    fn test_intervals_skip_pause() {
        let mut tracker = SessionTracker::new("abcd");
        tracker.record_commit('a', 0);
        tracker.record_commit('b', 100);
        tracker.pause(150);
        tracker.resume(10_000);
        tracker.record_commit('c', 10_050);
        tracker.record_commit('d', 10_150);

        let intervals: Vec<_> = tracker.keystrokes().iter().map(|k| k.interval_ms).collect();
        assert_eq!(intervals, vec![None, Some(100), None, Some(100)]);
        assert_eq!(tracker.live_metrics(10_150).consistency, 100.0);
    }

    #[test]
    fn test_live_metrics_match_rescan() {
        let mut tracker = SessionTracker::new("typing test");
        let steps = [0, 130, 250, 420, 500, 700, 760, 900, 1_100, 1_180, 1_400];
        for (ch, at) in "typong tesy".chars().zip(steps) {
            tracker.record_commit(ch, at);
        }
        let now = 1_400;
        let live = tracker.live_metrics(now);
        let rescan = metrics::compute_metrics(
            tracker.keystrokes(),
            tracker.mistakes(),
            tracker.committed_len(),
            tracker.elapsed_ms(now) as f64 / 1000.0,
        );
        assert_eq!(live.cpm, rescan.cpm);
        assert_eq!(live.accuracy, rescan.accuracy);
        assert!((live.consistency - rescan.consistency).abs() < 1e-9);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SessionPhase::Paused.to_string(), "paused");
        assert_eq!(SessionPhase::Active.to_string(), "active");
    }
}
