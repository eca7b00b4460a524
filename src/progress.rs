//! Long-term progression: running averages, bests, streaks and tiers.
//!
//! `UserProgress` is only ever changed by folding one completed session
//! into it; history is never replayed.

use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::time_series::TimeSeriesPoint;

pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// A finished session, ready to be folded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    /// Unique per session; folds are idempotent on it
    pub id: u64,
    pub completed_on: NaiveDate,
    pub wpm: f64,
    pub cpm: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub characters_typed: u64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub wpm_series: Vec<TimeSeriesPoint>,
}

/// What the recent-session list keeps of each session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: u64,
    pub completed_on: NaiveDate,
    pub wpm: f64,
    pub cpm: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub characters_typed: u64,
    pub duration_seconds: f64,
}

impl From<&CompletedSession> for SessionSummary {
    fn from(s: &CompletedSession) -> Self {
        Self {
            id: s.id,
            completed_on: s.completed_on,
            wpm: s.wpm,
            cpm: s.cpm,
            accuracy: s.accuracy,
            consistency: s.consistency,
            characters_typed: s.characters_typed,
            duration_seconds: s.duration_seconds,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Master,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThreshold {
    pub tier: Tier,
    pub min_characters: u64,
    pub min_average_wpm: f64,
    pub min_average_accuracy: f64,
    pub min_sessions: u64,
}

/// Ordered lowest to highest
pub const TIER_THRESHOLDS: [TierThreshold; 6] = [
    TierThreshold {
        tier: Tier::Bronze,
        min_characters: 0,
        min_average_wpm: 0.0,
        min_average_accuracy: 0.0,
        min_sessions: 0,
    },
    TierThreshold {
        tier: Tier::Silver,
        min_characters: 2_000,
        min_average_wpm: 20.0,
        min_average_accuracy: 85.0,
        min_sessions: 5,
    },
    TierThreshold {
        tier: Tier::Gold,
        min_characters: 10_000,
        min_average_wpm: 35.0,
        min_average_accuracy: 90.0,
        min_sessions: 20,
    },
    TierThreshold {
        tier: Tier::Platinum,
        min_characters: 30_000,
        min_average_wpm: 50.0,
        min_average_accuracy: 93.0,
        min_sessions: 50,
    },
    TierThreshold {
        tier: Tier::Diamond,
        min_characters: 80_000,
        min_average_wpm: 70.0,
        min_average_accuracy: 95.0,
        min_sessions: 100,
    },
    TierThreshold {
        tier: Tier::Master,
        min_characters: 200_000,
        min_average_wpm: 90.0,
        min_average_accuracy: 97.0,
        min_sessions: 200,
    },
];

impl TierThreshold {
    pub fn is_met_by(&self, progress: &UserProgress) -> bool {
        progress.total_characters >= self.min_characters
            && progress.average_wpm >= self.min_average_wpm
            && progress.average_accuracy >= self.min_average_accuracy
            && progress.total_tests >= self.min_sessions
    }
}

/// Highest tier whose thresholds are all met
pub fn evaluate_tier(progress: &UserProgress) -> Tier {
    TIER_THRESHOLDS
        .iter()
        .rev()
        .find(|t| t.is_met_by(progress))
        .map_or(Tier::Bronze, |t| t.tier)
}

/// Persistable long-term statistics for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProgress {
    pub total_tests: u64,
    pub total_characters: u64,
    pub total_duration_seconds: f64,
    pub average_wpm: f64,
    pub average_cpm: f64,
    pub average_accuracy: f64,
    pub average_consistency: f64,
    pub best_wpm: f64,
    pub best_cpm: f64,
    pub best_accuracy: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_practice_on: Option<NaiveDate>,
    pub recent_sessions: VecDeque<SessionSummary>,
    /// Outlives `recent_sessions` trimming
    pub last_folded_id: Option<u64>,
    pub tier: Tier,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            total_tests: 0,
            total_characters: 0,
            total_duration_seconds: 0.0,
            average_wpm: 0.0,
            average_cpm: 0.0,
            average_accuracy: 0.0,
            average_consistency: 0.0,
            best_wpm: 0.0,
            best_cpm: 0.0,
            best_accuracy: 0.0,
            current_streak: 0,
            longest_streak: 0,
            last_practice_on: None,
            recent_sessions: VecDeque::new(),
            last_folded_id: None,
            tier: Tier::Bronze,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPromotion {
    pub old_tier: Tier,
    pub new_tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FoldOutcome {
    pub promotion: Option<TierPromotion>,
}

fn running_mean(old: f64, old_count: u64, value: f64) -> f64 {
    (old * old_count as f64 + value) / (old_count + 1) as f64
}

impl UserProgress {
    /// Fold one completed session in. Callers wanting duplicate protection
    /// go through [`ProgressAggregator::fold`].
    pub fn apply(&mut self, session: &CompletedSession, recent_limit: usize) -> FoldOutcome {
        let old_tier = self.tier;
        let n = self.total_tests;

        self.average_wpm = running_mean(self.average_wpm, n, session.wpm);
        self.average_cpm = running_mean(self.average_cpm, n, session.cpm);
        self.average_accuracy = running_mean(self.average_accuracy, n, session.accuracy);
        self.average_consistency = running_mean(self.average_consistency, n, session.consistency);

        self.best_wpm = self.best_wpm.max(session.wpm);
        self.best_cpm = self.best_cpm.max(session.cpm);
        self.best_accuracy = self.best_accuracy.max(session.accuracy);

        self.total_tests += 1;
        self.total_characters += session.characters_typed;
        self.total_duration_seconds += session.duration_seconds;

        self.update_streak(session.completed_on);

        self.last_folded_id = Some(session.id);
        self.recent_sessions.push_back(SessionSummary::from(session));
        while self.recent_sessions.len() > recent_limit {
            self.recent_sessions.pop_front();
        }

        self.tier = evaluate_tier(self);
        let promotion = (self.tier > old_tier).then_some(TierPromotion {
            old_tier,
            new_tier: self.tier,
        });
        FoldOutcome { promotion }
    }

    /// Whether `id` was already folded, as far as the snapshot remembers
    pub fn has_folded(&self, id: u64) -> bool {
        self.last_folded_id == Some(id) || self.recent_sessions.iter().any(|s| s.id == id)
    }

    fn update_streak(&mut self, day: NaiveDate) {
        match self.last_practice_on {
            None => self.current_streak = 1,
            Some(last) => {
                let gap = (day - last).num_days();
                match gap {
                    0 => {}
                    1 => self.current_streak += 1,
                    g if g > 1 => self.current_streak = 1,
                    // Clock went backwards; keep what we have
                    _ => return,
                }
            }
        }
        self.last_practice_on = Some(day);
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }
}

/// Owns `UserProgress` and guarantees at most one fold per completed session.
///
/// The guard lives in the snapshot itself, so it holds across process
/// restarts as long as the progress is saved and reloaded.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    progress: UserProgress,
    recent_limit: usize,
}

impl ProgressAggregator {
    pub fn new(progress: UserProgress) -> Self {
        Self {
            progress,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn into_progress(self) -> UserProgress {
        self.progress
    }

    /// Fold `session` unless it is a duplicate; `None` means nothing changed
    pub fn fold(&mut self, session: &CompletedSession) -> Option<FoldOutcome> {
        if self.progress.has_folded(session.id) {
            debug!(id = session.id, "session already folded");
            return None;
        }

        let outcome = self.progress.apply(session, self.recent_limit);
        if let Some(p) = outcome.promotion {
            info!(old = %p.old_tier, new = %p.new_tier, "tier promotion");
        }
        Some(outcome)
    }

    /// Explicit user reset
    pub fn reset(&mut self) {
        self.progress = UserProgress::default();
    }
}
