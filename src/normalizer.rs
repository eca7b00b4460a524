//! Turns raw key and IME composition events into an ordered stream of
//! committed characters and removals.
//!
//! Direct keys (ASCII, space, Enter, Tab, Backspace) commit immediately.
//! Hangul arrives through composition events: updates only move the
//! single in-flight buffer, and only the complete syllables present at
//! composition end are committed. Lone jamo are never committed.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::Millis;
use crate::hangul;
use crate::platform::InputPolicy;

/// A key delivered outside of IME composition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    /// Any other named key (Shift, ArrowLeft, ...); always ignored
    Other(String),
}

/// What the normalizer asks the session to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Commit(char),
    Remove,
}

#[derive(Debug, Clone, Copy)]
struct LastCommit {
    ch: char,
    at: Millis,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: InputPolicy,
    composing: bool,
    buffer: Option<char>,
    last_commit: Option<LastCommit>,
}

impl Normalizer {
    pub fn new(policy: InputPolicy) -> Self {
        Self {
            policy,
            composing: false,
            buffer: None,
            last_commit: None,
        }
    }

    pub fn policy(&self) -> InputPolicy {
        self.policy
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// The partially composed character, if any
    pub fn buffer(&self) -> Option<char> {
        self.buffer
    }

    pub fn on_direct_key(&mut self, key: &Key, at: Millis) -> Vec<InputAction> {
        match key {
            Key::Backspace => self.backspace(),
            Key::Enter => self.commit('\n', at).into_iter().collect(),
            Key::Tab => self.commit('\t', at).into_iter().collect(),
            Key::Char(c) if is_direct_commit(*c) => self.commit(*c, at).into_iter().collect(),
            Key::Char(c) => {
                trace!(ch = %c, jamo = hangul::is_jamo(*c), "rejected direct key");
                Vec::new()
            }
            Key::Other(name) => {
                trace!(key = %name, "ignored key");
                Vec::new()
            }
        }
    }

    pub fn on_composition_start(&mut self, at: Millis) -> Vec<InputAction> {
        let mut actions = Vec::new();
        if self.composing {
            // A new composition without an end for the previous one
            debug!(buffer = ?self.buffer, "composition restarted while in flight");
            if let Some(pending) = self.buffer.take() {
                actions.extend(self.commit_syllables(&pending.to_string(), at));
            }
        }
        self.composing = true;
        self.buffer = None;
        actions
    }

    pub fn on_composition_update(&mut self, partial: &str) {
        if !self.composing {
            debug!(partial, "composition update without start");
            self.composing = true;
        }
        self.buffer = partial.chars().last();
    }

    pub fn on_composition_end(&mut self, fin: &str, at: Millis) -> Vec<InputAction> {
        if !self.composing {
            debug!(fin, "composition end without start, treating as direct commit");
        }
        self.composing = false;
        self.buffer = None;
        self.commit_syllables(fin, at)
    }

    /// Drop any in-flight composition and duplicate guard
    pub fn reset(&mut self) {
        self.composing = false;
        self.buffer = None;
        self.last_commit = None;
    }

    fn backspace(&mut self) -> Vec<InputAction> {
        if self.composing {
            trace!(buffer = ?self.buffer, "backspace cancelled composition");
            self.composing = false;
            self.buffer = None;
            return Vec::new();
        }
        // A retype after a removal is never a double fire
        self.last_commit = None;
        vec![InputAction::Remove]
    }

    /// Only the first syllable of a payload is checked against the previous
    /// event; repeats inside one payload are real text.
    fn commit_syllables(&mut self, text: &str, at: Millis) -> Vec<InputAction> {
        let mut syllables = hangul::syllables(text);
        let Some(first) = syllables.next() else {
            return Vec::new();
        };
        let mut actions: Vec<InputAction> = self.commit(first, at).into_iter().collect();
        for ch in syllables {
            actions.push(self.accept(ch, at));
        }
        actions
    }

    fn commit(&mut self, ch: char, at: Millis) -> Option<InputAction> {
        if let Some(last) = self.last_commit {
            let within = at.saturating_sub(last.at) < self.policy.dedup_window_ms;
            if last.ch == ch && within {
                debug!(ch = %ch, gap_ms = at.saturating_sub(last.at), "suppressed duplicate commit");
                // One duplicate per commit; a third arrival is genuine
                self.last_commit = None;
                return None;
            }
        }
        Some(self.accept(ch, at))
    }

    fn accept(&mut self, ch: char, at: Millis) -> InputAction {
        self.last_commit = Some(LastCommit { ch, at });
        InputAction::Commit(ch)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(InputPolicy::default())
    }
}

fn is_direct_commit(c: char) -> bool {
    c == ' ' || c.is_ascii_graphic() || hangul::is_syllable(c)
}
