use std::collections::HashSet;

use serde::Serialize;
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CharStatus {
    Pending,
    Current,
    Incorrect,
    Correct,
}

/// Whitespace that presentation draws as a glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SpecialKey {
    Space,
    Enter,
    Tab,
}

impl SpecialKey {
    pub fn of(c: char) -> Option<Self> {
        match c {
            ' ' => Some(SpecialKey::Space),
            '\n' => Some(SpecialKey::Enter),
            '\t' => Some(SpecialKey::Tab),
            _ => None,
        }
    }
}

/// Display state of one target character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharacterState {
    pub ch: char,
    pub index: usize,
    pub status: CharStatus,
    pub special_key: Option<SpecialKey>,
    /// Terminal/grid columns the glyph occupies (Hangul syllables take two)
    pub width: usize,
}

/// Per-character states for `target` given how much has been committed.
///
/// Exactly one character is `Current` while input is shorter than the
/// target; none once it is complete.
pub fn compute_states<I>(
    target: &str,
    committed_len: usize,
    mistake_positions: I,
) -> Vec<CharacterState>
where
    I: IntoIterator<Item = usize>,
{
    let mistakes: HashSet<usize> = mistake_positions.into_iter().collect();

    target
        .chars()
        .enumerate()
        .map(|(index, ch)| {
            let status = if index < committed_len {
                if mistakes.contains(&index) {
                    CharStatus::Incorrect
                } else {
                    CharStatus::Correct
                }
            } else if index == committed_len {
                CharStatus::Current
            } else {
                CharStatus::Pending
            };

            CharacterState {
                ch,
                index,
                status,
                special_key: SpecialKey::of(ch),
                width: ch.width().unwrap_or(0),
            }
        })
        .collect()
}

/// Split states into word groups for layout; each space stays with the word before it.
pub fn group_words(states: &[CharacterState]) -> Vec<&[CharacterState]> {
    states
        .split_inclusive(|s| s.special_key == Some(SpecialKey::Space))
        .collect()
}
