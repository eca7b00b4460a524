//! Character-level Unicode classification for Hangul text.

const SYLLABLE_BASE: u32 = 0xAC00;
const SYLLABLE_LAST: u32 = 0xD7A3;
const MEDIAL_COUNT: u32 = 21;
const FINAL_COUNT: u32 = 28;

/// A precomposed syllable block (가..힣), the only Hangul unit that may be committed.
pub fn is_syllable(c: char) -> bool {
    (SYLLABLE_BASE..=SYLLABLE_LAST).contains(&(c as u32))
}

/// A standalone consonant or vowel letter, incomplete on its own.
///
/// Covers the conjoining Jamo block, the Compatibility Jamo block that IMEs
/// emit during composition, and both Jamo Extended blocks.
pub fn is_jamo(c: char) -> bool {
    ('\u{1100}'..='\u{11FF}').contains(&c)
        || ('\u{3130}'..='\u{318F}').contains(&c)
        || ('\u{A960}'..='\u{A97F}').contains(&c)
        || ('\u{D7B0}'..='\u{D7FF}').contains(&c)
}

/// Split a syllable into its (initial, medial, final) indices.
///
/// Final index 0 means the syllable has no final consonant.
pub fn decompose_syllable(c: char) -> Option<(u32, u32, u32)> {
    if !is_syllable(c) {
        return None;
    }
    let offset = c as u32 - SYLLABLE_BASE;
    let initial = offset / (MEDIAL_COUNT * FINAL_COUNT);
    let medial = (offset % (MEDIAL_COUNT * FINAL_COUNT)) / FINAL_COUNT;
    let fin = offset % FINAL_COUNT;
    Some((initial, medial, fin))
}

/// Complete syllables of `text`, in order, skipping everything else.
pub fn syllables(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().filter(|&c| is_syllable(c))
}
