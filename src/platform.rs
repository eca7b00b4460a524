use serde::{Deserialize, Serialize};

use crate::clock::Millis;

const PHYSICAL_DEDUP_MS: Millis = 20;
const VIRTUAL_DEDUP_MS: Millis = 80;
const TABLET_DEDUP_MS: Millis = 120;
const IPAD_DEDUP_MS: Millis = 150;

/// What the host environment reports about the input device.
///
/// Detection itself lives outside the core; this is plain data.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct Capabilities {
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_virtual_keyboard: bool,
    pub is_ios: bool,
}

/// Input handling knobs derived from the capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPolicy {
    /// Same-character commits closer together than this are treated as a double fire
    pub dedup_window_ms: Millis,
}

impl InputPolicy {
    pub fn for_capabilities(caps: &Capabilities) -> Self {
        let dedup_window_ms = if caps.is_tablet && caps.is_ios {
            IPAD_DEDUP_MS
        } else if caps.is_tablet {
            TABLET_DEDUP_MS
        } else if caps.is_mobile || caps.is_virtual_keyboard {
            VIRTUAL_DEDUP_MS
        } else {
            PHYSICAL_DEDUP_MS
        };
        Self { dedup_window_ms }
    }

    pub fn with_dedup_override(mut self, window: Option<Millis>) -> Self {
        if let Some(ms) = window {
            self.dedup_window_ms = ms;
        }
        self
    }
}

impl Default for InputPolicy {
    fn default() -> Self {
        Self::for_capabilities(&Capabilities::default())
    }
}
