//! Change gate deciding whether a corrected color is worth transmitting.
//!
//! Screen content that is visually static still jitters by a count or two
//! per channel from quantization; publishing every tick would spam the
//! controller. The gate suppresses deltas at or below a fixed per-channel
//! threshold and lets anything larger through.

use crate::color::Rgb;

/// Default per-channel change threshold.
pub const DEFAULT_CHANGE_THRESHOLD: u8 = 5;

/// Per-channel hysteresis filter over the last published color.
#[derive(Debug, Clone, Copy)]
pub struct ChangeGate {
    threshold: u8,
}

impl ChangeGate {
    /// Create a gate with the given per-channel threshold.
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    /// The configured threshold.
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// True when any channel of `new` differs from `last_published` by more
    /// than the threshold. One channel exceeding is enough; this is noise
    /// suppression, not color accuracy.
    pub fn should_publish(&self, new: Rgb, last_published: Rgb) -> bool {
        new.r.abs_diff(last_published.r) > self.threshold
            || new.g.abs_diff(last_published.g) > self.threshold
            || new.b.abs_diff(last_published.b) > self.threshold
    }
}

impl Default for ChangeGate {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_THRESHOLD)
    }
}
