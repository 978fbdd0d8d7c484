//! Gamma correction for LED output.
//!
//! Average screen colors are linear-ish; LED strips render them too bright
//! in the low range without a perceptual correction curve. Three
//! interchangeable strategies are provided: a per-call power-law formula, a
//! lookup table precomputed from that formula at startup, and a hand-tuned
//! table for WS28xx-style strips.

use crate::color::Rgb;

/// Hand-tuned 8-bit gamma table for WS28xx-style LED strips.
///
/// Monotone non-decreasing, maps 0 to 0 and 255 to 255.
const LED_GAMMA8: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, //
    2, 3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 5, 5, 5, //
    5, 6, 6, 6, 6, 7, 7, 7, 7, 8, 8, 8, 9, 9, 9, 10, //
    10, 10, 11, 11, 11, 12, 12, 13, 13, 13, 14, 14, 15, 15, 16, 16, //
    17, 17, 18, 18, 19, 19, 20, 20, 21, 21, 22, 22, 23, 24, 24, 25, //
    25, 26, 27, 27, 28, 29, 29, 30, 31, 32, 32, 33, 34, 35, 35, 36, //
    37, 38, 39, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 50, //
    51, 52, 54, 55, 56, 57, 58, 59, 60, 61, 62, 63, 64, 66, 67, 68, //
    69, 70, 72, 73, 74, 75, 77, 78, 79, 81, 82, 83, 85, 86, 87, 89, //
    90, 92, 93, 95, 96, 98, 99, 101, 102, 104, 105, 107, 109, 110, 112, 114, //
    115, 117, 119, 120, 122, 124, 126, 127, 129, 131, 133, 135, 137, 138, 140, 142, //
    144, 146, 148, 150, 152, 154, 156, 158, 160, 162, 164, 167, 169, 171, 173, 175, //
    177, 180, 182, 184, 186, 189, 191, 193, 196, 198, 200, 203, 205, 208, 210, 213, //
    215, 218, 220, 223, 225, 228, 231, 233, 236, 239, 241, 244, 247, 249, 252, 255, //
];

/// Which correction strategy the corrector uses.
///
/// All three are interchangeable in output contract: [0, 255] in, [0, 255]
/// out, monotone per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionMode {
    /// Evaluate the power-law formula per channel on every correction.
    /// Useful when gamma must stay runtime-tunable.
    Computed,
    /// Precompute a 256-entry table from the formula once at startup.
    /// Zero floating point per tick; the default.
    #[default]
    Tabulated,
    /// Use the hand-tuned LED table instead of the formula.
    HandTuned,
}

/// Maps averaged colors through a perceptual correction curve.
#[derive(Debug, Clone)]
pub struct GammaCorrector {
    strategy: Strategy,
}

#[derive(Debug, Clone)]
enum Strategy {
    Computed { gamma: f64 },
    Table(Box<[u8; 256]>),
}

impl GammaCorrector {
    /// Per-call power-law correction with the given gamma.
    pub fn computed(gamma: f64) -> Self {
        Self {
            strategy: Strategy::Computed { gamma },
        }
    }

    /// Table-based correction, built once from the power-law formula.
    pub fn tabulated(gamma: f64) -> Self {
        let mut table = [0u8; 256];
        for (input, slot) in table.iter_mut().enumerate() {
            *slot = formula(input as u8, gamma);
        }
        Self {
            strategy: Strategy::Table(Box::new(table)),
        }
    }

    /// Table-based correction using the hand-tuned LED curve. Ignores the
    /// configured gamma value.
    pub fn hand_tuned_table() -> Self {
        Self {
            strategy: Strategy::Table(Box::new(LED_GAMMA8)),
        }
    }

    /// Build the corrector selected by configuration.
    pub fn from_mode(mode: CorrectionMode, gamma: f64) -> Self {
        match mode {
            CorrectionMode::Computed => Self::computed(gamma),
            CorrectionMode::Tabulated => Self::tabulated(gamma),
            CorrectionMode::HandTuned => Self::hand_tuned_table(),
        }
    }

    /// Correct all three channels of a color.
    pub fn correct(&self, rgb: Rgb) -> Rgb {
        Rgb::new(
            self.correct_channel(rgb.r),
            self.correct_channel(rgb.g),
            self.correct_channel(rgb.b),
        )
    }

    fn correct_channel(&self, channel: u8) -> u8 {
        match &self.strategy {
            Strategy::Computed { gamma } => formula(channel, *gamma),
            Strategy::Table(table) => table[channel as usize],
        }
    }
}

/// `round(255 * (c/255)^gamma)`, clamped so no input can escape [0, 255].
fn formula(channel: u8, gamma: f64) -> u8 {
    let normalized = f64::from(channel) / 255.0;
    (255.0 * normalized.powf(gamma)).round().clamp(0.0, 255.0) as u8
}
