//! "Air" effect: one-pole high-shelf brightening filter.

use crate::fixed::{clamp_i16, db_to_linear, linear_to_db};

/// Shelf crossover, ~0.75 in Q16 (cutoff near 5-6 kHz at 22 kHz).
pub const AIR_SHELF_ALPHA: u16 = 49152;
/// Default shelf gain, ~1.5 in Q16 (high-frequency boost ~ +1.6 dB).
pub const AIR_SHELF_GAIN_DEFAULT: u32 = 98304;
/// Runtime boost cap, ~2.0x. Keeps the shelf out of harsh-clipping range.
pub const AIR_SHELF_GAIN_MAX: u32 = 131072;

/// Preset table in dB of high-frequency boost. Index 0 is reserved for
/// "effect disabled"; selecting any other index sets the gain and enables
/// the effect in one step.
pub const AIR_PRESETS_DB: [f32; 4] = [0.0, 1.0, 2.0, 3.0];

/// High-shelf filter:
///
/// ```text
/// high  = x - x_prev
/// boost = ((high * (65536 - alpha)) >> 16 * gain) >> 16
/// y     = (alpha*x) >> 16 + ((65536 - alpha)*y_prev) >> 16 + boost
/// ```
///
/// The Q16 products are widened to 64 bits before shifting.
#[derive(Debug, Default)]
pub struct AirShelf {
    prev_input: i32,
    prev_output: i32,
}

impl AirShelf {
    /// Processes one sample with the given runtime shelf gain.
    pub fn process_sample(&mut self, input: i16, shelf_gain_q16: u32) -> i16 {
        let alpha = i64::from(AIR_SHELF_ALPHA);
        let one_minus_alpha = 65536 - alpha;

        let high_freq = i64::from(input) - i64::from(self.prev_input);
        let boost = ((high_freq * one_minus_alpha) >> 16) * i64::from(shelf_gain_q16) >> 16;

        let output = (alpha * i64::from(input) >> 16)
            + (one_minus_alpha * i64::from(self.prev_output) >> 16)
            + boost;

        self.prev_input = i32::from(input);
        self.prev_output = output as i32;
        clamp_i16(output as i32)
    }

    /// Zeroes the filter history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Converts a desired high-frequency boost (at `w = pi`) to the internal
/// Q16 shelf gain: `H_pi = 10^(db/20)`, `G = (H_pi*(2-a) - a) / (2*(1-a))`.
/// Negative solutions floor at 0 and the result is capped at
/// [`AIR_SHELF_GAIN_MAX`].
pub fn gain_q16_from_db(db: f32) -> u32 {
    let alpha = f32::from(AIR_SHELF_ALPHA) / 65536.0;
    let h_pi = db_to_linear(db);
    let g = ((h_pi * (2.0 - alpha) - alpha) / (2.0 * (1.0 - alpha))).max(0.0);
    ((g * 65536.0 + 0.5) as u32).min(AIR_SHELF_GAIN_MAX)
}

/// Inverse of [`gain_q16_from_db`]: boost in dB at `w = pi` for a Q16
/// shelf gain: `H_pi = (a + 2*(1-a)*G) / (2-a)`.
pub fn gain_db_from_q16(gain_q16: u32) -> f32 {
    let alpha = f32::from(AIR_SHELF_ALPHA) / 65536.0;
    let g = gain_q16 as f32 / 65536.0;
    let h_pi = (alpha + 2.0 * (1.0 - alpha) * g) / (2.0 - alpha);
    linear_to_db(h_pi)
}
