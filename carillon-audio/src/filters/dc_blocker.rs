//! First-order DC blocking filter.

use crate::fixed::clamp_i16;

/// Standard feedback coefficient, 0.98 in Q16.
pub const DC_ALPHA_STANDARD: u16 = 64225;
/// Soft variant, 0.995 in Q16. Slower settling, less bass loss.
pub const DC_ALPHA_SOFT: u16 = 65216;

/// DC blocker: `y = x - x_prev + (y_prev * alpha) >> 16`.
///
/// Exactly one variant (standard or soft) runs per sample; the caller
/// selects the alpha from the active configuration.
#[derive(Debug, Default)]
pub struct DcBlocker {
    prev_input: i32,
    prev_output: i32,
}

impl DcBlocker {
    /// Processes one sample through the blocker.
    pub fn process_sample(&mut self, input: i16, alpha_q16: u16) -> i16 {
        let feedback = (i64::from(self.prev_output) * i64::from(alpha_q16)) >> 16;
        let output = i32::from(input) - self.prev_input + feedback as i32;
        self.prev_input = i32::from(input);
        self.prev_output = output;
        clamp_i16(output)
    }

    /// Zeroes the filter history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
