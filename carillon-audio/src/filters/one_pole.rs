//! One-pole low-pass filter for the 8-bit sample path.

use crate::fixed::clamp_i16;

/// One-pole LPF: `y = (alpha*x + (1-alpha)*y_prev) >> 16`, followed by the
/// Q16 makeup gain. The gained value is what feeds back.
#[derive(Debug, Default)]
pub struct OnePoleLpf {
    prev_output: i32,
}

impl OnePoleLpf {
    /// Processes one sample through the filter and makeup gain.
    pub fn process_sample(&mut self, input: i16, alpha_q16: u16, makeup_gain_q16: u32) -> i16 {
        let alpha = i64::from(alpha_q16);
        let one_minus_alpha = 65536 - alpha;
        let smoothed =
            (alpha * i64::from(input) >> 16) + (one_minus_alpha * i64::from(self.prev_output) >> 16);
        let output = (smoothed * i64::from(makeup_gain_q16)) >> 16;
        self.prev_output = output as i32;
        clamp_i16(output as i32)
    }

    /// Zeroes the filter history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
