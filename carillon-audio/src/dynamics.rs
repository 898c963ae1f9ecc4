//! Post-filter stage: quadratic fades, noise gate and soft clipping.
//!
//! Shared by the 8-bit and 16-bit paths. The fade helpers are pure
//! functions of the counter values; the engine owns the counters.

use crate::fixed::clamp_i16;

/// Samples below this magnitude are treated as noise floor.
pub const NOISE_GATE_THRESHOLD: i32 = 512;
/// Soft-gate attenuation, ~0.1 in Q15. A hard mute would itself gate
/// audibly on low-level signal.
const NOISE_GATE_ATTENUATION_Q15: i32 = 3277;

/// Symmetric soft-clip threshold (~85% of full scale).
pub const SOFT_CLIP_THRESHOLD: i32 = 28000;
const SOFT_CLIP_MAX: i32 = 32767;

/// Applies the quadratic fade-in ramp.
///
/// `mult = progress^2 / total`, so perceived loudness (power) rises
/// linearly rather than jumping at the start of the ramp. The squaring
/// uses a 64-bit intermediate: `progress^2` exceeds 32 bits for long fade
/// windows.
pub fn apply_fade_in(sample: i16, remaining: u32, total: u32) -> i16 {
    if remaining == 0 || total == 0 {
        return sample;
    }
    let total = i64::from(total);
    let progress = (total - i64::from(remaining)).max(0);
    let fade_mult = progress * progress / total;
    let result = i64::from(sample) * fade_mult / total;
    clamp_i16(result as i32)
}

/// Applies the quadratic fade-out ramp for a window of `window` samples.
///
/// Full level at `remaining >= window`, silence once the counter is
/// exhausted. The same shape serves both the explicit pause/stop ramp and
/// the end-of-stream window derived from the samples left in the source.
pub fn apply_fade_out(sample: i16, remaining: u64, window: u32) -> i16 {
    if window == 0 {
        return sample;
    }
    let window = u64::from(window);
    if remaining >= window {
        return sample;
    }
    if remaining == 0 {
        return 0;
    }
    let fade_mult = (remaining * remaining / window) as i64;
    let result = i64::from(sample) * fade_mult / window as i64;
    clamp_i16(result as i32)
}

/// Soft noise gate: attenuates (does not mute) signal under the threshold.
pub fn apply_noise_gate(sample: i16) -> i16 {
    let value = i32::from(sample);
    if value.abs() < NOISE_GATE_THRESHOLD {
        ((value * NOISE_GATE_ATTENUATION_Q15) >> 15) as i16
    } else {
        sample
    }
}

/// Cubic smoothstep response for signal beyond the clip threshold.
///
/// `curve = 3x^2 - 2x^3` with x normalized to the overshoot range, so the
/// output approaches full scale asymptotically instead of hard-clipping.
#[inline]
fn soft_clip_curve(excess: i32, range: i32) -> i32 {
    let x = i64::from((excess * 65536 / range).min(65536));
    let x2 = (x * x) >> 16;
    let x3 = (x2 * x) >> 16;
    let curve = 3 * x2 - 2 * x3;
    ((i64::from(range) * curve) >> 16) as i32
}

/// Applies symmetric soft clipping above `SOFT_CLIP_THRESHOLD`.
pub fn apply_soft_clip(sample: i16) -> i16 {
    let s = i32::from(sample);
    let range = SOFT_CLIP_MAX - SOFT_CLIP_THRESHOLD;
    let shaped = if s > SOFT_CLIP_THRESHOLD {
        SOFT_CLIP_THRESHOLD + soft_clip_curve(s - SOFT_CLIP_THRESHOLD, range)
    } else if s < -SOFT_CLIP_THRESHOLD {
        -SOFT_CLIP_THRESHOLD - soft_clip_curve(-SOFT_CLIP_THRESHOLD - s, range)
    } else {
        s
    };
    shaped.clamp(-SOFT_CLIP_MAX, SOFT_CLIP_MAX) as i16
}
