//! Runtime filter and volume-response configuration.

use crate::fixed::ONE_Q16;

/// Low-pass aggressiveness for both sample paths.
///
/// `Custom` uses the per-path custom alpha stored in [`FilterConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LpfLevel {
    Off,
    VerySoft,
    #[default]
    Soft,
    Medium,
    Firm,
    Aggressive,
    Custom,
}

/// 16-bit biquad alpha coefficients, ordered lightest to heaviest filtering.
pub const LPF_16BIT_VERY_SOFT: u16 = 40960; // 0.625
pub const LPF_16BIT_SOFT: u16 = 52429; // ~0.80
pub const LPF_16BIT_MEDIUM: u16 = 57344; // 0.875
pub const LPF_16BIT_FIRM: u16 = 60416; // ~0.92
pub const LPF_16BIT_AGGRESSIVE: u16 = 63488; // ~0.97

/// 8-bit one-pole alpha coefficients. The range is deliberately narrower
/// than the biquad's: heavy smoothing of already-quantized 8-bit material
/// amplifies quantization noise.
pub const LPF_8BIT_VERY_SOFT: u16 = 61440; // 0.9375
pub const LPF_8BIT_SOFT: u16 = 57344; // 0.875
pub const LPF_8BIT_MEDIUM: u16 = 49152; // 0.75
pub const LPF_8BIT_FIRM: u16 = 45056; // 0.6875
pub const LPF_8BIT_AGGRESSIVE: u16 = 40960; // 0.625

/// Default post-LPF makeup gain for the 8-bit path (~1.08x).
pub const LPF_MAKEUP_GAIN_8BIT_DEFAULT: u32 = 70779;
/// Default post-LPF makeup gain for the 16-bit path (unity).
pub const LPF_MAKEUP_GAIN_16BIT_DEFAULT: u32 = ONE_Q16;
/// Makeup gain bounds in Q16 (0.1x to 2.0x).
pub const LPF_MAKEUP_GAIN_MIN: u32 = 6554;
pub const LPF_MAKEUP_GAIN_MAX: u32 = 131072;

/// Filter-chain runtime configuration.
///
/// Owned by the engine and replaced as a whole struct; the chunk processor
/// takes one copy per half-buffer so a concurrent replace can never be
/// observed partially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Biquad low-pass filter on the 16-bit path.
    pub biquad_lpf_16bit: bool,
    /// Soft (0.995) DC blocking variant; the standard 0.98 blocker runs
    /// when this is off. Exactly one DC stage is always active.
    pub soft_dc_filter: bool,
    /// One-pole low-pass filter on the 8-bit path.
    pub one_pole_lpf_8bit: bool,
    /// Noise gate for low-level signal.
    pub noise_gate: bool,
    /// Cubic soft clipping above the symmetric threshold.
    pub soft_clipping: bool,
    /// High-shelf "air" brightening filter.
    pub air_effect: bool,
    /// Q16 makeup gain applied after the 8-bit one-pole LPF.
    pub lpf_makeup_gain_8bit_q16: u32,
    /// Q16 makeup gain applied after the 16-bit biquad LPF.
    pub lpf_makeup_gain_16bit_q16: u32,
    /// Aggressiveness of the 16-bit biquad LPF.
    pub lpf_level_16bit: LpfLevel,
    /// Q16 alpha used when `lpf_level_16bit` is `Custom`.
    pub lpf_custom_alpha_16bit: u16,
    /// Aggressiveness of the 8-bit one-pole LPF.
    pub lpf_level_8bit: LpfLevel,
    /// Q16 alpha used when `lpf_level_8bit` is `Custom`.
    pub lpf_custom_alpha_8bit: u16,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            biquad_lpf_16bit: true,
            soft_dc_filter: true,
            one_pole_lpf_8bit: true,
            noise_gate: false,
            soft_clipping: true,
            air_effect: false,
            lpf_makeup_gain_8bit_q16: LPF_MAKEUP_GAIN_8BIT_DEFAULT,
            lpf_makeup_gain_16bit_q16: LPF_MAKEUP_GAIN_16BIT_DEFAULT,
            lpf_level_16bit: LpfLevel::Soft,
            lpf_custom_alpha_16bit: LPF_16BIT_SOFT,
            lpf_level_8bit: LpfLevel::Medium,
            lpf_custom_alpha_8bit: LPF_8BIT_MEDIUM,
        }
    }
}

impl FilterConfig {
    /// Returns a copy with out-of-range makeup gains normalized back to
    /// the per-path defaults. Applied on every config replace.
    pub fn normalized(mut self) -> Self {
        if !(LPF_MAKEUP_GAIN_MIN..=LPF_MAKEUP_GAIN_MAX).contains(&self.lpf_makeup_gain_8bit_q16) {
            self.lpf_makeup_gain_8bit_q16 = LPF_MAKEUP_GAIN_8BIT_DEFAULT;
        }
        if !(LPF_MAKEUP_GAIN_MIN..=LPF_MAKEUP_GAIN_MAX).contains(&self.lpf_makeup_gain_16bit_q16) {
            self.lpf_makeup_gain_16bit_q16 = LPF_MAKEUP_GAIN_16BIT_DEFAULT;
        }
        self
    }

    /// Resolves the active Q16 alpha for the 16-bit biquad.
    pub fn alpha_16bit(&self) -> u16 {
        match self.lpf_level_16bit {
            LpfLevel::VerySoft => LPF_16BIT_VERY_SOFT,
            LpfLevel::Soft | LpfLevel::Off => LPF_16BIT_SOFT,
            LpfLevel::Medium => LPF_16BIT_MEDIUM,
            LpfLevel::Firm => LPF_16BIT_FIRM,
            LpfLevel::Aggressive => LPF_16BIT_AGGRESSIVE,
            LpfLevel::Custom => self.lpf_custom_alpha_16bit,
        }
    }

    /// Resolves the active Q16 alpha for the 8-bit one-pole LPF.
    pub fn alpha_8bit(&self) -> u16 {
        match self.lpf_level_8bit {
            LpfLevel::VerySoft => LPF_8BIT_VERY_SOFT,
            LpfLevel::Soft => LPF_8BIT_SOFT,
            LpfLevel::Medium | LpfLevel::Off => LPF_8BIT_MEDIUM,
            LpfLevel::Firm => LPF_8BIT_FIRM,
            LpfLevel::Aggressive => LPF_8BIT_AGGRESSIVE,
            LpfLevel::Custom => self.lpf_custom_alpha_8bit,
        }
    }
}

/// Perceptual volume response applied to the raw volume-source reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeCurve {
    /// Apply the gamma curve instead of a linear mapping.
    pub nonlinear: bool,
    /// Gamma exponent (1.0 = linear response, 2.0 = recommended).
    pub gamma: f32,
}

impl Default for VolumeCurve {
    fn default() -> Self {
        Self {
            nonlinear: false,
            gamma: 2.0,
        }
    }
}

impl VolumeCurve {
    /// Maps a raw volume reading in `[1, 65535]` to a Q16 scale factor.
    ///
    /// The curve is evaluated once per half-buffer, never per sample, so
    /// the float exponentiation stays off the per-sample path.
    pub fn scale_q16(&self, raw: u16) -> u32 {
        let raw = raw.max(1);
        if self.nonlinear {
            let normalized = f32::from(raw) / f32::from(u16::MAX);
            (normalized.powf(1.0 / self.gamma) * 65536.0 + 0.5) as u32
        } else {
            let max = u64::from(u16::MAX);
            ((u64::from(raw) * u64::from(ONE_Q16) + max / 2) / max) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_levels_resolve_to_table_alphas() {
        let cfg = FilterConfig::default();
        assert_eq!(cfg.alpha_16bit(), LPF_16BIT_SOFT);
        assert_eq!(cfg.alpha_8bit(), LPF_8BIT_MEDIUM);
    }

    #[test]
    fn test_custom_level_uses_custom_alpha() {
        let cfg = FilterConfig {
            lpf_level_16bit: LpfLevel::Custom,
            lpf_custom_alpha_16bit: 61234,
            lpf_level_8bit: LpfLevel::Custom,
            lpf_custom_alpha_8bit: 50001,
            ..FilterConfig::default()
        };
        assert_eq!(cfg.alpha_16bit(), 61234);
        assert_eq!(cfg.alpha_8bit(), 50001);
    }

    #[test]
    fn test_normalized_restores_default_gains() {
        let cfg = FilterConfig {
            lpf_makeup_gain_8bit_q16: 0,
            lpf_makeup_gain_16bit_q16: 10_000_000,
            ..FilterConfig::default()
        }
        .normalized();
        assert_eq!(cfg.lpf_makeup_gain_8bit_q16, LPF_MAKEUP_GAIN_8BIT_DEFAULT);
        assert_eq!(cfg.lpf_makeup_gain_16bit_q16, LPF_MAKEUP_GAIN_16BIT_DEFAULT);
    }

    #[test]
    fn test_normalized_keeps_in_range_gains() {
        let cfg = FilterConfig {
            lpf_makeup_gain_8bit_q16: 80_000,
            lpf_makeup_gain_16bit_q16: 70_000,
            ..FilterConfig::default()
        }
        .normalized();
        assert_eq!(cfg.lpf_makeup_gain_8bit_q16, 80_000);
        assert_eq!(cfg.lpf_makeup_gain_16bit_q16, 70_000);
    }

    #[test]
    fn test_linear_volume_scale_endpoints() {
        let curve = VolumeCurve::default();
        assert_eq!(curve.scale_q16(u16::MAX), ONE_Q16);
        assert_eq!(curve.scale_q16(0), curve.scale_q16(1));
        assert!(curve.scale_q16(1) <= 2);
        let mid = curve.scale_q16(32768);
        assert!((32700..=32900).contains(&mid), "midpoint scale was {mid}");
    }

    #[test]
    fn test_gamma_curve_boosts_low_settings() {
        let curve = VolumeCurve {
            nonlinear: true,
            gamma: 2.0,
        };
        let linear = VolumeCurve::default();
        // A perceptual curve raises quiet settings above the linear map.
        assert!(curve.scale_q16(6554) > linear.scale_q16(6554));
        // Full volume maps to unity either way.
        let full = curve.scale_q16(u16::MAX);
        assert!((ONE_Q16 - 2..=ONE_Q16 + 2).contains(&full));
    }
}
