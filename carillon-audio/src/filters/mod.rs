//! Per-channel filter bank.
//!
//! Each filter struct owns nothing but its own IIR history. Parameters
//! (alphas, gains) are shared across channels and passed in per call;
//! state is strictly per-channel so mono playback can later switch to
//! stereo without any behavioral change.

mod air_shelf;
mod biquad;
mod dc_blocker;
mod one_pole;

pub use air_shelf::{
    gain_db_from_q16, gain_q16_from_db, AirShelf, AIR_PRESETS_DB, AIR_SHELF_ALPHA,
    AIR_SHELF_GAIN_DEFAULT, AIR_SHELF_GAIN_MAX,
};
pub use biquad::{BiquadLpf, BIQUAD_WARMUP_CYCLES};
pub use dc_blocker::{DcBlocker, DC_ALPHA_SOFT, DC_ALPHA_STANDARD};
pub use one_pole::OnePoleLpf;

/// One channel's complete filter history.
///
/// Reset at the start of every playback session and mutated only by the
/// chunk processor, once per processed sample.
#[derive(Debug, Default)]
pub struct ChannelFilters {
    pub dc_blocker: DcBlocker,
    pub lpf_one_pole: OnePoleLpf,
    pub lpf_biquad: BiquadLpf,
    pub air_shelf: AirShelf,
}

impl ChannelFilters {
    /// Zeroes all IIR history for a fresh session.
    pub fn reset(&mut self) {
        self.dc_blocker.reset();
        self.lpf_one_pole.reset();
        self.lpf_biquad.reset();
        self.air_shelf.reset();
    }
}
