//! Audio engine for Carillon - fixed-point PCM playback with a runtime DSP chain
//!
//! This crate provides the core playback pipeline:
//! - Engine: playback state machine and double-buffer chunk processing
//! - Filters: per-channel DC blocking, low-pass and high-shelf stages
//! - Dynamics: quadratic fades, noise gate and soft clipping
//! - Dither: TPDF dither for 8-bit source material
//!
//! All per-sample math is integer-only (Q16 fixed point with widened
//! intermediates); floating point appears only on the configuration surface
//! (seconds, decibels, gamma).

mod config;
mod dither;
mod dynamics;
mod engine;
mod filters;
mod fixed;
mod hardware;

pub use config::{FilterConfig, LpfLevel, VolumeCurve};
pub use dither::TpdfDither;
pub use engine::{
    AudioEngine, BufferHalf, ChannelMode, EngineHandle, PlayError, PlaybackState, SampleData,
    FRAMES_PER_HALF, HALF_BUFFER_LEN, PLAYBACK_BUFFER_LEN,
};
pub use filters::{
    AirShelf, BiquadLpf, ChannelFilters, DcBlocker, OnePoleLpf, AIR_PRESETS_DB, AIR_SHELF_GAIN_MAX,
    BIQUAD_WARMUP_CYCLES,
};
pub use fixed::{alpha_from_cutoff, db_to_linear, linear_to_db};
pub use hardware::{AudioHardware, TransportError};
