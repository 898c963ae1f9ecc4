//! Playback engine: state machine, control surface and the double-buffer
//! chunk processor.
//!
//! # Execution contexts
//!
//! Two contexts touch the engine. The foreground control context calls
//! [`AudioEngine::play`], [`AudioEngine::pause`], [`AudioEngine::resume`],
//! [`AudioEngine::stop`] and the configuration setters. The buffer-fill
//! context is entered through [`AudioEngine::on_first_half_consumed`] /
//! [`AudioEngine::on_second_half_consumed`], invoked by the transport each
//! time it finishes one half of the double buffer. The fill context never
//! blocks, locks, allocates or logs.
//!
//! The split follows a single-writer discipline rather than locking:
//! cursor, fade counters and the `Playing -> Idle/Paused` transitions are
//! mutated only inside the fill callbacks; the foreground communicates
//! into that context through the atomic stop flag, or through fields it
//! writes before the transport starts and then leaves alone. State and the
//! stop request are atomics so they can be read (or raised) from any
//! context through an [`EngineHandle`].

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::debug;

use crate::config::{FilterConfig, LpfLevel, VolumeCurve};
use crate::dither::TpdfDither;
use crate::dynamics;
use crate::filters::{
    gain_db_from_q16, gain_q16_from_db, ChannelFilters, AIR_PRESETS_DB, AIR_SHELF_GAIN_DEFAULT,
    AIR_SHELF_GAIN_MAX, BIQUAD_WARMUP_CYCLES, DC_ALPHA_SOFT, DC_ALPHA_STANDARD,
};
use crate::fixed::alpha_from_cutoff;
use crate::hardware::{AudioHardware, TransportError};

/// Interleaved i16 slots in the double buffer (both halves).
pub const PLAYBACK_BUFFER_LEN: usize = 2048;
/// Interleaved slots per half buffer.
pub const HALF_BUFFER_LEN: usize = PLAYBACK_BUFFER_LEN / 2;
/// Stereo frames per half buffer.
pub const FRAMES_PER_HALF: usize = HALF_BUFFER_LEN / 2;

const DEFAULT_SAMPLE_RATE: u32 = 22_000;
const SILENCE: i16 = 0;

/// Playback state word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Idle = 0,
    Error = 1,
    Playing = 2,
    Pausing = 3,
    Paused = 4,
    PlayingFailed = 5,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            2 => Self::Playing,
            3 => Self::Pausing,
            4 => Self::Paused,
            5 => Self::PlayingFailed,
            _ => Self::Error,
        }
    }
}

/// Channel layout of the source material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    #[default]
    Mono,
    Stereo,
}

/// Caller-owned PCM source data.
///
/// The depth is carried by the variant, so an unsupported bit depth is
/// unrepresentable. `Arc` keeps the engine from copying sample memory.
#[derive(Debug, Clone)]
pub enum SampleData {
    /// Unsigned 8-bit samples, midpoint 128.
    Pcm8(Arc<[u8]>),
    /// Signed 16-bit samples.
    Pcm16(Arc<[i16]>),
}

impl SampleData {
    /// Total number of samples (all channels combined).
    pub fn len(&self) -> usize {
        match self {
            Self::Pcm8(samples) => samples.len(),
            Self::Pcm16(samples) => samples.len(),
        }
    }

    /// True when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bits per sample (8 or 16).
    pub fn bit_depth(&self) -> u8 {
        match self {
            Self::Pcm8(_) => 8,
            Self::Pcm16(_) => 16,
        }
    }

    #[inline]
    fn fetch(&self, index: usize, dither: &mut TpdfDither) -> i16 {
        match self {
            Self::Pcm16(samples) => samples[index],
            Self::Pcm8(samples) => dither.convert8(samples[index]),
        }
    }
}

/// Which half of the double buffer a transfer callback refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferHalf {
    First,
    Second,
}

impl BufferHalf {
    fn offset(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => HALF_BUFFER_LEN,
        }
    }
}

/// Failure starting a playback session. No engine state is mutated when a
/// validation variant is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlayError {
    #[error("sample data is empty")]
    EmptySample,
    #[error("sample rate must be non-zero")]
    InvalidSampleRate,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Read cursor into the caller-owned sample data. Created by `play`,
/// advanced only by the fill callbacks, dropped when the session ends.
#[derive(Debug)]
struct PlaybackCursor {
    data: SampleData,
    /// Next sample offset to read.
    pos: usize,
    /// One past the last playable sample. Shrinks when a stop request
    /// converts the session into an end-of-stream fade.
    end: usize,
    /// Source samples consumed per half-buffer fill.
    advance: usize,
    mode: ChannelMode,
}

/// Fade windows and live counters.
///
/// Seconds are authoritative; sample counts are recomputed whenever the
/// sample rate changes or a fade-time setter runs. `fade_out_remaining`
/// serves only the explicit pause/stop ramp. The end-of-stream fade is
/// derived live from `end - pos` each chunk, never stored here.
#[derive(Debug)]
struct FadeState {
    fade_in_seconds: f32,
    fade_out_seconds: f32,
    pause_fade_seconds: f32,
    resume_fade_seconds: f32,
    fade_in_samples: u32,
    fade_out_samples: u32,
    pause_fade_samples: u32,
    resume_fade_samples: u32,
    fade_in_remaining: u32,
    fade_in_total: u32,
    fade_out_remaining: u32,
    fade_out_total: u32,
}

impl FadeState {
    fn new(sample_rate: u32) -> Self {
        let mut fade = Self {
            fade_in_seconds: 0.150,
            fade_out_seconds: 0.150,
            pause_fade_seconds: 0.100,
            resume_fade_seconds: 0.100,
            fade_in_samples: 0,
            fade_out_samples: 0,
            pause_fade_samples: 0,
            resume_fade_samples: 0,
            fade_in_remaining: 0,
            fade_in_total: 0,
            fade_out_remaining: 0,
            fade_out_total: 0,
        };
        fade.recompute(sample_rate);
        fade
    }

    fn recompute(&mut self, sample_rate: u32) {
        self.fade_in_samples = fade_time_to_samples(self.fade_in_seconds, sample_rate);
        self.fade_out_samples = fade_time_to_samples(self.fade_out_seconds, sample_rate);
        self.pause_fade_samples = fade_time_to_samples(self.pause_fade_seconds, sample_rate);
        self.resume_fade_samples = fade_time_to_samples(self.resume_fade_seconds, sample_rate);
    }

    fn begin_session(&mut self) {
        self.fade_in_remaining = self.fade_in_samples;
        self.fade_in_total = self.fade_in_samples;
        self.fade_out_remaining = 0;
        self.fade_out_total = 0;
    }

    fn clear_counters(&mut self) {
        self.fade_in_remaining = 0;
        self.fade_out_remaining = 0;
        self.fade_out_total = 0;
    }
}

/// Converts a fade time to a sample count, clamping to 1 ms - 5 s and
/// never returning zero.
fn fade_time_to_samples(seconds: f32, sample_rate: u32) -> u32 {
    let seconds = seconds.clamp(0.001, 5.0);
    ((seconds * sample_rate as f32 + 0.5) as u32).max(1)
}

/// Flags shared between the engine and its handles.
#[derive(Debug)]
struct SharedFlags {
    state: AtomicU8,
    stop_requested: AtomicBool,
}

impl SharedFlags {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Idle as u8),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn get(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn request_stop(&self) -> bool {
        if matches!(
            self.get(),
            PlaybackState::Playing | PlaybackState::Pausing | PlaybackState::Paused
        ) {
            self.stop_requested.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

/// Cloneable cross-context view of the engine: state polling and the stop
/// request, nothing that could race the fill callbacks.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    shared: Arc<SharedFlags>,
}

impl EngineHandle {
    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.shared.get()
    }

    /// Requests an asynchronous stop; acted on by the next fill callback.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// Blocks (polling) until the current session leaves `Playing`, then
    /// returns the state it landed in.
    pub fn wait_for_end(&self) -> PlaybackState {
        while self.state() == PlaybackState::Playing {
            thread::yield_now();
        }
        self.state()
    }
}

/// Per-chunk snapshot of the filter-chain parameters.
///
/// Taken once per half-buffer from the active configuration, so a
/// concurrent full-struct config replace is observed atomically.
struct ChainParams {
    lpf_enabled: bool,
    biquad_path: bool,
    lpf_alpha: u16,
    lpf_makeup_q16: u32,
    soft_dc: bool,
    air_enabled: bool,
    air_gain_q16: u32,
    noise_gate: bool,
    soft_clipping: bool,
}

impl ChainParams {
    fn for_source(data: &SampleData, cfg: &FilterConfig, air_gain_q16: u32) -> Self {
        let biquad_path = matches!(data, SampleData::Pcm16(_));
        Self {
            lpf_enabled: if biquad_path {
                cfg.biquad_lpf_16bit
            } else {
                cfg.one_pole_lpf_8bit
            },
            biquad_path,
            lpf_alpha: if biquad_path {
                cfg.alpha_16bit()
            } else {
                cfg.alpha_8bit()
            },
            lpf_makeup_q16: if biquad_path {
                cfg.lpf_makeup_gain_16bit_q16
            } else {
                cfg.lpf_makeup_gain_8bit_q16
            },
            soft_dc: cfg.soft_dc_filter,
            air_enabled: cfg.air_effect,
            air_gain_q16,
            noise_gate: cfg.noise_gate,
            soft_clipping: cfg.soft_clipping,
        }
    }
}

/// Per-frame fade counter snapshot. Both channels of a frame see the same
/// values; the engine decrements the counters after the frame.
struct FadeFrame {
    fade_in_remaining: u32,
    fade_in_total: u32,
    /// Explicit pause ramp active (state is `Pausing`).
    pausing: bool,
    ramp_remaining: u32,
    ramp_total: u32,
    /// Source samples left before `end`.
    src_remaining: u64,
    /// End-of-stream fade window.
    end_window: u32,
}

impl FadeFrame {
    #[inline]
    fn apply_fade_out(&self, sample: i16) -> i16 {
        if self.pausing {
            dynamics::apply_fade_out(sample, u64::from(self.ramp_remaining), self.ramp_total)
        } else if self.src_remaining <= u64::from(self.end_window) {
            dynamics::apply_fade_out(sample, self.src_remaining, self.end_window)
        } else {
            sample
        }
    }
}

#[inline]
fn apply_volume(sample: i16, scale_q16: u32) -> i16 {
    ((i64::from(sample) * i64::from(scale_q16)) >> 16) as i16
}

/// Runs one sample through the full chain in the fixed order:
/// LPF -> DC block -> air -> fade-in -> fade-out -> gate -> clip.
///
/// LPF first so downstream stages see band-limited signal; fades come
/// after the filters and before gate/clip so neither fights the ramp.
fn run_chain(sample: i16, filters: &mut ChannelFilters, params: &ChainParams, fade: &FadeFrame) -> i16 {
    let mut sample = sample;
    if params.lpf_enabled {
        sample = if params.biquad_path {
            filters
                .lpf_biquad
                .process_sample(sample, params.lpf_alpha, params.lpf_makeup_q16)
        } else {
            filters
                .lpf_one_pole
                .process_sample(sample, params.lpf_alpha, params.lpf_makeup_q16)
        };
    }
    let dc_alpha = if params.soft_dc {
        DC_ALPHA_SOFT
    } else {
        DC_ALPHA_STANDARD
    };
    sample = filters.dc_blocker.process_sample(sample, dc_alpha);
    if params.air_enabled {
        sample = filters.air_shelf.process_sample(sample, params.air_gain_q16);
    }
    sample = dynamics::apply_fade_in(sample, fade.fade_in_remaining, fade.fade_in_total);
    sample = fade.apply_fade_out(sample);
    if params.noise_gate {
        sample = dynamics::apply_noise_gate(sample);
    }
    if params.soft_clipping {
        sample = dynamics::apply_soft_clip(sample);
    }
    sample
}

/// The playback engine.
///
/// Owns the double buffer, the filter state for both channels, the fade
/// bookkeeping and the injected hardware collaborators. One sample stream
/// plays at a time; left and right channels share filter parameters but
/// keep independent filter state.
pub struct AudioEngine<H: AudioHardware> {
    hardware: H,
    config: FilterConfig,
    volume_curve: VolumeCurve,
    channels: [ChannelFilters; 2],
    dither: TpdfDither,
    buffer: Box<[i16; PLAYBACK_BUFFER_LEN]>,
    cursor: Option<PlaybackCursor>,
    fade: FadeState,
    shared: Arc<SharedFlags>,
    sample_rate: u32,
    /// Cursor position captured by `pause`, restored verbatim by `resume`.
    paused_pos: usize,
    /// One-shot guard for the completion notifier; reset only by `play`.
    end_notified: bool,
    air_gain_q16: u32,
    air_preset_index: u8,
}

impl<H: AudioHardware> AudioEngine<H> {
    /// Creates an engine around the injected hardware collaborators.
    pub fn new(hardware: H) -> Self {
        Self {
            hardware,
            config: FilterConfig::default(),
            volume_curve: VolumeCurve::default(),
            channels: [ChannelFilters::default(), ChannelFilters::default()],
            dither: TpdfDither::new(),
            buffer: Box::new([SILENCE; PLAYBACK_BUFFER_LEN]),
            cursor: None,
            fade: FadeState::new(DEFAULT_SAMPLE_RATE),
            shared: Arc::new(SharedFlags::new()),
            sample_rate: DEFAULT_SAMPLE_RATE,
            paused_pos: 0,
            end_notified: true,
            air_gain_q16: AIR_SHELF_GAIN_DEFAULT,
            air_preset_index: 0,
        }
    }

    // ===== Control surface (foreground context) =====

    /// Starts playback of a sample stream.
    ///
    /// Validates the source, resets all per-channel filter state, derives
    /// the fade windows from the new rate, warms up the biquad, pre-fills
    /// both buffer halves (so the fade-in is audible from sample zero) and
    /// starts the transport. On a transport failure the state becomes
    /// [`PlaybackState::PlayingFailed`] and no retry is attempted.
    pub fn play(
        &mut self,
        data: SampleData,
        sample_rate: u32,
        mode: ChannelMode,
    ) -> Result<(), PlayError> {
        if data.is_empty() {
            return Err(PlayError::EmptySample);
        }
        if sample_rate == 0 {
            return Err(PlayError::InvalidSampleRate);
        }

        let total_samples = data.len();
        debug!(
            sample_rate,
            total_samples,
            depth = data.bit_depth(),
            ?mode,
            "starting playback"
        );

        // A previous session may still be streaming.
        self.hardware.transport_stop();

        if sample_rate != self.sample_rate {
            self.hardware.transport_reinit(sample_rate);
        }
        self.sample_rate = sample_rate;
        self.fade.recompute(sample_rate);

        for filters in &mut self.channels {
            filters.reset();
        }

        if let SampleData::Pcm16(samples) = &data {
            if self.config.biquad_lpf_16bit {
                let first = samples[0];
                let alpha = self.config.alpha_16bit();
                let gain = self.config.lpf_makeup_gain_16bit_q16;
                for filters in &mut self.channels {
                    filters
                        .lpf_biquad
                        .warm_up(first, BIQUAD_WARMUP_CYCLES, alpha, gain);
                }
            }
        }

        let advance = match mode {
            ChannelMode::Stereo => HALF_BUFFER_LEN,
            ChannelMode::Mono => FRAMES_PER_HALF,
        };
        self.cursor = Some(PlaybackCursor {
            data,
            pos: 0,
            end: total_samples,
            advance,
            mode,
        });
        self.fade.begin_session();
        self.end_notified = false;
        self.paused_pos = 0;
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared.set(PlaybackState::Playing);

        // Pre-fill both halves before the transport starts pulling.
        self.fill_half(BufferHalf::First);
        self.fill_half(BufferHalf::Second);

        self.hardware.set_amplifier(true);
        match self.hardware.transport_start(&self.buffer[..], sample_rate) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shared.set(PlaybackState::PlayingFailed);
                self.hardware.set_amplifier(false);
                Err(PlayError::Transport(err))
            }
        }
    }

    /// Pauses playback with a click-free fade-out.
    ///
    /// The starting level of the pause ramp is made continuous with
    /// whatever ramp is currently audible: mid fade-in it starts from the
    /// fade-in's instantaneous level, inside the end-of-stream window from
    /// the remaining-in-file level, otherwise from full level. The fill
    /// callbacks finish the ramp and flip to `Paused`.
    pub fn pause(&mut self) -> PlaybackState {
        let state = self.state();
        if state != PlaybackState::Playing {
            return state;
        }

        let pause_window = self.fade.pause_fade_samples;
        let start_remaining = if self.fade.fade_in_remaining > 0 {
            let total = u64::from(self.fade.fade_in_total.max(1));
            let progress =
                u64::from(self.fade.fade_in_total.saturating_sub(self.fade.fade_in_remaining));
            (progress * u64::from(pause_window) / total) as u32
        } else if let Some(src_remaining) = self.end_fade_remaining() {
            let window = u64::from(self.fade.fade_out_samples.max(1));
            (src_remaining * u64::from(pause_window) / window) as u32
        } else {
            pause_window
        };

        self.fade.fade_out_remaining = start_remaining;
        self.fade.fade_out_total = pause_window;
        self.fade.fade_in_remaining = 0;
        self.paused_pos = self.cursor.as_ref().map_or(0, |cursor| cursor.pos);
        self.shared.set(PlaybackState::Pausing);
        debug!(start_remaining, pause_window, "pausing playback");
        PlaybackState::Paused
    }

    /// Resumes a paused session from the exact position it paused at,
    /// with the configured resume fade-in.
    pub fn resume(&mut self) -> PlaybackState {
        let state = self.state();
        if state != PlaybackState::Paused {
            return state;
        }
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.pos = self.paused_pos;
        }
        self.fade.fade_out_remaining = 0;
        self.fade.fade_out_total = 0;
        self.fade.fade_in_remaining = self.fade.resume_fade_samples;
        self.fade.fade_in_total = self.fade.resume_fade_samples;
        self.shared.set(PlaybackState::Playing);
        debug!(position = self.paused_pos, "resuming playback");
        PlaybackState::Playing
    }

    /// Requests an asynchronous stop.
    ///
    /// Only raises the stop flag; the next fill callback shortens the
    /// session into a standard fade-out window (when playing) or silences
    /// and idles immediately (when paused). Poll [`AudioEngine::state`]
    /// for completion.
    pub fn stop(&self) {
        if self.shared.request_stop() {
            debug!("stop requested");
        }
    }

    /// Stops the transport and powers the amplifier down without the
    /// fade-out path. For application shutdown.
    pub fn shutdown(&mut self) {
        debug!("audio shutdown");
        self.hardware.transport_stop();
        self.hardware.set_amplifier(false);
        self.cursor = None;
        self.fade.clear_counters();
        self.shared.set(PlaybackState::Idle);
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.shared.get()
    }

    /// Sample rate of the current (or last) session.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Cloneable cross-context handle for state polling and stop requests.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The interleaved stereo double buffer the transport streams from.
    pub fn playback_buffer(&self) -> &[i16] {
        &self.buffer[..]
    }

    /// The injected hardware collaborators.
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Mutable access to the hardware collaborators.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    // ===== Filter configuration =====

    /// Replaces the whole filter configuration. Out-of-range makeup gains
    /// are normalized back to defaults.
    pub fn set_filter_config(&mut self, config: FilterConfig) {
        self.config = config.normalized();
        debug!("filter configuration replaced");
    }

    /// Current filter configuration.
    pub fn filter_config(&self) -> FilterConfig {
        self.config
    }

    pub fn set_soft_clipping_enabled(&mut self, enabled: bool) {
        self.config.soft_clipping = enabled;
    }

    pub fn soft_clipping_enabled(&self) -> bool {
        self.config.soft_clipping
    }

    pub fn set_noise_gate_enabled(&mut self, enabled: bool) {
        self.config.noise_gate = enabled;
    }

    pub fn noise_gate_enabled(&self) -> bool {
        self.config.noise_gate
    }

    /// Sets the 8-bit LPF level. `Off` disables the stage, anything else
    /// enables it.
    pub fn set_lpf_level_8bit(&mut self, level: LpfLevel) {
        self.config.one_pole_lpf_8bit = level != LpfLevel::Off;
        self.config.lpf_level_8bit = level;
    }

    pub fn lpf_level_8bit(&self) -> LpfLevel {
        self.config.lpf_level_8bit
    }

    /// Sets the 16-bit LPF level. `Off` disables the stage, anything else
    /// enables it.
    pub fn set_lpf_level_16bit(&mut self, level: LpfLevel) {
        self.config.biquad_lpf_16bit = level != LpfLevel::Off;
        self.config.lpf_level_16bit = level;
    }

    pub fn lpf_level_16bit(&self) -> LpfLevel {
        self.config.lpf_level_16bit
    }

    /// Q16 alpha used when the 16-bit level is `Custom`.
    pub fn set_lpf_custom_alpha_16bit(&mut self, alpha_q16: u16) {
        self.config.lpf_custom_alpha_16bit = alpha_q16;
    }

    /// Q16 alpha used when the 8-bit level is `Custom`.
    pub fn set_lpf_custom_alpha_8bit(&mut self, alpha_q16: u16) {
        self.config.lpf_custom_alpha_8bit = alpha_q16;
    }

    /// Sets the 8-bit makeup gain from a linear factor, clamped to
    /// 0.1 - 2.0 before quantizing to Q16.
    pub fn set_lpf_makeup_gain_8bit(&mut self, gain: f32) {
        let gain = gain.clamp(0.1, 2.0);
        self.config.lpf_makeup_gain_8bit_q16 = (gain * 65536.0 + 0.5) as u32;
    }

    /// Q16 alpha for a -3 dB cutoff at the engine's current sample rate.
    pub fn lpf_alpha_from_cutoff(&self, cutoff_hz: f32) -> u16 {
        alpha_from_cutoff(cutoff_hz, self.sample_rate as f32)
    }

    // ===== Air effect =====

    pub fn set_air_effect_enabled(&mut self, enabled: bool) {
        self.config.air_effect = enabled;
    }

    pub fn air_effect_enabled(&self) -> bool {
        self.config.air_effect
    }

    /// Sets the shelf gain directly in Q16, capped at ~2.0x.
    pub fn set_air_effect_gain_q16(&mut self, gain_q16: u32) {
        self.air_gain_q16 = gain_q16.min(AIR_SHELF_GAIN_MAX);
    }

    pub fn air_effect_gain_q16(&self) -> u32 {
        self.air_gain_q16
    }

    /// Sets the shelf gain from a desired high-frequency boost in dB.
    pub fn set_air_effect_gain_db(&mut self, db: f32) {
        self.air_gain_q16 = gain_q16_from_db(db);
    }

    /// Current high-frequency boost in dB.
    pub fn air_effect_gain_db(&self) -> f32 {
        gain_db_from_q16(self.air_gain_q16)
    }

    /// Selects an air-effect preset. Index 0 disables the effect; any
    /// other index sets the preset gain and enables it. Out-of-range
    /// indices fall back to 0.
    pub fn set_air_effect_preset(&mut self, preset_index: u8) {
        let index = if usize::from(preset_index) < AIR_PRESETS_DB.len() {
            preset_index
        } else {
            0
        };
        self.air_preset_index = index;
        self.config.air_effect = index > 0;
        if index > 0 {
            self.set_air_effect_gain_db(AIR_PRESETS_DB[usize::from(index)]);
        }
    }

    /// Advances to the next preset, wrapping back to "off". Returns the
    /// new preset index.
    pub fn cycle_air_effect_preset(&mut self) -> u8 {
        let next = (self.air_preset_index + 1) % self.air_effect_preset_count();
        self.set_air_effect_preset(next);
        self.air_preset_index
    }

    pub fn air_effect_preset_index(&self) -> u8 {
        self.air_preset_index
    }

    pub fn air_effect_preset_count(&self) -> u8 {
        AIR_PRESETS_DB.len() as u8
    }

    /// dB value of a preset; out-of-range indices report the current
    /// preset.
    pub fn air_effect_preset_db(&self, preset_index: u8) -> f32 {
        let index = if usize::from(preset_index) < AIR_PRESETS_DB.len() {
            preset_index
        } else {
            self.air_preset_index
        };
        AIR_PRESETS_DB[usize::from(index)]
    }

    // ===== Fade times =====

    pub fn set_fade_in_time(&mut self, seconds: f32) {
        self.fade.fade_in_seconds = seconds;
        self.fade.fade_in_samples = fade_time_to_samples(seconds, self.sample_rate);
    }

    pub fn fade_in_time(&self) -> f32 {
        self.fade.fade_in_seconds
    }

    pub fn set_fade_out_time(&mut self, seconds: f32) {
        self.fade.fade_out_seconds = seconds;
        self.fade.fade_out_samples = fade_time_to_samples(seconds, self.sample_rate);
    }

    pub fn fade_out_time(&self) -> f32 {
        self.fade.fade_out_seconds
    }

    pub fn set_pause_fade_time(&mut self, seconds: f32) {
        self.fade.pause_fade_seconds = seconds;
        self.fade.pause_fade_samples = fade_time_to_samples(seconds, self.sample_rate);
    }

    pub fn pause_fade_time(&self) -> f32 {
        self.fade.pause_fade_seconds
    }

    pub fn set_resume_fade_time(&mut self, seconds: f32) {
        self.fade.resume_fade_seconds = seconds;
        self.fade.resume_fade_samples = fade_time_to_samples(seconds, self.sample_rate);
    }

    pub fn resume_fade_time(&self) -> f32 {
        self.fade.resume_fade_seconds
    }

    // ===== Volume response =====

    pub fn set_volume_response_nonlinear(&mut self, enabled: bool) {
        self.volume_curve.nonlinear = enabled;
    }

    pub fn volume_response_nonlinear(&self) -> bool {
        self.volume_curve.nonlinear
    }

    /// Gamma exponent for the perceptual volume curve, clamped to 1 - 4.
    pub fn set_volume_response_gamma(&mut self, gamma: f32) {
        self.volume_curve.gamma = gamma.clamp(1.0, 4.0);
    }

    pub fn volume_response_gamma(&self) -> f32 {
        self.volume_curve.gamma
    }

    // ===== Buffer-fill context =====

    /// Transport callback: the first half of the buffer has been
    /// consumed. Refills that half while the transport plays the second.
    pub fn on_first_half_consumed(&mut self) {
        self.process_transfer(BufferHalf::First);
    }

    /// Transport callback: the second half of the buffer has been
    /// consumed. Refills that half while the transport plays the first.
    pub fn on_second_half_consumed(&mut self) {
        self.process_transfer(BufferHalf::Second);
    }

    fn process_transfer(&mut self, half: BufferHalf) {
        let state = self.state();
        if matches!(
            state,
            PlaybackState::Idle | PlaybackState::Error | PlaybackState::PlayingFailed
        ) {
            return;
        }

        // The stop flag is consumed here and nowhere else: this context
        // owns the cursor, so shortening the window cannot race the
        // foreground.
        if self.shared.stop_requested.swap(false, Ordering::SeqCst) {
            match state {
                PlaybackState::Playing => {
                    if let Some(cursor) = self.cursor.as_mut() {
                        let window = self.fade.fade_out_samples as usize;
                        let remaining = cursor.end.saturating_sub(cursor.pos);
                        if remaining > window {
                            cursor.end = cursor.pos + window;
                        }
                    }
                }
                PlaybackState::Pausing | PlaybackState::Paused => {
                    self.finish_session();
                    return;
                }
                _ => {}
            }
        }

        match self.state() {
            PlaybackState::Paused => return,
            PlaybackState::Pausing if self.fade.fade_out_remaining == 0 => {
                self.buffer.fill(SILENCE);
                self.shared.set(PlaybackState::Paused);
                return;
            }
            _ => {}
        }

        let ended = self
            .cursor
            .as_ref()
            .map_or(true, |cursor| cursor.pos >= cursor.end);
        if ended {
            self.finish_session();
            return;
        }
        self.fill_half(half);
    }

    /// Fills one half of the double buffer with processed audio and
    /// advances the cursor by the configured step.
    fn fill_half(&mut self, half: BufferHalf) {
        let offset = half.offset();
        let pausing = self.state() == PlaybackState::Pausing;
        let volume_q16 = self.volume_curve.scale_q16(self.hardware.read_volume());
        let cfg = self.config;
        let air_gain = self.air_gain_q16;

        let fade_in_total = self.fade.fade_in_total;
        let ramp_total = self.fade.fade_out_total;
        let end_window = self.fade.fade_out_samples;
        let mut fade_in_remaining = self.fade.fade_in_remaining;
        let mut ramp_remaining = self.fade.fade_out_remaining;

        let Some(cursor) = self.cursor.as_mut() else {
            self.buffer[offset..offset + HALF_BUFFER_LEN].fill(SILENCE);
            return;
        };

        let params = ChainParams::for_source(&cursor.data, &cfg, air_gain);
        let stereo = cursor.mode == ChannelMode::Stereo;
        let step: u32 = if stereo { 2 } else { 1 };
        let end = cursor.end;
        let mut pos = cursor.pos;
        let mut src_remaining = end.saturating_sub(pos) as u64;

        let channels = &mut self.channels;
        let dither = &mut self.dither;
        let buffer = &mut self.buffer;

        for frame in 0..FRAMES_PER_HALF {
            let fade = FadeFrame {
                fade_in_remaining,
                fade_in_total,
                pausing,
                ramp_remaining,
                ramp_total,
                src_remaining,
                end_window,
            };

            let left = if pos < end {
                let raw = cursor.data.fetch(pos, dither);
                run_chain(apply_volume(raw, volume_q16), &mut channels[0], &params, &fade)
            } else {
                SILENCE
            };
            pos += 1;

            let right = if stereo {
                let value = if pos < end {
                    let raw = cursor.data.fetch(pos, dither);
                    run_chain(apply_volume(raw, volume_q16), &mut channels[1], &params, &fade)
                } else {
                    SILENCE
                };
                pos += 1;
                value
            } else {
                // Mono duplicates the processed sample; the right
                // channel's filter state stays untouched.
                left
            };

            let slot = offset + frame * 2;
            buffer[slot] = left;
            buffer[slot + 1] = right;

            fade_in_remaining = fade_in_remaining.saturating_sub(step);
            ramp_remaining = ramp_remaining.saturating_sub(step);
            src_remaining = src_remaining.saturating_sub(u64::from(step));
        }

        cursor.pos += cursor.advance;
        self.fade.fade_in_remaining = fade_in_remaining;
        self.fade.fade_out_remaining = ramp_remaining;
    }

    /// Ends the session: silence, transport stop, amplifier off, state to
    /// `Idle`, completion notification (once).
    fn finish_session(&mut self) {
        self.buffer.fill(SILENCE);
        self.hardware.transport_stop();
        self.hardware.set_amplifier(false);
        self.cursor = None;
        self.fade.clear_counters();
        self.shared.set(PlaybackState::Idle);
        if !self.end_notified {
            self.end_notified = true;
            self.hardware.on_playback_end();
        }
    }

    fn end_fade_remaining(&self) -> Option<u64> {
        let cursor = self.cursor.as_ref()?;
        let remaining = cursor.end.saturating_sub(cursor.pos) as u64;
        (remaining <= u64::from(self.fade.fade_out_samples)).then_some(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::gain_q16_from_db;
    use std::time::Duration;

    #[derive(Default)]
    struct MockHardware {
        fail_start: bool,
        volume: u16,
        starts: Vec<u32>,
        stops: u32,
        reinits: Vec<u32>,
        amp_states: Vec<bool>,
        completions: u32,
        volume_reads: u32,
    }

    impl MockHardware {
        fn new() -> Self {
            Self {
                volume: u16::MAX,
                ..Self::default()
            }
        }
    }

    impl AudioHardware for MockHardware {
        fn transport_start(
            &mut self,
            _buffer: &[i16],
            sample_rate: u32,
        ) -> Result<(), TransportError> {
            if self.fail_start {
                return Err(TransportError);
            }
            self.starts.push(sample_rate);
            Ok(())
        }

        fn transport_stop(&mut self) {
            self.stops += 1;
        }

        fn transport_reinit(&mut self, sample_rate: u32) {
            self.reinits.push(sample_rate);
        }

        fn set_amplifier(&mut self, enabled: bool) {
            self.amp_states.push(enabled);
        }

        fn read_volume(&mut self) -> u16 {
            self.volume_reads += 1;
            self.volume
        }

        fn on_playback_end(&mut self) {
            self.completions += 1;
        }
    }

    fn mono16(len: usize, value: i16) -> SampleData {
        SampleData::Pcm16(vec![value; len].into())
    }

    fn alternating16(len: usize, amplitude: i16) -> SampleData {
        let samples: Vec<i16> = (0..len)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect();
        SampleData::Pcm16(samples.into())
    }

    fn mono8(len: usize, value: u8) -> SampleData {
        SampleData::Pcm8(vec![value; len].into())
    }

    fn drive_to_idle(engine: &mut AudioEngine<MockHardware>, max_callbacks: u32) {
        let mut first = true;
        for _ in 0..max_callbacks {
            if engine.state() == PlaybackState::Idle {
                return;
            }
            if first {
                engine.on_first_half_consumed();
            } else {
                engine.on_second_half_consumed();
            }
            first = !first;
        }
        assert_eq!(
            engine.state(),
            PlaybackState::Idle,
            "engine never reached idle"
        );
    }

    #[test]
    fn test_play_rejects_empty_sample_without_mutating_state() {
        let mut engine = AudioEngine::new(MockHardware::new());
        let err = engine
            .play(
                SampleData::Pcm16(Vec::new().into()),
                22_000,
                ChannelMode::Mono,
            )
            .unwrap_err();
        assert_eq!(err, PlayError::EmptySample);
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.hardware().starts.is_empty());
        assert_eq!(engine.hardware().stops, 0);
    }

    #[test]
    fn test_play_rejects_zero_sample_rate() {
        let mut engine = AudioEngine::new(MockHardware::new());
        let err = engine
            .play(mono16(1000, 100), 0, ChannelMode::Mono)
            .unwrap_err();
        assert_eq!(err, PlayError::InvalidSampleRate);
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_play_starts_transport_for_every_format() {
        for (data, mode) in [
            (mono16(4096, 500), ChannelMode::Mono),
            (mono16(4096, 500), ChannelMode::Stereo),
            (mono8(4096, 150), ChannelMode::Mono),
            (mono8(4096, 150), ChannelMode::Stereo),
        ] {
            let mut engine = AudioEngine::new(MockHardware::new());
            engine.play(data, 22_000, mode).expect("play must succeed");
            assert_eq!(engine.state(), PlaybackState::Playing);
            assert_eq!(engine.hardware().starts, vec![22_000]);
            assert_eq!(engine.hardware().amp_states.last(), Some(&true));
            assert_eq!(engine.sample_rate(), 22_000);
        }
    }

    #[test]
    fn test_transport_start_failure_sets_playing_failed() {
        let mut engine = AudioEngine::new(MockHardware {
            fail_start: true,
            ..MockHardware::new()
        });
        let err = engine
            .play(mono16(4096, 500), 22_000, ChannelMode::Mono)
            .unwrap_err();
        assert_eq!(err, PlayError::Transport(TransportError));
        assert_eq!(engine.state(), PlaybackState::PlayingFailed);
        assert_eq!(engine.hardware().amp_states.last(), Some(&false));
    }

    #[test]
    fn test_reinit_only_on_sample_rate_change() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(4096, 100), 44_100, ChannelMode::Mono)
            .unwrap();
        assert_eq!(engine.hardware().reinits, vec![44_100]);
        engine
            .play(mono16(4096, 100), 44_100, ChannelMode::Mono)
            .unwrap();
        assert_eq!(engine.hardware().reinits, vec![44_100]);
        engine
            .play(mono16(4096, 100), 22_050, ChannelMode::Mono)
            .unwrap();
        assert_eq!(engine.hardware().reinits, vec![44_100, 22_050]);
    }

    #[test]
    fn test_volume_is_read_once_per_half_buffer() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(100_000, 100), 22_000, ChannelMode::Mono)
            .unwrap();
        // Two pre-filled halves.
        assert_eq!(engine.hardware().volume_reads, 2);
        engine.on_first_half_consumed();
        assert_eq!(engine.hardware().volume_reads, 3);
    }

    #[test]
    fn test_prefill_applies_fade_in_from_sample_zero() {
        let mut engine = AudioEngine::new(MockHardware::new());
        // Band-limited filters would obscure the ramp; leave only the DC
        // blocker (always on) and feed it an alternating signal it passes.
        engine.set_lpf_level_16bit(LpfLevel::Off);
        engine
            .play(alternating16(100_000, 16_000), 22_000, ChannelMode::Mono)
            .unwrap();

        let buffer = engine.playback_buffer();
        assert_eq!(buffer[0], 0, "sample zero must start the fade at silence");
        assert_eq!(buffer[1], 0, "mono output duplicates the left sample");

        let early = i32::from(buffer[2 * 40]).abs();
        let mid = i32::from(buffer[2 * 400]).abs();
        let late = i32::from(buffer[HALF_BUFFER_LEN + 2 * 500]).abs();
        assert!(
            early <= mid && mid < late,
            "fade-in must rise across the pre-filled buffer ({early}, {mid}, {late})"
        );
    }

    #[test]
    fn test_end_to_end_short_sample_reaches_idle_exactly_once() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(2000, 900), 22_000, ChannelMode::Mono)
            .unwrap();
        assert_eq!(engine.state(), PlaybackState::Playing);

        let mut transitions = 0;
        let mut first = true;
        for _ in 0..16 {
            let before = engine.state();
            if first {
                engine.on_first_half_consumed();
            } else {
                engine.on_second_half_consumed();
            }
            first = !first;
            if before == PlaybackState::Playing && engine.state() == PlaybackState::Idle {
                transitions += 1;
            }
        }

        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(transitions, 1, "exactly one Playing -> Idle transition");
        assert_eq!(engine.hardware().completions, 1);
        assert_eq!(engine.hardware().amp_states.last(), Some(&false));
        assert!(engine.playback_buffer().iter().all(|&s| s == SILENCE));

        // Further callbacks after idle must not re-notify.
        engine.on_first_half_consumed();
        engine.on_second_half_consumed();
        assert_eq!(engine.hardware().completions, 1);
    }

    #[test]
    fn test_pause_continuity_mid_fade_in() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(100_000, 1000), 22_000, ChannelMode::Mono)
            .unwrap();

        // Fade-in window of 1000 samples, paused at sample 400: the pause
        // ramp must start from the equivalent level, 400 scaled into the
        // pause window.
        engine.fade.fade_in_total = 1000;
        engine.fade.fade_in_remaining = 600;
        engine.fade.pause_fade_samples = 500;

        assert_eq!(engine.pause(), PlaybackState::Paused);
        assert_eq!(engine.state(), PlaybackState::Pausing);
        assert_eq!(engine.fade.fade_out_remaining, 400 * 500 / 1000);
        assert_eq!(engine.fade.fade_out_total, 500);
        assert_eq!(engine.fade.fade_in_remaining, 0);
    }

    #[test]
    fn test_pause_continuity_inside_end_of_stream_fade() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(4096, 1000), 22_000, ChannelMode::Mono)
            .unwrap();

        engine.fade.fade_in_remaining = 0;
        engine.fade.fade_out_samples = 3300;
        engine.fade.pause_fade_samples = 2200;
        // 1650 samples left in the file: halfway through the end window.
        engine.cursor.as_mut().unwrap().pos = 4096 - 1650;

        engine.pause();
        assert_eq!(engine.fade.fade_out_remaining, 1650 * 2200 / 3300);
    }

    #[test]
    fn test_pause_outside_any_ramp_starts_at_full_level() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(1_000_000, 1000), 22_000, ChannelMode::Mono)
            .unwrap();
        engine.fade.fade_in_remaining = 0;

        engine.pause();
        assert_eq!(engine.fade.fade_out_remaining, engine.fade.pause_fade_samples);
    }

    #[test]
    fn test_pause_resumes_at_exact_saved_position() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(1_000_000, 1000), 22_000, ChannelMode::Mono)
            .unwrap();
        engine.on_first_half_consumed();
        let expected_pos = engine.cursor.as_ref().unwrap().pos;

        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Pausing);

        // The ramp keeps consuming source; the saved position must not.
        let mut first = false;
        for _ in 0..20 {
            if engine.state() == PlaybackState::Paused {
                break;
            }
            if first {
                engine.on_first_half_consumed();
            } else {
                engine.on_second_half_consumed();
            }
            first = !first;
        }
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert!(
            engine.playback_buffer().iter().all(|&s| s == SILENCE),
            "paused buffer must be silent"
        );
        assert!(
            engine.cursor.as_ref().unwrap().pos > expected_pos,
            "ramp must have advanced the cursor past the pause point"
        );

        assert_eq!(engine.resume(), PlaybackState::Playing);
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(
            engine.cursor.as_ref().unwrap().pos,
            expected_pos,
            "resume must restore the exact pause position"
        );
        assert_eq!(
            engine.fade.fade_in_remaining,
            engine.fade.resume_fade_samples
        );
        assert_eq!(engine.fade.fade_out_remaining, 0);
    }

    #[test]
    fn test_pause_ignored_unless_playing() {
        let mut engine = AudioEngine::new(MockHardware::new());
        assert_eq!(engine.pause(), PlaybackState::Idle);
        assert_eq!(engine.resume(), PlaybackState::Idle);
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_stop_while_paused_idles_on_next_callback() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(1_000_000, 1000), 22_000, ChannelMode::Mono)
            .unwrap();
        engine.pause();
        for _ in 0..20 {
            if engine.state() == PlaybackState::Paused {
                break;
            }
            engine.on_first_half_consumed();
        }
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert_eq!(engine.hardware().completions, 0);

        engine.stop();
        // Paused playback keeps streaming silence; the very next callback
        // performs the stop.
        engine.on_first_half_consumed();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.hardware().completions, 1);
        assert!(engine.playback_buffer().iter().all(|&s| s == SILENCE));
    }

    #[test]
    fn test_stop_while_playing_shortens_into_fade_window() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(1_000_000, 1000), 22_000, ChannelMode::Mono)
            .unwrap();
        engine.on_first_half_consumed();
        let pos_at_stop = engine.cursor.as_ref().unwrap().pos;

        engine.stop();
        engine.on_second_half_consumed();
        let cursor_end = engine.cursor.as_ref().unwrap().end;
        assert_eq!(
            cursor_end,
            pos_at_stop + engine.fade.fade_out_samples as usize,
            "stop must shorten the window to a standard fade-out"
        );

        drive_to_idle(&mut engine, 32);
        assert_eq!(engine.hardware().completions, 1);
    }

    #[test]
    fn test_stop_when_idle_is_a_no_op() {
        let engine = AudioEngine::new(MockHardware::new());
        engine.stop();
        assert!(!engine.shared.stop_requested.load(Ordering::SeqCst));
    }

    #[test]
    fn test_filter_config_round_trip_normalizes_gains() {
        let mut engine = AudioEngine::new(MockHardware::new());
        let submitted = FilterConfig {
            noise_gate: true,
            air_effect: true,
            lpf_makeup_gain_8bit_q16: 0,
            lpf_level_16bit: LpfLevel::Aggressive,
            ..FilterConfig::default()
        };
        engine.set_filter_config(submitted);
        let returned = engine.filter_config();

        assert_eq!(
            returned.lpf_makeup_gain_8bit_q16,
            crate::config::LPF_MAKEUP_GAIN_8BIT_DEFAULT
        );
        assert_eq!(
            FilterConfig {
                lpf_makeup_gain_8bit_q16: returned.lpf_makeup_gain_8bit_q16,
                ..submitted
            },
            returned,
            "all other fields must round-trip bit-identically"
        );
    }

    #[test]
    fn test_lpf_level_off_disables_stage() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine.set_lpf_level_16bit(LpfLevel::Off);
        assert!(!engine.filter_config().biquad_lpf_16bit);
        engine.set_lpf_level_16bit(LpfLevel::Firm);
        assert!(engine.filter_config().biquad_lpf_16bit);
        assert_eq!(engine.lpf_level_16bit(), LpfLevel::Firm);

        engine.set_lpf_level_8bit(LpfLevel::Off);
        assert!(!engine.filter_config().one_pole_lpf_8bit);
        engine.set_lpf_level_8bit(LpfLevel::Aggressive);
        assert!(engine.filter_config().one_pole_lpf_8bit);
    }

    #[test]
    fn test_makeup_gain_setter_clamps_linear_range() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine.set_lpf_makeup_gain_8bit(10.0);
        assert_eq!(engine.filter_config().lpf_makeup_gain_8bit_q16, 131_072);
        engine.set_lpf_makeup_gain_8bit(0.0);
        assert_eq!(engine.filter_config().lpf_makeup_gain_8bit_q16, 6554);
    }

    #[test]
    fn test_air_preset_selection_and_cycling() {
        let mut engine = AudioEngine::new(MockHardware::new());
        assert_eq!(engine.air_effect_preset_index(), 0);
        assert!(!engine.air_effect_enabled());

        engine.set_air_effect_preset(2);
        assert!(engine.air_effect_enabled());
        assert_eq!(engine.air_effect_preset_index(), 2);
        assert_eq!(engine.air_effect_gain_q16(), gain_q16_from_db(2.0));

        // Out-of-range selection falls back to "off".
        engine.set_air_effect_preset(200);
        assert_eq!(engine.air_effect_preset_index(), 0);
        assert!(!engine.air_effect_enabled());

        // Cycling wraps through every preset back to off.
        let count = engine.air_effect_preset_count();
        for expected in 1..count {
            assert_eq!(engine.cycle_air_effect_preset(), expected);
            assert!(engine.air_effect_enabled());
        }
        assert_eq!(engine.cycle_air_effect_preset(), 0);
        assert!(!engine.air_effect_enabled());
    }

    #[test]
    fn test_air_gain_caps_at_maximum() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine.set_air_effect_gain_q16(1_000_000);
        assert_eq!(engine.air_effect_gain_q16(), AIR_SHELF_GAIN_MAX);
        engine.set_air_effect_gain_db(60.0);
        assert_eq!(engine.air_effect_gain_q16(), AIR_SHELF_GAIN_MAX);
    }

    #[test]
    fn test_fade_time_setters_recompute_sample_counts() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine.set_fade_in_time(0.2);
        assert_eq!(engine.fade_in_time(), 0.2);
        assert_eq!(engine.fade.fade_in_samples, 4400);

        // Out-of-range times clamp at the conversion, not in the getter.
        engine.set_pause_fade_time(100.0);
        assert_eq!(engine.pause_fade_time(), 100.0);
        assert_eq!(engine.fade.pause_fade_samples, 5 * 22_000);

        // A new session at a different rate recomputes the counts.
        engine
            .play(mono16(4096, 100), 11_000, ChannelMode::Mono)
            .unwrap();
        assert_eq!(engine.fade.fade_in_samples, 2200);
        assert_eq!(engine.fade.pause_fade_samples, 5 * 11_000);
    }

    #[test]
    fn test_volume_gamma_setter_clamps() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine.set_volume_response_gamma(0.2);
        assert_eq!(engine.volume_response_gamma(), 1.0);
        engine.set_volume_response_gamma(9.0);
        assert_eq!(engine.volume_response_gamma(), 4.0);
        engine.set_volume_response_nonlinear(true);
        assert!(engine.volume_response_nonlinear());
    }

    #[test]
    fn test_stereo_source_advances_full_chunk_per_half() {
        let mut engine = AudioEngine::new(MockHardware::new());
        engine
            .play(mono16(100_000, 1000), 22_000, ChannelMode::Stereo)
            .unwrap();
        // Two pre-filled halves at a full chunk each.
        assert_eq!(engine.cursor.as_ref().unwrap().pos, 2 * HALF_BUFFER_LEN);
        engine.on_first_half_consumed();
        assert_eq!(engine.cursor.as_ref().unwrap().pos, 3 * HALF_BUFFER_LEN);
    }

    #[test]
    fn test_wait_for_end_across_threads() {
        struct NotifyingHardware {
            done: crossbeam_channel::Sender<()>,
        }

        impl AudioHardware for NotifyingHardware {
            fn transport_start(
                &mut self,
                _buffer: &[i16],
                _sample_rate: u32,
            ) -> Result<(), TransportError> {
                Ok(())
            }
            fn transport_stop(&mut self) {}
            fn transport_reinit(&mut self, _sample_rate: u32) {}
            fn set_amplifier(&mut self, _enabled: bool) {}
            fn read_volume(&mut self) -> u16 {
                u16::MAX
            }
            fn on_playback_end(&mut self) {
                let _ = self.done.try_send(());
            }
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let mut engine = AudioEngine::new(NotifyingHardware { done: done_tx });
        engine
            .play(mono16(8192, 700), 22_000, ChannelMode::Mono)
            .unwrap();
        let handle = engine.handle();

        // Simulated transport context: keeps consuming halves until the
        // engine idles, as the interrupt callbacks would.
        let transport = thread::spawn(move || {
            let mut first = true;
            while engine.state() != PlaybackState::Idle {
                if first {
                    engine.on_first_half_consumed();
                } else {
                    engine.on_second_half_consumed();
                }
                first = !first;
                thread::sleep(Duration::from_millis(1));
            }
        });

        assert_eq!(handle.wait_for_end(), PlaybackState::Idle);
        done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("completion notification must arrive");
        transport.join().expect("transport thread must exit cleanly");
    }
}
