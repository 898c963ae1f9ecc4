//! Collaborator interface between the engine and the surrounding system.

use thiserror::Error;

/// The streaming transport could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("audio transport failed to start")]
pub struct TransportError;

/// Capability set the application injects at engine construction.
///
/// Bundles the streaming transport, the amplifier power rail, the volume
/// source and the end-of-playback notification. Injecting the whole set up
/// front means playback can never begin with a missing callback.
///
/// Context contract: `transport_start`, `transport_stop` (from control
/// calls), `transport_reinit` and `set_amplifier` run on the foreground
/// control context. `read_volume`, `on_playback_end` and the
/// `transport_stop` issued at end of stream run inside the buffer-fill
/// context and must not block or allocate.
pub trait AudioHardware {
    /// Begins streaming the interleaved stereo double buffer.
    ///
    /// The engine refills one half of `buffer` each time the transport
    /// reports the other half consumed (via
    /// [`AudioEngine::on_first_half_consumed`] /
    /// [`AudioEngine::on_second_half_consumed`]); implementations read the
    /// current contents through [`AudioEngine::playback_buffer`].
    ///
    /// [`AudioEngine::on_first_half_consumed`]: crate::AudioEngine::on_first_half_consumed
    /// [`AudioEngine::on_second_half_consumed`]: crate::AudioEngine::on_second_half_consumed
    /// [`AudioEngine::playback_buffer`]: crate::AudioEngine::playback_buffer
    fn transport_start(&mut self, buffer: &[i16], sample_rate: u32) -> Result<(), TransportError>;

    /// Stops streaming. Must be safe to call when already stopped.
    fn transport_stop(&mut self);

    /// Reconfigures the transport clock; invoked before `transport_start`
    /// when a new playback session changes the sample rate.
    fn transport_reinit(&mut self, sample_rate: u32);

    /// Switches the amplifier power rail. On at play start, off at full
    /// stop.
    fn set_amplifier(&mut self, enabled: bool);

    /// Reads the current volume setting in `[1, 65535]`.
    ///
    /// Called once per half-buffer. Readings need not be monotonic or
    /// noise-free; 0 is tolerated and treated as 1.
    fn read_volume(&mut self) -> u16;

    /// Playback session ended (naturally or via stop). Invoked exactly
    /// once per session, from the buffer-fill context.
    fn on_playback_end(&mut self) {}
}
