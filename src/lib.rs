//! Schall - a real-time-safe audio plugin core
//!
//! Design principles:
//! - The audio thread never allocates, locks, blocks or logs
//! - The UI talks to the engine through `rtrb` ring buffers, never shared state
//! - The engine reports back through overwrite-latest atomic slots
//! - Every parameter change is smoothed per sample
//! - MIDI is applied at its frame offset within the block
//!
//! ```
//! use schall::{AudioCore, AudioEngine, EngineConfig, ParamId, Renderer};
//!
//! struct Meter(Vec<(ParamId, f32)>);
//!
//! impl Renderer for Meter {
//!     fn parameter_changed(&mut self, id: ParamId, value: f32) {
//!         self.0.push((id, value));
//!     }
//!     fn state_changed(&mut self, _key: &str, _value: &str) {}
//! }
//!
//! let (mut engine, mut control) = AudioEngine::new(EngineConfig::default());
//! engine.activate();
//!
//! // host automation, on the audio thread
//! engine.set_parameter_value(schall::plugin::GAIN, -12.0);
//!
//! // UI thread
//! let mut meter = Meter(Vec::new());
//! control.poll(&mut meter);
//! assert!(meter.0.contains(&(schall::plugin::GAIN, -12.0)));
//! ```

mod bridge;
mod config;
mod engine;
mod error;
mod params;
mod smoother;
mod state;
mod voice;

#[cfg(feature = "cpal_sink")]
mod device;

pub mod midi;
pub mod plugin;

pub use bridge::{AudioSide, ControlMessage, ControlSide, Gesture, Renderer};
pub use config::EngineConfig;
pub use engine::{AudioCore, AudioEngine, EngineStatus};
pub use error::{Error, Result};
pub use midi::{cc, MidiDispatcher, MidiEvent, MidiHandler, MidiMessage};
pub use params::{db_to_gain, ParamId, ParameterInfo, ParameterStore, Smoothing, MIN_DB};
pub use smoother::{ValueSmoother, SETTLE_EPSILON};
pub use state::{StateHint, StateId, StateInfo, StateUpdate, StateValue, MAX_STATE_LEN};
pub use voice::{VoicePool, VoiceState};

#[cfg(feature = "cpal_sink")]
pub use device::{CpalDevice, CpalStream};
