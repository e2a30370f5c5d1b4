//! The per-block audio entry point

use tracing::{info, warn};

use crate::bridge::{self, AudioSide, ControlMessage, ControlSide, Gesture};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::midi::{MidiDispatcher, MidiEvent};
use crate::params::{ParamId, ParameterStore};
use crate::plugin::{GAIN, PARAMETERS, STATES};
use crate::state::{StateId, StateValue};
use crate::voice::{VoicePool, VoiceState};

/// Lifecycle of an engine, as driven by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    /// Built, never activated
    Constructed,
    /// Processing audio
    Activated,
    Deactivated,
}

/// What a host needs from the real-time core.
///
/// `activate`, `deactivate`, `run` and `set_parameter_value` are called from the audio
/// thread and never block, allocate or log. `sample_rate_changed` is only valid while the
/// engine isn't activated.
pub trait AudioCore {
    /// Prepare for processing: smoothers snap to their targets, note state is cleared
    fn activate(&mut self);

    fn deactivate(&mut self);

    /// Process one block.
    ///
    /// `inputs` and `outputs` hold one slice per channel. `midi_events` must be sorted by
    /// frame offset. Outside of the activated state the outputs are silenced.
    fn run(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frames: usize,
        midi_events: &[MidiEvent],
    );

    /// Propagate a new sample rate to every smoother
    fn sample_rate_changed(&mut self, sample_rate: f64) -> Result<()>;

    /// Automation entry point. Values are clamped, never rejected. Unknown ids are dropped.
    fn set_parameter_value(&mut self, id: ParamId, value: f32);

    /// Current value, or 0 for an unknown id
    fn parameter_value(&self, id: ParamId) -> f32;
}

/// The audio engine: parameters, MIDI and voices, fed by a [`ControlSide`] on the UI
/// thread.
///
/// MIDI is applied sample-accurately: the block is rendered up to each event's frame
/// offset before the event is dispatched.
///
/// ```
/// use schall::{AudioCore, AudioEngine, EngineConfig, MidiEvent, plugin::GAIN};
///
/// let (mut engine, mut control) = AudioEngine::new(EngineConfig::new(48_000.0));
/// engine.activate();
///
/// control.set_parameter(GAIN, -6.0).unwrap();
///
/// let input = [0.5f32; 64];
/// let (mut left, mut right) = ([0.0f32; 64], [0.0f32; 64]);
/// let note = [MidiEvent::new(16, [0x90, 60, 100])];
/// engine.run(&[&input, &input], &mut [&mut left, &mut right], 64, &note);
///
/// assert_eq!(engine.parameter_value(GAIN), -6.0);
/// assert_eq!(engine.voices().active_count(), 1);
/// ```
pub struct AudioEngine {
    status: EngineStatus,
    sample_rate: f64,
    params: ParameterStore,
    dispatcher: MidiDispatcher,
    voices: VoicePool,
    states: Box<[StateValue]>,
    bridge: AudioSide,
    gestures: Vec<Gesture>,
    gesture_capacity: usize,
}

impl AudioEngine {
    /// Build an engine and the control end the UI talks to it through
    pub fn new(config: EngineConfig) -> (Self, ControlSide) {
        let (audio, control) = bridge::channel(&PARAMETERS, &STATES, &config);

        let params = ParameterStore::with_table(
            &PARAMETERS,
            config.sample_rate as f32,
            config.smoothing_time,
        );

        let states = STATES
            .iter()
            .map(|info| StateValue::copy_from(info.default).unwrap_or_default())
            .collect();

        info!(
            sample_rate = config.sample_rate,
            polyphony = config.polyphony,
            "audio engine created"
        );

        let engine = Self {
            status: EngineStatus::Constructed,
            sample_rate: config.sample_rate,
            params,
            dispatcher: MidiDispatcher::new(),
            voices: VoicePool::new(config.polyphony),
            states,
            bridge: audio,
            gestures: Vec::with_capacity(config.queue_size),
            gesture_capacity: config.queue_size,
        };

        (engine, control)
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn midi(&self) -> &MidiDispatcher {
        &self.dispatcher
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn active_voices(&self) -> impl Iterator<Item = &VoiceState> {
        self.voices.active()
    }

    /// Value of a state key as of the last block boundary
    pub fn state(&self, id: StateId) -> &str {
        self.states[id.index()].as_str()
    }

    /// UI edits applied at the start of the last block (or by `activate`), in the order
    /// they arrived, for the host to forward
    pub fn gestures(&self) -> &[Gesture] {
        &self.gestures
    }

    /// Drain everything the UI queued since the last block
    fn apply_control_messages(&mut self) {
        self.gestures.clear();
        let mut dropped = 0;

        while let Some(message) = self.bridge.next_message() {
            let gesture = match message {
                ControlMessage::SetParameter(id, value) => {
                    if !self.params.contains(id) {
                        continue;
                    }
                    let stored = self.params.set(id, value);
                    self.bridge.publish(id, stored);
                    Gesture::Set(id, stored)
                }
                ControlMessage::BeginEdit(id) => Gesture::Begin(id),
                ControlMessage::EndEdit(id) => Gesture::End(id),
            };

            // capacity is fixed, never grow on the audio thread
            if self.gestures.len() < self.gesture_capacity {
                self.gestures.push(gesture);
            } else {
                dropped += 1;
            }
        }
        self.bridge.report_dropped_gestures(dropped);

        while let Some(update) = self.bridge.next_state() {
            if let Some(slot) = self.states.get_mut(update.id.index()) {
                *slot = update.value;
            }
        }
    }

    /// Render `start..end` of the block with the current smoothed gain
    #[inline]
    fn render(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], start: usize, end: usize) {
        for i in start..end {
            let gain = self.params.next_smoothed(GAIN);

            for (ch, out) in outputs.iter_mut().enumerate() {
                // Fewer inputs than outputs: reuse the last input channel
                let sample = inputs
                    .get(ch)
                    .or_else(|| inputs.last())
                    .and_then(|input| input.get(i))
                    .copied()
                    .unwrap_or(0.0);
                out[i] = sample * gain;
            }
        }
    }
}

/// A stretch of the block to render, followed by the event that ends it
#[derive(Clone, Copy, Debug, PartialEq)]
struct Slice<'a> {
    start: usize,
    end: usize,
    event: Option<&'a MidiEvent>,
}

/// Splits a block at the frame offsets of its MIDI events.
///
/// Late or out-of-order offsets are clamped to the current position, offsets past the end
/// to the end of the block. The last slice carries no event.
struct Slices<'a> {
    events: core::slice::Iter<'a, MidiEvent>,
    position: usize,
    frames: usize,
    done: bool,
}

fn slices(events: &[MidiEvent], frames: usize) -> Slices<'_> {
    Slices {
        events: events.iter(),
        position: 0,
        frames,
        done: false,
    }
}

impl<'a> Iterator for Slices<'a> {
    type Item = Slice<'a>;

    fn next(&mut self) -> Option<Slice<'a>> {
        if self.done {
            return None;
        }
        let start = self.position;
        match self.events.next() {
            Some(event) => {
                let end = (event.frame as usize).clamp(start, self.frames);
                self.position = end;
                Some(Slice { start, end, event: Some(event) })
            }
            None => {
                self.done = true;
                Some(Slice { start, end: self.frames, event: None })
            }
        }
    }
}

fn silence(outputs: &mut [&mut [f32]], frames: usize) {
    for out in outputs.iter_mut() {
        let len = frames.min(out.len());
        out[..len].iter_mut().for_each(|s| *s = 0.0);
    }
}

impl AudioCore for AudioEngine {
    fn activate(&mut self) {
        // edits made while inactive land before the snap
        self.apply_control_messages();
        self.params.snap_smoothers();
        self.dispatcher.reset();
        self.voices.reset();
        self.status = EngineStatus::Activated;
    }

    fn deactivate(&mut self) {
        self.status = EngineStatus::Deactivated;
    }

    fn run(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frames: usize,
        midi_events: &[MidiEvent],
    ) {
        // keep the UI queues moving even while the host has us switched off
        self.apply_control_messages();

        if self.status != EngineStatus::Activated {
            silence(outputs, frames);
            return;
        }

        let frames = outputs.iter().map(|out| out.len()).fold(frames, usize::min);

        let mut ignored = 0;
        for slice in slices(midi_events, frames) {
            self.render(inputs, outputs, slice.start, slice.end);

            if let Some(event) = slice.event {
                self.voices.set_position(slice.end as u32);
                if !self.dispatcher.dispatch(event, &mut self.voices) {
                    ignored += 1;
                }
            }
        }

        self.bridge.report_ignored_midi(ignored);
    }

    fn sample_rate_changed(&mut self, sample_rate: f64) -> Result<()> {
        if self.status == EngineStatus::Activated {
            warn!(sample_rate, "sample rate change while activated");
            return Err(Error::InvalidTransition {
                op: "change sample rate",
                status: self.status,
            });
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            warn!(sample_rate, "ignoring invalid sample rate");
            return Err(Error::InvalidSampleRate(sample_rate));
        }

        self.sample_rate = sample_rate;
        self.params.set_sample_rate(sample_rate as f32);
        info!(sample_rate, "sample rate changed");
        Ok(())
    }

    #[inline]
    fn set_parameter_value(&mut self, id: ParamId, value: f32) {
        if !self.params.contains(id) {
            return;
        }
        let stored = self.params.set(id, value);
        self.bridge.publish(id, stored);
    }

    #[inline]
    fn parameter_value(&self, id: ParamId) -> f32 {
        if self.params.contains(id) {
            self.params.get(id)
        } else {
            0.0
        }
    }
}
