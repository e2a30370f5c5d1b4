//! Lock-free bridge between the audio thread and the UI/host thread
//!
//! Two one-way paths, both sized when the bridge is created:
//! - audio -> UI: one overwrite-latest slot per parameter (an atomic value plus a dirty
//!   flag). The UI sees the latest value of every parameter, not every intermediate one.
//! - UI -> audio: parameter edits (bracketed by begin/end gestures) and state loads,
//!   carried by `rtrb` ring buffers and drained by the engine at the start of each block.
//!
//! The audio side never locks, allocates or logs. Everything that may fail is checked on
//! the control side, where failures are logged and returned.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use hashbrown::HashMap;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::params::{ParamId, ParameterInfo};
use crate::state::{StateId, StateInfo, StateUpdate, StateValue, MAX_STATE_LEN};

/// A request travelling from the UI to the audio thread
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlMessage {
    /// The user grabbed a control
    BeginEdit(ParamId),
    SetParameter(ParamId, f32),
    /// The user let go of a control
    EndEdit(ParamId),
}

/// A user edit as seen by the audio thread, reported to the host in arrival order so
/// it can tell which values fall inside a begin/end bracket
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    Begin(ParamId),
    /// The value actually stored, after clamping
    Set(ParamId, f32),
    End(ParamId),
}

/// Receives change notifications on the UI thread.
///
/// Notifications are repaint triggers: the same value may be delivered twice, and fast
/// intermediate values may be skipped.
pub trait Renderer {
    fn parameter_changed(&mut self, id: ParamId, value: f32);

    fn state_changed(&mut self, key: &str, value: &str);
}

struct ParamSlot {
    value: AtomicF32,
    dirty: AtomicBool,
}

struct Shared {
    params: Box<[ParamSlot]>,
    ignored_midi: AtomicU32,
    dropped_gestures: AtomicU32,
}

/// Create a connected pair of bridge ends.
///
/// Parameter slots start out at each parameter's default and are all reported on the
/// first [`ControlSide::poll`].
pub fn channel(
    params: &[ParameterInfo],
    states: &[StateInfo],
    config: &EngineConfig,
) -> (AudioSide, ControlSide) {
    let shared = Arc::new(Shared {
        params: params
            .iter()
            .map(|info| ParamSlot {
                value: AtomicF32::new(info.normalize(info.default).unwrap_or(info.min)),
                dirty: AtomicBool::new(true),
            })
            .collect(),
        ignored_midi: AtomicU32::new(0),
        dropped_gestures: AtomicU32::new(0),
    });

    let (message_tx, message_rx) = RingBuffer::new(config.queue_size.max(1));
    let (state_tx, state_rx) = RingBuffer::new(config.state_queue_size.max(1));

    let registry = states
        .iter()
        .enumerate()
        .map(|(index, info)| {
            let entry = StateEntry {
                id: StateId(index as u32),
                info: *info,
                value: info.default.to_owned(),
                pending: !info.default.is_empty(),
            };
            (info.key, entry)
        })
        .collect();

    debug!(
        parameters = params.len(),
        states = states.len(),
        queue_size = config.queue_size,
        "control bridge created"
    );

    let audio = AudioSide {
        shared: shared.clone(),
        messages: message_rx,
        states: state_rx,
    };

    let control = ControlSide {
        shared,
        params: params.into(),
        states: registry,
        messages: message_tx,
        state_updates: state_tx,
        editing: vec![false; params.len()].into_boxed_slice(),
        seen_ignored_midi: 0,
        seen_dropped_gestures: 0,
    };

    (audio, control)
}

/// The audio thread's end of the bridge. Every method is wait-free.
pub struct AudioSide {
    shared: Arc<Shared>,
    messages: Consumer<ControlMessage>,
    states: Consumer<StateUpdate>,
}

impl AudioSide {
    /// Take the next pending edit, if any
    #[inline]
    pub fn next_message(&mut self) -> Option<ControlMessage> {
        self.messages.pop().ok()
    }

    /// Take the next pending state load, if any
    #[inline]
    pub fn next_state(&mut self) -> Option<StateUpdate> {
        self.states.pop().ok()
    }

    /// Make a parameter value visible to the UI
    #[inline]
    pub fn publish(&self, id: ParamId, value: f32) {
        if let Some(slot) = self.shared.params.get(id.index()) {
            slot.value.store(value, Ordering::Relaxed);
            slot.dirty.store(true, Ordering::Release);
        }
    }

    #[inline]
    pub fn report_ignored_midi(&self, count: u32) {
        if count > 0 {
            self.shared.ignored_midi.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn report_dropped_gestures(&self, count: u32) {
        if count > 0 {
            self.shared.dropped_gestures.fetch_add(count, Ordering::Relaxed);
        }
    }
}

struct StateEntry {
    id: StateId,
    info: StateInfo,
    value: String,
    /// Changed since the renderer last heard about it
    pending: bool,
}

/// The UI/host thread's end of the bridge.
///
/// Validates requests before they reach the audio thread: unknown indices and keys, empty
/// or oversized state values are logged and rejected, and the previous state is kept.
pub struct ControlSide {
    shared: Arc<Shared>,
    params: Box<[ParameterInfo]>,
    states: HashMap<&'static str, StateEntry>,
    messages: Producer<ControlMessage>,
    state_updates: Producer<StateUpdate>,
    editing: Box<[bool]>,
    seen_ignored_midi: u32,
    seen_dropped_gestures: u32,
}

impl ControlSide {
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    pub fn parameter_info(&self, id: ParamId) -> Option<&ParameterInfo> {
        self.params.get(id.index())
    }

    /// Last value the audio side published
    pub fn parameter_value(&self, id: ParamId) -> Option<f32> {
        self.shared
            .params
            .get(id.index())
            .map(|slot| slot.value.load(Ordering::Relaxed))
    }

    pub fn is_editing(&self, id: ParamId) -> bool {
        self.editing.get(id.index()).copied().unwrap_or(false)
    }

    /// Open an edit gesture, e.g. when a slider is grabbed
    pub fn begin_edit(&mut self, id: ParamId) -> Result<()> {
        self.check(id)?;
        if self.editing[id.index()] {
            return Ok(());
        }
        self.send(ControlMessage::BeginEdit(id))?;
        self.editing[id.index()] = true;
        Ok(())
    }

    /// Ask the audio side to change a parameter.
    ///
    /// The value is clamped by the audio side; the result comes back through
    /// [`poll`](Self::poll).
    pub fn set_parameter(&mut self, id: ParamId, value: f32) -> Result<()> {
        self.check(id)?;
        self.send(ControlMessage::SetParameter(id, value))
    }

    /// Close an edit gesture opened with [`begin_edit`](Self::begin_edit)
    pub fn end_edit(&mut self, id: ParamId) -> Result<()> {
        self.check(id)?;
        if !self.editing[id.index()] {
            warn!(parameter = id.0, "end of edit without a matching begin");
            return Err(Error::NotEditing(id));
        }
        self.send(ControlMessage::EndEdit(id))?;
        self.editing[id.index()] = false;
        Ok(())
    }

    /// Deliver a new state value, e.g. a file path the user picked or the host restored.
    ///
    /// On error the previous value stays in place and the renderer hears nothing.
    pub fn set_state(&mut self, key: &str, value: &str) -> Result<()> {
        let Some(entry) = self.states.get_mut(key) else {
            warn!(key, "dropping value for unknown state key");
            return Err(Error::UnknownState(key.to_owned()));
        };

        if value.is_empty() {
            warn!(key, "rejecting empty state value");
            return Err(Error::EmptyState(entry.info.key));
        }

        let Some(state) = StateValue::copy_from(value) else {
            warn!(key, len = value.len(), "rejecting oversized state value");
            return Err(Error::StateTooLong {
                key: entry.info.key,
                len: value.len(),
                max: MAX_STATE_LEN,
            });
        };

        if entry.value == value {
            return Ok(());
        }

        let update = StateUpdate {
            id: entry.id,
            value: state,
        };
        if self.state_updates.push(update).is_err() {
            warn!(key, "state queue full, keeping previous value");
            return Err(Error::QueueFull);
        }

        debug!(key, value, "state changed");
        entry.value.clear();
        entry.value.push_str(value);
        entry.pending = true;
        Ok(())
    }

    /// Current value of a state key
    pub fn state(&self, key: &str) -> Option<&str> {
        self.states.get(key).map(|entry| entry.value.as_str())
    }

    /// Deliver every pending change to `renderer` and return how many were delivered.
    ///
    /// Also logs problems the audio side counted since the last poll.
    pub fn poll<R: Renderer>(&mut self, renderer: &mut R) -> usize {
        let mut delivered = 0;

        for (index, slot) in self.shared.params.iter().enumerate() {
            if slot.dirty.swap(false, Ordering::Acquire) {
                let value = slot.value.load(Ordering::Relaxed);
                renderer.parameter_changed(ParamId(index as u32), value);
                delivered += 1;
            }
        }

        for entry in self.states.values_mut() {
            if core::mem::take(&mut entry.pending) {
                renderer.state_changed(entry.info.key, &entry.value);
                delivered += 1;
            }
        }

        self.log_diagnostics();
        delivered
    }

    fn log_diagnostics(&mut self) {
        let ignored = self.shared.ignored_midi.load(Ordering::Relaxed);
        if ignored != self.seen_ignored_midi {
            warn!(
                count = ignored.wrapping_sub(self.seen_ignored_midi),
                "ignored unsupported or malformed MIDI events"
            );
            self.seen_ignored_midi = ignored;
        }

        let dropped = self.shared.dropped_gestures.load(Ordering::Relaxed);
        if dropped != self.seen_dropped_gestures {
            warn!(
                count = dropped.wrapping_sub(self.seen_dropped_gestures),
                "gesture buffer full, gestures dropped"
            );
            self.seen_dropped_gestures = dropped;
        }
    }

    fn check(&self, id: ParamId) -> Result<()> {
        if id.index() < self.params.len() {
            Ok(())
        } else {
            warn!(parameter = id.0, "dropping request for unknown parameter");
            Err(Error::UnknownParameter(id))
        }
    }

    fn send(&mut self, message: ControlMessage) -> Result<()> {
        self.messages.push(message).map_err(|rtrb::PushError::Full(message)| {
            warn!(?message, "control queue full, dropping request");
            Error::QueueFull
        })
    }
}
