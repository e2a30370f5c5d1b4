//! MIDI channel voice decoding and dispatch
//!
//! Events arrive from the host as raw 3-byte messages tagged with a frame offset.
//! [`MidiMessage::decode`] classifies them, [`MidiDispatcher`] keeps the per-channel
//! note/controller state in fixed arrays and forwards each message to a [`MidiHandler`].
//! Nothing in here allocates.

/// Number of MIDI channels
pub const CHANNELS: usize = 16;

/// Number of note / controller numbers per channel
pub const NOTES: usize = 128;

/// Status nibble of a note-off message
pub const NOTE_OFF: u8 = 0x80;
/// Status nibble of a note-on message
pub const NOTE_ON: u8 = 0x90;
/// Status nibble of a control change message
pub const CONTROL_CHANGE: u8 = 0xB0;
/// Status nibble of a program change message
pub const PROGRAM_CHANGE: u8 = 0xC0;
/// Status nibble of a pitch bend message
pub const PITCH_BEND: u8 = 0xE0;

/// Controller numbers with channel-mode meaning
pub mod cc {
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// A raw MIDI event as delivered by the host for one block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Offset of the event within the current block, in frames
    pub frame: u32,
    /// Status/channel byte followed by two data bytes
    pub data: [u8; 3],
}

impl MidiEvent {
    pub const fn new(frame: u32, data: [u8; 3]) -> Self {
        Self { frame, data }
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.data[0] & 0xF0
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.data[0] & 0x0F
    }
}

/// A decoded channel voice message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    /// Bend amount centred on zero, -8192..=8191
    PitchBend { channel: u8, value: i16 },
}

impl MidiMessage {
    /// Decode a raw message.
    ///
    /// Returns `None` for anything that isn't one of the five supported channel voice
    /// messages, including messages whose data bytes have the high bit set.
    pub fn decode(data: [u8; 3]) -> Option<Self> {
        let [status, d1, d2] = data;
        let channel = status & 0x0F;

        match status & 0xF0 {
            NOTE_OFF => valid(d1, d2).then_some(MidiMessage::NoteOff {
                channel,
                note: d1,
                velocity: d2,
            }),
            NOTE_ON => valid(d1, d2).then_some(MidiMessage::NoteOn {
                channel,
                note: d1,
                velocity: d2,
            }),
            CONTROL_CHANGE => valid(d1, d2).then_some(MidiMessage::ControlChange {
                channel,
                controller: d1,
                value: d2,
            }),
            // Two-byte message, the third byte is padding
            PROGRAM_CHANGE => (d1 < 0x80).then_some(MidiMessage::ProgramChange {
                channel,
                program: d1,
            }),
            PITCH_BEND => valid(d1, d2).then(|| MidiMessage::PitchBend {
                channel,
                value: ((d2 as i16) << 7 | d1 as i16) - 8192,
            }),
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => channel,
        }
    }
}

#[inline]
fn valid(d1: u8, d2: u8) -> bool {
    (d1 | d2) & 0x80 == 0
}

/// Receiver for decoded MIDI messages.
///
/// Every method defaults to doing nothing, implement the ones you care about.
/// Handlers are called from the audio thread and must not block or allocate.
pub trait MidiHandler {
    fn note_on(&mut self, _channel: u8, _note: u8, _velocity: u8) {}

    fn note_off(&mut self, _channel: u8, _note: u8, _velocity: u8) {}

    fn control_change(&mut self, _channel: u8, _controller: u8, _value: u8) {}

    fn program_change(&mut self, _channel: u8, _program: u8) {}

    fn pitch_bend(&mut self, _channel: u8, _value: i16) {}
}

/// A handler that ignores everything
impl MidiHandler for () {}

/// Decodes raw events, tracks channel state and routes messages to a handler
#[derive(Clone)]
pub struct MidiDispatcher {
    /// Velocity of each held note, 0 = not held
    notes: [[u8; NOTES]; CHANNELS],
    controllers: [[u8; NOTES]; CHANNELS],
    programs: [u8; CHANNELS],
    pitch_bend: [i16; CHANNELS],
    held: usize,
}

impl MidiDispatcher {
    pub fn new() -> Self {
        Self {
            notes: [[0; NOTES]; CHANNELS],
            controllers: [[0; NOTES]; CHANNELS],
            programs: [0; CHANNELS],
            pitch_bend: [0; CHANNELS],
            held: 0,
        }
    }

    /// Forget all notes and controller values
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Decode one event, update channel state and call the matching handler method.
    ///
    /// Returns `false` if the event was not a supported channel voice message; in that
    /// case nothing was changed.
    pub fn dispatch<H: MidiHandler>(&mut self, event: &MidiEvent, handler: &mut H) -> bool {
        match MidiMessage::decode(event.data) {
            Some(message) => {
                self.apply(message, handler);
                true
            }
            None => false,
        }
    }

    /// Update channel state with an already decoded message
    pub fn apply<H: MidiHandler>(&mut self, message: MidiMessage, handler: &mut H) {
        match message {
            // Note-on with zero velocity is a note-off by convention
            MidiMessage::NoteOn { channel, note, velocity: 0 } => {
                self.release(channel, note, 0, handler);
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                let slot = &mut self.notes[channel as usize][note as usize];
                if *slot == 0 {
                    self.held += 1;
                }
                *slot = velocity;
                handler.note_on(channel, note, velocity);
            }
            MidiMessage::NoteOff { channel, note, velocity } => {
                self.release(channel, note, velocity, handler);
            }
            MidiMessage::ControlChange { channel, controller, value } => {
                self.controllers[channel as usize][controller as usize] = value;
                handler.control_change(channel, controller, value);

                if controller == cc::ALL_NOTES_OFF || controller == cc::ALL_SOUND_OFF {
                    for note in 0..NOTES as u8 {
                        self.release(channel, note, 0, handler);
                    }
                }
            }
            MidiMessage::ProgramChange { channel, program } => {
                self.programs[channel as usize] = program;
                handler.program_change(channel, program);
            }
            MidiMessage::PitchBend { channel, value } => {
                self.pitch_bend[channel as usize] = value;
                handler.pitch_bend(channel, value);
            }
        }
    }

    fn release<H: MidiHandler>(&mut self, channel: u8, note: u8, velocity: u8, handler: &mut H) {
        let slot = &mut self.notes[channel as usize][note as usize];
        if *slot != 0 {
            *slot = 0;
            self.held -= 1;
            handler.note_off(channel, note, velocity);
        }
    }

    #[inline]
    pub fn is_note_on(&self, channel: u8, note: u8) -> bool {
        self.note_velocity(channel, note).is_some()
    }

    /// Velocity the note was struck with, if it's still held
    pub fn note_velocity(&self, channel: u8, note: u8) -> Option<u8> {
        let velocity = self.notes[channel as usize & 0x0F][note as usize & 0x7F];
        (velocity != 0).then_some(velocity)
    }

    /// Number of notes currently held across all channels
    #[inline]
    pub fn held_notes(&self) -> usize {
        self.held
    }

    pub fn controller(&self, channel: u8, controller: u8) -> u8 {
        self.controllers[channel as usize & 0x0F][controller as usize & 0x7F]
    }

    pub fn program(&self, channel: u8) -> u8 {
        self.programs[channel as usize & 0x0F]
    }

    pub fn pitch_bend(&self, channel: u8) -> i16 {
        self.pitch_bend[channel as usize & 0x0F]
    }
}

impl Default for MidiDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
