//! Fixed-capacity voice tracking

use crate::midi::MidiHandler;

/// One playing (or recently released) note
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoiceState {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub active: bool,
    /// Allocation order, used to pick the oldest voice when stealing
    pub age: u64,
    /// Frame within the block the note started on
    pub onset: u32,
}

/// A pool of voices allocated once at construction.
///
/// Note-on takes a free voice or steals the oldest one; note-off deactivates the
/// voice playing that channel/note pair.
pub struct VoicePool {
    voices: Box<[VoiceState]>,
    clock: u64,
    stolen: u64,
    position: u32,
}

impl VoicePool {
    pub fn new(polyphony: usize) -> Self {
        Self {
            voices: vec![VoiceState::default(); polyphony.max(1)].into_boxed_slice(),
            clock: 0,
            stolen: 0,
            position: 0,
        }
    }

    #[inline]
    pub fn polyphony(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> &[VoiceState] {
        &self.voices
    }

    pub fn active(&self) -> impl Iterator<Item = &VoiceState> {
        self.voices.iter().filter(|v| v.active)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Number of voices stolen since construction or the last reset
    pub fn stolen(&self) -> u64 {
        self.stolen
    }

    pub fn reset(&mut self) {
        self.voices.iter_mut().for_each(|v| *v = VoiceState::default());
        self.clock = 0;
        self.stolen = 0;
        self.position = 0;
    }

    /// Frame offset stamped onto voices started from here on
    #[inline]
    pub fn set_position(&mut self, frame: u32) {
        self.position = frame;
    }

    fn start(&mut self, channel: u8, note: u8, velocity: u8) {
        self.clock += 1;

        let existing = self
            .voices
            .iter()
            .position(|v| v.active && v.channel == channel && v.note == note);
        let free = || self.voices.iter().position(|v| !v.active);

        let index = match existing.or_else(free) {
            Some(index) => index,
            None => {
                self.stolen += 1;
                self.voices
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, v)| v.age)
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            }
        };

        self.voices[index] = VoiceState {
            channel,
            note,
            velocity,
            active: true,
            age: self.clock,
            onset: self.position,
        };
    }

    fn stop(&mut self, channel: u8, note: u8) {
        for voice in self.voices.iter_mut() {
            if voice.active && voice.channel == channel && voice.note == note {
                voice.active = false;
            }
        }
    }
}

impl MidiHandler for VoicePool {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.start(channel, note, velocity);
    }

    fn note_off(&mut self, channel: u8, note: u8, _velocity: u8) {
        self.stop(channel, note);
    }
}
