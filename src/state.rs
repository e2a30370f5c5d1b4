//! Persisted key/value state
//!
//! The host owns persistence; the core only declares the keys, validates incoming values
//! and carries them to the audio thread in a fixed-size buffer.

use core::fmt;

/// Longest state value (in bytes) that can cross into the audio thread
pub const MAX_STATE_LEN: usize = 1024;

/// Index of a declared state key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StateId(pub u32);

impl StateId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of value a state key holds, for the host's benefit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateHint {
    Text,
    /// A filesystem path the host may offer a file dialog for
    FilePath,
}

/// Host-facing description of a state key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateInfo {
    pub key: &'static str,
    pub default: &'static str,
    pub hint: StateHint,
}

/// A state value stored inline so it can be moved through a ring buffer and kept by the
/// audio thread without touching the allocator
#[derive(Clone, Copy)]
pub struct StateValue {
    data: [u8; MAX_STATE_LEN],
    len: u16,
}

impl StateValue {
    pub const fn new() -> Self {
        Self {
            data: [0; MAX_STATE_LEN],
            len: 0,
        }
    }

    /// Copy `value` into a new buffer, or `None` if it doesn't fit
    pub fn copy_from(value: &str) -> Option<Self> {
        let bytes = value.as_bytes();
        if bytes.len() > MAX_STATE_LEN {
            return None;
        }
        let mut state = Self::new();
        state.data[..bytes.len()].copy_from_slice(bytes);
        state.len = bytes.len() as u16;
        Some(state)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // only ever filled from a &str in copy_from
        core::str::from_utf8(&self.data[..self.len as usize]).unwrap_or_default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for StateValue {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateValue").field(&self.as_str()).finish()
    }
}

/// A validated state value on its way to the audio thread
#[derive(Clone, Copy, Debug)]
pub struct StateUpdate {
    pub id: StateId,
    pub value: StateValue,
}
