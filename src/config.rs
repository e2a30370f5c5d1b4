//! Engine construction settings

/// Settings fixed when an [`AudioEngine`](crate::AudioEngine) is built.
///
/// Everything that needs memory on the audio thread is sized from here, up front.
///
/// ```
/// use schall::EngineConfig;
///
/// let config = EngineConfig::new(44_100.0)
///     .with_smoothing_ms(5.0)
///     .with_polyphony(32);
/// assert_eq!(config.polyphony, 32);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Sample rate in Hz until the host says otherwise
    pub sample_rate: f64,
    /// Parameter smoothing time constant in seconds
    pub smoothing_time: f32,
    /// Number of voices tracked at once
    pub polyphony: usize,
    /// Capacity of the UI -> audio edit queue, also caps gestures reported per block
    pub queue_size: usize,
    /// Capacity of the state-load queue
    pub state_queue_size: usize,
}

impl EngineConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Set the smoothing time in milliseconds
    pub fn with_smoothing_ms(mut self, ms: f32) -> Self {
        self.smoothing_time = ms.max(0.0) / 1000.0;
        self
    }

    pub fn with_polyphony(mut self, voices: usize) -> Self {
        self.polyphony = voices.max(1);
        self
    }

    /// Set the edit queue capacity
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size.max(1);
        self
    }

    pub fn with_state_queue_size(mut self, size: usize) -> Self {
        self.state_queue_size = size.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            smoothing_time: 0.020,
            polyphony: 16,
            queue_size: 64,
            state_queue_size: 4,
        }
    }
}
