//! CPAL device discovery and a standalone output stream driving an [`AudioEngine`]
//!
//! ```no_run
//! use schall::{AudioCore, AudioEngine, CpalDevice, EngineConfig};
//!
//! let device = CpalDevice::default_output().expect("no output device");
//! let (mut engine, _control) =
//!     AudioEngine::new(EngineConfig::new(device.sample_rate() as f64));
//! engine.activate();
//!
//! let stream = device.start(engine, None).unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! drop(stream);
//! ```

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use rtrb::Consumer;
use tracing::{error, info};

use crate::engine::{AudioCore, AudioEngine};
use crate::error::{Error, Result};

/// Frames rendered per engine call; device buffers are split into chunks of this size
const MAX_BLOCK: usize = 512;

/// A discovered audio output device
pub struct CpalDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,

    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalDevice {
    /// Get the system's default output device, or `None` if there is none
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        Self::from_device(device)
    }

    /// List all available output devices
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::from_device).collect())
            .unwrap_or_default()
    }

    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());

        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Start playing `engine` on this device.
    ///
    /// `input` feeds mono samples to the engine's input; without it (or when it runs dry)
    /// the engine processes silence. The engine should already be activated at the
    /// device's sample rate. Audio stops when the returned stream is dropped.
    pub fn start(self, engine: AudioEngine, input: Option<Consumer<f32>>) -> Result<CpalStream> {
        let stream_config = self.config.config();
        info!(
            device = %self.name,
            sample_rate = self.sample_rate,
            channels = self.channels,
            "starting output stream"
        );

        let stream = match self.config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&self.device, &stream_config, engine, input)?,
            SampleFormat::I16 => build_stream::<i16>(&self.device, &stream_config, engine, input)?,
            SampleFormat::U16 => build_stream::<u16>(&self.device, &stream_config, engine, input)?,
            format => return Err(Error::UnsupportedFormat(format)),
        };
        stream.play()?;

        Ok(CpalStream { _stream: stream })
    }
}

/// A running output stream. Playback stops on drop.
pub struct CpalStream {
    _stream: cpal::Stream,
}

/// Planar scratch space, allocated before the stream starts
struct Scratch {
    input: Vec<f32>,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Scratch {
    fn new() -> Self {
        Self {
            input: vec![0.0; MAX_BLOCK],
            left: vec![0.0; MAX_BLOCK],
            right: vec![0.0; MAX_BLOCK],
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: AudioEngine,
    mut input: Option<Consumer<f32>>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch = Scratch::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            for chunk in data.chunks_mut(MAX_BLOCK * channels) {
                let frames = chunk.len() / channels;
                let Scratch { input: mono, left, right } = &mut scratch;

                for sample in mono[..frames].iter_mut() {
                    *sample = input
                        .as_mut()
                        .and_then(|consumer| consumer.pop().ok())
                        .unwrap_or(0.0);
                }

                engine.run(
                    &[&mono[..frames]],
                    &mut [&mut left[..frames], &mut right[..frames]],
                    frames,
                    &[],
                );

                for (i, frame) in chunk.chunks_mut(channels).enumerate() {
                    for (ch, out) in frame.iter_mut().enumerate() {
                        let sample = match ch {
                            0 => left[i],
                            1 => right[i],
                            _ => 0.0,
                        };
                        *out = T::from_sample(sample);
                    }
                }
            }
        },
        |err| error!(%err, "output stream error"),
        None,
    )?;

    Ok(stream)
}
