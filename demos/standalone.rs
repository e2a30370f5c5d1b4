//! Standalone host: a 220Hz sine through the engine, with the gain swept from a "UI" loop
//!
//! Run with: cargo run --example standalone --features cpal_sink

use std::thread::sleep;
use std::time::{Duration, Instant};

use schall::plugin::GAIN;
use schall::{AudioCore, AudioEngine, CpalDevice, EngineConfig, ParamId, Renderer};
use tracing::info;

struct Display;

impl Renderer for Display {
    fn parameter_changed(&mut self, id: ParamId, value: f32) {
        info!(parameter = %id, value, "repaint");
    }

    fn state_changed(&mut self, key: &str, value: &str) {
        info!(key, value, "repaint");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let device = CpalDevice::default_output().ok_or("No audio device")?;
    let sample_rate = device.sample_rate();
    info!(device = device.name(), sample_rate, "using default output");

    let (mut engine, mut control) = AudioEngine::new(
        EngineConfig::new(sample_rate as f64).with_smoothing_ms(50.0),
    );
    engine.activate();

    // ~100ms of input to ride out scheduling jitter
    let (mut input, consumer) = rtrb::RingBuffer::<f32>::new(sample_rate as usize / 10);
    let _stream = device.start(engine, Some(consumer))?;

    control.set_state("file", "/tmp/standalone.wav")?;

    println!("Playing... Ctrl+C to stop");

    let start = Instant::now();
    let step = 220.0 * std::f32::consts::TAU / sample_rate as f32;
    let mut phase = 0.0f32;
    let mut display = Display;
    let mut last_edit = Instant::now();

    control.begin_edit(GAIN)?;
    loop {
        while input.slots() > 0 {
            let _ = input.push(0.25 * phase.sin());
            phase = (phase + step) % std::f32::consts::TAU;
        }

        // swing between -30dB and 0dB, ten edits a second
        if last_edit.elapsed() >= Duration::from_millis(100) {
            let t = start.elapsed().as_secs_f32();
            let db = -15.0 + 15.0 * (t * 0.5 * std::f32::consts::PI).sin();
            // a full queue just skips this step of the sweep
            let _ = control.set_parameter(GAIN, db);
            last_edit = Instant::now();
        }

        control.poll(&mut display);
        sleep(Duration::from_millis(2));
    }
}
