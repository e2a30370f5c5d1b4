use schall::plugin::{FILE, GAIN, VOICE};
use schall::{
    db_to_gain, AudioCore, AudioEngine, ControlSide, EngineConfig, EngineStatus, Error,
    Gesture, MidiEvent, ParamId, Renderer, ValueSmoother,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Default)]
struct Recorder {
    params: Vec<(ParamId, f32)>,
    states: Vec<(String, String)>,
}

impl Renderer for Recorder {
    fn parameter_changed(&mut self, id: ParamId, value: f32) {
        self.params.push((id, value));
    }

    fn state_changed(&mut self, key: &str, value: &str) {
        self.states.push((key.to_owned(), value.to_owned()));
    }
}

fn activated() -> (AudioEngine, ControlSide) {
    init_logging();
    let (mut engine, control) = AudioEngine::new(EngineConfig::new(48_000.0));
    engine.activate();
    (engine, control)
}

fn process(engine: &mut AudioEngine, frames: usize, midi: &[MidiEvent]) -> Vec<f32> {
    let input = vec![1.0f32; frames];
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];
    engine.run(&[&input, &input], &mut [&mut left, &mut right], frames, midi);
    left
}

#[test]
fn silence_to_unity_reaches_one_time_constant() {
    let mut smoother = ValueSmoother::new(48_000.0, 0.020);
    smoother.set_target_value(db_to_gain(-90.0));
    smoother.clear_to_target_value();
    smoother.set_target_value(db_to_gain(0.0));

    let mut value = 0.0;
    for _ in 0..960 {
        value = smoother.next();
    }
    // one time constant leaves e^-1 of the step
    let remaining = 1.0 - value;
    assert!((remaining - (-1.0f32).exp()).abs() < 1e-3, "remaining {remaining}");

    let settle = (960.0f32 * 100.0f32.ln()).ceil() as usize;
    for _ in 960..settle {
        value = smoother.next();
    }
    assert!((1.0 - value) <= 0.01 + 1e-5, "value {value}");
}

#[test]
fn smoother_settles_exactly() {
    let mut smoother = ValueSmoother::new(48_000.0, 0.020);
    smoother.set_target_value(1.0);
    for _ in 0..48_000 {
        smoother.next();
    }
    assert!(smoother.is_settled());
    assert_eq!(smoother.current_value(), 1.0);
}

#[test]
fn sample_rate_change_keeps_current_value() {
    let mut smoother = ValueSmoother::new(48_000.0, 0.020);
    smoother.set_target_value(1.0);
    for _ in 0..100 {
        smoother.next();
    }
    let before = smoother.current_value();
    smoother.set_sample_rate(96_000.0);
    assert_eq!(smoother.current_value(), before);

    // twice the rate, half the progress per sample
    let mut fast = ValueSmoother::new(48_000.0, 0.020);
    let mut slow = ValueSmoother::new(96_000.0, 0.020);
    fast.set_target_value(1.0);
    slow.set_target_value(1.0);
    assert!(slow.next() < fast.next());
}

#[test]
fn engine_sample_rate_change_keeps_smoother_position() {
    let (mut engine, _control) = activated();
    engine.set_parameter_value(GAIN, -90.0);
    process(&mut engine, 100, &[]);

    engine.deactivate();
    let before = engine.params().smoother(GAIN).current_value();
    engine.sample_rate_changed(44_100.0).unwrap();
    assert_eq!(engine.params().smoother(GAIN).current_value(), before);
    assert_eq!(engine.params().smoother(GAIN).sample_rate(), 44_100.0);
}

#[test]
fn note_on_then_off_in_same_block() {
    let (mut engine, _control) = activated();
    let midi = [
        MidiEvent::new(0, [0x90, 60, 100]),
        MidiEvent::new(0, [0x80, 60, 0]),
    ];
    process(&mut engine, 128, &midi);

    assert_eq!(engine.voices().active_count(), 0);
    assert!(!engine.midi().is_note_on(0, 60));
}

#[test]
fn velocity_zero_note_on_releases() {
    let (mut engine, _control) = activated();
    process(&mut engine, 32, &[MidiEvent::new(4, [0x93, 64, 90])]);
    assert!(engine.midi().is_note_on(3, 64));

    process(&mut engine, 32, &[MidiEvent::new(8, [0x93, 64, 0])]);
    assert!(!engine.midi().is_note_on(3, 64));
    assert_eq!(engine.voices().active_count(), 0);
}

#[test]
fn unknown_midi_is_ignored() {
    let (mut engine, _control) = activated();
    let midi = [
        MidiEvent::new(0, [0xA0, 60, 10]),
        MidiEvent::new(1, [0xF8, 0, 0]),
        MidiEvent::new(2, [0x91, 67, 80]),
    ];
    let out = process(&mut engine, 16, &midi);

    assert!(out.iter().all(|&s| s == 1.0));
    assert_eq!(engine.voices().active_count(), 1);
    assert!(engine.midi().is_note_on(1, 67));
}

#[test]
fn all_notes_off_clears_channel() {
    let (mut engine, _control) = activated();
    let midi = [
        MidiEvent::new(0, [0x90, 60, 100]),
        MidiEvent::new(0, [0x90, 64, 100]),
        MidiEvent::new(0, [0x91, 67, 100]),
        MidiEvent::new(10, [0xB0, 123, 0]),
    ];
    process(&mut engine, 32, &midi);

    assert!(!engine.midi().is_note_on(0, 60));
    assert!(!engine.midi().is_note_on(0, 64));
    assert!(engine.midi().is_note_on(1, 67));
    assert_eq!(engine.voices().active_count(), 1);
}

#[test]
fn empty_state_is_rejected() {
    let (mut engine, mut control) = activated();
    let mut ui = Recorder::default();

    control.set_state("file", "/samples/kick.wav").unwrap();
    control.poll(&mut ui);
    assert_eq!(
        ui.states,
        vec![("file".to_owned(), "/samples/kick.wav".to_owned())]
    );

    ui.states.clear();
    assert!(matches!(
        control.set_state("file", ""),
        Err(Error::EmptyState("file"))
    ));
    control.poll(&mut ui);
    assert!(ui.states.is_empty());
    assert_eq!(control.state("file"), Some("/samples/kick.wav"));

    process(&mut engine, 8, &[]);
    assert_eq!(engine.state(FILE), "/samples/kick.wav");
}

#[test]
fn unknown_state_key_is_rejected() {
    let (_engine, mut control) = activated();
    assert!(matches!(
        control.set_state("preset", "x"),
        Err(Error::UnknownState(_))
    ));
}

#[test]
fn activation_snaps_without_ramp() {
    init_logging();
    let (mut engine, _control) = AudioEngine::new(EngineConfig::new(48_000.0));
    engine.set_parameter_value(GAIN, -6.0);
    engine.activate();

    let out = process(&mut engine, 64, &[]);
    let expected = db_to_gain(-6.0);
    assert!(out.iter().all(|&s| (s - expected).abs() < 1e-6));
}

#[test]
fn gain_change_is_click_free() {
    let (mut engine, _control) = activated();
    engine.set_parameter_value(GAIN, -90.0);

    let out = process(&mut engine, 4800, &[]);
    let largest_step = out
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(0.0f32, f32::max);
    assert!(largest_step < 0.002, "step {largest_step}");
    assert!(out[4799] < 0.01);
}

#[test]
fn lifecycle() {
    init_logging();
    let (mut engine, _control) = AudioEngine::new(EngineConfig::new(48_000.0));
    assert_eq!(engine.status(), EngineStatus::Constructed);
    assert_eq!(process(&mut engine, 8, &[]), vec![0.0; 8]);

    engine.activate();
    assert_eq!(engine.status(), EngineStatus::Activated);
    assert!(matches!(
        engine.sample_rate_changed(44_100.0),
        Err(Error::InvalidTransition { .. })
    ));
    assert_eq!(process(&mut engine, 8, &[]), vec![1.0; 8]);

    engine.deactivate();
    assert_eq!(engine.status(), EngineStatus::Deactivated);
    assert_eq!(process(&mut engine, 8, &[]), vec![0.0; 8]);
    engine.sample_rate_changed(44_100.0).unwrap();

    engine.activate();
    assert_eq!(engine.sample_rate(), 44_100.0);
}

#[test]
fn ui_edit_round_trip() {
    let (mut engine, mut control) = activated();
    let mut ui = Recorder::default();

    // defaults first
    control.poll(&mut ui);
    assert_eq!(ui.params, vec![(GAIN, 0.0), (VOICE, 0.0)]);
    ui.params.clear();

    control.begin_edit(GAIN).unwrap();
    control.set_parameter(GAIN, 50.0).unwrap();
    control.set_parameter(GAIN, -3.0).unwrap();
    control.end_edit(GAIN).unwrap();

    // nothing until the engine has run
    assert_eq!(control.poll(&mut ui), 0);

    process(&mut engine, 16, &[]);
    assert_eq!(engine.parameter_value(GAIN), -3.0);
    // values stay inside their bracket, clamped as stored
    assert_eq!(
        engine.gestures(),
        &[
            Gesture::Begin(GAIN),
            Gesture::Set(GAIN, 30.0),
            Gesture::Set(GAIN, -3.0),
            Gesture::End(GAIN),
        ]
    );

    // only the latest value is delivered
    control.poll(&mut ui);
    assert_eq!(ui.params, vec![(GAIN, -3.0)]);
}

#[test]
fn automation_reaches_ui() {
    let (mut engine, mut control) = activated();
    let mut ui = Recorder::default();
    control.poll(&mut ui);
    ui.params.clear();

    engine.set_parameter_value(VOICE, 7.4);
    engine.set_parameter_value(VOICE, 200.0);
    control.poll(&mut ui);
    assert_eq!(ui.params, vec![(VOICE, 128.0)]);
    assert_eq!(control.parameter_value(VOICE), Some(128.0));
}

#[test]
fn end_without_begin_is_an_error() {
    let (_engine, mut control) = activated();
    assert!(matches!(control.end_edit(VOICE), Err(Error::NotEditing(_))));
    assert!(matches!(
        control.begin_edit(ParamId(9)),
        Err(Error::UnknownParameter(ParamId(9)))
    ));
}

#[test]
fn edits_while_deactivated_apply_without_ramp() {
    let (mut engine, mut control) = activated();
    engine.deactivate();

    // more edits than the queue holds, with the host still calling run
    for i in 0..200 {
        control.begin_edit(GAIN).unwrap();
        control.set_parameter(GAIN, -(i % 24) as f32).unwrap();
        control.end_edit(GAIN).unwrap();
        assert_eq!(process(&mut engine, 16, &[]), vec![0.0; 16]);
    }
    assert_eq!(engine.parameter_value(GAIN), -7.0);

    // and a last one the engine only sees on activation
    control.set_parameter(GAIN, -12.0).unwrap();
    engine.activate();

    let out = process(&mut engine, 64, &[]);
    let expected = db_to_gain(-12.0);
    assert!(out.iter().all(|&s| s == expected), "ramped: {:?}", &out[..4]);
}

#[test]
fn notes_start_at_their_frame_offset() {
    let (mut engine, _control) = activated();
    let midi = [
        MidiEvent::new(0, [0x90, 48, 100]),
        MidiEvent::new(100, [0x90, 52, 100]),
        MidiEvent::new(100, [0x80, 52, 0]),
        MidiEvent::new(100, [0x90, 55, 100]),
        MidiEvent::new(9_000, [0x90, 59, 100]),
    ];
    process(&mut engine, 256, &midi);

    let mut onsets: Vec<(u8, u32)> = engine.active_voices().map(|v| (v.note, v.onset)).collect();
    onsets.sort();
    assert_eq!(onsets, vec![(48, 0), (55, 100), (59, 256)]);
}
