use gaze_events::source::{ReplaySource, Trace};
use gaze_events::{
    build_detector, record_noise, DetectionMode, DetectorConfig, Event, EventDetector, EventKind,
    GazeError, GazePos, HeuristicDetector, NativeDetector, NativeEvent, NoiseFloor, SampleSource,
    SimClock, SourceError, Thresholds,
};
use std::io::Write;

fn thresholds() -> Thresholds {
    Thresholds {
        fixation_radius_px: 30.0,
        fixation_min_duration_ms: 100.0,
        saccade_velocity_px_per_ms: 1.0,
        saccade_accel_px_per_ms2: 40.0,
        blink_duration_ms: 150.0,
        weighted_distance: 10.0,
        noise: NoiseFloor { rms_x: 1.0, rms_y: 1.0 },
    }
}

fn heuristic(trace: Trace, poll_ms: f64, t: Thresholds) -> HeuristicDetector<ReplaySource, SimClock> {
    let clock = SimClock::new(0.0);
    let mut src = ReplaySource::new(trace, clock.clone(), poll_ms);
    src.start_recording();
    HeuristicDetector::new(src, clock, t)
}

/// Rest at (100,100), 20 px/ms rightward ramp from 11 to 20 ms, then hold
/// around (300,100) with sub-pixel jitter.
fn saccade_trace() -> Trace {
    let mut trace = Trace::new();
    trace.push_sample(0.0, GazePos::new(100.0, 100.0));
    for t in 11..=20 {
        trace.push_sample(t as f64, GazePos::new(100.0 + 20.0 * (t - 10) as f64, 100.0));
    }
    for t in 21..=80 {
        let jitter = if t % 2 == 1 { 0.4 } else { 0.0 };
        trace.push_sample(t as f64, GazePos::new(300.0 + jitter, 100.0));
    }
    trace
}

#[test]
fn ramp_then_hold_reports_saccade_start() {
    let mut det = heuristic(saccade_trace(), 1.0, thresholds());
    let start = det.wait_for_saccade_start().unwrap();
    assert_eq!(start.timestamp, 11.0);
    assert_eq!(start.start, GazePos::new(100.0, 100.0));
}

#[test]
fn ramp_then_hold_reports_saccade_end() {
    let mut det = heuristic(saccade_trace(), 1.0, thresholds());
    let end = det.wait_for_saccade_end().unwrap();

    assert_eq!(end.timestamp, 21.0);
    assert_eq!(end.start, GazePos::new(100.0, 100.0));
    assert!((end.end.x - 300.0).abs() < 1.0);
    assert!(end.timestamp > 11.0, "end must come after the start at 11 ms");
}

#[test]
fn constant_samples_never_report_a_saccade() {
    for poll_ms in [0.5, 1.0, 4.0] {
        let trace = Trace::from_samples((0..=250).map(|t| (t as f64, GazePos::new(640.0, 480.0))));
        let mut det = heuristic(trace, poll_ms, thresholds());
        assert!(
            matches!(det.wait_for_saccade_start(), Err(GazeError::Source(SourceError::Exhausted))),
            "poll {poll_ms} ms"
        );
    }
}

#[test]
fn sub_noise_jitter_never_reports_a_saccade() {
    // Weighted step distance (0.5² + 0.5²) = 0.5, below the factor of 10.
    let trace = Trace::from_samples((0..100).map(|i| {
        let step = i as f64 * 0.5;
        (i as f64, GazePos::new(100.0 + step, 100.0 + step))
    }));
    let mut det = heuristic(trace, 1.0, thresholds());
    assert!(matches!(
        det.wait_for_saccade_start(),
        Err(GazeError::Source(SourceError::Exhausted))
    ));

    // Back-and-forth jitter just below the gate: (2.2² + 2.2²) = 9.68.
    let trace = Trace::from_samples((0..1000).map(|i| {
        let d = if i % 2 == 0 { 0.0 } else { 2.2 };
        (i as f64, GazePos::new(500.0 + d, 500.0 + d))
    }));
    let mut det = heuristic(trace, 1.0, thresholds());
    assert!(matches!(
        det.wait_for_saccade_start(),
        Err(GazeError::Source(SourceError::Exhausted))
    ));
}

#[test]
fn single_large_jump_reports_saccade_start() {
    let trace = Trace::from_samples([
        (0.0, GazePos::new(100.0, 100.0)),
        (3.0, GazePos::new(120.0, 120.0)),
        (20.0, GazePos::new(120.0, 120.0)),
    ]);
    let mut det = heuristic(trace, 1.0, thresholds());
    let start = det.wait_for_saccade_start().unwrap();
    assert_eq!(start.timestamp, 3.0);
    assert_eq!(start.start, GazePos::new(100.0, 100.0));
}

#[test]
fn blink_start_precedes_end_by_at_least_threshold() {
    for blink_ms in [160.0, 200.0, 400.0] {
        for poll_ms in [1.0, 2.0] {
            let trace = Trace::from_samples([
                (0.0, GazePos::new(300.0, 300.0)),
                (20.0, GazePos::INVALID),
                (20.0 + blink_ms, GazePos::new(300.0, 300.0)),
                (20.0 + blink_ms + 50.0, GazePos::new(300.0, 300.0)),
            ]);
            let mut det = heuristic(trace, poll_ms, thresholds());
            let start = det.wait_for_blink_start().unwrap();
            let end = det.wait_for_blink_end().unwrap();

            assert!(start.timestamp <= end.timestamp);
            assert!(
                end.timestamp - start.timestamp >= 150.0,
                "blink {blink_ms} ms, poll {poll_ms} ms: {start:?} -> {end:?}"
            );
            assert!(end.timestamp >= 20.0 + blink_ms);
        }
    }
}

#[test]
fn fixation_never_starts_before_min_duration() {
    for radius in [20.0, 30.0, 50.0] {
        for min_ms in [50.0, 100.0, 250.0] {
            let settle = 40.0;
            let mut trace = Trace::new();
            trace.push_sample(0.0, GazePos::new(1000.0, 50.0));
            let steps = (min_ms + 100.0) as usize;
            for i in 0..=steps {
                let j = radius / 3.0 * if i % 2 == 0 { 1.0 } else { -1.0 };
                trace.push_sample(settle + i as f64, GazePos::new(400.0 + j, 400.0));
            }

            let t = Thresholds {
                fixation_radius_px: radius,
                fixation_min_duration_ms: min_ms,
                ..thresholds()
            };
            let mut det = heuristic(trace, 1.0, t);
            let fix = det.wait_for_fixation_start().unwrap();
            assert!(
                fix.timestamp >= settle + min_ms,
                "radius {radius}, min {min_ms}: fired at {}",
                fix.timestamp
            );
            assert!(fix.start.distance(GazePos::new(400.0, 400.0)) <= radius / 3.0 + 1e-9);
        }
    }
}

#[test]
fn dwell_within_jitter_reports_fixation_at_anchor() {
    let first = GazePos::new(512.0, 384.0);
    let trace = Trace::from_samples((0..=150).map(|i| {
        let dx = ((i * 7) % 11) as f64 - 5.0;
        let dy = ((i * 3) % 11) as f64 - 5.0;
        (i as f64, GazePos::new(first.x + dx, first.y + dy))
    }));
    let mut det = heuristic(trace, 1.0, thresholds());
    let fix = det.wait_for_fixation_start().unwrap();

    // Anchor is the sample read on the first poll, at 1 ms.
    assert!(fix.start.distance(first) <= 10.0);
    assert!(fix.timestamp >= 101.0, "fired at {}", fix.timestamp);
}

#[test]
fn calibrated_noise_feeds_the_detector() {
    // One second of ±0.5 px jitter, then a 40 px jump.
    let mut trace = Trace::new();
    for i in 0..1000 {
        let d = if i % 2 == 0 { 0.0 } else { 0.5 };
        trace.push_sample(i as f64, GazePos::new(200.0 + d, 200.0 + d));
    }
    trace.push_sample(1010.0, GazePos::new(240.0, 200.0));
    trace.push_sample(1050.0, GazePos::new(240.0, 200.0));

    let clock = SimClock::new(0.0);
    let mut src = ReplaySource::new(trace, clock.clone(), 1.0);
    src.start_recording();

    let noise = record_noise(&mut src, &clock, 1000.0).unwrap();
    assert!((noise.rms_x - 0.5).abs() < 1e-9);

    let mut det = HeuristicDetector::new(src, clock, Thresholds { noise, ..thresholds() });
    let start = det.wait_for_saccade_start().unwrap();
    assert_eq!(start.timestamp, 1010.0);
}

#[test]
fn config_file_drives_both_modes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
detection = "heuristic"

[thresholds]
blink_duration_ms = 100.0

[noise]
rms_x = 1.0
rms_y = 1.0
"#
    )
    .unwrap();
    let mut config = DetectorConfig::load(file.path()).unwrap();

    let mut trace = Trace::new();
    trace
        .push_sample(0.0, GazePos::new(300.0, 300.0))
        .push_sample(30.0, GazePos::INVALID)
        .push_sample(300.0, GazePos::new(300.0, 300.0))
        .push_event(30.0, EventKind::BlinkStart, None, None)
        .push_event(300.0, EventKind::BlinkEnd, None, None);

    let mut blink_starts = Vec::new();
    for mode in [DetectionMode::Heuristic, DetectionMode::Native] {
        config.detection = mode;
        let clock = SimClock::new(0.0);
        let mut src = ReplaySource::new(trace.clone(), clock.clone(), 1.0);
        src.start_recording();
        let mut det = build_detector(&config, src, clock).unwrap();
        assert_eq!(det.mode(), mode);

        match det.wait_for_event(EventKind::BlinkStart, None).unwrap() {
            Some(Event::BlinkStart(b)) => blink_starts.push(b.timestamp),
            other => panic!("{mode:?}: expected blink start, got {other:?}"),
        }
    }
    assert_eq!(blink_starts, vec![30.0, 30.0]);
}

/// A tracker link that drops after a few good polls.
struct DroppingLink {
    polls_left: usize,
}

impl DroppingLink {
    fn poll(&mut self) -> Result<(), SourceError> {
        if self.polls_left == 0 {
            return Err(SourceError::Link("connection reset by tracker".into()));
        }
        self.polls_left -= 1;
        Ok(())
    }
}

impl SampleSource for DroppingLink {
    fn is_recording(&self) -> bool {
        true
    }

    fn sample(&mut self) -> Result<GazePos, SourceError> {
        self.poll()?;
        Ok(GazePos::new(100.0 * self.polls_left as f64, 200.0))
    }

    fn native_event(&mut self, _kind: EventKind) -> Result<Option<NativeEvent>, SourceError> {
        self.poll()?;
        Ok(None)
    }

    fn tracker_time_ms(&mut self) -> Result<f64, SourceError> {
        Ok(0.0)
    }
}

#[test]
fn link_failure_ends_blocking_waits() {
    let mut det = HeuristicDetector::new(DroppingLink { polls_left: 5 }, SimClock::new(0.0), thresholds());
    match det.wait_for_fixation_start() {
        Err(GazeError::Source(SourceError::Link(msg))) => assert!(msg.contains("reset")),
        other => panic!("expected link error, got {other:?}"),
    }

    let mut det = NativeDetector::new(DroppingLink { polls_left: 5 }, SimClock::new(0.0));
    assert!(matches!(
        det.wait_for_blink_start(),
        Err(GazeError::Source(SourceError::Link(_)))
    ));
}
