use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use gaze_events::source::{ReplaySource, Trace};
use gaze_events::{EventDetector, GazePos, HeuristicDetector, NoiseFloor, SimClock, Thresholds};

fn thresholds() -> Thresholds {
    Thresholds {
        fixation_radius_px: 40.0,
        fixation_min_duration_ms: 100.0,
        saccade_velocity_px_per_ms: 1.0,
        saccade_accel_px_per_ms2: 0.01,
        blink_duration_ms: 150.0,
        weighted_distance: 10.0,
        noise: NoiseFloor { rms_x: 0.5, rms_y: 0.5 },
    }
}

/// Ten seconds at 1 kHz: jittery fixations joined by 300 px saccades.
fn synthetic_trace() -> Trace {
    let mut trace = Trace::new();
    let mut x = 200.0;
    for t in 0..10_000u32 {
        let phase = t % 500;
        if (450..480).contains(&phase) {
            x += 10.0;
        } else if phase == 480 && x > 900.0 {
            x = 200.0;
        }
        let jitter = ((t * 7919) % 13) as f64 * 0.1 - 0.6;
        trace.push_sample(t as f64, GazePos::new(x + jitter, 384.0 - jitter));
    }
    trace
}

fn detector(trace: &Trace) -> HeuristicDetector<ReplaySource, SimClock> {
    let clock = SimClock::new(0.0);
    let mut src = ReplaySource::new(trace.clone(), clock.clone(), 1.0);
    src.start_recording();
    HeuristicDetector::new(src, clock, thresholds())
}

fn bench_detection(c: &mut Criterion) {
    let trace = synthetic_trace();

    c.bench_function("saccade_end", |b| {
        b.iter_batched(
            || detector(&trace),
            |mut det| black_box(det.wait_for_saccade_end()),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("fixation_end", |b| {
        b.iter_batched(
            || detector(&trace),
            |mut det| black_box(det.wait_for_fixation_end(None)),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("noise_floor_10k", |b| {
        let samples: Vec<GazePos> = (0..10_000)
            .map(|i| GazePos::new(500.0 + (i % 3) as f64 * 0.3, 400.0 - (i % 5) as f64 * 0.2))
            .collect();
        b.iter(|| NoiseFloor::from_samples(black_box(&samples)))
    });
}

criterion_group!(benches, bench_detection);
criterion_main!(benches);
