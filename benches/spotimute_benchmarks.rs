//! # Spotimute Performance Benchmarks
//!
//! Benchmarks for the work done on every poll tick. The agent polls every
//! 300 ms by default, so the in-process part of a check should stay
//! negligible next to the automation round trip.
//!
//! ## Benchmark Categories
//!
//! - **Parsing**: Classifying identifiers and parsing player answers
//! - **Detector**: A full check cycle against an in-memory player
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench parsing
//! cargo bench detector
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spotimute::config::Settings;
use spotimute::detector::{AdDetector, PlaybackState, StateObserver};
use spotimute::gateway::{GatewayError, ScriptGateway};
use spotimute::notifier::Notifier;
use spotimute::probe::{PlayerCommand, PlayerProbe, ProcessLookup};
use spotimute::track::{self, TrackReference};
use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;
use std::time::Instant;

/// Player that answers instantly from memory
#[derive(Clone)]
struct InstantPlayer {
    url: Rc<RefCell<String>>,
}

impl ScriptGateway for InstantPlayer {
    fn execute(&self, script: &str) -> Result<String, GatewayError> {
        if script.ends_with("(get spotify url of current track)") {
            Ok(format!("{}\n", self.url.borrow()))
        } else if script.ends_with("(get duration of current track)") {
            Ok("215000\n".to_string())
        } else if script.ends_with("(get sound volume)") {
            Ok("70\n".to_string())
        } else {
            Ok("\n".to_string())
        }
    }
}

impl ProcessLookup for InstantPlayer {
    fn is_running(&self, _name: &str) -> bool {
        true
    }
}

struct Quiet;

impl StateObserver for Quiet {
    fn state_changed(&mut self, _state: PlaybackState) {}
}

impl Notifier for Quiet {
    fn request_notification(&self, _title: &str, _body: &str) {}
}

/// Benchmark identifier classification and answer parsing
fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    for id in [
        "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
        "spotify:ad:000000012c5a2a3b00000020a8e6b0c2",
        "spotify:adventure:1",
        "",
    ] {
        group.bench_with_input(BenchmarkId::new("classify", id), id, |b, id| {
            b.iter(|| TrackReference::classify(black_box(id)))
        });
    }

    group.bench_function("duration", |b| {
        b.iter(|| track::parse_duration_seconds(black_box("215373\n")))
    });

    group.bench_function("volume", |b| {
        b.iter(|| track::parse_volume(black_box("69.6\n")))
    });

    group.bench_function("script", |b| {
        b.iter(|| PlayerCommand::SetSoundVolume(black_box(70)).script(black_box("Spotify")))
    });

    group.finish();
}

/// Benchmark full check cycles through the detector
fn benchmark_detector(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector");

    let player = InstantPlayer {
        url: Rc::new(RefCell::new("spotify:track:steady".to_string())),
    };
    let settings = Settings {
        pause_bounce_on_mute: false,
        ..Settings::default()
    };
    let probe = PlayerProbe::new(Box::new(player.clone()), Box::new(player.clone()), "Spotify");
    let mut detector = AdDetector::new(probe, Box::new(settings), Box::new(Quiet), Box::new(Quiet));

    group.bench_function("steady_track_check", |b| {
        b.iter(|| detector.check(black_box(Instant::now())))
    });

    group.bench_function("ad_track_alternation", |b| {
        let mut ad = false;
        b.iter(|| {
            ad = !ad;
            *player.url.borrow_mut() = if ad { "spotify:ad:x" } else { "spotify:track:y" }.to_string();
            detector.check(black_box(Instant::now()));
        })
    });

    group.finish();
}

// Group all benchmarks
criterion_group!(benches, benchmark_parsing, benchmark_detector);

criterion_main!(benches);
