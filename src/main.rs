//! multipad CLI: plays a demo pattern live or renders it to a WAV file.
//!
//! Usage:
//!   multipad [--wav output.wav] [--bpm 120] [--seconds 8] [--rate 44100]
//!            [--sample TRACK=path.wav]... [--metronome]

use mp_master::{Controller, EngineConfig, InstrumentKind, Resolution};
use std::io::Write;
use std::time::{Duration, Instant};
use std::{env, fs};

struct Options {
    wav: Option<String>,
    bpm: f64,
    seconds: f64,
    rate: u32,
    samples: Vec<(usize, String)>,
    metronome: bool,
}

fn usage() -> ! {
    eprintln!(
        "Usage: multipad [--wav output.wav] [--bpm N] [--seconds S] [--rate HZ] \
         [--sample TRACK=path.wav]... [--metronome]"
    );
    std::process::exit(1);
}

fn parse_args() -> Options {
    let mut opts = Options {
        wav: None,
        bpm: 120.0,
        seconds: 8.0,
        rate: 44_100,
        samples: Vec::new(),
        metronome: false,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = || args.next().unwrap_or_else(|| usage());
        match arg.as_str() {
            "--wav" => opts.wav = Some(value()),
            "--bpm" => opts.bpm = value().parse().unwrap_or_else(|_| usage()),
            "--seconds" => opts.seconds = value().parse().unwrap_or_else(|_| usage()),
            "--rate" => opts.rate = value().parse().unwrap_or_else(|_| usage()),
            "--sample" => {
                let arg = value();
                let (track, path) = arg.split_once('=').unwrap_or_else(|| usage());
                let track = track.parse().unwrap_or_else(|_| usage());
                opts.samples.push((track, path.to_string()));
            }
            "--metronome" => opts.metronome = true,
            "-h" | "--help" => usage(),
            other => {
                eprintln!("Unknown argument: {}", other);
                usage();
            }
        }
    }
    opts
}

/// Bass on the downbeats, a plucked eighth-note line and a few bells.
fn program_demo(ctrl: &Controller, opts: &Options) {
    let mut engine = ctrl.engine();
    let bpm = engine.set_bpm(opts.bpm);
    println!("Tempo:    {} BPM", bpm);
    engine.set_metronome_enabled(opts.metronome);

    let _ = engine.set_track_instrument(0, InstrumentKind::Bass);
    for step in [0, 4, 8, 12] {
        let _ = engine.set_sequencer_beat(0, step, true, Resolution::Quarter);
    }

    let _ = engine.set_track_instrument(1, InstrumentKind::Pluck);
    let _ = engine.set_track_delay(1, 35.0);
    let line: [(usize, i8); 8] = [
        (0, 12),
        (3, 15),
        (6, 19),
        (10, 17),
        (16, 12),
        (19, 15),
        (22, 22),
        (28, 19),
    ];
    for (step, pitch) in line {
        let _ = engine.set_sequencer_beat(1, step, true, Resolution::Eighth);
        let _ = engine.set_step_pitch(1, step, pitch);
    }

    let _ = engine.set_track_instrument(2, InstrumentKind::Bells);
    let _ = engine.set_track_reverb(2, 60.0);
    for (step, pitch) in [(14, 24), (46, 26)] {
        let _ = engine.set_sequencer_beat(2, step, true, Resolution::Sixteenth);
        let _ = engine.set_step_pitch(2, step, pitch);
    }
}

fn main() {
    env_logger::init();
    let opts = parse_args();

    let mut ctrl = Controller::new(EngineConfig {
        sample_rate: opts.rate,
        ..EngineConfig::default()
    })
    .unwrap_or_else(|e| {
        eprintln!("Failed to create engine: {}", e);
        std::process::exit(1);
    });

    for (track, path) in &opts.samples {
        match ctrl.load_sample_file(*track, path) {
            Ok(()) => {
                let _ = ctrl.engine().set_sample_mode(*track, true);
                println!("Sample:   {} on track {}", path, track);
            }
            Err(e) => eprintln!("Failed to load {}: {}", path, e),
        }
    }

    program_demo(&ctrl, &opts);
    {
        let mut engine = ctrl.engine();
        engine.resume();
        engine.start_sequencer();
    }

    match &opts.wav {
        Some(path) => render_to_wav(&ctrl, path, opts.seconds),
        None => play_audio(&mut ctrl, opts.seconds),
    }
}

fn play_audio(ctrl: &mut Controller, seconds: f64) {
    ctrl.start_live().unwrap_or_else(|e| {
        eprintln!("Failed to open audio output: {}", e);
        std::process::exit(1);
    });
    println!("Playing...");
    println!();

    let started = Instant::now();
    let length = Duration::from_secs_f64(seconds.max(0.0));
    while ctrl.is_live() && started.elapsed() < length {
        let (beat, voices) = {
            let engine = ctrl.engine();
            (engine.current_beat(), engine.active_voice_count())
        };
        print!("\rBeat: {:02} | Voices: {:02}", beat, voices);
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(20));
    }

    ctrl.engine().stop_sequencer();
    ctrl.stop_live();
    println!("\rDone.                    ");
}

fn render_to_wav(ctrl: &Controller, path: &str, seconds: f64) {
    println!("Rendering {:.1}s to {} at {} Hz...", seconds, path, ctrl.sample_rate());

    let wav = ctrl.render_to_wav(seconds).unwrap_or_else(|e| {
        eprintln!("Failed to render: {}", e);
        std::process::exit(1);
    });
    println!("Rendered {} bytes", wav.len());

    fs::write(path, &wav).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {}", path, e);
        std::process::exit(1);
    });

    println!("Done.");
}
