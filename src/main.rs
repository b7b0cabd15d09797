//! Focus tracker: runs the tracking loop against simulated hardware and
//! prints the published attention snapshot.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use focus_tracker::{
    config::{Config, EXAMPLE_CONFIG},
    lifecycle::{ResourceProvider, StopOutcome, TrackingManager},
    simulation::{ScriptedFrame, SimulatedHardware, SubjectPose},
};
use log::{info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Simulated sensor frame period (~30 fps)
const SIM_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Behaviour of the simulated subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Subject {
    /// Looks straight at the camera
    Focused,
    /// Cycles through looking away, head down, phone and closed eyes
    Distracted,
    /// Nobody in front of the camera
    Absent,
    /// Moves around the frame and sometimes leaves
    Mixed,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// How long to run the tracking loop, in seconds
    #[arg(long, default_value = "30")]
    run_secs: u64,

    /// Snapshot print interval in milliseconds
    #[arg(long, default_value = "1000")]
    status_interval_ms: u64,

    /// Simulated subject behaviour
    #[arg(long, value_enum, default_value = "mixed")]
    subject: Subject,
}

fn subject_script(subject: Subject, width: u32, height: u32) -> Vec<ScriptedFrame> {
    let base = SubjectPose::attentive(width, height);
    let face = |pose: SubjectPose| ScriptedFrame::face(pose, width, height);

    match subject {
        Subject::Focused => vec![face(base)],
        Subject::Absent => vec![ScriptedFrame::absent()],
        Subject::Distracted => {
            let mut script = vec![face(base); 25];
            script.extend(vec![face(SubjectPose { gaze: 0.2, ..base }); 15]);
            script.extend(vec![face(SubjectPose { gaze: 0.8, ..base }); 15]);
            script.extend(vec![face(SubjectPose { nose_y: 0.7, ..base }); 15]);
            script.extend(vec![face(base).with_phone(0.8); 15]);
            script.extend(vec![face(SubjectPose { eye_open_px: 3.0, ..base }); 25]);
            script
        }
        Subject::Mixed => {
            let mut script: Vec<ScriptedFrame> = (-20..20)
                .map(|dx| {
                    face(SubjectPose {
                        center: (base.center.0 + dx * 4, base.center.1 - dx),
                        ..base
                    })
                })
                .collect();
            script.extend(vec![ScriptedFrame::absent(); 10]);
            script
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    info!("Focus tracker");

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::from_file(path).with_context(|| format!("Failed to load config file {path}"))?
        }
        None => Config::default(),
    };

    let script = subject_script(args.subject, config.camera.width, config.camera.height);
    let hardware: Arc<dyn ResourceProvider> =
        Arc::new(SimulatedHardware::new(script).with_frame_interval(SIM_FRAME_INTERVAL));
    let manager = TrackingManager::new(config, hardware)?;

    manager.start().context("Failed to start tracking")?;

    let run_for = Duration::from_secs(args.run_secs);
    let interval = Duration::from_millis(args.status_interval_ms.max(1));
    let started = Instant::now();
    while started.elapsed() < run_for {
        thread::sleep(interval.min(run_for.saturating_sub(started.elapsed())));
        let snapshot = manager.snapshot();
        println!("{:>6.1}s  {:<16} score {:>3}", started.elapsed().as_secs_f64(), snapshot.status, snapshot.score);
    }

    match manager.stop() {
        StopOutcome::Stopped(report) => {
            if let Some(run) = report.run {
                info!(
                    "Captured {} frames, processed {}, failed {}",
                    run.frames_captured, run.frames_processed, run.frames_failed
                );
            }
            for e in &report.release_errors {
                warn!("{e}");
            }
            if let Some(e) = report.worker_error {
                return Err(e.into());
            }
        }
        StopOutcome::NotRunning => warn!("Tracking was not running at shutdown"),
    }

    let snapshot = manager.snapshot();
    info!("Final status: {} ({})", snapshot.status, snapshot.score);
    Ok(())
}
