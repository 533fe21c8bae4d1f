// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::DynamicImage;
use sign_tracker::completion::{ExerciseSession, UiEvent};
use sign_tracker::config::PipelineConfig;
use sign_tracker::diagnostics::DiagnosticsRecorder;
use sign_tracker::session::{FrameSubmission, RecognitionSession};
use sign_tracker::simulation::{ScriptedClassifier, SimulatedHandSource};
use sign_tracker::stabilizer::StableRecognition;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Sign Tracker - stabilized hand-sign recognition for alphabet practice
#[derive(Parser, Debug)]
#[command(name = "sign_tracker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a practice exercise against the simulated detector and classifier
    Run {
        /// Letter the learner is asked to sign
        #[arg(short, long, default_value = "A")]
        target: String,

        /// Comma-separated labels the simulated classifier cycles through
        #[arg(short, long, default_value = "A")]
        script: String,

        /// Probability reported for each scripted label
        #[arg(long, default_value = "0.95")]
        probability: f64,

        /// Number of frames to deliver
        #[arg(short, long, default_value = "150")]
        frames: u32,

        /// Capture frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Report no hand on every Nth frame
        #[arg(long)]
        dropout: Option<u64>,

        /// Directory for diagnostics.csv and summary.json
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Print the default configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::load_default()?,
    };

    match cli.command {
        Commands::Config => {
            println!("{}", config.to_json()?);
        }
        Commands::Run {
            target,
            script,
            probability,
            frames,
            fps,
            dropout,
            export,
        } => {
            let labels: Vec<String> = script
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            run_exercise(
                &config,
                &target.to_uppercase(),
                labels,
                probability,
                frames,
                fps,
                dropout,
                export,
            )
            .await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_exercise(
    config: &PipelineConfig,
    target: &str,
    script: Vec<String>,
    probability: f64,
    frames: u32,
    fps: u32,
    dropout: Option<u64>,
    export: Option<PathBuf>,
) -> Result<()> {
    let mut source = SimulatedHandSource::new();
    if let Some(every) = dropout {
        source = source.with_dropout(every);
    }
    let classifier = ScriptedClassifier::new(script, probability);

    let mut session = RecognitionSession::new(source, classifier, config)
        .context("Failed to create recognition session")?;
    session.record_diagnostics(DiagnosticsRecorder::new(None));
    let mut exercise = ExerciseSession::new(target, config.completion.clone());

    let mut events = session
        .start()
        .context("Recognition session was already running")?;
    info!("Practising '{}' for up to {} frames at {} fps", target, frames, fps);

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps.max(1) as f64));
    let frame = DynamicImage::new_rgb8(64, 48);
    let mut dropped = 0u32;

    for _ in 0..frames {
        ticker.tick().await;
        if session.submit_frame(frame.clone()) == FrameSubmission::Dropped {
            dropped += 1;
        }
        drain_events(&mut events, &mut exercise);
        if exercise.is_completed() {
            break;
        }
    }

    session.stop();
    drain_events(&mut events, &mut exercise);

    if dropped > 0 {
        info!("{} frames dropped while a previous frame was processing", dropped);
    }
    if !exercise.is_completed() {
        warn!(
            "Exercise for '{}' not completed ({} consecutive correct)",
            target,
            exercise.consecutive_correct()
        );
    }

    if let (Some(dir), Some(recorder)) = (export, session.take_diagnostics()) {
        let csv_path = recorder.export_csv(&dir)?;
        let summary_path = recorder.export_summary(&dir)?;
        info!("Diagnostics written to {} and {}", csv_path.display(), summary_path.display());
    }

    Ok(())
}

fn drain_events(events: &mut UnboundedReceiver<StableRecognition>, exercise: &mut ExerciseSession) {
    while let Ok(event) = events.try_recv() {
        for ui_event in exercise.handle(&event) {
            match ui_event {
                UiEvent::Recognized { label, confidence } => {
                    println!("Recognized {} ({:.0}%)", label, confidence * 100.0);
                }
                UiEvent::TaskCompleted { label } => {
                    println!("Great job! You've mastered the sign for '{}'", label);
                }
            }
        }
    }
}
