use facegate::{
    core::session::{default_registration_steps, CaptureSession},
    core::similarity,
    replay,
    storage::{SessionRecord, SessionStore},
    Config, SessionState, StepEvent,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facegate")]
#[command(about = "Pose-gated face capture state machine")]
struct Cli {
    /// Verbose logging (debug level, with file/line info)
    #[arg(long, global = true)]
    verbose: bool,

    /// Path to a facegate.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a registration session over a recorded frame stream
    Simulate {
        /// JSON-lines file of recorded frames
        #[arg(short, long)]
        frames: PathBuf,
        /// Subject name used when saving the session record
        #[arg(short, long, default_value = "subject")]
        subject: String,
        /// Persist the completed session record
        #[arg(long)]
        save: bool,
    },
    /// Score similarity between two embedding files (JSON float arrays)
    Verify {
        first: PathBuf,
        second: PathBuf,
        /// Override the configured match threshold
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Check a config file and report problems
    ValidateConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Simulate { frames, subject, save } => {
            simulate(&config, &frames, &subject, save)?;
        }
        Commands::Verify { first, second, threshold } => {
            let a = read_embedding(&first)?;
            let b = read_embedding(&second)?;
            let score = similarity::score_similarity(&a, &b)?;
            let threshold = threshold.unwrap_or(config.verify.similarity_threshold);
            let matched = similarity::verify_match(score, threshold);
            println!(
                "Similarity: {:.3} (threshold {:.2}) -> {}",
                score,
                threshold,
                if matched { "MATCH" } else { "NO MATCH" }
            );
        }
        Commands::ValidateConfig => {
            // Loading already validates; reaching here means it passed.
            match &cli.config {
                Some(path) => println!("Config OK: {}", path.display()),
                None => println!("No --config given; built-in defaults are valid"),
            }
        }
    }

    Ok(())
}

fn simulate(config: &Config, frames_path: &PathBuf, subject: &str, save: bool) -> Result<()> {
    let steps = default_registration_steps(config);
    let mut session = CaptureSession::new(steps, config.clone())?;
    session.start()?;

    println!("Registration sequence:");
    for step in session.steps() {
        println!("  {}. {} ({})", step.ordinal + 1, step.title, step.id);
    }

    let frames = replay::read_frames_from_path(frames_path)?;
    println!("\nReplaying {} frames from {}\n", frames.len(), frames_path.display());

    for record in &frames {
        let verdict = session.submit_frame(&record.observation, &record.context())?;

        match verdict.event {
            Some(StepEvent::StepComplete { ordinal }) => {
                let step = &session.steps()[ordinal];
                println!("✓ Captured '{}' - {}", step.id, verdict.quality.assessment());
            }
            Some(StepEvent::AllStepsComplete) => {
                println!("✓ Captured final step - {}", verdict.quality.assessment());
                break;
            }
            None => {}
        }
    }

    if *session.state() != SessionState::AllStepsComplete {
        session.stream_lost("recording ended before all steps completed");
        let progress = session.progress();
        println!(
            "\n✗ Incomplete: {}/{} steps captured",
            progress.completed_steps, progress.total_steps
        );
        return Ok(());
    }

    let capture_count = session.finalize()?.len();
    let progress = session.progress();
    println!(
        "\n✓ Session complete: {} captures, average quality {:.2}",
        capture_count,
        progress.average_quality.unwrap_or(0.0)
    );
    for id in &progress.below_threshold {
        println!("  ⚠ step '{}' fell below its quality threshold - consider redoing it", id);
    }

    if save {
        let store = SessionStore::new(&config.storage)?;
        let record = SessionRecord::from_artifacts(subject, session.artifacts());
        store.save(&record)?;
        println!("Saved session record for '{}'", subject);
    }

    Ok(())
}

fn read_embedding(path: &PathBuf) -> Result<Vec<f32>> {
    let contents = std::fs::read_to_string(path)?;
    let embedding: Vec<f32> = serde_json::from_str(&contents)?;
    Ok(embedding)
}

fn setup_logging(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
