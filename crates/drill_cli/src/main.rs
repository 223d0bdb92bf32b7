use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drill_content::{load_content, start_session};
use drill_control::{drive, DiligentTrainee, SeededTrainee};
use drill_core::{Content, InMemoryProgress, ProgressTracker, Session, Track};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

mod shell;

use shell::Command;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "drill_cli", about = "Red flag phishing drill CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the training tracks in the catalog.
    Tracks {
        #[arg(long, default_value = "./content")]
        content_dir: String,
    },
    /// Play one track, interactively or on autopilot.
    Run {
        #[arg(long)]
        track: Track,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Play without stdin: a diligent trainee, or a seeded one with --seed.
        #[arg(long)]
        auto: bool,
        /// Seed for the session id and the seeded trainee.
        #[arg(long)]
        seed: Option<u64>,
        /// Action cap for the seeded trainee.
        #[arg(long, default_value_t = 200)]
        max_actions: usize,
        /// Load progress from and save it back to this JSON file.
        #[arg(long)]
        progress_file: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Progress file
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct ProgressFile {
    content_version: String,
    tracker: InMemoryProgress,
}

/// A missing file is a fresh learner.
fn load_progress(path: &Path) -> Result<InMemoryProgress> {
    if !path.exists() {
        return Ok(InMemoryProgress::new());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading progress file: {}", path.display()))?;
    let file: ProgressFile = serde_json::from_str(&json)
        .with_context(|| format!("parsing progress file: {}", path.display()))?;
    Ok(file.tracker)
}

fn save_progress(path: &Path, tracker: &InMemoryProgress, content_version: &str) -> Result<()> {
    let file = ProgressFile {
        content_version: content_version.to_string(),
        tracker: tracker.clone(),
    };
    let out =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(out, &file)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn list_tracks(content_dir: &str) -> Result<()> {
    let content = load_content(content_dir)?;
    println!("content_version={}", content.content_version);
    for track_def in &content.tracks {
        println!(
            "{:<6} {:<20} {:<32} examples={} flags={} difficulty={:?}",
            track_def.track,
            track_def.simulation_id,
            track_def.display_name,
            track_def.examples.len(),
            track_def.total_flags(),
            track_def.difficulty,
        );
    }
    Ok(())
}

fn run(
    track: Track,
    content_dir: &str,
    auto: bool,
    seed: Option<u64>,
    max_actions: usize,
    progress_file: Option<&Path>,
) -> Result<()> {
    let content = load_content(content_dir)?;
    let mut tracker = match progress_file {
        Some(path) => load_progress(path)?,
        None => InMemoryProgress::new(),
    };

    let resolved_seed = seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(resolved_seed);
    let mut session = start_session(&content, track, &mut tracker, &mut rng)?;

    println!(
        "Starting {}: session={} seed={resolved_seed} content_version={}",
        track.label(),
        session.id(),
        content.content_version,
    );
    shell::print_progress(&session.tracker().snapshot(), &content);

    if auto {
        autoplay(&mut session, &content, seed, max_actions);
    } else {
        interactive(&mut session, &content)?;
    }

    let complete = session.is_complete();
    let summary = session.summary();
    drop(session);

    println!("{}", "-".repeat(80));
    println!(
        "Done. complete={complete} score={} flags={}/{} time_taken={}s",
        summary.score,
        summary.red_flags_found,
        summary.total_red_flags,
        summary.time_taken_secs,
    );
    shell::print_progress(tracker.progress(), &content);

    if let Some(path) = progress_file {
        save_progress(path, &tracker, &content.content_version)?;
        println!("Progress saved to {}", path.display());
    }
    Ok(())
}

fn autoplay<T: ProgressTracker>(
    session: &mut Session<T>,
    content: &Content,
    seed: Option<u64>,
    max_actions: usize,
) {
    let report = match seed {
        Some(seed) => {
            let mut trainee = SeededTrainee::new(ChaCha8Rng::seed_from_u64(seed), max_actions);
            drive(session, &mut trainee, max_actions)
        }
        None => drive(session, &mut DiligentTrainee, max_actions),
    };
    shell::print_events(&report.events, content, session.examples());
    println!(
        "Autoplay: applied={} rejected={}",
        report.applied,
        report.rejected.len(),
    );
}

fn interactive<T: ProgressTracker>(session: &mut Session<T>, content: &Content) -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut show_hints = false;
    println!("{}", shell::HELP);
    shell::print_view(&session.view(), show_hints);

    loop {
        print!("> ");
        std::io::stdout().flush().context("flushing stdout")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match shell::parse_command(&line, session.current_example()) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        match command {
            Command::Play(action) => match session.apply(&action) {
                Ok(events) => {
                    shell::print_events(&events, content, session.examples());
                    shell::print_view(&session.view(), show_hints);
                }
                Err(rejection) => println!("Not applied: {rejection}"),
            },
            Command::ToggleHints => {
                show_hints = !show_hints;
                shell::print_view(&session.view(), show_hints);
            }
            Command::Show => shell::print_view(&session.view(), show_hints),
            Command::Help => println!("{}", shell::HELP),
            Command::Quit => {
                session.exit();
                break;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Tracks { content_dir } => list_tracks(&content_dir)?,
        Commands::Run {
            track,
            content_dir,
            auto,
            seed,
            max_actions,
            progress_file,
        } => run(
            track,
            &content_dir,
            auto,
            seed,
            max_actions,
            progress_file.as_deref().map(Path::new),
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::test_fixtures::{base_content, complete_track, session_with};
    use drill_core::BadgeId;

    #[test]
    fn missing_progress_file_is_fresh_progress() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = load_progress(&dir.path().join("absent.json")).unwrap();
        assert_eq!(tracker.progress().points, 0);
    }

    #[test]
    fn progress_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let content = base_content();

        let mut tracker = InMemoryProgress::new();
        let mut session = session_with(&content, Track::Email, &mut tracker);
        complete_track(&mut session);
        drop(session);
        save_progress(&path, &tracker, &content.content_version).unwrap();

        let loaded = load_progress(&path).unwrap();
        assert_eq!(loaded.progress(), tracker.progress());
        assert!(loaded.progress().has_badge(&BadgeId::from("phishing-detector")));
        assert_eq!(loaded.activity().count(), tracker.activity().count());
    }

    #[test]
    fn corrupt_progress_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_progress(&path).unwrap_err();
        assert!(format!("{err:#}").contains("progress.json"));
    }

    #[test]
    fn diligent_autoplay_completes_track() {
        let content = base_content();
        let mut session = session_with(&content, Track::Sms, InMemoryProgress::new());
        autoplay(&mut session, &content, None, 100);
        assert!(session.is_complete());
    }

    #[test]
    fn cli_parses_track_argument() {
        let cli = Cli::try_parse_from(["drill_cli", "run", "--track", "sms", "--auto"]).unwrap();
        match cli.command {
            Commands::Run { track, auto, .. } => {
                assert_eq!(track, Track::Sms);
                assert!(auto);
            }
            Commands::Tracks { .. } => panic!("expected run"),
        }
        assert!(Cli::try_parse_from(["drill_cli", "run", "--track", "fax"]).is_err());
    }
}
