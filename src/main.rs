use clap::{Parser, Subcommand};
use itertools::Itertools;
use serde::Serialize;
use std::{error::Error, io, path::PathBuf};
use taja::{
    config::{Config, ConfigStore, FileConfigStore},
    progress::{ProgressAggregator, UserProgress},
    replay::{replay, ReplayReport, Transcript},
    store::{FileProgressStore, ProgressStore},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TAJA_LOG";

/// hangul-aware typing practice: replay recorded sessions and track progress
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Replays recorded keyboard and IME composition transcripts through the typing engine, scores them, and folds completed sessions into your long-term progress."
)]
pub struct Cli {
    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// replay transcript files and score each session
    Replay {
        /// transcript JSON files, replayed in order
        #[clap(required = true)]
        files: Vec<PathBuf>,

        /// progress snapshot to update
        #[clap(long)]
        progress: Option<PathBuf>,

        /// score only, leave stored progress untouched
        #[clap(long)]
        no_save: bool,

        /// print one CSV row per transcript instead of a summary
        #[clap(long)]
        csv: bool,
    },
    /// inspect or reset stored progress
    Progress {
        #[clap(subcommand)]
        action: ProgressAction,
    },
}

#[derive(Subcommand, Debug)]
enum ProgressAction {
    /// print the stored progress snapshot
    Show {
        #[clap(long)]
        progress: Option<PathBuf>,
    },
    /// delete the stored progress snapshot
    Reset {
        #[clap(long)]
        progress: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    file: String,
    completed: bool,
    wpm: f64,
    cpm: f64,
    accuracy: f64,
    consistency: f64,
    elapsed_ms: u64,
    mistakes: usize,
    committed: &'a str,
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config_store = cli
        .config
        .as_ref()
        .map_or_else(FileConfigStore::new, FileConfigStore::with_path);
    let config = config_store.load();

    match cli.command {
        Command::Replay {
            files,
            progress,
            no_save,
            csv,
        } => run_replay(&files, &progress_store(progress), &config, no_save, csv),
        Command::Progress { action } => match action {
            ProgressAction::Show { progress } => show_progress(&progress_store(progress)),
            ProgressAction::Reset { progress } => {
                let store = progress_store(progress);
                store.clear()?;
                println!("progress reset ({})", store.path().display());
                Ok(())
            }
        },
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
}

fn progress_store(path: Option<PathBuf>) -> FileProgressStore {
    path.map_or_else(FileProgressStore::new, FileProgressStore::with_path)
}

fn run_replay(
    files: &[PathBuf],
    store: &FileProgressStore,
    config: &Config,
    no_save: bool,
    as_csv: bool,
) -> Result<(), Box<dyn Error>> {
    let mut aggregator = ProgressAggregator::new(store.load()?.unwrap_or_default())
        .with_recent_limit(config.recent_sessions_limit);
    let mut writer = as_csv.then(|| csv::Writer::from_writer(io::stdout()));
    let mut folded = 0;

    for file in files {
        let transcript = Transcript::load(file)?;
        let report = replay(&transcript, config)?;
        let name = file.display().to_string();

        match writer.as_mut() {
            Some(w) => w.serialize(csv_row(name, &report))?,
            None => print_report(&name, &report),
        }

        let Some(session) = &report.session else {
            warn!(file = %file.display(), "transcript did not complete, not folded");
            continue;
        };
        let Some(outcome) = aggregator.fold(session) else {
            warn!(file = %file.display(), id = session.id, "session already folded, skipped");
            if writer.is_none() {
                println!("  already in progress, not counted again");
            }
            continue;
        };
        folded += 1;
        if let Some(p) = outcome.promotion {
            if writer.is_none() {
                println!("  promoted: {} -> {}", p.old_tier, p.new_tier);
            }
        }
    }
    if let Some(mut w) = writer {
        w.flush()?;
    }

    if no_save || folded == 0 {
        return Ok(());
    }
    store.save(aggregator.progress())?;
    info!(folded, path = %store.path().display(), "progress updated");
    Ok(())
}

fn csv_row(file: String, report: &ReplayReport) -> CsvRow<'_> {
    let m = report.metrics.rounded();
    CsvRow {
        file,
        completed: report.completed,
        wpm: m.wpm,
        cpm: m.cpm,
        accuracy: m.accuracy,
        consistency: m.consistency,
        elapsed_ms: report.elapsed_ms,
        mistakes: report.mistakes.len(),
        committed: &report.committed,
    }
}

fn print_report(name: &str, report: &ReplayReport) {
    let m = report.metrics.rounded();
    let status = if report.completed { "completed" } else { "incomplete" };
    println!(
        "{name}: {status}, {} wpm, {} cpm, {}% acc, {}% consistency, {:.1}s",
        m.wpm,
        m.cpm,
        m.accuracy,
        m.consistency,
        report.elapsed_ms as f64 / 1000.0
    );
    if !report.mistakes.is_empty() {
        let listed = report
            .mistakes
            .iter()
            .map(|x| format!("#{} {:?}->{:?}", x.position, x.expected, x.actual))
            .join(", ");
        println!("  mistakes: {listed}");
    }
}

fn show_progress(store: &FileProgressStore) -> Result<(), Box<dyn Error>> {
    let Some(progress) = store.load()? else {
        println!("no progress recorded yet ({})", store.path().display());
        return Ok(());
    };
    print_progress(&progress);
    Ok(())
}

fn print_progress(p: &UserProgress) {
    println!("tier:        {}", p.tier);
    println!("tests:       {}", p.total_tests);
    println!("characters:  {}", p.total_characters);
    println!("time:        {:.0}s", p.total_duration_seconds);
    println!(
        "average:     {:.1} wpm, {:.1} cpm, {:.1}% acc, {:.1}% consistency",
        p.average_wpm, p.average_cpm, p.average_accuracy, p.average_consistency
    );
    println!(
        "best:        {:.1} wpm, {:.1} cpm, {:.1}% acc",
        p.best_wpm, p.best_cpm, p.best_accuracy
    );
    println!(
        "streak:      {} (longest {})",
        p.current_streak, p.longest_streak
    );
    if !p.recent_sessions.is_empty() {
        let recent = p
            .recent_sessions
            .iter()
            .rev()
            .take(5)
            .map(|s| format!("{:.0}", s.wpm))
            .join(" ");
        println!("recent wpm:  {recent}");
    }
}
