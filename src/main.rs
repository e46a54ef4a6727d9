use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use slopetrack::import::ImportManager;
use slopetrack::logging::init_logging;
use slopetrack::{
    Clock, JsonSessionStore, LiveStats, ManualClock, PauseLedger, ReplaySource, SessionStore,
    SnowboardSession, TrackerConfig, TrackerError, TrackingSession,
};

/// SlopeTrack - Snowboard session tracker
///
/// Replays recorded GPS tracks through the live tracking engine and manages
/// the sessions it produces.
#[derive(Parser)]
#[command(name = "slopetrack")]
#[command(author = "SlopeTrack Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Snowboard session tracking CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded track as a live session
    Replay {
        /// Track file (GPX or CSV)
        #[arg(short, long)]
        file: PathBuf,

        /// Save the completed session to the session store
        #[arg(short, long)]
        save: bool,

        /// Pause tracking for this many seconds before stopping
        #[arg(short, long, default_value = "0")]
        paused_seconds: u64,

        /// Print every Nth live snapshot (0 disables)
        #[arg(short, long, default_value = "30")]
        every: usize,
    },

    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Configure application settings
    Config {
        /// Write a default configuration file
        #[arg(short, long)]
        init: bool,

        /// Print the active configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List stored sessions
    List,

    /// Show one session in detail
    Show {
        /// Session id
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config --init` creates the file it would otherwise read
    let config = match &cli.command {
        Commands::Config { init: true, .. } => TrackerConfig::default(),
        _ => TrackerConfig::load_or_default(cli.config.as_deref())?,
    };

    // Set up logging based on verbosity
    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.raised_by(cli.verbose);
    init_logging(&log_config)?;

    if cli.verbose > 0 {
        eprintln!("{}", format!("Log level: {}", log_config.level.to_filter()).dimmed());
    }

    match cli.command {
        Commands::Replay {
            file,
            save,
            paused_seconds,
            every,
        } => replay(&config, &file, save, paused_seconds, every)?,

        Commands::Sessions { action } => {
            let mut store = JsonSessionStore::new(config.storage.sessions_path());
            match action {
                SessionsAction::List => list_sessions(&store)?,
                SessionsAction::Show { id } => match store.get(&id)? {
                    Some(session) => print_session(&session),
                    None => println!("{}", format!("No session with id {}", id).yellow()),
                },
                SessionsAction::Delete { id } => {
                    store.delete(&id)?;
                    println!("{}", format!("✓ Deleted session {}", id).green());
                }
            }
        }

        Commands::Config { init, show } => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(TrackerConfig::default_config_path);

            if init {
                let mut fresh = TrackerConfig::default();
                fresh.save_to_file(&path)?;
                println!("{}", format!("✓ Configuration written to {}", path.display()).green());
            }

            if show || !init {
                let rendered = toml::to_string_pretty(&config)
                    .context("Failed to render configuration")?;
                println!("{}", format!("# {}", path.display()).dimmed());
                println!("{}", rendered);
            }
        }
    }

    Ok(())
}

fn replay(
    config: &TrackerConfig,
    file: &Path,
    save: bool,
    paused_seconds: u64,
    every: usize,
) -> Result<()> {
    println!("{}", "Replaying track...".cyan().bold());
    println!("  File: {}", file.display());

    let route = ImportManager::new().import_file(file)?;
    let first_timestamp = route.first().map(|sample| sample.timestamp_ms).unwrap_or(0);

    let clock = ManualClock::new(first_timestamp);
    let source = ReplaySource::new(route).with_clock(clock.clone());
    let mut session = TrackingSession::with_clock(source, clock.clone(), config);

    let mut printed = 0usize;
    session.start(move |stats: &LiveStats| {
        printed += 1;
        if every > 0 && printed % every == 0 {
            print_snapshot(stats);
        }
    })?;

    let delivered = session.pump()?;
    println!("  Samples delivered: {}", delivered);

    let mut ledger = PauseLedger::new();
    if paused_seconds > 0 {
        session.pause()?;
        ledger.pause(clock.now_millis());
        clock.advance(paused_seconds as i64 * 1000);
        ledger.resume(clock.now_millis());
        session.resume()?;
    }

    let outcome = match session.stop() {
        Ok(outcome) => outcome,
        Err(e @ TrackerError::SessionTooShort { .. }) => {
            println!("{}", e.user_message().yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let completed = outcome
        .session
        .exclude_paused(ledger.total_ms(clock.now_millis()));
    print_session(&completed);

    if save {
        let mut store = JsonSessionStore::new(config.storage.sessions_path());
        store.save(&completed)?;
        println!(
            "{}",
            format!("✓ Session {} saved to {}", completed.id, store.path().display()).green()
        );
    }

    Ok(())
}

fn list_sessions(store: &JsonSessionStore) -> Result<()> {
    let mut sessions = store.list()?;
    if sessions.is_empty() {
        println!("{}", "No sessions recorded yet".dimmed());
        return Ok(());
    }

    sessions.sort_by(|a, b| b.date.cmp(&a.date));
    println!(
        "{}",
        format!(
            "{:<36}  {:<16}  {:>8}  {:>9}  {:>8}  {:>4}",
            "ID", "DATE", "DURATION", "DISTANCE", "VERTICAL", "RUNS"
        )
        .bold()
    );
    for session in &sessions {
        println!(
            "{:<36}  {:<16}  {:>8}  {:>7.2}km  {:>7.0}m  {:>4}",
            session.id,
            session.date.format("%Y-%m-%d %H:%M"),
            format_duration(session.duration),
            session.distance / 1000.0,
            session.vertical,
            session.number_of_runs
        );
    }
    Ok(())
}

fn print_snapshot(stats: &LiveStats) {
    println!(
        "  {} {:>8}  {:>7.2} km  {:>5.1} km/h  alt {:>6.0} m  runs {}",
        "▸".cyan(),
        format_duration(stats.duration),
        stats.distance / 1000.0,
        stats.current_speed * 3.6,
        stats.current_altitude,
        stats.number_of_runs
    );
}

fn print_session(session: &SnowboardSession) {
    println!("{}", "Session summary".green().bold());
    println!("  Id: {}", session.id);
    println!("  Date: {}", session.date.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Duration: {}", format_duration(session.duration));
    println!("  Distance: {:.2} km", session.distance / 1000.0);
    println!(
        "  Speed: avg {:.1} km/h, max {:.1} km/h",
        session.average_speed * 3.6,
        session.max_speed * 3.6
    );
    println!(
        "  Elevation: +{:.0} m / -{:.0} m (vertical {:.0} m)",
        session.elevation_gain, session.elevation_loss, session.vertical
    );
    println!(
        "  Altitude: {:.0} m to {:.0} m",
        session.min_altitude, session.max_altitude
    );
    println!("  Runs: {}", session.number_of_runs);

    for (i, run) in session.runs.iter().enumerate() {
        println!(
            "    {} {:>2}: {:>5.0} m drop, {:>6.0} m, {:>4}s, max {:.1} km/h",
            "•".blue(),
            i + 1,
            run.vertical_drop,
            run.distance,
            run.duration_seconds(),
            run.max_speed * 3.6
        );
    }
}

fn format_duration(seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
