mod config;
mod date;
mod db;
mod status;
mod trip;
mod watcher;

use clap::{Parser, Subcommand};
use config::{load as config_load, validate as config_validate};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use trip::{TripError, TripState};

#[derive(Parser)]
#[command(name = "tripcount")]
#[command(about = "Count down to, through, and past your trip")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show where today falls relative to the trip (default)
    Status {
        /// Print the resolved status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the trip range (dates as YYYY-MM-DD)
    Set {
        #[arg(value_name = "START", value_parser = date::parse_date)]
        start: chrono::NaiveDate,
        #[arg(value_name = "END", value_parser = date::parse_date)]
        end: chrono::NaiveDate,
    },
    /// Set the trip to Monday-Friday of this week
    ThisWeek,
    /// Set the trip to Monday-Friday of next week
    NextWeek,
    /// Remove the saved trip
    Clear,
    /// Print the saved trip range
    Show,
    /// Keep running and report the status whenever it changes
    Watch,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match config_load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = config_validate(&config) {
        eprintln!("Configuration error: {err}");
        std::process::exit(1);
    }

    info!(
        db_path = %config.storage.path,
        check_interval = config.watch.check_interval_seconds,
        "Effective configuration loaded"
    );

    let store = match db::SqliteStore::open(&config.storage.path) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "Failed to open database");
            std::process::exit(1);
        }
    };

    let mut trip = TripState::new(Box::new(store));
    trip.hydrate();

    let today = date::today();
    let result = match cli.command.unwrap_or(Command::Status { json: false }) {
        Command::Status { json } => {
            print_status(&trip, today, json);
            Ok(())
        }
        Command::Show => {
            print_range(trip.range());
            Ok(())
        }
        Command::Set { start, end } => edit(&mut trip, |t| t.set_trip(&start, &end)),
        Command::ThisWeek => edit(&mut trip, |t| t.set_this_week(&today)),
        Command::NextWeek => edit(&mut trip, |t| t.set_next_week(&today)),
        Command::Clear => edit(&mut trip, TripState::clear_trip),
        Command::Watch => {
            watch(config.watch, trip);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn print_status(trip: &TripState, today: chrono::NaiveDate, json: bool) {
    if !trip.load_state().is_loaded() {
        println!("Loading trip...");
        return;
    }

    let status = status::resolve(&today, trip.range());

    if json {
        match serde_json::to_string_pretty(&status) {
            Ok(out) => println!("{out}"),
            Err(err) => error!(error = %err, "Failed to serialize status"),
        }
        return;
    }

    println!("{}", status.primary_text);
    println!("{}", status.secondary_text);
    if let Some(extra) = &status.tertiary_text {
        println!("{extra}");
    }
    println!("[{}]", status.visual_key.asset_name());
}

fn print_range(range: Option<&trip::TripRange>) {
    match range {
        Some(range) => println!("{range}"),
        None => println!("No dates saved yet"),
    }
}

/// Apply an edit and echo the saved range once the change lands.
fn edit<F>(trip: &mut TripState, apply: F) -> Result<(), TripError>
where
    F: FnOnce(&mut TripState) -> Result<(), TripError>,
{
    trip.subscribe(|range, _| print_range(range));
    apply(trip)
}

fn watch(config: config::WatchConfig, trip: TripState) {
    let running = Arc::new(AtomicBool::new(true));
    let running_signal = Arc::clone(&running);

    if let Err(err) = ctrlc::set_handler(move || {
        info!("Ctrl-C received, shutting down gracefully");
        running_signal.store(false, Ordering::SeqCst);
    }) {
        error!(error = %err, "Failed to set Ctrl-C handler");
        std::process::exit(1);
    }

    info!(
        check_interval = config.check_interval_seconds,
        "tripcount watcher starting"
    );

    watcher::StatusWatcher::new(config, trip, running).run();

    info!("tripcount stopped");
}
