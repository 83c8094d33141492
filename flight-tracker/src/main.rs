//! flight-tracker: shows the aircraft flying near a home location.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};

use flight_core::config::{self, Config};
use flight_core::format::{
    format_altitude, format_distance, format_heading, format_route, format_speed,
};
use flight_core::{FlightRecord, SnapshotStore};

mod adsbdb;
mod display;
mod enrichment;
mod http;
mod logging;
mod lookup;
mod opensky;
mod orchestrator;

use display::{HeadlessRenderer, TerminalRenderer};
use http::ReqwestClient;
use orchestrator::{run_tracker, wait_for_signal, LiveProducer, ShutdownFlag};

#[derive(Parser)]
#[command(name = "flight-tracker", version, about = "Live nearby-flight tracker")]
struct Cli {
    /// Config file (default: ~/.flight-tracker/config.toml)
    #[arg(long, global = true, env = "FLIGHT_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "flight_tracker=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously and cycle through nearby flights
    Run {
        #[command(flatten)]
        location: LocationArgs,

        /// Run without any display output
        #[arg(long)]
        headless: bool,
    },

    /// Run a single poll cycle and print a table of nearby flights
    Once {
        #[command(flatten)]
        location: LocationArgs,

        /// Print the records as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct LocationArgs {
    /// Home latitude (decimal degrees)
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Home longitude (decimal degrees)
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Query radius around home in km
    #[arg(long)]
    radius_km: Option<f64>,
}

impl LocationArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(lat) = self.lat {
            config.location.lat = lat;
        }
        if let Some(lon) = self.lon {
            config.location.lon = lon;
        }
        if let Some(radius) = self.radius_km {
            config.location.radius_km = radius;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    match cli.command {
        Commands::Run { location, headless } => {
            let config = resolve_config(cli.config.as_deref(), &location);
            cmd_run(config, headless).await;
        }
        Commands::Once { location, json } => {
            let config = resolve_config(cli.config.as_deref(), &location);
            cmd_once(config, json).await;
        }
        Commands::Init { force } => {
            cmd_init(cli.config.as_deref(), force);
        }
    }
}

fn resolve_config(path: Option<&Path>, location: &LocationArgs) -> Config {
    let loaded = match path {
        Some(p) => config::load_config_from(p),
        None => config::load_config(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("Error loading config: {e}");
        std::process::exit(1);
    });
    location.apply(&mut config);

    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    if config.home().is_null_island() {
        tracing::warn!(
            "home location is 0,0 (Gulf of Guinea); set [location] in the config or pass --lat/--lon"
        );
    }
    config
}

fn build_client(config: &Config) -> Arc<ReqwestClient> {
    let client = ReqwestClient::new(config.request_timeout(), config.opensky_credentials())
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });
    Arc::new(client)
}

async fn cmd_run(config: Config, headless: bool) {
    tracing::info!(
        lat = config.location.lat,
        lon = config.location.lon,
        radius_km = config.location.radius_km,
        "flight tracker starting"
    );

    let producer = LiveProducer::from_config(&config, build_client(&config), SnapshotStore::new());
    let shutdown = ShutdownFlag::new();

    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("signal received, shutting down");
        on_signal.request();
    });

    if headless {
        run_tracker(producer, &mut HeadlessRenderer, shutdown, &config.display).await;
    } else {
        let stdout = io::stdout();
        let ansi = stdout.is_terminal();
        let mut renderer = TerminalRenderer::new(stdout, ansi);
        run_tracker(producer, &mut renderer, shutdown, &config.display).await;
    }
}

async fn cmd_once(config: Config, json: bool) {
    let mut producer =
        LiveProducer::from_config(&config, build_client(&config), SnapshotStore::new());
    let snapshot = producer.run_cycle().await;

    if json {
        match serde_json::to_string_pretty(snapshot.records()) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error encoding records: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!();
    println!(
        "Home: {:.4}, {:.4}  radius {} km  max distance {} km",
        config.location.lat,
        config.location.lon,
        config.location.radius_km,
        config.filter.max_distance_km
    );
    println!("Flights: {}", snapshot.len());
    println!();

    if !snapshot.is_empty() {
        println!("{}", summary_table(snapshot.records()));
    }
}

fn summary_table(records: &[FlightRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "#", "Callsign", "ICAO", "Type", "Reg", "Route", "Alt", "Speed", "Hdg", "Dist",
        "Country",
    ]);

    for (i, rec) in records.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(rec.callsign.as_deref().unwrap_or("-")),
            Cell::new(&rec.icao24),
            Cell::new(rec.aircraft_type.as_deref().unwrap_or("-")),
            Cell::new(rec.registration.as_deref().unwrap_or("-")),
            Cell::new(format_route(
                rec.origin_airport.as_deref(),
                rec.destination_airport.as_deref(),
            )),
            Cell::new(format_altitude(rec.baro_altitude_m)),
            Cell::new(format_speed(rec.velocity_mps)),
            Cell::new(format_heading(rec.true_track_deg)),
            Cell::new(format_distance(rec.distance_km)),
            Cell::new(rec.origin_country.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

fn cmd_init(path: Option<&Path>, force: bool) {
    let target = path.map(Path::to_path_buf).unwrap_or_else(config::config_file);
    if target.exists() && !force {
        eprintln!(
            "Config already exists at {} (use --force to overwrite)",
            target.display()
        );
        std::process::exit(1);
    }
    let written = match path {
        Some(p) => config::save_config_to(&Config::default(), p).map(|_| p.to_path_buf()),
        None => config::save_config(&Config::default()),
    };
    match written {
        Ok(written) => {
            println!("Wrote default config to {}", written.display());
            println!("Set [location] lat/lon to your position before running.");
        }
        Err(e) => {
            eprintln!("Error writing {}: {e}", target.display());
            std::process::exit(1);
        }
    }
}
