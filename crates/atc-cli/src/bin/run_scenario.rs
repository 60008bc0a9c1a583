use anyhow::{anyhow, Context, Result};
use atc_cli::sim::{builtin_scenario, builtin_scenario_ids, OfflineRunner};
use atc_core::{ProgressionMode, SimulationConfig, TrafficScenario};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Drive a traffic scenario offline and print the resulting sequences.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Built-in scenario id (morning-bank, arrival-rush)
    #[arg(long, default_value = "morning-bank")]
    scenario: String,

    /// Scenario JSON file; overrides --scenario
    #[arg(long)]
    file: Option<String>,

    /// Number of ticks to run
    #[arg(long, default_value_t = 30)]
    ticks: usize,

    /// Simulated seconds per tick
    #[arg(long, default_value_t = 60.0)]
    speed: f64,

    /// Progression mode: dwell or schedule
    #[arg(long, default_value = "dwell")]
    mode: ProgressionMode,

    /// Seed for strips and jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Scenario start (RFC 3339); defaults to now
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Print every status change
    #[arg(long)]
    verbose: bool,
}

fn load_scenario(args: &Args) -> Result<TrafficScenario> {
    match &args.file {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read scenario file {}", path))?;
            TrafficScenario::from_json(&json)
                .with_context(|| format!("Invalid scenario file {}", path))
        }
        None => builtin_scenario(&args.scenario).ok_or_else(|| {
            anyhow!(
                "Unknown scenario '{}' (available: {})",
                args.scenario,
                builtin_scenario_ids().join(", ")
            )
        }),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let scenario = load_scenario(&args)?;
    let start = args.start.unwrap_or_else(Utc::now);

    let config = SimulationConfig {
        speed: args.speed,
        seed: args.seed,
        mode: args.mode,
        ..SimulationConfig::default()
    };
    let mut runner = OfflineRunner::new(&scenario, config, start)?;

    println!("Scenario: {} ({})", scenario.name, scenario.id);
    println!(
        "Start {} | {} active, {} pending",
        start.format("%H:%M:%SZ"),
        runner.flights().len(),
        runner.pending_count()
    );
    for rwy in runner.runways() {
        println!(
            "  RWY {} {:?} @ {}/h",
            rwy.runway,
            rwy.mode,
            rwy.arrival_rate.max(rwy.departure_rate)
        );
    }

    let verbose = args.verbose;
    let summary = runner.run(args.ticks, |report| {
        for callsign in &report.released {
            println!("[{}] {} released", report.sim_time.format("%H:%M:%S"), callsign);
        }
        if verbose {
            for change in &report.changes {
                println!(
                    "[{}] {} {} -> {}",
                    report.sim_time.format("%H:%M:%S"),
                    change.callsign,
                    change.from,
                    change.to
                );
            }
        }
    });

    println!(
        "\nAfter {} ticks ({}): {} flights, {} transitions, {} pending",
        summary.ticks,
        summary.sim_time.format("%H:%M:%SZ"),
        summary.flights.len(),
        summary.transitions,
        summary.pending
    );

    println!("\nFlights:");
    for flight in &summary.flights {
        println!(
            "  {:<8} {:<5} {:<20} {}",
            flight.callsign,
            flight.aircraft_type,
            flight.status().to_string(),
            flight.runway.as_deref().unwrap_or("-")
        );
    }

    for sequence in &summary.sequences.arrivals {
        println!("\nArrivals RWY {}:", sequence.runway);
        for arrival in &sequence.flights {
            println!(
                "  {:>2}. {:<8} STA {} delay {} min",
                arrival.sequence_position,
                arrival.callsign,
                arrival.scheduled_time.format("%H:%M"),
                arrival.delay_min
            );
        }
    }
    for sequence in &summary.sequences.departures {
        println!("\nDepartures RWY {}:", sequence.runway);
        for departure in &sequence.flights {
            let violation = if departure.slot_violation.is_some() { " (slot)" } else { "" };
            println!(
                "  {:>2}. {:<8} TSAT {} TTOT {}{}",
                departure.sequence_position,
                departure.callsign,
                departure.tsat.format("%H:%M"),
                departure.ttot.format("%H:%M"),
                violation
            );
        }
    }

    Ok(())
}
