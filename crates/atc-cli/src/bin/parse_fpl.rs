use std::io::Read;

use anyhow::{Context, Result};
use atc_core::{fpl, StripGenerator, StripOptions};
use chrono::Utc;
use clap::Parser;

/// Decode and validate an ATS flight plan message offline.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Message text, e.g. "(FPL-KAL123-IS-B738/M-...)". Read from stdin when omitted.
    message: Option<String>,

    /// Also print the flight strip the message would create
    #[arg(long)]
    strip: bool,

    /// Runway assigned to the strip
    #[arg(long)]
    runway: Option<String>,

    /// Gate assigned to the strip
    #[arg(long)]
    gate: Option<String>,

    /// Seed for the squawk generator
    #[arg(long)]
    seed: Option<u64>,

    /// Re-encode the decoded message
    #[arg(long)]
    encode: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let raw = match args.message {
        Some(message) => message,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read message from stdin")?;
            buf
        }
    };

    let plan = fpl::parse(&raw).context("Failed to decode message")?;
    println!("{}", serde_json::to_string_pretty(&plan)?);

    if args.encode {
        println!("\nEncoded: {}", fpl::generate(&plan));
    }

    let defects = fpl::validate(&plan);
    if defects.is_empty() {
        println!("\nValid {} message for {}", plan.kind, plan.callsign);
    } else {
        println!("\n{} defect(s):", defects.len());
        for defect in &defects {
            println!("  - {}", defect);
        }
    }

    if args.strip {
        let mut generator = match args.seed {
            Some(seed) => StripGenerator::new(seed),
            None => StripGenerator::from_os_rng(),
        };
        let options = StripOptions {
            runway: args.runway,
            gate: args.gate,
            ..Default::default()
        };
        let record = generator.from_flight_plan(&plan, options, Utc::now());
        println!("\nStrip:");
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    if !defects.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
