use anyhow::{bail, Context, Result};
use atc_cli::sim::{builtin_scenario, ServerClient};
use atc_core::{StripOptions, TrafficScenario};
use clap::Parser;

/// Submit ATS messages or a scenario to a running server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ATC Server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Messages to submit, in order
    messages: Vec<String>,

    /// File with one message per line
    #[arg(long)]
    file: Option<String>,

    /// Runway assigned to new strips
    #[arg(long)]
    runway: Option<String>,

    /// Gate assigned to new strips
    #[arg(long)]
    gate: Option<String>,

    /// Only validate, do not store
    #[arg(long)]
    validate: bool,

    /// Load a built-in scenario id or a scenario JSON file instead
    #[arg(long)]
    scenario: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let client = ServerClient::new(args.url.clone());

    if !client.health()? {
        bail!("Server at {} is not healthy", client.base_url());
    }

    if let Some(scenario) = &args.scenario {
        let scenario = match builtin_scenario(scenario) {
            Some(builtin) => builtin,
            None => {
                let json = std::fs::read_to_string(scenario)
                    .with_context(|| format!("Failed to read scenario file {}", scenario))?;
                TrafficScenario::from_json(&json)?
            }
        };
        let summary = client.load_scenario(&scenario)?;
        println!(
            "Loaded scenario {}: {} active, {} pending",
            scenario.id, summary["immediate"], summary["pending"]
        );
        return Ok(());
    }

    let mut messages = args.messages.clone();
    if let Some(path) = &args.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read message file {}", path))?;
        messages.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
        );
    }
    if messages.is_empty() {
        bail!("No messages given");
    }

    let options = StripOptions {
        runway: args.runway.clone(),
        gate: args.gate.clone(),
        ..Default::default()
    };

    let mut failures = 0;
    for message in &messages {
        if args.validate {
            match client.validate_message(message) {
                Ok(body) => println!(
                    "{} valid={} defects={}",
                    message, body["valid"], body["defects"]
                ),
                Err(e) => {
                    failures += 1;
                    eprintln!("{}: {}", message, e);
                }
            }
            continue;
        }

        match client.submit_message(message, &options) {
            Ok((status, body)) => {
                let outcome = &body["outcome"];
                println!(
                    "{} -> {} {} {}",
                    message,
                    status,
                    outcome["outcome"].as_str().unwrap_or("?"),
                    outcome["flight_id"].as_str().unwrap_or("")
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", message, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} message(s) failed", failures, messages.len());
    }
    Ok(())
}
