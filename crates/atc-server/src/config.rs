//! Server configuration from environment.

use std::env;
use std::str::FromStr;

use atc_core::simulation::{ProgressionMode, SimulationConfig};
use atc_core::{RunwayConfiguration, RunwayMode, SafetyNetRules};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// ICAO code of the airport whose layout is loaded.
    pub airport: String,
    pub arrival_runway: String,
    pub departure_runway: String,
    /// Declared movements per hour.
    pub arrival_rate: u32,
    pub departure_rate: u32,
    /// Simulated seconds per tick.
    pub sim_speed: f64,
    pub sim_seed: Option<u64>,
    pub tick_ms: u64,
    pub progression: ProgressionMode,
    pub sequence_interval_secs: u64,
    pub safety_interval_secs: u64,
    pub rimcas_warning_nm: f64,
    pub rimcas_critical_nm: f64,
    pub catc_window_secs: i64,
    /// Scenario JSON loaded at startup.
    pub scenario_path: Option<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            airport: "RKSI".to_string(),
            arrival_runway: "33L".to_string(),
            departure_runway: "33R".to_string(),
            arrival_rate: 30,
            departure_rate: 30,
            sim_speed: 1.0,
            sim_seed: None,
            tick_ms: 1000,
            progression: ProgressionMode::Dwell,
            sequence_interval_secs: 5,
            safety_interval_secs: 1,
            rimcas_warning_nm: 1.5,
            rimcas_critical_nm: 0.5,
            catc_window_secs: 120,
            scenario_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("ATC_PORT", defaults.server_port),
            airport: env::var("ATC_AIRPORT").unwrap_or(defaults.airport),
            arrival_runway: env::var("ATC_ARRIVAL_RUNWAY").unwrap_or(defaults.arrival_runway),
            departure_runway: env::var("ATC_DEPARTURE_RUNWAY")
                .unwrap_or(defaults.departure_runway),
            arrival_rate: env_or("ATC_ARRIVAL_RATE", defaults.arrival_rate),
            departure_rate: env_or("ATC_DEPARTURE_RATE", defaults.departure_rate),
            sim_speed: env_or("ATC_SIM_SPEED", defaults.sim_speed),
            sim_seed: env::var("ATC_SIM_SEED").ok().and_then(|s| s.parse().ok()),
            tick_ms: env_or("ATC_TICK_MS", defaults.tick_ms).max(10),
            progression: env_or("ATC_PROGRESSION", defaults.progression),
            sequence_interval_secs: env_or(
                "ATC_SEQUENCE_INTERVAL_SECS",
                defaults.sequence_interval_secs,
            )
            .max(1),
            safety_interval_secs: env_or("ATC_SAFETY_INTERVAL_SECS", defaults.safety_interval_secs)
                .max(1),
            rimcas_warning_nm: env_or("ATC_RIMCAS_WARNING_NM", defaults.rimcas_warning_nm),
            rimcas_critical_nm: env_or("ATC_RIMCAS_CRITICAL_NM", defaults.rimcas_critical_nm),
            catc_window_secs: env_or("ATC_CATC_WINDOW_SECS", defaults.catc_window_secs),
            scenario_path: env::var("ATC_SCENARIO_PATH").ok().filter(|p| !p.is_empty()),
        }
    }

    /// Active runways. One runway named for both flows runs mixed mode.
    pub fn runway_configurations(&self) -> Vec<RunwayConfiguration> {
        if self.arrival_runway.eq_ignore_ascii_case(&self.departure_runway) {
            let mut mixed =
                RunwayConfiguration::new(self.arrival_runway.clone(), RunwayMode::Mixed, 0);
            mixed.arrival_rate = self.arrival_rate;
            mixed.departure_rate = self.departure_rate;
            return vec![mixed];
        }
        vec![
            RunwayConfiguration::new(
                self.arrival_runway.clone(),
                RunwayMode::Arrival,
                self.arrival_rate,
            ),
            RunwayConfiguration::new(
                self.departure_runway.clone(),
                RunwayMode::Departure,
                self.departure_rate,
            ),
        ]
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            speed: self.sim_speed,
            seed: self.sim_seed,
            mode: self.progression,
            ..SimulationConfig::default()
        }
    }

    pub fn safety_net_rules(&self) -> SafetyNetRules {
        SafetyNetRules {
            rimcas_warning_nm: self.rimcas_warning_nm,
            rimcas_critical_nm: self.rimcas_critical_nm,
            catc_window_secs: self.catc_window_secs,
            ..SafetyNetRules::default()
        }
    }
}
