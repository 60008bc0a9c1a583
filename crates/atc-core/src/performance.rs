//! Aircraft performance reference data.
//!
//! A BADA-style table of characteristic speeds, rates and limits per ICAO
//! type designator. Lookups never fail: unknown types resolve to
//! [`AircraftPerformance::generic`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::WakeCategory;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassEnvelope {
    pub min_kg: f64,
    pub max_kg: f64,
    pub reference_kg: f64,
}

/// Characteristic speeds in knots (mach for `mmo`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpeeds {
    pub v2: f64,
    pub climb: f64,
    pub cruise: f64,
    pub descent: f64,
    pub approach: f64,
    pub landing: f64,
    pub mmo: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftPerformance {
    pub icao_type: String,
    pub manufacturer: String,
    pub model: String,
    pub wake_category: WakeCategory,
    pub mass: MassEnvelope,
    pub speeds: PhaseSpeeds,
    pub max_altitude_ft: f64,
    pub optimal_cruise_ft: f64,
    /// Initial climb rate (ft/min)
    pub climb_rate_initial_fpm: f64,
    /// Climb rate near cruise altitude (ft/min)
    pub climb_rate_cruise_fpm: f64,
    pub descent_rate_fpm: f64,
    pub descent_angle_deg: f64,
}

impl AircraftPerformance {
    /// Fallback for types missing from the table: a medium jet with a
    /// generic speed regime.
    ///
    /// | v2 | climb | cruise | descent | approach | landing |
    /// |----|-------|--------|---------|----------|---------|
    /// | 150 | 280  | 450    | 300     | 140      | 130     |
    ///
    /// Climb and descent at 2000 ft/min, 3 degree descent, ceiling FL410.
    pub fn generic(icao_type: &str) -> Self {
        Self {
            icao_type: icao_type.to_string(),
            manufacturer: "Unknown".to_string(),
            model: "Generic".to_string(),
            wake_category: WakeCategory::Medium,
            mass: MassEnvelope {
                min_kg: 40_000.0,
                max_kg: 80_000.0,
                reference_kg: 65_000.0,
            },
            speeds: PhaseSpeeds {
                v2: 150.0,
                climb: 280.0,
                cruise: 450.0,
                descent: 300.0,
                approach: 140.0,
                landing: 130.0,
                mmo: 0.82,
            },
            max_altitude_ft: 41_000.0,
            optimal_cruise_ft: 35_000.0,
            climb_rate_initial_fpm: 2_000.0,
            climb_rate_cruise_fpm: 2_000.0,
            descent_rate_fpm: 2_000.0,
            descent_angle_deg: 3.0,
        }
    }
}

/// Read-only performance lookup.
pub trait PerformanceLookup: Send + Sync {
    fn get(&self, icao_type: &str) -> Option<&AircraftPerformance>;

    /// Table entry or the generic fallback.
    fn lookup(&self, icao_type: &str) -> AircraftPerformance {
        self.get(icao_type)
            .cloned()
            .unwrap_or_else(|| AircraftPerformance::generic(icao_type))
    }

    fn wake_category(&self, icao_type: &str) -> WakeCategory {
        self.get(icao_type)
            .map(|p| p.wake_category)
            .unwrap_or_default()
    }
}

/// In-memory performance table keyed by ICAO type designator.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTable {
    entries: HashMap<String, AircraftPerformance>,
}

impl PerformanceTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table preloaded with common airline and business types.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for row in BUILTIN {
            table.insert(row.to_performance());
        }
        table
    }

    pub fn insert(&mut self, performance: AircraftPerformance) {
        self.entries
            .insert(performance.icao_type.to_uppercase(), performance);
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn by_wake_category(&self, category: WakeCategory) -> Vec<&AircraftPerformance> {
        let mut matches: Vec<_> = self
            .entries
            .values()
            .filter(|p| p.wake_category == category)
            .collect();
        matches.sort_by(|a, b| a.icao_type.cmp(&b.icao_type));
        matches
    }

    /// Case-insensitive match on type, manufacturer or model.
    pub fn search(&self, query: &str) -> Vec<&AircraftPerformance> {
        let query = query.to_lowercase();
        let mut matches: Vec<_> = self
            .entries
            .values()
            .filter(|p| {
                p.icao_type.to_lowercase().contains(&query)
                    || p.manufacturer.to_lowercase().contains(&query)
                    || p.model.to_lowercase().contains(&query)
            })
            .collect();
        matches.sort_by(|a, b| a.icao_type.cmp(&b.icao_type));
        matches
    }
}

impl PerformanceLookup for PerformanceTable {
    fn get(&self, icao_type: &str) -> Option<&AircraftPerformance> {
        self.entries.get(&icao_type.trim().to_uppercase())
    }
}

struct Row {
    icao_type: &'static str,
    manufacturer: &'static str,
    model: &'static str,
    wake: WakeCategory,
    /// min, max, reference
    mass: [f64; 3],
    /// v2, climb, cruise, descent, approach, landing, mmo
    speeds: [f64; 7],
    /// max operational, optimal cruise
    altitudes: [f64; 2],
    /// initial, cruise
    climb: [f64; 2],
    descent_rate: f64,
}

impl Row {
    fn to_performance(&self) -> AircraftPerformance {
        AircraftPerformance {
            icao_type: self.icao_type.to_string(),
            manufacturer: self.manufacturer.to_string(),
            model: self.model.to_string(),
            wake_category: self.wake,
            mass: MassEnvelope {
                min_kg: self.mass[0],
                max_kg: self.mass[1],
                reference_kg: self.mass[2],
            },
            speeds: PhaseSpeeds {
                v2: self.speeds[0],
                climb: self.speeds[1],
                cruise: self.speeds[2],
                descent: self.speeds[3],
                approach: self.speeds[4],
                landing: self.speeds[5],
                mmo: self.speeds[6],
            },
            max_altitude_ft: self.altitudes[0],
            optimal_cruise_ft: self.altitudes[1],
            climb_rate_initial_fpm: self.climb[0],
            climb_rate_cruise_fpm: self.climb[1],
            descent_rate_fpm: self.descent_rate,
            descent_angle_deg: 3.0,
        }
    }
}

use WakeCategory::{Heavy, Light, Medium, Super};

const BUILTIN: &[Row] = &[
    Row { icao_type: "A388", manufacturer: "Airbus", model: "A380-800", wake: Super, mass: [276_800.0, 560_000.0, 510_000.0], speeds: [155.0, 310.0, 490.0, 330.0, 145.0, 140.0, 0.89], altitudes: [43_000.0, 39_000.0], climb: [2000.0, 1200.0], descent_rate: 2000.0 },
    Row { icao_type: "B77W", manufacturer: "Boeing", model: "777-300ER", wake: Heavy, mass: [167_800.0, 351_500.0, 299_400.0], speeds: [155.0, 300.0, 490.0, 320.0, 145.0, 140.0, 0.89], altitudes: [43_100.0, 39_000.0], climb: [2200.0, 1400.0], descent_rate: 2200.0 },
    Row { icao_type: "B789", manufacturer: "Boeing", model: "787-9", wake: Heavy, mass: [128_850.0, 254_000.0, 227_900.0], speeds: [145.0, 290.0, 488.0, 310.0, 140.0, 135.0, 0.90], altitudes: [43_000.0, 40_000.0], climb: [2500.0, 1600.0], descent_rate: 2300.0 },
    Row { icao_type: "A359", manufacturer: "Airbus", model: "A350-900", wake: Heavy, mass: [142_400.0, 280_000.0, 259_000.0], speeds: [145.0, 300.0, 490.0, 320.0, 140.0, 135.0, 0.89], altitudes: [43_000.0, 41_000.0], climb: [2400.0, 1500.0], descent_rate: 2200.0 },
    Row { icao_type: "A333", manufacturer: "Airbus", model: "A330-300", wake: Heavy, mass: [124_500.0, 242_000.0, 212_000.0], speeds: [150.0, 290.0, 470.0, 300.0, 140.0, 135.0, 0.86], altitudes: [41_000.0, 38_000.0], climb: [2100.0, 1300.0], descent_rate: 2000.0 },
    Row { icao_type: "B748", manufacturer: "Boeing", model: "747-8F", wake: Heavy, mass: [197_131.0, 447_696.0, 400_000.0], speeds: [165.0, 310.0, 490.0, 330.0, 150.0, 145.0, 0.90], altitudes: [43_100.0, 39_000.0], climb: [1800.0, 1100.0], descent_rate: 2000.0 },
    Row { icao_type: "B77L", manufacturer: "Boeing", model: "777F", wake: Heavy, mass: [145_150.0, 347_450.0, 310_000.0], speeds: [160.0, 300.0, 490.0, 320.0, 145.0, 140.0, 0.89], altitudes: [43_100.0, 39_000.0], climb: [2000.0, 1200.0], descent_rate: 2100.0 },
    Row { icao_type: "A321", manufacturer: "Airbus", model: "A321-200", wake: Medium, mass: [48_500.0, 93_500.0, 82_000.0], speeds: [145.0, 280.0, 450.0, 290.0, 135.0, 130.0, 0.82], altitudes: [39_800.0, 37_000.0], climb: [2500.0, 1500.0], descent_rate: 2000.0 },
    Row { icao_type: "A320", manufacturer: "Airbus", model: "A320-200", wake: Medium, mass: [42_600.0, 78_000.0, 70_000.0], speeds: [140.0, 280.0, 450.0, 290.0, 130.0, 125.0, 0.82], altitudes: [39_800.0, 37_000.0], climb: [2600.0, 1600.0], descent_rate: 2100.0 },
    Row { icao_type: "B738", manufacturer: "Boeing", model: "737-800", wake: Medium, mass: [41_413.0, 79_016.0, 70_534.0], speeds: [140.0, 280.0, 450.0, 290.0, 130.0, 125.0, 0.82], altitudes: [41_000.0, 37_000.0], climb: [2500.0, 1500.0], descent_rate: 2000.0 },
    Row { icao_type: "B39M", manufacturer: "Boeing", model: "737 MAX 9", wake: Medium, mass: [45_722.0, 88_314.0, 79_000.0], speeds: [142.0, 285.0, 455.0, 295.0, 132.0, 127.0, 0.82], altitudes: [41_000.0, 38_000.0], climb: [2600.0, 1600.0], descent_rate: 2100.0 },
    Row { icao_type: "E190", manufacturer: "Embraer", model: "E190", wake: Medium, mass: [28_080.0, 51_800.0, 46_000.0], speeds: [130.0, 270.0, 430.0, 280.0, 125.0, 120.0, 0.82], altitudes: [41_000.0, 37_000.0], climb: [2800.0, 1700.0], descent_rate: 2200.0 },
    Row { icao_type: "CRJ9", manufacturer: "Bombardier", model: "CRJ-900", wake: Medium, mass: [21_523.0, 38_329.0, 34_000.0], speeds: [125.0, 260.0, 440.0, 270.0, 125.0, 120.0, 0.85], altitudes: [41_000.0, 37_000.0], climb: [2800.0, 1800.0], descent_rate: 2200.0 },
    Row { icao_type: "AT76", manufacturer: "ATR", model: "ATR 72-600", wake: Medium, mass: [13_500.0, 23_000.0, 21_500.0], speeds: [105.0, 180.0, 275.0, 200.0, 105.0, 100.0, 0.0], altitudes: [25_000.0, 23_000.0], climb: [1800.0, 1000.0], descent_rate: 1500.0 },
    Row { icao_type: "DH8D", manufacturer: "De Havilland", model: "Dash 8-400", wake: Medium, mass: [17_185.0, 30_481.0, 28_000.0], speeds: [110.0, 190.0, 310.0, 220.0, 110.0, 105.0, 0.0], altitudes: [27_000.0, 25_000.0], climb: [2000.0, 1200.0], descent_rate: 1600.0 },
    Row { icao_type: "GLF6", manufacturer: "Gulfstream", model: "G650", wake: Medium, mass: [24_721.0, 45_178.0, 40_000.0], speeds: [130.0, 280.0, 490.0, 290.0, 120.0, 115.0, 0.925], altitudes: [51_000.0, 45_000.0], climb: [4000.0, 2500.0], descent_rate: 3000.0 },
    Row { icao_type: "C680", manufacturer: "Cessna", model: "Citation Sovereign", wake: Light, mass: [8_618.0, 13_744.0, 12_500.0], speeds: [115.0, 250.0, 430.0, 250.0, 110.0, 105.0, 0.80], altitudes: [47_000.0, 43_000.0], climb: [3500.0, 2000.0], descent_rate: 2500.0 },
];
