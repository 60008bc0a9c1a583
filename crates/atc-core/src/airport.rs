//! Airport layout reference data and runway configuration.
//!
//! Geometry is looked up by ICAO location indicator. Unknown airports yield
//! an empty layout carrying the requested code rather than an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::Position;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunwayStatus {
    #[default]
    Open,
    Closed,
    Limited,
}

/// One runway direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runway {
    pub id: String,
    pub heading_deg: f64,
    pub length_m: f64,
    pub width_m: f64,
    pub threshold: Position,
    pub opposite_threshold: Position,
    #[serde(default)]
    pub status: RunwayStatus,
}

impl Runway {
    pub fn is_closed(&self) -> bool {
        self.status == RunwayStatus::Closed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: String,
    pub terminal: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingFix {
    pub fix: String,
    pub position: Position,
    pub altitude_ft: f64,
}

/// Named departure or arrival procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: String,
    pub runway: String,
    pub waypoints: Vec<(String, Position)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportLayout {
    pub icao: String,
    pub name: String,
    pub reference: Position,
    pub elevation_ft: f64,
    pub runways: Vec<Runway>,
    pub gates: Vec<Gate>,
    pub sids: Vec<Procedure>,
    pub stars: Vec<Procedure>,
    pub holding_fixes: Vec<HoldingFix>,
}

impl AirportLayout {
    /// Layout with no geometry, used for unknown airports.
    pub fn empty(icao: &str) -> Self {
        Self {
            icao: icao.to_uppercase(),
            name: String::new(),
            reference: Position::new(0.0, 0.0),
            elevation_ft: 0.0,
            runways: Vec::new(),
            gates: Vec::new(),
            sids: Vec::new(),
            stars: Vec::new(),
            holding_fixes: Vec::new(),
        }
    }

    pub fn runway(&self, id: &str) -> Option<&Runway> {
        self.runways.iter().find(|r| r.id.eq_ignore_ascii_case(id))
    }

    pub fn gate(&self, id: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.id == id)
    }

    pub fn holding_fix(&self, fix: &str) -> Option<&HoldingFix> {
        self.holding_fixes.iter().find(|h| h.fix == fix)
    }
}

/// Read-only airport geometry lookup.
pub trait AirportLookup: Send + Sync {
    fn get(&self, icao: &str) -> Option<&AirportLayout>;

    fn layout(&self, icao: &str) -> AirportLayout {
        self.get(icao)
            .cloned()
            .unwrap_or_else(|| AirportLayout::empty(icao))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AirportDirectory {
    airports: HashMap<String, AirportLayout>,
}

impl AirportDirectory {
    pub fn builtin() -> Self {
        let mut directory = Self::default();
        directory.insert(incheon());
        directory
    }

    pub fn insert(&mut self, layout: AirportLayout) {
        self.airports.insert(layout.icao.to_uppercase(), layout);
    }
}

impl AirportLookup for AirportDirectory {
    fn get(&self, icao: &str) -> Option<&AirportLayout> {
        self.airports.get(&icao.trim().to_uppercase())
    }
}

/// How an active runway is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunwayMode {
    Arrival,
    Departure,
    #[default]
    Mixed,
}

impl RunwayMode {
    pub fn handles_arrivals(self) -> bool {
        matches!(self, RunwayMode::Arrival | RunwayMode::Mixed)
    }

    pub fn handles_departures(self) -> bool {
        matches!(self, RunwayMode::Departure | RunwayMode::Mixed)
    }
}

/// Runway in use with its declared capacity (movements per hour).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayConfiguration {
    pub runway: String,
    pub mode: RunwayMode,
    pub arrival_rate: u32,
    pub departure_rate: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl RunwayConfiguration {
    pub fn new(runway: impl Into<String>, mode: RunwayMode, rate: u32) -> Self {
        Self {
            runway: runway.into(),
            mode,
            arrival_rate: if mode.handles_arrivals() { rate } else { 0 },
            departure_rate: if mode.handles_departures() { rate } else { 0 },
            active: true,
        }
    }
}

fn runway(id: &str, heading: f64, length: f64, from: (f64, f64), to: (f64, f64)) -> Runway {
    Runway {
        id: id.to_string(),
        heading_deg: heading,
        length_m: length,
        width_m: 60.0,
        threshold: Position::new(from.0, from.1),
        opposite_threshold: Position::new(to.0, to.1),
        status: RunwayStatus::Open,
    }
}

fn procedure(id: &str, rwy: &str, points: &[(&str, f64, f64)]) -> Procedure {
    Procedure {
        id: id.to_string(),
        runway: rwy.to_string(),
        waypoints: points
            .iter()
            .map(|(name, lat, lon)| (name.to_string(), Position::new(*lat, *lon)))
            .collect(),
    }
}

/// Incheon International (RKSI).
fn incheon() -> AirportLayout {
    let t1 = (1..=8).map(|n| Gate {
        id: format!("10{n}"),
        terminal: "T1".to_string(),
        position: Position::new(37.4489 + 0.0002 * n as f64, 126.4500 + 0.0005 * n as f64),
    });
    let t2 = (0..=4).map(|n| Gate {
        id: format!("23{n}"),
        terminal: "T2".to_string(),
        position: Position::new(37.4591 + 0.0002 * n as f64, 126.4405 + 0.0005 * n as f64),
    });

    AirportLayout {
        icao: "RKSI".to_string(),
        name: "Incheon International Airport".to_string(),
        reference: Position::new(37.4691, 126.4505),
        elevation_ft: 23.0,
        runways: vec![
            runway("15L", 150.0, 3750.0, (37.4847, 126.4167), (37.4583, 126.4472)),
            runway("33R", 330.0, 3750.0, (37.4583, 126.4472), (37.4847, 126.4167)),
            runway("15R", 150.0, 4000.0, (37.4847, 126.4367), (37.4583, 126.4672)),
            runway("33L", 330.0, 4000.0, (37.4583, 126.4672), (37.4847, 126.4367)),
            runway("16", 160.0, 3750.0, (37.4847, 126.4867), (37.4583, 126.5072)),
            runway("34", 340.0, 3750.0, (37.4583, 126.5072), (37.4847, 126.4867)),
        ],
        gates: t1.chain(t2).collect(),
        sids: vec![
            procedure("BOPTA1A", "33L", &[("IC510", 37.5000, 126.4500), ("IC512", 37.5500, 126.4300), ("BOPTA", 37.6200, 126.3800)]),
            procedure("KARBU1A", "33R", &[("IC520", 37.5000, 126.4800), ("IC522", 37.5600, 126.5200), ("KARBU", 37.6500, 126.5800)]),
            procedure("OLMEN1A", "33L", &[("IC510", 37.5000, 126.4500), ("OLMEN", 37.5800, 126.3200)]),
        ],
        stars: vec![
            procedure("REBIT1B", "33L", &[("REBIT", 37.2500, 126.8000), ("IC801", 37.3200, 126.6500), ("IC802", 37.3800, 126.5500), ("IC803", 37.4200, 126.4800)]),
            procedure("GUKDO1B", "33R", &[("GUKDO", 37.1500, 126.5000), ("IC811", 37.2500, 126.4800), ("IC812", 37.3500, 126.4600), ("IC813", 37.4000, 126.4550)]),
        ],
        holding_fixes: vec![
            HoldingFix { fix: "BOPTA".to_string(), position: Position::new(37.6200, 126.3800), altitude_ft: 10_000.0 },
            HoldingFix { fix: "GUKDO".to_string(), position: Position::new(37.1500, 126.5000), altitude_ft: 15_000.0 },
            HoldingFix { fix: "REBIT".to_string(), position: Position::new(37.2500, 126.8000), altitude_ft: 14_000.0 },
        ],
    }
}
