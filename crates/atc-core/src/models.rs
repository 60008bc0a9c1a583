//! Core data models for the tower decision-support core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TransitionError;

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// ICAO wake turbulence category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeCategory {
    /// J - A380 class
    Super,
    /// H - 136 t MTOW and above
    Heavy,
    /// M - between 7 t and 136 t
    #[default]
    Medium,
    /// L - 7 t MTOW or less
    Light,
}

impl WakeCategory {
    pub const ALL: [WakeCategory; 4] = [
        WakeCategory::Super,
        WakeCategory::Heavy,
        WakeCategory::Medium,
        WakeCategory::Light,
    ];

    /// Decode the single-letter ICAO code (J, H, M, L).
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'J' => Some(WakeCategory::Super),
            'H' => Some(WakeCategory::Heavy),
            'M' => Some(WakeCategory::Medium),
            'L' => Some(WakeCategory::Light),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            WakeCategory::Super => 'J',
            WakeCategory::Heavy => 'H',
            WakeCategory::Medium => 'M',
            WakeCategory::Light => 'L',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WakeCategory::Super => "Super",
            WakeCategory::Heavy => "Heavy",
            WakeCategory::Medium => "Medium",
            WakeCategory::Light => "Light",
        }
    }

    /// Row/column index into the separation matrices (heaviest first).
    pub(crate) fn index(self) -> usize {
        match self {
            WakeCategory::Super => 0,
            WakeCategory::Heavy => 1,
            WakeCategory::Medium => 2,
            WakeCategory::Light => 3,
        }
    }

    /// Sort weight with the lightest category first.
    pub fn lightness_rank(self) -> u8 {
        match self {
            WakeCategory::Light => 0,
            WakeCategory::Medium => 1,
            WakeCategory::Heavy => 2,
            WakeCategory::Super => 3,
        }
    }
}

impl fmt::Display for WakeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Item 8 flight rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightRules {
    #[default]
    Ifr,
    Vfr,
    /// Y - IFR first, then VFR
    IfrThenVfr,
    /// Z - VFR first, then IFR
    VfrThenIfr,
}

impl FlightRules {
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'I' => Some(FlightRules::Ifr),
            'V' => Some(FlightRules::Vfr),
            'Y' => Some(FlightRules::IfrThenVfr),
            'Z' => Some(FlightRules::VfrThenIfr),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            FlightRules::Ifr => 'I',
            FlightRules::Vfr => 'V',
            FlightRules::IfrThenVfr => 'Y',
            FlightRules::VfrThenIfr => 'Z',
        }
    }
}

/// Item 8 type of flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightType {
    #[default]
    Scheduled,
    NonScheduled,
    GeneralAviation,
    Military,
    Other,
}

impl FlightType {
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'S' => Some(FlightType::Scheduled),
            'N' => Some(FlightType::NonScheduled),
            'G' => Some(FlightType::GeneralAviation),
            'M' => Some(FlightType::Military),
            'X' => Some(FlightType::Other),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            FlightType::Scheduled => 'S',
            FlightType::NonScheduled => 'N',
            FlightType::GeneralAviation => 'G',
            FlightType::Military => 'M',
            FlightType::Other => 'X',
        }
    }
}

/// Lifecycle status of a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Filed,
    Active,
    ClearanceDelivered,
    PushApproved,
    Taxiing,
    Holding,
    Lineup,
    TakeoffCleared,
    Departed,
    InitialApproach,
    FinalApproach,
    Landed,
    TaxiIn,
    AtGate,
    Completed,
}

/// Departure status ordering.
pub const DEPARTURE_FLOW: [FlightStatus; 8] = [
    FlightStatus::Filed,
    FlightStatus::ClearanceDelivered,
    FlightStatus::PushApproved,
    FlightStatus::Taxiing,
    FlightStatus::Holding,
    FlightStatus::Lineup,
    FlightStatus::TakeoffCleared,
    FlightStatus::Departed,
];

/// Arrival status ordering.
pub const ARRIVAL_FLOW: [FlightStatus; 5] = [
    FlightStatus::InitialApproach,
    FlightStatus::FinalApproach,
    FlightStatus::Landed,
    FlightStatus::TaxiIn,
    FlightStatus::AtGate,
];

/// One of the two fixed status orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFlow {
    Departure,
    Arrival,
}

impl StatusFlow {
    pub fn statuses(self) -> &'static [FlightStatus] {
        match self {
            StatusFlow::Departure => &DEPARTURE_FLOW,
            StatusFlow::Arrival => &ARRIVAL_FLOW,
        }
    }

    /// Index of `status` within this flow.
    pub fn position(self, status: FlightStatus) -> Option<usize> {
        self.statuses().iter().position(|s| *s == status)
    }

    /// The status one step after `status`, if any.
    pub fn next(self, status: FlightStatus) -> Option<FlightStatus> {
        let idx = self.position(status)?;
        self.statuses().get(idx + 1).copied()
    }
}

impl FlightStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FlightStatus::Filed => "FILED",
            FlightStatus::Active => "ACTIVE",
            FlightStatus::ClearanceDelivered => "CLEARANCE_DELIVERED",
            FlightStatus::PushApproved => "PUSH_APPROVED",
            FlightStatus::Taxiing => "TAXIING",
            FlightStatus::Holding => "HOLDING",
            FlightStatus::Lineup => "LINEUP",
            FlightStatus::TakeoffCleared => "TAKEOFF_CLEARED",
            FlightStatus::Departed => "DEPARTED",
            FlightStatus::InitialApproach => "INITIAL_APPROACH",
            FlightStatus::FinalApproach => "FINAL_APPROACH",
            FlightStatus::Landed => "LANDED",
            FlightStatus::TaxiIn => "TAXI_IN",
            FlightStatus::AtGate => "AT_GATE",
            FlightStatus::Completed => "COMPLETED",
        }
    }

    /// The flow this status belongs to. `Active` and `Completed` belong to neither.
    pub fn flow(self) -> Option<StatusFlow> {
        if DEPARTURE_FLOW.contains(&self) {
            Some(StatusFlow::Departure)
        } else if ARRIVAL_FLOW.contains(&self) {
            Some(StatusFlow::Arrival)
        } else {
            None
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip bay a record is displayed in, derived from its status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Bay {
    Clearance,
    Ground,
    /// Runway bay, keyed by lowercase runway designator.
    Runway(String),
    Departure,
    Approach,
    Arrival,
}

impl Bay {
    /// Status to bay mapping. Runway-specific statuses land in the assigned
    /// runway's bay, or fall back when no runway is assigned.
    pub fn for_status(status: FlightStatus, runway: Option<&str>) -> Bay {
        let runway_bay = runway
            .filter(|r| !r.trim().is_empty())
            .map(|r| Bay::Runway(r.trim().to_lowercase()));
        match status {
            FlightStatus::Filed | FlightStatus::Active | FlightStatus::ClearanceDelivered => {
                Bay::Clearance
            }
            FlightStatus::PushApproved | FlightStatus::Taxiing => Bay::Ground,
            FlightStatus::Holding | FlightStatus::Lineup | FlightStatus::TakeoffCleared => {
                runway_bay.unwrap_or(Bay::Ground)
            }
            FlightStatus::FinalApproach => runway_bay.unwrap_or(Bay::Approach),
            FlightStatus::Departed => Bay::Departure,
            FlightStatus::InitialApproach => Bay::Approach,
            FlightStatus::Landed
            | FlightStatus::TaxiIn
            | FlightStatus::AtGate
            | FlightStatus::Completed => Bay::Arrival,
        }
    }
}

impl fmt::Display for Bay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bay::Clearance => f.write_str("clearance"),
            Bay::Ground => f.write_str("ground"),
            Bay::Runway(id) => write!(f, "rwy-{id}"),
            Bay::Departure => f.write_str("departure"),
            Bay::Approach => f.write_str("approach"),
            Bay::Arrival => f.write_str("arrival"),
        }
    }
}

impl FromStr for Bay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clearance" => Ok(Bay::Clearance),
            "ground" => Ok(Bay::Ground),
            "departure" => Ok(Bay::Departure),
            "approach" => Ok(Bay::Approach),
            "arrival" => Ok(Bay::Arrival),
            other => other
                .strip_prefix("rwy-")
                .filter(|id| !id.is_empty())
                .map(|id| Bay::Runway(id.to_lowercase()))
                .ok_or_else(|| format!("unknown bay '{other}'")),
        }
    }
}

impl From<Bay> for String {
    fn from(bay: Bay) -> Self {
        bay.to_string()
    }
}

impl TryFrom<String> for Bay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Clearance vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearanceType {
    Startup,
    Pushback,
    Taxi,
    HoldShort,
    Lineup,
    Takeoff,
    Landing,
    GoAround,
    Altitude,
    Heading,
    Speed,
    Direct,
    Hold,
}

/// A clearance issued to one flight.
///
/// Everything except the read-back flag is fixed at issue time; the flag can
/// only move from false to true, once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clearance {
    id: String,
    clearance_type: ClearanceType,
    value: String,
    issued_by: String,
    issued_at: DateTime<Utc>,
    readback_received: bool,
    expires_at: Option<DateTime<Utc>>,
}

impl Clearance {
    pub fn new(
        clearance_type: ClearanceType,
        value: impl Into<String>,
        issued_by: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            clearance_type,
            value: value.into(),
            issued_by: issued_by.into(),
            issued_at,
            readback_received: false,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn clearance_type(&self) -> ClearanceType {
        self.clearance_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_by(&self) -> &str {
        &self.issued_by
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn readback_received(&self) -> bool {
        self.readback_received
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Record the read-back. Returns false if it was already confirmed.
    pub fn confirm_readback(&mut self) -> bool {
        if self.readback_received {
            return false;
        }
        self.readback_received = true;
        true
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// Free-text controller note attached to a strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn new(
        content: impl Into<String>,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            symbol: None,
            created_by: created_by.into(),
            created_at,
        }
    }
}

/// The canonical flight record (one strip).
///
/// `status` only moves forward; use [`FlightRecord::transition_to`] or
/// [`FlightRecord::advance`]. The bay is derived from status and runway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub id: String,
    pub callsign: String,
    pub aircraft_type: String,
    pub wake_category: WakeCategory,
    pub squawk: String,
    pub departure: String,
    pub destination: String,
    pub cruise_altitude_ft: u32,
    pub route: String,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub star: Option<String>,
    #[serde(default)]
    pub runway: Option<String>,
    #[serde(default)]
    pub gate: Option<String>,
    status: FlightStatus,
    pub flight_rules: FlightRules,
    pub flight_type: FlightType,
    #[serde(default)]
    pub eobt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub eta: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tobt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tsat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ttot: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ctot: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    clearances: Vec<Clearance>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl FlightRecord {
    /// Create a bare record. Unset fields take neutral values.
    pub fn new(
        callsign: impl Into<String>,
        aircraft_type: impl Into<String>,
        status: FlightStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            callsign: callsign.into(),
            aircraft_type: aircraft_type.into(),
            wake_category: WakeCategory::default(),
            squawk: "2000".to_string(),
            departure: String::new(),
            destination: String::new(),
            cruise_altitude_ft: 0,
            route: String::new(),
            sid: None,
            star: None,
            runway: None,
            gate: None,
            status,
            flight_rules: FlightRules::default(),
            flight_type: FlightType::default(),
            eobt: None,
            eta: None,
            tobt: None,
            tsat: None,
            ttot: None,
            ctot: None,
            created_at: now,
            updated_at: now,
            clearances: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn status(&self) -> FlightStatus {
        self.status
    }

    pub fn bay(&self) -> Bay {
        Bay::for_status(self.status, self.runway.as_deref())
    }

    pub fn flow(&self) -> Option<StatusFlow> {
        self.status.flow()
    }

    /// Move to `next`, which must lie ahead of the current status.
    ///
    /// `Active` may enter either flow and any status may close out to
    /// `Completed`; everything else stays within its own flow.
    pub fn transition_to(
        &mut self,
        next: FlightStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let current = self.status;
        let allowed = match (current, next) {
            (FlightStatus::Completed, _) => false,
            (_, FlightStatus::Completed) => true,
            (FlightStatus::Active, n) => n.flow().is_some(),
            (c, n) => match (c.flow(), n.flow()) {
                (Some(cf), Some(nf)) if cf == nf => cf.position(n) > cf.position(c),
                _ => false,
            },
        };
        if !allowed {
            return Err(TransitionError {
                callsign: self.callsign.clone(),
                from: current,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Step one status forward within the current flow.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<FlightStatus> {
        let next = self.flow()?.next(self.status)?;
        self.status = next;
        self.updated_at = now;
        Some(next)
    }

    pub fn clearances(&self) -> &[Clearance] {
        &self.clearances
    }

    /// Append a clearance. Returns the stored copy.
    pub fn issue_clearance(&mut self, clearance: Clearance) -> &Clearance {
        self.updated_at = clearance.issued_at();
        self.clearances.push(clearance);
        &self.clearances[self.clearances.len() - 1]
    }

    /// Confirm read-back for a clearance on this record.
    ///
    /// `None` if no such clearance, otherwise whether the flag changed.
    pub fn confirm_readback(&mut self, clearance_id: &str, now: DateTime<Utc>) -> Option<bool> {
        let clearance = self.clearances.iter_mut().find(|c| c.id() == clearance_id)?;
        let changed = clearance.confirm_readback();
        if changed {
            self.updated_at = now;
        }
        Some(changed)
    }

    /// Most recent clearance of the given type.
    pub fn latest_clearance(&self, clearance_type: ClearanceType) -> Option<&Clearance> {
        self.clearances
            .iter()
            .rev()
            .find(|c| c.clearance_type() == clearance_type)
    }

    pub fn has_clearance(&self, clearance_type: ClearanceType) -> bool {
        self.latest_clearance(clearance_type).is_some()
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.updated_at = annotation.created_at;
        self.annotations.push(annotation);
    }
}
