//! ICAO flight plan message codec.
//!
//! Decodes and encodes the hyphen-delimited ATS message text (FPL, CHG, CNL,
//! DEP, ARR) using the item numbering of ICAO Doc 4444 Appendix 3:
//!
//! ```text
//! (FPL-KAL123-IS-B738/M-SDE2E3FGHIJ1RWY/LB1-RKSI0900-N0450F350 DCT-RJTT0200 RJAA-DOF/250101)
//!      7      8  9      10                13       15             16             18
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::models::{FlightRules, FlightType, WakeCategory};

/// ATS message type (item 3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// Filed flight plan
    #[default]
    Fpl,
    /// Modification
    Chg,
    /// Cancellation
    Cnl,
    /// Departure report
    Dep,
    /// Arrival report
    Arr,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Fpl => "FPL",
            MessageKind::Chg => "CHG",
            MessageKind::Cnl => "CNL",
            MessageKind::Dep => "DEP",
            MessageKind::Arr => "ARR",
        }
    }

    /// FPL and CHG carry the full item layout; the others are short forms.
    fn has_full_layout(self) -> bool {
        matches!(self, MessageKind::Fpl | MessageKind::Chg)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FPL" => Ok(MessageKind::Fpl),
            "CHG" => Ok(MessageKind::Chg),
            "CNL" => Ok(MessageKind::Cnl),
            "DEP" => Ok(MessageKind::Dep),
            "ARR" => Ok(MessageKind::Arr),
            other => Err(ParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Decoded flight plan message.
///
/// Single-letter codes are kept as received so that [`validate`] can report
/// bad values; use the typed accessors for downstream logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightPlanMessage {
    pub kind: MessageKind,
    /// Item 7 aircraft identification.
    pub callsign: String,
    /// Item 8 flight rules (I, V, Y, Z).
    pub flight_rules: char,
    /// Item 8 type of flight (S, N, G, M, X).
    pub flight_type: char,
    /// Item 9.
    pub aircraft_count: u32,
    pub aircraft_type: String,
    pub wake_category: char,
    /// Item 10 equipment / surveillance.
    pub equipment: String,
    pub surveillance: String,
    /// Item 13. DEP messages carry the actual time of departure in `eobt`.
    pub departure: String,
    pub eobt: String,
    /// Item 15.
    pub cruise_speed: String,
    pub cruise_level: String,
    pub route: String,
    /// Item 16. ARR messages carry the actual time of arrival in `eet`.
    pub destination: String,
    pub eet: String,
    pub alternates: Vec<String>,
    /// Item 18 indicator/value pairs.
    pub other_info: BTreeMap<String, String>,
}

impl Default for FlightPlanMessage {
    fn default() -> Self {
        Self {
            kind: MessageKind::Fpl,
            callsign: String::new(),
            flight_rules: 'I',
            flight_type: 'S',
            aircraft_count: 1,
            aircraft_type: String::new(),
            wake_category: 'M',
            equipment: String::new(),
            surveillance: String::new(),
            departure: String::new(),
            eobt: String::new(),
            cruise_speed: String::new(),
            cruise_level: String::new(),
            route: String::new(),
            destination: String::new(),
            eet: String::new(),
            alternates: Vec::new(),
            other_info: BTreeMap::new(),
        }
    }
}

impl FlightPlanMessage {
    /// Wake category, Medium when the code is not recognised.
    pub fn wake(&self) -> WakeCategory {
        WakeCategory::from_code(self.wake_category).unwrap_or_default()
    }

    pub fn rules(&self) -> FlightRules {
        FlightRules::from_code(self.flight_rules).unwrap_or_default()
    }

    pub fn flight_kind(&self) -> FlightType {
        FlightType::from_code(self.flight_type).unwrap_or_default()
    }
}

/// Semantic problem in a decoded plan. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "defect", rename_all = "snake_case")]
pub enum ValidationDefect {
    MissingCallsign,
    /// Aircraft identification shorter than two characters.
    InvalidCallsign { callsign: String },
    MissingAircraftType,
    InvalidDepartureAerodrome { code: String },
    InvalidDestinationAerodrome { code: String },
    InvalidFlightRules { code: char },
    InvalidFlightType { code: char },
    InvalidWakeCategory { code: char },
}

impl fmt::Display for ValidationDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationDefect::MissingCallsign => f.write_str("missing aircraft identification"),
            ValidationDefect::InvalidCallsign { callsign } => {
                write!(f, "aircraft identification '{callsign}' is too short")
            }
            ValidationDefect::MissingAircraftType => f.write_str("missing aircraft type"),
            ValidationDefect::InvalidDepartureAerodrome { code } => {
                write!(f, "invalid departure aerodrome '{code}'")
            }
            ValidationDefect::InvalidDestinationAerodrome { code } => {
                write!(f, "invalid destination aerodrome '{code}'")
            }
            ValidationDefect::InvalidFlightRules { code } => {
                write!(f, "invalid flight rules '{code}'")
            }
            ValidationDefect::InvalidFlightType { code } => {
                write!(f, "invalid type of flight '{code}'")
            }
            ValidationDefect::InvalidWakeCategory { code } => {
                write!(f, "invalid wake turbulence category '{code}'")
            }
        }
    }
}

/// Decode a flight plan message.
pub fn parse(message: &str) -> Result<FlightPlanMessage, ParseError> {
    let normalized = normalize(message);
    let body = normalized.strip_prefix('(').unwrap_or(&normalized);
    let body = body.strip_suffix(')').unwrap_or(body).trim();
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    let fields = split_fields(body);
    let head = fields.first().map(String::as_str).unwrap_or_default();
    // Item 3 may carry a message number after a slash.
    let kind: MessageKind = head.split('/').next().unwrap_or_default().parse()?;
    let field = |idx: usize| fields.get(idx).map(String::as_str).unwrap_or("");

    let mut plan = FlightPlanMessage {
        kind,
        callsign: field(1).split('/').next().unwrap_or_default().to_string(),
        ..Default::default()
    };

    if kind.has_full_layout() {
        parse_rules_and_type(field(2), &mut plan);
        parse_aircraft(field(3), &mut plan);
        parse_equipment(field(4), &mut plan);
        (plan.departure, plan.eobt) = split_location_time(field(5));
        parse_speed_level_route(field(6), &mut plan);
        parse_destination(field(7), &mut plan);
        plan.other_info = parse_other_info(field(8));
    } else {
        (plan.departure, plan.eobt) = split_location_time(field(2));
        parse_destination(field(3), &mut plan);
    }

    if plan.callsign.is_empty() {
        return Err(ParseError::MissingField {
            kind,
            field: "aircraft identification",
        });
    }
    Ok(plan)
}

/// Encode a plan in the field layout of its message kind.
pub fn generate(plan: &FlightPlanMessage) -> String {
    let mut fields = vec![plan.kind.as_str().to_string(), plan.callsign.clone()];

    if plan.kind.has_full_layout() {
        fields.push(format!("{}{}", plan.flight_rules, plan.flight_type));

        let count = if plan.aircraft_count > 1 {
            plan.aircraft_count.to_string()
        } else {
            String::new()
        };
        fields.push(format!("{count}{}/{}", plan.aircraft_type, plan.wake_category));
        fields.push(format!("{}/{}", plan.equipment, plan.surveillance));
        fields.push(format!("{}{}", plan.departure, plan.eobt));

        let mut item15 = format!("{}{}", plan.cruise_speed, plan.cruise_level);
        if !plan.route.is_empty() {
            item15.push(' ');
            item15.push_str(&plan.route);
        }
        fields.push(item15);
        fields.push(destination_field(plan));

        if !plan.other_info.is_empty() {
            let item18 = plan
                .other_info
                .iter()
                .map(|(key, value)| format!("{key}/{value}"))
                .collect::<Vec<_>>()
                .join(" ");
            fields.push(item18);
        }
    } else {
        fields.push(format!("{}{}", plan.departure, plan.eobt));
        fields.push(destination_field(plan));
    }

    format!("({})", fields.join("-"))
}

/// List semantic defects without rejecting the plan.
pub fn validate(plan: &FlightPlanMessage) -> Vec<ValidationDefect> {
    let mut defects = Vec::new();

    match plan.callsign.chars().count() {
        0 => defects.push(ValidationDefect::MissingCallsign),
        1 => defects.push(ValidationDefect::InvalidCallsign {
            callsign: plan.callsign.clone(),
        }),
        _ => {}
    }
    if !is_location_indicator(&plan.departure) {
        defects.push(ValidationDefect::InvalidDepartureAerodrome {
            code: plan.departure.clone(),
        });
    }
    if !is_location_indicator(&plan.destination) {
        defects.push(ValidationDefect::InvalidDestinationAerodrome {
            code: plan.destination.clone(),
        });
    }

    if plan.kind.has_full_layout() {
        if plan.aircraft_type.is_empty() {
            defects.push(ValidationDefect::MissingAircraftType);
        }
        if FlightRules::from_code(plan.flight_rules).is_none() {
            defects.push(ValidationDefect::InvalidFlightRules {
                code: plan.flight_rules,
            });
        }
        if FlightType::from_code(plan.flight_type).is_none() {
            defects.push(ValidationDefect::InvalidFlightType {
                code: plan.flight_type,
            });
        }
        if WakeCategory::from_code(plan.wake_category).is_none() {
            defects.push(ValidationDefect::InvalidWakeCategory {
                code: plan.wake_category,
            });
        }
    }

    defects
}

fn normalize(message: &str) -> String {
    message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
        .replace("( ", "(")
        .replace(" )", ")")
        .replace("- ", "-")
        .replace(" -", "-")
}

/// Split on hyphens that are not nested inside parentheses.
fn split_fields(body: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for ch in body.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            '-' if depth == 0 => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        fields.push(current.trim().to_string());
    }
    fields
}

fn parse_rules_and_type(field: &str, plan: &mut FlightPlanMessage) {
    let mut chars = field.chars();
    if let Some(rules) = chars.next() {
        plan.flight_rules = rules;
    }
    if let Some(kind) = chars.next() {
        plan.flight_type = kind;
    }
}

fn parse_aircraft(field: &str, plan: &mut FlightPlanMessage) {
    let (type_part, wake) = match field.split_once('/') {
        Some((type_part, wake)) => (type_part, wake.chars().next()),
        None => (field, None),
    };

    let digits = type_part.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && digits < type_part.len() {
        plan.aircraft_count = type_part[..digits].parse().unwrap_or(1);
        plan.aircraft_type = type_part[digits..].to_string();
    } else {
        plan.aircraft_type = type_part.to_string();
    }

    if let Some(wake) = wake {
        plan.wake_category = wake;
    }
}

fn parse_equipment(field: &str, plan: &mut FlightPlanMessage) {
    match field.split_once('/') {
        Some((equipment, surveillance)) => {
            plan.equipment = equipment.to_string();
            plan.surveillance = surveillance.to_string();
        }
        None => plan.equipment = field.to_string(),
    }
}

/// `RKSI0900` -> (`RKSI`, `0900`). The time group starts at the first digit.
fn split_location_time(field: &str) -> (String, String) {
    let token = field.split_whitespace().next().unwrap_or_default();
    match token.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => (token[..idx].to_string(), token[idx..].to_string()),
        None => (token.to_string(), String::new()),
    }
}

fn parse_speed_level_route(field: &str, plan: &mut FlightPlanMessage) {
    let (head, route) = field.split_once(' ').unwrap_or((field, ""));
    plan.route = route.trim().to_string();

    // N0450 / K0830 knots or km/h, M082 mach
    let speed_len = match head.chars().next() {
        Some('N') | Some('K') => 5,
        Some('M') => 4,
        _ => 0,
    };
    let is_speed = speed_len > 0
        && head
            .get(1..speed_len)
            .is_some_and(|digits| digits.chars().all(|c| c.is_ascii_digit()));

    if is_speed {
        plan.cruise_speed = head[..speed_len].to_string();
        plan.cruise_level = head[speed_len..].to_string();
    } else {
        plan.cruise_level = head.to_string();
    }
}

fn parse_destination(field: &str, plan: &mut FlightPlanMessage) {
    let mut tokens = field.split_whitespace();
    (plan.destination, plan.eet) = split_location_time(tokens.next().unwrap_or_default());
    plan.alternates = tokens.map(str::to_string).collect();
}

fn destination_field(plan: &FlightPlanMessage) -> String {
    let mut field = format!("{}{}", plan.destination, plan.eet);
    for alternate in &plan.alternates {
        field.push(' ');
        field.push_str(alternate);
    }
    field
}

/// Item 18: `DOF/250101 RMK/TCAS EQUIPPED`. Words without an indicator
/// continue the previous value.
fn parse_other_info(field: &str) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    if field.trim() == "0" {
        return info;
    }

    let mut current: Option<String> = None;
    for word in field.split_whitespace() {
        match word.split_once('/') {
            Some((key, value)) if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphabetic()) => {
                info.insert(key.to_string(), value.to_string());
                current = Some(key.to_string());
            }
            _ => {
                let Some(key) = current.as_ref() else {
                    continue;
                };
                if let Some(value) = info.get_mut(key) {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(word);
                }
            }
        }
    }
    info
}

fn is_location_indicator(code: &str) -> bool {
    code.len() == 4 && code.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "(FPL-KAL123-IS-B738/M-SDE2E3FGHIJ1RWY/LB1-RKSI0900-N0450F350 DCT BOPTA Y711 DCT-RJTT0200 RJAA-DOF/250101 RMK/TCAS EQUIPPED)";

    #[test]
    fn parses_filed_plan_items() {
        let plan = parse(SAMPLE).unwrap();
        assert_eq!(plan.kind, MessageKind::Fpl);
        assert_eq!(plan.callsign, "KAL123");
        assert_eq!(plan.rules(), FlightRules::Ifr);
        assert_eq!(plan.flight_kind(), FlightType::Scheduled);
        assert_eq!(plan.aircraft_type, "B738");
        assert_eq!(plan.wake(), WakeCategory::Medium);
        assert_eq!(plan.equipment, "SDE2E3FGHIJ1RWY");
        assert_eq!(plan.surveillance, "LB1");
        assert_eq!(plan.departure, "RKSI");
        assert_eq!(plan.eobt, "0900");
        assert_eq!(plan.cruise_speed, "N0450");
        assert_eq!(plan.cruise_level, "F350");
        assert_eq!(plan.route, "DCT BOPTA Y711 DCT");
        assert_eq!(plan.destination, "RJTT");
        assert_eq!(plan.eet, "0200");
        assert_eq!(plan.alternates, vec!["RJAA".to_string()]);
        assert_eq!(plan.other_info.get("DOF").map(String::as_str), Some("250101"));
        assert_eq!(plan.other_info.get("RMK").map(String::as_str), Some("TCAS EQUIPPED"));
        assert!(validate(&plan).is_empty());
    }

    #[test]
    fn normalizes_whitespace_and_case() {
        let plan = parse("  ( fpl - kal123 -IS\n- 2b738/h -S/C- rksi0900 -n0450f350  dct- rjtt0200 )").unwrap();
        assert_eq!(plan.callsign, "KAL123");
        assert_eq!(plan.aircraft_count, 2);
        assert_eq!(plan.aircraft_type, "B738");
        assert_eq!(plan.wake(), WakeCategory::Heavy);
        assert_eq!(plan.route, "DCT");
    }

    #[test]
    fn hyphen_inside_parentheses_is_not_a_separator() {
        let fields = split_fields("FPL-ABC1-IS-RMK/(A-B)-X");
        assert_eq!(fields, vec!["FPL", "ABC1", "IS", "RMK/(A-B)", "X"]);
    }

    #[test]
    fn missing_wake_defaults_to_medium() {
        let plan = parse("(FPL-AAR101-IS-A321-S/C-RKSI1000-N0440F330 DCT-RKPC0100)").unwrap();
        assert_eq!(plan.aircraft_type, "A321");
        assert_eq!(plan.wake(), WakeCategory::Medium);
    }

    #[test]
    fn rejects_unknown_kind_and_empty_input() {
        assert_eq!(
            parse("(XYZ-KAL123-IS)"),
            Err(ParseError::UnknownKind("XYZ".to_string()))
        );
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(parse("()"), Err(ParseError::Empty));
    }

    #[test]
    fn rejects_missing_callsign() {
        assert!(matches!(
            parse("(FPL--IS-B738/M)"),
            Err(ParseError::MissingField { kind: MessageKind::Fpl, .. })
        ));
    }

    #[test]
    fn parses_short_form_messages() {
        let dep = parse("(DEP-KAL123-RKSI0912-RJTT)").unwrap();
        assert_eq!(dep.kind, MessageKind::Dep);
        assert_eq!((dep.departure.as_str(), dep.eobt.as_str()), ("RKSI", "0912"));
        assert_eq!(dep.destination, "RJTT");

        let arr = parse("(ARR-KAL123-RKSI-RJTT1105)").unwrap();
        assert_eq!(arr.destination, "RJTT");
        assert_eq!(arr.eet, "1105");

        let cnl = parse("(CNL-KAL123-RKSI0900-RJTT)").unwrap();
        assert_eq!(cnl.kind, MessageKind::Cnl);
        assert_eq!(cnl.callsign, "KAL123");
    }

    #[test]
    fn generate_then_parse_preserves_populated_fields() {
        let mut other_info = BTreeMap::new();
        other_info.insert("DOF".to_string(), "250101".to_string());
        other_info.insert("RMK".to_string(), "NEW CREW".to_string());
        let plan = FlightPlanMessage {
            kind: MessageKind::Chg,
            callsign: "AAR7".into(),
            flight_rules: 'Y',
            flight_type: 'N',
            aircraft_count: 3,
            aircraft_type: "A359".into(),
            wake_category: 'H',
            equipment: "SDFG".into(),
            surveillance: "".into(),
            departure: "RKSI".into(),
            eobt: "2330".into(),
            cruise_speed: "M084".into(),
            cruise_level: "F390".into(),
            route: "DCT REBIT DCT".into(),
            destination: "KLAX".into(),
            eet: "1055".into(),
            alternates: vec!["KSFO".into(), "KONT".into()],
            other_info,
        };
        assert_eq!(parse(&generate(&plan)).unwrap(), plan);

        let dep = FlightPlanMessage {
            kind: MessageKind::Dep,
            callsign: "JNA501".into(),
            departure: "RKSI".into(),
            eobt: "0815".into(),
            destination: "RKPK".into(),
            ..Default::default()
        };
        assert_eq!(parse(&generate(&dep)).unwrap(), dep);
    }

    #[test]
    fn validate_reports_defects_without_rejecting() {
        let plan = FlightPlanMessage {
            callsign: "TEST1".into(),
            aircraft_type: "".into(),
            flight_rules: 'Q',
            wake_category: 'X',
            departure: "RKS".into(),
            destination: "".into(),
            ..Default::default()
        };
        let defects = validate(&plan);
        assert!(defects.contains(&ValidationDefect::MissingAircraftType));
        assert!(defects.contains(&ValidationDefect::InvalidFlightRules { code: 'Q' }));
        assert!(defects.contains(&ValidationDefect::InvalidWakeCategory { code: 'X' }));
        assert!(defects.contains(&ValidationDefect::InvalidDepartureAerodrome { code: "RKS".into() }));
        assert!(defects.contains(&ValidationDefect::InvalidDestinationAerodrome { code: "".into() }));
        assert_eq!(plan.wake(), WakeCategory::Medium);
    }

    #[test]
    fn single_character_callsign_is_flagged() {
        let plan = parse("(FPL-K-IS-B738/M-S/C-RKSI0900-N0450F350 DCT-RJTT0200)").unwrap();
        let defects = validate(&plan);
        assert_eq!(
            defects,
            vec![ValidationDefect::InvalidCallsign {
                callsign: "K".into()
            }]
        );

        let plan = parse("(FPL-KA-IS-B738/M-S/C-RKSI0900-N0450F350 DCT-RJTT0200)").unwrap();
        assert!(validate(&plan).is_empty());
    }
}
