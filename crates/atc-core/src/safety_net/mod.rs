//! Safety net engine.
//!
//! Runs the surface safety nets over a traffic snapshot:
//!
//! - RIMCAS: runway incursion monitoring
//! - CATC: conflicting ATC clearances
//! - CMAC: conformance monitoring
//!
//! MSAW and STCA exist as rule switches and thresholds only.
//!
//! Alerts are deduplicated on (type, sorted callsigns, runway). A key that is
//! already active is not raised again; its severity and message are
//! refreshed instead. Alerts stay active until resolved explicitly.

pub mod catc;
pub mod cmac;
pub mod rimcas;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::airport::Runway;
use crate::models::{FlightRecord, Position};
use crate::rules::SafetyNetRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertType {
    Rimcas,
    Catc,
    Cmac,
    Msaw,
    Stca,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Caution,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub by: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub involved_callsigns: Vec<String>,
    pub runway: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged: Option<Acknowledgement>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub alert_type: AlertType,
    pub callsigns: Vec<String>,
    pub runway: Option<String>,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        involved_callsigns: Vec<String>,
        runway: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alert_type,
            severity,
            message: message.into(),
            involved_callsigns,
            runway,
            created_at: now,
            acknowledged: None,
            resolved: false,
            resolved_at: None,
        }
    }

    pub fn key(&self) -> AlertKey {
        let mut callsigns = self.involved_callsigns.clone();
        callsigns.sort();
        callsigns.dedup();
        AlertKey {
            alert_type: self.alert_type,
            callsigns,
            runway: self.runway.clone(),
        }
    }
}

/// Ground position report for one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfacePosition {
    pub flight_id: String,
    pub callsign: String,
    pub position: Position,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default)]
    pub ground_speed_kt: f64,
    #[serde(default)]
    pub taxiway: Option<String>,
    /// Runway the aircraft is on, if any.
    #[serde(default)]
    pub runway: Option<String>,
    #[serde(default)]
    pub on_runway: bool,
}

pub type AlertCallback = Box<dyn Fn(&Alert) + Send + Sync>;

/// Stateful alert deduplication around the stateless checks.
#[derive(Default)]
pub struct SafetyNetEngine {
    rules: SafetyNetRules,
    active: HashMap<AlertKey, Alert>,
    raised: Vec<Alert>,
    resolved: Vec<Alert>,
    on_alert: Option<AlertCallback>,
    on_resolve: Option<AlertCallback>,
}

impl SafetyNetEngine {
    pub fn new(rules: SafetyNetRules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn rules(&self) -> &SafetyNetRules {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: SafetyNetRules) {
        self.rules = rules;
    }

    /// Called once for every newly raised alert.
    pub fn on_alert(&mut self, callback: impl Fn(&Alert) + Send + Sync + 'static) {
        self.on_alert = Some(Box::new(callback));
    }

    /// Called once for every resolved alert.
    pub fn on_resolve(&mut self, callback: impl Fn(&Alert) + Send + Sync + 'static) {
        self.on_resolve = Some(Box::new(callback));
    }

    /// Run every enabled check and return the alerts raised by this pass.
    ///
    /// # Arguments
    /// * `flights` - Traffic snapshot
    /// * `positions` - Latest surface position per aircraft
    /// * `runways` - Runway geometry and status
    /// * `now` - Evaluation time (alert timestamps, CATC window)
    pub fn check_all(
        &mut self,
        flights: &[FlightRecord],
        positions: &[SurfacePosition],
        runways: &[Runway],
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut candidates = Vec::new();
        if self.rules.rimcas_enabled {
            candidates.extend(rimcas::check(&self.rules, flights, positions, runways, now));
        }
        if self.rules.catc_enabled {
            candidates.extend(catc::check(&self.rules, flights, runways, now));
        }
        if self.rules.cmac_enabled {
            candidates.extend(cmac::check(&self.rules, flights, positions, now));
        }

        let mut raised = Vec::new();
        for candidate in candidates {
            let key = candidate.key();
            if let Some(existing) = self.active.get_mut(&key) {
                existing.severity = candidate.severity;
                existing.message = candidate.message;
                continue;
            }

            if candidate.severity == AlertSeverity::Critical {
                tracing::error!("{:?} alert: {}", candidate.alert_type, candidate.message);
            } else {
                tracing::warn!("{:?} alert: {}", candidate.alert_type, candidate.message);
            }
            if let Some(callback) = &self.on_alert {
                callback(&candidate);
            }
            self.active.insert(key, candidate.clone());
            self.raised.push(candidate.clone());
            raised.push(candidate);
        }
        raised
    }

    /// Resolve an active alert by id.
    pub fn resolve(&mut self, alert_id: &str, now: DateTime<Utc>) -> Option<Alert> {
        let key = self
            .active
            .iter()
            .find(|(_, alert)| alert.id == alert_id)
            .map(|(key, _)| key.clone())?;
        let mut alert = self.active.remove(&key)?;
        alert.resolved = true;
        alert.resolved_at = Some(now);

        tracing::info!("Alert {} resolved: {}", alert.id, alert.message);
        if let Some(callback) = &self.on_resolve {
            callback(&alert);
        }
        self.resolved.push(alert.clone());
        Some(alert)
    }

    pub fn acknowledge(
        &mut self,
        alert_id: &str,
        by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<&Alert> {
        let alert = self.active.values_mut().find(|a| a.id == alert_id)?;
        alert.acknowledged = Some(Acknowledgement {
            by: by.into(),
            at: now,
        });
        Some(alert)
    }

    /// Active alerts, oldest first.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<_> = self.active.values().cloned().collect();
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        alerts
    }

    pub fn get(&self, alert_id: &str) -> Option<&Alert> {
        self.active.values().find(|a| a.id == alert_id)
    }

    /// Alerts raised since the previous call.
    pub fn take_new_alerts(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.raised)
    }

    /// Alerts resolved since the previous call.
    pub fn take_resolved_alerts(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.resolved)
    }

    /// Forget all active alerts without resolving them.
    pub fn clear(&mut self) {
        self.active.clear();
    }
}
