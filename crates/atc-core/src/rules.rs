//! Safety net rules and thresholds.

use serde::{Deserialize, Serialize};

/// Configuration for the safety net checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyNetRules {
    pub rimcas_enabled: bool,
    pub catc_enabled: bool,
    pub cmac_enabled: bool,
    /// Minimum safe altitude warning; threshold hook only
    pub msaw_enabled: bool,
    /// Short-term conflict alert; threshold hook only
    pub stca_enabled: bool,

    /// Distance from a runway centreline inside which a moving aircraft is
    /// considered to be approaching it (nm)
    pub rimcas_warning_nm: f64,
    /// Escalation distance for the same check (nm)
    pub rimcas_critical_nm: f64,
    /// Ground speed above which an aircraft is treated as moving (kt)
    pub moving_speed_kt: f64,

    /// Clearances older than this are ignored by CATC (seconds)
    pub catc_window_secs: i64,

    pub stca_horizontal_nm: f64,
    pub stca_vertical_ft: f64,
    pub stca_lookahead_secs: f64,
}

impl Default for SafetyNetRules {
    fn default() -> Self {
        Self {
            rimcas_enabled: true,
            catc_enabled: true,
            cmac_enabled: true,
            msaw_enabled: true,
            stca_enabled: true,
            rimcas_warning_nm: 1.5,
            rimcas_critical_nm: 0.5,
            moving_speed_kt: 5.0,
            catc_window_secs: 120,
            stca_horizontal_nm: 3.0,
            stca_vertical_ft: 1000.0,
            stca_lookahead_secs: 120.0,
        }
    }
}
