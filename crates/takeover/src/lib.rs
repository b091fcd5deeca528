//! Takeover Arbitration
//!
//! The decision half of the driver-monitoring loop:
//! - Autonomy modes and their explicit transition table
//! - Takeover-request urgency derived from driver state and speed
//! - Edge-triggered side effects attached to transition arcs
//! - Speed governor smoothing actual speed toward the target

pub mod arbitration;
pub mod banner;
pub mod config;
pub mod governor;
pub mod mode;

pub use arbitration::{ArbitrationEngine, ArbitrationState, Decision, Effect};
pub use banner::{banner, TakeoverBanner};
pub use config::{ArbitrationConfig, DistractionWarningPolicy, EmergencyContactConfig};
pub use governor::{GovernorConfig, SpeedGovernor, SpeedState};
pub use mode::{AutonomyMode, ModeTrigger, TakeoverUrgency, TRANSITIONS};

use dms::DmsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Arbitration error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArbitrationError {
    #[error("Speed {0} km/h is not a valid vehicle speed")]
    InvalidSpeed(f64),

    #[error("Transition {from} -> {to} denied: {reason}")]
    TransitionDenied {
        from: AutonomyMode,
        to: AutonomyMode,
        reason: String,
    },

    #[error("Driver state fusion failed: {0}")]
    Fusion(#[from] DmsError),
}

/// Emergency call details shown to the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContext {
    pub hospital_name: String,
    pub distance_label: String,
    pub contact_name: String,
    /// Set by arbitration only
    pub is_calling: bool,
}

impl EmergencyContext {
    pub fn new(contact: &EmergencyContactConfig, is_calling: bool) -> Self {
        Self {
            hospital_name: contact.hospital_name.clone(),
            distance_label: contact.distance_label.clone(),
            contact_name: contact.contact_name.clone(),
            is_calling,
        }
    }
}
