//! Takeover banner text for the presentation layer

use serde::Serialize;

use crate::mode::{AutonomyMode, TakeoverUrgency};

/// Headline and caption of the takeover overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TakeoverBanner {
    pub headline: &'static str,
    pub caption: &'static str,
}

/// Banner for the current mode and urgency, `None` when nothing is shown
pub fn banner(mode: AutonomyMode, urgency: TakeoverUrgency) -> Option<TakeoverBanner> {
    let headline = match (mode, urgency) {
        (AutonomyMode::EmergencyControl, _) => "AI EMERGENCY CONTROL ACTIVE",
        (_, TakeoverUrgency::High) => "IMMEDIATE TAKEOVER REQUIRED!",
        (_, TakeoverUrgency::Medium) => "ATTENTION REQUIRED",
        _ => return None,
    };

    let caption = if urgency == TakeoverUrgency::High {
        "Please place your hands on the steering wheel immediately."
    } else {
        "Driver attention required to maintain cruise levels."
    };

    Some(TakeoverBanner { headline, caption })
}
