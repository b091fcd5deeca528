//! Takeover Session
//!
//! Owns every piece of core state (driver state, mode, speed, log) in one
//! [`Session`] and drives it from independently clocked loops:
//! - decision loop: state fusion then mode arbitration (300ms)
//! - speed loop: speed governor (50ms)
//! - sampling loop: pulls from a metrics source (500ms)

mod config;
mod runner;
mod session;

pub use config::{load_config, ScriptSegment, SessionConfig, SimulationConfig, ENV_PREFIX};
pub use runner::{RunningSession, SessionClock, SessionHandle, SessionRunner};
pub use session::{Session, SessionSnapshot, TickOutcome};

use takeover::ArbitrationError;
use thiserror::Error;

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Arbitration(#[from] ArbitrationError),
}
