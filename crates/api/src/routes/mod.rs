//! API Routes

pub mod control;
pub mod logs;
pub mod session;
