//! Connection-management engine
//!
//! - [`state`] - Published connection snapshots and their comparison
//! - [`dialer`] - Retrying, gate-serialised dial procedure
//! - [`manager`] - The façade callers use, plus its filter and dial workers

pub mod dialer;
pub mod manager;
pub mod state;

pub use dialer::{DialError, Dialer};
pub use manager::{ConnectionHandle, ConnectionManager};
pub use state::{ConnectionState, StateError, StateErrorKind};
