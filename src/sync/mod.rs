//! Synchronisation primitives used by the connection manager

pub mod gate;

pub use gate::{Gate, GateError, GateGuard};
