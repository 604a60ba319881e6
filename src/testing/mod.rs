//! Testing utilities and mock implementations
//!
//! Mock transport driver for exercising the connection manager without a
//! broker.

pub mod mocks;

pub use mocks::*;
