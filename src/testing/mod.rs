//! Testing utilities and mock implementations
//!
//! Lets the monitor be exercised without an MQTT broker or a messaging gateway.

pub mod mocks;

pub use mocks::*;
