//! ValveBox controller library.
//!
//! Ball valve actuation with sensed end positions and travel timeouts, a
//! command dispatcher with a mid-transition interlock, and a pump
//! orchestrator that sequences its inlet valve, the motor contactor and
//! the safety limits.  Hardware is reached only through the port traits
//! in [`app::ports`]; [`adapters`] holds the concrete implementations.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pump;
pub mod sensors;
pub mod valve;

pub use error::{Error, Result};
