//! Application core: valve fleet, pump orchestration and bus routing.
//!
//! Nothing here touches hardware directly. Pins, analog inputs, time and the
//! outbound bus all go through the **port traits** in [`ports`], so the whole
//! core runs against mocks in tests and against the simulated plant in the
//! binary.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
