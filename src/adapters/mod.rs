//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements                  | Connects to                 |
//! |---------------|-----------------------------|-----------------------------|
//! | `log_sink`    | EventSink                   | `log` facade (console)      |
//! | `time`        | Clock                       | `std::time::Instant`        |
//! | `json_config` | ConfigPort                  | JSON file on disk           |
//! | `pin_bank`    | DigitalIoPort               | embedded-hal 1.0 pins       |
//! | `sim`         | DigitalIoPort + AnalogPort  | simulated valves and motor  |

pub mod json_config;
pub mod log_sink;
pub mod pin_bank;
pub mod sim;
pub mod time;
