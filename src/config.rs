//! System configuration parameters
//!
//! All tunable parameters for a valve box / pump box.  Loaded through a
//! [`ConfigPort`](crate::app::ports::ConfigPort) at startup; the defaults
//! describe the installed rain-barrel pump hardware.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pump::limits::{Quantity, Threshold};
use crate::valve::{SensePolarity, ValvePins};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Service loop period (milliseconds)
    pub loop_interval_ms: u32,
    /// Prefix for every subscribed and published topic
    pub base_topic: String,
    /// Independently commanded valves (valve box)
    pub valves: Vec<ValveConfig>,
    /// Pump with its own inlet valve (pump box); `None` on a valve-only box
    pub pump: Option<PumpConfig>,
}

/// One ball valve: sense inputs, drive outputs and travel timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValveConfig {
    pub name: String,
    pub open_pin: u8,
    pub close_pin: u8,
    pub direction_pin: u8,
    pub enable_pin: u8,
    /// Seconds allowed for a full open or close stroke
    pub transition_timeout_secs: u32,
    #[serde(default)]
    pub sense_polarity: SensePolarity,
}

impl ValveConfig {
    pub fn pins(&self) -> ValvePins {
        ValvePins {
            open_sense: self.open_pin,
            close_sense: self.close_pin,
            direction: self.direction_pin,
            enable: self.enable_pin,
        }
    }
}

/// Direction + enable outputs of the motor contactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactorConfig {
    pub direction_pin: u8,
    pub enable_pin: u8,
}

/// Linear conversion of a 4–20 mA channel to engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelCalibration {
    pub adc_channel: u8,
    pub scale: f32,
    pub offset: f32,
}

impl ChannelCalibration {
    pub fn apply(&self, raw: f32) -> f32 {
        self.scale * raw + self.offset
    }
}

/// One configured safety limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    pub name: String,
    /// Measurement selector: `motor_current_amps`, `water_pressure_psi`
    /// or `pump_runtime_secs`.
    pub measurement: String,
    pub threshold: Threshold,
    #[serde(default = "default_true")]
    pub shutdown_on_error: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpConfig {
    pub valve: ValveConfig,
    pub motor_contactor: ContactorConfig,
    pub motor_current: ChannelCalibration,
    pub water_pressure: ChannelCalibration,
    pub limits: Vec<LimitConfig>,
    /// Minimum spacing between measurement publications (seconds)
    pub publish_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: 100, // 10 Hz
            base_topic: "/RainBarrelPump".into(),
            valves: vec![
                ValveConfig {
                    name: "valve_1".into(),
                    open_pin: 0,
                    close_pin: 1,
                    direction_pin: 8,
                    enable_pin: 9,
                    transition_timeout_secs: 20,
                    sense_polarity: SensePolarity::ActiveLow,
                },
                ValveConfig {
                    name: "valve_2".into(),
                    open_pin: 2,
                    close_pin: 3,
                    direction_pin: 12,
                    enable_pin: 13,
                    transition_timeout_secs: 20,
                    sense_polarity: SensePolarity::ActiveLow,
                },
            ],
            pump: Some(PumpConfig::default()),
        }
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            valve: ValveConfig {
                name: "pump_valve".into(),
                open_pin: 4,
                close_pin: 5,
                direction_pin: 14,
                enable_pin: 15,
                transition_timeout_secs: 20,
                sense_polarity: SensePolarity::ActiveLow,
            },
            motor_contactor: ContactorConfig {
                direction_pin: 10,
                enable_pin: 11,
            },
            motor_current: ChannelCalibration {
                adc_channel: 0,
                scale: 4.25,
                offset: 0.0,
            },
            water_pressure: ChannelCalibration {
                adc_channel: 1,
                scale: 25.143,
                offset: -13.829,
            },
            limits: vec![
                LimitConfig {
                    name: "max_motor_current".into(),
                    measurement: "motor_current_amps".into(),
                    threshold: Threshold::Above(10.0),
                    shutdown_on_error: true,
                },
                LimitConfig {
                    name: "max_motor_runtime".into(),
                    measurement: "pump_runtime_secs".into(),
                    threshold: Threshold::Above(1200.0),
                    shutdown_on_error: true,
                },
            ],
            publish_interval_secs: 5,
        }
    }
}

impl SystemConfig {
    /// Every valve, pump valve included.
    pub fn all_valves(&self) -> impl Iterator<Item = &ValveConfig> {
        self.valves.iter().chain(self.pump.iter().map(|p| &p.valve))
    }

    /// Reject configurations the controller cannot run safely.
    pub fn validate(&self) -> Result<()> {
        if self.loop_interval_ms == 0 {
            return Err(Error::Config("loop_interval_ms must be non-zero"));
        }

        let mut names: Vec<&str> = Vec::new();
        let mut outputs: Vec<u8> = Vec::new();
        for v in self.all_valves() {
            if v.name.trim().is_empty() {
                return Err(Error::Config("valve name must not be empty"));
            }
            if v.name.contains('/') {
                return Err(Error::Config("valve name must not contain '/'"));
            }
            if names.contains(&v.name.as_str()) {
                return Err(Error::Config("duplicate valve name"));
            }
            names.push(&v.name);
            if v.transition_timeout_secs == 0 {
                return Err(Error::Config("transition_timeout_secs must be non-zero"));
            }
            if v.open_pin == v.close_pin {
                return Err(Error::Config("open and close sense pins must differ"));
            }
            outputs.extend([v.direction_pin, v.enable_pin]);
        }

        if let Some(pump) = &self.pump {
            let c = pump.motor_contactor;
            outputs.extend([c.direction_pin, c.enable_pin]);
            for limit in &pump.limits {
                limit.measurement.parse::<Quantity>()?;
            }
        }

        let mut sorted = outputs.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != outputs.len() {
            return Err(Error::Config("output pin assigned twice"));
        }
        Ok(())
    }
}
