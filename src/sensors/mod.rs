//! Pump box analog sensing.
//!
//! [`PumpMonitor`] samples the motor current and water pressure 4–20 mA
//! channels through [`AnalogPort`], applies each channel's linear
//! calibration and paces how often the readings are published.

use log::warn;

use crate::app::ports::AnalogPort;
use crate::config::{ChannelCalibration, PumpConfig};
use crate::error::Result;
use crate::pump::limits::Measurements;

pub struct PumpMonitor {
    motor_current: ChannelCalibration,
    water_pressure: ChannelCalibration,
    publish_interval_ms: u64,
    last_publish_ms: Option<u64>,
    /// Last successful sample, for status queries.
    latest: Option<Measurements>,
}

impl PumpMonitor {
    pub fn new(
        motor_current: ChannelCalibration,
        water_pressure: ChannelCalibration,
        publish_interval_secs: u32,
    ) -> Self {
        Self {
            motor_current,
            water_pressure,
            publish_interval_ms: u64::from(publish_interval_secs) * 1000,
            last_publish_ms: None,
            latest: None,
        }
    }

    pub fn from_config(cfg: &PumpConfig) -> Self {
        Self::new(cfg.motor_current, cfg.water_pressure, cfg.publish_interval_secs)
    }

    /// Read both channels.  `pump_runtime_secs` is left at zero; the
    /// orchestrator owns the start time and fills it in.
    ///
    /// A failed read returns the I/O error and keeps the previous sample.
    pub fn sample(&mut self, analog: &mut impl AnalogPort) -> Result<Measurements> {
        let current_ma = analog
            .read_milliamps(self.motor_current.adc_channel)
            .inspect_err(|e| warn!("Motor current read failed: {}", e))?;
        let pressure_ma = analog
            .read_milliamps(self.water_pressure.adc_channel)
            .inspect_err(|e| warn!("Water pressure read failed: {}", e))?;

        let m = Measurements {
            motor_current_amps: self.motor_current.apply(current_ma),
            water_pressure_psi: self.water_pressure.apply(pressure_ma),
            pump_runtime_secs: 0.0,
        };
        self.latest = Some(m);
        Ok(m)
    }

    /// True at most once per publish interval; the first call always is.
    pub fn publish_due(&mut self, now_ms: u64) -> bool {
        let due = self
            .last_publish_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.publish_interval_ms);
        if due {
            self.last_publish_ms = Some(now_ms);
        }
        due
    }

    pub fn latest(&self) -> Option<Measurements> {
        self.latest
    }
}
