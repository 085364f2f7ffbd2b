//! Simulated plant for host runs.
//!
//! Models every configured valve as a ball that travels between closed
//! (0.0) and open (1.0) while its drive is enabled, and the pump motor as
//! a fixed load while the contactor is energised.  Limit switches are
//! reported with each valve's configured polarity and analog channels as
//! raw 4–20 mA loop currents, so the core runs unmodified against it.

use crate::app::ports::{AnalogPort, DigitalIoPort};
use crate::config::{ChannelCalibration, ContactorConfig, SystemConfig};
use crate::error::IoError;
use crate::valve::{DriveState, SensePolarity, ValvePins};

struct SimValve {
    pins: ValvePins,
    polarity: SensePolarity,
    /// 0.0 = fully closed, 1.0 = fully open.
    travel: f32,
    drive: DriveState,
    stuck: bool,
}

struct SimMotor {
    contactor: ContactorConfig,
    current: ChannelCalibration,
    pressure: ChannelCalibration,
    energized: bool,
    running_amps: f32,
    running_psi: f32,
}

pub struct SimulatedPlant {
    valves: Vec<(String, SimValve)>,
    motor: Option<SimMotor>,
    travel_ms: u64,
}

impl SimulatedPlant {
    /// Every valve starts closed; `travel_ms` is a full stroke.
    pub fn new(config: &SystemConfig, travel_ms: u64) -> Self {
        let valves = config
            .all_valves()
            .map(|v| {
                (
                    v.name.clone(),
                    SimValve {
                        pins: v.pins(),
                        polarity: v.sense_polarity,
                        travel: 0.0,
                        drive: DriveState::None,
                        stuck: false,
                    },
                )
            })
            .collect();
        let motor = config.pump.as_ref().map(|p| SimMotor {
            contactor: p.motor_contactor,
            current: p.motor_current,
            pressure: p.water_pressure,
            energized: false,
            running_amps: 6.0,
            running_psi: 40.0,
        });
        Self {
            valves,
            motor,
            travel_ms: travel_ms.max(1),
        }
    }

    /// Move every driven valve by `elapsed_ms` worth of travel.
    pub fn step(&mut self, elapsed_ms: u64) {
        let delta = elapsed_ms as f32 / self.travel_ms as f32;
        for (_, v) in &mut self.valves {
            if v.stuck {
                continue;
            }
            match v.drive {
                DriveState::Open => v.travel = (v.travel + delta).min(1.0),
                DriveState::Close => v.travel = (v.travel - delta).max(0.0),
                DriveState::None => {}
            }
        }
    }

    /// Freeze a valve mid-stroke (or release it).
    pub fn set_stuck(&mut self, valve: &str, stuck: bool) {
        if let Some((_, v)) = self.valves.iter_mut().find(|(n, _)| n == valve) {
            v.stuck = stuck;
        }
    }

    /// Load presented while the motor runs.
    pub fn set_motor_load(&mut self, amps: f32, psi: f32) {
        if let Some(m) = &mut self.motor {
            m.running_amps = amps;
            m.running_psi = psi;
        }
    }

    pub fn motor_energized(&self) -> bool {
        self.motor.as_ref().is_some_and(|m| m.energized)
    }

    pub fn valve_travel(&self, valve: &str) -> Option<f32> {
        self.valves
            .iter()
            .find(|(n, _)| n == valve)
            .map(|(_, v)| v.travel)
    }
}

/// Loop current that calibrates to `value` on this channel.
fn raw_for(cal: &ChannelCalibration, value: f32) -> f32 {
    if cal.scale == 0.0 {
        return 0.0;
    }
    (value - cal.offset) / cal.scale
}

impl DigitalIoPort for SimulatedPlant {
    fn read_position(&mut self, sensor_a: u8, sensor_b: u8) -> Result<(bool, bool), IoError> {
        let (_, v) = self
            .valves
            .iter()
            .find(|(_, v)| v.pins.open_sense == sensor_a && v.pins.close_sense == sensor_b)
            .ok_or(IoError::read(sensor_a))?;
        let open = v.travel >= 1.0;
        let closed = v.travel <= 0.0;
        Ok((v.polarity.level(open), v.polarity.level(closed)))
    }

    fn write_drive(
        &mut self,
        direction_pin: u8,
        enable_pin: u8,
        direction: bool,
        enable: bool,
    ) -> Result<(), IoError> {
        if let Some((_, v)) = self
            .valves
            .iter_mut()
            .find(|(_, v)| v.pins.direction == direction_pin && v.pins.enable == enable_pin)
        {
            v.drive = match (direction, enable) {
                (false, true) => DriveState::Open,
                (true, true) => DriveState::Close,
                _ => DriveState::None,
            };
            return Ok(());
        }
        match &mut self.motor {
            Some(m)
                if m.contactor.direction_pin == direction_pin
                    && m.contactor.enable_pin == enable_pin =>
            {
                m.energized = enable;
                Ok(())
            }
            _ => Err(IoError::write(direction_pin)),
        }
    }
}

impl AnalogPort for SimulatedPlant {
    fn read_milliamps(&mut self, channel: u8) -> Result<f32, IoError> {
        let m = self.motor.as_ref().ok_or(IoError::analog(channel))?;
        let (amps, psi) = if m.energized {
            (m.running_amps, m.running_psi)
        } else {
            (0.0, 0.0)
        };
        if channel == m.current.adc_channel {
            Ok(raw_for(&m.current, amps))
        } else if channel == m.pressure.adc_channel {
            Ok(raw_for(&m.pressure, psi))
        } else {
            Err(IoError::analog(channel))
        }
    }
}
