//! embedded-hal pin bank adapter.
//!
//! Implements [`DigitalIoPort`] over embedded-hal 1.0 digital pins, each
//! registered under the numeric id the configuration refers to.  Board
//! bring-up code builds the concrete pins (GPIO, expander channels, ...)
//! and hands them over here; the core never sees the HAL types.

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::warn;

use crate::app::ports::DigitalIoPort;
use crate::error::IoError;

pub struct PinBank<I, O> {
    inputs: Vec<(u8, I)>,
    outputs: Vec<(u8, O)>,
}

impl<I, O> Default for PinBank<I, O> {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl<I: InputPin, O: OutputPin> PinBank<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sense input.  A later registration of the same id wins.
    pub fn with_input(mut self, id: u8, pin: I) -> Self {
        self.inputs.retain(|(i, _)| *i != id);
        self.inputs.push((id, pin));
        self
    }

    /// Register a drive output.  A later registration of the same id wins.
    pub fn with_output(mut self, id: u8, pin: O) -> Self {
        self.outputs.retain(|(i, _)| *i != id);
        self.outputs.push((id, pin));
        self
    }

    fn read(&mut self, id: u8) -> Result<bool, IoError> {
        let (_, pin) = self
            .inputs
            .iter_mut()
            .find(|(i, _)| *i == id)
            .ok_or(IoError::read(id))?;
        pin.is_high().map_err(|e| {
            warn!("PinBank: read of pin {} failed: {:?}", id, e);
            IoError::read(id)
        })
    }

    fn write(&mut self, id: u8, level: bool) -> Result<(), IoError> {
        let (_, pin) = self
            .outputs
            .iter_mut()
            .find(|(i, _)| *i == id)
            .ok_or(IoError::write(id))?;
        pin.set_state(PinState::from(level)).map_err(|e| {
            warn!("PinBank: write of pin {} failed: {:?}", id, e);
            IoError::write(id)
        })
    }
}

impl<I: InputPin, O: OutputPin> DigitalIoPort for PinBank<I, O> {
    fn read_position(&mut self, sensor_a: u8, sensor_b: u8) -> Result<(bool, bool), IoError> {
        Ok((self.read(sensor_a)?, self.read(sensor_b)?))
    }

    /// Enable is dropped first and raised last, so the motor never runs
    /// against a direction line that is still changing.
    fn write_drive(
        &mut self,
        direction_pin: u8,
        enable_pin: u8,
        direction: bool,
        enable: bool,
    ) -> Result<(), IoError> {
        if !enable {
            self.write(enable_pin, false)?;
            return self.write(direction_pin, direction);
        }
        self.write(enable_pin, false)?;
        self.write(direction_pin, direction)?;
        self.write(enable_pin, true)
    }
}
