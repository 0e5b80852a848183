//! PWM and logic-level output channels.
//!
//! Provides [`PwmChannel`], which maps a normalized value onto a raw duty
//! cycle and owns its slot in a [`ChannelRegistry`], and [`DigitalChannel`]
//! for plain on/off pins.

use crate::device::{Level, OutputDevice};
use crate::peripheral::SetFrequency;
use crate::registry::{ChannelRegistry, PwmOutput};
use crate::types::DeviceError;
use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;

/// Construction options shared by output channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    /// If false, "on" drives the pin low (common-anode LEDs, sinking buzzers).
    pub active_high: bool,

    /// Raw duty value that represents 1.0. Defaults to the driver's maximum.
    pub duty_factor: Option<u16>,

    /// Value written when the channel is created.
    pub initial_value: f32,
}

impl ChannelConfig {
    /// Active-high, full duty range, initially off.
    pub const fn new() -> Self {
        Self {
            active_high: true,
            duty_factor: None,
            initial_value: 0.0,
        }
    }

    /// Inverts the polarity.
    pub const fn active_low(mut self) -> Self {
        self.active_high = false;
        self
    }

    /// Sets the raw duty that represents full brightness.
    pub const fn duty_factor(mut self, duty_factor: u16) -> Self {
        self.duty_factor = Some(duty_factor);
        self
    }

    /// Sets the value written at construction.
    pub const fn initial_value(mut self, value: f32) -> Self {
        self.initial_value = value;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One PWM-capable output pin.
///
/// The channel claims its hardware output from the registry when created and
/// gives it back on [`close`](Self::close) or drop. Writes go to the duty
/// register immediately; the last raw duty is cached so reads never touch
/// the hardware.
///
/// `read(write(v))` returns `v` within `1 / duty_factor` for either polarity.
pub struct PwmChannel<'r, P: SetDutyCycle> {
    pwm: P,
    pin: u8,
    output: PwmOutput,
    registry: &'r ChannelRegistry,
    active_high: bool,
    duty_factor: u16,
    duty: u16,
    closed: bool,
}

impl<'r, P: SetDutyCycle> PwmChannel<'r, P> {
    /// Creates a channel on `pin`, claiming its PWM output in `registry`.
    ///
    /// # Errors
    /// * `InvalidValue` - Initial value out of range, or duty factor is zero or
    ///   above the driver's maximum
    /// * `InvalidPin` / `ChannelInUse` - The output could not be claimed
    /// * `Hardware` - The initial write failed
    pub fn new(
        pwm: P,
        pin: u8,
        registry: &'r ChannelRegistry,
        config: ChannelConfig,
    ) -> Result<Self, DeviceError> {
        if !config.initial_value.is_normalized() {
            return Err(DeviceError::InvalidValue);
        }

        let max_duty = pwm.max_duty_cycle();
        let duty_factor = config.duty_factor.unwrap_or(max_duty);
        if duty_factor == 0 || duty_factor > max_duty {
            return Err(DeviceError::InvalidValue);
        }

        let output = registry.acquire(pin)?;

        // From here on, dropping `channel` releases the output.
        let mut channel = Self {
            pwm,
            pin,
            output,
            registry,
            active_high: config.active_high,
            duty_factor,
            duty: 0,
            closed: false,
        };
        channel.write(config.initial_value)?;
        Ok(channel)
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.closed {
            Err(DeviceError::Closed)
        } else {
            Ok(())
        }
    }

    fn value_to_duty(&self, value: f32) -> u16 {
        let level = if self.active_high { value } else { 1.0 - value };
        (level * f32::from(self.duty_factor) + 0.5) as u16
    }

    fn duty_to_value(&self, duty: u16) -> f32 {
        let level = f32::from(duty) / f32::from(self.duty_factor);
        if self.active_high { level } else { 1.0 - level }
    }

    /// Returns the last raw duty written.
    pub fn raw_duty(&self) -> u16 {
        self.duty
    }

    /// Returns the raw duty that represents 1.0.
    pub fn duty_factor(&self) -> u16 {
        self.duty_factor
    }

    /// Returns the GPIO number.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Returns the hardware output this channel owns.
    pub fn output(&self) -> PwmOutput {
        self.output
    }

    /// Returns the polarity.
    pub fn active_high(&self) -> bool {
        self.active_high
    }

    /// Returns true once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the PWM output. Further reads and writes fail with `Closed`.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.registry.release(self.pin);
    }
}

impl<P: SetDutyCycle + SetFrequency> PwmChannel<'_, P> {
    /// Returns the PWM frequency in Hz.
    pub fn frequency(&self) -> Result<u32, DeviceError> {
        self.ensure_open()?;
        Ok(self.pwm.frequency())
    }

    /// Sets the PWM frequency in Hz.
    ///
    /// # Errors
    /// * `InvalidValue` - `hz` is zero
    /// * `Closed` - The channel was closed
    pub fn set_frequency(&mut self, hz: u32) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if hz == 0 {
            return Err(DeviceError::InvalidValue);
        }
        self.pwm.set_frequency(hz);
        Ok(())
    }
}

impl<P: SetDutyCycle> OutputDevice for PwmChannel<'_, P> {
    type Value = f32;

    fn read(&self) -> Result<f32, DeviceError> {
        self.ensure_open()?;
        Ok(self.duty_to_value(self.duty))
    }

    fn write(&mut self, value: f32) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if !value.is_normalized() {
            return Err(DeviceError::InvalidValue);
        }
        let duty = self.value_to_duty(value);
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|_| DeviceError::Hardware)?;
        self.duty = duty;
        Ok(())
    }

    fn close(&mut self) {
        PwmChannel::close(self);
    }
}

impl<P: SetDutyCycle> Drop for PwmChannel<'_, P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// A logic-level output. Any value above zero drives the active level.
pub struct DigitalChannel<P: OutputPin> {
    pin: P,
    active_high: bool,
    on: bool,
    closed: bool,
}

impl<P: OutputPin> DigitalChannel<P> {
    /// Creates a channel and drives the initial level.
    ///
    /// `duty_factor` in `config` is ignored.
    pub fn new(pin: P, config: ChannelConfig) -> Result<Self, DeviceError> {
        let mut channel = Self {
            pin,
            active_high: config.active_high,
            on: false,
            closed: false,
        };
        channel.write(config.initial_value)?;
        Ok(channel)
    }

    /// Returns the polarity.
    pub fn active_high(&self) -> bool {
        self.active_high
    }

    /// Stops accepting reads and writes. The pin keeps its last level.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl<P: OutputPin> OutputDevice for DigitalChannel<P> {
    type Value = f32;

    fn read(&self) -> Result<f32, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        Ok(if self.on { 1.0 } else { 0.0 })
    }

    fn write(&mut self, value: f32) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        if !value.is_normalized() {
            return Err(DeviceError::InvalidValue);
        }
        let on = value > 0.0;
        let state = PinState::from(on == self.active_high);
        self.pin.set_state(state).map_err(|_| DeviceError::Hardware)?;
        self.on = on;
        Ok(())
    }

    fn close(&mut self) {
        DigitalChannel::close(self);
    }
}
