//! Device value contract.
//!
//! Every output the sequencer can drive implements [`OutputDevice`]: a
//! normalized value can be read back and written, and out-of-range writes
//! fail with [`DeviceError::InvalidValue`] instead of being clamped.

use crate::channel::PwmChannel;
use crate::types::DeviceError;
use embedded_hal::pwm::SetDutyCycle;
use palette::{Mix, Srgb};

/// A normalized output value.
///
/// Implemented for `f32` (single channel) and `Srgb` (three channels that
/// interpolate independently with the same progress).
pub trait Level: Copy + PartialEq {
    /// Fully off.
    const OFF: Self;

    /// Fully on.
    const FULL: Self;

    /// Linear interpolation: `(1 - t) * self + t * to`.
    fn lerp(self, to: Self, t: f32) -> Self;

    /// Returns true if every component lies within 0.0-1.0.
    fn is_normalized(&self) -> bool;
}

#[inline]
fn in_unit_range(v: f32) -> bool {
    (0.0..=1.0).contains(&v)
}

impl Level for f32 {
    const OFF: Self = 0.0;
    const FULL: Self = 1.0;

    #[inline]
    fn lerp(self, to: Self, t: f32) -> Self {
        (1.0 - t) * self + t * to
    }

    #[inline]
    fn is_normalized(&self) -> bool {
        in_unit_range(*self)
    }
}

impl Level for Srgb {
    const OFF: Self = Srgb::new(0.0, 0.0, 0.0);
    const FULL: Self = Srgb::new(1.0, 1.0, 1.0);

    #[inline]
    fn lerp(self, to: Self, t: f32) -> Self {
        self.mix(to, t)
    }

    #[inline]
    fn is_normalized(&self) -> bool {
        in_unit_range(self.red) && in_unit_range(self.green) && in_unit_range(self.blue)
    }
}

/// Trait for anything whose state is a normalized [`Level`].
pub trait OutputDevice {
    /// The value type this device accepts.
    type Value: Level;

    /// Returns the current value.
    ///
    /// # Errors
    /// * `Closed` - The device was closed
    fn read(&self) -> Result<Self::Value, DeviceError>;

    /// Writes a value to the hardware immediately.
    ///
    /// # Errors
    /// * `InvalidValue` - The value is outside 0.0-1.0
    /// * `Closed` - The device was closed
    /// * `Hardware` - The driver rejected the write
    fn write(&mut self, value: Self::Value) -> Result<(), DeviceError>;

    /// Returns true if the device is not fully off.
    fn is_active(&self) -> Result<bool, DeviceError> {
        Ok(self.read()? != Self::Value::OFF)
    }

    /// Releases the hardware. Later reads and writes fail with `Closed`.
    fn close(&mut self) {}
}

/// An RGB LED built from three PWM channels.
///
/// All three channels share the polarity they were configured with, so
/// common-anode LEDs use `active_high: false` on each channel.
pub struct PwmRgb<'r, R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    red: PwmChannel<'r, R>,
    green: PwmChannel<'r, G>,
    blue: PwmChannel<'r, B>,
}

impl<'r, R, G, B> PwmRgb<'r, R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    /// Combines three channels into one RGB device.
    pub fn new(red: PwmChannel<'r, R>, green: PwmChannel<'r, G>, blue: PwmChannel<'r, B>) -> Self {
        Self { red, green, blue }
    }

    /// Returns the current colour as 0-255 components.
    pub fn color(&self) -> Result<[u8; 3], DeviceError> {
        Ok(crate::colors::to_255(self.read()?))
    }

    /// Sets the colour from 0-255 components.
    pub fn set_color(&mut self, color: [u8; 3]) -> Result<(), DeviceError> {
        self.write(crate::colors::from_255(color))
    }

    /// Writes `1 - v` to every component.
    pub fn invert(&mut self) -> Result<(), DeviceError> {
        let c = self.read()?;
        self.write(Srgb::new(1.0 - c.red, 1.0 - c.green, 1.0 - c.blue))
    }

    fn write_components(&mut self, color: Srgb) -> Result<(), DeviceError> {
        self.red.write(color.red)?;
        self.green.write(color.green)?;
        self.blue.write(color.blue)
    }

    /// Closes all three channels, releasing their PWM outputs.
    pub fn close(&mut self) {
        self.red.close();
        self.green.close();
        self.blue.close();
    }
}

impl<R, G, B> OutputDevice for PwmRgb<'_, R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    type Value = Srgb;

    fn read(&self) -> Result<Srgb, DeviceError> {
        Ok(Srgb::new(self.red.read()?, self.green.read()?, self.blue.read()?))
    }

    /// Writes all three components.
    ///
    /// If one channel rejects its write, the components already written are
    /// put back to the previous colour before the error is returned.
    fn write(&mut self, color: Srgb) -> Result<(), DeviceError> {
        if !color.is_normalized() {
            return Err(DeviceError::InvalidValue);
        }
        let previous = self.read()?;
        if let Err(err) = self.write_components(color) {
            log_warn!("rgb write failed, restoring previous colour");
            let _ = self.write_components(previous);
            return Err(err);
        }
        Ok(())
    }

    fn close(&mut self) {
        PwmRgb::close(self);
    }
}
