//! Process-wide PWM output ownership.
//!
//! On the RP2040 every GPIO is wired to one of eight PWM slices, each with an
//! `A` and a `B` output. Pins 16 and up wrap around, so two pins can land on
//! the same output and would silently mirror each other. [`ChannelRegistry`]
//! records which pin owns each output and refuses a second owner.

use crate::types::DeviceError;
use core::cell::RefCell;
use critical_section::Mutex;

/// Number of GPIOs in the layout table.
pub const PIN_COUNT: u8 = 30;

/// Number of PWM slices.
pub const SLICE_COUNT: u8 = 8;

const OUTPUT_COUNT: usize = (SLICE_COUNT as usize) * 2;

/// Sub-channel of a PWM slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubChannel {
    A,
    B,
}

/// One hardware PWM output: a slice plus its sub-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmOutput {
    pub slice: u8,
    pub channel: SubChannel,
}

impl PwmOutput {
    /// Looks up the output a pin is wired to.
    ///
    /// Returns `None` for pins outside the layout table.
    pub const fn for_pin(pin: u8) -> Option<Self> {
        if pin >= PIN_COUNT {
            return None;
        }
        let wrapped = pin % 16;
        let channel = if wrapped % 2 == 0 {
            SubChannel::A
        } else {
            SubChannel::B
        };
        Some(Self {
            slice: wrapped / 2,
            channel,
        })
    }

    #[inline]
    fn index(&self) -> usize {
        let sub = match self.channel {
            SubChannel::A => 0,
            SubChannel::B => 1,
        };
        (self.slice as usize) * 2 + sub
    }
}

impl core::fmt::Display for PwmOutput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sub = match self.channel {
            SubChannel::A => 'A',
            SubChannel::B => 'B',
        };
        write!(f, "{}{}", self.slice, sub)
    }
}

/// Owner table for the chip's PWM outputs.
///
/// Construct one per process (see [`CHANNELS`]) or one per test. Every
/// access runs inside a critical section, so acquire and release are
/// atomic with respect to interrupts and timer callbacks.
pub struct ChannelRegistry {
    owners: Mutex<RefCell<[Option<u8>; OUTPUT_COUNT]>>,
}

/// The process-wide registry used by default.
pub static CHANNELS: ChannelRegistry = ChannelRegistry::new();

impl ChannelRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            owners: Mutex::new(RefCell::new([None; OUTPUT_COUNT])),
        }
    }

    /// Claims the PWM output behind `pin`.
    ///
    /// # Errors
    /// * `InvalidPin` - The pin has no PWM output
    /// * `ChannelInUse` - The output is already owned (by this or another pin)
    pub fn acquire(&self, pin: u8) -> Result<PwmOutput, DeviceError> {
        let output = PwmOutput::for_pin(pin).ok_or(DeviceError::InvalidPin(pin))?;

        critical_section::with(|cs| {
            let mut owners = self.owners.borrow_ref_mut(cs);
            let slot = &mut owners[output.index()];
            match *slot {
                Some(owner) => Err(DeviceError::ChannelInUse { output, owner }),
                None => {
                    *slot = Some(pin);
                    Ok(())
                }
            }
        })
        .inspect_err(|_| log_warn!("pwm output for pin {=u8} already in use", pin))?;

        log_debug!("pin {=u8} acquired pwm slice {=u8}", pin, output.slice);
        Ok(output)
    }

    /// Gives the output behind `pin` back.
    ///
    /// Only the current owner may release. Releasing an output the pin does
    /// not own is a programming error: it panics in debug builds and is
    /// ignored in release builds.
    pub fn release(&self, pin: u8) {
        let Some(output) = PwmOutput::for_pin(pin) else {
            debug_assert!(false, "release of pin {} outside the layout table", pin);
            return;
        };

        let released = critical_section::with(|cs| {
            let mut owners = self.owners.borrow_ref_mut(cs);
            let slot = &mut owners[output.index()];
            if *slot == Some(pin) {
                *slot = None;
                true
            } else {
                false
            }
        });

        debug_assert!(released, "pin {} released an output it does not own", pin);
        if released {
            log_debug!("pin {=u8} released pwm slice {=u8}", pin, output.slice);
        }
    }

    /// Returns the pin that owns `output`, if any.
    pub fn owner(&self, output: PwmOutput) -> Option<u8> {
        critical_section::with(|cs| self.owners.borrow_ref(cs)[output.index()])
    }

    /// Returns true if `pin` could be acquired right now.
    pub fn is_free(&self, pin: u8) -> bool {
        PwmOutput::for_pin(pin).is_some_and(|output| self.owner(output).is_none())
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
