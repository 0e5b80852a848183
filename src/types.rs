//! Core types shared by patterns, channels and sequencers.

use crate::registry::PwmOutput;

/// How many times a pattern should repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopCount {
    /// Repeat a specific number of times. `Finite(0)` never moves the output.
    Finite(u32),

    /// Repeat until stopped.
    Infinite,
}

impl LoopCount {
    /// Maps the "optional repeat count" convention: `None` repeats forever.
    #[inline]
    pub fn from_option(n: Option<u32>) -> Self {
        match n {
            Some(n) => LoopCount::Finite(n),
            None => LoopCount::Infinite,
        }
    }

    /// Returns true when no cycles remain.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, LoopCount::Finite(0))
    }

    /// Consumes one finished cycle.
    #[inline]
    pub(crate) fn consume(&mut self) {
        if let LoopCount::Finite(n) = self {
            *n = n.saturating_sub(1);
        }
    }
}

impl Default for LoopCount {
    fn default() -> Self {
        LoopCount::Infinite
    }
}

impl From<Option<u32>> for LoopCount {
    fn from(n: Option<u32>) -> Self {
        LoopCount::from_option(n)
    }
}

/// A single `(value, duration)` step consumed by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step<V, D> {
    /// Value written to the output when the step begins.
    pub value: V,

    /// How long the value is held before the next step.
    pub duration: D,
}

impl<V, D> Step<V, D> {
    /// Creates a new step.
    #[inline]
    pub const fn new(value: V, duration: D) -> Self {
        Self { value, duration }
    }
}

/// Pattern validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceError {
    /// No segments provided.
    EmptySequence,

    /// Pattern capacity exceeded.
    CapacityExceeded,

    /// Frame rate outside 1..=1000 frames per second.
    InvalidFps(u32),

    /// A value outside the normalized range was given to the builder.
    ValueOutOfRange,
}

impl core::fmt::Display for SequenceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SequenceError::EmptySequence => {
                write!(f, "pattern must have at least one segment")
            }
            SequenceError::CapacityExceeded => {
                write!(f, "pattern capacity exceeded")
            }
            SequenceError::InvalidFps(fps) => {
                write!(f, "frame rate {} is outside 1..=1000 fps", fps)
            }
            SequenceError::ValueOutOfRange => {
                write!(f, "pattern values must be within 0.0..=1.0")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SequenceError {}

/// Errors raised by channels, inputs and sequencers at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    /// A value outside the normalized 0.0-1.0 range was written.
    InvalidValue,

    /// The pin has no PWM output in the chip layout table.
    InvalidPin(u8),

    /// The PWM output is already owned by another pin.
    ChannelInUse {
        /// The contested hardware output.
        output: PwmOutput,
        /// The pin that currently owns it.
        owner: u8,
    },

    /// A deferred callback could not be queued; the sequence halted.
    SchedulingFailed,

    /// The device was closed and can no longer be used.
    Closed,

    /// The underlying pin or PWM driver reported an error.
    Hardware,

    /// A pattern could not be built.
    Sequence(SequenceError),
}

impl core::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DeviceError::InvalidValue => {
                write!(f, "value must be within 0.0..=1.0")
            }
            DeviceError::InvalidPin(pin) => {
                write!(f, "pin {} has no PWM output", pin)
            }
            DeviceError::ChannelInUse { output, owner } => {
                write!(f, "PWM channel {} is already in use by pin {}", output, owner)
            }
            DeviceError::SchedulingFailed => {
                write!(f, "scheduler queue full, sequence halted")
            }
            DeviceError::Closed => {
                write!(f, "device is closed")
            }
            DeviceError::Hardware => {
                write!(f, "hardware driver error")
            }
            DeviceError::Sequence(err) => {
                write!(f, "pattern error: {}", err)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeviceError {}

impl From<SequenceError> for DeviceError {
    fn from(err: SequenceError) -> Self {
        DeviceError::Sequence(err)
    }
}
