#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`PwmChannel`**: One PWM-capable output pin with polarity and duty resolution
//! - **`ChannelRegistry`**: Guards against two devices sharing one hardware PWM output
//! - **`OutputDevice`**: The normalized read/write contract every output implements
//! - **`Pattern`**: A restartable cycle of hold and fade segments
//! - **`ValueSequencer`**: Drives an output through a pattern, blocking or timer-driven
//! - **`DebouncedInput`**: Turns pin-change interrupts into confirmed activation events
//! - **`Scheduler`**: Trait to implement for your timer and delay hardware
//!
//! Values are normalized: `f32` in 0.0-1.0 for single outputs and `Srgb<f32>`
//! for RGB outputs. Channels convert them to raw duty cycles at the hardware
//! boundary.

pub use palette::Srgb;

#[macro_use]
mod log;

pub mod channel;
pub mod colors;
pub mod device;
pub mod input;
pub mod pattern;
pub mod peripheral;
pub mod registry;
pub mod sequencer;
pub mod time;
pub mod types;

pub use channel::{ChannelConfig, DigitalChannel, PwmChannel};
pub use device::{Level, OutputDevice, PwmRgb};
pub use input::{DebouncedInput, InputConfig, InputState, Transition};
pub use pattern::{Blink, Pattern, PatternBuilder, PatternSteps, Segment, StepFactory};
pub use peripheral::{PinInterrupt, Scheduler, SchedulingFailed, SetFrequency, TaskId};
pub use registry::{CHANNELS, ChannelRegistry, PwmOutput, SubChannel};
pub use sequencer::{PatternSequencer, SequenceSpec, SequencerState, ValueSequencer};
pub use time::{TimeDuration, TimeInstant, TimeSource};
pub use types::{DeviceError, LoopCount, SequenceError, Step};

/// Default number of segments a [`Pattern`] can hold.
pub const DEFAULT_SEGMENTS: usize = 8;

/// Default frame rate for fades, in frames per second.
pub const DEFAULT_FPS: u32 = 25;
