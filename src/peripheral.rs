//! Peripheral access contract.
//!
//! The crate drives hardware only through these traits and the
//! `embedded-hal` pin traits (`OutputPin`, `InputPin`, `SetDutyCycle`).
//! Implement them for your timer, interrupt controller and PWM driver.

use crate::time::{TimeInstant, TimeSource};
use portable_atomic::{AtomicU32, Ordering};

pub use embedded_hal::digital::{InputPin, OutputPin};
pub use embedded_hal::pwm::SetDutyCycle;

static NEXT_TASK_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of one scheduled one-shot callback.
///
/// Ids are unique for the life of the process, so the platform can hand a
/// fired id to every sequencer and input it serves; only the current owner
/// acts on it and everyone else ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(u32);

impl TaskId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    #[inline]
    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Returned by [`Scheduler::schedule`] when no timer slot is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulingFailed;

impl core::fmt::Display for SchedulingFailed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "no timer slot available")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SchedulingFailed {}

/// Timer services for sequencers and debounced inputs.
///
/// `schedule` registers a one-shot callback: when `delay` has elapsed the
/// platform must call `on_timer(task)` on the owning sequencer or input.
/// Methods take `&self` so one scheduler can be shared by many devices.
pub trait Scheduler<I: TimeInstant>: TimeSource<I> {
    /// Queues `task` to fire once after `delay`.
    fn schedule(&self, task: TaskId, delay: I::Duration) -> Result<(), SchedulingFailed>;

    /// Removes `task` if it has not fired yet. Unknown ids are ignored.
    fn cancel(&self, task: TaskId);

    /// Suspends the calling context for `delay`.
    fn block_for(&self, delay: I::Duration);
}

/// Both-edge pin-change interrupt control for an input pin.
pub trait PinInterrupt {
    /// Arms the rising and falling edge interrupt.
    fn enable_edge_interrupt(&mut self);

    /// Disarms the interrupt. Pending edges are discarded.
    fn disable_edge_interrupt(&mut self);
}

/// PWM frequency control, in Hz.
pub trait SetFrequency {
    /// Returns the current frequency.
    fn frequency(&self) -> u32;

    /// Sets the frequency. Implementations clamp to what the hardware supports.
    fn set_frequency(&mut self, hz: u32);
}
