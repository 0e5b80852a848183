//! Debounced, interrupt-driven digital input.
//!
//! [`DebouncedInput`] turns raw pin-change interrupts into confirmed
//! activation and deactivation events. The interrupt handler only samples
//! the pin and arms a re-check timer; settling happens in a timer callback so
//! no interrupt ever spins for the length of the bounce window.
//!
//! ```text
//!  edge ──► sample, disable IRQ ──► no window? ──► confirm, enable IRQ
//!                    │
//!                    ▼
//!          re-check one window later ──► confirm that sample, enable IRQ
//! ```
//!
//! The window is a hard timeout: however the line bounces in between, the
//! level read when the window expires is final. Edges inside the window are
//! not seen because the interrupt is disarmed.

use crate::peripheral::{InputPin, PinInterrupt, Scheduler, TaskId};
use crate::time::{TimeDuration, TimeInstant};
use crate::types::DeviceError;

/// Debounce window used by the [`switch`](InputConfig::switch) preset.
const SWITCH_BOUNCE_MS: u64 = 20;

/// Input polarity and debounce window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputConfig<D> {
    /// If false, a low pin level counts as active (pulled-up switches).
    pub active_high: bool,

    /// Settle window. `None` or zero confirms every edge immediately.
    pub bounce_time: Option<D>,
}

impl<D: TimeDuration> InputConfig<D> {
    /// Active-high, no debouncing.
    pub fn new() -> Self {
        Self {
            active_high: true,
            bounce_time: None,
        }
    }

    /// A switch to ground with the internal pull-up enabled: active-low with
    /// a 20 ms bounce window.
    pub fn switch() -> Self {
        Self {
            active_high: false,
            bounce_time: Some(D::from_millis(SWITCH_BOUNCE_MS)),
        }
    }

    /// Same as [`switch`](Self::switch).
    pub fn button() -> Self {
        Self::switch()
    }

    /// Inverts the polarity.
    pub fn active_low(mut self) -> Self {
        self.active_high = false;
        self
    }

    /// Sets the bounce window.
    pub fn bounce_time(mut self, bounce_time: D) -> Self {
        self.bounce_time = Some(bounce_time);
        self
    }
}

impl<D: TimeDuration> Default for InputConfig<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Last confirmed state of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputState {
    Inactive,
    Active,
}

impl InputState {
    fn from_active(active: bool) -> Self {
        if active {
            InputState::Active
        } else {
            InputState::Inactive
        }
    }
}

/// A confirmed change of [`InputState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    Activated,
    Deactivated,
}

#[derive(Debug, Clone, Copy)]
struct Settle {
    task: TaskId,
    sample: bool,
}

/// A digital input with optional debouncing and activation callbacks.
///
/// The platform wires two entry points:
/// * the pin's both-edge interrupt calls [`on_edge`](Self::on_edge)
/// * the scheduler calls [`on_timer`](Self::on_timer) with every fired id
///
/// Both return the confirmed [`Transition`], if any, after invoking the
/// matching callback. A callback fires at most once per confirmed
/// transition, and edges that net out to the confirmed state fire nothing.
///
/// # Type Parameters
/// * `'t` - Lifetime of the scheduler reference
/// * `'c` - Lifetime of the callbacks
/// * `I` - Time instant type
/// * `P` - Input pin with interrupt control
/// * `T` - Scheduler implementation type
pub struct DebouncedInput<'t, 'c, I, P, T>
where
    I: TimeInstant,
    P: InputPin + PinInterrupt,
    T: Scheduler<I>,
{
    pin: P,
    scheduler: &'t T,
    active_high: bool,
    bounce_time: Option<I::Duration>,
    state: InputState,
    settle: Option<Settle>,
    on_activated: Option<&'c mut dyn FnMut()>,
    on_deactivated: Option<&'c mut dyn FnMut()>,
    closed: bool,
}

impl<'t, 'c, I, P, T> DebouncedInput<'t, 'c, I, P, T>
where
    I: TimeInstant,
    P: InputPin + PinInterrupt,
    T: Scheduler<I>,
{
    /// Samples the initial state and arms the edge interrupt.
    ///
    /// # Errors
    /// * `Hardware` - The pin could not be read
    pub fn new(
        mut pin: P,
        scheduler: &'t T,
        config: InputConfig<I::Duration>,
    ) -> Result<Self, DeviceError> {
        let high = pin.is_high().map_err(|_| DeviceError::Hardware)?;
        let state = InputState::from_active(high == config.active_high);
        pin.enable_edge_interrupt();

        Ok(Self {
            pin,
            scheduler,
            active_high: config.active_high,
            bounce_time: config.bounce_time.filter(|window| !window.is_zero()),
            state,
            settle: None,
            on_activated: None,
            on_deactivated: None,
            closed: false,
        })
    }

    /// Handles a pin-change interrupt.
    ///
    /// Without a bounce window the edge is confirmed at once. Otherwise the
    /// interrupt stays disabled until the window expires, and the outcome
    /// arrives through [`on_timer`](Self::on_timer).
    ///
    /// # Errors
    /// * `Closed` - The input was closed
    /// * `Hardware` - The pin could not be read
    /// * `SchedulingFailed` - No re-check could be queued; the sample just
    ///   taken was accepted without filtering
    pub fn on_edge(&mut self) -> Result<Option<Transition>, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        if self.settle.is_some() {
            return Ok(None);
        }

        self.pin.disable_edge_interrupt();
        let active = match self.sample() {
            Ok(active) => active,
            Err(err) => {
                self.pin.enable_edge_interrupt();
                return Err(err);
            }
        };

        let Some(window) = self.bounce_time else {
            self.pin.enable_edge_interrupt();
            return Ok(self.confirm(active));
        };

        let settle = Settle {
            task: TaskId::next(),
            sample: active,
        };
        match self.scheduler.schedule(settle.task, window) {
            Ok(()) => {
                self.settle = Some(settle);
                Ok(None)
            }
            Err(_) => {
                log_warn!("could not schedule debounce re-check");
                self.pin.enable_edge_interrupt();
                self.confirm(active);
                Err(DeviceError::SchedulingFailed)
            }
        }
    }

    /// Handles a fired timer. Ids this input is not waiting on are ignored.
    ///
    /// The pin is read once more and that level is confirmed.
    ///
    /// # Errors
    /// * `Hardware` - The pin could not be read; settling was abandoned
    pub fn on_timer(&mut self, task: TaskId) -> Result<Option<Transition>, DeviceError> {
        let Some(settle) = self.settle else {
            return Ok(None);
        };
        if settle.task != task {
            return Ok(None);
        }

        self.settle = None;
        let sampled = self.sample();
        self.pin.enable_edge_interrupt();
        let active = sampled?;
        if active != settle.sample {
            log_debug!("input changed while settling, active={=bool}", active);
        }
        Ok(self.confirm(active))
    }

    /// Sets the callback run on each confirmed activation.
    ///
    /// # Errors
    /// * `Closed` - The input was closed
    pub fn when_activated(
        &mut self,
        callback: Option<&'c mut dyn FnMut()>,
    ) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.on_activated = callback;
        Ok(())
    }

    /// Sets the callback run on each confirmed deactivation.
    ///
    /// # Errors
    /// * `Closed` - The input was closed
    pub fn when_deactivated(
        &mut self,
        callback: Option<&'c mut dyn FnMut()>,
    ) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.on_deactivated = callback;
        Ok(())
    }

    /// Returns 1.0 if the confirmed state is active, 0.0 otherwise.
    pub fn value(&self) -> Result<f32, DeviceError> {
        Ok(if self.is_active()? { 1.0 } else { 0.0 })
    }

    /// Returns true if the confirmed state is active.
    pub fn is_active(&self) -> Result<bool, DeviceError> {
        self.ensure_open()?;
        Ok(self.state == InputState::Active)
    }

    /// Returns the last confirmed state.
    pub fn state(&self) -> InputState {
        self.state
    }

    /// Returns true while an edge is waiting to settle.
    pub fn is_settling(&self) -> bool {
        self.settle.is_some()
    }

    /// Returns the re-check timer this input is waiting on, if any.
    pub fn pending_task(&self) -> Option<TaskId> {
        self.settle.map(|settle| settle.task)
    }

    /// Returns the polarity.
    pub fn active_high(&self) -> bool {
        self.active_high
    }

    /// Returns true once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Disarms the interrupt, abandons any settle in progress and drops the
    /// callbacks. No callback fires after this returns.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(settle) = self.settle.take() {
            self.scheduler.cancel(settle.task);
        }
        self.pin.disable_edge_interrupt();
        self.on_activated = None;
        self.on_deactivated = None;
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.closed {
            Err(DeviceError::Closed)
        } else {
            Ok(())
        }
    }

    fn sample(&mut self) -> Result<bool, DeviceError> {
        let high = self.pin.is_high().map_err(|_| DeviceError::Hardware)?;
        Ok(high == self.active_high)
    }

    /// Compares `active` with the confirmed state and dispatches on change.
    fn confirm(&mut self, active: bool) -> Option<Transition> {
        let state = InputState::from_active(active);
        if state == self.state {
            return None;
        }
        self.state = state;
        log_debug!("input confirmed, active={=bool}", active);

        let (transition, callback) = match state {
            InputState::Active => (Transition::Activated, self.on_activated.as_deref_mut()),
            InputState::Inactive => (Transition::Deactivated, self.on_deactivated.as_deref_mut()),
        };
        if let Some(callback) = callback {
            callback();
        }
        Some(transition)
    }
}

impl<I, P, T> Drop for DebouncedInput<'_, '_, I, P, T>
where
    I: TimeInstant,
    P: InputPin + PinInterrupt,
    T: Scheduler<I>,
{
    fn drop(&mut self) {
        self.close();
    }
}
