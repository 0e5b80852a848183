//! Value sequencer with blocking and timer-driven execution.
//!
//! Provides [`ValueSequencer`], which owns one [`OutputDevice`] and drives its
//! value through the steps of a [`StepFactory`], repeating whole cycles as
//! configured. At most one sequence runs per sequencer: starting a new one,
//! or writing a value directly, cancels the previous one before the first
//! new write.

use crate::device::{Level, OutputDevice};
use crate::pattern::{Blink, Pattern, StepFactory};
use crate::peripheral::{Scheduler, TaskId};
use crate::time::{TimeDuration, TimeInstant};
use crate::types::{DeviceError, LoopCount};
use core::marker::PhantomData;

/// The current state of a value sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencerState {
    /// Nothing running. The output holds whatever was last written.
    Idle,
    /// A sequence is stepping the output.
    Running,
    /// All repeats finished. The output was forced off.
    Complete,
    /// A step could not be scheduled or written. The last applied value stays.
    Halted,
}

/// What to run: a step factory, how often to repeat it, and whether the
/// caller waits for it to finish.
#[derive(Debug, Clone)]
pub struct SequenceSpec<S> {
    /// Builds one cycle of steps per call.
    pub factory: S,
    /// Number of cycles.
    pub loop_count: LoopCount,
    /// If true, [`ValueSequencer::start`] blocks until the sequence is done.
    pub wait: bool,
}

impl<S> SequenceSpec<S> {
    /// Repeats forever in the background.
    pub fn new(factory: S) -> Self {
        Self {
            factory,
            loop_count: LoopCount::Infinite,
            wait: false,
        }
    }

    /// Sets the number of cycles.
    pub fn loop_count(mut self, loop_count: LoopCount) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Sets blocking execution.
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }
}

/// Drives one output through timed sequences.
///
/// # Execution modes
///
/// **Background** (`wait == false`): `start` writes the first value, queues a
/// one-shot timer for its duration and returns. The platform calls
/// [`on_timer`](Self::on_timer) with the fired [`TaskId`]; the sequencer
/// writes the next value and queues the next timer. Ids that are not the
/// one currently queued are ignored, so a timer that fires after `stop` or
/// after a newer `start` never touches the output.
///
/// **Blocking** (`wait == true`): `start` writes each value and suspends via
/// [`Scheduler::block_for`] until every cycle has run.
///
/// When the last cycle ends the output is written with `Level::OFF`.
///
/// # Type Parameters
/// * `'t` - Lifetime of the scheduler reference
/// * `I` - Time instant type
/// * `O` - Output device type
/// * `T` - Scheduler implementation type
/// * `S` - Step factory type
pub struct ValueSequencer<'t, I, O, T, S>
where
    I: TimeInstant,
    O: OutputDevice,
    T: Scheduler<I>,
    S: StepFactory<O::Value, I::Duration>,
{
    output: O,
    scheduler: &'t T,
    state: SequencerState,
    factory: Option<S>,
    steps: Option<S::Steps>,
    loop_count: LoopCount,
    cycle_emitted: bool,
    pending: Option<TaskId>,
    _instant: PhantomData<I>,
}

/// A sequencer running [`Pattern`]s of up to `N` segments.
pub type PatternSequencer<'t, I, O, T, const N: usize> = ValueSequencer<
    't,
    I,
    O,
    T,
    Pattern<<O as OutputDevice>::Value, <I as TimeInstant>::Duration, N>,
>;

impl<'t, I, O, T, S> ValueSequencer<'t, I, O, T, S>
where
    I: TimeInstant,
    O: OutputDevice,
    T: Scheduler<I>,
    S: StepFactory<O::Value, I::Duration>,
{
    /// Creates an idle sequencer. The output is left as it is.
    pub fn new(output: O, scheduler: &'t T) -> Self {
        Self {
            output,
            scheduler,
            state: SequencerState::Idle,
            factory: None,
            steps: None,
            loop_count: LoopCount::Infinite,
            cycle_emitted: false,
            pending: None,
            _instant: PhantomData,
        }
    }

    /// Cancels any running sequence and starts `spec`.
    ///
    /// A `Finite(0)` loop count writes `Level::OFF` and completes at once.
    ///
    /// # Errors
    /// * `SchedulingFailed` - The scheduler had no room for the next step;
    ///   the sequence halted with the current value applied
    /// * Any error from writing to the output
    pub fn start(&mut self, spec: SequenceSpec<S>) -> Result<(), DeviceError> {
        self.stop();

        let SequenceSpec {
            mut factory,
            loop_count,
            wait,
        } = spec;

        self.loop_count = loop_count;
        if loop_count.is_exhausted() {
            return self.finish();
        }

        self.steps = Some(factory.steps());
        self.factory = Some(factory);
        self.cycle_emitted = false;
        self.state = SequencerState::Running;
        log_debug!("sequence started, blocking={=bool}", wait);

        if wait {
            self.run_blocking()
        } else {
            self.step_and_schedule()
        }
    }

    /// Cancels the running sequence, if any. The output keeps its value.
    ///
    /// Safe to call at any time, any number of times.
    pub fn stop(&mut self) {
        if let Some(task) = self.pending.take() {
            self.scheduler.cancel(task);
        }
        self.steps = None;
        self.factory = None;
        if self.state == SequencerState::Running {
            self.state = SequencerState::Idle;
        }
    }

    /// Handles a fired timer.
    ///
    /// Returns `Ok(false)` for ids this sequencer is not waiting on, which
    /// includes timers belonging to a cancelled or superseded sequence.
    ///
    /// # Errors
    /// Same as [`start`](Self::start).
    pub fn on_timer(&mut self, task: TaskId) -> Result<bool, DeviceError> {
        if self.pending != Some(task) {
            return Ok(false);
        }
        self.pending = None;
        self.step_and_schedule()?;
        Ok(true)
    }

    /// Cancels any sequence and writes `value`. The state returns to `Idle`.
    pub fn set(&mut self, value: O::Value) -> Result<(), DeviceError> {
        self.stop();
        self.state = SequencerState::Idle;
        self.output.write(value)
    }

    /// Cancels any sequence and turns the output fully on.
    pub fn on(&mut self) -> Result<(), DeviceError> {
        self.set(O::Value::FULL)
    }

    /// Cancels any sequence and turns the output off.
    pub fn off(&mut self) -> Result<(), DeviceError> {
        self.set(O::Value::OFF)
    }

    /// Turns the output off if it is active, fully on otherwise.
    pub fn toggle(&mut self) -> Result<(), DeviceError> {
        if self.output.is_active()? {
            self.off()
        } else {
            self.on()
        }
    }

    /// Returns the output's current value.
    pub fn value(&self) -> Result<O::Value, DeviceError> {
        self.output.read()
    }

    /// Returns true if the output is not fully off.
    pub fn is_active(&self) -> Result<bool, DeviceError> {
        self.output.is_active()
    }

    /// Returns the current state.
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Returns true while a sequence is running.
    pub fn is_running(&self) -> bool {
        self.state == SequencerState::Running
    }

    /// Returns the timer this sequencer is waiting on, if any.
    pub fn pending_task(&self) -> Option<TaskId> {
        self.pending
    }

    /// Returns the driven output.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Stops any sequence and closes the output.
    pub fn close(&mut self) {
        self.stop();
        self.output.close();
    }

    /// Writes the next non-zero step, rebuilding the cycle as loops allow.
    ///
    /// Returns the step's duration, or `None` once the sequence has finished.
    fn advance(&mut self) -> Result<Option<I::Duration>, DeviceError> {
        loop {
            let Some(steps) = self.steps.as_mut() else {
                return Ok(None);
            };

            match steps.next() {
                Some(step) if step.duration.is_zero() => continue,
                Some(step) => {
                    self.output.write(step.value)?;
                    self.cycle_emitted = true;
                    return Ok(Some(step.duration));
                }
                None => {
                    // A cycle that produced nothing would restart forever.
                    if !self.cycle_emitted {
                        self.finish()?;
                        return Ok(None);
                    }
                    self.loop_count.consume();
                    if self.loop_count.is_exhausted() {
                        self.finish()?;
                        return Ok(None);
                    }
                    let Some(factory) = self.factory.as_mut() else {
                        return Ok(None);
                    };
                    self.steps = Some(factory.steps());
                    self.cycle_emitted = false;
                }
            }
        }
    }

    fn step_and_schedule(&mut self) -> Result<(), DeviceError> {
        let delay = match self.advance() {
            Ok(Some(delay)) => delay,
            Ok(None) => return Ok(()),
            Err(err) => {
                self.halt();
                return Err(err);
            }
        };

        let task = TaskId::next();
        match self.scheduler.schedule(task, delay) {
            Ok(()) => {
                self.pending = Some(task);
                Ok(())
            }
            Err(_) => {
                log_warn!("could not schedule step, sequence halted");
                self.halt();
                Err(DeviceError::SchedulingFailed)
            }
        }
    }

    fn run_blocking(&mut self) -> Result<(), DeviceError> {
        loop {
            match self.advance() {
                Ok(Some(delay)) => self.scheduler.block_for(delay),
                Ok(None) => return Ok(()),
                Err(err) => {
                    self.halt();
                    return Err(err);
                }
            }
        }
    }

    fn finish(&mut self) -> Result<(), DeviceError> {
        self.steps = None;
        self.factory = None;
        self.state = SequencerState::Complete;
        log_debug!("sequence complete");
        self.output.write(O::Value::OFF)
    }

    fn halt(&mut self) {
        self.steps = None;
        self.factory = None;
        self.pending = None;
        self.state = SequencerState::Halted;
    }
}

impl<'t, I, O, T, const N: usize> PatternSequencer<'t, I, O, T, N>
where
    I: TimeInstant,
    O: OutputDevice,
    T: Scheduler<I>,
{
    /// Blinks between fully on and off.
    pub fn blink(
        &mut self,
        timing: &Blink<I::Duration>,
        loop_count: LoopCount,
        wait: bool,
    ) -> Result<(), DeviceError> {
        self.blink_between(O::Value::FULL, O::Value::OFF, timing, loop_count, wait)
    }

    /// Blinks between two arbitrary values, e.g. two colours.
    pub fn blink_between(
        &mut self,
        on: O::Value,
        off: O::Value,
        timing: &Blink<I::Duration>,
        loop_count: LoopCount,
        wait: bool,
    ) -> Result<(), DeviceError> {
        let pattern = Pattern::blink(on, off, timing)?;
        self.start(SequenceSpec::new(pattern).loop_count(loop_count).wait(wait))
    }

    /// Fades fully on and back off.
    pub fn pulse(
        &mut self,
        fade_in: I::Duration,
        fade_out: I::Duration,
        loop_count: LoopCount,
        wait: bool,
    ) -> Result<(), DeviceError> {
        let pattern = Pattern::pulse(
            O::Value::FULL,
            O::Value::OFF,
            fade_in,
            fade_out,
            crate::DEFAULT_FPS,
        )?;
        self.start(SequenceSpec::new(pattern).loop_count(loop_count).wait(wait))
    }

    /// Fades through `values` in order, wrapping around.
    pub fn cycle(
        &mut self,
        values: &[O::Value],
        fade: I::Duration,
        loop_count: LoopCount,
        wait: bool,
    ) -> Result<(), DeviceError> {
        let pattern = Pattern::cycle(values, fade, I::Duration::ZERO, crate::DEFAULT_FPS)?;
        self.start(SequenceSpec::new(pattern).loop_count(loop_count).wait(wait))
    }
}

impl<I, O, T, S> Drop for ValueSequencer<'_, I, O, T, S>
where
    I: TimeInstant,
    O: OutputDevice,
    T: Scheduler<I>,
    S: StepFactory<O::Value, I::Duration>,
{
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            self.scheduler.cancel(task);
        }
    }
}
