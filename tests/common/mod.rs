//! Shared test infrastructure for pico-sequencer integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType as DigitalErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{Error as PwmError, ErrorKind as PwmErrorKind, ErrorType as PwmErrorType, SetDutyCycle};
use pico_sequencer::{
    DeviceError, Level, OutputDevice, PinInterrupt, Scheduler, SchedulingFailed, SetFrequency,
    TaskId, TimeDuration, TimeInstant, TimeSource,
};

// ============================================================================
// Mock Time Types
// ============================================================================

/// Mock duration type for testing (wraps milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestDuration(pub u64);

impl TimeDuration for TestDuration {
    const ZERO: Self = TestDuration(0);

    fn as_millis(&self) -> u64 {
        self.0
    }

    fn from_millis(millis: u64) -> Self {
        TestDuration(millis)
    }
}

/// Mock instant type for testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestInstant(pub u64);

impl TimeInstant for TestInstant {
    type Duration = TestDuration;

    fn duration_since(&self, earlier: Self) -> Self::Duration {
        TestDuration(self.0 - earlier.0)
    }
}

// ============================================================================
// Mock Scheduler
// ============================================================================

/// Mock scheduler with a virtual clock and a bounded timer queue.
///
/// Nothing fires on its own: tests call [`run_until`](Self::run_until) or
/// [`run_all`](Self::run_all), which pop due tasks in time order, move the
/// clock to each due time and hand the id to the supplied handler.
pub struct MockScheduler {
    now: Cell<u64>,
    queue: RefCell<heapless::Vec<(u64, TaskId), 16>>,
    capacity: Cell<usize>,
    blocked: RefCell<heapless::Vec<u64, 64>>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self {
            now: Cell::new(0),
            queue: RefCell::new(heapless::Vec::new()),
            capacity: Cell::new(16),
            blocked: RefCell::new(heapless::Vec::new()),
        }
    }

    /// Limits how many timers may be queued at once.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.set(capacity);
    }

    pub fn set_time(&self, millis: u64) {
        self.now.set(millis);
    }

    pub fn time(&self) -> u64 {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_queued(&self, task: TaskId) -> bool {
        self.queue.borrow().iter().any(|(_, queued)| *queued == task)
    }

    /// Delays passed to `block_for`, in order.
    pub fn blocked(&self) -> heapless::Vec<u64, 64> {
        self.blocked.borrow().clone()
    }

    fn pop_due(&self, until: u64) -> Option<(u64, TaskId)> {
        let mut queue = self.queue.borrow_mut();
        let (idx, _) = queue
            .iter()
            .enumerate()
            .filter(|(_, (due, _))| *due <= until)
            .min_by_key(|(_, (due, _))| *due)?;
        Some(queue.remove(idx))
    }

    /// Fires every task due at or before `until`, then sets the clock to
    /// `until`. Tasks queued by the handler are fired too if they fall due.
    pub fn run_until(&self, until: u64, mut handler: impl FnMut(TaskId)) {
        while let Some((due, task)) = self.pop_due(until) {
            self.now.set(due.max(self.now.get()));
            handler(task);
        }
        self.now.set(until.max(self.now.get()));
    }

    /// Fires tasks until the queue is empty or `limit` tasks have fired.
    pub fn run_all(&self, limit: usize, mut handler: impl FnMut(TaskId)) {
        for _ in 0..limit {
            let Some((due, task)) = self.pop_due(u64::MAX) else {
                return;
            };
            self.now.set(due.max(self.now.get()));
            handler(task);
        }
    }
}

impl TimeSource<TestInstant> for MockScheduler {
    fn now(&self) -> TestInstant {
        TestInstant(self.now.get())
    }
}

impl Scheduler<TestInstant> for MockScheduler {
    fn schedule(&self, task: TaskId, delay: TestDuration) -> Result<(), SchedulingFailed> {
        let mut queue = self.queue.borrow_mut();
        if queue.len() >= self.capacity.get() {
            return Err(SchedulingFailed);
        }
        queue
            .push((self.now.get() + delay.0, task))
            .map_err(|_| SchedulingFailed)
    }

    fn cancel(&self, task: TaskId) {
        self.queue.borrow_mut().retain(|(_, queued)| *queued != task);
    }

    fn block_for(&self, delay: TestDuration) {
        let _ = self.blocked.borrow_mut().push(delay.0);
        self.now.set(self.now.get() + delay.0);
    }
}

// ============================================================================
// Mock PWM
// ============================================================================

/// Error raised by a [`MockPwm`] set up to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPwmFault;

impl PwmError for MockPwmFault {
    fn kind(&self) -> PwmErrorKind {
        PwmErrorKind::Other
    }
}

/// Mock PWM output that records every raw duty written
pub struct MockPwm {
    max_duty: u16,
    duty: u16,
    frequency: u32,
    history: heapless::Vec<u16, 64>,
    fail_after: Option<usize>,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::with_max_duty(u16::MAX)
    }

    pub fn with_max_duty(max_duty: u16) -> Self {
        Self {
            max_duty,
            duty: 0,
            frequency: 1000,
            history: heapless::Vec::new(),
            fail_after: None,
        }
    }

    /// Accepts `writes` duty writes, then rejects every later one.
    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_after: Some(writes),
            ..Self::new()
        }
    }

    pub fn duty(&self) -> u16 {
        self.duty
    }

    pub fn history(&self) -> &[u16] {
        &self.history
    }
}

impl PwmErrorType for MockPwm {
    type Error = MockPwmFault;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max_duty
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if self.fail_after.is_some_and(|limit| self.history.len() >= limit) {
            return Err(MockPwmFault);
        }
        self.duty = duty;
        let _ = self.history.push(duty);
        Ok(())
    }
}

impl SetFrequency for MockPwm {
    fn frequency(&self) -> u32 {
        self.frequency
    }

    fn set_frequency(&mut self, hz: u32) {
        self.frequency = hz;
    }
}

// ============================================================================
// Mock Pins
// ============================================================================

/// Mock push-pull output that records logic levels
pub struct MockOutputPin {
    high: bool,
    history: heapless::Vec<bool, 32>,
}

impl MockOutputPin {
    pub fn new() -> Self {
        Self {
            high: false,
            history: heapless::Vec::new(),
        }
    }

    pub fn is_set_high(&self) -> bool {
        self.high
    }

    pub fn history(&self) -> &[bool] {
        &self.history
    }
}

impl DigitalErrorType for MockOutputPin {
    type Error = Infallible;
}

impl OutputPin for MockOutputPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        let _ = self.history.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        let _ = self.history.push(true);
        Ok(())
    }
}

/// Level and interrupt state shared between a test and its [`MockInputPin`]
pub struct PinLine {
    high: Cell<bool>,
    irq_enabled: Cell<bool>,
}

impl PinLine {
    pub fn new(high: bool) -> Self {
        Self {
            high: Cell::new(high),
            irq_enabled: Cell::new(false),
        }
    }

    pub fn set_high(&self, high: bool) {
        self.high.set(high);
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled.get()
    }

    pub fn pin(&self) -> MockInputPin<'_> {
        MockInputPin { line: self }
    }
}

/// Mock input pin backed by a [`PinLine`] the test can drive
pub struct MockInputPin<'a> {
    line: &'a PinLine,
}

impl DigitalErrorType for MockInputPin<'_> {
    type Error = Infallible;
}

impl InputPin for MockInputPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.line.high.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.line.high.get())
    }
}

impl PinInterrupt for MockInputPin<'_> {
    fn enable_edge_interrupt(&mut self) {
        self.line.irq_enabled.set(true);
    }

    fn disable_edge_interrupt(&mut self) {
        self.line.irq_enabled.set(false);
    }
}

// ============================================================================
// Mock Output Device
// ============================================================================

/// Mock output that records every value written
pub struct MockOutput {
    value: f32,
    history: heapless::Vec<f32, 128>,
    closed: bool,
}

impl MockOutput {
    pub fn new() -> Self {
        Self {
            value: 0.0,
            history: heapless::Vec::new(),
            closed: false,
        }
    }

    pub fn history(&self) -> &[f32] {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl OutputDevice for MockOutput {
    type Value = f32;

    fn read(&self) -> Result<f32, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        Ok(self.value)
    }

    fn write(&mut self, value: f32) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        if !value.is_normalized() {
            return Err(DeviceError::InvalidValue);
        }
        self.value = value;
        let _ = self.history.push(value);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ============================================================================
// Test Helper Functions
// ============================================================================

/// Compare two values with floating-point tolerance
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.001
}
