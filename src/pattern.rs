use crate::DEFAULT_FPS;
use crate::device::Level;
use crate::time::TimeDuration;
use crate::types::{SequenceError, Step};
use heapless::Vec;

/// One segment of a [`Pattern`] cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<V, D> {
    /// Hold `value` for `duration`.
    Hold { value: V, duration: D },

    /// Move linearly from `from` to `to` over `duration`, in frames of
    /// `1 / fps` seconds.
    Fade { from: V, to: V, duration: D },
}

/// A restartable cycle of hold and fade segments.
///
/// A pattern describes exactly one cycle. Repetition is the sequencer's job:
/// every time a cycle ends it asks the pattern for a fresh [`PatternSteps`]
/// iterator, so a pattern never needs rewinding.
///
/// Fades are expanded lazily. A fade lasting `T` produces `⌊fps·T⌋` steps of
/// `1 / fps` each; step `i` (counting from 1) has progress `i / ⌊fps·T⌋`, so
/// the values move monotonically and the last step lands on the target.
///
/// # Type Parameters
/// * `V` - The value type (`f32` or `Srgb`)
/// * `D` - The duration type
/// * `N` - Maximum number of segments this pattern can hold
#[derive(Debug, Clone)]
pub struct Pattern<V, D, const N: usize> {
    segments: Vec<Segment<V, D>, N>,
    fps: u32,
}

/// Timing for [`Pattern::blink`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blink<D> {
    /// Time held at the "on" value.
    pub on_time: D,
    /// Time held at the "off" value.
    pub off_time: D,
    /// Time spent fading from off to on.
    pub fade_in: D,
    /// Time spent fading from on to off.
    pub fade_out: D,
    /// Fade frames per second.
    pub fps: u32,
}

impl<D: TimeDuration> Blink<D> {
    /// Symmetric blink with no fades: on and off for `on_time` each.
    pub fn new(on_time: D) -> Self {
        Self {
            on_time,
            off_time: on_time,
            fade_in: D::ZERO,
            fade_out: D::ZERO,
            fps: DEFAULT_FPS,
        }
    }

    /// Sets the off time.
    pub fn off_time(mut self, off_time: D) -> Self {
        self.off_time = off_time;
        self
    }

    /// Sets both fade times.
    pub fn fade(mut self, fade: D) -> Self {
        self.fade_in = fade;
        self.fade_out = fade;
        self
    }

    /// Sets the fade-out time only.
    pub fn fade_out(mut self, fade_out: D) -> Self {
        self.fade_out = fade_out;
        self
    }

    /// Sets the fade frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }
}

impl<V: Level, D: TimeDuration, const N: usize> Pattern<V, D, N> {
    /// Creates a new pattern builder.
    pub fn builder() -> PatternBuilder<V, D, N> {
        PatternBuilder::new()
    }

    /// Turns on and off repeatedly, with optional fades between the two.
    ///
    /// Zero-length parts are left out entirely, so a zero fade jumps
    /// straight to the endpoint and a zero hold never reaches the sequencer.
    ///
    /// # Errors
    /// * `EmptySequence` - Every time in `timing` is zero
    /// * `CapacityExceeded` - `N` is below the number of non-zero parts
    /// * `InvalidFps` / `ValueOutOfRange` - See [`PatternBuilder::build`]
    pub fn blink(on: V, off: V, timing: &Blink<D>) -> Result<Self, SequenceError> {
        let mut builder = Self::builder().fps(timing.fps);
        if !timing.fade_in.is_zero() {
            builder = builder.fade(off, on, timing.fade_in)?;
        }
        if !timing.on_time.is_zero() {
            builder = builder.hold(on, timing.on_time)?;
        }
        if !timing.fade_out.is_zero() {
            builder = builder.fade(on, off, timing.fade_out)?;
        }
        if !timing.off_time.is_zero() {
            builder = builder.hold(off, timing.off_time)?;
        }
        builder.build()
    }

    /// Fades in and out repeatedly without holding at either end.
    pub fn pulse(
        on: V,
        off: V,
        fade_in: D,
        fade_out: D,
        fps: u32,
    ) -> Result<Self, SequenceError> {
        let timing = Blink {
            on_time: D::ZERO,
            off_time: D::ZERO,
            fade_in,
            fade_out,
            fps,
        };
        Self::blink(on, off, &timing)
    }

    /// Visits `values` in order: fade from each value to the next (wrapping),
    /// then hold the next value.
    pub fn cycle(values: &[V], fade: D, hold: D, fps: u32) -> Result<Self, SequenceError> {
        Self::cycle_timed(values, &[fade], &[hold], fps)
    }

    /// Like [`cycle`](Self::cycle) with a duration per value.
    ///
    /// `fades[i]` is the fade leaving `values[i]` and `holds[i]` the hold on
    /// the value reached after it. Shorter slices wrap around, and an empty
    /// slice means zero.
    pub fn cycle_timed(
        values: &[V],
        fades: &[D],
        holds: &[D],
        fps: u32,
    ) -> Result<Self, SequenceError> {
        let mut builder = Self::builder().fps(fps);
        for (idx, &from) in values.iter().enumerate() {
            let to = values[(idx + 1) % values.len()];
            let fade = nth_wrapping(fades, idx);
            let hold = nth_wrapping(holds, idx);
            if !fade.is_zero() {
                builder = builder.fade(from, to, fade)?;
            }
            if !hold.is_zero() {
                builder = builder.hold(to, hold)?;
            }
        }
        builder.build()
    }

    /// Holds each `(value, duration)` pair in turn, e.g. the notes of a tune
    /// expressed as volume levels.
    pub fn from_steps(steps: &[(V, D)]) -> Result<Self, SequenceError> {
        let mut builder = Self::builder();
        for &(value, duration) in steps {
            builder = builder.hold(value, duration)?;
        }
        builder.build()
    }

    /// Returns a fresh iterator over one cycle of steps.
    pub fn steps(&self) -> PatternSteps<V, D, N> {
        PatternSteps {
            pattern: self.clone(),
            index: 0,
            frame: 0,
        }
    }

    /// Number of steps one cycle produces, fades expanded.
    pub fn step_count(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Hold { .. } => 1,
                Segment::Fade { duration, .. } => fade_frames(*duration, self.fps) as usize,
            })
            .sum()
    }

    /// Returns the number of segments in this pattern.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns a reference to the segment at the given index.
    pub fn get_segment(&self, index: usize) -> Option<&Segment<V, D>> {
        self.segments.get(index)
    }

    /// Returns the fade frame rate.
    pub fn fps(&self) -> u32 {
        self.fps
    }
}

fn nth_wrapping<D: TimeDuration>(durations: &[D], idx: usize) -> D {
    match durations.len() {
        0 => D::ZERO,
        len => durations[idx % len],
    }
}

/// Number of frames a fade of `duration` produces at `fps`: `⌊fps·T⌋`.
#[inline]
fn fade_frames<D: TimeDuration>(duration: D, fps: u32) -> u32 {
    let frames = duration.as_millis().saturating_mul(u64::from(fps)) / 1000;
    u32::try_from(frames).unwrap_or(u32::MAX)
}

/// Lazy iterator over one cycle of a [`Pattern`].
#[derive(Debug, Clone)]
pub struct PatternSteps<V, D, const N: usize> {
    pattern: Pattern<V, D, N>,
    index: usize,
    frame: u32,
}

impl<V: Level, D: TimeDuration, const N: usize> Iterator for PatternSteps<V, D, N> {
    type Item = Step<V, D>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let segment = *self.pattern.segments.get(self.index)?;
            match segment {
                Segment::Hold { value, duration } => {
                    self.index += 1;
                    return Some(Step::new(value, duration));
                }
                Segment::Fade { from, to, duration } => {
                    let frames = fade_frames(duration, self.pattern.fps);
                    if self.frame >= frames {
                        self.index += 1;
                        self.frame = 0;
                        continue;
                    }
                    self.frame += 1;
                    let t = self.frame as f32 / frames as f32;
                    let frame_time = D::from_millis(1000 / u64::from(self.pattern.fps));
                    return Some(Step::new(from.lerp(to, t), frame_time));
                }
            }
        }
    }
}

/// Produces a fresh step iterator each time a cycle starts.
///
/// Implemented for [`Pattern`] and for any closure returning an iterator of
/// steps, so custom generators can be handed to the sequencer directly.
pub trait StepFactory<V, D> {
    /// Iterator over one cycle.
    type Steps: Iterator<Item = Step<V, D>>;

    /// Starts a new cycle.
    fn steps(&mut self) -> Self::Steps;
}

impl<V: Level, D: TimeDuration, const N: usize> StepFactory<V, D> for Pattern<V, D, N> {
    type Steps = PatternSteps<V, D, N>;

    fn steps(&mut self) -> Self::Steps {
        Pattern::steps(self)
    }
}

impl<V, D, F, I> StepFactory<V, D> for F
where
    F: FnMut() -> I,
    I: Iterator<Item = Step<V, D>>,
{
    type Steps = I;

    fn steps(&mut self) -> Self::Steps {
        self()
    }
}

/// Builder for constructing validated patterns.
#[derive(Debug)]
pub struct PatternBuilder<V, D, const N: usize> {
    segments: Vec<Segment<V, D>, N>,
    fps: u32,
}

impl<V: Level, D: TimeDuration, const N: usize> PatternBuilder<V, D, N> {
    /// Creates a new empty builder at the default frame rate.
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            fps: DEFAULT_FPS,
        }
    }

    fn push(mut self, segment: Segment<V, D>) -> Result<Self, SequenceError> {
        self.segments
            .push(segment)
            .map_err(|_| SequenceError::CapacityExceeded)?;
        Ok(self)
    }

    /// Adds a hold segment.
    ///
    /// # Errors
    /// Returns `CapacityExceeded` if the pattern is full.
    pub fn hold(self, value: V, duration: D) -> Result<Self, SequenceError> {
        self.push(Segment::Hold { value, duration })
    }

    /// Adds a fade segment.
    ///
    /// # Errors
    /// Returns `CapacityExceeded` if the pattern is full.
    pub fn fade(self, from: V, to: V, duration: D) -> Result<Self, SequenceError> {
        self.push(Segment::Fade { from, to, duration })
    }

    /// Sets the fade frame rate. Default is [`DEFAULT_FPS`].
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Builds and validates the pattern.
    ///
    /// # Errors
    /// * `EmptySequence` - No segments were added
    /// * `InvalidFps` - Frame rate outside 1..=1000
    /// * `ValueOutOfRange` - A segment value is outside 0.0-1.0
    pub fn build(self) -> Result<Pattern<V, D, N>, SequenceError> {
        if self.segments.is_empty() {
            return Err(SequenceError::EmptySequence);
        }

        if !(1..=1000).contains(&self.fps) {
            return Err(SequenceError::InvalidFps(self.fps));
        }

        let in_range = self.segments.iter().all(|segment| match segment {
            Segment::Hold { value, .. } => value.is_normalized(),
            Segment::Fade { from, to, .. } => from.is_normalized() && to.is_normalized(),
        });
        if !in_range {
            return Err(SequenceError::ValueOutOfRange);
        }

        Ok(Pattern {
            segments: self.segments,
            fps: self.fps,
        })
    }
}

impl<V: Level, D: TimeDuration, const N: usize> Default for PatternBuilder<V, D, N> {
    fn default() -> Self {
        Self::new()
    }
}
