//! Integer smoothing filters feeding the telemetry sample columns.
//!
//! Stage 1 is a sliding-window moving average over the raw reading. Stage 2
//! is a first-order low-pass applied to the stage 1 output. Both run in fixed
//! point so the bench task never touches the FPU or allocates.

use heapless::HistoryBuf;

use super::{TelemetrySample, TimestampMillis};

/// Default number of raw readings averaged by stage 1.
pub const MOVING_WINDOW_LEN: usize = 8;

/// Single-input single-output filter over integer samples.
pub trait SampleFilter {
    /// Feeds `input` through the filter and returns the filtered value.
    fn update(&mut self, input: i32) -> i32;

    /// Drops any accumulated history.
    fn reset(&mut self);
}

/// Sliding-window arithmetic mean of the last `N` readings.
pub struct MovingAverage<const N: usize> {
    window: HistoryBuf<i32, N>,
}

impl<const N: usize> MovingAverage<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window: HistoryBuf::new(),
        }
    }

    /// Number of readings currently inside the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns `true` before the first reading arrives.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleFilter for MovingAverage<N> {
    fn update(&mut self, input: i32) -> i32 {
        self.window.write(input);

        let sum: i64 = self.window.as_slice().iter().copied().map(i64::from).sum();
        let count = i64::try_from(self.window.len()).unwrap_or(i64::MAX);
        narrow(sum / count)
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Smoothing factor for [`LowPass`], expressed as `numerator / denominator`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LowPassConfig {
    numerator: u16,
    denominator: u16,
}

impl LowPassConfig {
    /// Default smoothing factor of one quarter.
    pub const DEFAULT: Self = Self::new(1, 4);

    /// Builds a smoothing factor, clamping it into `(0, 1]`.
    pub const fn new(numerator: u16, denominator: u16) -> Self {
        let denominator = if denominator == 0 { 1 } else { denominator };
        let numerator = if numerator == 0 {
            1
        } else if numerator > denominator {
            denominator
        } else {
            numerator
        };
        Self {
            numerator,
            denominator,
        }
    }

    pub const fn numerator(&self) -> u16 {
        self.numerator
    }

    pub const fn denominator(&self) -> u16 {
        self.denominator
    }
}

impl Default for LowPassConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// First-order IIR low-pass: `y += (x - y) * alpha`.
///
/// The first reading after construction or [`SampleFilter::reset`] passes
/// through unchanged so the output does not ramp up from zero. The state is
/// held scaled by the factor's denominator and every division rounds to
/// nearest, so a constant input is always reached exactly.
pub struct LowPass {
    config: LowPassConfig,
    /// `y * denominator`.
    state: Option<i64>,
}

impl LowPass {
    #[must_use]
    pub const fn new(config: LowPassConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub const fn config(&self) -> LowPassConfig {
        self.config
    }
}

impl SampleFilter for LowPass {
    fn update(&mut self, input: i32) -> i32 {
        let denominator = i64::from(self.config.denominator);
        let target = i64::from(input) * denominator;
        let next = match self.state {
            None => target,
            Some(previous) => {
                let delta = i128::from(target - previous) * i128::from(self.config.numerator);
                previous + narrow_i64(div_round(delta, i128::from(denominator)))
            }
        };
        self.state = Some(next);
        narrow(narrow_i64(div_round(i128::from(next), i128::from(denominator))))
    }

    fn reset(&mut self) {
        self.state = None;
    }
}

/// Two-stage filter chain that turns raw readings into [`TelemetrySample`]s.
pub struct SamplePipeline<const N: usize = MOVING_WINDOW_LEN> {
    stage1: MovingAverage<N>,
    stage2: LowPass,
}

impl<const N: usize> SamplePipeline<N> {
    #[must_use]
    pub const fn new(lowpass: LowPassConfig) -> Self {
        Self {
            stage1: MovingAverage::new(),
            stage2: LowPass::new(lowpass),
        }
    }

    /// Filters `raw` and stamps the result with `timestamp_ms`.
    pub fn sample(&mut self, timestamp_ms: TimestampMillis, raw: i32) -> TelemetrySample {
        let stage1 = self.stage1.update(raw);
        let stage2 = self.stage2.update(stage1);
        TelemetrySample::new(timestamp_ms, raw, stage1, stage2)
    }

    pub fn reset(&mut self) {
        self.stage1.reset();
        self.stage2.reset();
    }
}

impl<const N: usize> Default for SamplePipeline<N> {
    fn default() -> Self {
        Self::new(LowPassConfig::DEFAULT)
    }
}

/// Integer division rounding half away from zero. `divisor` is positive.
fn div_round(value: i128, divisor: i128) -> i128 {
    let half = divisor / 2;
    if value < 0 {
        (value - half) / divisor
    } else {
        (value + half) / divisor
    }
}

fn narrow_i64(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

fn narrow(value: i64) -> i32 {
    match i32::try_from(value) {
        Ok(value) => value,
        Err(_) if value < 0 => i32::MIN,
        Err(_) => i32::MAX,
    }
}
