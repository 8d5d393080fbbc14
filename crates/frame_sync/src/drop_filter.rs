//! Dropped-frame rate estimation.
//!
//! A first-order low-pass filter over the per-cycle dropped-frame count,
//! with input clamping and a start-up warm-up that forces the input to 0.

use contracts::DropFilterConfig;

/// Discrete first-order low-pass filter
///
/// `x += (input - x) * k` with `k = dt / tau`.
#[derive(Debug, Clone)]
pub struct FirstOrderFilter {
    x: f64,
    k: f64,
}

impl FirstOrderFilter {
    /// Create a filter with initial value `x0`, time constant `tau` and
    /// sample period `dt` (both seconds)
    pub fn new(x0: f64, tau: f64, dt: f64) -> Self {
        Self { x: x0, k: dt / tau }
    }

    /// Feed one sample and return the filtered value
    pub fn update(&mut self, input: f64) -> f64 {
        self.x += (input - self.x) * self.k;
        self.x
    }

    pub fn value(&self) -> f64 {
        self.x
    }

    pub fn reset(&mut self, x: f64) {
        self.x = x;
    }
}

/// Smoothed dropped-frames-per-cycle estimate
#[derive(Debug, Clone)]
pub struct DropRateEstimator {
    filter: FirstOrderFilter,
    max_dropped: u32,
    warmup_cycles: u32,
    cycles: u32,
}

impl DropRateEstimator {
    /// Create an estimator from filter settings
    pub fn new(config: &DropFilterConfig) -> Self {
        Self {
            filter: FirstOrderFilter::new(
                0.0,
                config.time_constant_s,
                config.sample_period_s(),
            ),
            max_dropped: config.max_dropped_per_cycle,
            warmup_cycles: config.warmup_cycles,
            cycles: 0,
        }
    }

    /// Feed this cycle's raw dropped-frame count, return the smoothed value.
    ///
    /// Input is clamped first, then forced to 0 while warming up.
    pub fn update(&mut self, dropped: u32) -> f64 {
        let mut input = f64::from(dropped.min(self.max_dropped));
        if self.cycles < self.warmup_cycles {
            input = 0.0;
        }
        self.cycles = self.cycles.saturating_add(1);
        self.filter.update(input)
    }

    /// Current smoothed value
    pub fn smoothed(&self) -> f64 {
        self.filter.value()
    }

    /// Reported ratio `s / (1 + s)`, always in `[0, 1)`
    pub fn ratio(&self) -> f64 {
        let s = self.filter.value();
        s / (1.0 + s)
    }

    pub fn is_warming_up(&self) -> bool {
        self.cycles < self.warmup_cycles
    }
}

impl Default for DropRateEstimator {
    fn default() -> Self {
        Self::new(&DropFilterConfig::default())
    }
}
