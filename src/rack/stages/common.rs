use std::f32::consts::PI;

/// Lowest centre/corner frequency a filter is designed at.
const MIN_FILTER_HZ: f32 = 10.0;
/// Corner frequencies are kept below this fraction of the sample rate so the
/// bilinear pre-warp never folds past Nyquist.
const MAX_FILTER_FRACTION: f32 = 0.45;
const MIN_Q: f32 = 0.05;

/// Convert decibels to linear amplitude.
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels, flooring silence at `floor_db`.
#[inline]
pub fn lin_to_db(lin: f32, floor_db: f32) -> f32 {
    if lin > 1e-10 {
        (20.0 * lin.log10()).max(floor_db)
    } else {
        floor_db
    }
}

/// Root-mean-square level of a block; an empty block reads as silence.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

#[inline]
pub fn lerp(from: f32, to: f32, amount: f32) -> f32 {
    (to - from).mul_add(amount, from)
}

/// Target/current pair that ramps linearly towards its target over a fixed
/// number of samples.
///
/// A new target restarts the ramp from the current value, so the value never
/// overshoots and always lands exactly on the target when the ramp ends.
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    step: f32,
    countdown: usize,
    ramp_samples: usize,
}

impl SmoothedValue {
    pub const fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            countdown: 0,
            ramp_samples: 0,
        }
    }

    /// Set the ramp length and jump straight to the current target.
    pub fn reset(&mut self, sample_rate: f32, ramp_ms: f32) {
        self.ramp_samples = (sample_rate * ramp_ms * 0.001).floor().max(0.0) as usize;
        self.set_current_and_target(self.target);
    }

    pub const fn set_current_and_target(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.countdown = 0;
    }

    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        if self.ramp_samples == 0 {
            self.set_current_and_target(target);
            return;
        }
        self.target = target;
        self.countdown = self.ramp_samples;
        self.step = (target - self.current) / self.ramp_samples as f32;
    }

    /// Advance one sample.
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.countdown == 0 {
            return self.target;
        }
        self.countdown -= 1;
        if self.countdown == 0 {
            self.current = self.target;
        } else {
            self.current += self.step;
        }
        self.current
    }

    /// Advance `samples` samples at once.
    pub fn skip(&mut self, samples: usize) -> f32 {
        if samples >= self.countdown {
            self.countdown = 0;
            self.current = self.target;
        } else {
            self.countdown -= samples;
            self.current = self.step.mul_add(samples as f32, self.current);
        }
        self.current
    }

    pub const fn current(&self) -> f32 {
        self.current
    }

    pub const fn target(&self) -> f32 {
        self.target
    }
}

/// Normalised second-order section coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoeffs {
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalised(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Returns `(cos ω, α)` for a bounded frequency and Q, so `a0` stays
    /// strictly positive.
    fn design(sample_rate: f32, freq: f32, q: f32) -> (f32, f32) {
        let max_freq = (sample_rate * MAX_FILTER_FRACTION).max(MIN_FILTER_HZ);
        let freq = freq.clamp(MIN_FILTER_HZ, max_freq);
        let omega = 2.0 * PI * freq / sample_rate;
        let alpha = omega.sin() / (2.0 * q.max(MIN_Q));
        (omega.cos(), alpha)
    }

    pub fn low_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let (cos_omega, alpha) = Self::design(sample_rate, freq, q);
        let b1 = 1.0 - cos_omega;
        Self::normalised(
            b1 / 2.0,
            b1,
            b1 / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    pub fn high_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let (cos_omega, alpha) = Self::design(sample_rate, freq, q);
        let b0 = (1.0 + cos_omega) / 2.0;
        Self::normalised(
            b0,
            -(1.0 + cos_omega),
            b0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Band-pass with 0 dB gain at the centre frequency.
    pub fn band_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let (cos_omega, alpha) = Self::design(sample_rate, freq, q);
        Self::normalised(
            alpha,
            0.0,
            -alpha,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Peaking bell; `gain` is linear amplitude at the centre frequency.
    pub fn peak(sample_rate: f32, freq: f32, q: f32, gain: f32) -> Self {
        let (cos_omega, alpha) = Self::design(sample_rate, freq, q);
        let a = gain.max(1e-6).sqrt();
        Self::normalised(
            alpha.mul_add(a, 1.0),
            -2.0 * cos_omega,
            (-alpha).mul_add(a, 1.0),
            1.0 + alpha / a,
            -2.0 * cos_omega,
            1.0 - alpha / a,
        )
    }
}

/// Direct form I biquad holding the state of one channel.
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            ..Self::default()
        }
    }

    /// Swap coefficients, keeping the signal history.
    pub const fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub const fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// DC blocker using a first-order high-pass filter.
///
/// `y[n] = x[n] - x[n-1] + R * y[n-1]`
///
/// Reference: <https://ccrma.stanford.edu/~jos/fp/DC_Blocker.html>
#[derive(Debug, Clone)]
pub struct DcBlocker {
    x_prev: f32,
    y_prev: f32,
    coeff: f32,
}

impl DcBlocker {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let coeff = (-2.0 * PI * cutoff_hz / sample_rate).exp();
        Self {
            x_prev: 0.0,
            y_prev: 0.0,
            coeff,
        }
    }

    pub const fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.coeff.mul_add(self.y_prev, input - self.x_prev);
        self.x_prev = input;
        self.y_prev = output;
        output
    }
}
