use crate::rack::stages::ProcessSpec;
use crate::rack::stages::common::{Biquad, BiquadCoeffs, SmoothedValue, rms};
use log::debug;
use std::f32::consts::FRAC_1_SQRT_2;

/// Low band carrying the vocal fundamental weight.
const LOW_BAND_HZ: f32 = 350.0;
/// Harsh, resonant upper-mid band.
const MID_BAND_HZ: f32 = 3500.0;
const MID_BAND_Q: f32 = 0.4;
/// Air band; reported for metering only.
const HIGH_BAND_HZ: f32 = 7000.0;

const INTENSITY_RAMP_MS: f32 = 50.0;
const SPECTRAL_RAMP_MS: f32 = 100.0;

/// RMS is doubled before clamping, so anything at or above -6 dBFS RMS reads
/// as full intensity.
const INTENSITY_BOOST: f32 = 2.0;

/// Keeps the band ratios finite on silence.
pub const RATIO_EPSILON: f32 = 1e-4;

/// The three control signals every stage reacts to, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Features {
    /// Overall loudness.
    pub intensity: f32,
    /// Share of low-frequency energy.
    pub density: f32,
    /// Upper-mid harshness.
    pub timbre: f32,
}

/// Turns each audio block into smoothed, bounded control signals.
///
/// Analysis runs on the sidechain when one is supplied that covers the whole
/// block, otherwise on the main signal. Multi-channel sources are averaged to
/// mono for the band measurements.
pub struct FeatureDetector {
    low: Biquad,
    mid: Biquad,
    high: Biquad,
    intensity: SmoothedValue,
    density: SmoothedValue,
    timbre: SmoothedValue,
    air: SmoothedValue,
    mono: Vec<f32>,
    band: Vec<f32>,
    features: Features,
    air_level: f32,
}

impl Default for FeatureDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureDetector {
    pub fn new() -> Self {
        Self {
            low: Biquad::default(),
            mid: Biquad::default(),
            high: Biquad::default(),
            intensity: SmoothedValue::new(0.0),
            density: SmoothedValue::new(0.0),
            timbre: SmoothedValue::new(0.0),
            air: SmoothedValue::new(0.0),
            mono: Vec::new(),
            band: Vec::new(),
            features: Features::default(),
            air_level: 0.0,
        }
    }

    pub fn prepare(&mut self, spec: &ProcessSpec) {
        let sr = spec.sample_rate;
        self.low = Biquad::new(BiquadCoeffs::low_pass(sr, LOW_BAND_HZ, FRAC_1_SQRT_2));
        self.mid = Biquad::new(BiquadCoeffs::band_pass(sr, MID_BAND_HZ, MID_BAND_Q));
        self.high = Biquad::new(BiquadCoeffs::high_pass(sr, HIGH_BAND_HZ, FRAC_1_SQRT_2));

        self.intensity.reset(sr, INTENSITY_RAMP_MS);
        self.density.reset(sr, SPECTRAL_RAMP_MS);
        self.timbre.reset(sr, SPECTRAL_RAMP_MS);
        self.air.reset(sr, SPECTRAL_RAMP_MS);

        self.mono = vec![0.0; spec.max_block_size];
        self.band = vec![0.0; spec.max_block_size];
        self.reset();
        debug!(
            "feature detector prepared: {} Hz, {} sample scratch",
            sr, spec.max_block_size
        );
    }

    /// Forget all filter history and return every signal to zero.
    pub fn reset(&mut self) {
        for filter in [&mut self.low, &mut self.mid, &mut self.high] {
            filter.reset();
        }
        for smoother in [
            &mut self.intensity,
            &mut self.density,
            &mut self.timbre,
            &mut self.air,
        ] {
            smoother.set_current_and_target(0.0);
        }
        self.features = Features::default();
        self.air_level = 0.0;
    }

    /// Measure one block. Zero-length blocks leave every signal untouched.
    pub fn process<M, S>(&mut self, main: &[M], sidechain: Option<&[S]>)
    where
        M: AsRef<[f32]>,
        S: AsRef<[f32]>,
    {
        let num_samples = main.first().map_or(0, |channel| channel.as_ref().len());
        if num_samples == 0 {
            return;
        }

        match sidechain.filter(|sc| covers(sc, num_samples)) {
            Some(sc) => self.analyze(sc, num_samples),
            None => self.analyze(main, num_samples),
        }
    }

    fn analyze<S: AsRef<[f32]>>(&mut self, source: &[S], num_samples: usize) {
        debug_assert!(
            num_samples <= self.mono.len(),
            "block of {num_samples} exceeds prepared scratch of {}",
            self.mono.len()
        );

        // intensity: full-band RMS across every channel
        let sum_sq: f32 = source
            .iter()
            .flat_map(|channel| channel.as_ref()[..num_samples].iter())
            .map(|s| s * s)
            .sum();
        let raw_intensity = (sum_sq / (num_samples * source.len()) as f32).sqrt();
        self.intensity
            .set_target((raw_intensity * INTENSITY_BOOST).clamp(0.0, 1.0));

        // mono downmix for the band measurements
        let mono = &mut self.mono[..num_samples];
        mono.copy_from_slice(&source[0].as_ref()[..num_samples]);
        if source.len() > 1 {
            for channel in &source[1..] {
                for (m, s) in mono.iter_mut().zip(channel.as_ref()) {
                    *m += s;
                }
            }
            let scale = 1.0 / source.len() as f32;
            for m in mono.iter_mut() {
                *m *= scale;
            }
        }

        let total = rms(mono) + RATIO_EPSILON;
        let scratch = &mut self.band[..num_samples];
        let low = band_rms(&mut self.low, mono, scratch);
        let mid = band_rms(&mut self.mid, mono, scratch);
        let high = band_rms(&mut self.high, mono, scratch);

        self.density.set_target((low / total).clamp(0.0, 1.0));
        self.timbre.set_target((mid / (0.5 * total)).clamp(0.0, 1.0));
        self.air.set_target((high / total).clamp(0.0, 1.0));

        self.features = Features {
            intensity: self.intensity.skip(num_samples).clamp(0.0, 1.0),
            density: self.density.skip(num_samples).clamp(0.0, 1.0),
            timbre: self.timbre.skip(num_samples).clamp(0.0, 1.0),
        };
        self.air_level = self.air.skip(num_samples).clamp(0.0, 1.0);
    }

    pub const fn features(&self) -> Features {
        self.features
    }

    pub const fn intensity(&self) -> f32 {
        self.features.intensity
    }

    pub const fn density(&self) -> f32 {
        self.features.density
    }

    pub const fn timbre(&self) -> f32 {
        self.features.timbre
    }

    /// Smoothed high-band ratio. Not consumed by any stage.
    pub const fn air(&self) -> f32 {
        self.air_level
    }
}

fn covers<S: AsRef<[f32]>>(sidechain: &[S], num_samples: usize) -> bool {
    !sidechain.is_empty()
        && sidechain
            .iter()
            .all(|channel| channel.as_ref().len() >= num_samples)
}

fn band_rms(filter: &mut Biquad, mono: &[f32], scratch: &mut [f32]) -> f32 {
    scratch.copy_from_slice(mono);
    filter.process_block(scratch);
    rms(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rack::stages::common::test_signals::sine;

    const SR: f32 = 48_000.0;

    fn prepared(max_block_size: usize) -> FeatureDetector {
        let mut detector = FeatureDetector::new();
        detector.prepare(&ProcessSpec {
            sample_rate: SR,
            max_block_size,
            channels: 2,
        });
        detector
    }

    fn feed(detector: &mut FeatureDetector, signal: &[f32], block: usize) {
        for chunk in signal.chunks(block) {
            detector.process(&[chunk, chunk], None::<&[&[f32]]>);
        }
    }

    #[test]
    fn silence_converges_to_zero_for_any_block_size() {
        for block in [1, 64, 333, 512] {
            let mut detector = prepared(512);
            feed(&mut detector, &sine(200.0, 0.8, SR, 4800), block);
            assert!(detector.intensity() > 0.0);

            feed(&mut detector, &vec![0.0; 9600], block);
            let f = detector.features();
            assert_eq!(f.intensity, 0.0, "block {block}: {f:?}");
            // filter tails may leave denormal residue, never NaN
            assert!(f.density.is_finite() && f.density < 1e-6, "block {block}: {f:?}");
            assert!(f.timbre.is_finite() && f.timbre < 1e-6, "block {block}: {f:?}");
            assert!(detector.air() < 1e-6);
        }
    }

    #[test]
    fn prepare_again_starts_from_silence() {
        let mut detector = prepared(512);
        feed(&mut detector, &sine(100.0, 0.9, SR, 9600), 512);
        assert!(detector.intensity() > 0.5);
        assert!(detector.density() > 0.5);

        detector.prepare(&ProcessSpec {
            sample_rate: 44_100.0,
            max_block_size: 256,
            channels: 1,
        });
        assert_eq!(detector.features(), Features::default());
        assert_eq!(detector.air(), 0.0);

        // the first block after a new configuration ramps up from zero
        let loud = vec![0.5f32; 64];
        detector.process(&[&loud[..]], None::<&[&[f32]]>);
        assert!(detector.intensity() < 0.1, "intensity {}", detector.intensity());
    }

    #[test]
    fn loud_signal_saturates_intensity() {
        let mut detector = prepared(512);
        feed(&mut detector, &sine(440.0, 1.0, SR, 9600), 512);
        assert_eq!(detector.intensity(), 1.0);
    }

    #[test]
    fn intensity_ramps_instead_of_jumping() {
        let mut detector = prepared(64);
        let loud = vec![0.5f32; 64];
        detector.process(&[&loud[..]], None::<&[&[f32]]>);
        let first = detector.intensity();
        assert!(first > 0.0 && first < 0.1, "first block jumped to {first}");
    }

    #[test]
    fn low_tone_reads_dense_and_soft() {
        let mut detector = prepared(512);
        feed(&mut detector, &sine(100.0, 0.3, SR, 24_000), 512);
        assert!(detector.density() > 0.8, "density {}", detector.density());
        assert!(detector.timbre() < 0.3, "timbre {}", detector.timbre());
    }

    #[test]
    fn upper_mid_tone_reads_harsh_and_thin() {
        let mut detector = prepared(512);
        feed(&mut detector, &sine(3500.0, 0.3, SR, 24_000), 512);
        assert!(detector.timbre() > 0.9, "timbre {}", detector.timbre());
        assert!(detector.density() < 0.1, "density {}", detector.density());
    }

    #[test]
    fn sidechain_takes_over_when_long_enough() {
        let mut detector = prepared(256);
        let quiet = vec![0.0f32; 256];
        let loud = sine(300.0, 0.9, SR, 256);

        for _ in 0..40 {
            detector.process(&[&quiet[..]], Some(&[&loud[..]][..]));
        }
        assert!(detector.intensity() > 0.5);
    }

    #[test]
    fn short_sidechain_falls_back_to_main() {
        let mut detector = prepared(256);
        let quiet = vec![0.0f32; 256];
        let loud = sine(300.0, 0.9, SR, 128);

        for _ in 0..40 {
            detector.process(&[&quiet[..]], Some(&[&loud[..]][..]));
        }
        assert_eq!(detector.intensity(), 0.0);
    }

    #[test]
    fn zero_length_block_is_a_no_op() {
        let mut detector = prepared(64);
        feed(&mut detector, &vec![0.5; 640], 64);
        let before = detector.features();
        let empty: [f32; 0] = [];
        detector.process(&[&empty[..]], None::<&[&[f32]]>);
        assert_eq!(detector.features(), before);
    }
}
