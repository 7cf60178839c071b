use crate::rack::detector::Features;
use crate::rack::params::StageControls;
use crate::rack::stages::common::{Biquad, BiquadCoeffs};
use crate::rack::stages::{ProcessSpec, Stage, StageId};
use std::f32::consts::FRAC_1_SQRT_2;

/// The clarity layer lives above this corner.
const CLARITY_HPF_HZ: f32 = 6000.0;
const CLARITY_MIX: f32 = 0.3;

pub fn grit_drive(grit_amount: f32, intensity: f32, density: f32) -> f32 {
    grit_amount.mul_add(4.0f32.mul_add(intensity, 2.0 * density), 1.0)
}

pub fn clarity_drive(clarity_amount: f32, timbre: f32) -> f32 {
    (clarity_amount * 3.0).mul_add(1.0 - timbre, 1.0)
}

/// Saturating low-mid grit plus a high-passed, soft-clipped clarity layer.
///
/// Grit replaces the main signal with `tanh(x * drive)`; clarity is taken from
/// the pre-grit signal and added back on top.
pub struct HarmonicsStage {
    grit_amount: f32,
    clarity_amount: f32,
    clarity_hpf: Vec<Biquad>,
    scratch: Vec<Vec<f32>>,
}

impl Default for HarmonicsStage {
    fn default() -> Self {
        Self::new()
    }
}

impl HarmonicsStage {
    pub const fn new() -> Self {
        Self {
            grit_amount: 0.0,
            clarity_amount: 0.0,
            clarity_hpf: Vec::new(),
            scratch: Vec::new(),
        }
    }
}

impl Stage for HarmonicsStage {
    fn id(&self) -> StageId {
        StageId::Harmonics
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        let coeffs = BiquadCoeffs::high_pass(spec.sample_rate, CLARITY_HPF_HZ, FRAC_1_SQRT_2);
        self.clarity_hpf = vec![Biquad::new(coeffs); spec.channels];
        self.scratch = vec![vec![0.0; spec.max_block_size]; spec.channels];
    }

    fn reset(&mut self) {
        self.clarity_hpf.iter_mut().for_each(Biquad::reset);
    }

    fn update(&mut self, controls: &StageControls) {
        self.grit_amount = controls.grit_amount;
        self.clarity_amount = controls.clarity_amount;
    }

    fn process_block(&mut self, channels: &mut [&mut [f32]], features: &Features) {
        debug_assert!(channels.len() <= self.scratch.len());

        let grit = grit_drive(self.grit_amount, features.intensity, features.density);
        let clarity = clarity_drive(self.clarity_amount, features.timbre);
        let clarity_level = self.clarity_amount * CLARITY_MIX;

        for ((channel, scratch), hpf) in channels
            .iter_mut()
            .zip(self.scratch.iter_mut())
            .zip(self.clarity_hpf.iter_mut())
        {
            let side = &mut scratch[..channel.len()];
            side.copy_from_slice(&channel[..]);
            hpf.process_block(side);

            for (sample, &air) in channel.iter_mut().zip(side.iter()) {
                let saturated = (*sample * grit).tanh();
                *sample = (air * clarity).tanh().mul_add(clarity_level, saturated);
            }
        }
    }
}
