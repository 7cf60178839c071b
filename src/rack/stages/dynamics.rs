use crate::rack::detector::Features;
use crate::rack::params::StageControls;
use crate::rack::stages::common::{SmoothedValue, lerp};
use crate::rack::stages::{ProcessSpec, Stage, StageId};

const GAIN_RAMP_MS: f32 = 10.0;
/// Gate threshold at the very start of the morph range; shrinks to zero
/// as the gate hands over to the expander.
const GATE_THRESHOLD: f32 = 0.15;
const INVERSION_FLOOR: f32 = -0.8;
const DENSITY_RELIEF: f32 = 0.3;

/// Omnipressor-style morphing dynamics.
///
/// A single `function` control sweeps gate → expander → compressor →
/// heavy compressor → polarity inversion in four overlapping quarters, each
/// crossfading linearly into the next.
pub struct DynamicsStage {
    function_amount: f32,
    sustain_cut: f32,
    gain: SmoothedValue,
}

impl Default for DynamicsStage {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicsStage {
    pub const fn new() -> Self {
        Self {
            function_amount: 0.0,
            sustain_cut: 0.0,
            gain: SmoothedValue::new(1.0),
        }
    }

    pub const fn current_gain(&self) -> f32 {
        self.gain.current()
    }
}

/// Gain the stage is heading for at morph position `function`.
pub fn target_gain(function: f32, sustain_cut: f32, intensity: f32, density: f32) -> f32 {
    let expand = 1.5f32.mul_add(intensity, 0.5);
    let compress = 1.0 / 2.0f32.mul_add(intensity, 1.0);
    let heavy = 1.0 / 8.0f32.mul_add(intensity, 1.0);

    let gain = if function < 0.25 {
        let morph = function * 4.0;
        let threshold = GATE_THRESHOLD * (1.0 - morph);
        let gate = if intensity > threshold {
            1.0
        } else {
            1.0 - sustain_cut
        };
        lerp(gate, expand, morph)
    } else if function < 0.5 {
        lerp(expand, compress, (function - 0.25) * 4.0)
    } else if function < 0.75 {
        lerp(compress, heavy, (function - 0.5) * 4.0)
    } else {
        let invert = (-2.5f32).mul_add(intensity, 1.0);
        lerp(heavy, invert, (function - 0.75) * 4.0).max(INVERSION_FLOOR)
    };

    gain * DENSITY_RELIEF.mul_add(-density, 1.0)
}

impl Stage for DynamicsStage {
    fn id(&self) -> StageId {
        StageId::Dynamics
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.gain.reset(spec.sample_rate, GAIN_RAMP_MS);
    }

    fn reset(&mut self) {
        self.gain.set_current_and_target(1.0);
    }

    fn update(&mut self, controls: &StageControls) {
        self.function_amount = controls.function_amount;
        self.sustain_cut = controls.sustain_cut;
    }

    fn process_block(&mut self, channels: &mut [&mut [f32]], features: &Features) {
        let target = target_gain(
            self.function_amount,
            self.sustain_cut,
            features.intensity,
            features.density,
        );
        self.gain.set_target(target);

        let num_samples = channels.first().map_or(0, |c| c.len());
        for i in 0..num_samples {
            let gain = self.gain.next_value();
            for channel in channels.iter_mut() {
                channel[i] *= gain;
            }
        }
    }
}
