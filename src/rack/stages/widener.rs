use crate::rack::detector::Features;
use crate::rack::params::StageControls;
use crate::rack::stages::{ProcessSpec, Stage, StageId};

/// Width actually applied: a floor of 20% that opens fully with intensity.
pub fn dynamic_width(width_amount: f32, intensity: f32) -> f32 {
    width_amount * 0.8f32.mul_add(intensity, 0.2)
}

/// Mid/side widener ("void"). Stereo only; mono blocks pass untouched.
#[derive(Default)]
pub struct WidenerStage {
    width_amount: f32,
}

impl WidenerStage {
    pub const fn new() -> Self {
        Self { width_amount: 0.0 }
    }
}

impl Stage for WidenerStage {
    fn id(&self) -> StageId {
        StageId::Widener
    }

    fn prepare(&mut self, _spec: &ProcessSpec) {}

    fn reset(&mut self) {}

    fn update(&mut self, controls: &StageControls) {
        self.width_amount = controls.width_amount;
    }

    fn process_block(&mut self, channels: &mut [&mut [f32]], features: &Features) {
        let [left, right, ..] = channels else {
            return;
        };
        let side_gain = 2.0f32.mul_add(dynamic_width(self.width_amount, features.intensity), 1.0);
        // unity side gain reconstructs the input; skip it so the result is bit-exact
        if side_gain == 1.0 {
            return;
        }

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let mid = 0.5 * (*l + *r);
            let side = 0.5 * (*l - *r) * side_gain;
            *l = mid + side;
            *r = mid - side;
        }
    }
}
