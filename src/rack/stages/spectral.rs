use crate::rack::detector::Features;
use crate::rack::params::StageControls;
use crate::rack::stages::common::{Biquad, BiquadCoeffs, db_to_lin};
use crate::rack::stages::{ProcessSpec, Stage, StageId};

const SCOOP_HZ: f32 = 300.0;
const SCOOP_Q: f32 = 0.8;
const SCOOP_DEPTH_DB: f32 = -32.0;

const BITE_HZ: f32 = 3200.0;
const BITE_Q: f32 = 0.6;
const BITE_BOOST_DB: f32 = 18.0;

/// Scoop cut in dB: deepens on thick, low-heavy or muddy material.
pub fn scoop_gain_db(scoop_amount: f32, density: f32, timbre: f32) -> f32 {
    let depth = scoop_amount * 0.3f32.mul_add(timbre, 0.6f32.mul_add(density, 0.4));
    SCOOP_DEPTH_DB * depth.clamp(0.0, 1.0)
}

/// Bite boost in dB: eases off as the detector hears harshness.
pub fn bite_gain_db(bite_amount: f32, timbre: f32) -> f32 {
    BITE_BOOST_DB * (bite_amount * (1.2 - timbre)).clamp(0.0, 1.0)
}

/// Detector-driven mud scoop and presence bite.
///
/// Coefficients are recomputed once per block; both bells run in series on
/// every channel.
pub struct SpectralShapeStage {
    scoop_amount: f32,
    bite_amount: f32,
    sample_rate: f32,
    scoop: Vec<Biquad>,
    bite: Vec<Biquad>,
}

impl Default for SpectralShapeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralShapeStage {
    pub const fn new() -> Self {
        Self {
            scoop_amount: 0.0,
            bite_amount: 0.0,
            sample_rate: 48_000.0,
            scoop: Vec::new(),
            bite: Vec::new(),
        }
    }
}

impl Stage for SpectralShapeStage {
    fn id(&self) -> StageId {
        StageId::Spectral
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.scoop = vec![Biquad::default(); spec.channels];
        self.bite = vec![Biquad::default(); spec.channels];
    }

    fn reset(&mut self) {
        self.scoop.iter_mut().chain(&mut self.bite).for_each(Biquad::reset);
    }

    fn update(&mut self, controls: &StageControls) {
        self.scoop_amount = controls.scoop_amount;
        self.bite_amount = controls.bite_amount;
    }

    fn process_block(&mut self, channels: &mut [&mut [f32]], features: &Features) {
        debug_assert!(channels.len() <= self.scoop.len());

        let scoop_gain = db_to_lin(scoop_gain_db(
            self.scoop_amount,
            features.density,
            features.timbre,
        ));
        let bite_gain = db_to_lin(bite_gain_db(self.bite_amount, features.timbre));
        let scoop = BiquadCoeffs::peak(self.sample_rate, SCOOP_HZ, SCOOP_Q, scoop_gain);
        let bite = BiquadCoeffs::peak(self.sample_rate, BITE_HZ, BITE_Q, bite_gain);

        for ((channel, scoop_filter), bite_filter) in channels
            .iter_mut()
            .zip(self.scoop.iter_mut())
            .zip(self.bite.iter_mut())
        {
            scoop_filter.set_coeffs(scoop);
            bite_filter.set_coeffs(bite);
            for sample in channel.iter_mut() {
                *sample = bite_filter.process(scoop_filter.process(*sample));
            }
        }
    }
}
