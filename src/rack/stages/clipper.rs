use crate::rack::detector::Features;
use crate::rack::params::StageControls;
use crate::rack::stages::common::{DcBlocker, db_to_lin};
use crate::rack::stages::{ProcessSpec, Stage, StageId};

const DC_CUTOFF_HZ: f32 = 20.0;
/// Fraction of the ceiling where the cubic knee starts.
const KNEE: f32 = 0.7;
const CUBIC: f32 = 0.1;

/// Hard ceiling with a gentle cubic knee just below it.
#[inline]
pub fn clip_sample(x: f32, limit: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude > limit {
        limit.copysign(x)
    } else if magnitude > limit * KNEE {
        (CUBIC * x * x).mul_add(-x, x)
    } else {
        x
    }
}

/// The wall: drive into a ceiling clipper, then strip any DC the clipping
/// left behind. Always the last thing in the chain and never bypassed.
pub struct ClipperStage {
    drive_db: f32,
    ceiling_db: f32,
    dc_blockers: Vec<DcBlocker>,
}

impl Default for ClipperStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipperStage {
    pub const fn new() -> Self {
        Self {
            drive_db: 0.0,
            ceiling_db: -0.1,
            dc_blockers: Vec::new(),
        }
    }
}

impl Stage for ClipperStage {
    fn id(&self) -> StageId {
        StageId::Clipper
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.dc_blockers = vec![DcBlocker::new(DC_CUTOFF_HZ, spec.sample_rate); spec.channels];
    }

    fn reset(&mut self) {
        self.dc_blockers.iter_mut().for_each(DcBlocker::reset);
    }

    fn update(&mut self, controls: &StageControls) {
        self.drive_db = controls.drive_db;
        self.ceiling_db = controls.ceiling_db;
    }

    fn process_block(&mut self, channels: &mut [&mut [f32]], _features: &Features) {
        debug_assert!(channels.len() <= self.dc_blockers.len());

        let gain = db_to_lin(self.drive_db);
        let limit = db_to_lin(self.ceiling_db);

        for (channel, dc) in channels.iter_mut().zip(self.dc_blockers.iter_mut()) {
            for sample in channel.iter_mut() {
                *sample = dc.process(clip_sample(*sample * gain, limit));
            }
        }
    }
}
