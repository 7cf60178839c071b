pub mod clipper;
pub mod common;
pub mod dynamics;
pub mod harmonics;
pub mod reverb;
pub mod shift;
pub mod space;
pub mod spectral;
pub mod widener;

use crate::rack::detector::Features;
use crate::rack::params::StageControls;

/// Sample rate, block-size bound and channel count every stage is sized for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f32,
    pub max_block_size: usize,
    pub channels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Dynamics,
    Spectral,
    Harmonics,
    Shift,
    Space,
    Widener,
    Clipper,
}

// The capability every block processor in the chain implements
pub trait Stage: Send + Sync + 'static {
    fn id(&self) -> StageId;

    // Allocate all per-channel state; never called on the audio path
    fn prepare(&mut self, spec: &ProcessSpec);

    // Drop signal history (filter state, delay lines, tails); keeps buffers
    fn reset(&mut self);

    // Pull this stage's controls out of the remapped block parameters
    fn update(&mut self, controls: &StageControls);

    // Process one block in place, channels of equal length
    fn process_block(&mut self, channels: &mut [&mut [f32]], features: &Features);
}
