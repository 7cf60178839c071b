use crate::rack::detector::Features;
use crate::rack::stages::common::lin_to_db;
use crossbeam::atomic::AtomicCell;
use std::sync::Arc;

const SILENCE_DB: f32 = -100.0;

#[derive(Default)]
struct MeterCells {
    peak: AtomicCell<f32>,
    intensity: AtomicCell<f32>,
    density: AtomicCell<f32>,
    timbre: AtomicCell<f32>,
    air: AtomicCell<f32>,
}

/// Audio-side writer. Stores are plain atomic writes, safe inside the block path.
pub struct LevelMeter {
    cells: Arc<MeterCells>,
}

/// Reader for whoever draws the meters; cheap to clone across threads.
#[derive(Clone)]
pub struct MeterHandle {
    cells: Arc<MeterCells>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterInfo {
    pub peak_linear: f32,
    pub peak_db: f32,
    pub intensity: f32,
    pub density: f32,
    pub timbre: f32,
    pub air: f32,
}

impl LevelMeter {
    pub fn new() -> (Self, MeterHandle) {
        let cells = Arc::new(MeterCells::default());
        (
            Self {
                cells: Arc::clone(&cells),
            },
            MeterHandle { cells },
        )
    }

    /// Record the post-chain peak of this block and the detector state behind it.
    pub fn process(&self, channels: &[&mut [f32]], features: Features, air: f32) {
        let peak = channels
            .iter()
            .flat_map(|channel| channel.iter())
            .fold(0.0f32, |peak, s| peak.max(s.abs()));

        self.cells.peak.store(peak);
        self.cells.intensity.store(features.intensity);
        self.cells.density.store(features.density);
        self.cells.timbre.store(features.timbre);
        self.cells.air.store(air);
    }

    pub fn level(&self) -> f32 {
        self.cells.peak.load()
    }

    pub fn reset(&self) {
        self.process(&[], Features::default(), 0.0);
    }
}

impl MeterHandle {
    pub fn get_info(&self) -> MeterInfo {
        let peak_linear = self.cells.peak.load();
        MeterInfo {
            peak_linear,
            peak_db: lin_to_db(peak_linear, SILENCE_DB),
            intensity: self.cells.intensity.load(),
            density: self.cells.density.load(),
            timbre: self.cells.timbre.load(),
            air: self.cells.air.load(),
        }
    }
}
