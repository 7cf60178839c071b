use anyhow::{Result, bail, ensure};
use arc_swap::ArcSwap;
use assert_no_alloc::assert_no_alloc;
use log::info;
use std::sync::Arc;

use crate::rack::detector::{FeatureDetector, Features};
use crate::rack::meter::{LevelMeter, MeterHandle, MeterInfo};
use crate::rack::params::RackParams;
use crate::rack::stages::clipper::ClipperStage;
use crate::rack::stages::dynamics::DynamicsStage;
use crate::rack::stages::harmonics::HarmonicsStage;
use crate::rack::stages::shift::ShiftStage;
use crate::rack::stages::space::SpaceStage;
use crate::rack::stages::spectral::SpectralShapeStage;
use crate::rack::stages::widener::WidenerStage;
use crate::rack::stages::{ProcessSpec, Stage};

pub const MAX_CHANNELS: usize = 2;

/// The full vocal chain: detector, six wet stages, parallel blend and the wall.
pub struct AggressorChain {
    params: Arc<ArcSwap<RackParams>>,
    detector: FeatureDetector,
    /// Wet stages in processing order.
    stages: Vec<Box<dyn Stage>>,
    clipper: ClipperStage,
    dry: Vec<Vec<f32>>,
    meter: LevelMeter,
    spec: Option<ProcessSpec>,
}

/// Control-side handle: publishes parameter snapshots and reads the meters.
#[derive(Clone)]
pub struct ChainHandle {
    params: Arc<ArcSwap<RackParams>>,
    meter: MeterHandle,
}

impl AggressorChain {
    pub fn new(params: RackParams) -> (Self, ChainHandle) {
        let params = Arc::new(ArcSwap::from_pointee(params.sanitized()));
        let (meter, meter_handle) = LevelMeter::new();

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(DynamicsStage::new()),
            Box::new(SpectralShapeStage::new()),
            Box::new(HarmonicsStage::new()),
            Box::new(ShiftStage::new()),
            Box::new(SpaceStage::new()),
            Box::new(WidenerStage::new()),
        ];

        let chain = Self {
            params: Arc::clone(&params),
            detector: FeatureDetector::new(),
            stages,
            clipper: ClipperStage::new(),
            dry: Vec::new(),
            meter,
            spec: None,
        };
        let handle = ChainHandle {
            params,
            meter: meter_handle,
        };
        (chain, handle)
    }

    /// Size every buffer, filter and delay line. Must run before `process`
    /// and again whenever the host changes rate, block size or layout.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize, channels: usize) -> Result<()> {
        ensure!(
            sample_rate.is_finite() && sample_rate > 0.0,
            "invalid sample rate: {sample_rate}"
        );
        ensure!(max_block_size > 0, "maximum block size must be non-zero");
        ensure!(
            (1..=MAX_CHANNELS).contains(&channels),
            "unsupported channel count {channels}, expected 1 or 2"
        );

        let spec = ProcessSpec {
            sample_rate: sample_rate as f32,
            max_block_size,
            channels,
        };

        self.detector.prepare(&spec);
        for stage in &mut self.stages {
            stage.prepare(&spec);
        }
        self.clipper.prepare(&spec);
        self.dry = vec![vec![0.0; max_block_size]; channels];
        self.spec = Some(spec);
        self.reset();

        info!(
            "Chain prepared: {} Hz, {} samples max, {} channel(s)",
            sample_rate, max_block_size, channels
        );
        Ok(())
    }

    /// Clear every filter, delay line and reverb tail and zero the detector
    /// and meters, as after a transport stop. Nothing is reallocated.
    pub fn reset(&mut self) {
        self.detector.reset();
        for stage in &mut self.stages {
            stage.reset();
        }
        self.clipper.reset();
        self.meter.reset();
    }

    /// Process one block in place using the most recently published parameters.
    pub fn process(&mut self, main: &mut [&mut [f32]], sidechain: Option<&[&[f32]]>) -> Result<()> {
        let params = **self.params.load();
        self.process_with(&params, main, sidechain)
    }

    /// Process one block in place with an explicit parameter snapshot.
    pub fn process_with(
        &mut self,
        params: &RackParams,
        main: &mut [&mut [f32]],
        sidechain: Option<&[&[f32]]>,
    ) -> Result<()> {
        let Some(spec) = self.spec else {
            bail!("chain processed before prepare");
        };
        ensure!(
            !main.is_empty() && main.len() <= spec.channels,
            "block has {} channel(s), chain prepared for {}",
            main.len(),
            spec.channels
        );

        let num_samples = main[0].len();
        ensure!(
            main.iter().all(|channel| channel.len() == num_samples),
            "channel lengths differ within one block"
        );
        ensure!(
            num_samples <= spec.max_block_size,
            "block of {num_samples} samples exceeds prepared maximum {}",
            spec.max_block_size
        );
        if num_samples == 0 {
            return Ok(());
        }

        assert_no_alloc(|| self.run(params, main, sidechain));
        Ok(())
    }

    fn run(&mut self, params: &RackParams, main: &mut [&mut [f32]], sidechain: Option<&[&[f32]]>) {
        let num_samples = main[0].len();
        let controls = params.stage_controls();

        for (dry, channel) in self.dry.iter_mut().zip(main.iter()) {
            dry[..num_samples].copy_from_slice(channel);
        }

        self.detector.process(main, sidechain);
        let features = self.detector.features();

        for stage in &mut self.stages {
            stage.update(&controls);
        }
        self.clipper.update(&controls);

        for stage in &mut self.stages {
            if !params.bypass.is_bypassed(stage.id()) {
                stage.process_block(main, &features);
            }
        }

        let muscle = controls.muscle;
        for (channel, snapshot) in main.iter_mut().zip(self.dry.iter()) {
            for (wet, &dry) in channel.iter_mut().zip(&snapshot[..num_samples]) {
                *wet = (*wet).mul_add(muscle, dry * (1.0 - muscle));
            }
        }

        self.clipper.process_block(main, &features);
        self.meter.process(main, features, self.detector.air());
    }

    /// Post-chain peak of the last processed block.
    pub fn level(&self) -> f32 {
        self.meter.level()
    }

    pub const fn features(&self) -> Features {
        self.detector.features()
    }

    pub const fn air(&self) -> f32 {
        self.detector.air()
    }

    pub const fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }
}

impl ChainHandle {
    /// Publish a new snapshot; it is picked up at the start of the next block.
    pub fn set_params(&self, params: RackParams) {
        self.params.store(Arc::new(params.sanitized()));
    }

    pub fn params(&self) -> RackParams {
        **self.params.load()
    }

    pub fn meter(&self) -> MeterInfo {
        self.meter.get_info()
    }
}
