use anyhow::{Context, Result, bail, ensure};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use std::path::Path;

use crate::rack::chain::{AggressorChain, MAX_CHANNELS};
use crate::rack::params::RackParams;
use crate::rack::stages::common::lin_to_db;

pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// De-interleaved audio, one `Vec` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderReport {
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
    pub blocks: usize,
    /// Highest post-chain block peak.
    pub peak: f32,
}

impl RenderReport {
    pub fn peak_db(&self) -> f32 {
        lin_to_db(self.peak, -100.0)
    }
}

pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();
    let num_channels = spec.channels as usize;
    ensure!(
        (1..=MAX_CHANNELS).contains(&num_channels),
        "{} has {num_channels} channels, only mono and stereo are supported",
        path.display()
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => {
            ensure!(
                spec.bits_per_sample == 32,
                "unsupported float WAV with {} bits per sample",
                spec.bits_per_sample
            );
            reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read float samples")?
        }
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read integer samples")?
        }
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / num_channels); num_channels];
    for frame in interleaved.chunks_exact(num_channels) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    debug!(
        "Read {}: {} Hz, {} channel(s), {} frames",
        path.display(),
        spec.sample_rate,
        num_channels,
        channels[0].len()
    );
    Ok(AudioBuffer {
        sample_rate: spec.sample_rate,
        channels,
    })
}

/// Write 32-bit float WAV.
pub fn write_wav<P: AsRef<Path>>(path: P, audio: &AudioBuffer) -> Result<()> {
    let path = path.as_ref();
    let frames = audio.frames();
    ensure!(
        audio.channels.iter().all(|channel| channel.len() == frames),
        "cannot write {}: channels differ in length",
        path.display()
    );
    let spec = WavSpec {
        channels: audio.channels.len() as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file {}", path.display()))?;

    for i in 0..frames {
        for channel in &audio.channels {
            writer
                .write_sample(channel[i])
                .context("Failed to write sample")?;
        }
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Run `input` through a freshly prepared chain, block by block.
pub fn render(
    params: RackParams,
    input: &AudioBuffer,
    sidechain: Option<&AudioBuffer>,
    block_size: usize,
) -> Result<(AudioBuffer, RenderReport)> {
    ensure!(block_size > 0, "block size must be non-zero");
    let frames = input.frames();
    ensure!(
        input.channels.iter().all(|channel| channel.len() == frames),
        "input channels differ in length"
    );
    if let Some(sc) = sidechain {
        if sc.sample_rate != input.sample_rate {
            bail!(
                "sidechain sample rate {} Hz does not match input {} Hz",
                sc.sample_rate,
                input.sample_rate
            );
        }
        if sc.frames() < input.frames() {
            warn!(
                "Sidechain is {} frames shorter than the input; analysis falls back to the main signal for the tail",
                input.frames() - sc.frames()
            );
        }
    }

    let (mut chain, _handle) = AggressorChain::new(params);
    chain.prepare(f64::from(input.sample_rate), block_size, input.channels.len())?;

    let mut output = input.clone();
    let mut blocks = 0;
    let mut peak = 0.0f32;

    let mut start = 0;
    while start < frames {
        let end = (start + block_size).min(frames);
        let mut main: Vec<&mut [f32]> = output
            .channels
            .iter_mut()
            .map(|channel| &mut channel[start..end])
            .collect();
        let side: Option<Vec<&[f32]>> = sidechain.map(|sc| {
            sc.channels
                .iter()
                .map(|channel| &channel[start.min(channel.len())..end.min(channel.len())])
                .collect()
        });

        chain
            .process(&mut main, side.as_deref())
            .with_context(|| format!("Failed to process block at frame {start}"))?;

        peak = peak.max(chain.level());
        blocks += 1;
        start = end;
    }

    let report = RenderReport {
        sample_rate: input.sample_rate,
        channels: input.channels.len(),
        frames,
        blocks,
        peak,
    };
    Ok((output, report))
}

pub fn render_file(
    input_path: &Path,
    output_path: &Path,
    sidechain_path: Option<&Path>,
    params: RackParams,
    block_size: usize,
) -> Result<RenderReport> {
    let input = read_wav(input_path)?;
    let sidechain = sidechain_path.map(read_wav).transpose()?;

    let (output, report) = render(params, &input, sidechain.as_ref(), block_size)?;
    write_wav(output_path, &output)?;

    info!(
        "Rendered {} frames in {} blocks to {} (peak {:.2} dBFS)",
        report.frames,
        report.blocks,
        output_path.display(),
        report.peak_db()
    );
    Ok(report)
}
