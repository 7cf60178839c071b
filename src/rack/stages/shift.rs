use crate::rack::delay_line::DelayLine;
use crate::rack::detector::Features;
use crate::rack::params::StageControls;
use crate::rack::stages::{ProcessSpec, Stage, StageId};

/// Sweep window of the two read taps, in samples. Kept short on purpose: the
/// shifter is meant to sound unstable and gritty.
pub const DELAY_RANGE: f32 = 400.0;
const DELAY_CAPACITY: usize = 8192;
/// Semitones the formant drops at full intensity.
const FORMANT_BLOOM: f32 = 5.0;

/// Combined pitch/formant ratio, with the formant blooming downwards as the
/// performance gets louder.
pub fn shift_ratio(pitch_shift: f32, formant_shift: f32, intensity: f32) -> f32 {
    let formant = FORMANT_BLOOM.mul_add(-intensity, formant_shift);
    2f32.powf((pitch_shift + formant) / 12.0)
}

#[inline]
fn wrap_phase(phase: f32) -> f32 {
    let wrapped = phase.rem_euclid(DELAY_RANGE);
    // rem_euclid can round up to the range itself for tiny negatives
    if wrapped >= DELAY_RANGE { 0.0 } else { wrapped }
}

/// Two-tap variable-delay pitch shifter.
///
/// A phase accumulator sweeps both taps through the delay window at
/// `1 - ratio` samples per sample. The taps sit half a window apart and are
/// weighted by a triangle that reaches zero where a tap wraps, hiding the jump.
/// Beating between the taps is part of the sound.
pub struct ShiftStage {
    pitch_shift: f32,
    formant_shift: f32,
    phase: f32,
    lines: Vec<DelayLine>,
}

impl Default for ShiftStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ShiftStage {
    pub const fn new() -> Self {
        Self {
            pitch_shift: 0.0,
            formant_shift: 0.0,
            phase: 0.0,
            lines: Vec::new(),
        }
    }

    pub const fn phase(&self) -> f32 {
        self.phase
    }
}

impl Stage for ShiftStage {
    fn id(&self) -> StageId {
        StageId::Shift
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lines = (0..spec.channels)
            .map(|_| DelayLine::new(DELAY_CAPACITY))
            .collect();
        self.phase = 0.0;
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
        self.phase = 0.0;
    }

    fn update(&mut self, controls: &StageControls) {
        self.pitch_shift = controls.pitch_shift;
        self.formant_shift = controls.formant_shift;
    }

    fn process_block(&mut self, channels: &mut [&mut [f32]], features: &Features) {
        debug_assert!(channels.len() <= self.lines.len());

        let ratio = shift_ratio(self.pitch_shift, self.formant_shift, features.intensity);
        let step = 1.0 - ratio;
        let half = DELAY_RANGE * 0.5;

        let num_samples = channels.first().map_or(0, |c| c.len());
        for i in 0..num_samples {
            self.phase = wrap_phase(self.phase + step);
            let tap_a = self.phase;
            let tap_b = wrap_phase(tap_a + half);

            // tap b owns the output while tap a crosses its wrap point
            let weight_b = ((tap_a / DELAY_RANGE) - 0.5).abs() * 2.0;
            let weight_a = 1.0 - weight_b;

            for (channel, line) in channels.iter_mut().zip(self.lines.iter_mut()) {
                line.write(channel[i]);
                channel[i] = line.read(tap_a).mul_add(weight_a, line.read(tap_b) * weight_b);
            }
        }
    }
}
