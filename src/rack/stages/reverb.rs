use crate::rack::stages::common::SmoothedValue;

/// Comb and allpass lengths at 44.1 kHz.
const COMB_TUNINGS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNINGS: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const TUNING_RATE: f32 = 44_100.0;

const INPUT_GAIN: f32 = 0.015;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;
const WET_SCALE: f32 = 3.0;
const ALLPASS_FEEDBACK: f32 = 0.5;
const WIDTH: f32 = 1.0;

const TANK_RAMP_MS: f32 = 10.0;

struct Comb {
    buffer: Vec<f32>,
    index: usize,
    last: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
            last: 0.0,
        }
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.last = 0.0;
    }

    #[inline]
    fn process(&mut self, input: f32, damp: f32, feedback: f32) -> f32 {
        let output = self.buffer[self.index];
        self.last = output.mul_add(1.0 - damp, self.last * damp);
        self.buffer[self.index] = self.last.mul_add(feedback, input);
        self.index = (self.index + 1) % self.buffer.len();
        output
    }
}

struct AllPass {
    buffer: Vec<f32>,
    index: usize,
}

impl AllPass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
        }
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        self.buffer[self.index] = buffered.mul_add(ALLPASS_FEEDBACK, input);
        self.index = (self.index + 1) % self.buffer.len();
        buffered - input
    }
}

/// One channel's worth of parallel combs feeding series allpasses.
struct Tank {
    combs: Vec<Comb>,
    allpasses: Vec<AllPass>,
}

impl Tank {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = |len: usize| ((len + spread) as f32 * sample_rate / TUNING_RATE) as usize;
        Self {
            combs: COMB_TUNINGS.iter().map(|&len| Comb::new(scale(len))).collect(),
            allpasses: ALLPASS_TUNINGS
                .iter()
                .map(|&len| AllPass::new(scale(len)))
                .collect(),
        }
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(Comb::clear);
        self.allpasses.iter_mut().for_each(AllPass::clear);
    }

    #[inline]
    fn process(&mut self, input: f32, damp: f32, feedback: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input, damp, feedback);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }
}

/// Freeverb-style room: eight damped feedback combs and four allpasses per
/// channel, right channel detuned by a fixed spread.
///
/// The dry signal always passes at unity; only the wet level is controlled.
/// That is 6 dB below the usual Freeverb dry scaling of 2, which keeps the
/// space stage level-matched with the dry path of the parallel blend.
pub struct Reverb {
    tanks: Vec<Tank>,
    feedback: SmoothedValue,
    damping: SmoothedValue,
    wet: SmoothedValue,
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Reverb {
    pub const fn new() -> Self {
        Self {
            tanks: Vec::new(),
            feedback: SmoothedValue::new(0.5 * ROOM_SCALE + ROOM_OFFSET),
            damping: SmoothedValue::new(0.5 * DAMP_SCALE),
            wet: SmoothedValue::new(0.0),
        }
    }

    /// Allocate the tanks for `channels` (1 or 2) and set the wet ramp length.
    pub fn prepare(&mut self, sample_rate: f32, channels: usize, wet_ramp_ms: f32) {
        self.tanks = (0..channels.min(2))
            .map(|ch| Tank::new(sample_rate, ch * STEREO_SPREAD))
            .collect();
        self.feedback.reset(sample_rate, TANK_RAMP_MS);
        self.damping.reset(sample_rate, TANK_RAMP_MS);
        self.wet.reset(sample_rate, wet_ramp_ms);
    }

    /// Silence every comb and allpass. Levels and ramps are kept.
    pub fn reset(&mut self) {
        self.tanks.iter_mut().for_each(Tank::clear);
    }

    /// Room size and damping, both in `[0, 1]`.
    pub fn set_room(&mut self, room_size: f32, damping: f32) {
        self.feedback
            .set_target(room_size.clamp(0.0, 1.0).mul_add(ROOM_SCALE, ROOM_OFFSET));
        self.damping.set_target(damping.clamp(0.0, 1.0) * DAMP_SCALE);
    }

    pub fn set_wet(&mut self, wet: f32) {
        self.wet.set_target(wet.clamp(0.0, 1.0));
    }

    pub const fn wet(&self) -> f32 {
        self.wet.current()
    }

    pub fn process_mono(&mut self, samples: &mut [f32]) {
        let Some(tank) = self.tanks.first_mut() else {
            return;
        };
        for sample in samples.iter_mut() {
            let damp = self.damping.next_value();
            let feedback = self.feedback.next_value();
            let wet1 = 0.5 * self.wet.next_value() * WET_SCALE * (1.0 + WIDTH);

            let out = tank.process(*sample * INPUT_GAIN, damp, feedback);
            *sample = out.mul_add(wet1, *sample);
        }
    }

    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        let [tank_l, tank_r] = &mut self.tanks[..] else {
            return;
        };
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let damp = self.damping.next_value();
            let feedback = self.feedback.next_value();
            let wet = self.wet.next_value() * WET_SCALE;
            let wet1 = 0.5 * wet * (1.0 + WIDTH);
            let wet2 = 0.5 * wet * (1.0 - WIDTH);

            let input = (*l + *r) * INPUT_GAIN;
            let out_l = tank_l.process(input, damp, feedback);
            let out_r = tank_r.process(input, damp, feedback);

            *l = out_l.mul_add(wet1, out_r.mul_add(wet2, *l));
            *r = out_r.mul_add(wet1, out_l.mul_add(wet2, *r));
        }
    }
}
