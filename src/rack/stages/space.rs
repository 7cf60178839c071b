use crate::rack::detector::Features;
use crate::rack::params::StageControls;
use crate::rack::stages::common::lerp;
use crate::rack::stages::reverb::Reverb;
use crate::rack::stages::{ProcessSpec, Stage, StageId};

/// Wet ramp; this is what lets the tail swell back after a loud passage.
const WET_RAMP_MS: f32 = 50.0;
const BLOOM_ROOM: f32 = 0.5;
const DUCK_DEPTH: f32 = 0.5;

/// Room size and damping along the room → plate → bloom axis.
pub fn room_character(character: f32) -> (f32, f32) {
    if character < 0.5 {
        let morph = character * 2.0;
        (lerp(0.1, 0.6, morph), lerp(0.8, 0.3, morph))
    } else {
        let morph = (character - 0.5) * 2.0;
        (lerp(0.6, 1.0, morph), lerp(0.3, 0.1, morph))
    }
}

/// Wet level after ducking against intensity and the character bloom.
pub fn wet_target(mix: f32, character: f32, intensity: f32) -> f32 {
    let bloom = character * intensity;
    let ducking = DUCK_DEPTH.mul_add(-intensity, 1.0);
    (mix * ducking * (1.0 + bloom)).clamp(0.0, 1.0)
}

pub struct SpaceStage {
    mix_amount: f32,
    character_amount: f32,
    reverb: Reverb,
}

impl Default for SpaceStage {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceStage {
    pub const fn new() -> Self {
        Self {
            mix_amount: 0.0,
            character_amount: 0.0,
            reverb: Reverb::new(),
        }
    }

    pub const fn wet_level(&self) -> f32 {
        self.reverb.wet()
    }
}

impl Stage for SpaceStage {
    fn id(&self) -> StageId {
        StageId::Space
    }

    fn prepare(&mut self, spec: &ProcessSpec) {
        self.reverb
            .prepare(spec.sample_rate, spec.channels, WET_RAMP_MS);
    }

    fn reset(&mut self) {
        self.reverb.reset();
    }

    fn update(&mut self, controls: &StageControls) {
        self.mix_amount = controls.mix_amount;
        self.character_amount = controls.character_amount;
    }

    fn process_block(&mut self, channels: &mut [&mut [f32]], features: &Features) {
        let intensity = features.intensity;
        let (room, damping) = room_character(self.character_amount);
        let bloom = self.character_amount * intensity;

        self.reverb
            .set_room(BLOOM_ROOM.mul_add(bloom, room).clamp(0.0, 1.0), damping);
        self.reverb
            .set_wet(wet_target(self.mix_amount, self.character_amount, intensity));

        match channels {
            [mono] => self.reverb.process_mono(mono),
            [left, right] => self.reverb.process_stereo(left, right),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rack::stages::common::rms;

    fn prepared(channels: usize, mix_amount: f32, character_amount: f32) -> SpaceStage {
        let mut stage = SpaceStage::new();
        stage.prepare(&ProcessSpec {
            sample_rate: 48_000.0,
            max_block_size: 512,
            channels,
        });
        stage.update(&StageControls {
            mix_amount,
            character_amount,
            ..StageControls::default()
        });
        stage
    }

    #[test]
    fn character_morphs_room_into_plate_into_bloom() {
        assert_eq!(room_character(0.0), (0.1, 0.8));
        let (room, damping) = room_character(0.5);
        assert!((room - 0.6).abs() < 1e-6 && (damping - 0.3).abs() < 1e-6);
        let (room, damping) = room_character(1.0);
        assert!((room - 1.0).abs() < 1e-6 && (damping - 0.1).abs() < 1e-6);
    }

    #[test]
    fn loud_passages_duck_the_wet_level() {
        assert_eq!(wet_target(0.6, 0.0, 0.0), 0.6);
        assert!((wet_target(0.6, 0.0, 1.0) - 0.3).abs() < 1e-6);
        // a full bloom undoes the ducking
        assert!((wet_target(0.6, 1.0, 1.0) - 0.6).abs() < 1e-6);
        assert_eq!(wet_target(1.0, 1.0, 0.5), 1.0);
    }

    #[test]
    fn zero_mix_is_transparent() {
        let mut stage = prepared(2, 0.0, 0.7);
        let input: Vec<f32> = (0..512).map(|i| ((i * 13 % 29) as f32 / 29.0) - 0.5).collect();
        let mut left = input.clone();
        let mut right = input.clone();
        let features = Features {
            intensity: 0.8,
            ..Features::default()
        };
        for _ in 0..4 {
            left.copy_from_slice(&input);
            right.copy_from_slice(&input);
            stage.process_block(&mut [&mut left[..], &mut right[..]], &features);
        }
        assert_eq!(left, input);
        assert_eq!(right, input);
    }

    #[test]
    fn impulse_rings_on_in_mono() {
        let mut stage = prepared(1, 1.0, 0.5);
        let mut block = vec![0.0f32; 512];
        block[0] = 1.0;
        stage.process_block(&mut [&mut block[..]], &Features::default());

        let mut tail = 0.0;
        for _ in 0..20 {
            let mut silence = vec![0.0f32; 512];
            stage.process_block(&mut [&mut silence[..]], &Features::default());
            tail += rms(&silence);
        }
        assert!(tail > 0.0, "reverb should ring after the impulse");
        assert!(stage.wet_level() > 0.99);
    }
}
