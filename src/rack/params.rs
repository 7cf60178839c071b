use crate::rack::stages::StageId;
use serde::{Deserialize, Serialize};

/// Static description of one continuous parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

const fn param(id: &'static str, label: &'static str, min: f32, max: f32, default: f32) -> ParamInfo {
    ParamInfo {
        id,
        label,
        min,
        max,
        default,
    }
}

pub const PARAMETERS: &[ParamInfo] = &[
    param("intensity", "Master Intensity", 0.0, 1.0, 0.5),
    param("muscle", "The Muscle (Parallel)", 0.0, 1.0, 1.0),
    param("dyn_amount", "Dynamics Amount", 0.0, 1.0, 0.5),
    param("dyn_sustain", "Sustain Cut", 0.0, 1.0, 0.5),
    param("eq_scoop", "EQ Scoop", 0.0, 1.0, 0.5),
    param("eq_bite", "EQ Bite", 0.0, 1.0, 0.5),
    param("harm_grit", "Harmonics Grit", 0.0, 1.0, 0.5),
    param("harm_clarity", "Harmonics Clarity", 0.0, 1.0, 0.5),
    param("shift_pitch", "Pitch Shift", 0.0, 1.0, 0.5),
    param("shift_formant", "Formant Shift", 0.0, 1.0, 0.5),
    param("space_mix", "Space Mix", 0.0, 1.0, 0.5),
    param("space_char", "Space Character", 0.0, 1.0, 0.5),
    param("void_width", "The Void (Width)", 0.0, 1.0, 0.3),
    param("wall_drive", "The Wall (Drive)", 0.0, 12.0, 0.0),
    param("wall_ceiling", "The Wall (Ceiling)", -12.0, 0.0, -0.1),
];

pub const BYPASS_PARAMETERS: &[&str] = &[
    "bypass_dyn",
    "bypass_eq",
    "bypass_harm",
    "bypass_shift",
    "bypass_space",
];

pub fn param_info(name: &str) -> Option<&'static ParamInfo> {
    PARAMETERS.iter().find(|info| info.id == name)
}

fn default_of(name: &str) -> f32 {
    param_info(name).map_or(0.0, |info| info.default)
}

/// Per-stage bypass switches. The widener and the wall have none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bypass {
    pub dynamics: bool,
    pub spectral: bool,
    pub harmonics: bool,
    pub shift: bool,
    pub space: bool,
}

impl Bypass {
    pub const fn is_bypassed(&self, id: StageId) -> bool {
        match id {
            StageId::Dynamics => self.dynamics,
            StageId::Spectral => self.spectral,
            StageId::Harmonics => self.harmonics,
            StageId::Shift => self.shift,
            StageId::Space => self.space,
            StageId::Widener | StageId::Clipper => false,
        }
    }

    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        match name {
            "bypass_dyn" => Some(&mut self.dynamics),
            "bypass_eq" => Some(&mut self.spectral),
            "bypass_harm" => Some(&mut self.harmonics),
            "bypass_shift" => Some(&mut self.shift),
            "bypass_space" => Some(&mut self.space),
            _ => None,
        }
    }
}

/// User-facing control snapshot, read once at the start of every block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RackParams {
    pub intensity: f32,
    pub muscle: f32,
    pub dyn_amount: f32,
    pub dyn_sustain: f32,
    pub eq_scoop: f32,
    pub eq_bite: f32,
    pub harm_grit: f32,
    pub harm_clarity: f32,
    pub shift_pitch: f32,
    pub shift_formant: f32,
    pub space_mix: f32,
    pub space_char: f32,
    pub void_width: f32,
    /// dB
    pub wall_drive: f32,
    /// dB
    #[serde(alias = "wall_ceil")]
    pub wall_ceiling: f32,
    pub bypass: Bypass,
}

impl Default for RackParams {
    fn default() -> Self {
        Self {
            intensity: default_of("intensity"),
            muscle: default_of("muscle"),
            dyn_amount: default_of("dyn_amount"),
            dyn_sustain: default_of("dyn_sustain"),
            eq_scoop: default_of("eq_scoop"),
            eq_bite: default_of("eq_bite"),
            harm_grit: default_of("harm_grit"),
            harm_clarity: default_of("harm_clarity"),
            shift_pitch: default_of("shift_pitch"),
            shift_formant: default_of("shift_formant"),
            space_mix: default_of("space_mix"),
            space_char: default_of("space_char"),
            void_width: default_of("void_width"),
            wall_drive: default_of("wall_drive"),
            wall_ceiling: default_of("wall_ceiling"),
            bypass: Bypass::default(),
        }
    }
}

impl RackParams {
    fn field_mut(&mut self, name: &str) -> Option<&mut f32> {
        let field = match name {
            "intensity" => &mut self.intensity,
            "muscle" => &mut self.muscle,
            "dyn_amount" => &mut self.dyn_amount,
            "dyn_sustain" => &mut self.dyn_sustain,
            "eq_scoop" => &mut self.eq_scoop,
            "eq_bite" => &mut self.eq_bite,
            "harm_grit" => &mut self.harm_grit,
            "harm_clarity" => &mut self.harm_clarity,
            "shift_pitch" => &mut self.shift_pitch,
            "shift_formant" => &mut self.shift_formant,
            "space_mix" => &mut self.space_mix,
            "space_char" => &mut self.space_char,
            "void_width" => &mut self.void_width,
            "wall_drive" => &mut self.wall_drive,
            "wall_ceiling" | "wall_ceil" => &mut self.wall_ceiling,
            _ => return None,
        };
        Some(field)
    }

    pub fn get(&self, name: &str) -> Result<f32, &'static str> {
        let mut copy = *self;
        copy.field_mut(name).map(|v| *v).ok_or("Unknown parameter")
    }

    pub fn set(&mut self, name: &str, value: f32) -> Result<(), &'static str> {
        let canonical = if name == "wall_ceil" { "wall_ceiling" } else { name };
        let info = param_info(canonical).ok_or("Unknown parameter")?;
        if !(info.min..=info.max).contains(&value) {
            return Err("Value out of range");
        }
        let field = self.field_mut(canonical).ok_or("Unknown parameter")?;
        *field = value;
        Ok(())
    }

    pub fn get_bypass(&self, name: &str) -> Result<bool, &'static str> {
        let mut copy = self.bypass;
        copy.flag_mut(name).map(|b| *b).ok_or("Unknown bypass switch")
    }

    pub fn set_bypass(&mut self, name: &str, bypassed: bool) -> Result<(), &'static str> {
        let flag = self.bypass.flag_mut(name).ok_or("Unknown bypass switch")?;
        *flag = bypassed;
        Ok(())
    }

    /// Every field clamped to its range; non-finite values fall back to the default.
    pub fn sanitized(mut self) -> Self {
        for info in PARAMETERS {
            if let Some(value) = self.field_mut(info.id) {
                *value = if value.is_finite() {
                    (*value).clamp(info.min, info.max)
                } else {
                    info.default
                };
            }
        }
        self
    }

    /// Remap the raw controls through the master intensity dial.
    ///
    /// Most 0..1 controls are multiplied by `0.4 + 1.6 * intensity` and
    /// clamped; pitch and formant map to +-12 semitones and are widened by
    /// `1 + 2 * intensity`. Width, muscle and the wall pass through.
    pub fn stage_controls(&self) -> StageControls {
        let p = self.sanitized();
        let aggression = 1.6f32.mul_add(p.intensity, 0.4);
        let scaled = |v: f32| (v * aggression).clamp(0.0, 1.0);
        let shift_scale = 2.0f32.mul_add(p.intensity, 1.0);
        let semitones = |v: f32| (v - 0.5) * 24.0 * shift_scale;

        StageControls {
            function_amount: scaled(p.dyn_amount),
            sustain_cut: scaled(p.dyn_sustain),
            scoop_amount: scaled(p.eq_scoop),
            bite_amount: scaled(p.eq_bite),
            grit_amount: scaled(p.harm_grit),
            clarity_amount: scaled(p.harm_clarity),
            pitch_shift: semitones(p.shift_pitch),
            formant_shift: semitones(p.shift_formant),
            mix_amount: scaled(p.space_mix),
            character_amount: scaled(p.space_char),
            width_amount: p.void_width,
            drive_db: p.wall_drive,
            ceiling_db: p.wall_ceiling,
            muscle: p.muscle,
        }
    }
}

/// Stage-ready controls for one block, already remapped and clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageControls {
    pub function_amount: f32,
    pub sustain_cut: f32,
    pub scoop_amount: f32,
    pub bite_amount: f32,
    pub grit_amount: f32,
    pub clarity_amount: f32,
    /// Semitones.
    pub pitch_shift: f32,
    /// Semitones.
    pub formant_shift: f32,
    pub mix_amount: f32,
    pub character_amount: f32,
    pub width_amount: f32,
    pub drive_db: f32,
    pub ceiling_db: f32,
    pub muscle: f32,
}
