use aggressor::rack::Features;
use aggressor::rack::params::{Bypass, RackParams};
use aggressor::rack::stages::clipper::ClipperStage;
use aggressor::rack::stages::common::db_to_lin;
use aggressor::rack::stages::{ProcessSpec, Stage};
use aggressor::rack::{AggressorChain, ChainHandle};
use anyhow::Result;
use std::f32::consts::TAU;

const SAMPLE_RATE: f64 = 48_000.0;
const BLOCK_SIZE: usize = 512;

fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (TAU * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn prepared(params: RackParams, channels: usize) -> Result<(AggressorChain, ChainHandle)> {
    let (mut chain, handle) = AggressorChain::new(params);
    chain.prepare(SAMPLE_RATE, BLOCK_SIZE, channels)?;
    Ok((chain, handle))
}

/// Push a stereo signal through in full blocks and return both output channels.
fn run_stereo(chain: &mut AggressorChain, left: &[f32], right: &[f32]) -> Result<(Vec<f32>, Vec<f32>)> {
    let mut out_l = left.to_vec();
    let mut out_r = right.to_vec();
    for (l, r) in out_l.chunks_mut(BLOCK_SIZE).zip(out_r.chunks_mut(BLOCK_SIZE)) {
        chain.process(&mut [l, r], None)?;
    }
    Ok((out_l, out_r))
}

#[test]
fn silence_in_silence_out() -> Result<()> {
    let params = RackParams {
        muscle: 1.0,
        wall_drive: 0.0,
        wall_ceiling: -0.1,
        bypass: Bypass::default(),
        ..RackParams::default()
    };
    let (mut chain, handle) = prepared(params, 2)?;

    let mut left = vec![0.0f32; BLOCK_SIZE];
    let mut right = vec![0.0f32; BLOCK_SIZE];
    chain.process(&mut [&mut left[..], &mut right[..]], None)?;

    assert!(left.iter().chain(&right).all(|&s| s == 0.0));
    assert_eq!(chain.level(), 0.0);
    assert_eq!(handle.meter().peak_linear, 0.0);
    assert_eq!(handle.meter().peak_db, -100.0);
    Ok(())
}

#[test]
fn fully_dry_blend_only_meets_the_wall() -> Result<()> {
    let params = RackParams {
        intensity: 1.0,
        muscle: 0.0,
        dyn_amount: 1.0,
        harm_grit: 1.0,
        shift_pitch: 0.9,
        space_mix: 1.0,
        void_width: 1.0,
        ..RackParams::default()
    };
    let (mut chain, _) = prepared(params, 2)?;

    let input = sine(1000.0, db_to_lin(-6.0), 9 * BLOCK_SIZE);
    let (left, right) = run_stereo(&mut chain, &input, &input)?;

    for (i, (&l, &x)) in left.iter().zip(&input).enumerate().skip(2048) {
        assert!((l - x).abs() < 0.02, "sample {i}: {l} vs {x}");
    }
    assert_eq!(left, right);
    Ok(())
}

#[test]
fn identical_runs_are_identical() -> Result<()> {
    let params = RackParams {
        intensity: 0.8,
        shift_pitch: 0.7,
        space_char: 0.9,
        ..RackParams::default()
    };
    let left = sine(220.0, 0.6, 8 * BLOCK_SIZE);
    let right = sine(330.0, 0.4, 8 * BLOCK_SIZE);

    let (mut first, _) = prepared(params, 2)?;
    let (mut second, _) = prepared(params, 2)?;
    let a = run_stereo(&mut first, &left, &right)?;
    let b = run_stereo(&mut second, &left, &right)?;

    assert_eq!(a, b);
    assert_eq!(first.features(), second.features());
    Ok(())
}

#[test]
fn boundary_contract_is_enforced() -> Result<()> {
    let (mut chain, _) = AggressorChain::new(RackParams::default());
    let mut block = vec![0.1f32; 64];
    assert!(chain.process(&mut [&mut block[..]], None).is_err());

    chain.prepare(SAMPLE_RATE, 128, 1)?;

    let mut left = vec![0.1f32; 64];
    let mut right = vec![0.1f32; 64];
    assert!(
        chain
            .process(&mut [&mut left[..], &mut right[..]], None)
            .is_err(),
        "more channels than prepared"
    );

    let mut long = vec![0.1f32; 129];
    assert!(chain.process(&mut [&mut long[..]], None).is_err());

    let mut empty: Vec<f32> = Vec::new();
    chain.process(&mut [&mut empty[..]], None)?;
    chain.process(&mut [&mut block[..]], None)?;

    let (mut stereo, _) = prepared(RackParams::default(), 2)?;
    let mut short = vec![0.1f32; 32];
    assert!(
        stereo
            .process(&mut [&mut block[..], &mut short[..]], None)
            .is_err(),
        "ragged channels"
    );
    Ok(())
}

#[test]
fn sidechain_drives_the_detector() -> Result<()> {
    let (mut chain, _) = prepared(RackParams::default(), 1)?;
    let loud = sine(300.0, 0.9, BLOCK_SIZE);
    let side: [&[f32]; 1] = [&loud];

    for _ in 0..40 {
        let mut quiet = vec![0.0f32; BLOCK_SIZE];
        chain.process(&mut [&mut quiet[..]], Some(&side[..]))?;
    }
    assert!(chain.features().intensity > 0.5);

    // a sidechain shorter than the block is ignored
    let (mut fallback, _) = prepared(RackParams::default(), 1)?;
    let stub = &loud[..100];
    let short: [&[f32]; 1] = [stub];
    for _ in 0..40 {
        let mut quiet = vec![0.0f32; BLOCK_SIZE];
        fallback.process(&mut [&mut quiet[..]], Some(&short[..]))?;
    }
    assert_eq!(fallback.features().intensity, 0.0);
    Ok(())
}

#[test]
fn driven_tone_stays_near_the_ceiling() -> Result<()> {
    let mut params = RackParams {
        intensity: 1.0,
        wall_drive: 12.0,
        wall_ceiling: -6.0,
        ..RackParams::default()
    };
    params.bypass.space = true;
    params.bypass.shift = true;
    let (mut chain, handle) = prepared(params, 2)?;

    let input = sine(1000.0, 0.9, 24 * BLOCK_SIZE);
    let (left, right) = run_stereo(&mut chain, &input, &input)?;

    let limit = db_to_lin(-6.0);
    let peak = left[BLOCK_SIZE * 12..]
        .iter()
        .chain(&right[BLOCK_SIZE * 12..])
        .fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak <= limit * 1.1, "peak {peak} vs ceiling {limit}");
    assert!((handle.meter().peak_linear - chain.level()).abs() < f32::EPSILON);
    Ok(())
}

#[test]
fn mono_chain_runs_every_stage() -> Result<()> {
    let (mut chain, handle) = prepared(RackParams::default(), 1)?;
    let mut signal = sine(440.0, 0.5, 16 * BLOCK_SIZE);
    for block in signal.chunks_mut(BLOCK_SIZE) {
        chain.process(&mut [block], None)?;
    }
    assert!(signal.iter().all(|s| s.is_finite()));
    assert!(chain.level() > 0.0);

    let info = handle.meter();
    assert!(info.intensity > 0.0 && info.intensity <= 1.0);
    assert!((0.0..=1.0).contains(&info.density));
    assert!((0.0..=1.0).contains(&info.timbre));
    assert!((0.0..=1.0).contains(&info.air));
    Ok(())
}

#[test]
fn published_params_apply_from_the_next_block() -> Result<()> {
    let (mut chain, handle) = prepared(RackParams::default(), 1)?;
    let input = sine(1000.0, 0.5, BLOCK_SIZE);

    let mut wet = input.clone();
    chain.process(&mut [&mut wet[..]], None)?;

    handle.set_params(RackParams {
        muscle: 0.0,
        ..handle.params()
    });
    for _ in 0..8 {
        let mut block = input.clone();
        chain.process(&mut [&mut block[..]], None)?;
        wet = block;
    }
    let err = wet
        .iter()
        .zip(&input)
        .map(|(o, i)| (o - i).abs())
        .fold(0.0f32, f32::max);
    // each block restarts the tone, so the DC blocker sees a small offset
    assert!(err < 0.05, "muscle 0 should leave the dry tone, max error {err}");
    Ok(())
}

fn peak(signal: &[f32]) -> f32 {
    signal.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

#[test]
fn all_stages_bypassed_leaves_only_the_wall() -> Result<()> {
    let params = RackParams {
        intensity: 0.8,
        muscle: 1.0,
        void_width: 0.0,
        wall_drive: 6.0,
        wall_ceiling: -3.0,
        bypass: Bypass {
            dynamics: true,
            spectral: true,
            harmonics: true,
            shift: true,
            space: true,
        },
        ..RackParams::default()
    };
    let (mut chain, _) = prepared(params, 2)?;
    let left = sine(220.0, 0.8, 6 * BLOCK_SIZE);
    let right = sine(330.0, 0.5, 6 * BLOCK_SIZE);
    let (out_l, out_r) = run_stereo(&mut chain, &left, &right)?;

    let mut wall = ClipperStage::new();
    wall.prepare(&ProcessSpec {
        sample_rate: SAMPLE_RATE as f32,
        max_block_size: BLOCK_SIZE,
        channels: 2,
    });
    wall.update(&params.stage_controls());
    let mut expected_l = left.clone();
    let mut expected_r = right.clone();
    for (l, r) in expected_l
        .chunks_mut(BLOCK_SIZE)
        .zip(expected_r.chunks_mut(BLOCK_SIZE))
    {
        wall.process_block(&mut [l, r], &Features::default());
    }

    assert_eq!(out_l, expected_l);
    assert_eq!(out_r, expected_r);
    Ok(())
}

#[test]
fn bypassing_a_stage_removes_its_colour() -> Result<()> {
    let gritty = RackParams {
        intensity: 1.0,
        harm_grit: 1.0,
        ..RackParams::default()
    };
    let mut clean = gritty;
    clean.bypass.harmonics = true;

    let input = sine(440.0, 0.5, 8 * BLOCK_SIZE);
    let (mut with_grit, _) = prepared(gritty, 2)?;
    let (mut without_grit, _) = prepared(clean, 2)?;
    let (a, _) = run_stereo(&mut with_grit, &input, &input)?;
    let (b, _) = run_stereo(&mut without_grit, &input, &input)?;

    let diff = a
        .iter()
        .zip(&b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0f32, f32::max);
    assert!(diff > 0.05, "bypassed harmonics changed nothing (max diff {diff})");
    Ok(())
}

#[test]
fn half_muscle_is_the_mean_of_dry_and_wet() -> Result<()> {
    let with_muscle = |muscle: f32| {
        let mut params = RackParams {
            muscle,
            wall_ceiling: 0.0,
            ..RackParams::default()
        };
        params.bypass.space = true;
        params
    };
    // quiet enough that the wall stays below its knee and acts linearly
    let input = sine(1000.0, 0.05, 8 * BLOCK_SIZE);

    let mut outputs = Vec::new();
    for muscle in [0.0, 1.0, 0.5] {
        let (mut chain, _) = prepared(with_muscle(muscle), 2)?;
        let (left, _) = run_stereo(&mut chain, &input, &input)?;
        outputs.push(left);
    }
    let [dry, wet, half] = &outputs[..] else {
        unreachable!()
    };
    assert!(peak(wet) < 0.6, "wet path reached the knee: {}", peak(wet));
    assert!(peak(dry) < 0.6);

    for (i, ((&h, &d), &w)) in half.iter().zip(dry).zip(wet).enumerate() {
        let expected = 0.5 * d + 0.5 * w;
        assert!((h - expected).abs() < 1e-4, "sample {i}: {h} vs {expected}");
    }
    Ok(())
}

#[test]
fn reset_silences_every_tail() -> Result<()> {
    let params = RackParams {
        intensity: 0.8,
        space_mix: 1.0,
        space_char: 1.0,
        shift_pitch: 0.8,
        ..RackParams::default()
    };
    let (mut chain, handle) = prepared(params, 2)?;
    let input = sine(300.0, 0.8, 4 * BLOCK_SIZE);
    run_stereo(&mut chain, &input, &input)?;
    assert!(chain.level() > 0.0);

    chain.reset();
    assert_eq!(chain.features(), Features::default());
    assert_eq!(chain.level(), 0.0);
    assert_eq!(handle.meter().peak_db, -100.0);

    let silence = vec![0.0f32; BLOCK_SIZE];
    let (left, right) = run_stereo(&mut chain, &silence, &silence)?;
    assert!(left.iter().chain(&right).all(|&s| s == 0.0));
    Ok(())
}
