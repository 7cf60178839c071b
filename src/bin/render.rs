use aggressor::config::{apply_overrides, load_params};
use aggressor::rack::params::RackParams;
use aggressor::render::{DEFAULT_BLOCK_SIZE, render_file};
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aggressor-render")]
#[command(version)]
#[command(about = "Render a WAV file through the feature-reactive vocal chain.")]
struct Args {
    /// Mono or stereo WAV to process.
    #[arg(required_unless_present = "dump_params")]
    input: Option<PathBuf>,

    /// Where to write the processed 32-bit float WAV.
    #[arg(required_unless_present = "dump_params")]
    output: Option<PathBuf>,

    #[arg(
        long,
        env = "AGGRESSOR_PARAMS",
        help = "JSON parameter file (missing fields use defaults)"
    )]
    params: Option<PathBuf>,

    #[arg(long = "set", value_name = "NAME=VALUE", help = "Override one parameter; repeatable")]
    overrides: Vec<String>,

    #[arg(long, help = "WAV whose level and tone drive the detector instead of the input")]
    sidechain: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, help = "Samples per processing block")]
    block_size: usize,

    #[arg(long, help = "Print the effective parameters as JSON and exit")]
    dump_params: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    info!("aggressor-render v{}", env!("CARGO_PKG_VERSION"));

    let mut params = match &args.params {
        Some(path) => load_params(path)?,
        None => RackParams::default(),
    };
    apply_overrides(&mut params, &args.overrides).context("invalid --set override")?;

    if args.dump_params {
        println!("{}", serde_json::to_string_pretty(&params)?);
        return Ok(());
    }

    let (Some(input), Some(output)) = (args.input.as_deref(), args.output.as_deref()) else {
        anyhow::bail!("INPUT and OUTPUT are required unless --dump-params is given");
    };

    let report = render_file(
        input,
        output,
        args.sidechain.as_deref(),
        params,
        args.block_size,
    )?;

    println!(
        "{} frames, {} blocks, {} ch @ {} Hz, peak {:.2} dBFS",
        report.frames,
        report.blocks,
        report.channels,
        report.sample_rate,
        report.peak_db()
    );
    Ok(())
}
