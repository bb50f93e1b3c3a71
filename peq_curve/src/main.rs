//! Configure the equalizer from the command line, optionally run a test tone through it, and print
//! its adaptive response curve as CSV.

use anyhow::{bail, Context, Result};
use clap::Parser;
use peq::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Print the equalizer's response curve as `frequency_hz,magnitude_db` lines.
#[derive(Debug, Clone, Parser)]
#[clap(about = None, long_about = None)]
struct Args {
    /// The sample rate the filters are designed for.
    #[clap(value_parser, short = 'r', long, default_value = "48000")]
    sample_rate: f32,
    /// The number of channels to process. Either one or two.
    #[clap(value_parser, short = 'c', long, default_value = "2")]
    channels: u32,
    /// The maximum block size.
    #[clap(value_parser, short = 'b', long, default_value = "512")]
    buffer_size: u32,

    /// A JSON state file to load parameter values from.
    #[clap(value_parser, long)]
    state: Option<PathBuf>,
    /// A JSON configuration file for the processor and the curve sampler.
    #[clap(value_parser, long)]
    config: Option<PathBuf>,

    /// Render this many seconds of a sine tone through the equalizer and log the peak meters.
    #[clap(value_parser, long)]
    tone_seconds: Option<f32>,
    /// The frequency of the test tone.
    #[clap(value_parser, long, default_value = "1000")]
    tone_frequency: f32,

    /// Parameter overrides in the form `id=value`, for instance `b1_gain=6` or `hpf_slope=24db`.
    /// These are applied after the state file.
    #[clap(value_parser)]
    overrides: Vec<String>,
}

fn main() -> Result<()> {
    util::setup_logger();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read '{}'", path.display()))?;
            Config::from_json(&json)
                .with_context(|| format!("Could not parse '{}'", path.display()))?
        }
        None => Config::default(),
    };

    let params = Arc::new(EqParams::default());
    if let Some(path) = &args.state {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read '{}'", path.display()))?;
        let num_restored = deserialize_json(params.as_ref(), &json)
            .with_context(|| format!("Could not restore '{}'", path.display()))?;
        peq_log!("Restored {num_restored} parameters from '{}'", path.display());
    }
    for assignment in &args.overrides {
        apply_override(params.as_ref(), assignment)?;
    }

    let (mut processor, mut evaluator) = EqProcessor::new(params, config.eq);
    processor
        .prepare(ProcessConfig {
            sample_rate: args.sample_rate,
            max_buffer_size: args.buffer_size,
            num_channels: args.channels,
        })
        .context("Could not prepare the equalizer")?;

    if let Some(seconds) = args.tone_seconds {
        render_tone(&mut processor, &args, seconds)?;
    }

    let mut sampler = CurveSampler::new(config.curve);
    let curve = sampler.refresh(&mut evaluator.snapshot());
    peq_log!("Sampled the response at {} frequencies", curve.len());

    println!("frequency_hz,magnitude_db");
    for (frequency, magnitude_db) in curve.iter_db() {
        println!("{frequency:.3},{magnitude_db:.4}");
    }

    Ok(())
}

fn apply_override(params: &EqParams, assignment: &str) -> Result<()> {
    let (id, value) = match assignment.split_once('=') {
        Some((id, value)) => (id.trim(), value.trim()),
        None => bail!("Expected 'id=value', got '{assignment}'"),
    };

    let param = match params.param(id) {
        Some(param) => param,
        None => bail!("Unknown parameter '{id}'"),
    };
    if !param.set_from_string(value) {
        bail!("'{value}' is not a valid value for '{id}'");
    }
    peq_trace!("Set '{id}' to {param}");

    Ok(())
}

/// Run `seconds` of a sine tone through `processor` one block at a time.
fn render_tone(processor: &mut EqProcessor, args: &Args, seconds: f32) -> Result<()> {
    if !(seconds.is_finite() && seconds >= 0.0) {
        bail!("The tone length must be a positive number of seconds");
    }

    let num_samples = (seconds * args.sample_rate) as usize;
    let block_size = args.buffer_size as usize;
    let phase_delta = std::f32::consts::TAU * args.tone_frequency / args.sample_rate;

    let mut channels = vec![vec![0.0f32; block_size]; args.channels as usize];
    let mut phase = 0.0f32;
    let mut samples_rendered = 0;
    while samples_rendered < num_samples {
        let block_len = block_size.min(num_samples - samples_rendered);
        for sample_idx in 0..block_len {
            let value = (phase + phase_delta * sample_idx as f32).sin() * 0.5;
            for channel in channels.iter_mut() {
                channel[sample_idx] = value;
            }
        }
        phase = (phase + phase_delta * block_len as f32) % std::f32::consts::TAU;

        let mut slices: Vec<&mut [f32]> = channels
            .iter_mut()
            .map(|channel| &mut channel[..block_len])
            .collect();
        if let ProcessStatus::Error(err) = processor.process(&mut Buffer::new(&mut slices)) {
            bail!("Processing failed: {err}");
        }

        samples_rendered += block_len;
    }

    let meters = processor.meters();
    for channel_idx in 0..args.channels as usize {
        peq_log!(
            "Channel {channel_idx}: input peak {:.2} dB, output peak {:.2} dB",
            util::gain_to_db(meters.input_peak(channel_idx)),
            util::gain_to_db(meters.output_peak(channel_idx))
        );
    }

    Ok(())
}
