//! Builds the CBR sample network and serializes its engine.
//!
//! The network reads a 3x224x224 `data` input and runs three convolution + ReLU
//! branches over it. The outputs of the first and third branches are
//! concatenated along the channel axis into the `prob` output; the second
//! branch is built but nothing reads it.

use anyhow::{Context, Result};
use clap::Parser;
use enginert_inference::network::{
    Builder, BuilderConfig, NetworkDefinition, TensorId, Weights, platform_has_fast_fp16,
};
use enginert_inference::Activation;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::PathBuf;

const INPUT_NAME: &str = "data";
const INPUT_SHAPE: [i64; 3] = [3, 224, 224];
const OUTPUT_NAME: &str = "prob";

const NUM_OUTPUT_MAPS: usize = 64;
const KERNEL_SHAPE: [usize; 2] = [7, 7];
const STRIDE: [usize; 2] = [2, 2];
const PADDING: [usize; 2] = [3, 3];

const WEIGHTS_SEED: u64 = 0x00C0_FFEE;

#[derive(Parser)]
#[command(name = "build_cbr_engine")]
#[command(about = "Build the convolution + ReLU sample engine", long_about = None)]
struct Args {
    /// Where to write the serialized engine
    #[arg(value_name = "OUTPUT", default_value = "cbr_engine16")]
    output: PathBuf,
}

/// Adds one convolution + ReLU branch with random weights and returns its output.
fn add_cbr(network: &mut NetworkDefinition, input: TensorId, rng: &mut StdRng) -> Result<TensorId> {
    let in_channels = INPUT_SHAPE[0] as usize;
    let kernel = Weights::random(
        NUM_OUTPUT_MAPS * in_channels * KERNEL_SHAPE[0] * KERNEL_SHAPE[1],
        rng,
    );
    let bias = Weights::random(NUM_OUTPUT_MAPS, rng);

    let conv = network.add_convolution(input, NUM_OUTPUT_MAPS, KERNEL_SHAPE, kernel, bias)?;
    network.set_stride(conv, STRIDE)?;
    network.set_padding(conv, PADDING)?;

    let relu = network.add_activation(network.layer_output(conv)?, Activation::Relu)?;
    Ok(network.layer_output(relu)?)
}

fn populate_network(network: &mut NetworkDefinition, rng: &mut StdRng) -> Result<()> {
    let input = network.add_input(INPUT_NAME, INPUT_SHAPE)?;

    let cbr_output0 = add_cbr(network, input, rng)?;
    let _unused_branch = add_cbr(network, input, rng)?;
    let cbr_output2 = add_cbr(network, input, rng)?;

    let concat = network.add_concatenation(&[cbr_output0, cbr_output2])?;
    let output = network.layer_output(concat)?;
    network.set_tensor_name(output, OUTPUT_NAME)?;
    network.mark_output(output)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let fp16_mode = platform_has_fast_fp16();
    if fp16_mode {
        info!("fast fp16 enabled");
    }
    let builder = Builder::new(BuilderConfig {
        max_batch_size: 1,
        fp16_mode,
    });

    let mut rng = StdRng::seed_from_u64(WEIGHTS_SEED);
    let mut network = NetworkDefinition::new();
    populate_network(&mut network, &mut rng).context("Failed to describe the CBR network")?;

    let plan = builder
        .build_engine(&network)
        .context("Failed to build the engine")?;
    let serialized = plan.serialize()?;
    fs::write(&args.output, &serialized)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        "Wrote {} ({} bytes, output {} of shape {})",
        args.output.display(),
        serialized.len(),
        OUTPUT_NAME,
        plan.binding_dims(1).map(ToString::to_string).unwrap_or_default()
    );
    Ok(())
}
