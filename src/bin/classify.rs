//! Classifies one image with a serialized engine and prints the top results.

use anyhow::{Context, Result};
use clap::Parser;
use enginert_inference::InferenceSession;
use enginert_inference::gpu::GpuRuntime;
use enginert_inference::host::HostRuntime;
use enginert_inference::inference::{DEFAULT_TOP_K, Labels, write_report};
use enginert_inference::runtime::Runtime;
use log::warn;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "classify")]
#[command(about = "Classify an image with a serialized engine", long_about = None)]
struct Args {
    /// Path to the serialized engine
    #[arg(value_name = "ENGINE")]
    engine: PathBuf,

    /// Image to classify
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Newline-delimited class labels, line i naming output i
    #[arg(value_name = "LABELS", default_value = "mobilenet_labels.txt")]
    labels: PathBuf,
}

fn run<R: Runtime>(runtime: &R, args: &Args) -> Result<()> {
    let labels = Labels::from_file(&args.labels)
        .with_context(|| format!("Failed to read labels {}", args.labels.display()))?;
    let mut session = InferenceSession::from_file(runtime, &args.engine)
        .with_context(|| format!("Failed to load engine {}", args.engine.display()))?;

    let predictions = session
        .classify(&args.image, &labels, DEFAULT_TOP_K)
        .with_context(|| format!("Failed to classify {}", args.image.display()))?;

    let stdout = io::stdout();
    write_report(
        &mut stdout.lock(),
        &args.image.display().to_string(),
        &predictions,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match GpuRuntime::new() {
        Ok(runtime) => run(&runtime, &args),
        Err(error) => {
            warn!("GPU runtime unavailable ({}), falling back to the host runtime", error);
            run(&HostRuntime::new(), &args)
        }
    }
}
