//! Loads a serialized engine and runs it repeatedly in one execution context.

use anyhow::{Context, Result};
use clap::Parser;
use enginert_inference::InferenceSession;
use enginert_inference::gpu::GpuRuntime;
use enginert_inference::host::HostRuntime;
use enginert_inference::runtime::Runtime;
use log::{info, warn};
use std::path::{Path, PathBuf};

const ITERATIONS: usize = 10;

#[derive(Parser)]
#[command(name = "run_engine")]
#[command(about = "Execute a serialized engine on a zero input", long_about = None)]
struct Args {
    /// Path to the serialized engine
    #[arg(value_name = "ENGINE")]
    engine: PathBuf,
}

fn run<R: Runtime>(runtime: &R, engine_path: &Path) -> Result<()> {
    let mut session = InferenceSession::from_file(runtime, engine_path)
        .with_context(|| format!("Failed to load engine {}", engine_path.display()))?;

    for iteration in 0..ITERATIONS {
        let output = session
            .infer()
            .with_context(|| format!("Inference {} failed", iteration + 1))?;
        info!("Iteration {}: {} output values", iteration + 1, output.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match GpuRuntime::new() {
        Ok(runtime) => run(&runtime, &args.engine),
        Err(error) => {
            warn!("GPU runtime unavailable ({}), falling back to the host runtime", error);
            run(&HostRuntime::new(), &args.engine)
        }
    }
}
