//! The inference runner.
//!
//! Runs one sample through a deserialized engine: allocate paired host and
//! device buffers from the declared binding shapes, optionally materialize an
//! image into the host input, execute once, copy the output back, and rank the
//! scores against a label list.

pub mod buffers;
pub mod executor;
pub mod input;
pub mod labels;
pub mod report;
pub mod session;

pub use buffers::{
    HostBuffer, INPUT_BINDING, InferenceBuffers, OUTPUT_BINDING, allocate_buffers,
    binding_element_count,
};
pub use executor::do_inference;
pub use input::{NORMALIZATION_SCALE, load_input, materialize};
pub use labels::Labels;
pub use report::{DEFAULT_TOP_K, Prediction, rank_scores, top_k, write_report};
pub use session::InferenceSession;
