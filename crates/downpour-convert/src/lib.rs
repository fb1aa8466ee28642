//! ffmpeg-backed media conversions for Downpour.
//!
//! Every operation is a one-shot process invocation with a deterministic
//! output path. Progress is coarse (start/done).

mod client;
mod paths;
mod runner;

pub use client::FfmpegConverter;
pub use paths::{compressed_output_path, converted_output_path};
