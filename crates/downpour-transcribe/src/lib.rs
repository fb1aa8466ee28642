//! whisper.cpp transcription engine for Downpour.
//!
//! Manages the engine binary and its GGML models, runs transcriptions as
//! child processes with streaming progress, and renders results into
//! document formats.

mod engine;
mod export;
mod models;

pub use engine::{WhisperConfig, WhisperEngine};
pub use export::render;
pub use models::catalog;
