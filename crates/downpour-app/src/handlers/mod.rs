//! GUI-invoked handlers.
//!
//! Thin adapters: validate input, call the core, wrap errors with the
//! operation name and a user-facing message before they cross outward.

mod convert;
mod roadmap;
mod settings;
mod video;
mod whisper;

pub use convert::ConvertHandler;
pub use roadmap::RoadmapHandler;
pub use settings::SettingsHandler;
pub use video::VideoHandler;
pub use whisper::WhisperHandler;
