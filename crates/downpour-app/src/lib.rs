//! Application layer for Downpour.
//!
//! Thin handlers between the GUI shell and the core components, plus the
//! bootstrap that wires everything in dependency order.

mod bootstrap;
mod events;
mod handlers;
mod logging;
mod paths;

pub use bootstrap::{AppConfig, AppCore};
pub use events::BroadcastEmitter;
pub use handlers::{
    ConvertHandler, RoadmapHandler, SettingsHandler, VideoHandler, WhisperHandler,
};
pub use logging::init_logging;
pub use paths::DataPaths;
