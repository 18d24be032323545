//! Settings shared by every bookindex crate.

pub mod settings;

pub use settings::{Environment, LogFormat, SearchSettings, ServerSettings, Settings, TelemetrySettings};
