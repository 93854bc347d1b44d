#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// User-facing export commands.
pub mod command;

/// Export settings.
pub mod config;

/// Error types for the export.
pub mod error;

/// The export pipeline.
pub mod exporter;

/// The renderer collaborator.
pub mod render;

/// Host scene description.
pub mod scene;

pub use command::{export_binary, export_text, ExportOutcome};
pub use config::ExportConfig;
pub use error::ExportError;
pub use exporter::{CancelToken, DatasetExporter, ExportSummary};
pub use render::{DryRunRenderer, Renderer};
pub use scene::{RenderSettings, Scene, SceneCamera};
