use std::path::Path;

use rig2colmap_io::colmap::ModelFormat;

use crate::{
    config::ExportConfig,
    error::ExportError,
    exporter::DatasetExporter,
    render::Renderer,
    scene::Scene,
};

/// How a user-facing export command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The dataset was exported.
    Finished,
    /// Nothing was exported; the message tells the user why.
    Warning(String),
}

/// Export the scene as a text model into the existing directory `dir`.
pub fn export_text<R: Renderer>(
    scene: &Scene,
    renderer: &mut R,
    dir: impl AsRef<Path>,
) -> Result<ExportOutcome, ExportError> {
    let exporter = DatasetExporter::new(ExportConfig::with_format(ModelFormat::Text));
    execute(&exporter, scene, renderer, dir, |_| {})
}

/// Export the scene as a binary model into the existing directory `dir`.
pub fn export_binary<R: Renderer>(
    scene: &Scene,
    renderer: &mut R,
    dir: impl AsRef<Path>,
) -> Result<ExportOutcome, ExportError> {
    let exporter = DatasetExporter::new(ExportConfig::with_format(ModelFormat::Binary));
    execute(&exporter, scene, renderer, dir, |_| {})
}

/// Run an export the way a user command does.
///
/// The target must be an existing directory. A missing directory and a scene
/// without marked cameras are reported as [`ExportOutcome::Warning`]; every
/// other failure is returned as an error.
pub fn execute<R, P>(
    exporter: &DatasetExporter,
    scene: &Scene,
    renderer: &mut R,
    dir: impl AsRef<Path>,
    progress: P,
) -> Result<ExportOutcome, ExportError>
where
    R: Renderer,
    P: FnMut(f32),
{
    let dir = dir.as_ref();
    if !dir.is_dir() {
        let message = format!("Illegal directory was passed: {}", dir.display());
        log::warn!("{message}");
        return Ok(ExportOutcome::Warning(message));
    }

    match exporter.export(scene, renderer, dir, progress) {
        Ok(_) => Ok(ExportOutcome::Finished),
        Err(err @ ExportError::SelectionEmpty { .. }) => {
            log::warn!("{err}");
            Ok(ExportOutcome::Warning(err.to_string()))
        }
        Err(err) => Err(err),
    }
}
