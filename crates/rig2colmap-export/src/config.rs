use rig2colmap_io::colmap::ModelFormat;
use serde::Deserialize;

use crate::error::ExportError;

/// Prefix of the collections whose cameras are exported.
pub const DEFAULT_COLLECTION_PREFIX: &str = "colmap_";

/// Settings of an export run.
///
/// Missing fields take their default when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Cameras in a collection whose name starts with this prefix are exported.
    pub collection_prefix: String,
    /// Model format, `".txt"` or `".bin"`. Anything else writes text.
    pub format: String,
    /// Extension of the rendered frames, including the dot.
    pub image_extension: String,
    /// Log what would be rendered and written instead of doing it.
    pub dry_run: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            collection_prefix: DEFAULT_COLLECTION_PREFIX.to_string(),
            format: ModelFormat::Text.extension().to_string(),
            image_extension: ".jpg".to_string(),
            dry_run: false,
        }
    }
}

impl ExportConfig {
    /// Default settings writing the given model format.
    pub fn with_format(format: ModelFormat) -> Self {
        Self {
            format: format.extension().to_string(),
            ..Default::default()
        }
    }

    /// The model format to write.
    pub fn model_format(&self) -> ModelFormat {
        ModelFormat::from_str_lossy(&self.format)
    }

    /// Check the settings that end up in file names.
    ///
    /// The image extension must be a dot followed by a suffix that keeps the
    /// frame inside the images directory.
    pub fn validate(&self) -> Result<(), ExportError> {
        let ext = self.image_extension.as_str();
        let valid = ext.len() > 1
            && ext.starts_with('.')
            && ext.trim() == ext
            && !ext.contains(['/', '\\', '\0', '\n', '\r']);
        if !valid {
            return Err(ExportError::InvalidImageExtension(ext.to_string()));
        }
        Ok(())
    }

    /// The file name of the frame rendered from camera `name`.
    pub fn image_name(&self, name: &str) -> String {
        format!("{}{}", name, self.image_extension)
    }
}
