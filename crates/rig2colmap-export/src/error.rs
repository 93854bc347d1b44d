use rig2colmap_camera::CameraError;
use rig2colmap_io::colmap::ColmapError;

/// An error type for the dataset export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// No scene camera belongs to a marker collection.
    #[error("No cameras found in collections prefixed with {prefix:?}")]
    SelectionEmpty {
        /// The collection name prefix that was searched for.
        prefix: String,
    },

    /// A camera carries unusable lens, resolution or transform values.
    #[error("Camera {camera:?} cannot be exported: {source}")]
    InvalidInput {
        /// Name of the scene camera.
        camera: String,
        /// What was wrong with it.
        #[source]
        source: CameraError,
    },

    /// A camera name cannot be used as an image file name.
    #[error("Camera name {0:?} cannot be used as an image file name")]
    InvalidCameraName(String),

    /// Two selected cameras would save their frames to the same file.
    #[error("Several cameras would save their frame as {0:?}")]
    DuplicateImageName(String),

    /// The frame extension cannot be appended to a file name.
    #[error("Image extension {0:?} must be a dot followed by a plain file suffix")]
    InvalidImageExtension(String),

    /// The model could not be encoded or written.
    #[error(transparent)]
    Model(#[from] ColmapError),

    /// Error creating the output directories.
    #[error("error creating output directory: {0}")]
    Io(#[from] std::io::Error),

    /// The renderer failed.
    #[error("renderer failed: {0}")]
    Render(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The export was cancelled before the model was written.
    #[error("export cancelled")]
    Cancelled,
}

impl ExportError {
    /// Whether the error is a filesystem failure rather than bad input.
    pub fn is_io_error(&self) -> bool {
        match self {
            ExportError::Io(_) => true,
            ExportError::Model(err) => !err.is_format_error(),
            _ => false,
        }
    }
}
