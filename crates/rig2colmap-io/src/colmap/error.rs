use std::path::PathBuf;

use super::CameraModelId;

/// Error types for the COLMAP module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ColmapError {
    /// Error reading or writing file
    #[error("error reading or writing file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error moving a finished file into place
    #[error("error replacing model file: {0}")]
    PersistError(#[from] tempfile::PersistError),

    /// Some model files were replaced before moving a later one failed
    #[error("model left partially written: {} replaced before {} failed", display_paths(.replaced), .path.display())]
    PartialWrite {
        /// Files already holding the new model
        replaced: Vec<PathBuf>,
        /// The file that could not be replaced
        path: PathBuf,
        /// The underlying failure
        #[source]
        source: tempfile::PersistError,
    },

    /// Unknown camera model name
    #[error("Unknown camera model: {0}")]
    UnknownCameraModel(String),

    /// Unknown camera model id
    #[error("Unknown camera model id: {0}")]
    UnknownCameraModelId(i32),

    /// Invalid number of camera parameters
    #[error("Invalid number of camera parameters for {model}: expected {expected}, got {actual}")]
    InvalidNumCameraParams {
        /// The camera model
        model: CameraModelId,
        /// Number of parameters the model expects
        expected: usize,
        /// Number of parameters found
        actual: usize,
    },

    /// An image references a camera that does not exist
    #[error("Image {image_id} references unknown camera {camera_id}")]
    UnknownCamera {
        /// Image id
        image_id: u32,
        /// Referenced camera id
        camera_id: u32,
    },

    /// A point track references an image that does not exist
    #[error("Point3D {point3d_id} references unknown image {image_id}")]
    UnknownImage {
        /// Point3d id
        point3d_id: u64,
        /// Referenced image id
        image_id: u32,
    },

    /// The 2d points and point3d ids of an image differ in length
    #[error("Image {image_id} has {xys} points but {point3d_ids} point3D ids")]
    MismatchedObservations {
        /// Image id
        image_id: u32,
        /// Number of 2d points
        xys: usize,
        /// Number of point3d ids
        point3d_ids: usize,
    },

    /// A record is stored under a key different from its id
    #[error("{table} record with id {id} is stored under key {key}")]
    MismatchedId {
        /// Table name
        table: &'static str,
        /// Map key
        key: u64,
        /// Record id
        id: u64,
    },

    /// The same id appears twice in one table
    #[error("Duplicate {table} id {id}")]
    DuplicateId {
        /// Table name
        table: &'static str,
        /// The repeated id
        id: u64,
    },

    /// An id does not fit the width of its binary field
    #[error("{field} {value} does not fit the binary format")]
    IdOutOfRange {
        /// Field name
        field: &'static str,
        /// The value
        value: u64,
    },

    /// An image name cannot be represented in the target format
    #[error("Invalid image name {0:?}")]
    InvalidImageName(String),

    /// The input ended in the middle of a record
    #[error("Truncated input while reading {0}")]
    Truncated(&'static str),

    /// Bytes left over after the last record
    #[error("Unexpected trailing data after {0} records")]
    TrailingData(u64),

    /// Parse error
    #[error("Parse error {0}")]
    ParseError(String),
}

impl ColmapError {
    /// Whether the error describes malformed or unsupported model data, as
    /// opposed to a failure of the filesystem.
    pub fn is_format_error(&self) -> bool {
        !matches!(
            self,
            Self::IoError(_) | Self::PersistError(_) | Self::PartialWrite { .. }
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
