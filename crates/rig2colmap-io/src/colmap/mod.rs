mod atomic;
mod error;

/// Binary model files (`*.bin`).
pub mod binary;

/// Text model files (`*.txt`).
pub mod text;

/// Model records and the camera model registry.
pub mod types;

pub use error::ColmapError;
pub use types::{
    CameraModelId, ColmapCamera, ColmapImage, ColmapModel, ColmapPoint3d, TrackElement,
    CAMERA_MODELS,
};

use std::path::Path;

/// The serialization of a COLMAP sparse model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelFormat {
    /// `cameras.txt`, `images.txt` and `points3D.txt`.
    #[default]
    Text,
    /// `cameras.bin`, `images.bin` and `points3D.bin`.
    Binary,
}

impl ModelFormat {
    /// The file extension, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ModelFormat::Text => ".txt",
            ModelFormat::Binary => ".bin",
        }
    }

    /// Parse a format name such as `".bin"` or `"txt"`.
    ///
    /// Anything unrecognized falls back to text with a warning.
    pub fn from_str_lossy(format: &str) -> Self {
        match format.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "txt" | "text" => ModelFormat::Text,
            "bin" | "binary" => ModelFormat::Binary,
            other => {
                log::warn!("Unknown model format {other:?}, writing text files");
                ModelFormat::Text
            }
        }
    }

    fn paths(&self, dir: &Path) -> [std::path::PathBuf; 3] {
        let ext = self.extension();
        ["cameras", "images", "points3D"].map(|table| dir.join(format!("{table}{ext}")))
    }
}

impl std::fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Find the format of the model stored in `dir`.
///
/// A format matches when its three files all exist. Binary wins when both
/// are present.
pub fn detect_model_format(dir: impl AsRef<Path>) -> Result<ModelFormat, ColmapError> {
    let dir = dir.as_ref();
    [ModelFormat::Binary, ModelFormat::Text]
        .into_iter()
        .find(|format| format.paths(dir).iter().all(|path| path.is_file()))
        .ok_or_else(|| {
            ColmapError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no COLMAP model found in {}", dir.display()),
            ))
        })
}

/// Read the three model tables from `dir` and validate them.
///
/// # Arguments
///
/// * `dir` - The directory holding the model files.
/// * `format` - The format to read, or `None` to detect it.
///
/// # Returns
///
/// The validated model.
pub fn read_model(
    dir: impl AsRef<Path>,
    format: Option<ModelFormat>,
) -> Result<ColmapModel, ColmapError> {
    let dir = dir.as_ref();
    let format = match format {
        Some(format) => format,
        None => detect_model_format(dir)?,
    };
    let [cameras_path, images_path, points_path] = format.paths(dir);

    let model = match format {
        ModelFormat::Text => ColmapModel {
            cameras: text::read_cameras_txt(&cameras_path)?,
            images: text::read_images_txt(&images_path)?,
            points3d: text::read_points3d_txt(&points_path)?,
        },
        ModelFormat::Binary => ColmapModel {
            cameras: binary::read_cameras_bin(&cameras_path)?,
            images: binary::read_images_bin(&images_path)?,
            points3d: binary::read_points3d_bin(&points_path)?,
        },
    };
    log::debug!(
        "Read {} cameras, {} images and {} points from {}",
        model.cameras.len(),
        model.images.len(),
        model.points3d.len(),
        dir.display()
    );

    model.validate()?;
    Ok(model)
}

/// Write the three model tables into `dir`.
///
/// The model is validated first. Every table is encoded into a temporary file
/// inside `dir` and the files are only moved into place once all three encode
/// successfully, so a failure never leaves a partial new file behind.
///
/// Each file is replaced atomically but the three renames are not: when a
/// later rename fails after earlier ones succeeded, the directory mixes new
/// and old tables and [`ColmapError::PartialWrite`] lists the replaced files.
///
/// # Arguments
///
/// * `model` - The model to write.
/// * `dir` - The existing directory to write into.
/// * `format` - The serialization to use.
pub fn write_model(
    model: &ColmapModel,
    dir: impl AsRef<Path>,
    format: ModelFormat,
) -> Result<(), ColmapError> {
    model.validate()?;

    let dir = dir.as_ref();
    let [cameras_path, images_path, points_path] = format.paths(dir);

    let staged = match format {
        ModelFormat::Text => [
            atomic::stage(&cameras_path, |w| text::encode_cameras_txt(w, &model.cameras))?,
            atomic::stage(&images_path, |w| text::encode_images_txt(w, &model.images))?,
            atomic::stage(&points_path, |w| text::encode_points3d_txt(w, &model.points3d))?,
        ],
        ModelFormat::Binary => [
            atomic::stage(&cameras_path, |w| binary::encode_cameras_bin(w, &model.cameras))?,
            atomic::stage(&images_path, |w| binary::encode_images_bin(w, &model.images))?,
            atomic::stage(&points_path, |w| binary::encode_points3d_bin(w, &model.points3d))?,
        ],
    };

    let mut replaced = Vec::new();
    for (file, path) in staged.into_iter().zip([cameras_path, images_path, points_path]) {
        match file.persist(&path) {
            Ok(_) => {
                log::debug!("Wrote {}", path.display());
                replaced.push(path);
            }
            Err(source) if replaced.is_empty() => return Err(source.into()),
            Err(source) => {
                log::error!(
                    "Model in {} is partially written, {} failed",
                    dir.display(),
                    path.display()
                );
                return Err(ColmapError::PartialWrite {
                    replaced,
                    path,
                    source,
                });
            }
        }
    }

    Ok(())
}
