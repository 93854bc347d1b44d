use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use rig2colmap_camera::{host_to_colmap_pose, opencv_intrinsics, CameraError, ImageSize};
use rig2colmap_io::colmap::{
    write_model, CameraModelId, ColmapCamera, ColmapImage, ColmapModel, ModelFormat,
};

use crate::{
    config::ExportConfig,
    error::ExportError,
    render::Renderer,
    scene::{Scene, SceneCamera},
};

/// Name of the directory the frames are saved into.
pub const IMAGES_DIR: &str = "images";

/// A flag shared with the caller to stop an export between two cameras.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the export to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What an export run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    /// The directory holding the model files and the `images` directory.
    pub output_dir: PathBuf,
    /// The format of the model files.
    pub format: ModelFormat,
    /// The model handed to the writer.
    pub model: ColmapModel,
    /// Whether the run only logged its actions.
    pub dry_run: bool,
}

/// Turns the marked cameras of a scene into a COLMAP dataset.
///
/// # Example
///
/// ```no_run
/// use rig2colmap_export::{DatasetExporter, DryRunRenderer, ExportConfig, Scene};
///
/// # fn run(scene: &Scene) -> Result<(), rig2colmap_export::ExportError> {
/// let exporter = DatasetExporter::new(ExportConfig::default());
/// let summary = exporter.export(scene, &mut DryRunRenderer::new(), "out", |p| {
///     println!("{p:.0}%");
/// })?;
/// println!("exported {} cameras", summary.model.cameras.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatasetExporter {
    config: ExportConfig,
    cancel: CancelToken,
}

impl DatasetExporter {
    /// Creates an exporter with the given settings.
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Use `cancel` to stop the export from another thread.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The settings of the exporter.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// The scene cameras to export, in export order.
    ///
    /// A camera is selected when one of its collections starts with the
    /// configured prefix. Cameras are ordered by their image file name, which
    /// fixes the ids `1..=N`.
    pub fn select_cameras<'a>(&self, scene: &'a Scene) -> Result<Vec<&'a SceneCamera>, ExportError> {
        let prefix = self.config.collection_prefix.as_str();
        let mut selected = scene
            .cameras
            .iter()
            .filter(|camera| camera.is_marked(prefix))
            .collect::<Vec<_>>();

        if selected.is_empty() {
            return Err(ExportError::SelectionEmpty {
                prefix: prefix.to_string(),
            });
        }

        selected.sort_by_cached_key(|camera| self.config.image_name(&camera.name));
        Ok(selected)
    }

    /// Build the camera and image records of one scene camera.
    ///
    /// # Arguments
    ///
    /// * `id` - The camera and image id.
    /// * `camera` - The scene camera.
    /// * `size` - The size of the rendered frames.
    pub fn camera_records(
        &self,
        id: u32,
        camera: &SceneCamera,
        size: ImageSize,
    ) -> Result<(ColmapCamera, ColmapImage), ExportError> {
        let invalid_input = |source: CameraError| ExportError::InvalidInput {
            camera: camera.name.clone(),
            source,
        };

        let intrinsics = opencv_intrinsics(&camera.lens(), size).map_err(invalid_input)?;
        let pose = host_to_colmap_pose(camera.rotation, camera.location).map_err(invalid_input)?;

        let colmap_camera = ColmapCamera {
            camera_id: id,
            model_id: CameraModelId::CameraModelOpenCV,
            width: size.width as u64,
            height: size.height as u64,
            params: intrinsics.params().to_vec(),
        };

        let image = ColmapImage {
            image_id: id,
            qvec: pose.qvec,
            tvec: pose.tvec,
            camera_id: id,
            name: self.config.image_name(&camera.name),
            xys: Vec::new(),
            point3d_ids: Vec::new(),
        };

        Ok((colmap_camera, image))
    }

    /// Export the scene into `output_dir`.
    ///
    /// For every selected camera, in order, the camera and image records are
    /// built and the renderer saves a frame into `output_dir/images`. The
    /// model is written once all frames are saved. `progress` receives the
    /// completed percentage after every camera and `100` at the end.
    ///
    /// Nothing is created on disk when no camera is selected, when two
    /// selected cameras share a name, when the settings are invalid or when
    /// the run is a dry run. A cancelled run keeps the frames saved so far and writes
    /// no model.
    pub fn export<R, P>(
        &self,
        scene: &Scene,
        renderer: &mut R,
        output_dir: impl AsRef<Path>,
        mut progress: P,
    ) -> Result<ExportSummary, ExportError>
    where
        R: Renderer,
        P: FnMut(f32),
    {
        let output_dir = output_dir.as_ref();
        self.config.validate()?;
        let cameras = self.select_cameras(scene)?;
        for camera in &cameras {
            check_camera_name(&camera.name)?;
        }
        // sorted by image name, so collisions are neighbours
        if let Some(pair) = cameras
            .windows(2)
            .find(|pair| pair[0].name == pair[1].name)
        {
            return Err(ExportError::DuplicateImageName(
                self.config.image_name(&pair[0].name),
            ));
        }

        let size = scene.render.image_size();
        let format = self.config.model_format();
        let dry_run = self.config.dry_run;
        let images_dir = output_dir.join(IMAGES_DIR);

        log::info!(
            "Exporting {} cameras at {}x{} to {}",
            cameras.len(),
            size.width,
            size.height,
            output_dir.display()
        );

        if !dry_run {
            std::fs::create_dir_all(&images_dir)?;
        }

        let mut model = ColmapModel::new();
        let num_steps = cameras.len() as f32 + 1.0;

        for (idx, camera) in cameras.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!("Export cancelled after {idx} of {} cameras", cameras.len());
                return Err(ExportError::Cancelled);
            }

            let id = idx as u32 + 1;
            let (colmap_camera, image) = self.camera_records(id, camera, size)?;
            let frame_path = images_dir.join(&image.name);
            model.cameras.insert(id, colmap_camera);
            model.images.insert(id, image);

            if dry_run {
                log::info!(
                    "Dry run: would render camera {:?} from collections {:?}",
                    camera.name,
                    camera
                        .marker_collections(&self.config.collection_prefix)
                        .collect::<Vec<_>>()
                );
            } else {
                render_camera(renderer, camera, &frame_path)?;
                log::debug!("Saved {}", frame_path.display());
            }

            progress(100.0 * (idx as f32 + 1.0) / num_steps);
        }

        if self.cancel.is_cancelled() {
            log::warn!("Export cancelled before writing the model");
            return Err(ExportError::Cancelled);
        }

        if dry_run {
            log::info!(
                "Dry run: would write model to {} with format {format}",
                output_dir.display()
            );
        } else {
            write_model(&model, output_dir, format)?;
            log::info!("Wrote {format} model to {}", output_dir.display());
        }
        progress(100.0);

        Ok(ExportSummary {
            output_dir: output_dir.to_path_buf(),
            format,
            model,
            dry_run,
        })
    }
}

fn render_camera<R: Renderer>(
    renderer: &mut R,
    camera: &SceneCamera,
    path: &Path,
) -> Result<(), ExportError> {
    let boxed = |err: R::Error| ExportError::Render(Box::new(err));
    renderer.set_active_camera(camera).map_err(boxed)?;
    let frame = renderer.render_frame().map_err(boxed)?;
    renderer.save(&frame, path).map_err(boxed)
}

/// Camera names become file names inside the images directory.
fn check_camera_name(name: &str) -> Result<(), ExportError> {
    let invalid = name.is_empty()
        || name.trim() != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0', '\n', '\r']);
    if invalid {
        return Err(ExportError::InvalidCameraName(name.to_string()));
    }
    Ok(())
}
