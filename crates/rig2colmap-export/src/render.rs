use std::path::Path;

use crate::scene::SceneCamera;

/// The host renderer that produces one frame per exported camera.
///
/// The renderer has a single active camera, so the exporter always calls
/// [`Renderer::set_active_camera`], [`Renderer::render_frame`] and
/// [`Renderer::save`] in that order for one camera before moving on.
pub trait Renderer {
    /// A rendered frame.
    type Frame;

    /// The renderer's error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Make `camera` the camera the next frame is rendered from.
    fn set_active_camera(&mut self, camera: &SceneCamera) -> Result<(), Self::Error>;

    /// Render a frame from the active camera.
    fn render_frame(&mut self) -> Result<Self::Frame, Self::Error>;

    /// Save a frame as an image file at `path`.
    fn save(&mut self, frame: &Self::Frame, path: &Path) -> Result<(), Self::Error>;
}

/// A renderer that produces no pixels and saves nothing.
///
/// Useful when only the model files are wanted, or the frames are rendered
/// by another process.
#[derive(Debug, Default, Clone)]
pub struct DryRunRenderer {
    active_camera: Option<String>,
}

impl DryRunRenderer {
    /// Creates a new dry run renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the active camera, if one was set.
    pub fn active_camera(&self) -> Option<&str> {
        self.active_camera.as_deref()
    }
}

impl Renderer for DryRunRenderer {
    type Frame = ();
    type Error = std::convert::Infallible;

    fn set_active_camera(&mut self, camera: &SceneCamera) -> Result<(), Self::Error> {
        self.active_camera = Some(camera.name.clone());
        Ok(())
    }

    fn render_frame(&mut self) -> Result<Self::Frame, Self::Error> {
        Ok(())
    }

    fn save(&mut self, _frame: &Self::Frame, path: &Path) -> Result<(), Self::Error> {
        log::debug!("Skipping frame {}", path.display());
        Ok(())
    }
}
