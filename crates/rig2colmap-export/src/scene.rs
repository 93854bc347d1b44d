use rig2colmap_camera::{ImageSize, LensIntrinsics};
use serde::Deserialize;

/// A snapshot of the host scene: its cameras and render settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scene {
    /// Every camera object in the scene.
    pub cameras: Vec<SceneCamera>,
    /// The render settings shared by all cameras.
    pub render: RenderSettings,
}

/// A camera object of the host scene.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneCamera {
    /// Unique object name; the rendered frame is saved as `<name><extension>`.
    pub name: String,
    /// Focal length in millimetres.
    pub lens_mm: f64,
    /// Sensor width in millimetres.
    pub sensor_width_mm: f64,
    /// Sensor height in millimetres.
    pub sensor_height_mm: f64,
    /// World rotation as a unit quaternion `(x, y, z, w)`.
    pub rotation: [f64; 4],
    /// World location.
    pub location: [f64; 3],
    /// Names of the collections the camera belongs to.
    #[serde(default)]
    pub collections: Vec<String>,
}

impl SceneCamera {
    /// The lens and sensor description of the camera.
    pub fn lens(&self) -> LensIntrinsics {
        LensIntrinsics::new(self.lens_mm, self.sensor_width_mm, self.sensor_height_mm)
    }

    /// The collections whose name starts with `prefix`.
    pub fn marker_collections<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.collections
            .iter()
            .map(String::as_str)
            .filter(move |name| name.starts_with(prefix))
    }

    /// Whether the camera belongs to at least one collection named with `prefix`.
    pub fn is_marked(&self, prefix: &str) -> bool {
        self.marker_collections(prefix).next().is_some()
    }
}

/// Output resolution of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RenderSettings {
    /// Horizontal resolution in pixels.
    pub resolution_x: u32,
    /// Vertical resolution in pixels.
    pub resolution_y: u32,
    /// Scale applied to the resolution, in percent.
    #[serde(default = "default_resolution_percentage")]
    pub resolution_percentage: u32,
}

fn default_resolution_percentage() -> u32 {
    100
}

impl RenderSettings {
    /// The size of the rendered frames after applying the percentage.
    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.resolution_x, self.resolution_y).scaled(self.resolution_percentage)
    }
}
