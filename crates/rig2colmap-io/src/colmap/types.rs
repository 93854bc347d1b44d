use std::collections::BTreeMap;

use rig2colmap_camera::ColmapPose;

use super::ColmapError;

/// Represents a Colmap camera model id.
///
/// The discriminant is the numeric id stored in `cameras.bin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraModelId {
    /// Simple pinhole camera model
    CameraModelSimplePinhole = 0,
    /// Pinhole camera model
    CameraModelPinhole = 1,
    /// Simplified radial camera model
    CameraModelSimplifiedRadial = 2,
    /// Radial camera model
    CameraModelRadial = 3,
    /// OpenCV camera model
    CameraModelOpenCV = 4,
    /// OpenCV fisheye camera model
    CameraModelOpenCVFisheye = 5,
    /// Full OpenCV camera model
    CameraModelFullOpenCV = 6,
    /// Field of view camera model
    CameraModelFOV = 7,
    /// Simple radial fisheye camera model
    CameraModelSimpleRadialFisheye = 8,
    /// Radial fisheye camera model
    CameraModelRadialFisheye = 9,
    /// Thin prism fisheye camera model
    CameraModelThinPrismFisheye = 10,
}

/// The camera model registry: model, text name and number of parameters.
///
/// Entries are ordered by numeric id.
pub const CAMERA_MODELS: [(CameraModelId, &str, usize); 11] = [
    (CameraModelId::CameraModelSimplePinhole, "SIMPLE_PINHOLE", 3),
    (CameraModelId::CameraModelPinhole, "PINHOLE", 4),
    (CameraModelId::CameraModelSimplifiedRadial, "SIMPLE_RADIAL", 4),
    (CameraModelId::CameraModelRadial, "RADIAL", 5),
    (CameraModelId::CameraModelOpenCV, "OPENCV", 8),
    (CameraModelId::CameraModelOpenCVFisheye, "OPENCV_FISHEYE", 8),
    (CameraModelId::CameraModelFullOpenCV, "FULL_OPENCV", 12),
    (CameraModelId::CameraModelFOV, "FOV", 5),
    (CameraModelId::CameraModelSimpleRadialFisheye, "SIMPLE_RADIAL_FISHEYE", 4),
    (CameraModelId::CameraModelRadialFisheye, "RADIAL_FISHEYE", 5),
    (CameraModelId::CameraModelThinPrismFisheye, "THIN_PRISM_FISHEYE", 12),
];

impl CameraModelId {
    /// The numeric id used by the binary format.
    pub fn id(&self) -> i32 {
        *self as i32
    }

    /// Look up a model from its numeric id.
    pub fn from_id(id: i32) -> Result<Self, ColmapError> {
        CAMERA_MODELS
            .iter()
            .find(|(model, _, _)| model.id() == id)
            .map(|(model, _, _)| *model)
            .ok_or(ColmapError::UnknownCameraModelId(id))
    }

    /// The name used by the text format.
    pub fn name(&self) -> &'static str {
        CAMERA_MODELS[*self as usize].1
    }

    /// Look up a model from its text name.
    pub fn from_name(name: &str) -> Result<Self, ColmapError> {
        CAMERA_MODELS
            .iter()
            .find(|(_, model_name, _)| *model_name == name)
            .map(|(model, _, _)| *model)
            .ok_or_else(|| ColmapError::UnknownCameraModel(name.to_string()))
    }

    /// The number of parameters the model expects.
    pub fn num_params(&self) -> usize {
        CAMERA_MODELS[*self as usize].2
    }

    // indices of (fx, fy, cx, cy) in the params vector
    fn param_layout(&self) -> [usize; 4] {
        match self {
            Self::CameraModelSimplePinhole
            | Self::CameraModelSimplifiedRadial
            | Self::CameraModelRadial
            | Self::CameraModelSimpleRadialFisheye
            | Self::CameraModelRadialFisheye => [0, 0, 1, 2],
            Self::CameraModelPinhole
            | Self::CameraModelOpenCV
            | Self::CameraModelOpenCVFisheye
            | Self::CameraModelFullOpenCV
            | Self::CameraModelFOV
            | Self::CameraModelThinPrismFisheye => [0, 1, 2, 3],
        }
    }
}

impl std::fmt::Display for CameraModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Represents a camera in the Colmap system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapCamera {
    /// Camera id
    pub camera_id: u32,
    /// Camera model id
    pub model_id: CameraModelId,
    /// Image width
    pub width: u64,
    /// Image height
    pub height: u64,
    /// Camera parameters
    pub params: Vec<f64>,
}

impl ColmapCamera {
    /// The focal lengths `(fx, fy)`; single focal models return it twice.
    ///
    /// Fails when `params` does not hold `model_id.num_params()` values.
    pub fn focal_length(&self) -> Result<(f64, f64), ColmapError> {
        check_num_params(self)?;
        let [fx, fy, _, _] = self.model_id.param_layout();
        Ok((self.params[fx], self.params[fy]))
    }

    /// The principal point `(cx, cy)`.
    ///
    /// Fails when `params` does not hold `model_id.num_params()` values.
    pub fn principal_point(&self) -> Result<(f64, f64), ColmapError> {
        check_num_params(self)?;
        let [_, _, cx, cy] = self.model_id.param_layout();
        Ok((self.params[cx], self.params[cy]))
    }
}

/// Represents an image in the Colmap system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapImage {
    /// Image id
    pub image_id: u32,
    /// Rotation (qw, qx, qy, qz), world to camera
    pub qvec: [f64; 4],
    /// Translation (tx, ty, tz), world to camera
    pub tvec: [f64; 3],
    /// Camera id
    pub camera_id: u32,
    /// Image name
    pub name: String,
    /// Observed 2d points
    pub xys: Vec<[f64; 2]>,
    /// Point3d id of each observation, `-1` when it has none
    pub point3d_ids: Vec<i64>,
}

impl ColmapImage {
    /// The camera centre in world coordinates, `-R^T * t`.
    pub fn camera_center(&self) -> [f64; 3] {
        ColmapPose {
            qvec: self.qvec,
            tvec: self.tvec,
        }
        .camera_center()
    }
}

/// One observation of a 3d point: the image and the index of the 2d point in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackElement {
    /// Image id
    pub image_id: u32,
    /// Index into the image's `xys`
    pub point2d_idx: u32,
}

/// Represents a 3D point in the Colmap system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapPoint3d {
    /// Point3d id
    pub point3d_id: u64,
    /// x, y, z coordinates
    pub xyz: [f64; 3],
    /// rgb color
    pub rgb: [u8; 3],
    /// Reprojection error
    pub error: f64,
    /// Track
    pub track: Vec<TrackElement>,
}

/// A complete sparse model: the three tables keyed by record id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColmapModel {
    /// Cameras keyed by camera id
    pub cameras: BTreeMap<u32, ColmapCamera>,
    /// Images keyed by image id
    pub images: BTreeMap<u32, ColmapImage>,
    /// 3D points keyed by point id
    pub points3d: BTreeMap<u64, ColmapPoint3d>,
}

impl ColmapModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the cross-record invariants of the model.
    ///
    /// Every map key equals its record id, every camera carries the number of
    /// parameters its model expects, every image references an existing camera
    /// and has as many point3d ids as 2d points, and every track references an
    /// existing image.
    pub fn validate(&self) -> Result<(), ColmapError> {
        for (id, camera) in &self.cameras {
            check_key("camera", *id as u64, camera.camera_id as u64)?;
            check_num_params(camera)?;
        }

        for (id, image) in &self.images {
            check_key("image", *id as u64, image.image_id as u64)?;
            check_observations(image)?;
            check_image_name(&image.name)?;
            if !self.cameras.contains_key(&image.camera_id) {
                return Err(ColmapError::UnknownCamera {
                    image_id: image.image_id,
                    camera_id: image.camera_id,
                });
            }
        }

        for (id, point) in &self.points3d {
            check_key("point3D", *id, point.point3d_id)?;
            if let Some(element) = point
                .track
                .iter()
                .find(|element| !self.images.contains_key(&element.image_id))
            {
                return Err(ColmapError::UnknownImage {
                    point3d_id: point.point3d_id,
                    image_id: element.image_id,
                });
            }
        }

        Ok(())
    }
}

fn check_key(table: &'static str, key: u64, id: u64) -> Result<(), ColmapError> {
    if key != id {
        return Err(ColmapError::MismatchedId { table, key, id });
    }
    Ok(())
}

pub(crate) fn check_num_params(camera: &ColmapCamera) -> Result<(), ColmapError> {
    let expected = camera.model_id.num_params();
    if camera.params.len() != expected {
        return Err(ColmapError::InvalidNumCameraParams {
            model: camera.model_id,
            expected,
            actual: camera.params.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_observations(image: &ColmapImage) -> Result<(), ColmapError> {
    if image.xys.len() != image.point3d_ids.len() {
        return Err(ColmapError::MismatchedObservations {
            image_id: image.image_id,
            xys: image.xys.len(),
            point3d_ids: image.point3d_ids.len(),
        });
    }
    Ok(())
}

/// Names are stored NUL terminated in binary and as the tail of a line in
/// text, so they must be non-empty, free of NUL and line breaks, and carry no
/// surrounding whitespace.
pub(crate) fn check_image_name(name: &str) -> Result<(), ColmapError> {
    let invalid = name.is_empty()
        || name.trim() != name
        || name.contains(['\0', '\n', '\r']);
    if invalid {
        return Err(ColmapError::InvalidImageName(name.to_string()));
    }
    Ok(())
}

/// Insert a decoded record, rejecting a repeated id.
pub(crate) fn insert_unique<K: Ord + Copy + Into<u64>, V>(
    table: &'static str,
    map: &mut BTreeMap<K, V>,
    id: K,
    record: V,
) -> Result<(), ColmapError> {
    if map.insert(id, record).is_some() {
        return Err(ColmapError::DuplicateId {
            table,
            id: id.into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn opencv_camera(camera_id: u32) -> ColmapCamera {
        ColmapCamera {
            camera_id,
            model_id: CameraModelId::CameraModelOpenCV,
            width: 800,
            height: 600,
            params: vec![777.0, 875.0, 400.0, 300.0, 0.0, 0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn test_registry_lookups_agree() -> Result<(), ColmapError> {
        for (index, (model, name, num_params)) in CAMERA_MODELS.iter().enumerate() {
            assert_eq!(model.id(), index as i32);
            assert_eq!(CameraModelId::from_id(model.id())?, *model);
            assert_eq!(CameraModelId::from_name(name)?, *model);
            assert_eq!(model.name(), *name);
            assert_eq!(model.num_params(), *num_params);
        }
        assert_eq!(CameraModelId::CameraModelOpenCV.id(), 4);
        assert_eq!(CameraModelId::CameraModelOpenCV.num_params(), 8);
        Ok(())
    }

    #[test]
    fn test_registry_unknown() {
        assert!(matches!(
            CameraModelId::from_id(11),
            Err(ColmapError::UnknownCameraModelId(11))
        ));
        assert!(matches!(
            CameraModelId::from_id(-1),
            Err(ColmapError::UnknownCameraModelId(-1))
        ));
        assert!(matches!(
            CameraModelId::from_name("opencv"),
            Err(ColmapError::UnknownCameraModel(_))
        ));
    }

    #[test]
    fn test_focal_and_principal_point() -> Result<(), ColmapError> {
        let camera = opencv_camera(1);
        assert_eq!(camera.focal_length()?, (777.0, 875.0));
        assert_eq!(camera.principal_point()?, (400.0, 300.0));

        let simple = ColmapCamera {
            camera_id: 2,
            model_id: CameraModelId::CameraModelSimplifiedRadial,
            width: 640,
            height: 480,
            params: vec![500.0, 320.0, 240.0, 0.01],
        };
        assert_eq!(simple.focal_length()?, (500.0, 500.0));
        assert_eq!(simple.principal_point()?, (320.0, 240.0));
        Ok(())
    }

    #[test]
    fn test_accessors_reject_short_params() {
        let mut camera = opencv_camera(1);
        camera.params.truncate(2);
        assert!(matches!(
            camera.focal_length(),
            Err(ColmapError::InvalidNumCameraParams {
                expected: 8,
                actual: 2,
                ..
            })
        ));
        camera.params.clear();
        assert!(matches!(
            camera.principal_point(),
            Err(ColmapError::InvalidNumCameraParams { actual: 0, .. })
        ));
    }

    #[test]
    fn test_camera_center() {
        // 180 degrees about x, t = -(R * c) with c = (1, 2, 3)
        let image = ColmapImage {
            image_id: 1,
            qvec: [0.0, 1.0, 0.0, 0.0],
            tvec: [-1.0, 2.0, 3.0],
            camera_id: 1,
            name: "a.jpg".to_string(),
            xys: vec![],
            point3d_ids: vec![],
        };
        let center = image.camera_center();
        assert_relative_eq!(center[0], 1.0);
        assert_relative_eq!(center[1], 2.0);
        assert_relative_eq!(center[2], 3.0);
    }

    #[test]
    fn test_validate() {
        let mut model = ColmapModel::new();
        model.cameras.insert(1, opencv_camera(1));
        model.images.insert(
            1,
            ColmapImage {
                image_id: 1,
                qvec: [1.0, 0.0, 0.0, 0.0],
                tvec: [0.0; 3],
                camera_id: 1,
                name: "a.jpg".to_string(),
                xys: vec![[1.0, 2.0]],
                point3d_ids: vec![5],
            },
        );
        model.points3d.insert(
            5,
            ColmapPoint3d {
                point3d_id: 5,
                xyz: [0.0; 3],
                rgb: [1, 2, 3],
                error: 0.5,
                track: vec![TrackElement {
                    image_id: 1,
                    point2d_idx: 0,
                }],
            },
        );
        assert!(model.validate().is_ok());

        let mut dangling = model.clone();
        dangling.images.get_mut(&1).unwrap().camera_id = 9;
        assert!(matches!(
            dangling.validate(),
            Err(ColmapError::UnknownCamera {
                image_id: 1,
                camera_id: 9
            })
        ));

        let mut mismatched = model.clone();
        mismatched.images.get_mut(&1).unwrap().point3d_ids.clear();
        assert!(matches!(
            mismatched.validate(),
            Err(ColmapError::MismatchedObservations { .. })
        ));

        let mut bad_track = model.clone();
        bad_track.points3d.get_mut(&5).unwrap().track[0].image_id = 2;
        assert!(matches!(
            bad_track.validate(),
            Err(ColmapError::UnknownImage {
                point3d_id: 5,
                image_id: 2
            })
        ));

        let mut bad_key = model.clone();
        let camera = bad_key.cameras.remove(&1).unwrap();
        bad_key.cameras.insert(3, camera);
        assert!(matches!(
            bad_key.validate(),
            Err(ColmapError::MismatchedId { table: "camera", .. })
        ));

        let mut bad_params = model;
        bad_params.cameras.get_mut(&1).unwrap().params.pop();
        assert!(matches!(
            bad_params.validate(),
            Err(ColmapError::InvalidNumCameraParams {
                expected: 8,
                actual: 7,
                ..
            })
        ));
    }
}
