use crate::error::{ensure_positive, CameraError};

/// Physical lens and sensor description of a camera, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensIntrinsics {
    /// The focal length of the lens in millimetres.
    pub focal_length_mm: f64,
    /// The width of the sensor in millimetres.
    pub sensor_width_mm: f64,
    /// The height of the sensor in millimetres.
    pub sensor_height_mm: f64,
}

impl LensIntrinsics {
    /// Creates a new lens description.
    pub fn new(focal_length_mm: f64, sensor_width_mm: f64, sensor_height_mm: f64) -> Self {
        Self {
            focal_length_mm,
            sensor_width_mm,
            sensor_height_mm,
        }
    }
}

/// The resolution of the rendered image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageSize {
    /// Creates a new image size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scale the size by a percentage, the way render engines apply a
    /// resolution percentage. Each non-zero side is rounded and never drops
    /// below one pixel.
    pub fn scaled(&self, percentage: u32) -> Self {
        let scale = |v: u32| match v {
            0 => 0,
            _ => ((v as f64 * percentage as f64 / 100.0).round() as u32).max(1),
        };
        Self {
            width: scale(self.width),
            height: scale(self.height),
        }
    }
}

/// Represents the intrinsic parameters of an OPENCV camera model.
///
/// # Fields
///
/// * `fx`, `fy` - The focal lengths in pixels
/// * `cx`, `cy` - The principal point in pixels
/// * `k1`, `k2` - The radial distortion coefficients
/// * `p1`, `p2` - The tangential distortion coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenCvIntrinsics {
    /// The focal length in the x direction
    pub fx: f64,
    /// The focal length in the y direction
    pub fy: f64,
    /// The x coordinate of the principal point
    pub cx: f64,
    /// The y coordinate of the principal point
    pub cy: f64,
    /// First radial distortion coefficient
    pub k1: f64,
    /// Second radial distortion coefficient
    pub k2: f64,
    /// First tangential distortion coefficient
    pub p1: f64,
    /// Second tangential distortion coefficient
    pub p2: f64,
}

impl OpenCvIntrinsics {
    /// Number of parameters of the OPENCV model.
    pub const NUM_PARAMS: usize = 8;

    /// Returns the parameters in COLMAP order `[fx, fy, cx, cy, k1, k2, p1, p2]`.
    pub fn params(&self) -> [f64; Self::NUM_PARAMS] {
        [
            self.fx, self.fy, self.cx, self.cy, self.k1, self.k2, self.p1, self.p2,
        ]
    }
}

/// Compute the OPENCV intrinsics of an ideal (distortion free) lens.
///
/// # Arguments
///
/// * `lens` - The lens focal length and sensor size in millimetres.
/// * `size` - The rendered image resolution in pixels.
///
/// # Returns
///
/// The intrinsics with `fx = f * W / sensor_w`, `fy = f * H / sensor_h`,
/// the principal point at the image centre and all distortion terms zero.
///
/// # Errors
///
/// Returns an error if a lens value is not finite and strictly positive, or
/// if the image has a zero dimension.
pub fn opencv_intrinsics(
    lens: &LensIntrinsics,
    size: ImageSize,
) -> Result<OpenCvIntrinsics, CameraError> {
    let focal = ensure_positive("focal length", lens.focal_length_mm)?;
    let sensor_width = ensure_positive("sensor width", lens.sensor_width_mm)?;
    let sensor_height = ensure_positive("sensor height", lens.sensor_height_mm)?;
    let width = ensure_positive("image width", size.width as f64)?;
    let height = ensure_positive("image height", size.height as f64)?;

    Ok(OpenCvIntrinsics {
        fx: focal * width / sensor_width,
        fy: focal * height / sensor_height,
        cx: width / 2.0,
        cy: height / 2.0,
        k1: 0.0,
        k2: 0.0,
        p1: 0.0,
        p2: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_full_frame_lens() -> Result<(), CameraError> {
        let lens = LensIntrinsics::new(35.0, 36.0, 24.0);
        let intrinsics = opencv_intrinsics(&lens, ImageSize::new(800, 600))?;
        assert_relative_eq!(intrinsics.fx, 777.777_777_777_777_8, epsilon = 1e-9);
        assert_relative_eq!(intrinsics.fy, 875.0, epsilon = 1e-9);
        assert_eq!(intrinsics.cx, 400.0);
        assert_eq!(intrinsics.cy, 300.0);
        Ok(())
    }

    #[test]
    fn test_params_order() -> Result<(), CameraError> {
        let lens = LensIntrinsics::new(50.0, 36.0, 36.0);
        let params = opencv_intrinsics(&lens, ImageSize::new(1920, 1080))?.params();
        assert_eq!(params.len(), OpenCvIntrinsics::NUM_PARAMS);
        assert_relative_eq!(params[0], 50.0 * 1920.0 / 36.0);
        assert_relative_eq!(params[1], 50.0 * 1080.0 / 36.0);
        assert_eq!(params[2], 960.0);
        assert_eq!(params[3], 540.0);
        assert_eq!(&params[4..], &[0.0; 4]);
        Ok(())
    }

    #[test]
    fn test_odd_resolution_principal_point() -> Result<(), CameraError> {
        let lens = LensIntrinsics::new(35.0, 36.0, 24.0);
        let intrinsics = opencv_intrinsics(&lens, ImageSize::new(801, 601))?;
        assert_eq!(intrinsics.cx, 400.5);
        assert_eq!(intrinsics.cy, 300.5);
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_lens() {
        let size = ImageSize::new(800, 600);

        let err = opencv_intrinsics(&LensIntrinsics::new(35.0, 0.0, 24.0), size);
        assert_eq!(
            err,
            Err(CameraError::NonPositive {
                name: "sensor width",
                value: 0.0
            })
        );

        let err = opencv_intrinsics(&LensIntrinsics::new(f64::NAN, 36.0, 24.0), size);
        assert!(matches!(
            err,
            Err(CameraError::NonFinite {
                name: "focal length",
                ..
            })
        ));

        let err = opencv_intrinsics(&LensIntrinsics::new(35.0, 36.0, f64::INFINITY), size);
        assert!(matches!(
            err,
            Err(CameraError::NonFinite {
                name: "sensor height",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_empty_image() {
        let lens = LensIntrinsics::new(35.0, 36.0, 24.0);
        let err = opencv_intrinsics(&lens, ImageSize::new(0, 600));
        assert!(matches!(
            err,
            Err(CameraError::NonPositive {
                name: "image width",
                ..
            })
        ));
    }

    #[test]
    fn test_scaled_size() {
        let size = ImageSize::new(1920, 1080);
        assert_eq!(size.scaled(100), size);
        assert_eq!(size.scaled(50), ImageSize::new(960, 540));
        assert_eq!(size.scaled(0), ImageSize::new(1, 1));
        assert_eq!(ImageSize::new(0, 600).scaled(50), ImageSize::new(0, 300));
    }
}
