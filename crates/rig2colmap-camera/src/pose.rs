use glam::{DMat3, DQuat, DVec3};

use crate::error::{ensure_finite, CameraError};

/// Maximum deviation of a rotation quaternion norm from one.
///
/// Host engines store rotations in single precision, so the tolerance is
/// loose enough for a normalized `f32` quaternion promoted to `f64`.
pub const UNIT_NORM_TOLERANCE: f64 = 1e-5;

/// Fixed relabeling from a host quaternion to the COLMAP quaternion.
///
/// The host stores rotations as `(x, y, z, w)`: right handed, the camera looks
/// down its local -Z axis with +Y up. COLMAP cameras look down +Z with -Y up
/// and quaternions are scalar first. Entry `i` gives, for COLMAP component
/// `i` of `(qw, qx, qy, qz)`, the index into the host `(x, y, z, w)` array and
/// the sign applied to it:
///
/// | COLMAP | host | sign |
/// |--------|------|------|
/// | qw     | x    | +    |
/// | qx     | w    | +    |
/// | qy     | z    | +    |
/// | qz     | y    | -    |
///
/// This table is a convention constant and must not be re-derived.
pub const HOST_TO_COLMAP_AXES: [(usize, f64); 4] = [(0, 1.0), (3, 1.0), (2, 1.0), (1, -1.0)];

/// A camera pose in COLMAP convention.
///
/// The rotation and translation map **world** coordinates into the
/// **camera** frame: `x_cam = R(qvec) * x_world + tvec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColmapPose {
    /// Rotation quaternion `(qw, qx, qy, qz)`.
    pub qvec: [f64; 4],
    /// Translation `(tx, ty, tz)`.
    pub tvec: [f64; 3],
}

impl ColmapPose {
    /// The world-to-camera rotation matrix, row major.
    pub fn rotation_matrix(&self) -> [[f64; 3]; 3] {
        qvec_to_rotation_matrix(&self.qvec)
    }

    /// The camera centre in world coordinates, `-R^T * t`.
    pub fn camera_center(&self) -> [f64; 3] {
        let rotation = DMat3::from_quat(qvec_to_quat(&self.qvec));
        (-(rotation.transpose() * DVec3::from_array(self.tvec))).to_array()
    }
}

/// Convert a host-engine camera transform into a COLMAP world-to-camera pose.
///
/// # Arguments
///
/// * `rotation` - The host camera rotation as a unit quaternion `(x, y, z, w)`.
/// * `position` - The host camera location in world coordinates.
///
/// # Returns
///
/// The pose whose quaternion is the host quaternion relabeled through
/// [`HOST_TO_COLMAP_AXES`] and whose translation is `-(R' * position)`.
///
/// # Errors
///
/// Returns an error if a component is not finite or the quaternion is not
/// unit length within [`UNIT_NORM_TOLERANCE`].
pub fn host_to_colmap_pose(
    rotation: [f64; 4],
    position: [f64; 3],
) -> Result<ColmapPose, CameraError> {
    for value in rotation {
        ensure_finite("rotation component", value)?;
    }
    for value in position {
        ensure_finite("position component", value)?;
    }

    let norm = rotation.iter().map(|v| v * v).sum::<f64>().sqrt();
    if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
        return Err(CameraError::NonUnitQuaternion(norm));
    }

    let qvec = HOST_TO_COLMAP_AXES.map(|(index, sign)| sign * rotation[index]);

    let rotation_matrix = DMat3::from_quat(qvec_to_quat(&qvec));
    let tvec = (-(rotation_matrix * DVec3::from_array(position))).to_array();

    Ok(ColmapPose { qvec, tvec })
}

/// Compute the rotation matrix of a scalar-first quaternion.
///
/// The quaternion does not need to be normalized; the result is the rotation
/// of the normalized quaternion, as COLMAP computes it.
///
/// Example:
///
/// ```
/// use rig2colmap_camera::pose::qvec_to_rotation_matrix;
///
/// let rotation = qvec_to_rotation_matrix(&[1.0, 0.0, 0.0, 0.0]);
/// assert_eq!(rotation, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// ```
pub fn qvec_to_rotation_matrix(qvec: &[f64; 4]) -> [[f64; 3]; 3] {
    let cols = DMat3::from_quat(qvec_to_quat(qvec)).to_cols_array_2d();
    // glam is column major
    [
        [cols[0][0], cols[1][0], cols[2][0]],
        [cols[0][1], cols[1][1], cols[2][1]],
        [cols[0][2], cols[1][2], cols[2][2]],
    ]
}

/// Compute the scalar-first quaternion of a row major rotation matrix.
///
/// The returned quaternion has a non-negative scalar part.
///
/// PRECONDITION: `rotation` is orthonormal with determinant one.
pub fn rotation_matrix_to_qvec(rotation: &[[f64; 3]; 3]) -> [f64; 4] {
    let mat = DMat3::from_cols_array_2d(rotation).transpose();
    let q = DQuat::from_mat3(&mat).normalize();
    let q = if q.w < 0.0 { -q } else { q };
    [q.w, q.x, q.y, q.z]
}

fn qvec_to_quat(qvec: &[f64; 4]) -> DQuat {
    DQuat::from_xyzw(qvec[1], qvec[2], qvec[3], qvec[0]).normalize()
}
