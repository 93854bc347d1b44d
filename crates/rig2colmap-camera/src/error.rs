/// Error types for the camera conversions.
///
/// Every variant describes malformed numeric camera metadata coming from the
/// host scene.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CameraError {
    /// A value that must be strictly positive was zero or negative.
    #[error("Invalid {name}: {value} (must be strictly positive)")]
    NonPositive {
        /// Name of the offending input.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A value was NaN or infinite.
    #[error("Invalid {name}: {value} (must be finite)")]
    NonFinite {
        /// Name of the offending input.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The rotation quaternion is not normalized.
    #[error("Rotation quaternion is not unit length (norm = {0})")]
    NonUnitQuaternion(f64),
}

/// Check that `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<f64, CameraError> {
    ensure_finite(name, value)?;
    if value <= 0.0 {
        return Err(CameraError::NonPositive { name, value });
    }
    Ok(value)
}

/// Check that `value` is finite.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<f64, CameraError> {
    if !value.is_finite() {
        return Err(CameraError::NonFinite { name, value });
    }
    Ok(value)
}
