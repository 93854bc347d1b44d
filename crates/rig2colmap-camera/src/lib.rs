#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Camera conventions
//!
//! This crate turns the camera description of a host 3-D engine into the
//! quantities a COLMAP sparse model stores:
//!
//! - [`intrinsics`]: OPENCV intrinsics from lens, sensor and resolution.
//! - [`pose`]: host camera transform to COLMAP world-to-camera pose.
//!
//! ## Example
//!
//! ```rust
//! use rig2colmap_camera::intrinsics::{opencv_intrinsics, ImageSize, LensIntrinsics};
//! use rig2colmap_camera::pose::host_to_colmap_pose;
//!
//! let lens = LensIntrinsics::new(35.0, 36.0, 24.0);
//! let intrinsics = opencv_intrinsics(&lens, ImageSize::new(800, 600)).unwrap();
//! assert_eq!(intrinsics.cx, 400.0);
//!
//! let pose = host_to_colmap_pose([0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 5.0]).unwrap();
//! assert_eq!(pose.qvec, [0.0, 1.0, 0.0, 0.0]);
//! ```

/// Error types for camera conversions.
pub mod error;

/// OPENCV intrinsics from lens and sensor metadata.
pub mod intrinsics;

/// Host-engine to COLMAP pose conversion.
pub mod pose;

pub use error::CameraError;
pub use intrinsics::{opencv_intrinsics, ImageSize, LensIntrinsics, OpenCvIntrinsics};
pub use pose::{host_to_colmap_pose, ColmapPose};
