#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use rig2colmap_camera as camera;

#[doc(inline)]
pub use rig2colmap_io as io;

#[doc(inline)]
pub use rig2colmap_export as export;
