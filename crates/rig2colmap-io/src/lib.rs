#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// COLMAP sparse model reader and writer.
pub mod colmap;
