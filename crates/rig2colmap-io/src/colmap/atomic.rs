use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use tempfile::NamedTempFile;

use super::ColmapError;

/// Encode into a temporary file next to `path`.
///
/// The file is removed on drop unless persisted, so a failed encode leaves
/// any existing file at `path` untouched.
pub(crate) fn stage<F>(path: &Path, encode: F) -> Result<NamedTempFile, ColmapError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), ColmapError>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        encode(&mut writer)?;
        writer.flush()?;
    }
    staged.as_file().sync_all()?;

    Ok(staged)
}

/// Encode into a temporary file and move it over `path` once complete.
pub(crate) fn write_atomic<F>(path: &Path, encode: F) -> Result<(), ColmapError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), ColmapError>,
{
    stage(path, encode)?.persist(path)?;
    Ok(())
}
