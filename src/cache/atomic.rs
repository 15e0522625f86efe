//! Temp-file-then-rename writes.
//!
//! Readers either see the previous file or the complete new one, never a
//! partial write. Each writer gets its own uniquely named temp file in the
//! destination directory, so concurrent writers of the same path do not
//! interfere; the last rename wins.

use std::io::{Cursor, Write};
use std::path::Path;

use image::{ImageBuffer, ImageFormat, PixelWithColorType};
use tempfile::NamedTempFile;

use super::StorageError;

/// Atomically replace `path` with `bytes`.
pub(crate) fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Encode `image` as PNG and atomically write it to `path`.
pub(crate) fn write_png<P>(
    path: &Path,
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
) -> Result<(), StorageError>
where
    P: PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
{
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|source| StorageError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    write_bytes(path, buf.get_ref())
}
