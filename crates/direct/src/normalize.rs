//! Artifact format normalization.

use std::io::Cursor;

use image::ImageFormat;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Payload is not a recognizable image")]
    Unrecognized,

    #[error("Image conversion failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Return `bytes` as PNG, re-encoding unless they already are PNG.
///
/// CPU-bound: run on the blocking pool.
pub fn normalize_to_png(bytes: Vec<u8>) -> Result<Vec<u8>, NormalizeError> {
    let format = image::guess_format(&bytes).map_err(|_| NormalizeError::Unrecognized)?;
    if format == ImageFormat::Png {
        return Ok(bytes);
    }

    let decoded = image::load_from_memory_with_format(&bytes, format)?;
    let mut out = Vec::new();
    decoded.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    tracing::debug!(from = ?format, size = out.len(), "Re-encoded artifact to PNG");
    Ok(out)
}
