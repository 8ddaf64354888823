//! Artifact metadata recorded on completed jobs.

use std::io::Cursor;

use image::ImageReader;
use serde_json::{json, Value};

/// Describe an artifact: byte size always, plus format and dimensions
/// when the bytes are a recognised image.
///
/// Decoding headers is blocking work; call this on the blocking pool.
pub fn extract_metadata(bytes: &[u8]) -> Value {
    let mut meta = json!({ "size_bytes": bytes.len() });

    let reader = match ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        Ok(reader) => reader,
        Err(_) => return meta,
    };
    let Some(format) = reader.format() else {
        return meta;
    };
    if let Some(ext) = format.extensions_str().first() {
        meta["format"] = json!(ext);
    }
    match reader.into_dimensions() {
        Ok((width, height)) => {
            meta["width"] = json!(width);
            meta["height"] = json!(height);
        }
        Err(e) => tracing::debug!(error = %e, "Could not read artifact dimensions"),
    }
    meta
}
