//! Upload validation at the transport boundary.
//!
//! Everything here runs before the pipeline starts: a rejected upload never
//! allocates a raster or emits an archive byte.

use std::path::Path;
use thiserror::Error;

/// Default upload limit: 50 MB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Used when the upload's name has no usable stem.
const FALLBACK_BASENAME: &str = "image";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntakeError {
    #[error("No file provided")]
    MissingFile,
    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("File must be an image (got {media_type})")]
    NotAnImage { media_type: String },
}

impl IntakeError {
    /// Short message suitable for showing to the uploader.
    pub fn user_message(&self) -> String {
        match self {
            IntakeError::MissingFile => "No file provided".to_string(),
            IntakeError::TooLarge { limit, .. } => {
                format!("File size exceeds {}MB limit", limit / (1024 * 1024))
            }
            IntakeError::NotAnImage { .. } => "File must be an image".to_string(),
        }
    }
}

/// An upload as received from the transport.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    /// Declared media type, e.g. `image/jpeg`.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// An upload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub basename: String,
    pub bytes: Vec<u8>,
}

pub fn validate_upload(upload: Upload, max_bytes: u64) -> Result<ValidatedUpload, IntakeError> {
    if upload.bytes.is_empty() {
        return Err(IntakeError::MissingFile);
    }
    let size = upload.bytes.len() as u64;
    if size > max_bytes {
        return Err(IntakeError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    if !upload
        .content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
    {
        return Err(IntakeError::NotAnImage {
            media_type: upload.content_type,
        });
    }
    Ok(ValidatedUpload {
        basename: basename_of(&upload.filename),
        bytes: upload.bytes,
    })
}

/// Filename without directories and without its last extension.
///
/// `photo.final.jpg` → `photo.final`; an empty stem becomes `image`.
pub fn basename_of(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };
    if stem.trim().is_empty() {
        FALLBACK_BASENAME.to_string()
    } else {
        stem.to_string()
    }
}

/// `<basename>_Etsy_Print_Kit.zip`
pub fn archive_filename(basename: &str) -> String {
    format!("{basename}_Etsy_Print_Kit.zip")
}

/// Header value offering the archive as a download.
pub fn content_disposition(basename: &str) -> String {
    let name = archive_filename(basename).replace(['"', '\\'], "_");
    format!("attachment; filename=\"{name}\"")
}

/// Media type for raw bytes, sniffed from their magic number.
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}
