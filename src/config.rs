//! Kit configuration module.
//!
//! Handles loading, validating, and merging `printkit.toml`. Stock defaults are
//! overridden key-by-key by the user's file, so a file only needs the values it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! dpi = 300                      # Print resolution (1-2400)
//! jpeg_quality = 95              # JPEG quality (1-100)
//! chroma_subsampling = "4:4:4"   # or "4:2:0"
//!
//! [color]
//! icc_profile = "assets/icc/sRGB.icc"
//!
//! [crop]
//! content_aware = true           # false = always the centered crop
//!
//! [processing]
//! max_workers = 4                # Max parallel crop workers (omit for auto = CPU cores)
//! stage_timeout_secs = 300       # Max wait for source preparation, then for each crop (0 = no limit)
//!
//! [archive]
//! compression_level = 9          # Deflate level (0-9)
//! entry_queue = 4                # Finished crops waiting for the zip writer
//! chunk_queue = 16               # Compressed chunks waiting for the consumer
//! chunk_size = 65536             # Bytes per emitted chunk
//!
//! [upload]
//! max_bytes = 52428800           # 50 MB
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::catalogue::DEFAULT_DPI;
use crate::imaging::{ChromaSubsampling, JpegParams, Quality};
use crate::intake::DEFAULT_MAX_UPLOAD_BYTES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "printkit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Kit configuration loaded from `printkit.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KitConfig {
    /// Print resolution and JPEG encoding.
    pub output: OutputConfig,
    /// Embedded color profile.
    pub color: ColorConfig,
    pub crop: CropConfig,
    /// Worker pool size and stage timeout.
    pub processing: ProcessingConfig,
    /// Zip compression and streaming queues.
    pub archive: ArchiveConfig,
    pub upload: UploadConfig,
}

impl KitConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=2400).contains(&self.output.dpi) {
            return Err(ConfigError::Validation(
                "output.dpi must be 1-2400".into(),
            ));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::Validation(
                "output.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.archive.compression_level > 9 {
            return Err(ConfigError::Validation(
                "archive.compression_level must be 0-9".into(),
            ));
        }
        if self.archive.entry_queue == 0
            || self.archive.chunk_queue == 0
            || self.archive.chunk_size == 0
        {
            return Err(ConfigError::Validation(
                "archive queue and chunk sizes must be non-zero".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "upload.max_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// JPEG settings shared by every entry of a kit. The ICC profile is
    /// attached separately once it has been loaded.
    pub fn jpeg_params(&self) -> JpegParams {
        JpegParams {
            quality: Quality::new(self.output.jpeg_quality),
            chroma: self.output.chroma_subsampling,
            dpi: self.output.dpi,
            icc_profile: None,
        }
    }
}

/// Print resolution and JPEG encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Pixels per inch; drives every pixel size and the JPEG density field.
    pub dpi: u32,
    pub jpeg_quality: u32,
    pub chroma_subsampling: ChromaSubsampling,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            jpeg_quality: Quality::default().value(),
            chroma_subsampling: ChromaSubsampling::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// ICC profile embedded in every JPEG. A missing file is not an error;
    /// the kit is produced without a profile.
    pub icc_profile: PathBuf,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            icc_profile: PathBuf::from("assets/icc/sRGB.icc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Ask the saliency detector before falling back to a centered crop.
    pub content_aware: bool,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            content_aware: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel crop workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
    /// Longest the request waits for source preparation (normalize, trim,
    /// upscale), and then for each next finished crop. `0` waits forever.
    pub stage_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            stage_timeout_secs: 300,
        }
    }
}

impl ProcessingConfig {
    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_secs > 0).then(|| Duration::from_secs(self.stage_timeout_secs))
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Deflate level, 0 (store speed) to 9 (smallest).
    pub compression_level: u32,
    /// Finished crops that may wait for the zip writer before workers block.
    pub entry_queue: usize,
    /// Compressed chunks that may wait for the consumer before the writer blocks.
    pub chunk_queue: usize,
    pub chunk_size: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: 9,
            entry_queue: 4,
            chunk_queue: 16,
            chunk_size: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    // Only fails for values TOML cannot represent; the defaults have none.
    toml::Value::try_from(KitConfig::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<KitConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: KitConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when it
/// does not exist.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<KitConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `printkit.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Print Kit Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output images
# ---------------------------------------------------------------------------
[output]
# Print resolution. Every pixel size and the JPEG density field derive from it.
dpi = 300

# JPEG quality (1 = worst, 100 = best).
jpeg_quality = 95

# Chroma subsampling: "4:4:4" keeps full color detail, "4:2:0" is smaller.
chroma_subsampling = "4:4:4"

# ---------------------------------------------------------------------------
# Color
# ---------------------------------------------------------------------------
[color]
# ICC profile embedded in every JPEG. If the file is missing the kit is
# still produced, without an embedded profile.
icc_profile = "assets/icc/sRGB.icc"

# ---------------------------------------------------------------------------
# Cropping
# ---------------------------------------------------------------------------
[crop]
# Look for the salient region before falling back to a centered crop.
content_aware = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel crop workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_workers = 4

# Seconds to wait for source preparation (decode, trim, upscale), and then
# for each next finished crop, before giving up on the request. 0 waits
# forever.
stage_timeout_secs = 300

# ---------------------------------------------------------------------------
# Archive
# ---------------------------------------------------------------------------
[archive]
# Deflate compression level (0-9).
compression_level = 9

# Finished crops allowed to wait for the zip writer.
entry_queue = 4

# Compressed chunks allowed to wait for the download consumer.
chunk_queue = 16

# Size of each emitted chunk in bytes.
chunk_size = 65536

# ---------------------------------------------------------------------------
# Upload
# ---------------------------------------------------------------------------
[upload]
# Largest accepted upload in bytes (50 MB).
max_bytes = 52428800
"##
}
