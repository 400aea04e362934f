//! # Printkit
//!
//! Turns one photograph into a print-shop-ready kit: a ZIP archive of 300 DPI
//! JPEGs at every standard aspect ratio, plus a `manifest.txt` describing what
//! is inside.
//!
//! # Architecture: One Canvas, Many Crops
//!
//! Every request runs the same stages:
//!
//! ```text
//! 1. Intake     upload      →  validated bytes  (size, media type, basename)
//! 2. Plan       request     →  KitPlan          (every entry path and pixel size)
//! 3. Normalize  bytes       →  upright sRGB raster, alpha flattened on white
//! 4. Upscale    raster      →  one canvas covering the largest master
//! 5. Crop       canvas      →  per ratio: master, then every sub-size from it
//! 6. Archive    crops       →  streamed ZIP, manifest written last
//! ```
//!
//! Upscaling is the expensive step, so it happens exactly once per request.
//! The resulting canvas is shared read-only by every crop worker.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalogue`] | Fixed aspect ratios and their inch/cm size ladders |
//! | [`plan`] | Per-request plan: active ratios, canvas size, every archive entry |
//! | [`intake`] | Upload validation, basename and download filename |
//! | [`imaging`] | Engine trait, normalize, upscale, saliency and crop stages |
//! | [`archive`] | Streaming ZIP writer and the chunk channel to the consumer |
//! | [`cancel`] | Request-scoped cancellation flag |
//! | [`manifest`] | The `manifest.txt` text |
//! | [`pipeline`] | Orchestrator: runs the stages, fans out crops, feeds the archive |
//! | [`config`] | `printkit.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting for size plans and build progress |
//!
//! # Design Decisions
//!
//! ## Cover, Never Stretch
//!
//! The canvas is the smallest same-aspect resize of the source that covers the
//! largest master in both dimensions. Crops then select a target-aspect window
//! inside it, so no output is ever distorted; the price is that a source whose
//! aspect differs from a ratio loses its edges for that ratio.
//!
//! A source wider than the widest master (or taller than the narrowest) is
//! first trimmed at full resolution to that master's aspect. Every pixel it
//! drops would be cropped away from every output anyway, and the canvas stays
//! within a small factor of the largest master instead of growing with the
//! source's aspect.
//!
//! ## Sub-Sizes From the Master
//!
//! Each ratio's sub-sizes are cut from that ratio's master crop rather than
//! from the shared canvas. The master is already the right aspect, so every
//! sub-size is a pure downscale of the same composition.
//!
//! ## All or Nothing
//!
//! Any crop or encode failure fails the whole kit. The stream's last item is
//! then an error and no manifest is written, so a consumer can never mistake a
//! partial archive for a complete one. Detector failures are the exception:
//! they fall back to a centered crop and never surface.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (decode, Lanczos3 resampling),
//! `kamadak-exif` (orientation) and `jpeg-encoder` (4:4:4 JPEG with density and
//! ICC segments). No system libraries, no external processes.

pub mod archive;
pub mod cancel;
pub mod catalogue;
pub mod config;
pub mod imaging;
pub mod intake;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod plan;

#[cfg(test)]
pub(crate) mod test_helpers;
