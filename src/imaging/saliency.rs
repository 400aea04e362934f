//! Content-aware crop detection.
//!
//! A [`SaliencyDetector`] proposes the target-aspect window that keeps the most
//! interesting part of the picture. The cropper treats every failure mode the
//! same way (`Ok(None)` or `Err(_)`) and falls back to a centered crop, so a
//! detector never needs to be right, only deterministic and fast.
//!
//! [`EdgeSaliencyDetector`] scores a 256px preview with a per-pixel energy of
//! luma gradient, skin-tone likelihood and color saturation, then slides the
//! largest target-aspect window over a summed-area table and keeps the
//! highest-scoring position (ties go to the most central one).

use super::backend::{CropRect, Dimensions, RasterImage};
use super::calculations::center_crop_rect;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Invalid crop target {width}x{height}")]
    InvalidTarget { width: u32, height: u32 },
    #[error("Detector failed: {0}")]
    Failed(String),
}

pub trait SaliencyDetector: Send + Sync {
    /// Best window of aspect `width:height` inside `image`, in `image`'s pixels.
    ///
    /// `Ok(None)` means "no opinion"; the caller should use its fallback.
    fn find_crop(
        &self,
        image: &RasterImage,
        width: u32,
        height: u32,
    ) -> Result<Option<CropRect>, DetectorError>;
}

/// Always declines, so every crop takes the centered fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDetector;

impl SaliencyDetector for DisabledDetector {
    fn find_crop(
        &self,
        _image: &RasterImage,
        _width: u32,
        _height: u32,
    ) -> Result<Option<CropRect>, DetectorError> {
        Ok(None)
    }
}

/// Longest side of the preview the energy map is computed on.
const PREVIEW_SIZE: u32 = 256;
const SKIN_WEIGHT: f64 = 0.6;
const SATURATION_WEIGHT: f64 = 0.25;
/// Below this mean energy per preview pixel the image counts as featureless.
const MIN_MEAN_ENERGY: f64 = 1e-4;

#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeSaliencyDetector;

impl EdgeSaliencyDetector {
    pub fn new() -> Self {
        Self
    }
}

impl SaliencyDetector for EdgeSaliencyDetector {
    fn find_crop(
        &self,
        image: &RasterImage,
        width: u32,
        height: u32,
    ) -> Result<Option<CropRect>, DetectorError> {
        if width == 0 || height == 0 {
            return Err(DetectorError::InvalidTarget { width, height });
        }
        let source = image.dimensions();
        if source.width == 0 || source.height == 0 {
            return Err(DetectorError::Failed("empty image".to_string()));
        }

        let window = center_crop_rect(source, Dimensions::new(width, height));
        if window.width == source.width && window.height == source.height {
            // Same aspect: the only candidate is the whole image.
            return Ok(Some(window));
        }

        let preview = image.pixels().thumbnail(PREVIEW_SIZE, PREVIEW_SIZE).to_rgb8();
        let (pw, ph) = preview.dimensions();
        if pw < 2 || ph < 2 {
            return Ok(None);
        }
        let fx = source.width as f64 / pw as f64;
        let fy = source.height as f64 / ph as f64;

        let table = SummedArea::new(&energy_map(&preview), pw, ph);
        if table.total() / (pw as f64 * ph as f64) < MIN_MEAN_ENERGY {
            return Ok(None);
        }

        let ww = ((window.width as f64 / fx).round() as u32).clamp(1, pw);
        let wh = ((window.height as f64 / fy).round() as u32).clamp(1, ph);
        let (bx, by) = best_window(&table, pw, ph, ww, wh);

        let x = ((bx as f64 * fx).round() as u32).min(source.width - window.width);
        let y = ((by as f64 * fy).round() as u32).min(source.height - window.height);
        Ok(Some(CropRect { x, y, ..window }))
    }
}

/// Per-pixel energy: gradient + weighted skin tone + weighted saturation.
fn energy_map(img: &RgbImage) -> Vec<f64> {
    let (w, h) = img.dimensions();
    let luma: Vec<f64> = img
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0
        })
        .collect();
    let at = |x: u32, y: u32| luma[(y * w + x) as usize];

    let mut energy = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let dx = (at((x + 1).min(w - 1), y) - at(x.saturating_sub(1), y)).abs();
            let dy = (at(x, (y + 1).min(h - 1)) - at(x, y.saturating_sub(1))).abs();
            let [r, g, b] = img.get_pixel(x, y).0;
            energy.push(
                (dx + dy) / 2.0
                    + SKIN_WEIGHT * skin_likelihood(r, g, b)
                    + SATURATION_WEIGHT * saturation(r, g, b),
            );
        }
    }
    energy
}

fn skin_likelihood(r: u8, g: u8, b: u8) -> f64 {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let spread = r.max(g).max(b) - r.min(g).min(b);
    if r > 95 && g > 40 && b > 20 && spread > 15 && (r - g).abs() > 15 && r > g && r > b {
        1.0
    } else {
        0.0
    }
}

fn saturation(r: u8, g: u8, b: u8) -> f64 {
    let max = r.max(g).max(b) as f64;
    let min = r.min(g).min(b) as f64;
    if max == 0.0 { 0.0 } else { (max - min) / max }
}

/// Summed-area table with a zero border row and column.
struct SummedArea {
    sums: Vec<f64>,
    stride: usize,
}

impl SummedArea {
    fn new(values: &[f64], w: u32, h: u32) -> Self {
        let stride = w as usize + 1;
        let mut sums = vec![0.0; stride * (h as usize + 1)];
        for y in 0..h as usize {
            let mut row = 0.0;
            for x in 0..w as usize {
                row += values[y * w as usize + x];
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { sums, stride }
    }

    fn total(&self) -> f64 {
        self.sums[self.sums.len() - 1]
    }

    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let s = |x: usize, y: usize| self.sums[y * self.stride + x];
        s(x1, y1) - s(x0, y1) - s(x1, y0) + s(x0, y0)
    }
}

/// Top-left of the highest-energy `ww`×`wh` window; ties go to the most central.
fn best_window(table: &SummedArea, pw: u32, ph: u32, ww: u32, wh: u32) -> (u32, u32) {
    let center = ((pw - ww) as f64 / 2.0, (ph - wh) as f64 / 2.0);
    let distance = |x: u32, y: u32| (x as f64 - center.0).abs() + (y as f64 - center.1).abs();

    let mut best = (0, 0);
    let mut best_score = table.window(0, 0, ww, wh);
    for y in 0..=ph - wh {
        for x in 0..=pw - ww {
            let score = table.window(x, y, ww, wh);
            let tolerance = 1e-9 * best_score.abs().max(1.0);
            let better = score > best_score + tolerance
                || ((score - best_score).abs() <= tolerance
                    && distance(x, y) < distance(best.0, best.1));
            if better {
                best = (x, y);
                best_score = score;
            }
        }
    }
    best
}
