//! Pure calculation functions for canvas and crop geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::{CropRect, Dimensions};

/// Scale factor that makes `source` cover `target` in both dimensions.
///
/// This is `max(targetW/srcW, targetH/srcH)`, the factor the upscaler uses to
/// decide between a single resample and a staged one.
pub fn scale_factor(source: Dimensions, target: Dimensions) -> f64 {
    let sx = target.width as f64 / source.width.max(1) as f64;
    let sy = target.height as f64 / source.height.max(1) as f64;
    sx.max(sy)
}

/// Calculate dimensions needed to cover a target area without changing aspect ratio.
///
/// Both output sides are at least the target's; when source and target share
/// an aspect ratio the result equals the target exactly.
///
/// # Arguments
/// * `source` - Source image dimensions
/// * `target` - Target area dimensions
///
/// # Returns
/// * Cover dimensions (at least one side matches the target)
///
/// # Examples
/// ```
/// # use printkit::imaging::{Dimensions, cover_dimensions};
/// // 1000x1000 square → covers a 7200x10800 canvas at 10800x10800
/// let out = cover_dimensions(Dimensions::new(1000, 1000), Dimensions::new(7200, 10800));
/// assert_eq!(out, Dimensions::new(10800, 10800));
/// ```
pub fn cover_dimensions(source: Dimensions, target: Dimensions) -> Dimensions {
    let scale = scale_factor(source, target);
    let w = ((source.width as f64 * scale).round() as u32).max(target.width);
    let h = ((source.height as f64 * scale).round() as u32).max(target.height);
    Dimensions::new(w, h)
}

/// One resample step of an upscale plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpscalePlan {
    /// Cover factor from the source to the target canvas.
    pub scale: f64,
    /// Intermediate canvas at 2× the source, when the factor exceeds 2×.
    pub intermediate: Option<Dimensions>,
    /// Final raster dimensions handed to the cropper.
    pub output: Dimensions,
    /// True when any side of the source was smaller than the target.
    pub upscaled: bool,
}

impl UpscalePlan {
    pub fn is_staged(&self) -> bool {
        self.intermediate.is_some()
    }
}

/// Decide how to bring `source` to a raster covering `target`.
///
/// - Source at least as large as the target on both sides: one resample down to
///   the cover size (skipped entirely when already there).
/// - Otherwise: upscale; factors above 2× go through a 2× intermediate first.
pub fn plan_upscale(source: Dimensions, target: Dimensions) -> UpscalePlan {
    let scale = scale_factor(source, target);
    let output = cover_dimensions(source, target);
    let upscaled = source.width < target.width || source.height < target.height;

    let intermediate = (upscaled && scale > 2.0)
        .then(|| Dimensions::new(source.width * 2, source.height * 2));

    UpscalePlan {
        scale,
        intermediate,
        output,
        upscaled,
    }
}

/// The master whose aspect ratio `source` must be trimmed to, if any.
///
/// Every master crop lies inside the canvas, so only the band between the
/// narrowest and the widest master aspect is ever used. A source outside that
/// band is trimmed to its nearest edge before the upscale; otherwise a
/// panorama would be scaled until its short side covers the canvas and its
/// long side would grow without limit. Returns `None` when the source is
/// already inside the band.
///
/// # Examples
/// ```
/// # use printkit::imaging::{Dimensions, aspect_frame};
/// let masters = [Dimensions::new(7200, 10800), Dimensions::new(6000, 7500)];
/// // 8:1 panorama → trimmed to the 4:5 master's aspect
/// assert_eq!(
///     aspect_frame(Dimensions::new(8000, 1000), &masters),
///     Some(Dimensions::new(6000, 7500))
/// );
/// assert_eq!(aspect_frame(Dimensions::new(750, 1000), &masters), None);
/// ```
pub fn aspect_frame(source: Dimensions, masters: &[Dimensions]) -> Option<Dimensions> {
    let aspect = |d: &Dimensions| d.width as f64 / d.height.max(1) as f64;
    let narrowest = masters.iter().min_by(|a, b| aspect(a).total_cmp(&aspect(b)))?;
    let widest = masters.iter().max_by(|a, b| aspect(a).total_cmp(&aspect(b)))?;

    let src = aspect(&source);
    if src > aspect(widest) {
        Some(*widest)
    } else if src < aspect(narrowest) {
        Some(*narrowest)
    } else {
        None
    }
}

/// Centered crop rectangle with the target's aspect ratio.
///
/// A relatively wider source keeps full height and trims width to
/// `round(srcH × targetAspect)`; a taller one keeps full width and trims height
/// to `round(srcW / targetAspect)`. The result is clamped to the source bounds.
pub fn center_crop_rect(source: Dimensions, target: Dimensions) -> CropRect {
    let (src_w, src_h) = (source.width, source.height);
    let target_aspect = target.width as f64 / target.height as f64;
    let source_aspect = src_w as f64 / src_h as f64;

    let (crop_w, crop_h) = if source_aspect > target_aspect {
        // Source is wider: keep full height
        let w = (src_h as f64 * target_aspect).round() as u32;
        (w.clamp(1, src_w), src_h)
    } else {
        // Source is taller (or equal): keep full width
        let h = (src_w as f64 / target_aspect).round() as u32;
        (src_w, h.clamp(1, src_h))
    };

    let x = ((src_w - crop_w) as f64 / 2.0).round() as u32;
    let y = ((src_h - crop_h) as f64 / 2.0).round() as u32;

    CropRect {
        x: x.min(src_w - crop_w),
        y: y.min(src_h - crop_h),
        width: crop_w,
        height: crop_h,
    }
}

/// Relative difference between two aspect ratios, as a fraction of `expected`.
pub fn aspect_deviation(actual: Dimensions, expected: Dimensions) -> f64 {
    let a = actual.width as f64 / actual.height as f64;
    let e = expected.width as f64 / expected.height as f64;
    (a - e).abs() / e
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: u32, h: u32) -> Dimensions {
        Dimensions::new(w, h)
    }

    // =========================================================================
    // scale_factor / cover_dimensions tests
    // =========================================================================

    #[test]
    fn scale_factor_takes_the_larger_axis() {
        assert_eq!(scale_factor(dims(1000, 1000), dims(7200, 10800)), 10.8);
        assert_eq!(scale_factor(dims(4000, 1000), dims(2000, 1000)), 1.0);
    }

    #[test]
    fn cover_same_aspect_matches_target_exactly() {
        assert_eq!(
            cover_dimensions(dims(2400, 3600), dims(7200, 10800)),
            dims(7200, 10800)
        );
    }

    #[test]
    fn cover_wider_source_overflows_width() {
        // 800x600 → cover 400x500: height matches, width = 500 * 4/3 = 667
        assert_eq!(cover_dimensions(dims(800, 600), dims(400, 500)), dims(667, 500));
    }

    #[test]
    fn cover_taller_source_overflows_height() {
        assert_eq!(cover_dimensions(dims(600, 800), dims(500, 400)), dims(500, 667));
    }

    #[test]
    fn cover_never_undershoots_target() {
        for (src, tgt) in [
            (dims(1000, 1000), dims(7200, 10800)),
            (dims(333, 777), dims(7017, 9933)),
            (dims(6001, 4001), dims(3300, 4200)),
        ] {
            assert!(cover_dimensions(src, tgt).contains(tgt), "{src} → {tgt}");
        }
    }

    // =========================================================================
    // plan_upscale tests
    // =========================================================================

    #[test]
    fn plan_large_factor_is_staged_through_2x() {
        let plan = plan_upscale(dims(1000, 1000), dims(7200, 10800));
        assert!(plan.upscaled);
        assert!(plan.is_staged());
        assert_eq!(plan.intermediate, Some(dims(2000, 2000)));
        assert_eq!(plan.output, dims(10800, 10800));
    }

    #[test]
    fn plan_small_factor_is_single_step() {
        let plan = plan_upscale(dims(4000, 6000), dims(7200, 10800));
        assert!(plan.upscaled);
        assert!(!plan.is_staged());
        assert_eq!(plan.output, dims(7200, 10800));
    }

    #[test]
    fn plan_exactly_2x_is_single_step() {
        let plan = plan_upscale(dims(3600, 5400), dims(7200, 10800));
        assert_eq!(plan.scale, 2.0);
        assert!(!plan.is_staged());
    }

    #[test]
    fn plan_larger_source_is_not_upscaled() {
        let plan = plan_upscale(dims(9000, 12000), dims(7200, 10800));
        assert!(!plan.upscaled);
        assert!(!plan.is_staged());
        assert!(plan.output.contains(dims(7200, 10800)));
        assert!(plan.scale < 1.0);
    }

    #[test]
    fn plan_one_short_side_counts_as_upscale() {
        let plan = plan_upscale(dims(20000, 5000), dims(7200, 10800));
        assert!(plan.upscaled);
        assert!(plan.is_staged());
        assert_eq!(plan.intermediate, Some(dims(40000, 10000)));
    }

    // =========================================================================
    // center_crop_rect tests
    // =========================================================================

    #[test]
    fn center_crop_wider_source_keeps_full_height() {
        let rect = center_crop_rect(dims(10800, 10800), dims(7200, 10800));
        assert_eq!(rect.height, 10800);
        assert_eq!(rect.width, 7200);
        assert_eq!(rect.x, 1800);
        assert_eq!(rect.y, 0);
    }

    #[test]
    fn center_crop_taller_source_keeps_full_width() {
        let rect = center_crop_rect(dims(1000, 3000), dims(400, 500));
        assert_eq!(rect.width, 1000);
        assert_eq!(rect.height, 1250);
        assert_eq!(rect.x, 0);
        assert_eq!(rect.y, 875);
    }

    #[test]
    fn center_crop_matching_aspect_is_whole_image() {
        let rect = center_crop_rect(dims(600, 900), dims(200, 300));
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 0,
                width: 600,
                height: 900
            }
        );
    }

    #[test]
    fn center_crop_odd_margin_is_within_one_pixel() {
        let rect = center_crop_rect(dims(1001, 600), dims(1, 1));
        assert_eq!(rect.width, 600);
        let expected_x = (1001 - 600) / 2;
        assert!(rect.x.abs_diff(expected_x) <= 1);
        assert!(rect.fits_within(dims(1001, 600)));
    }

    #[test]
    fn center_crop_stays_in_bounds_for_extreme_aspects() {
        for (src, tgt) in [
            (dims(1, 5000), dims(5000, 1)),
            (dims(5000, 1), dims(1, 5000)),
            (dims(7, 3), dims(11, 14)),
        ] {
            let rect = center_crop_rect(src, tgt);
            assert!(rect.fits_within(src), "{rect:?} outside {src}");
        }
    }

    #[test]
    fn aspect_deviation_of_known_cm_size() {
        // 22x30cm at 300 DPI against a nominal 3:4
        let dev = aspect_deviation(dims(2598, 3543), dims(3, 4));
        assert!(dev > 0.02 && dev < 0.025, "deviation {dev}");
        assert_eq!(aspect_deviation(dims(300, 400), dims(3, 4)), 0.0);
    }

    // =========================================================================
    // aspect_frame tests
    // =========================================================================

    /// Masters of the fixed five ratios at 300 DPI.
    fn fixed_masters() -> Vec<Dimensions> {
        vec![
            dims(7200, 10800),
            dims(5400, 7200),
            dims(6000, 7500),
            dims(6600, 8400),
            dims(7017, 9933),
        ]
    }

    #[test]
    fn source_inside_band_is_not_trimmed() {
        let masters = fixed_masters();
        assert_eq!(aspect_frame(dims(2000, 3000), &masters), None);
        assert_eq!(aspect_frame(dims(800, 1000), &masters), None);
        assert_eq!(aspect_frame(dims(3000, 4000), &masters), None);
    }

    #[test]
    fn wide_source_trims_to_widest_master() {
        let masters = fixed_masters();
        assert_eq!(aspect_frame(dims(1000, 1000), &masters), Some(dims(6000, 7500)));
        assert_eq!(aspect_frame(dims(8000, 1000), &masters), Some(dims(6000, 7500)));
    }

    #[test]
    fn tall_source_trims_to_narrowest_master() {
        let masters = fixed_masters();
        assert_eq!(aspect_frame(dims(500, 4000), &masters), Some(dims(7200, 10800)));
    }

    #[test]
    fn no_masters_means_no_frame() {
        assert_eq!(aspect_frame(dims(8000, 1000), &[]), None);
    }

    #[test]
    fn trimmed_panorama_canvas_stays_bounded() {
        let masters = fixed_masters();
        let canvas = dims(7200, 10800);
        let source = dims(8000, 1000);

        let frame = aspect_frame(source, &masters).unwrap();
        let window = center_crop_rect(source, frame);
        assert_eq!(window, CropRect { x: 3600, y: 0, width: 800, height: 1000 });

        let plan = plan_upscale(window.dimensions(), canvas);
        assert_eq!(plan.output, dims(8640, 10800));
        assert_eq!(plan.intermediate, Some(dims(1600, 2000)));

        // Untrimmed, the same source would need an 86400px wide canvas.
        assert_eq!(plan_upscale(source, canvas).output, dims(86400, 10800));
    }
}
