//! The `manifest.txt` written as the archive's final entry.
//!
//! Plain text, one fact per line, meant for the shop owner opening the kit:
//! what the source was, which ratios and sizes are inside, and how the
//! images were processed.

use crate::imaging::{ChromaSubsampling, CropStrategy, Dimensions, Quality, UpscalePath};
use crate::plan::KitPlan;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

pub const TITLE: &str = "Etsy Print Sizer - Generated Images";

/// Everything the manifest reports that the plan alone does not know.
#[derive(Debug, Clone)]
pub struct ManifestInfo {
    /// Stored pixel dimensions of the upload.
    pub original: Dimensions,
    pub generated_at: DateTime<Utc>,
    pub orientation: u16,
    pub had_alpha: bool,
    /// Size the source was cut to before the upscale, if it was.
    pub trimmed: Option<Dimensions>,
    pub upscale: UpscalePath,
    pub quality: Quality,
    pub chroma: ChromaSubsampling,
    pub content_aware: bool,
    pub icc_embedded: bool,
    /// Strategy used for each ratio's master crop, keyed by ratio label.
    pub master_strategies: BTreeMap<String, CropStrategy>,
}

pub fn render(plan: &KitPlan, info: &ManifestInfo) -> String {
    let mut lines = vec![
        TITLE.to_string(),
        format!("Source file: {}", plan.basename),
        format!(
            "Original dimensions: {}x{}px",
            info.original.width, info.original.height
        ),
        format!(
            "Generated at: {}",
            info.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        format!("DPI: {}", plan.dpi),
        String::new(),
        "Included aspect ratios:".to_string(),
    ];

    for ratio in &plan.ratios {
        lines.push(format!(
            "  - {}: {} ({}x{}px)",
            ratio.ratio,
            ratio.master.entry.file_label(),
            ratio.master.pixels.width,
            ratio.master.pixels.height
        ));
    }

    lines.push(String::new());
    if plan.request.every_size {
        lines.push("Every size mode: ENABLED".to_string());
        lines.push("All sub-sizes for each aspect ratio included".to_string());
    } else {
        lines.push("Every size mode: DISABLED".to_string());
        lines.push("Only master sizes included".to_string());
    }
    lines.push(format!("Files: {} images + manifest", plan.image_count()));

    lines.push(String::new());
    lines.push("Processing details:".to_string());
    lines.push("- Images converted to sRGB color space".to_string());
    lines.push(if info.orientation > 1 {
        format!("- EXIF orientation {} corrected", info.orientation)
    } else {
        "- EXIF orientation automatically corrected".to_string()
    });
    if info.had_alpha {
        lines.push("- Alpha channels flattened to white background".to_string());
    }
    if let Some(trimmed) = info.trimmed {
        lines.push(format!(
            "- Source trimmed to {}x{}px to fit the print aspect ratios",
            trimmed.width, trimmed.height
        ));
    }
    lines.push(format!("- Canvas: {}", info.upscale.describe()));
    lines.push(format!(
        "- JPEG quality: {}% with {} chroma subsampling",
        info.quality.value(),
        info.chroma.label()
    ));
    lines.push(if info.content_aware {
        "- Smart cropping with salient region detection, centered crop as fallback".to_string()
    } else {
        "- Centered cropping (content-aware cropping disabled)".to_string()
    });
    lines.push(format!("- {} DPI metadata applied to all images", plan.dpi));
    lines.push(if info.icc_embedded {
        "- sRGB color profile embedded for consistent colors".to_string()
    } else {
        "- No color profile embedded (profile file unavailable)".to_string()
    });
    let fallbacks: Vec<&str> = info
        .master_strategies
        .iter()
        .filter(|(_, s)| **s == CropStrategy::CenterFallback)
        .map(|(r, _)| r.as_str())
        .collect();
    if info.content_aware && !fallbacks.is_empty() {
        lines.push(format!("- Centered crop used for: {}", fallbacks.join(", ")));
    }

    lines.push(String::new());
    lines.push("Notes:".to_string());
    lines.push("- 22×30 cm is slightly off true 3:4 ratio".to_string());
    lines.push("- Print labs may trim a few mm if needed for exact sizes".to_string());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::KitRequest;
    use chrono::TimeZone;

    fn info() -> ManifestInfo {
        ManifestInfo {
            original: Dimensions::new(1000, 1000),
            generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            orientation: 1,
            had_alpha: false,
            trimmed: None,
            upscale: UpscalePath::Staged,
            quality: Quality::new(95),
            chroma: ChromaSubsampling::Yuv444,
            content_aware: true,
            icc_embedded: true,
            master_strategies: BTreeMap::new(),
        }
    }

    fn plan(every_size: bool) -> KitPlan {
        KitPlan::new(
            "sunset",
            KitRequest {
                every_size,
                include_5x7: false,
            },
            300,
        )
    }

    #[test]
    fn header_lines() {
        let text = render(&plan(false), &info());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], TITLE);
        assert_eq!(lines[1], "Source file: sunset");
        assert_eq!(lines[2], "Original dimensions: 1000x1000px");
        assert_eq!(lines[3], "Generated at: 2026-03-01T12:00:00.000Z");
        assert_eq!(lines[4], "DPI: 300");
    }

    #[test]
    fn one_line_per_ratio() {
        let text = render(&plan(false), &info());
        assert!(text.contains("  - 2x3: 24x36in (7200x10800px)"));
        assert!(text.contains("  - ISO: 23.39x33.11in (7017x9933px)"));
        assert_eq!(text.lines().filter(|l| l.starts_with("  - ")).count(), 5);
    }

    #[test]
    fn every_size_flag() {
        assert!(render(&plan(false), &info()).contains("Every size mode: DISABLED"));
        let text = render(&plan(true), &info());
        assert!(text.contains("Every size mode: ENABLED"));
        assert!(text.contains("Files: 41 images + manifest"));
    }

    #[test]
    fn processing_notes() {
        let text = render(&plan(false), &info());
        assert!(text.contains("JPEG quality: 95% with 4:4:4 chroma subsampling"));
        assert!(text.contains("300 DPI metadata"));
        assert!(text.contains("22×30 cm is slightly off true 3:4 ratio"));
        assert!(text.contains("two-stage Lanczos3 upscale"));
        assert!(!text.contains("Alpha channels flattened"));
        assert!(!text.contains("Source trimmed"));
    }

    #[test]
    fn reports_trim_before_canvas() {
        let mut info = info();
        info.trimmed = Some(Dimensions::new(800, 1000));
        let text = render(&plan(false), &info);
        let trim = text
            .find("- Source trimmed to 800x1000px to fit the print aspect ratios")
            .unwrap();
        assert!(trim < text.find("- Canvas:").unwrap());
    }

    #[test]
    fn reports_alpha_icc_and_fallbacks() {
        let mut info = info();
        info.had_alpha = true;
        info.icc_embedded = false;
        info.master_strategies
            .insert("4x5".to_string(), CropStrategy::CenterFallback);
        info.master_strategies
            .insert("2x3".to_string(), CropStrategy::ContentAware);
        let text = render(&plan(false), &info);
        assert!(text.contains("Alpha channels flattened to white background"));
        assert!(text.contains("No color profile embedded"));
        assert!(text.contains("Centered crop used for: 4x5"));
    }
}
