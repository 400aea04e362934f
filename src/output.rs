//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Sizes
//!
//! ```text
//! sunset @ 300 DPI (canvas 7200x10800px)
//! 2x3 (14 files)
//!     24x36in → 7200x10800px (master)
//!     4x6in → 1200x1800px
//!     10x15cm → 1181x1772px
//! ...
//! 42 images + manifest
//! ```
//!
//! ## Build
//!
//! ```text
//! Source 1000x1000px
//!     EXIF orientation 6 corrected
//! Canvas 7200x10800px (two-stage Lanczos3 upscale via 2x intermediate)
//!     2x3 24x36in → 7200x10800px
//!     4x5 20x25in → 6000x7500px (center)
//! Archived 5 images + manifest
//! Wrote out/sunset_Etsy_Print_Kit.zip (5 images, 48.2 MB)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::imaging::CropStrategy;
use crate::pipeline::{KitSummary, ProcessEvent};
use crate::plan::{KitPlan, PlannedSize};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Human-readable byte count, one decimal above a kilobyte.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn size_line(size: &PlannedSize) -> String {
    format!(
        "{} \u{2192} {}x{}px",
        size.entry.file_label(),
        size.pixels.width,
        size.pixels.height
    )
}

// ============================================================================
// Size plan
// ============================================================================

/// Format the sizes a request will produce, grouped by aspect ratio.
pub fn format_size_plan(plan: &KitPlan) -> Vec<String> {
    let mut lines = vec![format!(
        "{} @ {} DPI (canvas {}x{}px)",
        plan.basename, plan.dpi, plan.canvas.width, plan.canvas.height
    )];

    for ratio in &plan.ratios {
        lines.push(format!(
            "{} ({})",
            ratio.ratio,
            plural(ratio.entry_count(), "file", "files")
        ));
        lines.push(format!("{}{} (master)", indent(1), size_line(&ratio.master)));
        for sub in &ratio.subs {
            lines.push(format!("{}{}", indent(1), size_line(sub)));
        }
    }

    lines.push(format!(
        "{} + manifest",
        plural(plan.image_count(), "image", "images")
    ));
    lines
}

pub fn print_size_plan(plan: &KitPlan) {
    for line in format_size_plan(plan) {
        println!("{}", line);
    }
}

/// Full entry listing, one archive path per line.
pub fn format_entry_paths(plan: &KitPlan) -> Vec<String> {
    plan.sizes().map(|size| size.path.clone()).collect()
}

// ============================================================================
// Build progress
// ============================================================================

/// Format a single pipeline progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Normalized {
            width,
            height,
            orientation,
            had_alpha,
        } => {
            let mut lines = vec![format!("Source {}x{}px", width, height)];
            if *orientation > 1 {
                lines.push(format!(
                    "{}EXIF orientation {} corrected",
                    indent(1),
                    orientation
                ));
            }
            if *had_alpha {
                lines.push(format!("{}Alpha flattened to white", indent(1)));
            }
            lines
        }
        ProcessEvent::Trimmed {
            width,
            height,
            strategy,
        } => {
            let mut line = format!("{}Trimmed to {}x{}px", indent(1), width, height);
            if *strategy == CropStrategy::CenterFallback {
                line.push_str(&format!(" ({})", strategy.label()));
            }
            vec![line]
        }
        ProcessEvent::Upscaled {
            width,
            height,
            path,
        } => vec![format!(
            "Canvas {}x{}px ({})",
            width,
            height,
            path.describe()
        )],
        ProcessEvent::Cropped {
            ratio,
            label,
            width,
            height,
            strategy,
        } => {
            let mut line = format!(
                "{}{} {} \u{2192} {}x{}px",
                indent(1),
                ratio,
                label,
                width,
                height
            );
            if *strategy == CropStrategy::CenterFallback {
                line.push_str(&format!(" ({})", strategy.label()));
            }
            vec![line]
        }
        ProcessEvent::Finished { images } => {
            vec![format!(
                "Archived {} + manifest",
                plural(*images, "image", "images")
            )]
        }
    }
}

/// Format the closing line of a build.
pub fn format_summary(summary: &KitSummary, path: &Path) -> Vec<String> {
    vec![format!(
        "Wrote {} ({}, {})",
        path.display(),
        plural(summary.images, "image", "images"),
        format_bytes(summary.bytes)
    )]
}

pub fn print_summary(summary: &KitSummary, path: &Path) {
    for line in format_summary(summary, path) {
        println!("{}", line);
    }
}
