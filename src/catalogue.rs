//! The size catalogue: every aspect ratio a print kit can contain, the master
//! print size for each one, and the hand-curated ladders of smaller sizes.
//!
//! The catalogue is closed. Ratios are an enum, the tables are `static`, and
//! nothing here is ever mutated, so concurrent crop workers read it freely.
//!
//! ## Masters (inches, at the configured DPI)
//!
//! | Ratio | Master | Pixels @ 300 DPI |
//! |---|---|---|
//! | 2x3 | 24×36in | 7200×10800 |
//! | 3x4 | 18×24in | 5400×7200 |
//! | 4x5 | 20×25in | 6000×7500 |
//! | 11x14 | 22×28in | 6600×8400 |
//! | ISO | 23.39×33.11in (A1) | 7017×9933 |
//! | 5x7 | 5×7in | 1500×2100 |
//!
//! The cm ladder of 3x4 contains `22x30cm`, which is about 2.2% away from a true
//! 3:4 proportion. Print labs sell it as a 3:4 size, so it stays in the table and
//! the manifest carries a note about it.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Resolution every size is rendered at unless configured otherwise.
pub const DEFAULT_DPI: u32 = 300;

/// A width:height proportion from the fixed catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AspectRatio {
    #[serde(rename = "2x3")]
    R2x3,
    #[serde(rename = "3x4")]
    R3x4,
    #[serde(rename = "4x5")]
    R4x5,
    #[serde(rename = "11x14")]
    R11x14,
    #[serde(rename = "ISO")]
    Iso,
    #[serde(rename = "5x7")]
    R5x7,
}

impl AspectRatio {
    /// Every ratio in catalogue order.
    pub const ALL: [AspectRatio; 6] = [
        AspectRatio::R2x3,
        AspectRatio::R3x4,
        AspectRatio::R4x5,
        AspectRatio::R11x14,
        AspectRatio::Iso,
        AspectRatio::R5x7,
    ];

    /// Ratios included in every kit. 5x7 is opt-in.
    pub const FIXED: [AspectRatio; 5] = [
        AspectRatio::R2x3,
        AspectRatio::R3x4,
        AspectRatio::R4x5,
        AspectRatio::R11x14,
        AspectRatio::Iso,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::R2x3 => "2x3",
            AspectRatio::R3x4 => "3x4",
            AspectRatio::R4x5 => "4x5",
            AspectRatio::R11x14 => "11x14",
            AspectRatio::Iso => "ISO",
            AspectRatio::R5x7 => "5x7",
        }
    }

    /// Nominal width / height.
    pub fn nominal(self) -> f64 {
        match self {
            AspectRatio::R2x3 => 2.0 / 3.0,
            AspectRatio::R3x4 => 3.0 / 4.0,
            AspectRatio::R4x5 => 4.0 / 5.0,
            AspectRatio::R11x14 => 11.0 / 14.0,
            AspectRatio::Iso => std::f64::consts::FRAC_1_SQRT_2,
            AspectRatio::R5x7 => 5.0 / 7.0,
        }
    }

    fn sizes(self) -> &'static RatioSizes {
        match self {
            AspectRatio::R2x3 => &SIZES_2X3,
            AspectRatio::R3x4 => &SIZES_3X4,
            AspectRatio::R4x5 => &SIZES_4X5,
            AspectRatio::R11x14 => &SIZES_11X14,
            AspectRatio::Iso => &SIZES_ISO,
            AspectRatio::R5x7 => &SIZES_5X7,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown aspect ratio '{s}'"))
    }
}

/// Physical unit a size is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    #[serde(rename = "in")]
    Inch,
    #[serde(rename = "cm")]
    Centimeter,
}

impl Unit {
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Inch => "in",
            Unit::Centimeter => "cm",
        }
    }

    /// Units per inch.
    pub fn inch_factor(self) -> f64 {
        match self {
            Unit::Inch => 1.0,
            Unit::Centimeter => 2.54,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeKind {
    Master,
    Sub,
}

/// One physical print size belonging to an aspect ratio's ladder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeEntry {
    /// Label as printed on the size chart: `24x36`, `10x15`, `A4`.
    pub label: String,
    pub width: f64,
    pub height: f64,
    pub unit: Unit,
    pub kind: SizeKind,
}

impl SizeEntry {
    /// Label used in filenames: numeric sizes carry their unit (`4x6in`,
    /// `10x15cm`), named paper sizes keep their name (`A4`).
    pub fn file_label(&self) -> String {
        if self.label.starts_with(|c: char| c.is_ascii_digit()) {
            format!("{}{}", self.label, self.unit.suffix())
        } else {
            self.label.clone()
        }
    }

    pub fn pixel_size(&self, dpi: u32) -> (u32, u32) {
        (
            to_pixels(self.width, self.unit, dpi),
            to_pixels(self.height, self.unit, dpi),
        )
    }

    fn same_size_as(&self, other: &SizeEntry) -> bool {
        self.unit == other.unit && self.width == other.width && self.height == other.height
    }
}

struct SizeSpec {
    label: &'static str,
    width: f64,
    height: f64,
}

const fn size(label: &'static str, width: f64, height: f64) -> SizeSpec {
    SizeSpec {
        label,
        width,
        height,
    }
}

struct RatioSizes {
    /// Master size in inches.
    master: (f64, f64),
    inches: &'static [SizeSpec],
    centimeters: &'static [SizeSpec],
}

static SIZES_2X3: RatioSizes = RatioSizes {
    master: (24.0, 36.0),
    inches: &[
        size("4x6", 4.0, 6.0),
        size("6x9", 6.0, 9.0),
        size("8x12", 8.0, 12.0),
        size("10x15", 10.0, 15.0),
        size("12x18", 12.0, 18.0),
        size("16x24", 16.0, 24.0),
        size("20x30", 20.0, 30.0),
        size("24x36", 24.0, 36.0),
    ],
    centimeters: &[
        size("10x15", 10.0, 15.0),
        size("20x30", 20.0, 30.0),
        size("30x45", 30.0, 45.0),
        size("40x60", 40.0, 60.0),
        size("50x75", 50.0, 75.0),
        size("60x90", 60.0, 90.0),
    ],
};

static SIZES_3X4: RatioSizes = RatioSizes {
    master: (18.0, 24.0),
    inches: &[
        size("6x8", 6.0, 8.0),
        size("9x12", 9.0, 12.0),
        size("12x16", 12.0, 16.0),
        size("15x20", 15.0, 20.0),
        size("18x24", 18.0, 24.0),
    ],
    centimeters: &[
        size("15x20", 15.0, 20.0),
        // Off a true 3:4 by ~2.2%; sold as 3:4 by labs.
        size("22x30", 22.0, 30.0),
        size("30x40", 30.0, 40.0),
        size("38x50", 38.0, 50.0),
        size("45x60", 45.0, 60.0),
    ],
};

static SIZES_4X5: RatioSizes = RatioSizes {
    master: (20.0, 25.0),
    inches: &[
        size("4x5", 4.0, 5.0),
        size("8x10", 8.0, 10.0),
        size("12x15", 12.0, 15.0),
        size("16x20", 16.0, 20.0),
        size("20x25", 20.0, 25.0),
    ],
    centimeters: &[
        size("10x12", 10.0, 12.0),
        size("20x25", 20.0, 25.0),
        size("28x35", 28.0, 35.0),
        size("30x38", 30.0, 38.0),
        size("40x50", 40.0, 50.0),
    ],
};

static SIZES_11X14: RatioSizes = RatioSizes {
    master: (22.0, 28.0),
    inches: &[size("11x14", 11.0, 14.0), size("22x28", 22.0, 28.0)],
    centimeters: &[],
};

// ISO A-series sizes are listed in inches; there is no separate cm table.
static SIZES_ISO: RatioSizes = RatioSizes {
    master: (23.39, 33.11),
    inches: &[
        size("A5", 5.83, 8.27),
        size("A4", 8.27, 11.69),
        size("A3", 11.69, 16.54),
        size("A2", 16.54, 23.39),
        size("A1", 23.39, 33.11),
    ],
    centimeters: &[],
};

static SIZES_5X7: RatioSizes = RatioSizes {
    master: (5.0, 7.0),
    inches: &[size("5x7", 5.0, 7.0)],
    centimeters: &[],
};

/// Convert a physical length to whole pixels, rounding half away from zero.
pub fn to_pixels(value: f64, unit: Unit, dpi: u32) -> u32 {
    (value / unit.inch_factor() * dpi as f64).round() as u32
}

/// Format a physical dimension without trailing zeros: `24`, `23.39`.
fn format_dimension(value: f64) -> String {
    format!("{value}")
}

/// The master entry of a ratio, labelled like `24x36`.
pub fn master_entry(ratio: AspectRatio) -> SizeEntry {
    let (w, h) = ratio.sizes().master;
    SizeEntry {
        label: format!("{}x{}", format_dimension(w), format_dimension(h)),
        width: w,
        height: h,
        unit: Unit::Inch,
        kind: SizeKind::Master,
    }
}

/// Pixel dimensions of a ratio's master print.
pub fn master_pixel_size(ratio: AspectRatio, dpi: u32) -> (u32, u32) {
    master_entry(ratio).pixel_size(dpi)
}

/// Pixel dimensions of the master with the greatest pixel area among `ratios`.
///
/// Ties keep the earlier ratio. An empty set yields `(0, 0)`.
pub fn largest_master_canvas(ratios: &[AspectRatio], dpi: u32) -> (u32, u32) {
    ratios
        .iter()
        .map(|&r| master_pixel_size(r, dpi))
        .fold((0, 0), |best, dims| {
            let area = |(w, h): (u32, u32)| w as u64 * h as u64;
            if area(dims) > area(best) { dims } else { best }
        })
}

/// The ordered sizes produced for a ratio: the master first, then (when
/// requested) the inch ladder followed by the cm ladder.
///
/// Sub entries identical to the master (same unit and dimensions) are skipped
/// since they would render the same file twice.
pub fn size_ladder(ratio: AspectRatio, include_sub_sizes: bool) -> Vec<SizeEntry> {
    let master = master_entry(ratio);
    let mut ladder = vec![master.clone()];
    if !include_sub_sizes {
        return ladder;
    }

    let sizes = ratio.sizes();
    let subs = sizes
        .inches
        .iter()
        .map(|s| (s, Unit::Inch))
        .chain(sizes.centimeters.iter().map(|s| (s, Unit::Centimeter)))
        .map(|(spec, unit)| SizeEntry {
            label: spec.label.to_string(),
            width: spec.width,
            height: spec.height,
            unit,
            kind: SizeKind::Sub,
        })
        .filter(|entry| !entry.same_size_as(&master));
    ladder.extend(subs);
    ladder
}

/// The ratio set of a kit: the fixed five, plus 5x7 on request.
pub fn active_ratios(include_5x7: bool) -> Vec<AspectRatio> {
    let mut ratios = AspectRatio::FIXED.to_vec();
    if include_5x7 {
        ratios.push(AspectRatio::R5x7);
    }
    ratios
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative_deviation(dims: (u32, u32), nominal: f64) -> f64 {
        let actual = dims.0 as f64 / dims.1 as f64;
        (actual - nominal).abs() / nominal
    }

    // =========================================================================
    // Masters
    // =========================================================================

    #[test]
    fn master_pixel_sizes_at_300_dpi() {
        assert_eq!(master_pixel_size(AspectRatio::R2x3, 300), (7200, 10800));
        assert_eq!(master_pixel_size(AspectRatio::R3x4, 300), (5400, 7200));
        assert_eq!(master_pixel_size(AspectRatio::R4x5, 300), (6000, 7500));
        assert_eq!(master_pixel_size(AspectRatio::R11x14, 300), (6600, 8400));
        assert_eq!(master_pixel_size(AspectRatio::Iso, 300), (7017, 9933));
        assert_eq!(master_pixel_size(AspectRatio::R5x7, 300), (1500, 2100));
    }

    #[test]
    fn masters_are_within_two_percent_of_nominal_ratio() {
        for ratio in AspectRatio::ALL {
            let dims = master_pixel_size(ratio, DEFAULT_DPI);
            let deviation = relative_deviation(dims, ratio.nominal());
            assert!(deviation <= 0.02, "{ratio} master off by {deviation}");
        }
    }

    #[test]
    fn master_labels_trim_trailing_zeros() {
        assert_eq!(master_entry(AspectRatio::R2x3).label, "24x36");
        assert_eq!(master_entry(AspectRatio::R2x3).file_label(), "24x36in");
        assert_eq!(master_entry(AspectRatio::Iso).file_label(), "23.39x33.11in");
    }

    // =========================================================================
    // Largest canvas
    // =========================================================================

    #[test]
    fn largest_canvas_of_fixed_set_is_2x3_master() {
        let canvas = largest_master_canvas(&AspectRatio::FIXED, DEFAULT_DPI);
        assert_eq!(canvas, (7200, 10800));
    }

    #[test]
    fn largest_canvas_compares_area_not_edges() {
        // ISO is taller than 11x14 and 4x5, and has the larger area of the three.
        let canvas = largest_master_canvas(
            &[AspectRatio::R4x5, AspectRatio::R11x14, AspectRatio::Iso],
            DEFAULT_DPI,
        );
        assert_eq!(canvas, (7017, 9933));
    }

    #[test]
    fn largest_canvas_single_and_empty() {
        assert_eq!(
            largest_master_canvas(&[AspectRatio::R5x7], DEFAULT_DPI),
            (1500, 2100)
        );
        assert_eq!(largest_master_canvas(&[], DEFAULT_DPI), (0, 0));
    }

    // =========================================================================
    // Ladders
    // =========================================================================

    #[test]
    fn ladder_without_sub_sizes_is_master_only() {
        for ratio in AspectRatio::ALL {
            let ladder = size_ladder(ratio, false);
            assert_eq!(ladder.len(), 1);
            assert_eq!(ladder[0].kind, SizeKind::Master);
        }
    }

    #[test]
    fn ladder_starts_with_master_then_inches_then_cm() {
        let ladder = size_ladder(AspectRatio::R2x3, true);
        assert_eq!(ladder[0].kind, SizeKind::Master);
        let labels: Vec<String> = ladder.iter().skip(1).map(|e| e.file_label()).collect();
        assert_eq!(
            labels,
            vec![
                "4x6in", "6x9in", "8x12in", "10x15in", "12x18in", "16x24in", "20x30in",
                "10x15cm", "20x30cm", "30x45cm", "40x60cm", "50x75cm", "60x90cm",
            ]
        );
    }

    #[test]
    fn ladder_drops_sub_entries_equal_to_master() {
        let four_five = size_ladder(AspectRatio::R4x5, true);
        let labels: Vec<String> = four_five.iter().map(|e| e.file_label()).collect();
        assert_eq!(labels.iter().filter(|l| *l == "20x25in").count(), 1);
        // Same numbers, different unit: a distinct print.
        assert!(labels.contains(&"20x25cm".to_string()));

        let iso: Vec<String> = size_ladder(AspectRatio::Iso, true)
            .iter()
            .map(|e| e.file_label())
            .collect();
        assert_eq!(iso, vec!["23.39x33.11in", "A5", "A4", "A3", "A2"]);

        assert_eq!(size_ladder(AspectRatio::R5x7, true).len(), 1);
    }

    #[test]
    fn ladder_sizes_per_ratio() {
        let counts: Vec<usize> = AspectRatio::ALL
            .iter()
            .map(|&r| size_ladder(r, true).len())
            .collect();
        assert_eq!(counts, vec![14, 10, 10, 2, 5, 1]);
    }

    #[test]
    fn cm_sizes_convert_through_inches() {
        let ladder = size_ladder(AspectRatio::R2x3, true);
        let cm = ladder.iter().find(|e| e.file_label() == "10x15cm").unwrap();
        assert_eq!(cm.pixel_size(300), (1181, 1772));
        let inch = ladder.iter().find(|e| e.file_label() == "4x6in").unwrap();
        assert_eq!(inch.pixel_size(300), (1200, 1800));
    }

    #[test]
    fn three_by_four_22x30cm_is_the_documented_off_ratio_size() {
        let ladder = size_ladder(AspectRatio::R3x4, true);
        let entry = ladder.iter().find(|e| e.file_label() == "22x30cm").unwrap();
        let dims = entry.pixel_size(300);
        assert_eq!(dims, (2598, 3543));
        let deviation = relative_deviation(dims, AspectRatio::R3x4.nominal());
        assert!(deviation > 0.02 && deviation < 0.025, "got {deviation}");
    }

    #[test]
    fn inch_sub_sizes_match_their_ratio() {
        for ratio in AspectRatio::ALL {
            for entry in size_ladder(ratio, true)
                .iter()
                .filter(|e| e.unit == Unit::Inch)
            {
                let deviation = relative_deviation(entry.pixel_size(300), ratio.nominal());
                assert!(deviation <= 0.02, "{ratio} {} off by {deviation}", entry.label);
            }
        }
    }

    // =========================================================================
    // Conversions and parsing
    // =========================================================================

    #[test]
    fn to_pixels_rounds_half_away_from_zero() {
        assert_eq!(to_pixels(0.5, Unit::Inch, 1), 1);
        assert_eq!(to_pixels(1.5, Unit::Inch, 1), 2);
        assert_eq!(to_pixels(2.54, Unit::Centimeter, 300), 300);
    }

    #[test]
    fn active_ratio_sets() {
        assert_eq!(active_ratios(false), AspectRatio::FIXED.to_vec());
        let with_5x7 = active_ratios(true);
        assert_eq!(with_5x7.len(), 6);
        assert_eq!(with_5x7.last(), Some(&AspectRatio::R5x7));
    }

    #[test]
    fn parse_ratio_names() {
        assert_eq!("11x14".parse::<AspectRatio>(), Ok(AspectRatio::R11x14));
        assert_eq!("iso".parse::<AspectRatio>(), Ok(AspectRatio::Iso));
        assert!("16x9".parse::<AspectRatio>().is_err());
    }
}
