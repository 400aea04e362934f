//! The full per-request plan, computed before any pixel is touched.
//!
//! A [`KitPlan`] fixes the active ratios, the shared canvas size, and every
//! archive entry (path and pixel target) the request will produce. The
//! pipeline's archive writer checks its entry count against the plan before
//! finalizing, so a missing crop can never produce a silently short archive.

use crate::archive::entry_path;
use crate::catalogue::{self, AspectRatio, SizeEntry};
use crate::imaging::Dimensions;
use serde::Serialize;

/// Caller-selected options of one kit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KitRequest {
    /// Add every sub-size of each ratio's ladder, not just the master.
    pub every_size: bool,
    pub include_5x7: bool,
}

/// One output file of the kit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSize {
    pub entry: SizeEntry,
    #[serde(serialize_with = "serialize_dims")]
    pub pixels: Dimensions,
    pub path: String,
}

/// The master and sub-sizes of one aspect ratio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioPlan {
    pub ratio: AspectRatio,
    pub master: PlannedSize,
    pub subs: Vec<PlannedSize>,
}

impl RatioPlan {
    pub fn entry_count(&self) -> usize {
        1 + self.subs.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KitPlan {
    pub basename: String,
    pub dpi: u32,
    pub request: KitRequest,
    /// Largest master across the active ratios; the upscale target.
    #[serde(serialize_with = "serialize_dims")]
    pub canvas: Dimensions,
    pub ratios: Vec<RatioPlan>,
}

impl KitPlan {
    pub fn new(basename: &str, request: KitRequest, dpi: u32) -> Self {
        let active = catalogue::active_ratios(request.include_5x7);
        let canvas = catalogue::largest_master_canvas(&active, dpi).into();

        let planned = |ratio: AspectRatio, entry: SizeEntry| PlannedSize {
            pixels: entry.pixel_size(dpi).into(),
            path: entry_path(ratio.as_str(), basename, &entry.file_label(), dpi),
            entry,
        };

        let ratios = active
            .into_iter()
            .map(|ratio| {
                let mut ladder = catalogue::size_ladder(ratio, request.every_size).into_iter();
                let master = ladder
                    .next()
                    .unwrap_or_else(|| catalogue::master_entry(ratio));
                RatioPlan {
                    ratio,
                    master: planned(ratio, master),
                    subs: ladder.map(|entry| planned(ratio, entry)).collect(),
                }
            })
            .collect();

        Self {
            basename: basename.to_string(),
            dpi,
            request,
            canvas,
            ratios,
        }
    }

    /// Image entries in the archive, not counting the manifest.
    pub fn image_count(&self) -> usize {
        self.ratios.iter().map(RatioPlan::entry_count).sum()
    }

    /// Every planned size, masters and subs, in ratio order.
    pub fn sizes(&self) -> impl Iterator<Item = &PlannedSize> {
        self.ratios
            .iter()
            .flat_map(|r| std::iter::once(&r.master).chain(r.subs.iter()))
    }

    /// Pixel size of each active ratio's master.
    pub fn master_pixels(&self) -> Vec<Dimensions> {
        self.ratios.iter().map(|r| r.master.pixels).collect()
    }
}

fn serialize_dims<S: serde::Serializer>(dims: &Dimensions, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;
    let mut st = s.serialize_struct("Dimensions", 2)?;
    st.serialize_field("width", &dims.width)?;
    st.serialize_field("height", &dims.height)?;
    st.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(every_size: bool, include_5x7: bool) -> KitRequest {
        KitRequest {
            every_size,
            include_5x7,
        }
    }

    #[test]
    fn masters_only_plan() {
        let plan = KitPlan::new("photo", request(false, false), 300);
        assert_eq!(plan.ratios.len(), 5);
        assert_eq!(plan.image_count(), 5);
        assert_eq!(plan.canvas, Dimensions::new(7200, 10800));

        let first = &plan.ratios[0];
        assert_eq!(first.ratio, AspectRatio::R2x3);
        assert_eq!(first.master.path, "2x3/photo_2x3_24x36in_300dpi.jpg");
        assert_eq!(first.master.pixels, Dimensions::new(7200, 10800));
        assert!(first.subs.is_empty());
    }

    #[test]
    fn every_size_with_5x7_plan() {
        let plan = KitPlan::new("photo", request(true, true), 300);
        assert_eq!(plan.ratios.len(), 6);
        assert_eq!(plan.image_count(), 42);
        // Canvas is still the 2x3 master; 5x7 never wins on area.
        assert_eq!(plan.canvas, Dimensions::new(7200, 10800));
    }

    #[test]
    fn paths_are_unique() {
        let plan = KitPlan::new("photo", request(true, true), 300);
        let mut paths: Vec<&str> = plan.sizes().map(|s| s.path.as_str()).collect();
        let total = paths.len();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    #[test]
    fn every_size_fits_inside_the_canvas_ratio_master() {
        let plan = KitPlan::new("p", request(true, true), 300);
        for ratio in &plan.ratios {
            for sub in &ratio.subs {
                assert!(
                    plan.canvas.contains(sub.pixels),
                    "{} larger than canvas",
                    sub.path
                );
            }
        }
    }

    #[test]
    fn master_pixels_follow_ratio_order() {
        let plan = KitPlan::new("p", request(false, false), 10);
        assert_eq!(
            plan.master_pixels(),
            vec![
                Dimensions::new(240, 360),
                Dimensions::new(180, 240),
                Dimensions::new(200, 250),
                Dimensions::new(220, 280),
                Dimensions::new(234, 331),
            ]
        );
    }

    #[test]
    fn dpi_flows_into_paths_and_pixels() {
        let plan = KitPlan::new("x", request(false, false), 30);
        assert_eq!(plan.canvas, Dimensions::new(720, 1080));
        assert_eq!(plan.ratios[0].master.path, "2x3/x_2x3_24x36in_30dpi.jpg");
    }

    #[test]
    fn plan_serializes_for_json_listing() {
        let plan = KitPlan::new("x", request(false, false), 300);
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["canvas"]["width"], 7200);
        assert_eq!(json["ratios"][0]["ratio"], "2x3");
        assert_eq!(json["ratios"][0]["master"]["pixels"]["height"], 10800);
    }
}
