//! Turning a processing request into a work plan and unit budget.

use std::path::Path;

use reelcut_media::loops::loop_count;
use reelcut_media::shorts::short_count;
use reelcut_media::stills::STILL_COUNT;
use reelcut_models::{
    output_base_name, parse_time_ranges, AspectRatio, ProcessRequest, SourceVideo, WorkPlan,
};

use crate::error::{WorkerError, WorkerResult};

/// Expected units per category for one plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitCounts {
    pub clips: usize,
    pub loops: usize,
    pub stills: usize,
    pub shorts: usize,
}

impl UnitCounts {
    pub fn for_plan(plan: &WorkPlan, duration: f64) -> Self {
        Self {
            clips: plan.clip_units(),
            loops: if plan.export_loops { loop_count(duration) } else { 0 },
            stills: if plan.export_stills { STILL_COUNT } else { 0 },
            shorts: if plan.export_shorts { short_count(duration) } else { 0 },
        }
    }

    pub fn total(&self) -> usize {
        self.clips + self.loops + self.stills + self.shorts
    }
}

/// A validated plan plus the advisory warnings raised while parsing it.
#[derive(Debug, Clone)]
pub struct PlannedWork {
    pub plan: WorkPlan,
    pub counts: UnitCounts,
    pub warnings: Vec<String>,
}

/// Validate `request` against a source of `duration` seconds.
///
/// Any malformed cut line rejects the whole request. Clips default to 16:9
/// when no aspect ratio was selected.
pub fn build_plan(video: &SourceVideo, request: &ProcessRequest, duration: f64) -> WorkerResult<PlannedWork> {
    let text = request.time_range_text.as_deref().unwrap_or("");
    let parsed = parse_time_ranges(text, Some(duration));
    if parsed.has_errors() {
        return Err(WorkerError::invalid_plan(parsed.errors.join("; ")));
    }

    // First occurrence wins, so clip numbering follows the request order
    let mut aspect_ratios: Vec<AspectRatio> = Vec::with_capacity(request.aspect_ratios.len());
    for ratio in &request.aspect_ratios {
        if !aspect_ratios.contains(ratio) {
            aspect_ratios.push(*ratio);
        }
    }
    if aspect_ratios.is_empty() {
        aspect_ratios.push(AspectRatio::Landscape);
    }

    let plan = WorkPlan {
        video_id: video.id.clone(),
        output_name: base_name(&request.output_name, &video.original_name),
        ranges: parsed.valid,
        aspect_ratios,
        quality: request.quality,
        fade: request.fade(),
        export_loops: request.generate_loop,
        export_stills: request.generate_stills,
        export_shorts: request.generate_shorts,
    };

    if plan.ranges.is_empty() && !plan.has_exports() {
        return Err(WorkerError::invalid_plan(
            "Provide at least one time range or enable an export",
        ));
    }

    let counts = UnitCounts::for_plan(&plan, duration);
    if counts.total() == 0 {
        return Err(WorkerError::invalid_plan(format!(
            "Video is too short ({:.1}s) for the requested exports",
            duration
        )));
    }

    Ok(PlannedWork {
        plan,
        counts,
        warnings: parsed.warnings,
    })
}

fn base_name(requested: &str, original_name: &str) -> String {
    if !requested.trim().is_empty() {
        return output_base_name(requested);
    }
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    output_base_name(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use reelcut_models::{Quality, VideoId};

    fn video() -> SourceVideo {
        SourceVideo::new(VideoId::from("v"), "v.mp4", "Beach Trip.mp4", PathBuf::from("/v.mp4"), 1)
    }

    fn request(text: &str) -> ProcessRequest {
        ProcessRequest {
            video_id: VideoId::from("v"),
            time_range_text: Some(text.to_string()),
            output_name: String::new(),
            quality: Quality::Balanced,
            video_fade: false,
            audio_fade: false,
            fade_duration: None,
            aspect_ratios: vec![AspectRatio::Landscape, AspectRatio::Vertical],
            generate_loop: false,
            generate_stills: true,
            generate_shorts: false,
        }
    }

    #[test]
    fn test_three_ranges_two_ratios_plus_stills() {
        let work = build_plan(&video(), &request("0:10-0:20\n0:30-0:40\n1:00-1:15"), 120.0).unwrap();
        assert_eq!(work.counts.clips, 6);
        assert_eq!(work.counts.stills, STILL_COUNT);
        assert_eq!(work.counts.total(), 6 + STILL_COUNT);
        assert_eq!(work.plan.output_name, "beach_trip");
        assert_eq!(work.warnings.len(), 3);
    }

    #[test]
    fn test_repeated_ratios_collapse_to_one_unit_each() {
        let mut req = request("0:10-0:20");
        req.generate_stills = false;
        req.aspect_ratios = vec![AspectRatio::Vertical, AspectRatio::Landscape, AspectRatio::Vertical];

        let work = build_plan(&video(), &req, 120.0).unwrap();
        assert_eq!(work.plan.aspect_ratios, vec![AspectRatio::Vertical, AspectRatio::Landscape]);
        assert_eq!(work.counts.clips, 2);
        assert_eq!(work.counts.total(), 2);
    }

    #[test]
    fn test_bad_line_rejects_request() {
        let err = build_plan(&video(), &request("0:10-0:20\n0:50-0:40"), 120.0).unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().contains("Clip 2"));
    }

    #[test]
    fn test_nothing_requested() {
        let mut req = request("");
        req.generate_stills = false;
        assert!(matches!(build_plan(&video(), &req, 120.0), Err(WorkerError::InvalidPlan(_))));
    }

    #[test]
    fn test_exports_only_with_default_ratio() {
        let mut req = request("");
        req.aspect_ratios.clear();
        req.generate_loop = true;
        req.generate_shorts = true;
        req.output_name = "My Reel!".into();

        let work = build_plan(&video(), &req, 30.0).unwrap();
        assert_eq!(work.plan.aspect_ratios, vec![AspectRatio::Landscape]);
        assert_eq!(work.counts, UnitCounts { clips: 0, loops: 5, stills: STILL_COUNT, shorts: 5 });
        assert_eq!(work.plan.output_name, "my_reel");
    }

    #[test]
    fn test_too_short_for_loops_only() {
        let mut req = request("");
        req.generate_stills = false;
        req.generate_loop = true;
        assert!(matches!(build_plan(&video(), &req, 3.0), Err(WorkerError::InvalidPlan(_))));
    }
}
