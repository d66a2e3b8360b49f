//! Time ranges and the free-text cut list parser.
//!
//! One candidate range per line. The two endpoints may be separated by a dash,
//! en-dash, em-dash, comma or whitespace, and the components of each endpoint
//! by a colon, semicolon or period (`0:16-0:35`, `1;02;03 – 1;02;40`).

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::timestamp::{format_compact, format_seconds, parse_timestamp};

/// Forward shift applied at encode time to starts that land on a whole second.
pub const BOUNDARY_NUDGE_SECS: f64 = 0.1;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(\d{1,2}(?:[:;.]\d{1,2}){1,2})\s*(?:[-\x{2013}\x{2014},]|\s)\s*(\d{1,2}(?:[:;.]\d{1,2}){1,2})\s*$",
    )
    .expect("time range pattern is valid")
});

/// A validated cut window, stored as normalized `HH:MM:SS` strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    /// Build a range from second offsets.
    pub fn from_seconds(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start: format_seconds(start_secs),
            end: format_seconds(end_secs),
        }
    }

    pub fn start_secs(&self) -> f64 {
        parse_timestamp(&self.start).unwrap_or(0.0)
    }

    pub fn end_secs(&self) -> f64 {
        parse_timestamp(&self.end).unwrap_or(0.0)
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end_secs() - self.start_secs()).max(0.0)
    }

    /// Length of the temporal intersection with `other`, zero when disjoint.
    pub fn overlap_secs(&self, other: &TimeRange) -> f64 {
        let start = self.start_secs().max(other.start_secs());
        let end = self.end_secs().min(other.end_secs());
        (end - start).max(0.0)
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.overlap_secs(other) > 0.0
    }
}

/// Outcome of parsing a free-text cut list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRangeParseResult {
    /// Accepted ranges in input order
    pub valid: Vec<TimeRange>,
    /// One entry per rejected candidate
    pub errors: Vec<String>,
    /// Advisory notes (overlaps, risky boundaries)
    pub warnings: Vec<String>,
}

impl TimeRangeParseResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parse a single endpoint such as `0:16`, `1;02;03` or `12.30`.
///
/// Two components are minutes and seconds, three are hours, minutes and
/// seconds. Returns `None` when a minute or second component is 60 or more.
fn parse_endpoint(raw: &str) -> Option<u32> {
    let parts: Vec<u32> = raw
        .split([':', ';', '.'])
        .map(|p| p.parse().ok())
        .collect::<Option<Vec<u32>>>()?;

    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };

    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    Some(hours * 3600 + minutes * 60 + seconds)
}

/// Parse and validate a cut list.
///
/// Blank lines are skipped; candidates are numbered from 1 in the order the
/// non-blank lines appear. For each candidate the first failing check wins:
/// malformed text, then `start >= end`, then `end` past `known_duration`.
/// Overlaps and risky start positions only produce warnings.
pub fn parse_time_ranges(text: &str, known_duration: Option<f64>) -> TimeRangeParseResult {
    let mut result = TimeRangeParseResult::default();
    let mut accepted: Vec<(usize, TimeRange)> = Vec::new();

    let candidates = text.lines().map(str::trim).filter(|l| !l.is_empty());

    for (idx, line) in candidates.enumerate() {
        let clip_no = idx + 1;

        let Some((start, end)) = LINE_PATTERN.captures(line).and_then(|caps| {
            let start = parse_endpoint(caps.get(1)?.as_str())?;
            let end = parse_endpoint(caps.get(2)?.as_str())?;
            Some((start, end))
        }) else {
            result.errors.push(format!(
                "Clip {}: invalid format \"{}\" (expected MM:SS-MM:SS or H:MM:SS-H:MM:SS)",
                clip_no, line
            ));
            continue;
        };

        let range = TimeRange::from_seconds(start as f64, end as f64);

        if start >= end {
            result.errors.push(format!(
                "Clip {}: start time {} must be before end time {}",
                clip_no, range.start, range.end
            ));
            continue;
        }

        if let Some(duration) = known_duration {
            if end as f64 > duration {
                result.errors.push(format!(
                    "Clip {}: end time {} exceeds video duration {}",
                    clip_no,
                    range.end,
                    format_seconds(duration.floor())
                ));
                continue;
            }
        }

        for (prev_no, prev) in &accepted {
            let overlap = range.overlap_secs(prev);
            if overlap > 0.0 {
                result.warnings.push(format!(
                    "Clips {} and {} overlap by {:.1} seconds",
                    prev_no, clip_no, overlap
                ));
            }
        }

        result
            .warnings
            .extend(boundary_warnings(clip_no, start as f64, &range.start));

        accepted.push((clip_no, range.clone()));
        result.valid.push(range);
    }

    result
}

/// Advisory warnings about where a clip starts. All of them may apply at once.
fn boundary_warnings(clip_no: usize, start: f64, start_label: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    if start > 0.0 && start.fract() == 0.0 {
        warnings.push(format!(
            "Clip {}: start {} lands on an exact second and will be nudged forward {:.1}s to avoid a black first frame",
            clip_no, start_label, BOUNDARY_NUDGE_SECS
        ));
    }
    if start < 1.0 {
        warnings.push(format!(
            "Clip {}: starting within the first second risks a fade-in or black frame",
            clip_no
        ));
    }
    if start == 0.0 {
        warnings.push(format!(
            "Clip {}: starting at 00:00:00 is not recommended; start at 0:01 or later",
            clip_no
        ));
    }

    warnings
}

/// Render ranges back into editable text, one `M:SS-M:SS` line per range.
pub fn render_time_ranges(ranges: &[TimeRange]) -> String {
    ranges
        .iter()
        .map(|r| {
            format!(
                "{}-{}",
                format_compact(r.start_secs() as u32),
                format_compact(r.end_secs() as u32)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_two_ranges_with_nudge_warnings() {
        let result = parse_time_ranges("0:16-0:35\n0:44-1:01", None);

        assert_eq!(
            result.valid,
            vec![
                TimeRange::from_seconds(16.0, 35.0),
                TimeRange::from_seconds(44.0, 61.0),
            ]
        );
        assert_eq!(result.valid[0].start, "00:00:16");
        assert_eq!(result.valid[1].end, "00:01:01");
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].starts_with("Clip 1:"));
        assert!(result.warnings[1].starts_with("Clip 2:"));
    }

    #[test]
    fn test_end_past_duration_is_rejected() {
        let result = parse_time_ranges("0:20-0:40", Some(30.0));

        assert!(result.valid.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("exceeds video duration"));
    }

    #[test]
    fn test_overlap_warning_reports_seconds() {
        let result = parse_time_ranges("00:00:10-00:00:20\n00:00:15-00:00:25", None);

        assert_eq!(result.valid.len(), 2);
        let overlap: Vec<_> = result.warnings.iter().filter(|w| w.contains("overlap")).collect();
        assert_eq!(overlap.len(), 1);
        assert_eq!(overlap[0], "Clips 1 and 2 overlap by 5.0 seconds");
    }

    #[test]
    fn test_first_failing_check_wins() {
        // Reversed and past the end: only the ordering error is reported.
        let result = parse_time_ranges("0:50-0:40", Some(30.0));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("must be before"));
    }

    #[test]
    fn test_malformed_and_out_of_range_components() {
        let result = parse_time_ranges("hello\n0:75-1:00\n1:00", None);
        assert!(result.valid.is_empty());
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().all(|e| e.contains("invalid format")));
    }

    #[test]
    fn test_alternate_separators() {
        let text = "0;16 \u{2013} 0;35\n1.02.03,1.02.40\n2:00 2:30";
        let result = parse_time_ranges(text, None);

        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.valid[0], TimeRange::from_seconds(16.0, 35.0));
        assert_eq!(result.valid[1].start, "01:02:03");
        assert_eq!(result.valid[1].end, "01:02:40");
        assert_eq!(result.valid[2], TimeRange::from_seconds(120.0, 150.0));
    }

    #[test]
    fn test_zero_start_collects_all_boundary_warnings() {
        let result = parse_time_ranges("0:00-0:10", None);
        assert_eq!(result.valid.len(), 1);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("first second")));
        assert!(result.warnings.iter().any(|w| w.contains("not recommended")));
    }

    #[test]
    fn test_blank_lines_do_not_shift_numbering() {
        let result = parse_time_ranges("\n0:10-0:20\n\n   \nbad\n", None);
        assert_eq!(result.valid.len(), 1);
        assert!(result.errors[0].starts_with("Clip 2:"));
    }

    #[test]
    fn test_render_round_trip() {
        let ranges = vec![
            TimeRange::from_seconds(16.0, 35.0),
            TimeRange::from_seconds(3600.0, 3630.0),
        ];
        let text = render_time_ranges(&ranges);
        assert_eq!(text, "0:16-0:35\n1:00:00-1:00:30");
        assert_eq!(parse_time_ranges(&text, None).valid, ranges);
    }
}
