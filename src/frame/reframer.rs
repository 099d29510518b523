//! Smart Reframer: face/saliency-driven crop tracking with temporal
//! smoothing. Subject detection itself (faces, saliency maps) is the
//! external collaborator; this module consumes its output
//! (a per-frame subject list) and turns it into a stable crop region.

use crate::error::{ExportError, ExportResult};
use crate::frame::processor::CropRegion;

/// One detected subject for the current frame, normalized to `[0,1]^2`.
#[derive(Clone, Copy, Debug)]
pub struct Subject {
    pub center: (f64, f64),
    pub bounds: (f64, f64, f64, f64),
    pub confidence: f64,
}

/// Per-stream smoothing state, carried across frames. Kept separate from
/// `SmartReframer` (the stateless config) so independent reframe streams
/// (e.g. one per output aspect ratio) can each own their own state.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReframeState {
    pub previous: Option<CropRegion>,
}

#[derive(Clone, Copy, Debug)]
pub struct SmartReframer {
    pub smoothing_factor: f64,
    pub high_confidence_threshold: f64,
}

impl SmartReframer {
    pub fn new(smoothing_factor: f64) -> ExportResult<Self> {
        if !(0.0..=1.0).contains(&smoothing_factor) {
            return Err(ExportError::validation("smoothing_factor must be in [0, 1]"));
        }
        Ok(Self {
            smoothing_factor,
            high_confidence_threshold: 0.5,
        })
    }

    fn center_of_interest(&self, subjects: &[Subject]) -> (f64, f64) {
        let total_confidence: f64 = subjects.iter().map(|s| s.confidence).sum();
        if subjects.is_empty() || total_confidence <= 0.0 {
            return (0.5, 0.5);
        }
        let (mut cx, mut cy) = (0.0, 0.0);
        for s in subjects {
            cx += s.center.0 * s.confidence;
            cy += s.center.1 * s.confidence;
        }
        (cx / total_confidence, cy / total_confidence)
    }

    fn raw_crop_size(source_width: u32, source_height: u32, target_width: u32, target_height: u32) -> (f64, f64) {
        let source_aspect = source_width as f64 / source_height as f64;
        let target_aspect = target_width as f64 / target_height as f64;
        if source_aspect > target_aspect {
            (target_aspect / source_aspect, 1.0)
        } else {
            (1.0, source_aspect / target_aspect)
        }
    }

    /// Compute this frame's crop region, updating `state` for the next call.
    pub fn compute(
        &self,
        state: &mut ReframeState,
        subjects: &[Subject],
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> ExportResult<CropRegion> {
        if source_width == 0 || source_height == 0 || target_width == 0 || target_height == 0 {
            return Err(ExportError::InvalidDimensions(
                "reframer requires non-zero source/target dimensions".into(),
            ));
        }

        let (crop_w, crop_h) = Self::raw_crop_size(source_width, source_height, target_width, target_height);
        let interest = self.center_of_interest(subjects);

        let clamp_range_x = (0.0, (1.0 - crop_w).max(0.0));
        let clamp_range_y = (0.0, (1.0 - crop_h).max(0.0));

        let mut x = (interest.0 - crop_w / 2.0).clamp(clamp_range_x.0, clamp_range_x.1);
        let mut y = (interest.1 - crop_h / 2.0).clamp(clamp_range_y.0, clamp_range_y.1);

        let high_confidence: Vec<&Subject> = subjects
            .iter()
            .filter(|s| s.confidence >= self.high_confidence_threshold)
            .collect();

        if !high_confidence.is_empty() {
            let all_fit = high_confidence.iter().all(|s| {
                let (bx, by, bw, bh) = s.bounds;
                bx >= x && by >= y && bx + bw <= x + crop_w && by + bh <= y + crop_h
            });
            if all_fit {
                let min_x = high_confidence
                    .iter()
                    .map(|s| s.bounds.0)
                    .fold(f64::INFINITY, f64::min);
                let max_x = high_confidence
                    .iter()
                    .map(|s| s.bounds.0 + s.bounds.2)
                    .fold(f64::NEG_INFINITY, f64::max);
                let min_y = high_confidence
                    .iter()
                    .map(|s| s.bounds.1)
                    .fold(f64::INFINITY, f64::min);
                let max_y = high_confidence
                    .iter()
                    .map(|s| s.bounds.1 + s.bounds.3)
                    .fold(f64::NEG_INFINITY, f64::max);
                let mid_x = (min_x + max_x) / 2.0;
                let mid_y = (min_y + max_y) / 2.0;
                x = (mid_x - crop_w / 2.0).clamp(clamp_range_x.0, clamp_range_x.1);
                y = (mid_y - crop_h / 2.0).clamp(clamp_range_y.0, clamp_range_y.1);
            }
        }

        let raw = CropRegion { x, y, w: crop_w, h: crop_h };

        let smoothed = match state.previous {
            None => raw,
            Some(prev) => {
                let a = self.smoothing_factor;
                CropRegion {
                    x: a * prev.x + (1.0 - a) * raw.x,
                    y: a * prev.y + (1.0 - a) * raw.y,
                    w: a * prev.w + (1.0 - a) * raw.w,
                    h: a * prev.h + (1.0 - a) * raw.h,
                }
            }
        };

        state.previous = Some(smoothed);
        Ok(smoothed)
    }
}
