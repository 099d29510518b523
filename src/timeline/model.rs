//! Timeline data model: clips, tracks, transitions and the timeline they
//! compose into. Validated the way the teacher validates its `Composition`:
//! construction-time checks plus a `validate()` pass over the deserialized
//! form, producing the taxonomy's specific error variants rather than a
//! generic message.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::foundation::{RationalTime, TimeRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    Active,
    Muted,
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Dissolve,
    Wipe,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    pub duration: RationalTime,
}

impl Transition {
    pub fn validate(&self) -> ExportResult<()> {
        if self.duration.value < 0 {
            return Err(ExportError::invalid_transition_duration(format!(
                "transition '{}' has negative duration",
                self.id
            )));
        }
        Ok(())
    }
}

/// A reference to a registered render-graph effect attached to a clip, plus
/// the input port it feeds. Used only by the Export Coordinator's feature
/// preflight (§4.10) -- the graph builder itself does not consult this list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectRef {
    pub effect_id: String,
    #[serde(default)]
    pub input_port: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub name: String,
    pub asset_id: String,
    pub range: TimeRange,
    pub source_range: TimeRange,
    #[serde(default = "default_status")]
    pub status: ClipStatus,
    #[serde(default)]
    pub out_transition: Option<Transition>,
    #[serde(default)]
    pub effects: Vec<EffectRef>,
}

fn default_status() -> ClipStatus {
    ClipStatus::Active
}

impl Clip {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        asset_id: impl Into<String>,
        range: TimeRange,
        source_range: TimeRange,
    ) -> ExportResult<Self> {
        let clip = Self {
            id: id.into(),
            name: name.into(),
            asset_id: asset_id.into(),
            range,
            source_range,
            status: ClipStatus::Active,
            out_transition: None,
            effects: Vec::new(),
        };
        clip.validate()?;
        Ok(clip)
    }

    pub fn validate(&self) -> ExportResult<()> {
        if !self.range.duration.eq_exact(self.source_range.duration) {
            return Err(ExportError::InvalidDuration);
        }
        if let Some(t) = &self.out_transition {
            t.validate()?;
        }
        Ok(())
    }

    pub fn move_to(&mut self, new_start: RationalTime) {
        self.range = TimeRange {
            start: new_start,
            duration: self.range.duration,
        };
    }

    /// Shifts both `range` and `source_range` forward by `delta`, shortening
    /// both by the same amount. Rejects when `delta >= range.duration`.
    pub fn trim_start(&mut self, delta: RationalTime) -> ExportResult<()> {
        if delta.ge(self.range.duration) {
            return Err(ExportError::validation(
                "trim_start delta must be less than range.duration",
            ));
        }
        let new_range_duration = self.range.duration.sub(delta);
        self.range = TimeRange {
            start: self.range.start.add(delta),
            duration: new_range_duration,
        };
        self.source_range = TimeRange {
            start: self.source_range.start.add(delta),
            duration: new_range_duration,
        };
        self.validate()
    }

    /// Shortens both `range` and `source_range` by `delta` from the end.
    pub fn trim_end(&mut self, delta: RationalTime) -> ExportResult<()> {
        if delta.ge(self.range.duration) {
            return Err(ExportError::validation(
                "trim_end delta must be less than range.duration",
            ));
        }
        let new_duration = self.range.duration.sub(delta);
        self.range = TimeRange {
            start: self.range.start,
            duration: new_duration,
        };
        self.source_range = TimeRange {
            start: self.source_range.start,
            duration: new_duration,
        };
        self.validate()
    }

    /// Shifts only `source_range`. Callers may produce a negative
    /// `source_range.start`; the renderer is responsible for tolerating it
    /// (clamp-to-zero, see DESIGN.md's Open Question decision).
    pub fn slip(&mut self, delta: RationalTime) {
        self.source_range = TimeRange {
            start: self.source_range.start.add(delta),
            duration: self.source_range.duration,
        };
    }

    /// `source_range.start + (t - range.start)` if `t` is within `range`.
    pub fn map_time(&self, t: RationalTime) -> Option<RationalTime> {
        if self.range.contains(t) {
            Some(self.source_range.start.add(t.sub(self.range.start)))
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub kind: TrackKind,
    pub clips: Vec<Clip>,
}

impl Track {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            clips: Vec::new(),
        }
    }

    /// Validates the model-level non-overlap invariant: consecutive clips,
    /// ordered by `range.start`, must satisfy `A.range.end <= B.range.start`.
    /// Transitions create temporary overlap only during resolution, never in
    /// the stored model.
    pub fn validate(&self) -> ExportResult<()> {
        for clip in &self.clips {
            clip.validate()?;
        }
        let mut sorted: Vec<&Clip> = self.clips.iter().collect();
        sorted.sort_by(|a, b| a.range.start.cmp_exact(b.range.start));
        for pair in sorted.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.range.end().gt(b.range.start) {
                return Err(ExportError::validation(format!(
                    "track '{}': clip '{}' overlaps clip '{}'",
                    self.id, a.id, b.id
                )));
            }
        }
        Ok(())
    }

    pub fn sorted_clips(&self) -> Vec<&Clip> {
        let mut sorted: Vec<&Clip> = self.clips.iter().collect();
        sorted.sort_by(|a, b| a.range.start.cmp_exact(b.range.start));
        sorted
    }

    pub fn end(&self) -> RationalTime {
        self.clips
            .iter()
            .map(|c| c.range.end())
            .fold(RationalTime::zero(), |acc, e| if e.gt(acc) { e } else { acc })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Timeline {
    pub id: String,
    pub name: String,
    pub tracks: Vec<Track>,
}

impl Timeline {
    pub fn validate(&self) -> ExportResult<()> {
        for track in &self.tracks {
            track.validate()?;
        }
        Ok(())
    }

    pub fn duration(&self) -> RationalTime {
        self.tracks
            .iter()
            .map(Track::end)
            .fold(RationalTime::zero(), |acc, e| if e.gt(acc) { e } else { acc })
    }

    /// All clips, across all tracks, whose `range` contains `t`.
    pub fn active_clips_at(&self, t: RationalTime) -> Vec<&Clip> {
        self.tracks
            .iter()
            .flat_map(|track| track.clips.iter())
            .filter(|clip| clip.range.contains(t))
            .collect()
    }

    pub fn has_audio_tracks(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt(n: i64, d: i32) -> RationalTime {
        RationalTime::new(n, d).unwrap()
    }

    fn range(start: i64, dur: i64) -> TimeRange {
        TimeRange::new(rt(start, 1), rt(dur, 1)).unwrap()
    }

    #[test]
    fn clip_construction_rejects_mismatched_durations() {
        let bad = Clip {
            id: "c1".into(),
            name: "c1".into(),
            asset_id: "a1".into(),
            range: range(0, 2),
            source_range: range(0, 3),
            status: ClipStatus::Active,
            out_transition: None,
            effects: Vec::new(),
        };
        assert!(matches!(bad.validate(), Err(ExportError::InvalidDuration)));
    }

    #[test]
    fn trim_start_preserves_duration_invariant() {
        let mut clip = Clip::new("c1", "c1", "a1", range(0, 10), range(0, 10)).unwrap();
        clip.trim_start(rt(3, 1)).unwrap();
        assert!(clip.range.duration.eq_exact(rt(7, 1)));
        assert!(clip.source_range.duration.eq_exact(rt(7, 1)));
        assert!(clip.range.start.eq_exact(rt(3, 1)));
    }

    #[test]
    fn trim_start_rejects_delta_past_duration() {
        let mut clip = Clip::new("c1", "c1", "a1", range(0, 10), range(0, 10)).unwrap();
        assert!(clip.trim_start(rt(10, 1)).is_err());
    }

    #[test]
    fn slip_only_moves_source_range_and_may_go_negative() {
        let mut clip = Clip::new("c1", "c1", "a1", range(5, 10), range(5, 10)).unwrap();
        clip.slip(rt(-8, 1));
        assert!(clip.source_range.start.eq_exact(rt(-3, 1)));
        assert!(clip.range.start.eq_exact(rt(5, 1)));
    }

    #[test]
    fn map_time_returns_none_outside_range() {
        let clip = Clip::new("c1", "c1", "a1", range(10, 5), range(0, 5)).unwrap();
        assert!(clip.map_time(rt(9, 1)).is_none());
        assert_eq!(clip.map_time(rt(12, 1)).unwrap().seconds(), 2.0);
    }

    #[test]
    fn track_validate_rejects_overlapping_clips() {
        let mut track = Track::new("t0", TrackKind::Video);
        track.clips.push(Clip::new("a", "a", "x", range(0, 5), range(0, 5)).unwrap());
        track.clips.push(Clip::new("b", "b", "x", range(3, 5), range(0, 5)).unwrap());
        assert!(track.validate().is_err());
    }

    #[test]
    fn timeline_duration_is_max_track_end() {
        let mut t0 = Track::new("t0", TrackKind::Video);
        t0.clips.push(Clip::new("a", "a", "x", range(0, 4), range(0, 4)).unwrap());
        let mut t1 = Track::new("t1", TrackKind::Audio);
        t1.clips.push(Clip::new("b", "b", "x", range(0, 9), range(0, 9)).unwrap());
        let timeline = Timeline {
            id: "tl".into(),
            name: "tl".into(),
            tracks: vec![t0, t1],
        };
        assert!(timeline.duration().eq_exact(rt(9, 1)));
        assert!(timeline.has_audio_tracks());
    }
}
