//! Timeline Resolver: sweep-line segmentation of a timeline into
//! contiguous, non-overlapping spans with a constant active-clip set.

use crate::foundation::{RationalTime, TimeRange};
use crate::timeline::model::{Timeline, Transition};

#[derive(Clone, Debug)]
pub struct ResolvedClip {
    pub clip_id: String,
    pub asset_id: String,
    pub track_index: usize,
    pub segment_range: TimeRange,
    pub source_range: TimeRange,
}

#[derive(Clone, Debug)]
pub struct Segment {
    pub range: TimeRange,
    pub active_clips: Vec<ResolvedClip>,
    pub transition: Option<Transition>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventKind {
    End,
    Start,
}

struct Event {
    time: RationalTime,
    kind: EventKind,
    track_index: usize,
    clip_index: usize,
}

/// Resolve a timeline into segments via the mandatory sweep-line algorithm:
/// push each clip's end forward by half its own `out_transition` duration,
/// and push each clip's start backward by half the *previous* clip's
/// `out_transition` duration; sort by `(time asc, END before START)`; sweep
/// maintaining a per-track active set, emitting a segment between distinct
/// event times whenever the active set is non-empty.
pub fn resolve(timeline: &Timeline) -> Vec<Segment> {
    let mut events: Vec<Event> = Vec::new();
    // clip_starts[track_index][clip_index] -> (possibly pushed) start time
    let mut starts: Vec<Vec<RationalTime>> = Vec::with_capacity(timeline.tracks.len());
    let mut ends: Vec<Vec<RationalTime>> = Vec::with_capacity(timeline.tracks.len());

    for (track_index, track) in timeline.tracks.iter().enumerate() {
        let sorted = track.sorted_clips();
        let mut track_starts = Vec::with_capacity(sorted.len());
        let mut track_ends = Vec::with_capacity(sorted.len());

        for (clip_index, clip) in sorted.iter().enumerate() {
            let mut start = clip.range.start;
            if clip_index > 0 {
                if let Some(prev_transition) = &sorted[clip_index - 1].out_transition {
                    let half = prev_transition.duration.scale(1).seconds() / 2.0;
                    start = start.sub(RationalTime::from_seconds(half));
                }
            }
            let mut end = clip.range.end();
            if let Some(transition) = &clip.out_transition {
                let half = transition.duration.seconds() / 2.0;
                end = end.add(RationalTime::from_seconds(half));
            }
            track_starts.push(start);
            track_ends.push(end);

            events.push(Event {
                time: start,
                kind: EventKind::Start,
                track_index,
                clip_index,
            });
            events.push(Event {
                time: end,
                kind: EventKind::End,
                track_index,
                clip_index,
            });
        }
        starts.push(track_starts);
        ends.push(track_ends);
    }

    // (time ascending, END before START at equal time)
    events.sort_by(|a, b| {
        a.time.cmp_exact(b.time).then_with(|| match (a.kind, b.kind) {
            (EventKind::End, EventKind::Start) => std::cmp::Ordering::Less,
            (EventKind::Start, EventKind::End) => std::cmp::Ordering::Greater,
            _ => std::cmp::Ordering::Equal,
        })
    });

    let mut active: Vec<Vec<usize>> = timeline.tracks.iter().map(|_| Vec::new()).collect();
    let mut segments = Vec::new();
    let mut prev_time: Option<RationalTime> = None;

    let mut i = 0usize;
    while i < events.len() {
        let time = events[i].time;

        if let Some(pt) = prev_time {
            if pt.lt(time) {
                emit_segment(timeline, &active, pt, time, &mut segments);
            }
        }

        // apply every event at this exact time before emitting the next segment
        while i < events.len() && events[i].time.eq_exact(time) {
            let ev = &events[i];
            match ev.kind {
                EventKind::Start => active[ev.track_index].push(ev.clip_index),
                EventKind::End => active[ev.track_index].retain(|&c| c != ev.clip_index),
            }
            i += 1;
        }

        prev_time = Some(time);
    }

    segments
}

fn emit_segment(
    timeline: &Timeline,
    active: &[Vec<usize>],
    start: RationalTime,
    end: RationalTime,
    segments: &mut Vec<Segment>,
) {
    let mut active_clips = Vec::new();
    let mut transition = None;

    for (track_index, clip_indices) in active.iter().enumerate() {
        if clip_indices.is_empty() {
            continue;
        }
        let sorted = timeline.tracks[track_index].sorted_clips();

        if clip_indices.len() > 1 && transition.is_none() {
            for &ci in clip_indices {
                if let Some(t) = &sorted[ci].out_transition {
                    transition = Some(t.clone());
                    break;
                }
            }
        }

        for &ci in clip_indices {
            let clip = sorted[ci];
            let segment_range = TimeRange::new(start, end.sub(start)).expect("end >= start");
            // Offset from the clip's own range.start, clamped to zero while the
            // segment sits inside a transition push that precedes it.
            let source_start = clip.source_range.start.add(start.sub(clip.range.start).max0());
            active_clips.push(ResolvedClip {
                clip_id: clip.id.clone(),
                asset_id: clip.asset_id.clone(),
                track_index,
                segment_range,
                source_range: TimeRange::new(source_start, end.sub(start)).unwrap_or(segment_range),
            });
        }
    }

    if !active_clips.is_empty() {
        segments.push(Segment {
            range: TimeRange::new(start, end.sub(start)).expect("end >= start"),
            active_clips,
            transition,
        });
    }
}

trait Max0 {
    fn max0(self) -> Self;
}

impl Max0 for RationalTime {
    fn max0(self) -> Self {
        if self.value < 0 {
            RationalTime {
                value: 0,
                timescale: self.timescale,
            }
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::model::{Clip, ClipStatus, Track, TrackKind, TransitionKind};

    fn rt(n: i64, d: i32) -> RationalTime {
        RationalTime::new(n, d).unwrap()
    }

    fn range(start: i64, dur: i64) -> TimeRange {
        TimeRange::new(rt(start, 1), rt(dur, 1)).unwrap()
    }

    #[test]
    fn two_clip_dissolve_yields_three_segments() {
        // Two 2s clips on track 0, dissolve of duration 2s between them: the
        // sweep pushes each side by D/2 = 1s, landing the transition segment
        // boundaries at 1 and 3.
        let mut clip_a = Clip::new("a", "a", "asset", range(0, 2), range(0, 2)).unwrap();
        clip_a.out_transition = Some(Transition {
            id: "t1".into(),
            kind: TransitionKind::Dissolve,
            duration: rt(2, 1),
        });
        let clip_b = Clip {
            id: "b".into(),
            name: "b".into(),
            asset_id: "asset".into(),
            range: range(2, 2),
            source_range: range(0, 2),
            status: ClipStatus::Active,
            out_transition: None,
            effects: Vec::new(),
        };

        let track = Track {
            id: "t0".into(),
            kind: TrackKind::Video,
            clips: vec![clip_a, clip_b],
        };
        let timeline = crate::timeline::model::Timeline {
            id: "tl".into(),
            name: "tl".into(),
            tracks: vec![track],
        };

        let segments = resolve(&timeline);
        assert_eq!(segments.len(), 3, "{:#?}", segments);

        assert!(segments[0].range.start.eq_exact(rt(0, 1)));
        assert!(segments[0].range.end().eq_exact(rt(1, 1)));
        assert_eq!(segments[0].active_clips.len(), 1);

        assert!(segments[1].range.start.eq_exact(rt(1, 1)));
        assert!(segments[1].range.end().eq_exact(rt(3, 1)));
        assert_eq!(segments[1].active_clips.len(), 2);
        assert!(segments[1].transition.is_some());

        assert!(segments[2].range.start.eq_exact(rt(3, 1)));
        assert!(segments[2].range.end().eq_exact(rt(4, 1)));
        assert_eq!(segments[2].active_clips.len(), 1);

        let total: f64 = segments.iter().map(|s| s.range.duration.seconds()).sum();
        assert!((total - 4.0).abs() < 1e-9);
    }

    #[test]
    fn no_transition_yields_touching_segments_without_overlap() {
        let clip_a = Clip::new("a", "a", "asset", range(0, 10), range(0, 10)).unwrap();
        let clip_b = Clip::new("b", "b", "asset", range(10, 10), range(0, 10)).unwrap();
        let track = Track {
            id: "t0".into(),
            kind: TrackKind::Video,
            clips: vec![clip_a, clip_b],
        };
        let timeline = crate::timeline::model::Timeline {
            id: "tl".into(),
            name: "tl".into(),
            tracks: vec![track],
        };
        let segments = resolve(&timeline);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].active_clips.len(), 1);
        assert_eq!(segments[1].active_clips.len(), 1);
    }
}
