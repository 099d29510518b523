//! Feature preflight: the Export Coordinator's second step. Enumerates
//! every effect id referenced by the timeline before any rendering resource
//! is allocated.

use crate::error::{ExportError, ExportResult};
use crate::timeline::model::{Timeline, TrackKind};

/// Input ports a video-track effect may legally be wired to.
pub const ALLOWED_VIDEO_EFFECT_PORTS: [&str; 4] = ["source", "input", "face_mask", "mask"];

/// Tells the coordinator which effect ids are known to the render device.
/// Kept as a narrow trait (rather than a concrete registry type) so the
/// caller's effect catalog -- however it is sourced -- can answer directly.
pub trait EffectRegistry {
    fn is_registered(&self, effect_id: &str) -> bool;
}

/// A fixed in-memory registry, useful for tests and simple deployments.
#[derive(Clone, Debug, Default)]
pub struct StaticEffectRegistry {
    known: std::collections::HashSet<String>,
}

impl StaticEffectRegistry {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { known: ids.into_iter().map(Into::into).collect() }
    }
}

impl EffectRegistry for StaticEffectRegistry {
    fn is_registered(&self, effect_id: &str) -> bool {
        self.known.contains(effect_id)
    }
}

/// Fails with `UnknownFeature` if any effect id referenced by the timeline is
/// not registered, or `UnsupportedEffectInputPort` if a video-track effect
/// names a port outside `{source, input, face_mask, mask}`.
pub fn preflight(timeline: &Timeline, registry: &dyn EffectRegistry) -> ExportResult<()> {
    for track in &timeline.tracks {
        for clip in &track.clips {
            for effect in &clip.effects {
                if !registry.is_registered(&effect.effect_id) {
                    return Err(ExportError::unknown_feature(effect.effect_id.clone()));
                }
                if track.kind == TrackKind::Video {
                    if let Some(port) = &effect.input_port {
                        if !ALLOWED_VIDEO_EFFECT_PORTS.contains(&port.as_str()) {
                            return Err(ExportError::UnsupportedEffectInputPort {
                                effect: effect.effect_id.clone(),
                                port: port.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::{RationalTime, TimeRange};
    use crate::timeline::model::{Clip, EffectRef, Track};

    fn rt(n: i64) -> RationalTime {
        RationalTime::new(n, 1).unwrap()
    }

    fn range(start: i64, dur: i64) -> TimeRange {
        TimeRange::new(rt(start), rt(dur)).unwrap()
    }

    fn timeline_with_effect(effect_id: &str, port: Option<&str>, kind: TrackKind) -> Timeline {
        let mut clip = Clip::new("c", "c", "a", range(0, 5), range(0, 5)).unwrap();
        clip.effects.push(EffectRef { effect_id: effect_id.into(), input_port: port.map(String::from) });
        let track = Track { id: "t0".into(), kind, clips: vec![clip] };
        Timeline { id: "tl".into(), name: "tl".into(), tracks: vec![track] }
    }

    #[test]
    fn registered_effect_with_allowed_port_passes() {
        let timeline = timeline_with_effect("blur", Some("input"), TrackKind::Video);
        let registry = StaticEffectRegistry::new(["blur"]);
        assert!(preflight(&timeline, &registry).is_ok());
    }

    #[test]
    fn unregistered_effect_fails_with_unknown_feature() {
        let timeline = timeline_with_effect("nonexistent", None, TrackKind::Video);
        let registry = StaticEffectRegistry::new(["blur"]);
        assert!(matches!(preflight(&timeline, &registry), Err(ExportError::UnknownFeature(_))));
    }

    #[test]
    fn disallowed_port_on_video_track_fails() {
        let timeline = timeline_with_effect("blur", Some("weird_port"), TrackKind::Video);
        let registry = StaticEffectRegistry::new(["blur"]);
        assert!(matches!(
            preflight(&timeline, &registry),
            Err(ExportError::UnsupportedEffectInputPort { .. })
        ));
    }

    #[test]
    fn audio_track_effects_are_not_port_checked() {
        let timeline = timeline_with_effect("gain", Some("weird_port"), TrackKind::Audio);
        let registry = StaticEffectRegistry::new(["gain"]);
        assert!(preflight(&timeline, &registry).is_ok());
    }
}
