//! Keyframe tracks: sorted keyframes over `RationalTime`, with per-keyframe
//! interpolation mode/easing and track-level extrapolation.

use crate::error::{ExportError, ExportResult};
use crate::foundation::{Interpolatable, RationalTime};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpMode {
    Step,
    Linear,
    Bezier,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extrapolation {
    Hold,
    Loop,
    PingPong,
}

/// Easing applied to `progress` before interpolation. `None`/`Linear` is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::InQuad => t * t,
            Easing::OutQuad => t * (2.0 - t),
            Easing::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Keyframe<T> {
    pub time: RationalTime,
    pub value: T,
    pub in_tangent: Option<T>,
    pub out_tangent: Option<T>,
    pub interp: InterpMode,
    pub easing: Easing,
}

impl<T> Keyframe<T> {
    pub fn new(time: RationalTime, value: T, interp: InterpMode) -> Self {
        Self {
            time,
            value,
            in_tangent: None,
            out_tangent: None,
            interp,
            easing: Easing::Linear,
        }
    }
}

#[derive(Clone, Debug)]
pub struct KeyframeTrack<T> {
    keys: Vec<Keyframe<T>>,
    pub extrapolation: Extrapolation,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    pub fn new(extrapolation: Extrapolation) -> Self {
        Self {
            keys: Vec::new(),
            extrapolation,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Remove any existing keyframe at the same exact time, then insert in
    /// sorted order.
    pub fn insert(&mut self, kf: Keyframe<T>) {
        self.keys.retain(|k| !k.time.eq_exact(kf.time));
        let pos = self
            .keys
            .iter()
            .position(|k| kf.time.lt(k.time))
            .unwrap_or(self.keys.len());
        self.keys.insert(pos, kf);
    }

    pub fn remove_at(&mut self, index: usize) {
        if index < self.keys.len() {
            self.keys.remove(index);
        }
    }

    pub fn evaluate(&self, t: RationalTime) -> ExportResult<T> {
        if self.keys.is_empty() {
            return Err(ExportError::EmptyTrack);
        }
        if self.keys.len() == 1 {
            return Ok(self.keys[0].value.clone());
        }

        let first = &self.keys[0];
        let last = &self.keys[self.keys.len() - 1];

        if t.le(first.time) || t.ge(last.time) {
            return self.extrapolate(t);
        }

        self.evaluate_within_span(t)
    }

    fn extrapolate(&self, t: RationalTime) -> ExportResult<T> {
        let first = &self.keys[0];
        let last = &self.keys[self.keys.len() - 1];

        match self.extrapolation {
            Extrapolation::Hold => {
                if t.le(first.time) {
                    Ok(first.value.clone())
                } else {
                    Ok(last.value.clone())
                }
            }
            Extrapolation::Loop => {
                let span = last.time.sub(first.time);
                if span.is_zero() {
                    return Ok(first.value.clone());
                }
                let delta = t.sub(first.time);
                let mapped = first.time.add(delta.rem(span));
                self.evaluate_within_span_clamped(mapped)
            }
            Extrapolation::PingPong => {
                let span = last.time.sub(first.time);
                if span.is_zero() {
                    return Ok(first.value.clone());
                }
                let delta = t.sub(first.time);
                let delta_abs_seconds = delta.seconds().abs();
                let span_seconds = span.seconds();
                let cycle = (delta_abs_seconds / span_seconds).floor() as i64;
                let remainder = delta.rem(span);
                let mapped_offset = if cycle.rem_euclid(2) == 1 {
                    span.sub(remainder)
                } else {
                    remainder
                };
                let mapped = first.time.add(mapped_offset);
                self.evaluate_within_span_clamped(mapped)
            }
        }
    }

    /// Like `evaluate_within_span` but tolerant of `t` landing exactly on an
    /// endpoint after modulo mapping.
    fn evaluate_within_span_clamped(&self, t: RationalTime) -> ExportResult<T> {
        let first = &self.keys[0];
        let last = &self.keys[self.keys.len() - 1];
        if t.le(first.time) {
            return Ok(first.value.clone());
        }
        if t.ge(last.time) {
            return Ok(last.value.clone());
        }
        self.evaluate_within_span(t)
    }

    /// Binary search the largest index `i` with `kf[i].time <= t`, then
    /// interpolate between `kf[i]` and `kf[i+1]`. `t` is guaranteed interior.
    fn evaluate_within_span(&self, t: RationalTime) -> ExportResult<T> {
        let i = self.lower_bound(t);
        let a = &self.keys[i];
        let b = &self.keys[i + 1];

        let span = b.time.sub(a.time);
        let offset = t.sub(a.time);
        let progress = if span.is_zero() {
            0.0
        } else {
            offset.seconds() / span.seconds()
        };
        let eased = a.easing.apply(progress);

        let value = match a.interp {
            InterpMode::Step => a.value.clone(),
            InterpMode::Linear => T::interpolate(&a.value, &b.value, eased),
            InterpMode::Bezier => match (&a.out_tangent, &b.in_tangent) {
                (Some(out_tan), Some(in_tan)) => {
                    T::interpolate_cubic(&a.value, out_tan, &b.value, in_tan, eased)
                }
                _ => T::interpolate(&a.value, &b.value, eased),
            },
        };
        Ok(value)
    }

    /// Largest index `i` with `kf[i].time <= t`, assuming `t` is within
    /// `[kf[0].time, kf[n-1].time)`.
    fn lower_bound(&self, t: RationalTime) -> usize {
        let mut lo = 0usize;
        let mut hi = self.keys.len() - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.keys[mid].time.le(t) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo.min(self.keys.len() - 2)
    }
}
