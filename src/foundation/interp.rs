//! Interpolatable values: linear lerp plus Hermite cubic with tangents.

/// A value that can be linearly interpolated and, optionally, interpolated
/// along a Hermite cubic when both tangents are present.
///
/// Mirrors the teacher's `Lerp` trait, generalized with a cubic variant that
/// defaults to linear for types with no natural tangent algebra (step types).
pub trait Interpolatable: Sized + Clone {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self;

    /// Hermite cubic using basis `(2t^3-3t^2+1, t^3-2t^2+t, -2t^3+3t^2, t^3-t^2)`.
    /// Default implementation falls back to linear interpolation.
    fn interpolate_cubic(a: &Self, _out_tan: &Self, b: &Self, _in_tan: &Self, t: f64) -> Self {
        Self::interpolate(a, b, t)
    }
}

pub fn hermite_basis(t: f64) -> (f64, f64, f64, f64) {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    (h00, h10, h01, h11)
}

impl Interpolatable for f64 {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }

    fn interpolate_cubic(a: &Self, out_tan: &Self, b: &Self, in_tan: &Self, t: f64) -> Self {
        let (h00, h10, h01, h11) = hermite_basis(t);
        h00 * a + h10 * out_tan + h01 * b + h11 * in_tan
    }
}

impl Interpolatable for f32 {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        (f64::from(*a) + (f64::from(*b) - f64::from(*a)) * t) as f32
    }
}

impl Interpolatable for bool {
    /// Booleans interpolate as a step at t=0.5.
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        if t < 0.5 { *a } else { *b }
    }
}

/// A plain 2-vector, used for positions/sizes in keyframe tracks independent
/// of the render graph's own `kurbo::Vec2` (which lacks `Interpolatable`).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Interpolatable for Vec2 {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        Vec2::new(
            f64::interpolate(&a.x, &b.x, t),
            f64::interpolate(&a.y, &b.y, t),
        )
    }

    fn interpolate_cubic(a: &Self, out_tan: &Self, b: &Self, in_tan: &Self, t: f64) -> Self {
        Vec2::new(
            f64::interpolate_cubic(&a.x, &out_tan.x, &b.x, &in_tan.x, t),
            f64::interpolate_cubic(&a.y, &out_tan.y, &b.y, &in_tan.y, t),
        )
    }
}

/// Straight (non-premultiplied) RGBA in `0.0..=1.0` per channel.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorRgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Interpolatable for ColorRgba {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        ColorRgba {
            r: f64::interpolate(&a.r, &b.r, t),
            g: f64::interpolate(&a.g, &b.g, t),
            b: f64::interpolate(&a.b, &b.b, t),
            a: f64::interpolate(&a.a, &b.a, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_midpoint() {
        assert_eq!(f64::interpolate(&0.0, &10.0, 0.5), 5.0);
    }

    #[test]
    fn cubic_matches_endpoints() {
        let a = 0.0f64;
        let b = 10.0f64;
        assert_eq!(f64::interpolate_cubic(&a, &0.0, &b, &0.0, 0.0), a);
        assert_eq!(f64::interpolate_cubic(&a, &0.0, &b, &0.0, 1.0), b);
    }

    #[test]
    fn bool_step_at_half() {
        assert!(!bool::interpolate(&false, &true, 0.49));
        assert!(bool::interpolate(&false, &true, 0.5));
    }

    #[test]
    fn vec2_lerp() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 20.0);
        let m = Vec2::interpolate(&a, &b, 0.5);
        assert_eq!(m, Vec2::new(5.0, 10.0));
    }
}
