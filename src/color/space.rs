//! ACEScg <-> XYZ <-> LAB conversions and CIEDE2000. The
//! matrices and white point are fixed constants, the way the teacher's own
//! `foundation::math` module carries fixed transform matrices rather than
//! deriving them at runtime.

/// ACEScg (AP1 primaries) to CIE XYZ, D60 white point.
pub const ACESCG_TO_XYZ: [[f64; 3]; 3] = [
    [0.6624541811, 0.1340042065, 0.1561876870],
    [0.2722287168, 0.6740817658, 0.0536895174],
    [-0.0055746495, 0.0040607335, 1.0103391003],
];

/// CIE XYZ (D60) to ACEScg.
pub const XYZ_TO_ACESCG: [[f64; 3]; 3] = [
    [1.6410233797, -0.3248032942, -0.2364246952],
    [-0.6636628587, 1.6153315917, 0.0167563477],
    [0.0117218943, -0.0082844420, 0.9883948585],
];

/// D60 white point in CIE XYZ, used for the XYZ<->LAB f(t) normalization.
pub const D60_WHITE: [f64; 3] = [0.952646, 1.000000, 1.008825];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcesCg {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XyzColor {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

fn apply_matrix(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

pub fn acescg_to_xyz(c: AcesCg) -> XyzColor {
    let [x, y, z] = apply_matrix(&ACESCG_TO_XYZ, [c.r, c.g, c.b]);
    XyzColor { x, y, z }
}

pub fn xyz_to_acescg(c: XyzColor) -> AcesCg {
    let [r, g, b] = apply_matrix(&XYZ_TO_ACESCG, [c.x, c.y, c.z]);
    AcesCg { r, g, b }
}

const KAPPA: f64 = 24389.0 / 27.0;
const EPSILON: f64 = 216.0 / 24389.0;

fn f(t: f64) -> f64 {
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

fn f_inv(t: f64) -> f64 {
    let t3 = t * t * t;
    if t3 > EPSILON {
        t3
    } else {
        (116.0 * t - 16.0) / KAPPA
    }
}

pub fn xyz_to_lab(c: XyzColor) -> Lab {
    let fx = f(c.x / D60_WHITE[0]);
    let fy = f(c.y / D60_WHITE[1]);
    let fz = f(c.z / D60_WHITE[2]);
    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

pub fn lab_to_xyz(c: Lab) -> XyzColor {
    let fy = (c.l + 16.0) / 116.0;
    let fx = fy + c.a / 500.0;
    let fz = fy - c.b / 200.0;
    XyzColor {
        x: f_inv(fx) * D60_WHITE[0],
        y: f_inv(fy) * D60_WHITE[1],
        z: f_inv(fz) * D60_WHITE[2],
    }
}

/// CIEDE2000 color difference between two LAB colors.
pub fn delta_e2000(lab1: Lab, lab2: Lab) -> f64 {
    let (l1, a1, b1) = (lab1.l, lab1.a, lab1.b);
    let (l2, a2, b2) = (lab2.l, lab2.a, lab2.b);

    let c1 = (a1 * a1 + b1 * b1).sqrt();
    let c2 = (a2 * a2 + b2 * b2).sqrt();
    let c_bar = (c1 + c2) / 2.0;

    let c_bar7 = c_bar.powi(7);
    let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + 25f64.powi(7))).sqrt());

    let a1p = a1 * (1.0 + g);
    let a2p = a2 * (1.0 + g);

    let c1p = (a1p * a1p + b1 * b1).sqrt();
    let c2p = (a2p * a2p + b2 * b2).sqrt();

    let h1p = hue_degrees(b1, a1p);
    let h2p = hue_degrees(b2, a2p);

    let delta_lp = l2 - l1;
    let delta_cp = c2p - c1p;

    let delta_hp_raw = if c1p * c2p == 0.0 {
        0.0
    } else {
        let mut diff = h2p - h1p;
        if diff > 180.0 {
            diff -= 360.0;
        } else if diff < -180.0 {
            diff += 360.0;
        }
        diff
    };
    let delta_hp = 2.0 * (c1p * c2p).sqrt() * (delta_hp_raw.to_radians() / 2.0).sin();

    let l_bar_p = (l1 + l2) / 2.0;
    let c_bar_p = (c1p + c2p) / 2.0;

    let h_bar_p = if c1p * c2p == 0.0 {
        h1p + h2p
    } else {
        let sum = h1p + h2p;
        let diff = (h1p - h2p).abs();
        if diff > 180.0 {
            if sum < 360.0 { (sum + 360.0) / 2.0 } else { (sum - 360.0) / 2.0 }
        } else {
            sum / 2.0
        }
    };

    let t = 1.0 - 0.17 * (h_bar_p - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar_p).to_radians().cos()
        + 0.32 * (3.0 * h_bar_p + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar_p - 63.0).to_radians().cos();

    let delta_theta = 30.0 * (-(((h_bar_p - 275.0) / 25.0).powi(2))).exp();
    let r_c = 2.0 * (c_bar_p.powi(7) / (c_bar_p.powi(7) + 25f64.powi(7))).sqrt();
    let s_l = 1.0 + (0.015 * (l_bar_p - 50.0).powi(2)) / (20.0 + (l_bar_p - 50.0).powi(2)).sqrt();
    let s_c = 1.0 + 0.045 * c_bar_p;
    let s_h = 1.0 + 0.015 * c_bar_p * t;
    let r_t = -r_c * (2.0 * delta_theta).to_radians().sin();

    let kl = 1.0;
    let kc = 1.0;
    let kh = 1.0;

    let term_l = delta_lp / (kl * s_l);
    let term_c = delta_cp / (kc * s_c);
    let term_h = delta_hp / (kh * s_h);

    (term_l * term_l + term_c * term_c + term_h * term_h + r_t * term_c * term_h).sqrt()
}

fn hue_degrees(b: f64, a: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        return 0.0;
    }
    let deg = b.atan2(a).to_degrees();
    if deg < 0.0 { deg + 360.0 } else { deg }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acescg_xyz_roundtrip_is_near_identity() {
        let c = AcesCg { r: 0.3, g: 0.5, b: 0.7 };
        let xyz = acescg_to_xyz(c);
        let back = xyz_to_acescg(xyz);
        assert!((back.r - c.r).abs() < 1e-6);
        assert!((back.g - c.g).abs() < 1e-6);
        assert!((back.b - c.b).abs() < 1e-6);
    }

    #[test]
    fn xyz_lab_roundtrip_is_near_identity() {
        let xyz = XyzColor { x: 0.4, y: 0.3, z: 0.2 };
        let lab = xyz_to_lab(xyz);
        let back = lab_to_xyz(lab);
        assert!((back.x - xyz.x).abs() < 1e-9);
        assert!((back.y - xyz.y).abs() < 1e-9);
        assert!((back.z - xyz.z).abs() < 1e-9);
    }

    #[test]
    fn identical_colors_have_zero_delta_e() {
        let lab = Lab { l: 50.0, a: 10.0, b: -5.0 };
        assert!(delta_e2000(lab, lab) < 1e-9);
    }

    #[test]
    fn delta_e_is_symmetric() {
        let a = Lab { l: 50.0, a: 2.0, b: -1.0 };
        let b = Lab { l: 55.0, a: -3.0, b: 4.0 };
        assert!((delta_e2000(a, b) - delta_e2000(b, a)).abs() < 1e-9);
    }

    #[test]
    fn white_point_maps_to_zero_lab_a_b() {
        let white = XyzColor { x: D60_WHITE[0], y: D60_WHITE[1], z: D60_WHITE[2] };
        let lab = xyz_to_lab(white);
        assert!((lab.l - 100.0).abs() < 1e-6);
        assert!(lab.a.abs() < 1e-6);
        assert!(lab.b.abs() < 1e-6);
    }
}
