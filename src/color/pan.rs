//! Stereo equal-power panning and VBAP-style speaker-array panning for
//! 5.1/7.1. The HRTF/binaural subsystem itself is the external
//! collaborator; this module only computes channel
//! gains from an azimuth/distance.

/// `left = sqrt(0.5*(1-pan))`, `right = sqrt(0.5*(1+pan))`,
/// `pan = azimuth_deg / 90`.
pub fn stereo_pan(azimuth_deg: f64) -> (f64, f64) {
    let pan = (azimuth_deg / 90.0).clamp(-1.0, 1.0);
    let left = (0.5 * (1.0 - pan)).max(0.0).sqrt();
    let right = (0.5 * (1.0 + pan)).max(0.0).sqrt();
    (left, right)
}

#[derive(Clone, Copy, Debug)]
pub struct Speaker {
    pub name: &'static str,
    pub azimuth_deg: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpeakerGains {
    pub names: Vec<&'static str>,
    pub gains: Vec<f64>,
    pub lfe: f64,
}

fn normalize_azimuth(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    d
}

fn angular_distance(a: f64, b: f64) -> f64 {
    let diff = (normalize_azimuth(a) - normalize_azimuth(b)).abs();
    diff.min(360.0 - diff)
}

/// Piecewise-triangular VBAP across `speakers` (sorted by azimuth isn't
/// required -- callers may hand them in any order), renormalized so gains
/// sum to 1 when the raw total is positive. LFE is derived purely from
/// `distance`, independent of azimuth.
fn vbap(speakers: &[Speaker], azimuth_deg: f64, distance: f64) -> SpeakerGains {
    let mut sorted: Vec<Speaker> = speakers.to_vec();
    sorted.sort_by(|a, b| a.azimuth_deg.partial_cmp(&b.azimuth_deg).unwrap());

    let az = normalize_azimuth(azimuth_deg);
    let n = sorted.len();
    let mut raw = vec![0.0_f64; n];

    // Find the pair of adjacent speakers (wrapping) bracketing `az`, and
    // assign triangular weights by angular proximity within that arc.
    let mut placed = false;
    for i in 0..n {
        let j = (i + 1) % n;
        let a = sorted[i].azimuth_deg;
        let mut b = sorted[j].azimuth_deg;
        if j == 0 {
            b += 360.0; // wrap-around arc from the last speaker back to the first
        }
        let mut az_in_arc = az;
        if az_in_arc < a {
            az_in_arc += 360.0;
        }
        if az_in_arc >= a - 1e-9 && az_in_arc <= b + 1e-9 {
            let span = (b - a).max(1e-9);
            let t = ((az_in_arc - a) / span).clamp(0.0, 1.0);
            raw[i] += 1.0 - t;
            raw[j] += t;
            placed = true;
            break;
        }
    }
    if !placed {
        // Degenerate (e.g. single speaker or exact overlap): nearest speaker wins.
        let nearest = (0..n)
            .min_by(|&a, &b| {
                angular_distance(az, sorted[a].azimuth_deg)
                    .partial_cmp(&angular_distance(az, sorted[b].azimuth_deg))
                    .unwrap()
            })
            .unwrap_or(0);
        raw[nearest] = 1.0;
    }

    let total: f64 = raw.iter().sum();
    let gains = if total > 0.0 {
        raw.iter().map(|g| g / total).collect()
    } else {
        raw
    };

    let lfe = (distance / 10.0).min(0.3) * 0.5;

    SpeakerGains {
        names: sorted.iter().map(|s| s.name).collect(),
        gains,
        lfe,
    }
}

const SPEAKERS_5_1: [Speaker; 5] = [
    Speaker { name: "L", azimuth_deg: -30.0 },
    Speaker { name: "R", azimuth_deg: 30.0 },
    Speaker { name: "C", azimuth_deg: 0.0 },
    Speaker { name: "Ls", azimuth_deg: -110.0 },
    Speaker { name: "Rs", azimuth_deg: 110.0 },
];

const SPEAKERS_7_1: [Speaker; 7] = [
    Speaker { name: "L", azimuth_deg: -30.0 },
    Speaker { name: "R", azimuth_deg: 30.0 },
    Speaker { name: "C", azimuth_deg: 0.0 },
    Speaker { name: "Lss", azimuth_deg: -90.0 },
    Speaker { name: "Rss", azimuth_deg: 90.0 },
    Speaker { name: "Lrs", azimuth_deg: -135.0 },
    Speaker { name: "Rrs", azimuth_deg: 135.0 },
];

pub fn vbap_5_1(azimuth_deg: f64, distance: f64) -> SpeakerGains {
    vbap(&SPEAKERS_5_1, azimuth_deg, distance)
}

pub fn vbap_7_1(azimuth_deg: f64, distance: f64) -> SpeakerGains {
    vbap(&SPEAKERS_7_1, azimuth_deg, distance)
}
