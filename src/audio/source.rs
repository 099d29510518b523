//! Audio Source URL parsing and the deterministic procedural sample
//! generator. Every generator is a pure function of integer sample
//! index plus a per-clip seed, so reruns are bit-identical regardless of
//! thread count (the pink-noise filter state lives on the `ProceduralSource`
//! itself and must never be shared across threads, per the concurrency
//! model).

use std::collections::HashMap;

use crate::error::{ExportError, ExportResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioSourceKind {
    Sine { freq: f64 },
    Sweep { start: f64, end: f64, duration: f64 },
    WhiteNoise,
    PinkNoise,
    Impulse { interval_s: f64 },
}

/// Parse `ligm://audio/<kind>?key=value&...`. Unknown hosts/paths default to
/// `sine(freq=1000)` to preserve determinism, per the Audio Source URL
/// contract.
pub fn parse_audio_url(url: &str) -> AudioSourceKind {
    let Some(rest) = url.strip_prefix("ligm://audio/") else {
        return AudioSourceKind::Sine { freq: 1000.0 };
    };

    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, q),
        None => (rest, ""),
    };
    let params = parse_query(query);
    let get_f64 = |key: &str, default: f64| -> f64 {
        params.get(key).and_then(|v| v.parse::<f64>().ok()).unwrap_or(default)
    };

    match path {
        "sine" => AudioSourceKind::Sine {
            freq: get_f64("freq", 1000.0),
        },
        "sweep" => AudioSourceKind::Sweep {
            start: get_f64("start", 200.0),
            end: get_f64("end", 2000.0),
            duration: get_f64("duration", 1.0).max(1e-9),
        },
        "white_noise" => AudioSourceKind::WhiteNoise,
        "pink_noise" => AudioSourceKind::PinkNoise,
        "impulse" => AudioSourceKind::Impulse {
            interval_s: get_f64("interval_s", 1.0).max(1e-9),
        },
        _ => AudioSourceKind::Sine { freq: 1000.0 },
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// FNV-1a over `(clip_name, 0, source_fn, 0, clip_start_sample_le, clip_end_sample_le)`.
pub fn clip_seed(clip_name: &str, source_fn: &str, clip_start_sample: i64, clip_end_sample: i64) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    let mut feed = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x100000001b3);
        }
    };
    feed(clip_name.as_bytes());
    feed(&[0]);
    feed(source_fn.as_bytes());
    feed(&[0]);
    feed(&clip_start_sample.to_le_bytes());
    feed(&clip_end_sample.to_le_bytes());
    hash
}

fn splitmix64(mut seed: u64) -> u64 {
    seed = seed.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = seed;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// `UnitFloat in [0,1)` from a SplitMix64-hashed key.
fn unit_float(key: u64) -> f64 {
    let bits = splitmix64(key) >> 11; // top 53 bits
    (bits as f64) / ((1u64 << 53) as f64)
}

/// 7-pole pink-noise IIR filter state, owned per-source.
#[derive(Clone, Copy, Debug, Default)]
struct PinkState {
    b: [f64; 7],
}

impl PinkState {
    fn process(&mut self, white: f64) -> f64 {
        self.b[0] = 0.99886 * self.b[0] + white * 0.0555179;
        self.b[1] = 0.99332 * self.b[1] + white * 0.0750759;
        self.b[2] = 0.96900 * self.b[2] + white * 0.1538520;
        self.b[3] = 0.86650 * self.b[3] + white * 0.3104856;
        self.b[4] = 0.55000 * self.b[4] + white * 0.5329522;
        self.b[5] = -0.7616 * self.b[5] - white * 0.0168980;
        let out = self.b[0]
            + self.b[1]
            + self.b[2]
            + self.b[3]
            + self.b[4]
            + self.b[5]
            + self.b[6]
            + white * 0.5362;
        self.b[6] = white * 0.115926;
        out * 0.11 * 0.1
    }
}

/// A pull-based procedural source. Holds per-source mutable filter state
/// (pink noise) so it must live on exactly one thread.
#[derive(Clone, Debug)]
pub struct ProceduralSource {
    pub kind: AudioSourceKind,
    pub sample_rate: u32,
    pub clip_seed: u64,
    pink: PinkState,
}

impl ProceduralSource {
    pub fn new(kind: AudioSourceKind, sample_rate: u32, clip_seed: u64) -> Self {
        Self {
            kind,
            sample_rate,
            clip_seed,
            pink: PinkState::default(),
        }
    }

    /// One sample at absolute output-sample index `absolute`, given the
    /// clip's active window `[clip_start_sample, clip_end_sample)` and the
    /// trim offset `clip_offset` into the source.
    pub fn sample(&mut self, absolute: i64, clip_start_sample: i64, clip_end_sample: i64, clip_offset: i64) -> f64 {
        if absolute < clip_start_sample || absolute >= clip_end_sample {
            return 0.0;
        }
        let source_sample = (absolute - clip_start_sample) + clip_offset;
        let local_seconds = source_sample as f64 / f64::from(self.sample_rate);

        match self.kind {
            AudioSourceKind::Sine { freq } => (2.0 * std::f64::consts::PI * freq * local_seconds).sin() * 0.1,
            AudioSourceKind::WhiteNoise => {
                let key = (source_sample as u64) ^ self.clip_seed;
                (unit_float(key) * 2.0 - 1.0) * 0.1
            }
            AudioSourceKind::PinkNoise => {
                let key = (source_sample as u64) ^ self.clip_seed;
                let white = unit_float(key) * 2.0 - 1.0;
                self.pink.process(white)
            }
            AudioSourceKind::Sweep { start, end, duration } => {
                let progress = (local_seconds / duration).clamp(0.0, 1.0);
                let freq = start * (end / start).powf(progress);
                (2.0 * std::f64::consts::PI * freq * local_seconds).sin() * 0.1
            }
            AudioSourceKind::Impulse { interval_s } => {
                let interval_samples = (interval_s * f64::from(self.sample_rate)).floor() as i64;
                if interval_samples > 0 && source_sample.rem_euclid(interval_samples) == 0 {
                    0.9
                } else {
                    0.0
                }
            }
        }
    }

    /// Pull `n` samples starting at `render_start + render_local` into
    /// `out`, one value per output sample, applying `envelope` (clip
    /// transition in/out gain as a function of absolute seconds) and
    /// reporting whether every written sample was exactly zero.
    pub fn pull(
        &mut self,
        render_start: i64,
        render_local: i64,
        n: usize,
        clip_start_sample: i64,
        clip_end_sample: i64,
        clip_offset: i64,
        envelope: &dyn Fn(f64) -> f64,
        out: &mut [f64],
    ) -> bool {
        debug_assert!(out.len() >= n);
        let mut silent = true;
        for (i, slot) in out.iter_mut().take(n).enumerate() {
            let absolute = render_start + render_local + i as i64;
            let raw = self.sample(absolute, clip_start_sample, clip_end_sample, clip_offset);
            let gain = envelope(absolute as f64 / f64::from(self.sample_rate));
            let value = raw * gain;
            *slot = value;
            if value != 0.0 {
                silent = false;
            }
        }
        silent
    }
}

pub fn validate_audio_config(sample_rate: u32) -> ExportResult<()> {
    if sample_rate == 0 {
        return Err(ExportError::InvalidDimensions("sample_rate must be > 0".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sine_with_freq() {
        let kind = parse_audio_url("ligm://audio/sine?freq=440");
        assert_eq!(kind, AudioSourceKind::Sine { freq: 440.0 });
    }

    #[test]
    fn unknown_path_defaults_to_sine_1000() {
        let kind = parse_audio_url("ligm://audio/unknown_thing");
        assert_eq!(kind, AudioSourceKind::Sine { freq: 1000.0 });
        let kind = parse_audio_url("file:///not/even/ligm");
        assert_eq!(kind, AudioSourceKind::Sine { freq: 1000.0 });
    }

    #[test]
    fn clip_seed_is_deterministic() {
        let a = clip_seed("clip-a", "sine", 0, 48000);
        let b = clip_seed("clip-a", "sine", 0, 48000);
        assert_eq!(a, b);
        let c = clip_seed("clip-b", "sine", 0, 48000);
        assert_ne!(a, c);
    }

    #[test]
    fn sine_one_second_at_1khz_matches_scenario() {
        let mut source = ProceduralSource::new(AudioSourceKind::Sine { freq: 1000.0 }, 48_000, 0);
        let n = 48_000usize;
        let mut buf = vec![0.0; n];
        source.pull(0, 0, n, 0, 48_000, 0, &|_| 1.0, &mut buf);
        assert_eq!(buf[0], 0.0);
        let peak = buf.iter().cloned().fold(0.0_f64, |a, b| a.max(b.abs()));
        assert!((peak - 0.1).abs() < 1e-6, "peak={peak}");
        let zero_crossings = buf.windows(2).filter(|w| w[0].signum() != w[1].signum()).count();
        assert!((zero_crossings as i64 - 2000).abs() <= 4, "crossings={zero_crossings}");
    }

    #[test]
    fn outside_clip_window_is_silent() {
        let mut source = ProceduralSource::new(AudioSourceKind::Sine { freq: 1000.0 }, 48_000, 0);
        assert_eq!(source.sample(100, 0, 50, 0), 0.0);
    }

    #[test]
    fn white_noise_is_deterministic_across_instances() {
        let seed = clip_seed("clip", "white_noise", 0, 100);
        let mut a = ProceduralSource::new(AudioSourceKind::WhiteNoise, 48_000, seed);
        let mut b = ProceduralSource::new(AudioSourceKind::WhiteNoise, 48_000, seed);
        for i in 0..100 {
            assert_eq!(a.sample(i, 0, 100, 0), b.sample(i, 0, 100, 0));
        }
    }

    #[test]
    fn impulse_fires_at_interval() {
        let mut source = ProceduralSource::new(AudioSourceKind::Impulse { interval_s: 0.001 }, 48_000, 0);
        // interval_samples = floor(0.001 * 48000) = 48
        assert_eq!(source.sample(0, 0, 1000, 0), 0.9);
        assert_eq!(source.sample(48, 0, 1000, 0), 0.9);
        assert_eq!(source.sample(1, 0, 1000, 0), 0.0);
    }
}
