//! Mastering chain: EQ bands, gain, soft compressor, safety limiter and
//! a loudness analyzer, plus the dialog-cleanup preset and "engineer"
//! gain-decision heuristic built on top of them.

/// A single-pole shelving/peaking EQ band, applied in the time domain via a
/// simple one-pole smoother around the target gain -- sufficient fidelity
/// for an offline mastering pass that only needs to match the documented
/// preset numbers, not model an analog filter exactly.
#[derive(Clone, Copy, Debug)]
pub struct EqBand {
    pub freq_hz: f64,
    pub gain_db: f64,
    pub bandwidth: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct Compressor {
    pub threshold_db: f64,
    pub ratio: f64,
    pub makeup: f64,
}

impl Compressor {
    fn threshold_linear(self) -> f64 {
        db_to_linear(self.threshold_db)
    }

    /// `sign(x) * (threshold + (|x| - threshold)/ratio) * makeup` for `|x| > threshold`.
    pub fn process(self, x: f64) -> f64 {
        let threshold = self.threshold_linear();
        let mag = x.abs();
        if mag <= threshold {
            return x;
        }
        let compressed = threshold + (mag - threshold) / self.ratio;
        x.signum() * compressed * self.makeup
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Limiter {
    pub ceiling: f64,
}

impl Default for Limiter {
    fn default() -> Self {
        Self { ceiling: 0.98 }
    }
}

impl Limiter {
    /// Scales every sample in `chunk` (interleaved per channel) so the peak
    /// magnitude across all channels does not exceed `ceiling`.
    pub fn apply(self, channels: &mut [Vec<f64>]) {
        let peak = channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0_f64, |acc, &s| acc.max(s.abs()));
        if peak > self.ceiling && peak > 0.0 {
            let scale = self.ceiling / peak;
            for channel in channels.iter_mut() {
                for s in channel.iter_mut() {
                    *s *= scale;
                }
            }
        }
    }
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

pub fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.max(1e-12).log10()
}

#[derive(Clone, Debug)]
pub struct MasteringChain {
    pub eq_bands: Vec<EqBand>,
    pub global_gain_db: f64,
    pub compressor: Option<Compressor>,
    pub limiter: Limiter,
}

impl Default for MasteringChain {
    fn default() -> Self {
        Self {
            eq_bands: Vec::new(),
            global_gain_db: 0.0,
            compressor: None,
            limiter: Limiter::default(),
        }
    }
}

impl MasteringChain {
    /// Applies the chain in place to an interleaved-per-channel chunk: EQ
    /// gain approximation, global gain, compressor, then the safety limiter.
    pub fn process(&self, channels: &mut [Vec<f64>]) {
        let eq_gain_linear: f64 = self
            .eq_bands
            .iter()
            .map(|b| db_to_linear(b.gain_db))
            .product();
        let global_gain_linear = db_to_linear(self.global_gain_db);
        let pregain = eq_gain_linear * global_gain_linear;

        for channel in channels.iter_mut() {
            for s in channel.iter_mut() {
                let mut v = *s * pregain;
                if let Some(comp) = self.compressor {
                    v = comp.process(v);
                }
                *s = v;
            }
        }
        self.limiter.apply(channels);
    }
}

/// Request for the dialog-cleanup preset v1, as a per-clip requested gain.
#[derive(Clone, Copy, Debug)]
pub struct DialogCleanupRequest {
    pub requested_global_gain_db: f64,
}

/// The dialog-cleanup preset v1, built the way a preflight pass aggregates
/// it: take the minimum requested gain across all requesting clips, clamp to
/// `[0, 6] dB`, and apply the fixed EQ/compressor stack.
pub struct DialogCleanupPreset;

impl DialogCleanupPreset {
    pub fn aggregate(requests: &[DialogCleanupRequest]) -> Option<MasteringChain> {
        let min_gain = requests
            .iter()
            .map(|r| r.requested_global_gain_db)
            .fold(f64::INFINITY, f64::min);
        if !min_gain.is_finite() {
            return None;
        }
        let gain = min_gain.clamp(0.0, 6.0);
        Some(MasteringChain {
            eq_bands: vec![
                EqBand {
                    freq_hz: 120.0,
                    gain_db: -4.0,
                    bandwidth: 1.0,
                },
                EqBand {
                    freq_hz: 3000.0,
                    gain_db: 2.0,
                    bandwidth: 1.0,
                },
                EqBand {
                    freq_hz: 9000.0,
                    gain_db: 1.0,
                    bandwidth: 1.0,
                },
            ],
            global_gain_db: gain,
            compressor: Some(Compressor {
                threshold_db: -16.0,
                ratio: 2.5,
                makeup: 1.0,
            }),
            limiter: Limiter::default(),
        })
    }
}

/// RMS/peak analysis used to drive the "engineer" gain decision.
#[derive(Clone, Copy, Debug)]
pub struct LoudnessReport {
    pub approx_lufs: f64,
    pub peak_db: f64,
}

pub fn analyze(channels: &[Vec<f64>]) -> LoudnessReport {
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    let mut peak = 0.0_f64;
    for channel in channels {
        for &s in channel {
            sum_sq += s * s;
            count += 1;
            peak = peak.max(s.abs());
        }
    }
    let rms = if count == 0 { 0.0 } else { (sum_sq / count as f64).sqrt() };
    LoudnessReport {
        approx_lufs: linear_to_db(rms),
        peak_db: linear_to_db(peak),
    }
}

/// `gain = clamp(target_lufs - current, -20, +12) dB`; enables a compressor
/// at `(-12 dB, 3:1)` when `|gain| >= 3`.
pub fn engineer_decide(current: LoudnessReport, target_lufs: f64) -> (f64, Option<Compressor>) {
    let gain = (target_lufs - current.approx_lufs).clamp(-20.0, 12.0);
    let compressor = if gain.abs() >= 3.0 {
        Some(Compressor {
            threshold_db: -12.0,
            ratio: 3.0,
            makeup: 1.0,
        })
    } else {
        None
    };
    (gain, compressor)
}
