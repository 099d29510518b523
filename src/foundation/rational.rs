//! Exact fractional time: rational-time arithmetic and interpolation.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

/// An exact `value/timescale` seconds.
///
/// Arithmetic always goes through a common timescale (LCM of the operands')
/// so that repeated add/sub never accumulates float error.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RationalTime {
    pub value: i64,
    pub timescale: i32,
}

pub const DEFAULT_TIMESCALE: i32 = 600;

impl RationalTime {
    pub fn new(value: i64, timescale: i32) -> ExportResult<Self> {
        if timescale <= 0 {
            return Err(ExportError::validation("RationalTime timescale must be > 0"));
        }
        Ok(Self { value, timescale })
    }

    /// Construct from seconds, rounded half-away-from-zero at `DEFAULT_TIMESCALE`.
    pub fn from_seconds(seconds: f64) -> Self {
        Self::from_seconds_at(seconds, DEFAULT_TIMESCALE)
    }

    pub fn from_seconds_at(seconds: f64, timescale: i32) -> Self {
        let scaled = seconds * f64::from(timescale);
        let rounded = round_half_away_from_zero(scaled);
        Self {
            value: rounded as i64,
            timescale,
        }
    }

    pub fn zero() -> Self {
        Self {
            value: 0,
            timescale: DEFAULT_TIMESCALE,
        }
    }

    /// Lossy projection to seconds. Only used at display/sample-grid boundaries.
    pub fn seconds(self) -> f64 {
        self.value as f64 / f64::from(self.timescale)
    }

    pub fn to_sample_index(self, sample_rate: u32) -> i64 {
        round_half_away_from_zero(self.seconds() * f64::from(sample_rate)) as i64
    }

    fn common_timescale(a: Self, b: Self) -> i64 {
        lcm(i64::from(a.timescale), i64::from(b.timescale))
    }

    fn rescale_value(self, target_timescale: i64) -> i64 {
        // value * (target / timescale), computed via the common multiple so it's exact.
        let factor = target_timescale / i64::from(self.timescale);
        self.value * factor
    }

    pub fn add(self, other: Self) -> Self {
        let ts = Self::common_timescale(self, other);
        let v = self.rescale_value(ts) + other.rescale_value(ts);
        reduce(v, ts)
    }

    pub fn sub(self, other: Self) -> Self {
        let ts = Self::common_timescale(self, other);
        let v = self.rescale_value(ts) - other.rescale_value(ts);
        reduce(v, ts)
    }

    pub fn scale(self, factor: i64) -> Self {
        Self {
            value: self.value * factor,
            timescale: self.timescale,
        }
    }

    pub fn rem(self, modulus: Self) -> Self {
        let ts = Self::common_timescale(self, modulus);
        let a = self.rescale_value(ts);
        let b = modulus.rescale_value(ts);
        if b == 0 {
            return reduce(0, ts);
        }
        reduce(a.rem_euclid(b), ts)
    }

    pub fn is_zero(self) -> bool {
        self.value == 0
    }

    pub fn cmp_exact(self, other: Self) -> std::cmp::Ordering {
        let ts = Self::common_timescale(self, other);
        self.rescale_value(ts).cmp(&other.rescale_value(ts))
    }

    pub fn eq_exact(self, other: Self) -> bool {
        self.cmp_exact(other) == std::cmp::Ordering::Equal
    }

    pub fn lt(self, other: Self) -> bool {
        self.cmp_exact(other) == std::cmp::Ordering::Less
    }

    pub fn le(self, other: Self) -> bool {
        self.cmp_exact(other) != std::cmp::Ordering::Greater
    }

    pub fn ge(self, other: Self) -> bool {
        self.cmp_exact(other) != std::cmp::Ordering::Less
    }

    pub fn gt(self, other: Self) -> bool {
        self.cmp_exact(other) == std::cmp::Ordering::Greater
    }
}

fn reduce(value: i64, timescale: i64) -> RationalTime {
    if value == 0 {
        return RationalTime {
            value: 0,
            timescale: timescale.clamp(1, i32::MAX as i64) as i32,
        };
    }
    let g = gcd(value.unsigned_abs() as i64, timescale);
    let g = g.max(1);
    let reduced_ts = timescale / g;
    if reduced_ts <= i64::from(i32::MAX) && reduced_ts >= 1 {
        RationalTime {
            value: value / g,
            timescale: reduced_ts as i32,
        }
    } else {
        RationalTime {
            value,
            timescale: timescale.clamp(1, i32::MAX as i64) as i32,
        }
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1)
}

fn lcm(a: i64, b: i64) -> i64 {
    (a / gcd(a, b)) * b
}

fn round_half_away_from_zero(x: f64) -> f64 {
    if x >= 0.0 { (x + 0.5).floor() } else { (x - 0.5).ceil() }
}

/// `{ start, duration }` with `duration >= 0`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    pub fn new(start: RationalTime, duration: RationalTime) -> ExportResult<Self> {
        if duration.value < 0 {
            return Err(ExportError::validation("TimeRange duration must be >= 0"));
        }
        Ok(Self { start, duration })
    }

    pub fn end(self) -> RationalTime {
        self.start.add(self.duration)
    }

    pub fn contains(self, t: RationalTime) -> bool {
        self.start.le(t) && t.lt(self.end())
    }

    pub fn is_empty(self) -> bool {
        self.duration.is_zero()
    }
}
