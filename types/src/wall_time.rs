//! Per-job wall-time budget.
//!
//! A `WallTime` is a whole number of seconds greater than zero. The job file
//! may spell it as an integer, a float (truncated) or an `HH:MM:SS` literal;
//! all three forms are normalized here so nothing downstream sees the raw
//! representation.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WallTimeError {
    #[error("wall time must be greater than zero seconds")]
    Zero,
    #[error("wall time must not be negative (got {0})")]
    Negative(i64),
    #[error("invalid wall time '{raw}'; expected whole seconds or HH:MM:SS")]
    Malformed { raw: String },
}

/// Maximum permitted run time of one job, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTime(NonZeroU64);

impl WallTime {
    /// 24 hours, the budget used when neither the job nor the global section sets one.
    pub const DEFAULT: Self = Self(NonZeroU64::new(86_400).expect("86400 is non-zero"));

    pub fn from_secs(secs: u64) -> Result<Self, WallTimeError> {
        NonZeroU64::new(secs).map(Self).ok_or(WallTimeError::Zero)
    }

    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0.get()
    }

    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_secs(self.0.get())
    }

    /// Parse an `HH:MM:SS` literal. Minutes and seconds are not range-checked,
    /// so `00:90:00` is ninety minutes.
    pub fn parse_clock(raw: &str) -> Result<Self, WallTimeError> {
        let malformed = || WallTimeError::Malformed {
            raw: raw.to_string(),
        };
        let mut parts = raw.trim().splitn(3, ':');
        let mut next = || -> Result<u64, WallTimeError> {
            parts
                .next()
                .and_then(|part| part.trim().parse::<u64>().ok())
                .ok_or_else(malformed)
        };
        let hours = next()?;
        let minutes = next()?;
        let seconds = next()?;
        let total = hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes.checked_mul(60)?))
            .and_then(|hm| hm.checked_add(seconds))
            .ok_or_else(malformed)?;
        Self::from_secs(total)
    }
}

impl Default for WallTime {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for WallTime {
    type Error = WallTimeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let secs = u64::try_from(value).map_err(|_| WallTimeError::Negative(value))?;
        Self::from_secs(secs)
    }
}

impl TryFrom<f64> for WallTime {
    type Error = WallTimeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(WallTimeError::Malformed {
                raw: value.to_string(),
            });
        }
        Self::try_from(value.trunc() as i64)
    }
}

impl FromStr for WallTime {
    type Err = WallTimeError;

    /// Accepts either plain seconds (`"90"`) or a clock literal (`"00:01:30"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.contains(':') {
            return Self::parse_clock(trimmed);
        }
        let secs = trimmed
            .parse::<i64>()
            .map_err(|_| WallTimeError::Malformed { raw: s.to_string() })?;
        Self::try_from(secs)
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
