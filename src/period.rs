use crate::error::{GtallyError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

/// A named UTC window. `start` is inclusive, `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(label: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let label = label.into();
        if start >= end {
            return Err(GtallyError::config(format!(
                "Invalid period {label}: start ({start}) is not before end ({end})"
            )));
        }
        Ok(Self { label, start, end })
    }

    pub fn year(year: i32) -> Result<Self> {
        Self::new(year.to_string(), midnight(year, 1, 1)?, midnight(year + 1, 1, 1)?)
    }

    /// Parses `YYYY`, `YYYYH1`, `YYYYH2`, `H1YYYY` or `H2YYYY`.
    pub fn parse(spec: &str) -> Result<Self> {
        let s = spec.trim().to_ascii_uppercase();
        let invalid = || GtallyError::config(format!("Invalid period '{spec}' (expected YYYY, YYYYH1, YYYYH2, H1YYYY or H2YYYY)"));

        if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
            let year: i32 = s.parse().map_err(|_| invalid())?;
            return Self::year(year);
        }
        if s.len() != 6 || !s.is_ascii() {
            return Err(invalid());
        }

        let (year, half) = if s[..4].chars().all(|c| c.is_ascii_digit()) {
            (&s[..4], &s[4..])
        } else {
            (&s[2..], &s[..2])
        };
        if !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;

        match half {
            "H1" => Self::new(format!("{year}H1"), midnight(year, 1, 1)?, midnight(year, 7, 1)?),
            "H2" => Self::new(format!("{year}H2"), midnight(year, 7, 1)?, midnight(year + 1, 1, 1)?),
            _ => Err(invalid()),
        }
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start && *timestamp < self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} .. {})",
            self.label,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Smallest window covering every period, used to skip commits no period can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn covering(periods: &[Period]) -> Option<Self> {
        let start = periods.iter().map(|p| p.start).min()?;
        let end = periods.iter().map(|p| p.end).max()?;
        Some(Self { start, end })
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start && *timestamp < self.end
    }
}

/// Monday 00:00:00 UTC of the week containing `timestamp`.
pub fn week_start(timestamp: &DateTime<Utc>) -> DateTime<Utc> {
    let date = timestamp.date_naive();
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN))
}

fn midnight(year: i32, month: u32, day: u32) -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
        .ok_or_else(|| GtallyError::config(format!("Invalid date {year:04}-{month:02}-{day:02}")))
}
