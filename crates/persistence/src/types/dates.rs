//! FHIR date values with precision windows.
//!
//! A FHIR date search value like `2020-03` denotes a range, not an instant:
//! the whole of March 2020. [`FhirDateTime`] pairs the parsed instant with
//! its [`DatePrecision`] and exposes the window as a half-open range
//! `[range_low_incl, range_high_excl)`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Precision of a FHIR date/dateTime search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    /// Year only, e.g. `2020`.
    Year,
    /// Year and month, e.g. `2020-03`.
    Month,
    /// Full date, e.g. `2020-03-15`.
    Day,
    /// Date and hour.
    Hour,
    /// Date, hour and minute.
    Minute,
    /// Full second precision.
    Second,
    /// Sub-second precision.
    Millisecond,
}

/// A parsed FHIR date/dateTime search value.
///
/// Values without a timezone offset are interpreted as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FhirDateTime {
    value: DateTime<Utc>,
    precision: DatePrecision,
}

impl FhirDateTime {
    /// Creates a date value from an instant and its precision.
    pub fn new(value: DateTime<Utc>, precision: DatePrecision) -> Self {
        Self { value, precision }
    }

    /// The parsed instant.
    pub fn value(&self) -> DateTime<Utc> {
        self.value
    }

    /// The precision of the original text.
    pub fn precision(&self) -> DatePrecision {
        self.precision
    }

    /// Inclusive lower bound of the precision window.
    pub fn range_low_incl(&self) -> DateTime<Utc> {
        let v = self.value;
        match self.precision {
            DatePrecision::Year => ymd_start(v.year(), 1, 1),
            DatePrecision::Month => ymd_start(v.year(), v.month(), 1),
            DatePrecision::Day => ymd_start(v.year(), v.month(), v.day()),
            DatePrecision::Hour => truncated(v, Duration::hours(1)),
            DatePrecision::Minute => truncated(v, Duration::minutes(1)),
            DatePrecision::Second => truncated(v, Duration::seconds(1)),
            DatePrecision::Millisecond => truncated(v, Duration::milliseconds(1)),
        }
    }

    /// Exclusive upper bound of the precision window (the open-right
    /// boundary: the first instant no longer inside the window).
    pub fn range_high_excl(&self) -> DateTime<Utc> {
        let low = self.range_low_incl();
        match self.precision {
            DatePrecision::Year => ymd_start(low.year() + 1, 1, 1),
            DatePrecision::Month => {
                if low.month() == 12 {
                    ymd_start(low.year() + 1, 1, 1)
                } else {
                    ymd_start(low.year(), low.month() + 1, 1)
                }
            }
            DatePrecision::Day => low + Duration::days(1),
            DatePrecision::Hour => low + Duration::hours(1),
            DatePrecision::Minute => low + Duration::minutes(1),
            DatePrecision::Second => low + Duration::seconds(1),
            DatePrecision::Millisecond => low + Duration::milliseconds(1),
        }
    }
}

impl fmt::Display for FhirDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            DatePrecision::Year => write!(f, "{}", self.value.format("%Y")),
            DatePrecision::Month => write!(f, "{}", self.value.format("%Y-%m")),
            DatePrecision::Day => write!(f, "{}", self.value.format("%Y-%m-%d")),
            DatePrecision::Hour | DatePrecision::Minute => {
                write!(f, "{}", self.value.format("%Y-%m-%dT%H:%MZ"))
            }
            DatePrecision::Second => write!(f, "{}", self.value.format("%Y-%m-%dT%H:%M:%SZ")),
            DatePrecision::Millisecond => {
                write!(f, "{}", self.value.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
            }
        }
    }
}

impl FromStr for FhirDateTime {
    type Err = String;

    /// Parses the FHIR date grammar: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, or a
    /// full dateTime `YYYY-MM-DDThh:mm[:ss[.sss]][Z|±hh:mm]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.find('T') {
            None => match s.len() {
                4 => {
                    let year: i32 = s.parse().map_err(|_| format!("invalid year: {s}"))?;
                    Ok(Self::new(ymd_start(year, 1, 1), DatePrecision::Year))
                }
                7 => {
                    let date = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
                        .map_err(|e| format!("invalid year-month {s}: {e}"))?;
                    Ok(Self::new(naive_start(date), DatePrecision::Month))
                }
                10 => {
                    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map_err(|e| format!("invalid date {s}: {e}"))?;
                    Ok(Self::new(naive_start(date), DatePrecision::Day))
                }
                _ => Err(format!("invalid date: {s}")),
            },
            Some(t_pos) => {
                let time_part = &s[t_pos + 1..];
                let offset_pos = time_part
                    .find(['Z', '+', '-'])
                    .map(|i| t_pos + 1 + i)
                    .unwrap_or(s.len());
                let body = &s[..offset_pos];
                let offset = if offset_pos < s.len() {
                    &s[offset_pos..]
                } else {
                    "Z"
                };

                let time = &body[t_pos + 1..];
                let (normalized, precision) = match time.matches(':').count() {
                    1 => (format!("{body}:00"), DatePrecision::Minute),
                    2 if time.contains('.') => (body.to_string(), DatePrecision::Millisecond),
                    2 => (body.to_string(), DatePrecision::Second),
                    _ => return Err(format!("invalid dateTime: {s}")),
                };

                let value = DateTime::parse_from_rfc3339(&format!("{normalized}{offset}"))
                    .map_err(|e| format!("invalid dateTime {s}: {e}"))?
                    .with_timezone(&Utc);
                Ok(Self::new(value, precision))
            }
        }
    }
}

fn ymd_start(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn naive_start(date: NaiveDate) -> DateTime<Utc> {
    ymd_start(date.year(), date.month(), date.day())
}

fn truncated(value: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let millis = value.timestamp_millis();
    let width = window.num_milliseconds();
    DateTime::from_timestamp_millis(millis - millis.rem_euclid(width)).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year() {
        let d: FhirDateTime = "2020".parse().unwrap();
        assert_eq!(d.precision(), DatePrecision::Year);
        assert_eq!(d.range_low_incl(), ymd_start(2020, 1, 1));
        assert_eq!(d.range_high_excl(), ymd_start(2021, 1, 1));
    }

    #[test]
    fn test_parse_month_window() {
        let d: FhirDateTime = "2020-12".parse().unwrap();
        assert_eq!(d.precision(), DatePrecision::Month);
        assert_eq!(d.range_low_incl(), ymd_start(2020, 12, 1));
        assert_eq!(d.range_high_excl(), ymd_start(2021, 1, 1));
    }

    #[test]
    fn test_parse_day_window() {
        let d: FhirDateTime = "2020-02-28".parse().unwrap();
        assert_eq!(d.range_high_excl(), ymd_start(2020, 2, 29));
    }

    #[test]
    fn test_parse_minute_precision() {
        let d: FhirDateTime = "2020-01-01T10:30Z".parse().unwrap();
        assert_eq!(d.precision(), DatePrecision::Minute);
        assert_eq!(
            d.range_high_excl() - d.range_low_incl(),
            Duration::minutes(1)
        );
    }

    #[test]
    fn test_parse_second_with_offset() {
        let d: FhirDateTime = "2020-01-01T10:30:00+02:00".parse().unwrap();
        assert_eq!(d.precision(), DatePrecision::Second);
        assert_eq!(
            d.value(),
            Utc.with_ymd_and_hms(2020, 1, 1, 8, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_millisecond() {
        let d: FhirDateTime = "2020-01-01T10:30:00.123Z".parse().unwrap();
        assert_eq!(d.precision(), DatePrecision::Millisecond);
    }

    #[test]
    fn test_no_offset_is_utc() {
        let d: FhirDateTime = "2020-01-01T10:30:00".parse().unwrap();
        assert_eq!(
            d.value(),
            Utc.with_ymd_and_hms(2020, 1, 1, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("20-01".parse::<FhirDateTime>().is_err());
        assert!("2020-01-01Tnoon".parse::<FhirDateTime>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["2020", "2020-03", "2020-03-15"] {
            let d: FhirDateTime = text.parse().unwrap();
            assert_eq!(d.to_string(), text);
        }
    }
}
