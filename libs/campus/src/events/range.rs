//! Half-open date ranges parsed from request input

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use super::EventQueryError;

/// A half-open `[start, end)` interval of instants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Build a range, rejecting `end < start`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, EventQueryError> {
        if end < start {
            return Err(EventQueryError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    /// Range of `length` starting at `start`
    pub fn starting_at(start: DateTime<Utc>, length: TimeDelta) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    /// Parse the two bounds of a range.
    ///
    /// Each bound is either an RFC 3339 timestamp or a plain `YYYY-MM-DD`
    /// date. A plain start date means midnight UTC of that day; a plain end
    /// date covers that whole day, so the exclusive bound is the following
    /// midnight.
    ///
    /// A plain end date that lies wholly before `start` is inverted even
    /// though its widened bound may equal `start`.
    pub fn parse(start: &str, end: &str) -> Result<Self, EventQueryError> {
        let (start, _) = parse_bound(start)?;
        let (end, whole_day) = parse_bound(end)?;
        if !whole_day {
            return Self::new(start, end);
        }
        let end = end
            .checked_add_signed(TimeDelta::days(1))
            .ok_or_else(|| EventQueryError::DateFormat(end.date_naive().to_string()))?;
        if end <= start {
            return Err(EventQueryError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Parse one bound, reporting whether it was a plain date
fn parse_bound(raw: &str) -> Result<(DateTime<Utc>, bool), EventQueryError> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok((instant.with_timezone(&Utc), false));
    }

    let midnight = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| EventQueryError::DateFormat(raw.to_string()))?;

    Ok((midnight.and_utc(), true))
}
