use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{BookingError, Result};

const MINUTES_PER_HOUR: u32 = 60;

/// wall-clock time of day with minute resolution, written `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(SlotTime)
            .ok_or_else(|| BookingError::validation(format!("invalid time {hour:02}:{minute:02}")))
    }

    pub fn parse(s: &str) -> Result<Self> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(SlotTime)
            .map_err(|_| BookingError::validation(format!("malformed time '{s}', expected HH:MM")))
    }

    /// minutes since midnight
    pub fn minutes(&self) -> u32 {
        self.0.hour() * MINUTES_PER_HOUR + self.0.minute()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    pub fn from_minutes(minutes: u32) -> Result<Self> {
        Self::new(minutes / MINUTES_PER_HOUR, minutes % MINUTES_PER_HOUR)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        SlotTime::parse(s)
    }
}

impl TryFrom<String> for SlotTime {
    type Error = BookingError;

    fn try_from(s: String) -> Result<Self> {
        SlotTime::parse(&s)
    }
}

impl From<SlotTime> for String {
    fn from(t: SlotTime) -> Self {
        t.to_string()
    }
}

/// same-day half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSlot")]
pub struct TimeSlot {
    start: SlotTime,
    end: SlotTime,
}

#[derive(Deserialize)]
struct RawSlot {
    start: SlotTime,
    end: SlotTime,
}

impl TryFrom<RawSlot> for TimeSlot {
    type Error = BookingError;

    fn try_from(raw: RawSlot) -> Result<Self> {
        TimeSlot::new(raw.start, raw.end)
    }
}

impl TimeSlot {
    /// build a slot; zero-length and inverted intervals are invalid input
    pub fn new(start: SlotTime, end: SlotTime) -> Result<Self> {
        if end == start {
            return Err(BookingError::validation(format!(
                "zero-duration slot {start}-{end}"
            )));
        }
        if end < start {
            return Err(BookingError::validation(format!(
                "end time {end} precedes start time {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(SlotTime::parse(start)?, SlotTime::parse(end)?)
    }

    pub fn start(&self) -> SlotTime {
        self.start
    }

    pub fn end(&self) -> SlotTime {
        self.end
    }

    pub fn start_minutes(&self) -> u32 {
        self.start.minutes()
    }

    pub fn end_minutes(&self) -> u32 {
        self.end.minutes()
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end_minutes() - self.start_minutes()
    }

    pub fn duration_hours(&self) -> Decimal {
        Decimal::from(self.duration_minutes()) / Decimal::from(MINUTES_PER_HOUR)
    }

    /// half-open overlap against another interval widened by `buffer` minutes on both sides
    pub fn overlaps_buffered(&self, existing: &TimeSlot, buffer: u32) -> bool {
        let s1 = i64::from(self.start_minutes());
        let e1 = i64::from(self.end_minutes());
        let s2 = i64::from(existing.start_minutes()) - i64::from(buffer);
        let e2 = i64::from(existing.end_minutes()) + i64::from(buffer);
        s1 < e2 && e1 > s2
    }

    /// whether this slot lies within `[open, close]`
    pub fn within(&self, open: SlotTime, close: SlotTime) -> bool {
        self.start >= open && self.end <= close
    }

    /// absolute start instant for a booking on `date` in a court's fixed offset
    pub fn start_instant(&self, date: NaiveDate, utc_offset_minutes: i32) -> Result<DateTime<Utc>> {
        local_instant(date, self.start, utc_offset_minutes)
    }

    pub fn end_instant(&self, date: NaiveDate, utc_offset_minutes: i32) -> Result<DateTime<Utc>> {
        local_instant(date, self.end, utc_offset_minutes)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

fn local_instant(date: NaiveDate, time: SlotTime, utc_offset_minutes: i32) -> Result<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        BookingError::InvalidConfiguration {
            message: format!("utc offset out of range: {utc_offset_minutes} minutes"),
        }
    })?;
    offset
        .from_local_datetime(&date.and_time(time.as_naive()))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| BookingError::validation(format!("ambiguous local time {date} {time}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_and_display() {
        let t = SlotTime::parse("07:05").unwrap();
        assert_eq!(t.minutes(), 425);
        assert_eq!(t.to_string(), "07:05");
        assert!(SlotTime::parse("25:00").is_err());
        assert!(SlotTime::parse("7pm").is_err());
    }

    #[test]
    fn test_zero_and_inverted_slots_rejected() {
        assert!(matches!(
            TimeSlot::parse("10:00", "10:00"),
            Err(BookingError::Validation { .. })
        ));
        assert!(TimeSlot::parse("11:00", "10:00").is_err());
    }

    #[test]
    fn test_duration_hours() {
        let slot = TimeSlot::parse("14:00", "15:30").unwrap();
        assert_eq!(slot.duration_minutes(), 90);
        assert_eq!(slot.duration_hours(), dec!(1.5));
    }

    #[test]
    fn test_buffered_overlap_abut_is_free() {
        let existing = TimeSlot::parse("14:00", "16:00").unwrap();
        let abut = TimeSlot::parse("16:15", "17:00").unwrap();
        let inside_buffer = TimeSlot::parse("16:10", "17:00").unwrap();

        assert!(!abut.overlaps_buffered(&existing, 15));
        assert!(inside_buffer.overlaps_buffered(&existing, 15));
        assert!(!inside_buffer.overlaps_buffered(&existing, 0));
    }

    #[test]
    fn test_start_instant_applies_offset() {
        let slot = TimeSlot::parse("10:00", "11:00").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let utc = slot.start_instant(date, 120).unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-03-01T08:00:00+00:00");
    }

    #[test]
    fn test_serde_as_hh_mm() {
        let slot = TimeSlot::parse("09:00", "10:30").unwrap();
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(json, r#"{"start":"09:00","end":"10:30"}"#);
        let back: TimeSlot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slot);

        let inverted = serde_json::from_str::<TimeSlot>(r#"{"start":"10:00","end":"09:00"}"#);
        assert!(inverted.is_err());
    }
}
