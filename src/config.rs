use chrono::{NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{BookingError, Result};
use crate::slot::SlotTime;

/// Booking policy injected into every engine.
///
/// All percentages are whole-number percents (`10` = 10%). Missing fields take
/// their defaults when deserialized, so a partial JSON document is a valid policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingPolicy {
    /// idle minutes enforced on both sides of an existing booking
    pub booking_buffer_minutes: u32,
    /// cancellations closer than this to the start get no refund
    pub cancellation_deadline_hours: Decimal,
    /// refund percent for the 24-48h band
    pub refund_percentage: Decimal,
    pub platform_fee_percentage: Decimal,
    pub tax_percentage: Decimal,
    /// at or beyond this lead time the refund is 100%
    pub full_refund_hours: Decimal,
    /// lower edge of the `refund_percentage` band
    pub partial_refund_hours: Decimal,
    /// refund percent between the deadline and `partial_refund_hours`
    pub late_refund_percentage: Decimal,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            booking_buffer_minutes: 15,
            cancellation_deadline_hours: dec!(24),
            refund_percentage: dec!(80),
            platform_fee_percentage: dec!(10),
            tax_percentage: dec!(8),
            full_refund_hours: dec!(48),
            partial_refund_hours: dec!(24),
            late_refund_percentage: dec!(50),
        }
    }
}

impl BookingPolicy {
    /// parse and validate a JSON policy document
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: BookingPolicy =
            serde_json::from_str(json).map_err(|e| BookingError::InvalidConfiguration {
                message: format!("policy json: {e}"),
            })?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn with_buffer_minutes(mut self, minutes: u32) -> Self {
        self.booking_buffer_minutes = minutes;
        self
    }

    pub fn with_cancellation_deadline_hours(mut self, hours: Decimal) -> Self {
        self.cancellation_deadline_hours = hours;
        self
    }

    pub fn with_platform_fee_percentage(mut self, percentage: Decimal) -> Self {
        self.platform_fee_percentage = percentage;
        self
    }

    pub fn with_tax_percentage(mut self, percentage: Decimal) -> Self {
        self.tax_percentage = percentage;
        self
    }

    pub fn with_refund_percentage(mut self, percentage: Decimal) -> Self {
        self.refund_percentage = percentage;
        self
    }

    pub fn platform_fee_rate(&self) -> Rate {
        Rate::from_percentage(self.platform_fee_percentage)
    }

    pub fn tax_rate(&self) -> Rate {
        Rate::from_percentage(self.tax_percentage)
    }

    pub fn validate(&self) -> Result<()> {
        let percentages = [
            ("refund_percentage", self.refund_percentage),
            ("platform_fee_percentage", self.platform_fee_percentage),
            ("tax_percentage", self.tax_percentage),
            ("late_refund_percentage", self.late_refund_percentage),
        ];
        for (name, value) in percentages {
            if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                return Err(BookingError::InvalidConfiguration {
                    message: format!("{name} must be within 0..=100, got {value}"),
                });
            }
        }

        if self.cancellation_deadline_hours < Decimal::ZERO {
            return Err(BookingError::InvalidConfiguration {
                message: "cancellation_deadline_hours must not be negative".to_string(),
            });
        }
        if self.partial_refund_hours > self.full_refund_hours {
            return Err(BookingError::InvalidConfiguration {
                message: format!(
                    "partial_refund_hours {} exceeds full_refund_hours {}",
                    self.partial_refund_hours, self.full_refund_hours
                ),
            });
        }
        // refund tiers must shrink as the start approaches
        if self.late_refund_percentage > self.refund_percentage {
            return Err(BookingError::InvalidConfiguration {
                message: "late_refund_percentage exceeds refund_percentage".to_string(),
            });
        }
        Ok(())
    }
}

/// a weekly window with an elevated hourly rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub day_of_week: Weekday,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
}

impl PeakWindow {
    pub fn new(day_of_week: Weekday, start_time: SlotTime, end_time: SlotTime) -> Self {
        Self {
            day_of_week,
            start_time,
            end_time,
        }
    }

    /// hour-granular match on the start hour only
    pub fn covers_hour(&self, day: Weekday, hour: u32) -> bool {
        self.day_of_week == day && hour >= self.start_time.hour() && hour < self.end_time.hour()
    }
}

/// per-court pricing, read at computation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourtPricingConfig {
    pub hourly_rate: Money,
    pub peak_hour_rate: Option<Money>,
    #[serde(default)]
    pub peak_windows: Vec<PeakWindow>,
    pub minimum_booking_hours: Decimal,
    pub maximum_booking_hours: Decimal,
    pub currency: String,
}

impl CourtPricingConfig {
    /// flat-rate court: 1 to 4 hours
    pub fn flat(hourly_rate: Money, currency: &str) -> Self {
        Self {
            hourly_rate,
            peak_hour_rate: None,
            peak_windows: Vec::new(),
            minimum_booking_hours: Decimal::ONE,
            maximum_booking_hours: dec!(4),
            currency: currency.to_string(),
        }
    }

    pub fn with_peak(mut self, peak_hour_rate: Money, windows: Vec<PeakWindow>) -> Self {
        self.peak_hour_rate = Some(peak_hour_rate);
        self.peak_windows = windows;
        self
    }

    pub fn with_duration_limits(mut self, minimum: Decimal, maximum: Decimal) -> Self {
        self.minimum_booking_hours = minimum;
        self.maximum_booking_hours = maximum;
        self
    }

    /// Rejects broken configuration; returns non-fatal warnings.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.hourly_rate.is_negative() {
            return Err(BookingError::InvalidConfiguration {
                message: format!("negative hourly rate {}", self.hourly_rate),
            });
        }
        if let Some(peak) = self.peak_hour_rate {
            if peak.is_negative() {
                return Err(BookingError::InvalidConfiguration {
                    message: format!("negative peak hour rate {peak}"),
                });
            }
        }
        if self.minimum_booking_hours <= Decimal::ZERO {
            return Err(BookingError::InvalidConfiguration {
                message: "minimum_booking_hours must be positive".to_string(),
            });
        }
        if self.maximum_booking_hours < self.minimum_booking_hours {
            return Err(BookingError::InvalidConfiguration {
                message: format!(
                    "maximum_booking_hours {} below minimum {}",
                    self.maximum_booking_hours, self.minimum_booking_hours
                ),
            });
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(BookingError::InvalidConfiguration {
                message: format!("currency '{}' is not an ISO 4217 code", self.currency),
            });
        }

        let mut warnings = Vec::new();
        if self.peak_hour_rate.is_some() && self.peak_windows.is_empty() {
            warnings.push("peak_hour_rate set without any peak window".to_string());
        }
        for window in &self.peak_windows {
            if window.end_time.hour() <= window.start_time.hour() {
                warnings.push(format!(
                    "peak window on {:?} {}-{} never matches a start hour",
                    window.day_of_week, window.start_time, window.end_time
                ));
            }
        }
        Ok(warnings)
    }
}

/// opening hours for one weekday
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day_of_week: Weekday,
    pub open: SlotTime,
    pub close: SlotTime,
    #[serde(default)]
    pub is_closed: bool,
}

/// When a court may be booked at all.
///
/// An empty weekly schedule means open all day, every day; once any weekday is
/// listed, unlisted weekdays are closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    #[serde(default)]
    pub weekly: Vec<DaySchedule>,
    #[serde(default)]
    pub closed_dates: Vec<NaiveDate>,
}

/// resolved opening state for a single date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningHours {
    Closed,
    Open { open: SlotTime, close: SlotTime },
}

impl AvailabilityConfig {
    pub fn open_all_week(open: SlotTime, close: SlotTime) -> Self {
        let days = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        Self {
            weekly: days
                .into_iter()
                .map(|day_of_week| DaySchedule {
                    day_of_week,
                    open,
                    close,
                    is_closed: false,
                })
                .collect(),
            closed_dates: Vec::new(),
        }
    }

    pub fn close_on(mut self, date: NaiveDate) -> Self {
        self.closed_dates.push(date);
        self
    }

    pub fn hours_on(&self, date: NaiveDate) -> Result<OpeningHours> {
        use chrono::Datelike;

        if self.closed_dates.contains(&date) {
            return Ok(OpeningHours::Closed);
        }
        if self.weekly.is_empty() {
            return Ok(OpeningHours::Open {
                open: SlotTime::new(0, 0)?,
                close: SlotTime::new(23, 59)?,
            });
        }
        let weekday = date.weekday();
        Ok(match self.weekly.iter().find(|d| d.day_of_week == weekday) {
            Some(day) if !day.is_closed => OpeningHours::Open {
                open: day.open,
                close: day.close,
            },
            _ => OpeningHours::Closed,
        })
    }
}
