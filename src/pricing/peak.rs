use chrono::{Datelike, NaiveDate};

use crate::config::CourtPricingConfig;
use crate::decimal::Money;
use crate::slot::TimeSlot;

/// hourly rate chosen for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSelection {
    pub hourly_rate: Money,
    pub is_peak_hour: bool,
}

/// Pick the hourly rate for a slot.
///
/// Only the start hour is compared with the peak windows; a booking that runs into
/// or out of a window mid-way is priced entirely by where it starts.
pub fn select_rate(pricing: &CourtPricingConfig, date: NaiveDate, slot: &TimeSlot) -> RateSelection {
    let weekday = date.weekday();
    let hour = slot.start().hour();
    let in_window = pricing
        .peak_windows
        .iter()
        .any(|window| window.covers_hour(weekday, hour));

    match pricing.peak_hour_rate {
        Some(peak) if in_window => RateSelection {
            hourly_rate: peak,
            is_peak_hour: true,
        },
        _ => RateSelection {
            hourly_rate: pricing.hourly_rate,
            is_peak_hour: in_window,
        },
    }
}
