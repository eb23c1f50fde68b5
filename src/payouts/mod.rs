//! Owner payouts.
//!
//! A payout batches an owner's completed, unclaimed bookings for a date range.
//! Amounts come from each booking's frozen price breakdown.

pub mod aggregator;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BookingError, Result};
use crate::types::{BookingId, OwnerId, PayoutId, PayoutStatus};

pub use aggregator::PayoutAggregator;

/// inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PayoutPeriod {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if end_date < start_date {
            return Err(BookingError::validation(format!(
                "payout period ends {end_date} before it starts {start_date}"
            )));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// one booking's share of a payout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutLine {
    pub booking_id: BookingId,
    pub reference: String,
    pub date: NaiveDate,
    pub amount: Money,
    pub commission: Money,
    pub net_amount: Money,
}

/// computed payout that has not claimed anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPreview {
    pub owner_id: OwnerId,
    pub period: PayoutPeriod,
    pub total_bookings: usize,
    pub total_revenue: Money,
    pub platform_fee: Money,
    pub net_amount: Money,
    pub bookings: Vec<PayoutLine>,
}

impl PayoutPreview {
    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}

/// a settlement batch that owns its bookings until it completes or is released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: PayoutId,
    pub owner_id: OwnerId,
    pub period: PayoutPeriod,
    pub bookings: Vec<PayoutLine>,
    pub total_revenue: Money,
    pub platform_fee: Money,
    pub net_amount: Money,
    status: PayoutStatus,
    pub transfer_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    pub(crate) fn from_preview(preview: PayoutPreview, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: preview.owner_id,
            period: preview.period,
            bookings: preview.bookings,
            total_revenue: preview.total_revenue,
            platform_fee: preview.platform_fee,
            net_amount: preview.net_amount,
            status: PayoutStatus::Pending,
            transfer_reference: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> PayoutStatus {
        self.status
    }

    pub fn booking_ids(&self) -> impl Iterator<Item = BookingId> + '_ {
        self.bookings.iter().map(|line| line.booking_id)
    }

    /// move to `to`, returning the previous status
    pub(crate) fn transition(&mut self, to: PayoutStatus, now: DateTime<Utc>) -> Result<PayoutStatus> {
        if !self.status.can_transition_to(to) {
            return Err(BookingError::InvalidPayoutTransition {
                from: self.status,
                to,
            });
        }
        let previous = self.status;
        self.status = to;
        self.updated_at = now;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn payout() -> Payout {
        let preview = PayoutPreview {
            owner_id: Uuid::new_v4(),
            period: PayoutPeriod::new(d(1), d(30)).unwrap(),
            total_bookings: 0,
            total_revenue: Money::ZERO,
            platform_fee: Money::ZERO,
            net_amount: Money::ZERO,
            bookings: Vec::new(),
        };
        Payout::from_preview(preview, Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_period_is_inclusive() {
        let period = PayoutPeriod::new(d(1), d(7)).unwrap();
        assert!(period.contains(d(1)));
        assert!(period.contains(d(7)));
        assert!(!period.contains(d(8)));
        assert!(PayoutPeriod::new(d(7), d(1)).is_err());
    }

    #[test]
    fn test_payout_transitions() {
        let now = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
        let mut payout = payout();
        assert_eq!(payout.status(), PayoutStatus::Pending);

        assert!(payout.transition(PayoutStatus::Completed, now).is_err());
        assert_eq!(payout.transition(PayoutStatus::Processing, now).unwrap(), PayoutStatus::Pending);
        assert!(payout.transition(PayoutStatus::Cancelled, now).is_err());
        payout.transition(PayoutStatus::Failed, now).unwrap();
        assert_eq!(payout.status(), PayoutStatus::Failed);
        assert_eq!(payout.updated_at, now);
    }
}
