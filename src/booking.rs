use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::court::CourtSnapshot;
use crate::decimal::Money;
use crate::errors::{BookingError, Result};
use crate::pricing::PriceBreakdown;
use crate::slot::TimeSlot;
use crate::types::{BookingId, BookingStatus, CancelledBy, OwnerId, PayoutId, UserId};

/// how a booking was cancelled and what the user gets back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
    pub refund_eligible: bool,
    pub refund_percentage: Decimal,
    pub refund_amount: Money,
}

/// A reservation of one court for one same-day interval.
///
/// The court snapshot and price breakdown are fixed at creation and have no
/// setters. Status only moves along the edges allowed by
/// [`BookingStatus::can_transition_to`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// human-facing reference, `BK-YYYYMMDD-XXXXXXXX`
    pub reference: String,
    court: CourtSnapshot,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pricing: PriceBreakdown,
    status: BookingStatus,
    cancellation: Option<Cancellation>,
    payout_id: Option<PayoutId>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub(crate) fn new(
        id: BookingId,
        court: CourtSnapshot,
        user_id: UserId,
        date: NaiveDate,
        slot: TimeSlot,
        pricing: PriceBreakdown,
        now: DateTime<Utc>,
    ) -> Self {
        let short = id.simple().to_string()[..8].to_uppercase();
        Self {
            id,
            reference: format!("BK-{}-{}", date.format("%Y%m%d"), short),
            court,
            user_id,
            date,
            slot,
            pricing,
            status: BookingStatus::Pending,
            cancellation: None,
            payout_id: None,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn court(&self) -> &CourtSnapshot {
        &self.court
    }

    pub fn owner_id(&self) -> OwnerId {
        self.court.owner_id
    }

    pub fn pricing(&self) -> &PriceBreakdown {
        &self.pricing
    }

    pub fn total_amount(&self) -> Money {
        self.pricing.total_amount
    }

    pub fn duration_hours(&self) -> Decimal {
        self.pricing.duration_hours
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn payout_id(&self) -> Option<PayoutId> {
        self.payout_id
    }

    pub fn payout_processed(&self) -> bool {
        self.payout_id.is_some()
    }

    /// completed and not yet claimed by any payout
    pub fn is_payout_eligible(&self) -> bool {
        self.status == BookingStatus::Completed && self.payout_id.is_none()
    }

    pub fn start_instant(&self) -> Result<DateTime<Utc>> {
        self.slot.start_instant(self.date, self.court.utc_offset_minutes)
    }

    pub fn end_instant(&self) -> Result<DateTime<Utc>> {
        self.slot.end_instant(self.date, self.court.utc_offset_minutes)
    }

    /// move to `to`, returning the previous status
    fn transition(&mut self, to: BookingStatus, now: DateTime<Utc>) -> Result<BookingStatus> {
        if !self.status.can_transition_to(to) {
            return Err(BookingError::InvalidTransition {
                booking_id: self.id,
                from: self.status,
                to,
            });
        }
        let previous = self.status;
        self.status = to;
        self.updated_at = now;
        Ok(previous)
    }

    pub fn confirm(&mut self, payment_reference: Option<String>, now: DateTime<Utc>) -> Result<()> {
        self.transition(BookingStatus::Confirmed, now)?;
        self.payment_reference = payment_reference;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(BookingStatus::InProgress, now).map(|_| ())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(BookingStatus::Completed, now).map(|_| ())
    }

    pub fn mark_no_show(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(BookingStatus::NoShow, now).map(|_| ())
    }

    /// record the cancellation; returns the status the booking was cancelled from
    pub fn cancel(&mut self, cancellation: Cancellation) -> Result<BookingStatus> {
        let previous = self.transition(BookingStatus::Cancelled, cancellation.cancelled_at)?;
        self.cancellation = Some(cancellation);
        Ok(previous)
    }

    pub(crate) fn claim_for_payout(&mut self, payout_id: PayoutId, now: DateTime<Utc>) -> Result<()> {
        if let Some(existing) = self.payout_id {
            return Err(BookingError::PayoutConflict {
                booking_id: self.id,
                payout_id: existing,
            });
        }
        if self.status != BookingStatus::Completed {
            return Err(BookingError::validation(format!(
                "booking {} is {:?}, only completed bookings can be paid out",
                self.id, self.status
            )));
        }
        self.payout_id = Some(payout_id);
        self.updated_at = now;
        Ok(())
    }

    /// drop the claim if `payout_id` holds it
    pub(crate) fn release_payout(&mut self, payout_id: PayoutId, now: DateTime<Utc>) -> bool {
        if self.payout_id == Some(payout_id) {
            self.payout_id = None;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn force_status(&mut self, status: BookingStatus) {
        self.status = status;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{BookingPolicy, CourtPricingConfig};
    use crate::court::Court;
    use crate::pricing::{select_rate, BaseQuote, PricingCalculator};
    use crate::promotions::DiscountResolution;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    /// pending booking priced at the court's rate under the default policy
    pub(crate) fn booking_on(court: &Court, date: NaiveDate, slot: TimeSlot) -> Booking {
        let rate = select_rate(&court.pricing, date, &slot);
        let base = BaseQuote {
            court_id: court.id,
            currency: court.pricing.currency.clone(),
            hourly_rate: rate.hourly_rate,
            is_peak_hour: rate.is_peak_hour,
            duration_hours: slot.duration_hours(),
            subtotal: Money::from_decimal(rate.hourly_rate.as_decimal() * slot.duration_hours()),
        };
        let pricing = PricingCalculator::from_policy(&BookingPolicy::default())
            .finalize(&base, DiscountResolution::none())
            .unwrap();
        Booking::new(Uuid::new_v4(), court.snapshot(), Uuid::new_v4(), date, slot, pricing, created())
    }

    /// completed booking whose frozen total is exactly `total`
    pub(crate) fn completed_with_total(court: &Court, date: NaiveDate, total: Money) -> Booking {
        let mut booking = booking_on(court, date, TimeSlot::parse("10:00", "11:00").unwrap());
        booking.pricing.total_amount = total;
        booking.status = BookingStatus::Completed;
        booking
    }

    fn court() -> Court {
        Court::new(Uuid::new_v4(), "Centre", "tennis", CourtPricingConfig::flat(Money::from_major(60), "USD"))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[test]
    fn test_new_booking_is_pending_with_reference() {
        let booking = booking_on(&court(), date(), TimeSlot::parse("14:00", "16:00").unwrap());
        assert_eq!(booking.status(), BookingStatus::Pending);
        assert!(booking.reference.starts_with("BK-20240610-"));
        assert_eq!(booking.reference.len(), "BK-20240610-".len() + 8);
        assert_eq!(booking.total_amount(), Money::from_str_exact("142.56").unwrap());
        assert!(!booking.payout_processed());
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut booking = booking_on(&court(), date(), TimeSlot::parse("14:00", "16:00").unwrap());
        booking.confirm(Some("pay_123".to_string()), created()).unwrap();
        booking.start(created()).unwrap();
        booking.complete(created()).unwrap();
        assert_eq!(booking.status(), BookingStatus::Completed);
        assert_eq!(booking.payment_reference.as_deref(), Some("pay_123"));
        assert!(booking.is_payout_eligible());
    }

    #[test]
    fn test_illegal_transitions() {
        let mut booking = booking_on(&court(), date(), TimeSlot::parse("14:00", "16:00").unwrap());
        let err = booking.mark_no_show(created()).unwrap_err();
        assert_eq!(
            err,
            BookingError::InvalidTransition {
                booking_id: booking.id,
                from: BookingStatus::Pending,
                to: BookingStatus::NoShow,
            }
        );

        booking.force_status(BookingStatus::Completed);
        let cancellation = Cancellation {
            cancelled_at: created(),
            cancelled_by: CancelledBy::System,
            reason: None,
            refund_eligible: false,
            refund_percentage: Decimal::ZERO,
            refund_amount: Money::ZERO,
        };
        assert!(booking.cancel(cancellation).is_err());
        assert!(booking.cancellation().is_none());
    }

    #[test]
    fn test_payout_claim_is_exclusive() {
        let mut booking = completed_with_total(&court(), date(), Money::from_major(100));
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        booking.claim_for_payout(first, created()).unwrap();
        let err = booking.claim_for_payout(second, created()).unwrap_err();
        assert_eq!(err, BookingError::PayoutConflict { booking_id: booking.id, payout_id: first });

        assert!(!booking.release_payout(second, created()));
        assert!(booking.release_payout(first, created()));
        assert!(booking.is_payout_eligible());
    }

    #[test]
    fn test_start_instant_uses_court_offset() {
        let court = court().with_utc_offset_minutes(120);
        let booking = booking_on(&court, date(), TimeSlot::parse("14:00", "16:00").unwrap());
        assert_eq!(booking.start_instant().unwrap(), Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap());
    }
}
