use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::booking::Booking;
use crate::config::BookingPolicy;
use crate::decimal::Money;
use crate::errors::Result;

const SECONDS_PER_HOUR: Decimal = dec!(3600);

/// Outcome of a refund evaluation. A refusal is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundDecision {
    pub eligible: bool,
    /// whole-number percent of the frozen total
    pub percentage: Decimal,
    pub amount: Money,
    pub hours_until_start: Decimal,
    pub reason: Option<String>,
}

impl RefundDecision {
    fn ineligible(hours_until_start: Decimal, reason: String) -> Self {
        Self {
            eligible: false,
            percentage: Decimal::ZERO,
            amount: Money::ZERO,
            hours_until_start,
            reason: Some(reason),
        }
    }
}

/// Tiered refund policy over the hours left before a booking starts.
#[derive(Debug, Clone)]
pub struct RefundEvaluator {
    policy: BookingPolicy,
}

impl RefundEvaluator {
    pub fn new(policy: &BookingPolicy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    /// Refund owed if `booking` were cancelled at `now`.
    ///
    /// Reads the booking's frozen total; nothing is priced again.
    pub fn evaluate(&self, booking: &Booking, now: DateTime<Utc>) -> Result<RefundDecision> {
        let start = booking.start_instant()?;
        let hours = Decimal::from((start - now).num_seconds()) / SECONDS_PER_HOUR;
        let shown_hours = hours.round_dp(2);

        if !booking.status().is_cancellable() {
            return Ok(RefundDecision::ineligible(
                shown_hours,
                format!("booking is already {:?}", booking.status()),
            ));
        }

        let policy = &self.policy;
        if hours < policy.cancellation_deadline_hours {
            return Ok(RefundDecision::ineligible(
                shown_hours,
                format!(
                    "cancellations must be made at least {} hours before the start time",
                    policy.cancellation_deadline_hours
                ),
            ));
        }

        let percentage = if hours >= policy.full_refund_hours {
            Decimal::ONE_HUNDRED
        } else if hours >= policy.partial_refund_hours {
            policy.refund_percentage
        } else {
            policy.late_refund_percentage
        };

        Ok(RefundDecision {
            eligible: true,
            percentage,
            amount: booking.total_amount().percentage(percentage),
            hours_until_start: shown_hours,
            reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::tests::booking_on;
    use crate::config::CourtPricingConfig;
    use crate::court::Court;
    use crate::slot::TimeSlot;
    use crate::types::BookingStatus;
    use chrono::{Duration, NaiveDate, TimeZone};
    use uuid::Uuid;

    fn booking() -> Booking {
        let court = Court::new(Uuid::new_v4(), "Centre", "tennis", CourtPricingConfig::flat(Money::from_major(60), "USD"));
        booking_on(
            &court,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            TimeSlot::parse("14:00", "16:00").unwrap(),
        )
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 14, 0, 0).unwrap()
    }

    fn evaluator() -> RefundEvaluator {
        RefundEvaluator::new(&BookingPolicy::default())
    }

    #[test]
    fn test_thirty_hours_out_gets_partial() {
        let decision = evaluator().evaluate(&booking(), start() - Duration::hours(30)).unwrap();
        assert!(decision.eligible);
        assert_eq!(decision.percentage, dec!(80));
        // 80% of 142.56
        assert_eq!(decision.amount, Money::from_str_exact("114.05").unwrap());
        assert_eq!(decision.hours_until_start, dec!(30));
    }

    #[test]
    fn test_inside_deadline_is_refused() {
        let decision = evaluator().evaluate(&booking(), start() - Duration::hours(10)).unwrap();
        assert!(!decision.eligible);
        assert_eq!(decision.amount, Money::ZERO);
        assert!(decision.reason.unwrap().contains("24 hours"));
    }

    #[test]
    fn test_tier_edges() {
        let booking = booking();
        let at = |h: i64| evaluator().evaluate(&booking, start() - Duration::hours(h)).unwrap();

        assert_eq!(at(48).percentage, Decimal::ONE_HUNDRED);
        assert_eq!(at(48).amount, booking.total_amount());
        assert_eq!(at(47).percentage, dec!(80));
        assert_eq!(at(24).percentage, dec!(80));
        assert!(!at(23).eligible);

        let just_short = evaluator()
            .evaluate(&booking, start() - Duration::hours(24) + Duration::seconds(1))
            .unwrap();
        assert!(!just_short.eligible);
    }

    #[test]
    fn test_late_tier_when_deadline_is_shorter() {
        let policy = BookingPolicy::default().with_cancellation_deadline_hours(dec!(12));
        let evaluator = RefundEvaluator::new(&policy);
        let booking = booking();

        let decision = evaluator.evaluate(&booking, start() - Duration::hours(20)).unwrap();
        assert!(decision.eligible);
        assert_eq!(decision.percentage, dec!(50));
        assert_eq!(decision.amount, Money::from_str_exact("71.28").unwrap());

        assert!(!evaluator.evaluate(&booking, start() - Duration::hours(11)).unwrap().eligible);
    }

    #[test]
    fn test_terminal_booking_not_eligible() {
        let mut booking = booking();
        booking.force_status(BookingStatus::Completed);
        let decision = evaluator().evaluate(&booking, start() - Duration::hours(100)).unwrap();
        assert!(!decision.eligible);
        assert_eq!(decision.percentage, Decimal::ZERO);
    }

    #[test]
    fn test_started_booking_not_eligible() {
        let decision = evaluator().evaluate(&booking(), start() + Duration::hours(1)).unwrap();
        assert!(!decision.eligible);
        assert_eq!(decision.hours_until_start, dec!(-1));
    }
}
