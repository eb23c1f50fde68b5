use crate::booking::Booking;
use crate::decimal::Money;
use crate::types::OwnerId;

use super::{PayoutLine, PayoutPeriod, PayoutPreview};

/// Sums an owner's eligible bookings into a payout preview.
///
/// Commission on each booking is its frozen total at the platform fee rate that
/// booking was priced under, so a later policy change never restates history.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayoutAggregator;

impl PayoutAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn line_for(&self, booking: &Booking) -> PayoutLine {
        let amount = booking.total_amount();
        let commission = amount.apply_rate(booking.pricing().platform_fee_rate);
        PayoutLine {
            booking_id: booking.id,
            reference: booking.reference.clone(),
            date: booking.date,
            amount,
            commission,
            net_amount: amount - commission,
        }
    }

    /// Completed, unclaimed bookings of `owner_id` dated inside `period`, ordered
    /// by date, start time and id.
    pub fn aggregate<'a>(
        &self,
        owner_id: OwnerId,
        period: PayoutPeriod,
        bookings: impl IntoIterator<Item = &'a Booking>,
    ) -> PayoutPreview {
        let mut eligible: Vec<&Booking> = bookings
            .into_iter()
            .filter(|b| b.owner_id() == owner_id)
            .filter(|b| period.contains(b.date))
            .filter(|b| b.is_payout_eligible())
            .collect();
        eligible.sort_by_key(|b| (b.date, b.slot.start(), b.id));

        let lines: Vec<PayoutLine> = eligible.into_iter().map(|b| self.line_for(b)).collect();
        let total_revenue: Money = lines.iter().map(|l| l.amount).sum();
        let platform_fee: Money = lines.iter().map(|l| l.commission).sum();
        let net_amount: Money = lines.iter().map(|l| l.net_amount).sum();

        PayoutPreview {
            owner_id,
            period,
            total_bookings: lines.len(),
            total_revenue,
            platform_fee,
            net_amount,
            bookings: lines,
        }
    }
}
