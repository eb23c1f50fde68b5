/// serialization support for bookings and payouts
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::booking::Booking;
use crate::decimal::{Money, Rate};
use crate::payouts::{Payout, PayoutLine};
use crate::slot::SlotTime;
use crate::types::{BookingId, BookingStatus, CancelledBy, CourtId, OwnerId, PayoutId, PayoutStatus, UserId};

/// serializable view of a booking as shown to players and owners
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingView {
    pub id: BookingId,
    pub reference: String,
    pub status: BookingStatus,
    pub court: CourtView,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    pub duration_hours: Decimal,
    pub pricing: PricingView,
    pub cancellation: Option<CancellationView>,
    pub payment_reference: Option<String>,
    pub payout_processed: bool,
    pub payout_id: Option<PayoutId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourtView {
    pub id: CourtId,
    pub owner_id: OwnerId,
    pub name: String,
    pub sport: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PricingView {
    pub hourly_rate: Money,
    pub is_peak_hour: bool,
    pub subtotal: Money,
    pub discount: Money,
    pub discount_code: Option<String>,
    pub subtotal_after_discount: Money,
    pub platform_fee: Money,
    pub platform_fee_rate: Rate,
    pub tax: Money,
    pub tax_rate: Rate,
    pub total_amount: Money,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancellationView {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
    pub refund_eligible: bool,
    pub refund_percentage: Decimal,
    pub refund_amount: Money,
}

impl BookingView {
    pub fn from_booking(booking: &Booking) -> Self {
        let court = booking.court();
        let pricing = booking.pricing();
        BookingView {
            id: booking.id,
            reference: booking.reference.clone(),
            status: booking.status(),
            court: CourtView {
                id: court.court_id,
                owner_id: court.owner_id,
                name: court.name.clone(),
                sport: court.sport.clone(),
            },
            user_id: booking.user_id,
            date: booking.date,
            start_time: booking.slot.start(),
            end_time: booking.slot.end(),
            duration_hours: booking.duration_hours(),
            pricing: PricingView {
                hourly_rate: pricing.hourly_rate,
                is_peak_hour: pricing.is_peak_hour,
                subtotal: pricing.subtotal,
                discount: pricing.discount.amount,
                discount_code: pricing.discount.code.clone(),
                subtotal_after_discount: pricing.subtotal_after_discount,
                platform_fee: pricing.platform_fee,
                platform_fee_rate: pricing.platform_fee_rate,
                tax: pricing.tax,
                tax_rate: pricing.tax_rate,
                total_amount: pricing.total_amount,
                currency: pricing.currency.clone(),
            },
            cancellation: booking.cancellation().map(|c| CancellationView {
                cancelled_at: c.cancelled_at,
                cancelled_by: c.cancelled_by,
                reason: c.reason.clone(),
                refund_eligible: c.refund_eligible,
                refund_percentage: c.refund_percentage,
                refund_amount: c.refund_amount,
            }),
            payment_reference: booking.payment_reference.clone(),
            payout_processed: booking.payout_processed(),
            payout_id: booking.payout_id(),
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// serializable view of a payout batch
#[derive(Debug, Serialize, Deserialize)]
pub struct PayoutView {
    pub id: PayoutId,
    pub owner_id: OwnerId,
    pub status: PayoutStatus,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_bookings: usize,
    pub total_revenue: Money,
    pub platform_fee: Money,
    pub net_amount: Money,
    pub bookings: Vec<PayoutLine>,
    pub transfer_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutView {
    pub fn from_payout(payout: &Payout) -> Self {
        PayoutView {
            id: payout.id,
            owner_id: payout.owner_id,
            status: payout.status(),
            period_start: payout.period.start_date,
            period_end: payout.period.end_date,
            total_bookings: payout.bookings.len(),
            total_revenue: payout.total_revenue,
            platform_fee: payout.platform_fee,
            net_amount: payout.net_amount,
            bookings: payout.bookings.clone(),
            transfer_reference: payout.transfer_reference.clone(),
            failure_reason: payout.failure_reason.clone(),
            created_at: payout.created_at,
            updated_at: payout.updated_at,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
