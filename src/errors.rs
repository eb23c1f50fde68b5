use chrono::NaiveDate;
use thiserror::Error;

use crate::availability::UnavailableReason;
use crate::types::{BookingId, BookingStatus, CourtId, CourtStatus, OwnerId, PayoutId, PayoutStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("slot unavailable: {reason}")]
    SlotUnavailable {
        reason: UnavailableReason,
    },

    #[error("court not found: {court_id}")]
    CourtNotFound {
        court_id: CourtId,
    },

    #[error("court {court_id} is not bookable: current status is {status:?}")]
    CourtNotBookable {
        court_id: CourtId,
        status: CourtStatus,
    },

    #[error("coupon expired: {code}")]
    CouponExpired {
        code: String,
    },

    #[error("coupon exhausted: {code}")]
    CouponExhausted {
        code: String,
    },

    #[error("coupon {code} not applicable: {reason}")]
    CouponNotApplicable {
        code: String,
        reason: String,
    },

    #[error("booking not found: {booking_id}")]
    BookingNotFound {
        booking_id: BookingId,
    },

    #[error("invalid transition for booking {booking_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("no eligible bookings for owner {owner_id} between {start_date} and {end_date}")]
    NoEligibleBookings {
        owner_id: OwnerId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("booking {booking_id} already claimed by payout {payout_id}")]
    PayoutConflict {
        booking_id: BookingId,
        payout_id: PayoutId,
    },

    #[error("payout not found: {payout_id}")]
    PayoutNotFound {
        payout_id: PayoutId,
    },

    #[error("invalid payout transition: {from:?} -> {to:?}")]
    InvalidPayoutTransition {
        from: PayoutStatus,
        to: PayoutStatus,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },
}

impl BookingError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation {
            message: message.into(),
        }
    }

    /// whether the caller can succeed by changing its input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BookingError::Validation { .. }
                | BookingError::SlotUnavailable { .. }
                | BookingError::CouponExpired { .. }
                | BookingError::CouponExhausted { .. }
                | BookingError::CouponNotApplicable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
