//! Persistence seam for courts, bookings and payouts.
//!
//! The engine only talks to [`BookingStore`]; [`InMemoryBookingStore`] is the
//! bundled implementation.

pub mod locks;
pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};

use crate::booking::Booking;
use crate::court::Court;
use crate::errors::Result;
use crate::payouts::Payout;
use crate::types::{BookingId, BookingStatus, CourtId, OwnerId, PayoutId};

pub use locks::CourtLocks;
pub use memory::InMemoryBookingStore;

pub trait BookingStore: Send + Sync {
    fn court(&self, court_id: CourtId) -> Result<Option<Court>>;

    fn save_court(&self, court: Court) -> Result<()>;

    /// every booking of the court on `date`, in creation order
    fn bookings_on(&self, court_id: CourtId, date: NaiveDate) -> Result<Vec<Booking>>;

    fn booking(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    fn insert_booking(&self, booking: Booking) -> Result<()>;

    /// replace an existing booking; `BookingNotFound` if it was never inserted
    fn update_booking(&self, booking: Booking) -> Result<()>;

    fn bookings_with_status(&self, status: BookingStatus) -> Result<Vec<Booking>>;

    fn bookings_for_owner(&self, owner_id: OwnerId, start_date: NaiveDate, end_date: NaiveDate) -> Result<Vec<Booking>>;

    /// Persist a new payout and mark every booking it lists as claimed by it.
    ///
    /// All or nothing: if any booking is missing, not completed, or already
    /// claimed, nothing is written.
    fn claim_for_payout(&self, payout: Payout, now: DateTime<Utc>) -> Result<()>;

    /// Save a payout's new state. When the status releases bookings, their claims
    /// are dropped in the same write; returns how many were released.
    fn update_payout(&self, payout: Payout, now: DateTime<Utc>) -> Result<usize>;

    fn payout(&self, payout_id: PayoutId) -> Result<Option<Payout>>;
}
