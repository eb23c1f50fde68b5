use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::booking::Booking;
use crate::court::Court;
use crate::errors::{BookingError, Result};
use crate::payouts::Payout;
use crate::types::{BookingId, BookingStatus, CourtId, OwnerId, PayoutId};

use super::BookingStore;

#[derive(Default)]
struct Tables {
    courts: HashMap<CourtId, Court>,
    bookings: HashMap<BookingId, Booking>,
    /// insertion order of `bookings`
    order: Vec<BookingId>,
    payouts: HashMap<PayoutId, Payout>,
}

impl Tables {
    fn ordered(&self) -> impl Iterator<Item = &Booking> + '_ {
        self.order.iter().filter_map(|id| self.bookings.get(id))
    }
}

/// Store held entirely in process memory behind one lock.
#[derive(Default)]
pub struct InMemoryBookingStore {
    tables: RwLock<Tables>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BookingStore for InMemoryBookingStore {
    fn court(&self, court_id: CourtId) -> Result<Option<Court>> {
        Ok(self.read().courts.get(&court_id).cloned())
    }

    fn save_court(&self, court: Court) -> Result<()> {
        self.write().courts.insert(court.id, court);
        Ok(())
    }

    fn bookings_on(&self, court_id: CourtId, date: NaiveDate) -> Result<Vec<Booking>> {
        let tables = self.read();
        Ok(tables
            .ordered()
            .filter(|b| b.court().court_id == court_id && b.date == date)
            .cloned()
            .collect())
    }

    fn booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(self.read().bookings.get(&booking_id).cloned())
    }

    fn insert_booking(&self, booking: Booking) -> Result<()> {
        let mut tables = self.write();
        if tables.bookings.contains_key(&booking.id) {
            return Err(BookingError::Storage {
                message: format!("booking {} already exists", booking.id),
            });
        }
        tables.order.push(booking.id);
        tables.bookings.insert(booking.id, booking);
        Ok(())
    }

    fn update_booking(&self, booking: Booking) -> Result<()> {
        let mut tables = self.write();
        match tables.bookings.get_mut(&booking.id) {
            Some(slot) => {
                *slot = booking;
                Ok(())
            }
            None => Err(BookingError::BookingNotFound {
                booking_id: booking.id,
            }),
        }
    }

    fn bookings_with_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        let tables = self.read();
        Ok(tables.ordered().filter(|b| b.status() == status).cloned().collect())
    }

    fn bookings_for_owner(&self, owner_id: OwnerId, start_date: NaiveDate, end_date: NaiveDate) -> Result<Vec<Booking>> {
        let tables = self.read();
        Ok(tables
            .ordered()
            .filter(|b| b.owner_id() == owner_id && b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }

    fn claim_for_payout(&self, payout: Payout, now: DateTime<Utc>) -> Result<()> {
        let mut tables = self.write();
        if tables.payouts.contains_key(&payout.id) {
            return Err(BookingError::Storage {
                message: format!("payout {} already exists", payout.id),
            });
        }

        // validate every claim before touching anything
        for booking_id in payout.booking_ids() {
            let booking = tables
                .bookings
                .get(&booking_id)
                .ok_or(BookingError::BookingNotFound { booking_id })?;
            if let Some(existing) = booking.payout_id() {
                return Err(BookingError::PayoutConflict {
                    booking_id,
                    payout_id: existing,
                });
            }
            if !booking.is_payout_eligible() {
                return Err(BookingError::validation(format!(
                    "booking {booking_id} is {:?} and cannot be paid out",
                    booking.status()
                )));
            }
        }

        for booking_id in payout.booking_ids() {
            if let Some(booking) = tables.bookings.get_mut(&booking_id) {
                booking.claim_for_payout(payout.id, now)?;
            }
        }
        tables.payouts.insert(payout.id, payout);
        Ok(())
    }

    fn update_payout(&self, payout: Payout, now: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.write();
        if !tables.payouts.contains_key(&payout.id) {
            return Err(BookingError::PayoutNotFound {
                payout_id: payout.id,
            });
        }

        let mut released = 0;
        if payout.status().releases_bookings() {
            for booking_id in payout.booking_ids() {
                if let Some(booking) = tables.bookings.get_mut(&booking_id) {
                    if booking.release_payout(payout.id, now) {
                        released += 1;
                    }
                }
            }
        }
        tables.payouts.insert(payout.id, payout);
        Ok(released)
    }

    fn payout(&self, payout_id: PayoutId) -> Result<Option<Payout>> {
        Ok(self.read().payouts.get(&payout_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::tests::{booking_on, completed_with_total};
    use crate::config::CourtPricingConfig;
    use crate::decimal::Money;
    use crate::payouts::{PayoutAggregator, PayoutPeriod};
    use crate::slot::TimeSlot;
    use crate::types::PayoutStatus;
    use uuid::Uuid;

    fn court() -> Court {
        Court::new(Uuid::new_v4(), "Centre", "tennis", CourtPricingConfig::flat(Money::from_major(60), "USD"))
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn payout_for(store: &InMemoryBookingStore, court: &Court) -> Payout {
        let bookings = store.bookings_for_owner(court.owner_id, d(1), d(30)).unwrap();
        let preview = PayoutAggregator::new().aggregate(court.owner_id, PayoutPeriod::new(d(1), d(30)).unwrap(), &bookings);
        Payout::from_preview(preview, Utc::now())
    }

    #[test]
    fn test_bookings_on_keeps_creation_order() {
        let store = InMemoryBookingStore::new();
        let court = court();
        let first = booking_on(&court, d(3), TimeSlot::parse("18:00", "19:00").unwrap());
        let second = booking_on(&court, d(3), TimeSlot::parse("08:00", "09:00").unwrap());
        store.insert_booking(first.clone()).unwrap();
        store.insert_booking(second.clone()).unwrap();
        store.insert_booking(booking_on(&court, d(4), TimeSlot::parse("08:00", "09:00").unwrap())).unwrap();

        let ids: Vec<BookingId> = store.bookings_on(court.id, d(3)).unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);

        assert!(store.insert_booking(first).is_err());
    }

    #[test]
    fn test_update_unknown_booking() {
        let store = InMemoryBookingStore::new();
        let booking = booking_on(&court(), d(3), TimeSlot::parse("18:00", "19:00").unwrap());
        assert!(matches!(
            store.update_booking(booking),
            Err(BookingError::BookingNotFound { .. })
        ));
    }

    #[test]
    fn test_claim_is_all_or_nothing() {
        let store = InMemoryBookingStore::new();
        let court = court();
        store.insert_booking(completed_with_total(&court, d(3), Money::from_major(100))).unwrap();
        store.insert_booking(completed_with_total(&court, d(4), Money::from_major(150))).unwrap();

        let first = payout_for(&store, &court);
        let stale = payout_for(&store, &court);
        store.claim_for_payout(first.clone(), Utc::now()).unwrap();

        let err = store.claim_for_payout(stale.clone(), Utc::now()).unwrap_err();
        assert!(matches!(err, BookingError::PayoutConflict { payout_id, .. } if payout_id == first.id));
        assert!(store.payout(stale.id).unwrap().is_none());
        for booking in store.bookings_for_owner(court.owner_id, d(1), d(30)).unwrap() {
            assert_eq!(booking.payout_id(), Some(first.id));
        }
    }

    #[test]
    fn test_failed_payout_releases_bookings() {
        let store = InMemoryBookingStore::new();
        let court = court();
        store.insert_booking(completed_with_total(&court, d(3), Money::from_major(100))).unwrap();

        let mut payout = payout_for(&store, &court);
        store.claim_for_payout(payout.clone(), Utc::now()).unwrap();

        payout.transition(PayoutStatus::Processing, Utc::now()).unwrap();
        assert_eq!(store.update_payout(payout.clone(), Utc::now()).unwrap(), 0);
        payout.transition(PayoutStatus::Failed, Utc::now()).unwrap();
        assert_eq!(store.update_payout(payout, Utc::now()).unwrap(), 1);

        let bookings = store.bookings_for_owner(court.owner_id, d(1), d(30)).unwrap();
        assert!(bookings[0].is_payout_eligible());
    }
}
