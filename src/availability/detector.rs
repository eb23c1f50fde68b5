use chrono::NaiveDate;
use tracing::debug;

use crate::booking::Booking;
use crate::config::OpeningHours;
use crate::court::Court;
use crate::errors::{BookingError, Result};
use crate::slot::{SlotTime, TimeSlot};
use crate::types::CourtId;

use super::{Availability, ConflictInfo, UnavailableReason};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Decides whether a slot can be granted against a point-in-time snapshot of a
/// court's bookings.
///
/// The detector is pure. Callers that act on an `Available` answer must hold the
/// court's critical section between the check and the write.
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector {
    buffer_minutes: u32,
}

impl ConflictDetector {
    pub fn new(buffer_minutes: u32) -> Self {
        Self { buffer_minutes }
    }

    pub fn buffer_minutes(&self) -> u32 {
        self.buffer_minutes
    }

    /// check a candidate slot; `court` is `None` when the id did not resolve
    pub fn check(
        &self,
        court_id: CourtId,
        court: Option<&Court>,
        date: NaiveDate,
        slot: &TimeSlot,
        existing: &[Booking],
    ) -> Result<Availability> {
        let Some(court) = court else {
            return Ok(Availability::Unavailable(UnavailableReason::CourtNotFound { court_id }));
        };

        match court.availability.hours_on(date)? {
            OpeningHours::Closed => {
                return Ok(Availability::Unavailable(UnavailableReason::Closed { date }));
            }
            OpeningHours::Open { open, close } if !slot.within(open, close) => {
                return Ok(Availability::Unavailable(
                    UnavailableReason::OutsideOperatingHours { open, close },
                ));
            }
            OpeningHours::Open { .. } => {}
        }

        Ok(match self.first_conflict(court.id, date, slot, existing) {
            Some(conflict) => {
                debug!(
                    court_id = %court.id,
                    %date,
                    candidate = %slot,
                    conflicting_booking = %conflict.booking_id,
                    "slot refused"
                );
                Availability::Unavailable(UnavailableReason::Conflict(conflict))
            }
            None => Availability::Available,
        })
    }

    /// first blocking booking in iteration order that overlaps the buffered candidate
    pub fn first_conflict(
        &self,
        court_id: CourtId,
        date: NaiveDate,
        slot: &TimeSlot,
        existing: &[Booking],
    ) -> Option<ConflictInfo> {
        existing
            .iter()
            .filter(|b| b.court().court_id == court_id && b.date == date)
            .filter(|b| b.status().blocks_slot())
            .find(|b| slot.overlaps_buffered(&b.slot, self.buffer_minutes))
            .map(|b| ConflictInfo {
                booking_id: b.id,
                start_time: b.slot.start(),
                end_time: b.slot.end(),
            })
    }

    /// Every fixed-length slot inside the day's opening window that `check`
    /// would grant, stepping by `slot_minutes` from opening time.
    pub fn open_slots(
        &self,
        court: &Court,
        date: NaiveDate,
        slot_minutes: u32,
        existing: &[Booking],
    ) -> Result<Vec<TimeSlot>> {
        if slot_minutes == 0 || slot_minutes > MINUTES_PER_DAY {
            return Err(BookingError::validation(format!(
                "slot length must be within 1..={MINUTES_PER_DAY} minutes, got {slot_minutes}"
            )));
        }
        let (open, close) = match court.availability.hours_on(date)? {
            OpeningHours::Closed => return Ok(Vec::new()),
            OpeningHours::Open { open, close } => (open, close),
        };

        let mut slots = Vec::new();
        let mut start = open.minutes();
        while start + slot_minutes <= close.minutes() {
            let slot = TimeSlot::new(
                SlotTime::from_minutes(start)?,
                SlotTime::from_minutes(start + slot_minutes)?,
            )?;
            if self.first_conflict(court.id, date, &slot, existing).is_none() {
                slots.push(slot);
            }
            start += slot_minutes;
        }
        Ok(slots)
    }
}
