use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::slot::TimeSlot;
use crate::types::{
    BookingId, BookingStatus, CancelledBy, CourtId, OwnerId, PayoutId, PayoutStatus, PromotionId,
    UserId,
};

/// all events that can be emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    BookingCreated {
        booking_id: BookingId,
        court_id: CourtId,
        user_id: UserId,
        date: NaiveDate,
        slot: TimeSlot,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
    BookingConfirmed {
        booking_id: BookingId,
        payment_reference: Option<String>,
        timestamp: DateTime<Utc>,
    },
    BookingStarted {
        booking_id: BookingId,
        timestamp: DateTime<Utc>,
    },
    BookingCompleted {
        booking_id: BookingId,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
    BookingCancelled {
        booking_id: BookingId,
        cancelled_by: CancelledBy,
        previous_status: BookingStatus,
        refund_eligible: bool,
        refund_amount: Money,
        timestamp: DateTime<Utc>,
    },
    BookingNoShow {
        booking_id: BookingId,
        timestamp: DateTime<Utc>,
    },

    // promotion events
    CouponRedeemed {
        promotion_id: PromotionId,
        code: Option<String>,
        booking_id: BookingId,
        user_id: UserId,
        discount: Money,
        timestamp: DateTime<Utc>,
    },
    CouponReleased {
        promotion_id: PromotionId,
        code: Option<String>,
        booking_id: BookingId,
        timestamp: DateTime<Utc>,
    },

    // payout events
    PayoutCreated {
        payout_id: PayoutId,
        owner_id: OwnerId,
        booking_count: usize,
        total_revenue: Money,
        net_amount: Money,
        timestamp: DateTime<Utc>,
    },
    PayoutStatusChanged {
        payout_id: PayoutId,
        old_status: PayoutStatus,
        new_status: PayoutStatus,
        released_bookings: usize,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// booking the event concerns, if any
    pub fn booking_id(&self) -> Option<BookingId> {
        match self {
            Event::BookingCreated { booking_id, .. }
            | Event::BookingConfirmed { booking_id, .. }
            | Event::BookingStarted { booking_id, .. }
            | Event::BookingCompleted { booking_id, .. }
            | Event::BookingCancelled { booking_id, .. }
            | Event::BookingNoShow { booking_id, .. }
            | Event::CouponRedeemed { booking_id, .. }
            | Event::CouponReleased { booking_id, .. } => Some(*booking_id),
            Event::PayoutCreated { .. } | Event::PayoutStatusChanged { .. } => None,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// move another store's events onto the end of this one
    pub fn absorb(&mut self, other: &mut EventStore) {
        self.events.append(&mut other.events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
