use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::availability::{Availability, ConflictDetector};
use crate::booking::{Booking, Cancellation};
use crate::config::BookingPolicy;
use crate::court::Court;
use crate::decimal::Money;
use crate::errors::{BookingError, Result};
use crate::events::{Event, EventStore};
use crate::payouts::{Payout, PayoutAggregator, PayoutPeriod, PayoutPreview};
use crate::pricing::{BaseQuote, PriceBreakdown, PriceOptions, PricingCalculator};
use crate::promotions::{DiscountContext, DiscountResolution, Promotion, PromotionRegistry};
use crate::refund::{RefundDecision, RefundEvaluator};
use crate::slot::TimeSlot;
use crate::store::{BookingStore, CourtLocks, InMemoryBookingStore};
use crate::types::{
    BookingId, BookingStatus, CancelledBy, CourtId, OwnerId, PayoutId, PayoutStatus, PromotionId,
    UserId,
};

/// a request to reserve a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub court_id: CourtId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub duration_hours: Decimal,
    #[serde(default)]
    pub coupon_codes: Vec<String>,
}

impl CreateBookingRequest {
    /// request for `start_time`-`end_time` (`HH:MM`) with the duration derived from the slot
    pub fn new(
        court_id: CourtId,
        user_id: UserId,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Result<Self> {
        let slot = TimeSlot::parse(start_time, end_time)?;
        Ok(Self {
            court_id,
            user_id,
            date,
            duration_hours: slot.duration_hours(),
            slot,
            coupon_codes: Vec::new(),
        })
    }

    pub fn with_duration_hours(mut self, duration_hours: Decimal) -> Self {
        self.duration_hours = duration_hours;
        self
    }

    pub fn with_coupon_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coupon_codes = codes.into_iter().map(Into::into).collect();
        self
    }
}

/// cancelled booking together with the refund recorded on it
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub refund: RefundDecision,
}

/// Booking arbitration, pricing, refunds and payouts over one store.
///
/// Every creation runs "check availability, then persist" inside the court's
/// critical section, and every coupon use is a check-and-increment under the
/// coupon's own lock, so the engine can be shared across threads.
pub struct BookingEngine<S: BookingStore = InMemoryBookingStore> {
    store: S,
    policy: BookingPolicy,
    detector: ConflictDetector,
    calculator: PricingCalculator,
    refunds: RefundEvaluator,
    aggregator: PayoutAggregator,
    promotions: PromotionRegistry,
    court_locks: CourtLocks,
    payout_lock: Mutex<()>,
    events: Mutex<EventStore>,
}

impl BookingEngine<InMemoryBookingStore> {
    pub fn in_memory(policy: BookingPolicy) -> Result<Self> {
        Self::new(policy, InMemoryBookingStore::new())
    }
}

impl<S: BookingStore> BookingEngine<S> {
    pub fn new(policy: BookingPolicy, store: S) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            detector: ConflictDetector::new(policy.booking_buffer_minutes),
            calculator: PricingCalculator::from_policy(&policy),
            refunds: RefundEvaluator::new(&policy),
            aggregator: PayoutAggregator::new(),
            promotions: PromotionRegistry::new(),
            court_locks: CourtLocks::new(),
            payout_lock: Mutex::new(()),
            events: Mutex::new(EventStore::new()),
            store,
            policy,
        })
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn promotions(&self) -> &PromotionRegistry {
        &self.promotions
    }

    /// drain events emitted since the last call
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).take_events()
    }

    fn emit(&self, event: Event) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).emit(event);
    }

    fn absorb(&self, scratch: &mut EventStore) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).absorb(scratch);
    }

    // courts and promotions

    /// register or replace a court; broken pricing is rejected
    pub fn add_court(&self, court: Court) -> Result<CourtId> {
        for warning in court.pricing.validate()? {
            warn!(court_id = %court.id, %warning, "court pricing configuration");
        }
        let court_id = court.id;
        info!(%court_id, name = %court.name, status = ?court.status, "court registered");
        self.store.save_court(court)?;
        Ok(court_id)
    }

    pub fn court(&self, court_id: CourtId) -> Result<Court> {
        self.store
            .court(court_id)?
            .ok_or(BookingError::CourtNotFound { court_id })
    }

    pub fn add_promotion(&self, promotion: Promotion) -> PromotionId {
        info!(name = %promotion.name, code = ?promotion.code, "promotion registered");
        self.promotions.insert(promotion)
    }

    // availability

    /// Whether `start_time`-`end_time` on `date` could be booked now.
    ///
    /// Malformed or zero-length times are a `Validation` error; an unknown,
    /// closed or double-booked court is an `Unavailable` answer.
    pub fn check_availability(
        &self,
        court_id: CourtId,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Result<Availability> {
        let slot = TimeSlot::parse(start_time, end_time)?;
        self.check_slot(court_id, date, &slot)
    }

    pub fn check_slot(&self, court_id: CourtId, date: NaiveDate, slot: &TimeSlot) -> Result<Availability> {
        let court = self.store.court(court_id)?;
        let existing = match &court {
            Some(_) => self.store.bookings_on(court_id, date)?,
            None => Vec::new(),
        };
        self.detector.check(court_id, court.as_ref(), date, slot, &existing)
    }

    pub fn list_open_slots(&self, court_id: CourtId, date: NaiveDate, slot_minutes: u32) -> Result<Vec<TimeSlot>> {
        let court = self.court(court_id)?;
        let existing = self.store.bookings_on(court_id, date)?;
        self.detector.open_slots(&court, date, slot_minutes, &existing)
    }

    // pricing

    /// Full price breakdown without reserving anything or consuming coupons.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_price(
        &self,
        court_id: CourtId,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
        duration_hours: Decimal,
        options: &PriceOptions,
        time_provider: &SafeTimeProvider,
    ) -> Result<PriceBreakdown> {
        let slot = TimeSlot::parse(start_time, end_time)?;
        let court = self.court(court_id)?;
        let base = self.calculator.base_quote(&court, date, &slot, duration_hours)?;
        let discount = if options.apply_promotions {
            let ctx = discount_context(&base, options.user_id);
            self.promotions.preview(&ctx, &options.coupon_codes, time_provider.now())?
        } else {
            DiscountResolution::none()
        };
        self.calculator.finalize(&base, discount)
    }

    /// discounts for a bare subtotal; nothing is consumed
    pub fn resolve_discount(
        &self,
        subtotal: Money,
        user_id: Option<UserId>,
        codes: &[String],
        time_provider: &SafeTimeProvider,
    ) -> Result<DiscountResolution> {
        if subtotal.is_negative() {
            return Err(BookingError::validation(format!("negative subtotal {subtotal}")));
        }
        let ctx = DiscountContext::for_subtotal(subtotal, user_id);
        self.promotions.preview(&ctx, codes, time_provider.now())
    }

    // lifecycle

    /// Reserve a slot and freeze its price.
    ///
    /// Fails with `CourtNotBookable` for inactive courts and `SlotUnavailable`
    /// when the detector refuses the slot. Coupon uses recorded before a later
    /// failure are released again.
    pub fn create_booking(
        &self,
        request: CreateBookingRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<Booking> {
        let now = time_provider.now();
        let court = self.court(request.court_id)?;
        court.ensure_bookable()?;

        let starts_at = request.slot.start_instant(request.date, court.utc_offset_minutes)?;
        if starts_at <= now {
            return Err(BookingError::validation(format!(
                "slot {} on {} has already started",
                request.slot, request.date
            )));
        }
        let base = self
            .calculator
            .base_quote(&court, request.date, &request.slot, request.duration_hours)?;

        let lock = self.court_locks.handle(court.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self.store.bookings_on(court.id, request.date)?;
        let availability = self
            .detector
            .check(court.id, Some(&court), request.date, &request.slot, &existing)?;
        if let Availability::Unavailable(reason) = availability {
            debug!(court_id = %court.id, date = %request.date, slot = %request.slot, %reason, "booking refused");
            return Err(BookingError::SlotUnavailable { reason });
        }

        let booking_id = Uuid::new_v4();
        let mut scratch = EventStore::new();
        let ctx = discount_context(&base, Some(request.user_id));
        let discount = self
            .promotions
            .redeem(&ctx, &request.coupon_codes, booking_id, now, &mut scratch)?;

        let persisted = self.calculator.finalize(&base, discount).and_then(|pricing| {
            let booking = Booking::new(
                booking_id,
                court.snapshot(),
                request.user_id,
                request.date,
                request.slot,
                pricing,
                now,
            );
            self.store.insert_booking(booking.clone())?;
            Ok(booking)
        });
        let booking = match persisted {
            Ok(booking) => booking,
            Err(e) => {
                warn!(%booking_id, error = %e, "booking not persisted, releasing promotions");
                self.promotions.release_booking(booking_id, now, &mut scratch);
                return Err(e);
            }
        };

        scratch.emit(Event::BookingCreated {
            booking_id,
            court_id: court.id,
            user_id: booking.user_id,
            date: booking.date,
            slot: booking.slot,
            total_amount: booking.total_amount(),
            timestamp: now,
        });
        self.absorb(&mut scratch);
        info!(
            %booking_id,
            reference = %booking.reference,
            court_id = %court.id,
            date = %booking.date,
            slot = %booking.slot,
            total = %booking.total_amount(),
            discount = %booking.pricing().discount.amount,
            "booking created"
        );
        Ok(booking)
    }

    pub fn booking(&self, booking_id: BookingId) -> Result<Booking> {
        self.store
            .booking(booking_id)?
            .ok_or(BookingError::BookingNotFound { booking_id })
    }

    /// re-read the booking under its court's lock, apply `f`, persist
    fn modify_booking<T>(
        &self,
        booking_id: BookingId,
        f: impl FnOnce(&mut Booking) -> Result<T>,
    ) -> Result<(Booking, T)> {
        let court_id = self.booking(booking_id)?.court().court_id;
        let lock = self.court_locks.handle(court_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut booking = self.booking(booking_id)?;
        let out = f(&mut booking)?;
        self.store.update_booking(booking.clone())?;
        Ok((booking, out))
    }

    /// payment captured
    pub fn confirm_booking(
        &self,
        booking_id: BookingId,
        payment_reference: Option<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Booking> {
        let now = time_provider.now();
        let (booking, ()) = self.modify_booking(booking_id, |b| b.confirm(payment_reference, now))?;
        self.emit(Event::BookingConfirmed {
            booking_id,
            payment_reference: booking.payment_reference.clone(),
            timestamp: now,
        });
        info!(%booking_id, "booking confirmed");
        Ok(booking)
    }

    /// player checked in
    pub fn start_booking(&self, booking_id: BookingId, time_provider: &SafeTimeProvider) -> Result<Booking> {
        let now = time_provider.now();
        let (booking, ()) = self.modify_booking(booking_id, |b| b.start(now))?;
        self.emit(Event::BookingStarted {
            booking_id,
            timestamp: now,
        });
        info!(%booking_id, "booking started");
        Ok(booking)
    }

    /// complete a confirmed or in-progress booking whose end time has passed
    pub fn complete_booking(&self, booking_id: BookingId, time_provider: &SafeTimeProvider) -> Result<Booking> {
        let now = time_provider.now();
        let (booking, ()) = self.modify_booking(booking_id, |b| {
            let ends_at = b.end_instant()?;
            if now < ends_at {
                return Err(BookingError::validation(format!(
                    "booking {} runs until {ends_at}",
                    b.id
                )));
            }
            b.complete(now)
        })?;
        self.emit(Event::BookingCompleted {
            booking_id,
            total_amount: booking.total_amount(),
            timestamp: now,
        });
        info!(%booking_id, total = %booking.total_amount(), "booking completed");
        Ok(booking)
    }

    /// confirmed booking whose start passed without a check-in
    pub fn mark_no_show(&self, booking_id: BookingId, time_provider: &SafeTimeProvider) -> Result<Booking> {
        let now = time_provider.now();
        let (booking, ()) = self.modify_booking(booking_id, |b| {
            let starts_at = b.start_instant()?;
            if now < starts_at {
                return Err(BookingError::validation(format!(
                    "booking {} has not started yet",
                    b.id
                )));
            }
            b.mark_no_show(now)
        })?;
        self.emit(Event::BookingNoShow {
            booking_id,
            timestamp: now,
        });
        info!(%booking_id, "booking marked no-show");
        Ok(booking)
    }

    /// Complete every confirmed or in-progress booking that has ended.
    pub fn complete_elapsed(&self, time_provider: &SafeTimeProvider) -> Result<Vec<Booking>> {
        let now = time_provider.now();
        let mut candidates = self.store.bookings_with_status(BookingStatus::Confirmed)?;
        candidates.extend(self.store.bookings_with_status(BookingStatus::InProgress)?);

        let mut completed = Vec::new();
        for candidate in candidates {
            if candidate.end_instant()? > now {
                continue;
            }
            match self.complete_booking(candidate.id, time_provider) {
                Ok(booking) => completed.push(booking),
                // changed state since it was listed
                Err(BookingError::InvalidTransition { booking_id, from, .. }) => {
                    debug!(%booking_id, ?from, "skipped while completing elapsed bookings");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(completed)
    }

    /// refund owed if the booking were cancelled now
    pub fn calculate_refund(&self, booking_id: BookingId, time_provider: &SafeTimeProvider) -> Result<RefundDecision> {
        let booking = self.booking(booking_id)?;
        self.refunds.evaluate(&booking, time_provider.now())
    }

    /// Cancel a pending or confirmed booking.
    ///
    /// The refund is evaluated on the frozen total and recorded on the booking.
    /// A cancellation inside the deadline still cancels, with no refund.
    pub fn cancel_booking(
        &self,
        booking_id: BookingId,
        cancelled_by: CancelledBy,
        reason: Option<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<CancellationOutcome> {
        let now = time_provider.now();
        let (booking, (previous, refund)) = self.modify_booking(booking_id, |b| {
            if !b.status().is_cancellable() {
                return Err(BookingError::InvalidTransition {
                    booking_id: b.id,
                    from: b.status(),
                    to: BookingStatus::Cancelled,
                });
            }
            let refund = self.refunds.evaluate(b, now)?;
            let previous = b.cancel(Cancellation {
                cancelled_at: now,
                cancelled_by,
                reason,
                refund_eligible: refund.eligible,
                refund_percentage: refund.percentage,
                refund_amount: refund.amount,
            })?;
            Ok((previous, refund))
        })?;

        self.emit(Event::BookingCancelled {
            booking_id,
            cancelled_by,
            previous_status: previous,
            refund_eligible: refund.eligible,
            refund_amount: refund.amount,
            timestamp: now,
        });
        info!(
            %booking_id,
            by = ?cancelled_by,
            eligible = refund.eligible,
            refund = %refund.amount,
            "booking cancelled"
        );
        Ok(CancellationOutcome { booking, refund })
    }

    // payouts

    /// What `create_payout` would claim right now; claims nothing.
    pub fn calculate_owner_payout(
        &self,
        owner_id: OwnerId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PayoutPreview> {
        let period = PayoutPeriod::new(start_date, end_date)?;
        let bookings = self.store.bookings_for_owner(owner_id, start_date, end_date)?;
        Ok(self.aggregator.aggregate(owner_id, period, &bookings))
    }

    /// Create a pending payout and claim its bookings in one store write.
    ///
    /// A concurrent payout that claimed any of the same bookings first makes
    /// this fail with `PayoutConflict`, leaving every booking untouched.
    pub fn create_payout(
        &self,
        owner_id: OwnerId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        time_provider: &SafeTimeProvider,
    ) -> Result<Payout> {
        let now = time_provider.now();
        let preview = self.calculate_owner_payout(owner_id, start_date, end_date)?;
        if preview.is_empty() {
            return Err(BookingError::NoEligibleBookings {
                owner_id,
                start_date,
                end_date,
            });
        }

        let payout = Payout::from_preview(preview, now);
        self.store.claim_for_payout(payout.clone(), now)?;
        self.emit(Event::PayoutCreated {
            payout_id: payout.id,
            owner_id,
            booking_count: payout.bookings.len(),
            total_revenue: payout.total_revenue,
            net_amount: payout.net_amount,
            timestamp: now,
        });
        info!(
            payout_id = %payout.id,
            %owner_id,
            bookings = payout.bookings.len(),
            revenue = %payout.total_revenue,
            net = %payout.net_amount,
            "payout created"
        );
        Ok(payout)
    }

    pub fn payout(&self, payout_id: PayoutId) -> Result<Payout> {
        self.store
            .payout(payout_id)?
            .ok_or(BookingError::PayoutNotFound { payout_id })
    }

    fn transition_payout(
        &self,
        payout_id: PayoutId,
        to: PayoutStatus,
        time_provider: &SafeTimeProvider,
        edit: impl FnOnce(&mut Payout),
    ) -> Result<Payout> {
        let now = time_provider.now();
        let _guard = self.payout_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut payout = self.payout(payout_id)?;
        let previous = payout.transition(to, now)?;
        edit(&mut payout);
        let released = self.store.update_payout(payout.clone(), now)?;

        self.emit(Event::PayoutStatusChanged {
            payout_id,
            old_status: previous,
            new_status: to,
            released_bookings: released,
            timestamp: now,
        });
        info!(%payout_id, from = ?previous, ?to, released, "payout status changed");
        Ok(payout)
    }

    pub fn mark_payout_processing(&self, payout_id: PayoutId, time_provider: &SafeTimeProvider) -> Result<Payout> {
        self.transition_payout(payout_id, PayoutStatus::Processing, time_provider, |_| {})
    }

    pub fn complete_payout(
        &self,
        payout_id: PayoutId,
        transfer_reference: Option<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Payout> {
        self.transition_payout(payout_id, PayoutStatus::Completed, time_provider, |p| {
            p.transfer_reference = transfer_reference;
        })
    }

    /// failed transfer; the bookings become eligible for a later payout
    pub fn fail_payout(&self, payout_id: PayoutId, reason: &str, time_provider: &SafeTimeProvider) -> Result<Payout> {
        self.transition_payout(payout_id, PayoutStatus::Failed, time_provider, |p| {
            p.failure_reason = Some(reason.to_string());
        })
    }

    pub fn cancel_payout(&self, payout_id: PayoutId, time_provider: &SafeTimeProvider) -> Result<Payout> {
        self.transition_payout(payout_id, PayoutStatus::Cancelled, time_provider, |_| {})
    }
}

fn discount_context(base: &BaseQuote, user_id: Option<UserId>) -> DiscountContext {
    DiscountContext {
        subtotal: base.subtotal,
        hourly_rate: base.hourly_rate,
        duration_hours: base.duration_hours,
        court_id: Some(base.court_id),
        user_id,
    }
}
