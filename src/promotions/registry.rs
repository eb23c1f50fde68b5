use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::errors::{BookingError, Result};
use crate::events::{Event, EventStore};
use crate::types::{BookingId, PromotionId};

use super::resolver::{best_automatic, DiscountStack};
use super::{normalize_code, DiscountContext, DiscountResolution, Promotion};

type Shared = Arc<Mutex<Promotion>>;

#[derive(Default)]
struct Index {
    by_id: HashMap<PromotionId, Shared>,
    by_code: HashMap<String, PromotionId>,
}

/// In-memory promotion store.
///
/// Each promotion sits behind its own mutex, so redemption is a check-and-increment
/// under that lock: two racing redemptions of the last use see one success.
#[derive(Default)]
pub struct PromotionRegistry {
    index: RwLock<Index>,
}

impl PromotionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, promotion: Promotion) -> PromotionId {
        let id = promotion.id;
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(code) = &promotion.code {
            index.by_code.insert(normalize_code(code), id);
        }
        index.by_id.insert(id, Arc::new(Mutex::new(promotion)));
        id
    }

    /// current state of a promotion
    pub fn get(&self, id: PromotionId) -> Option<Promotion> {
        let shared = self.shared(id)?;
        let promotion = shared.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Some(promotion)
    }

    pub fn find_by_code(&self, code: &str) -> Option<Promotion> {
        let id = {
            let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
            index.by_code.get(&normalize_code(code)).copied()
        }?;
        self.get(id)
    }

    fn shared(&self, id: PromotionId) -> Option<Shared> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.by_id.get(&id).cloned()
    }

    fn automatic(&self) -> Vec<Shared> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let mut automatic: Vec<(PromotionId, Shared)> = index
            .by_id
            .iter()
            .filter(|(id, _)| !index.by_code.values().any(|coded| coded == *id))
            .map(|(id, shared)| (*id, Arc::clone(shared)))
            .collect();
        automatic.sort_by_key(|(id, _)| *id);
        automatic.into_iter().map(|(_, shared)| shared).collect()
    }

    /// deduplicated coupon handles, in supplied order
    fn coupons(&self, codes: &[String]) -> Result<Vec<Shared>> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let mut seen = Vec::new();
        let mut coupons = Vec::new();
        for code in codes {
            let code = normalize_code(code);
            if code.is_empty() || seen.contains(&code) {
                continue;
            }
            let shared = index
                .by_code
                .get(&code)
                .and_then(|id| index.by_id.get(id))
                .ok_or_else(|| BookingError::CouponNotApplicable {
                    code: code.clone(),
                    reason: "unknown code".to_string(),
                })?;
            coupons.push(Arc::clone(shared));
            seen.push(code);
        }
        Ok(coupons)
    }

    /// Price the discounts for `ctx` without consuming anything.
    pub fn preview(
        &self,
        ctx: &DiscountContext,
        codes: &[String],
        now: DateTime<Utc>,
    ) -> Result<DiscountResolution> {
        let automatic: Vec<Promotion> = self
            .automatic()
            .iter()
            .map(|shared| shared.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        let coupons: Vec<Promotion> = self
            .coupons(codes)?
            .iter()
            .map(|shared| shared.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        super::resolve_discount(ctx, &automatic, &coupons, now)
    }

    /// Resolve and consume discounts for a booking.
    ///
    /// Every use is recorded under the promotion's own lock after re-validating it.
    /// If any coupon fails, uses already recorded for `booking_id` are released and
    /// the error is returned. An automatic promotion exhausted by a concurrent
    /// redemption is skipped in favour of the next best one.
    pub fn redeem(
        &self,
        ctx: &DiscountContext,
        codes: &[String],
        booking_id: BookingId,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<DiscountResolution> {
        let user_id = ctx.user_id.ok_or_else(|| {
            BookingError::validation("a user is required to redeem promotions")
        })?;
        let coupons = self.coupons(codes)?;
        let mut stack = DiscountStack::new(ctx.subtotal);
        let mut redeemed: Vec<Shared> = Vec::new();

        let snapshots: Vec<Promotion> = self
            .automatic()
            .iter()
            .map(|shared| shared.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        if let Some(shared) = self.redeem_automatic(ctx, snapshots, booking_id, now, &mut stack, events)? {
            redeemed.push(shared);
        }

        for shared in coupons {
            let outcome = {
                let mut coupon = shared.lock().unwrap_or_else(PoisonError::into_inner);
                coupon.check_applicable(ctx, now).and_then(|()| {
                    let raw = coupon.raw_discount(ctx)?;
                    let granted = stack.push(&coupon, raw);
                    coupon.record_use(user_id, booking_id, granted, now);
                    info!(code = ?coupon.code, %booking_id, discount = %granted, usage = coupon.usage_count, "coupon redeemed");
                    events.emit(Event::CouponRedeemed {
                        promotion_id: coupon.id,
                        code: coupon.code.clone(),
                        booking_id,
                        user_id,
                        discount: granted,
                        timestamp: now,
                    });
                    Ok(())
                })
            };
            match outcome {
                Ok(()) => redeemed.push(shared),
                Err(e) => {
                    warn!(%booking_id, error = %e, "coupon redemption failed, rolling back");
                    Self::release_all(&redeemed, booking_id, now, events);
                    return Err(e);
                }
            }
        }

        Ok(stack.finish())
    }

    /// Record a use of the best automatic promotion that still applies under its lock.
    ///
    /// `snapshots` may be stale. A pick that fails its locked re-check is dropped and
    /// the next best candidate is tried.
    fn redeem_automatic(
        &self,
        ctx: &DiscountContext,
        mut snapshots: Vec<Promotion>,
        booking_id: BookingId,
        now: DateTime<Utc>,
        stack: &mut DiscountStack,
        events: &mut EventStore,
    ) -> Result<Option<Shared>> {
        let user_id = ctx.user_id.ok_or_else(|| {
            BookingError::validation("a user is required to redeem promotions")
        })?;
        loop {
            let best_id = match best_automatic(ctx, &snapshots, now)? {
                Some((best, _)) => best.id,
                None => return Ok(None),
            };
            snapshots.retain(|p| p.id != best_id);
            let Some(shared) = self.shared(best_id) else {
                continue;
            };
            let mut promotion = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = promotion.check_applicable(ctx, now) {
                debug!(promotion = %promotion.name, error = %e, "automatic promotion skipped");
                continue;
            }
            let raw = promotion.raw_discount(ctx)?;
            let granted = stack.push(&promotion, raw);
            promotion.record_use(user_id, booking_id, granted, now);
            events.emit(Event::CouponRedeemed {
                promotion_id: promotion.id,
                code: promotion.code.clone(),
                booking_id,
                user_id,
                discount: granted,
                timestamp: now,
            });
            drop(promotion);
            return Ok(Some(shared));
        }
    }

    /// release every use recorded for `booking_id` across all promotions
    pub fn release_booking(&self, booking_id: BookingId, now: DateTime<Utc>, events: &mut EventStore) {
        let all: Vec<Shared> = {
            let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
            index.by_id.values().cloned().collect()
        };
        Self::release_all(&all, booking_id, now, events);
    }

    fn release_all(promotions: &[Shared], booking_id: BookingId, now: DateTime<Utc>, events: &mut EventStore) {
        for shared in promotions {
            let mut promotion = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if promotion.release_use(booking_id) {
                events.emit(Event::CouponReleased {
                    promotion_id: promotion.id,
                    code: promotion.code.clone(),
                    booking_id,
                    timestamp: now,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::promotions::{DiscountType, PromotionStatus};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (now() - Duration::days(1), now() + Duration::days(7))
    }

    fn ctx(subtotal: i64) -> DiscountContext {
        DiscountContext::for_subtotal(Money::from_major(subtotal), Some(Uuid::new_v4()))
    }

    #[test]
    fn test_preview_does_not_consume() {
        let registry = PromotionRegistry::new();
        let (from, until) = window();
        let id = registry.insert(Promotion::coupon("ONCE", DiscountType::FixedAmount, dec!(10), from, until).with_max_usage(1));

        let codes = vec!["once".to_string()];
        for _ in 0..3 {
            let preview = registry.preview(&ctx(50), &codes, now()).unwrap();
            assert_eq!(preview.total_discount, Money::from_major(10));
        }
        assert_eq!(registry.get(id).unwrap().usage_count, 0);
    }

    #[test]
    fn test_redeem_consumes_and_exhausts() {
        let registry = PromotionRegistry::new();
        let (from, until) = window();
        let id = registry.insert(Promotion::coupon("ONCE", DiscountType::FixedAmount, dec!(10), from, until).with_max_usage(1));
        let mut events = EventStore::new();
        let codes = vec!["ONCE".to_string()];

        let first = registry.redeem(&ctx(50), &codes, Uuid::new_v4(), now(), &mut events).unwrap();
        assert_eq!(first.total_discount, Money::from_major(10));

        let second = registry.redeem(&ctx(50), &codes, Uuid::new_v4(), now(), &mut events);
        assert!(matches!(second, Err(BookingError::CouponExhausted { .. })));

        let promotion = registry.get(id).unwrap();
        assert_eq!(promotion.usage_count, 1);
        assert_eq!(promotion.status, PromotionStatus::Used);
        assert_eq!(promotion.usages.len(), 1);
    }

    #[test]
    fn test_failed_coupon_rolls_back_earlier_uses() {
        let registry = PromotionRegistry::new();
        let (from, until) = window();
        let good = registry.insert(Promotion::coupon("GOOD", DiscountType::FixedAmount, dec!(5), from, until));
        registry.insert(
            Promotion::coupon("BIG", DiscountType::FixedAmount, dec!(5), from, until).with_min_purchase(Money::from_major(500)),
        );
        let mut events = EventStore::new();
        let booking = Uuid::new_v4();

        let codes = vec!["GOOD".to_string(), "BIG".to_string()];
        let err = registry.redeem(&ctx(50), &codes, booking, now(), &mut events).unwrap_err();
        assert!(matches!(err, BookingError::CouponNotApplicable { .. }));
        assert_eq!(registry.get(good).unwrap().usage_count, 0);
        assert!(events.events().iter().any(|e| matches!(e, Event::CouponReleased { .. })));
    }

    #[test]
    fn test_unknown_code() {
        let registry = PromotionRegistry::new();
        let err = registry.preview(&ctx(50), &["NOPE".to_string()], now()).unwrap_err();
        assert!(matches!(err, BookingError::CouponNotApplicable { .. }));
    }

    #[test]
    fn test_duplicate_codes_apply_once() {
        let registry = PromotionRegistry::new();
        let (from, until) = window();
        registry.insert(Promotion::coupon("FIVE", DiscountType::FixedAmount, dec!(5), from, until));

        let codes = vec!["FIVE".to_string(), "five".to_string()];
        let preview = registry.preview(&ctx(50), &codes, now()).unwrap();
        assert_eq!(preview.applied.len(), 1);
    }

    #[test]
    fn test_release_booking_restores_use() {
        let registry = PromotionRegistry::new();
        let (from, until) = window();
        let id = registry.insert(Promotion::coupon("ONCE", DiscountType::FixedAmount, dec!(10), from, until).with_max_usage(1));
        let mut events = EventStore::new();
        let booking = Uuid::new_v4();

        registry.redeem(&ctx(50), &["ONCE".to_string()], booking, now(), &mut events).unwrap();
        registry.release_booking(booking, now(), &mut events);

        let promotion = registry.get(id).unwrap();
        assert_eq!(promotion.usage_count, 0);
        assert_eq!(promotion.status, PromotionStatus::Active);
    }

    #[test]
    fn test_concurrent_redemption_of_last_use() {
        let registry = PromotionRegistry::new();
        let (from, until) = window();
        let id = registry.insert(Promotion::coupon("LAST", DiscountType::FixedAmount, dec!(10), from, until).with_max_usage(1));
        let codes = vec!["LAST".to_string()];

        let successes: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let mut events = EventStore::new();
                        registry.redeem(&ctx(50), &codes, Uuid::new_v4(), now(), &mut events).is_ok()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count()
        });

        assert_eq!(successes, 1);
        assert_eq!(registry.get(id).unwrap().usage_count, 1);
    }

    #[test]
    fn test_exhausted_automatic_falls_back_to_next_best() {
        let registry = PromotionRegistry::new();
        let (from, until) = window();
        let big = registry.insert(Promotion::automatic("Big", DiscountType::FixedAmount, dec!(20), from, until).with_max_usage(1));
        let small = registry.insert(Promotion::automatic("Small", DiscountType::FixedAmount, dec!(5), from, until));

        // snapshots taken before another booking takes the last use of the big one
        let stale: Vec<Promotion> = [big, small].iter().filter_map(|id| registry.get(*id)).collect();
        let mut events = EventStore::new();
        let first = registry.redeem(&ctx(50), &[], Uuid::new_v4(), now(), &mut events).unwrap();
        assert_eq!(first.total_discount, Money::from_major(20));

        let context = ctx(50);
        let booking = Uuid::new_v4();
        let mut stack = DiscountStack::new(context.subtotal);
        let redeemed = registry
            .redeem_automatic(&context, stale, booking, now(), &mut stack, &mut events)
            .unwrap();
        assert!(redeemed.is_some());
        assert_eq!(stack.finish().total_discount, Money::from_major(5));
        assert_eq!(registry.get(big).unwrap().usage_count, 1);
        assert_eq!(registry.get(small).unwrap().usage_count, 1);

        // no candidates left
        let none = registry
            .redeem_automatic(&context, Vec::new(), Uuid::new_v4(), now(), &mut DiscountStack::new(context.subtotal), &mut events)
            .unwrap();
        assert!(none.is_none());
    }
}
