//! Promotions and coupons.
//!
//! Automatic promotions apply without a code; coupons must be supplied by the
//! user. Both draw on the same rule type, [`Promotion`].

pub mod registry;
pub mod resolver;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BookingError, Result};
use crate::types::{BookingId, CourtId, PromotionId, UserId};

pub use registry::PromotionRegistry;
pub use resolver::resolve_discount;

/// how a promotion's `value` is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` percent of the subtotal
    Percentage,
    /// `value` in currency units
    FixedAmount,
    /// `value` hours at the booked hourly rate
    FreeHours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    Active,
    Inactive,
    Used,
    Expired,
}

/// ledger entry for one redemption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponUsage {
    pub user_id: UserId,
    pub used_at: DateTime<Utc>,
    pub booking_id: BookingId,
    pub discount_amount: Money,
}

/// everything a promotion needs to price itself against a booking
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountContext {
    pub subtotal: Money,
    pub hourly_rate: Money,
    pub duration_hours: Decimal,
    pub court_id: Option<CourtId>,
    pub user_id: Option<UserId>,
}

impl DiscountContext {
    /// context for a bare subtotal with no slot attached
    pub fn for_subtotal(subtotal: Money, user_id: Option<UserId>) -> Self {
        Self {
            subtotal,
            hourly_rate: Money::ZERO,
            duration_hours: Decimal::ZERO,
            court_id: None,
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub promotion_id: PromotionId,
    pub code: Option<String>,
    pub name: String,
    pub amount: Money,
}

/// discounts granted against one subtotal, in application order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountResolution {
    pub total_discount: Money,
    pub applied: Vec<AppliedPromotion>,
}

impl DiscountResolution {
    pub fn none() -> Self {
        Self::default()
    }

    /// comma-joined codes of applied coupons
    pub fn codes(&self) -> Option<String> {
        let codes: Vec<&str> = self.applied.iter().filter_map(|a| a.code.as_deref()).collect();
        if codes.is_empty() {
            None
        } else {
            Some(codes.join(","))
        }
    }
}

/// a discount rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    /// `None` for automatic promotions
    pub code: Option<String>,
    pub name: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub max_discount: Option<Money>,
    pub min_purchase: Money,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: PromotionStatus,
    pub usage_count: u32,
    pub max_usage: Option<u32>,
    pub per_user_limit: Option<u32>,
    /// empty means every court
    #[serde(default)]
    pub courts: Vec<CourtId>,
    #[serde(default)]
    pub usages: Vec<CouponUsage>,
}

impl Promotion {
    fn base(
        code: Option<String>,
        name: &str,
        discount_type: DiscountType,
        value: Decimal,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            name: name.to_string(),
            discount_type,
            value,
            max_discount: None,
            min_purchase: Money::ZERO,
            valid_from,
            valid_until,
            status: PromotionStatus::Active,
            usage_count: 0,
            max_usage: None,
            per_user_limit: None,
            courts: Vec::new(),
            usages: Vec::new(),
        }
    }

    /// promotion applied without a code
    pub fn automatic(
        name: &str,
        discount_type: DiscountType,
        value: Decimal,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self::base(None, name, discount_type, value, valid_from, valid_until)
    }

    /// coupon redeemable by code; codes are matched case-insensitively
    pub fn coupon(
        code: &str,
        discount_type: DiscountType,
        value: Decimal,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        let code = normalize_code(code);
        let name = code.clone();
        Self::base(Some(code), &name, discount_type, value, valid_from, valid_until)
    }

    pub fn with_max_discount(mut self, cap: Money) -> Self {
        self.max_discount = Some(cap);
        self
    }

    pub fn with_min_purchase(mut self, min: Money) -> Self {
        self.min_purchase = min;
        self
    }

    pub fn with_max_usage(mut self, max: u32) -> Self {
        self.max_usage = Some(max);
        self
    }

    pub fn with_per_user_limit(mut self, limit: u32) -> Self {
        self.per_user_limit = Some(limit);
        self
    }

    pub fn for_courts(mut self, courts: Vec<CourtId>) -> Self {
        self.courts = courts;
        self
    }

    pub fn is_automatic(&self) -> bool {
        self.code.is_none()
    }

    fn label(&self) -> String {
        self.code.clone().unwrap_or_else(|| self.name.clone())
    }

    pub fn is_exhausted(&self) -> bool {
        self.status == PromotionStatus::Used
            || self.max_usage.is_some_and(|max| self.usage_count >= max)
    }

    pub fn uses_by(&self, user_id: UserId) -> u32 {
        self.usages.iter().filter(|u| u.user_id == user_id).count() as u32
    }

    /// validate this promotion against a booking at `now`
    pub fn check_applicable(&self, ctx: &DiscountContext, now: DateTime<Utc>) -> Result<()> {
        let code = self.label();
        let not_applicable = |reason: String| BookingError::CouponNotApplicable {
            code: code.clone(),
            reason,
        };

        match self.status {
            PromotionStatus::Inactive => return Err(not_applicable("inactive".to_string())),
            PromotionStatus::Expired => return Err(BookingError::CouponExpired { code }),
            PromotionStatus::Used => return Err(BookingError::CouponExhausted { code }),
            PromotionStatus::Active => {}
        }
        if now > self.valid_until {
            return Err(BookingError::CouponExpired { code });
        }
        if now < self.valid_from {
            return Err(not_applicable(format!("not valid before {}", self.valid_from)));
        }
        if self.is_exhausted() {
            return Err(BookingError::CouponExhausted { code });
        }
        if ctx.subtotal < self.min_purchase {
            return Err(not_applicable(format!("minimum purchase is {}", self.min_purchase)));
        }
        if let Some(court_id) = ctx.court_id {
            if !self.courts.is_empty() && !self.courts.contains(&court_id) {
                return Err(not_applicable("not valid for this court".to_string()));
            }
        }
        if let (Some(limit), Some(user_id)) = (self.per_user_limit, ctx.user_id) {
            if self.uses_by(user_id) >= limit {
                return Err(not_applicable("per-user limit reached".to_string()));
            }
        }
        Ok(())
    }

    /// Discount before the remaining-subtotal cap. Fails fast on negative values.
    pub fn raw_discount(&self, ctx: &DiscountContext) -> Result<Money> {
        if self.value < Decimal::ZERO {
            return Err(BookingError::validation(format!(
                "promotion {} has negative value {}",
                self.label(),
                self.value
            )));
        }
        if self.max_discount.is_some_and(|cap| cap.is_negative()) || self.min_purchase.is_negative() {
            return Err(BookingError::validation(format!(
                "promotion {} has a negative cap or minimum purchase",
                self.label()
            )));
        }
        let amount = match self.discount_type {
            DiscountType::Percentage => ctx.subtotal.percentage(self.value),
            DiscountType::FixedAmount => Money::from_decimal(self.value),
            DiscountType::FreeHours => ctx.hourly_rate * self.value.min(ctx.duration_hours),
        };
        Ok(match self.max_discount {
            Some(cap) => amount.min(cap),
            None => amount,
        })
    }

    /// record one redemption; caller holds this promotion's lock
    pub(crate) fn record_use(
        &mut self,
        user_id: UserId,
        booking_id: BookingId,
        discount_amount: Money,
        now: DateTime<Utc>,
    ) {
        self.usage_count += 1;
        self.usages.push(CouponUsage {
            user_id,
            used_at: now,
            booking_id,
            discount_amount,
        });
        if self.max_usage.is_some_and(|max| self.usage_count >= max) {
            self.status = PromotionStatus::Used;
        }
    }

    /// undo the redemption made for `booking_id`; returns whether one existed
    pub(crate) fn release_use(&mut self, booking_id: BookingId) -> bool {
        let Some(pos) = self.usages.iter().position(|u| u.booking_id == booking_id) else {
            return false;
        };
        self.usages.remove(pos);
        self.usage_count = self.usage_count.saturating_sub(1);
        if self.status == PromotionStatus::Used && !self.is_exhausted_by_count() {
            self.status = PromotionStatus::Active;
        }
        true
    }

    fn is_exhausted_by_count(&self) -> bool {
        self.max_usage.is_some_and(|max| self.usage_count >= max)
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn save20() -> Promotion {
        Promotion::coupon("save20", DiscountType::Percentage, dec!(20), now() - Duration::days(1), now() + Duration::days(30))
            .with_max_discount(Money::from_major(30))
    }

    #[test]
    fn test_percentage_capped_by_max_discount() {
        let ctx = DiscountContext::for_subtotal(Money::from_major(200), None);
        assert_eq!(save20().raw_discount(&ctx).unwrap(), Money::from_major(30));

        let ctx = DiscountContext::for_subtotal(Money::from_major(100), None);
        assert_eq!(save20().raw_discount(&ctx).unwrap(), Money::from_major(20));
    }

    #[test]
    fn test_free_hours_limited_to_duration() {
        let promo = Promotion::automatic("first hour free", DiscountType::FreeHours, dec!(3), now(), now() + Duration::days(1));
        let ctx = DiscountContext {
            subtotal: Money::from_major(120),
            hourly_rate: Money::from_major(60),
            duration_hours: dec!(2),
            court_id: None,
            user_id: None,
        };
        assert_eq!(promo.raw_discount(&ctx).unwrap(), Money::from_major(120));
    }

    #[test]
    fn test_code_is_normalized() {
        assert_eq!(save20().code.as_deref(), Some("SAVE20"));
    }

    #[test]
    fn test_validity_checks() {
        let ctx = DiscountContext::for_subtotal(Money::from_major(50), Some(Uuid::new_v4()));
        let promo = save20();

        assert!(promo.check_applicable(&ctx, now()).is_ok());
        assert!(matches!(
            promo.check_applicable(&ctx, now() + Duration::days(31)),
            Err(BookingError::CouponExpired { .. })
        ));
        assert!(matches!(
            promo.check_applicable(&ctx, now() - Duration::days(2)),
            Err(BookingError::CouponNotApplicable { .. })
        ));

        let min = save20().with_min_purchase(Money::from_major(100));
        assert!(matches!(
            min.check_applicable(&ctx, now()),
            Err(BookingError::CouponNotApplicable { .. })
        ));

        let mut inactive = save20();
        inactive.status = PromotionStatus::Inactive;
        assert!(inactive.check_applicable(&ctx, now()).is_err());
    }

    #[test]
    fn test_usage_ledger_and_release() {
        let user = Uuid::new_v4();
        let booking = Uuid::new_v4();
        let ctx = DiscountContext::for_subtotal(Money::from_major(50), Some(user));
        let mut promo = save20().with_max_usage(1);

        promo.record_use(user, booking, Money::from_major(10), now());
        assert_eq!(promo.status, PromotionStatus::Used);
        assert!(matches!(
            promo.check_applicable(&ctx, now()),
            Err(BookingError::CouponExhausted { .. })
        ));

        assert!(promo.release_use(booking));
        assert_eq!(promo.status, PromotionStatus::Active);
        assert_eq!(promo.usage_count, 0);
        assert!(!promo.release_use(booking));
    }

    #[test]
    fn test_per_user_limit() {
        let user = Uuid::new_v4();
        let mut promo = save20().with_per_user_limit(1);
        promo.record_use(user, Uuid::new_v4(), Money::from_major(10), now());

        let mine = DiscountContext::for_subtotal(Money::from_major(50), Some(user));
        let theirs = DiscountContext::for_subtotal(Money::from_major(50), Some(Uuid::new_v4()));
        assert!(promo.check_applicable(&mine, now()).is_err());
        assert!(promo.check_applicable(&theirs, now()).is_ok());
    }

    #[test]
    fn test_negative_value_fails_fast() {
        let mut promo = save20();
        promo.value = dec!(-5);
        let ctx = DiscountContext::for_subtotal(Money::from_major(50), None);
        assert!(matches!(promo.raw_discount(&ctx), Err(BookingError::Validation { .. })));
    }

    #[test]
    fn test_negative_cap_or_minimum_fails_fast() {
        let ctx = DiscountContext::for_subtotal(Money::from_major(100), None);
        let coupon = Promotion::coupon("TEN", DiscountType::Percentage, dec!(10), now() - Duration::days(1), now() + Duration::days(1));

        let capped = coupon.clone().with_max_discount(Money::from_major(-5));
        assert!(matches!(capped.raw_discount(&ctx), Err(BookingError::Validation { .. })));
        let err = resolve_discount(&ctx, &[], &[capped], now()).unwrap_err();
        assert!(matches!(err, BookingError::Validation { .. }));

        let minimum = coupon.with_min_purchase(Money::from_major(-1));
        assert!(matches!(minimum.raw_discount(&ctx), Err(BookingError::Validation { .. })));
    }
}
