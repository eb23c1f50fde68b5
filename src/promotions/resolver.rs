use chrono::{DateTime, Utc};

use crate::decimal::Money;
use crate::errors::Result;

use super::{AppliedPromotion, DiscountContext, DiscountResolution, Promotion};

/// Sequential discount stack over one subtotal.
///
/// Each discount is computed against the original subtotal and then clipped to
/// what is left, so the running total can never pass the subtotal.
#[derive(Debug, Clone)]
pub struct DiscountStack {
    remaining: Money,
    resolution: DiscountResolution,
}

impl DiscountStack {
    pub fn new(subtotal: Money) -> Self {
        Self {
            remaining: subtotal.max(Money::ZERO),
            resolution: DiscountResolution::none(),
        }
    }

    pub fn remaining(&self) -> Money {
        self.remaining
    }

    /// clip `raw` to the remaining subtotal and record it; returns the granted amount
    pub fn push(&mut self, promotion: &Promotion, raw: Money) -> Money {
        let granted = raw.max(Money::ZERO).min(self.remaining);
        self.remaining -= granted;
        self.resolution.total_discount += granted;
        self.resolution.applied.push(AppliedPromotion {
            promotion_id: promotion.id,
            code: promotion.code.clone(),
            name: promotion.name.clone(),
            amount: granted,
        });
        granted
    }

    pub fn finish(self) -> DiscountResolution {
        self.resolution
    }
}

/// The automatic promotion worth the most for this context.
///
/// Ties go to the earliest `valid_from`, then the lexically smallest name.
pub fn best_automatic<'a>(
    ctx: &DiscountContext,
    candidates: impl IntoIterator<Item = &'a Promotion>,
    now: DateTime<Utc>,
) -> Result<Option<(&'a Promotion, Money)>> {
    let mut best: Option<(&Promotion, Money)> = None;
    for promotion in candidates {
        if !promotion.is_automatic() || promotion.check_applicable(ctx, now).is_err() {
            continue;
        }
        let amount = promotion.raw_discount(ctx)?;
        let better = match best {
            None => true,
            Some((current, current_amount)) => {
                amount > current_amount
                    || (amount == current_amount
                        && (promotion.valid_from, &promotion.name) < (current.valid_from, &current.name))
            }
        };
        if better {
            best = Some((promotion, amount));
        }
    }
    Ok(best)
}

/// Resolve discounts from snapshots without recording any usage.
///
/// `coupons` must already be the looked-up promotions for the supplied codes, in
/// the order supplied. Any coupon failing validation fails the whole resolution.
pub fn resolve_discount(
    ctx: &DiscountContext,
    automatic: &[Promotion],
    coupons: &[Promotion],
    now: DateTime<Utc>,
) -> Result<DiscountResolution> {
    let mut stack = DiscountStack::new(ctx.subtotal);

    if let Some((promotion, amount)) = best_automatic(ctx, automatic, now)? {
        stack.push(promotion, amount);
    }

    for coupon in coupons {
        coupon.check_applicable(ctx, now)?;
        let amount = coupon.raw_discount(ctx)?;
        stack.push(coupon, amount);
    }

    Ok(stack.finish())
}
