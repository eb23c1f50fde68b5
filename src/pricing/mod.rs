//! Price computation pipeline.
//!
//! rate selection -> subtotal -> discount -> platform fee -> tax -> total.
//! Every stage works on values already rounded to minor units.

pub mod calculator;
pub mod peak;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::promotions::{AppliedPromotion, DiscountResolution};
use crate::types::{CourtId, UserId};

pub use calculator::PricingCalculator;
pub use peak::{select_rate, RateSelection};

/// caller-supplied pricing options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceOptions {
    #[serde(default)]
    pub coupon_codes: Vec<String>,
    pub user_id: Option<UserId>,
    #[serde(default = "default_true")]
    pub apply_promotions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PriceOptions {
    fn default() -> Self {
        Self {
            coupon_codes: Vec::new(),
            user_id: None,
            apply_promotions: true,
        }
    }
}

impl PriceOptions {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coupon_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn without_promotions(mut self) -> Self {
        self.apply_promotions = false;
        self
    }
}

/// pipeline output up to the subtotal
#[derive(Debug, Clone, PartialEq)]
pub struct BaseQuote {
    pub court_id: CourtId,
    pub currency: String,
    pub hourly_rate: Money,
    pub is_peak_hour: bool,
    pub duration_hours: Decimal,
    pub subtotal: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountSummary {
    pub amount: Money,
    pub code: Option<String>,
    #[serde(default)]
    pub applied: Vec<AppliedPromotion>,
}

impl From<DiscountResolution> for DiscountSummary {
    fn from(resolution: DiscountResolution) -> Self {
        Self {
            code: resolution.codes(),
            amount: resolution.total_discount,
            applied: resolution.applied,
        }
    }
}

/// Full price of a booking.
///
/// Frozen onto the booking at creation; refunds and payouts read these numbers
/// and never price the booking again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub hourly_rate: Money,
    pub is_peak_hour: bool,
    pub duration_hours: Decimal,
    pub subtotal: Money,
    pub discount: DiscountSummary,
    pub subtotal_after_discount: Money,
    pub platform_fee: Money,
    /// fee rate in force when priced
    pub platform_fee_rate: Rate,
    pub tax: Money,
    pub tax_rate: Rate,
    pub total_amount: Money,
    pub currency: String,
}
