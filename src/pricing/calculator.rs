use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::config::BookingPolicy;
use crate::court::Court;
use crate::decimal::{Money, Rate};
use crate::errors::{BookingError, Result};
use crate::promotions::DiscountResolution;
use crate::slot::TimeSlot;

use super::{select_rate, BaseQuote, DiscountSummary, PriceBreakdown};

/// largest accepted gap between a declared duration and the slot's length, in hours
const DURATION_TOLERANCE: Decimal = dec!(0.01);

/// Prices slots under a fixed fee and tax rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingCalculator {
    platform_fee_rate: Rate,
    tax_rate: Rate,
}

impl PricingCalculator {
    pub fn new(platform_fee_rate: Rate, tax_rate: Rate) -> Self {
        Self {
            platform_fee_rate,
            tax_rate,
        }
    }

    pub fn from_policy(policy: &BookingPolicy) -> Self {
        Self::new(policy.platform_fee_rate(), policy.tax_rate())
    }

    pub fn platform_fee_rate(&self) -> Rate {
        self.platform_fee_rate
    }

    pub fn tax_rate(&self) -> Rate {
        self.tax_rate
    }

    /// Rate selection and subtotal.
    ///
    /// `duration_hours` is the caller's declared length; it must agree with the
    /// slot and the slot's own length is what gets priced.
    pub fn base_quote(
        &self,
        court: &Court,
        date: NaiveDate,
        slot: &TimeSlot,
        duration_hours: Decimal,
    ) -> Result<BaseQuote> {
        let pricing = &court.pricing;
        for warning in pricing.validate()? {
            warn!(court_id = %court.id, %warning, "court pricing configuration");
        }

        if duration_hours <= Decimal::ZERO {
            return Err(BookingError::validation(format!(
                "duration must be positive, got {duration_hours}h"
            )));
        }
        let derived = slot.duration_hours();
        if (derived - duration_hours).abs() > DURATION_TOLERANCE {
            return Err(BookingError::validation(format!(
                "declared duration {duration_hours}h does not match slot {slot} ({derived}h)"
            )));
        }
        if derived < pricing.minimum_booking_hours || derived > pricing.maximum_booking_hours {
            return Err(BookingError::validation(format!(
                "duration {derived}h outside {}..={} hours",
                pricing.minimum_booking_hours, pricing.maximum_booking_hours
            )));
        }

        let rate = select_rate(pricing, date, slot);
        let subtotal = Money::from_decimal(rate.hourly_rate.as_decimal() * derived);
        debug!(
            court_id = %court.id,
            %date,
            %slot,
            hourly_rate = %rate.hourly_rate,
            peak = rate.is_peak_hour,
            %subtotal,
            "base quote"
        );

        Ok(BaseQuote {
            court_id: court.id,
            currency: pricing.currency.clone(),
            hourly_rate: rate.hourly_rate,
            is_peak_hour: rate.is_peak_hour,
            duration_hours: derived,
            subtotal,
        })
    }

    /// Apply a resolved discount, then platform fee, tax and total.
    pub fn finalize(&self, base: &BaseQuote, discount: DiscountResolution) -> Result<PriceBreakdown> {
        if base.subtotal.is_negative() || base.hourly_rate.is_negative() {
            return Err(BookingError::validation(format!(
                "negative price input: rate {} subtotal {}",
                base.hourly_rate, base.subtotal
            )));
        }
        if discount.total_discount.is_negative() {
            return Err(BookingError::validation(format!(
                "negative discount {}",
                discount.total_discount
            )));
        }
        if self.platform_fee_rate < Rate::ZERO || self.tax_rate < Rate::ZERO {
            return Err(BookingError::InvalidConfiguration {
                message: format!("negative fee {} or tax {} rate", self.platform_fee_rate, self.tax_rate),
            });
        }

        let mut summary = DiscountSummary::from(discount);
        summary.amount = summary.amount.min(base.subtotal);

        let subtotal_after_discount = base.subtotal - summary.amount;
        let platform_fee = subtotal_after_discount.apply_rate(self.platform_fee_rate);
        let tax = (subtotal_after_discount + platform_fee).apply_rate(self.tax_rate);
        let total_amount = subtotal_after_discount + platform_fee + tax;

        Ok(PriceBreakdown {
            hourly_rate: base.hourly_rate,
            is_peak_hour: base.is_peak_hour,
            duration_hours: base.duration_hours,
            subtotal: base.subtotal,
            discount: summary,
            subtotal_after_discount,
            platform_fee,
            platform_fee_rate: self.platform_fee_rate,
            tax,
            tax_rate: self.tax_rate,
            total_amount,
            currency: base.currency.clone(),
        })
    }

    /// base quote and finalize in one call
    pub fn price(
        &self,
        court: &Court,
        date: NaiveDate,
        slot: &TimeSlot,
        duration_hours: Decimal,
        discount: DiscountResolution,
    ) -> Result<PriceBreakdown> {
        let base = self.base_quote(court, date, slot, duration_hours)?;
        self.finalize(&base, discount)
    }
}
