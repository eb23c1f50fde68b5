pub mod availability;
pub mod booking;
pub mod config;
pub mod court;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod payouts;
pub mod pricing;
pub mod promotions;
pub mod refund;
pub mod slot;
pub mod store;
pub mod types;
pub mod views;

// re-export key types
pub use availability::{Availability, ConflictDetector, ConflictInfo, UnavailableReason};
pub use booking::{Booking, Cancellation};
pub use config::{AvailabilityConfig, BookingPolicy, CourtPricingConfig, DaySchedule, PeakWindow};
pub use court::{Court, CourtSnapshot};
pub use decimal::{Money, Rate};
pub use engine::{BookingEngine, CancellationOutcome, CreateBookingRequest};
pub use errors::{BookingError, Result};
pub use events::{Event, EventStore};
pub use payouts::{Payout, PayoutAggregator, PayoutLine, PayoutPeriod, PayoutPreview};
pub use pricing::{PriceBreakdown, PriceOptions, PricingCalculator};
pub use promotions::{DiscountResolution, DiscountType, Promotion, PromotionRegistry};
pub use refund::{RefundDecision, RefundEvaluator};
pub use slot::{SlotTime, TimeSlot};
pub use store::{BookingStore, InMemoryBookingStore};
pub use types::{
    BookingId, BookingStatus, CancelledBy, CourtId, CourtStatus, OwnerId, PayoutId, PayoutStatus,
    PromotionId, UserId,
};
pub use views::{BookingView, PayoutView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
