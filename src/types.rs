use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a booking
pub type BookingId = Uuid;

/// unique identifier for a court
pub type CourtId = Uuid;

/// unique identifier for a user making bookings
pub type UserId = Uuid;

/// unique identifier for a court owner
pub type OwnerId = Uuid;

/// unique identifier for a payout batch
pub type PayoutId = Uuid;

/// unique identifier for a promotion or coupon
pub type PromotionId = Uuid;

/// booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    /// created, payment not yet captured
    Pending,
    /// payment captured
    Confirmed,
    /// player checked in
    InProgress,
    /// end time passed
    Completed,
    Cancelled,
    /// confirmed but never checked in
    NoShow,
}

impl BookingStatus {
    /// whether a booking in this status holds its slot against new requests
    pub fn blocks_slot(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// allowed lifecycle edges
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
                | (InProgress, Completed)
        )
    }
}

/// court approval/activity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtStatus {
    PendingApproval,
    Active,
    Inactive,
    Suspended,
    Deleted,
}

impl CourtStatus {
    pub fn is_bookable(&self) -> bool {
        matches!(self, CourtStatus::Active)
    }
}

/// payout batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PayoutStatus {
    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// whether bookings claimed by a payout in this status go back to the pool
    pub fn releases_bookings(&self) -> bool {
        matches!(self, PayoutStatus::Failed | PayoutStatus::Cancelled)
    }
}

/// who initiated a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role", content = "id")]
pub enum CancelledBy {
    User(UserId),
    Owner(OwnerId),
    Admin(Uuid),
    System,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_and_confirmed_block() {
        assert!(BookingStatus::Pending.blocks_slot());
        assert!(BookingStatus::Confirmed.blocks_slot());
        assert!(!BookingStatus::Cancelled.blocks_slot());
        assert!(!BookingStatus::Completed.blocks_slot());
        assert!(!BookingStatus::NoShow.blocks_slot());
    }

    #[test]
    fn test_lifecycle_edges() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::NoShow));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::NoShow));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Confirmed));
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&BookingStatus::NoShow).unwrap();
        assert_eq!(json, "\"no-show\"");
    }
}
