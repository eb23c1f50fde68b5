use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AvailabilityConfig, CourtPricingConfig};
use crate::errors::{BookingError, Result};
use crate::types::{CourtId, CourtStatus, OwnerId};

/// a bookable physical resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub owner_id: OwnerId,
    pub name: String,
    pub sport: String,
    pub status: CourtStatus,
    pub pricing: CourtPricingConfig,
    #[serde(default)]
    pub availability: AvailabilityConfig,
    /// fixed offset of the court's wall clock from UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Court {
    pub fn new(owner_id: OwnerId, name: &str, sport: &str, pricing: CourtPricingConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.to_string(),
            sport: sport.to_string(),
            status: CourtStatus::Active,
            pricing,
            availability: AvailabilityConfig::default(),
            utc_offset_minutes: 0,
        }
    }

    pub fn with_availability(mut self, availability: AvailabilityConfig) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_status(mut self, status: CourtStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn ensure_bookable(&self) -> Result<()> {
        if self.status.is_bookable() {
            Ok(())
        } else {
            Err(BookingError::CourtNotBookable {
                court_id: self.id,
                status: self.status,
            })
        }
    }

    pub fn snapshot(&self) -> CourtSnapshot {
        CourtSnapshot {
            court_id: self.id,
            owner_id: self.owner_id,
            name: self.name.clone(),
            sport: self.sport.clone(),
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}

/// Court facts copied onto a booking at creation.
///
/// Later edits or deletion of the court never reach an existing booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtSnapshot {
    pub court_id: CourtId,
    pub owner_id: OwnerId,
    pub name: String,
    pub sport: String,
    pub utc_offset_minutes: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;

    #[test]
    fn test_only_active_courts_are_bookable() {
        let court = Court::new(Uuid::new_v4(), "Centre", "tennis", CourtPricingConfig::flat(Money::from_major(60), "USD"));
        assert!(court.ensure_bookable().is_ok());

        let suspended = court.clone().with_status(CourtStatus::Suspended);
        assert!(matches!(
            suspended.ensure_bookable(),
            Err(BookingError::CourtNotBookable { status: CourtStatus::Suspended, .. })
        ));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut court = Court::new(Uuid::new_v4(), "Court 1", "padel", CourtPricingConfig::flat(Money::from_major(40), "EUR"));
        let snapshot = court.snapshot();
        court.name = "Renamed".to_string();
        court.owner_id = Uuid::new_v4();

        assert_eq!(snapshot.name, "Court 1");
        assert_ne!(snapshot.owner_id, court.owner_id);
    }
}
