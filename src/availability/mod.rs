pub mod detector;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::slot::SlotTime;
use crate::types::{BookingId, CourtId};

pub use detector::ConflictDetector;

/// the existing booking a candidate slot collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub booking_id: BookingId,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
}

/// why a slot cannot be granted; a closed court is never reported as a conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum UnavailableReason {
    CourtNotFound { court_id: CourtId },
    Closed { date: NaiveDate },
    OutsideOperatingHours { open: SlotTime, close: SlotTime },
    Conflict(ConflictInfo),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::CourtNotFound { court_id } => write!(f, "court {court_id} not found"),
            UnavailableReason::Closed { date } => write!(f, "court closed on {date}"),
            UnavailableReason::OutsideOperatingHours { open, close } => {
                write!(f, "outside operating hours {open}-{close}")
            }
            UnavailableReason::Conflict(conflict) => write!(
                f,
                "conflicts with booking {} ({}-{})",
                conflict.booking_id, conflict.start_time, conflict.end_time
            ),
        }
    }
}

/// result of an availability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum Availability {
    Available,
    Unavailable(UnavailableReason),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// the colliding booking, if the slot was refused for a conflict
    pub fn conflict(&self) -> Option<&ConflictInfo> {
        match self {
            Availability::Unavailable(UnavailableReason::Conflict(info)) => Some(info),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&UnavailableReason> {
        match self {
            Availability::Available => None,
            Availability::Unavailable(reason) => Some(reason),
        }
    }
}
