use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::types::CourtId;

/// One mutex per court, created on first use.
///
/// Holding a court's guard serializes "check availability, then persist" for
/// that court while other courts proceed in parallel.
#[derive(Debug, Default)]
pub struct CourtLocks {
    locks: Mutex<HashMap<CourtId, Arc<Mutex<()>>>>,
}

impl CourtLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, court_id: CourtId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(court_id).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_same_court_shares_lock() {
        let locks = CourtLocks::new();
        let court = Uuid::new_v4();
        let a = locks.handle(court);
        let b = locks.handle(court);
        let other = locks.handle(Uuid::new_v4());

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));

        let _guard = a.lock().unwrap();
        assert!(b.try_lock().is_err());
        assert!(other.try_lock().is_ok());
    }
}
