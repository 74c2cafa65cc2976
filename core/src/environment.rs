//! Injected dependencies for time and identifier generation.
//!
//! Components receive these through their constructors so that tests can swap
//! in deterministic implementations (see `bookbazaar-testing`).

use crate::event::OrderId;
use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mints order identifiers.
///
/// Every call must return an identifier never returned before.
pub trait OrderIdGenerator: Send + Sync {
    /// Produce a fresh, globally unique order identifier.
    fn next_id(&self) -> OrderId;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidOrderIds;

impl OrderIdGenerator for UuidOrderIds {
    fn next_id(&self) -> OrderId {
        OrderId::new(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_ids_are_unique_and_parseable() {
        let ids = UuidOrderIds;
        let minted: HashSet<_> = (0..1000).map(|_| ids.next_id()).collect();

        assert_eq!(minted.len(), 1000);
        assert!(minted.iter().all(|id| uuid::Uuid::parse_str(id.as_str()).is_ok()));
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
