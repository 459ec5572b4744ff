//! # engine::session
//!
//! Trading-day cutoff.  15:00 local (IST) = **09:30 UTC** by default.
//!
//! - AlertMonitor: breaches at/after the cutoff close the alert but are not
//!   forwarded to the signal pipeline.
//! - OrderOrchestrator: intraday orders are force-closed once it is reached.
//! - Intraday alerts/orders without `expires_at` expire at the next cutoff.

use chrono::{DateTime, Duration, NaiveTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    cutoff: NaiveTime,
}

impl SessionClock {
    pub fn new(cutoff: NaiveTime) -> Self {
        Self { cutoff }
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    /// `true` once the UTC time-of-day is at or past the cutoff.
    #[inline]
    pub fn is_after_cutoff(&self, now: DateTime<Utc>) -> bool {
        now.time() >= self.cutoff
    }

    /// Today's cutoff if still ahead of `now`, otherwise tomorrow's.
    pub fn next_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.cutoff).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new(NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    #[test]
    fn cutoff_boundary_is_inclusive() {
        let clock = SessionClock::default();
        assert!(!clock.is_after_cutoff(at(9, 29)));
        assert!(clock.is_after_cutoff(at(9, 30)));
        assert!(clock.is_after_cutoff(at(9, 31)));
    }

    #[test]
    fn next_cutoff_rolls_to_tomorrow_once_passed() {
        let clock = SessionClock::default();
        assert_eq!(clock.next_cutoff(at(4, 0)), at(9, 30));
        assert_eq!(clock.next_cutoff(at(9, 30)), at(9, 30) + Duration::days(1));
        assert_eq!(clock.next_cutoff(at(13, 0)), at(9, 30) + Duration::days(1));
    }
}
