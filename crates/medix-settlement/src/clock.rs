//! Time source for settlement.
//!
//! Expiry is judged against [`Clock::today`], so tests pin the date with
//! [`FixedClock`] instead of depending on the wall clock.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Supplies "now" and the pharmacy's calendar date.
pub trait Clock: Send + Sync {
    /// Current instant, stamped on sales and refunds.
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date expiry is compared against.
    fn today(&self) -> NaiveDate;
}

/// Wall clock. `today` is the local calendar date of the till.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedClock { now }
    }

    /// Noon UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        FixedClock {
            now: Utc.from_utc_datetime(&noon),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}
