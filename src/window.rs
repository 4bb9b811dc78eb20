//! SEC bulk-access time window.
//!
//! The host asks that automated bulk traffic run overnight, 21:00 through
//! 06:00 US/Eastern. The boundary lives in Eastern wall-clock time, so the
//! check converts through the IANA zone rather than assuming a fixed UTC
//! offset; a naive offset would misjudge the window for half the year.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::US::Eastern;

use crate::errors::SyncError;

#[derive(Debug, Clone, Copy)]
pub struct AccessWindow {
    /// Hour (0-23, Eastern) at which bulk access opens.
    pub open_hour: u32,
    /// Hour at which it closes; smaller than `open_hour` when the window
    /// wraps midnight.
    pub close_hour: u32,
}

impl Default for AccessWindow {
    fn default() -> AccessWindow {
        AccessWindow {
            open_hour: 21,
            close_hour: 6,
        }
    }
}

impl AccessWindow {
    pub fn is_open_at(&self, instant: DateTime<Utc>) -> bool {
        let hour = instant.with_timezone(&Eastern).hour();
        if self.open_hour > self.close_hour {
            hour >= self.open_hour || hour < self.close_hour
        } else {
            hour >= self.open_hour && hour < self.close_hour
        }
    }

    pub fn check(&self, instant: DateTime<Utc>) -> Result<(), SyncError> {
        if self.is_open_at(instant) {
            Ok(())
        } else {
            Err(SyncError::AccessWindowClosed {
                eastern: instant.with_timezone(&Eastern),
            })
        }
    }
}
