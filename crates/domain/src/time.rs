//! Clock used to stamp records when the backend creates them.

use chrono::{DateTime, Utc};

/// Creation instant of a device or assignment, always in UTC.
pub type Timestamp = DateTime<Utc>;

/// Wall-clock instant for a record created right now.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}
