//! Deriving display fields from resolved lease records.
//!
//! The journal stores times in UTC; operators read them in local time.
//! [`Enricher`] converts them, computes the time left on each lease and
//! pulls out the pool tag. "Now" is captured once when the enricher is
//! built, so every lease in one query is measured against the same instant.

use std::net::IpAddr;

use chrono::{DateTime, Local, Offset, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::lease::{BindingState, LeaseRecord};

/// Display format for lease start and expiration times.
const DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

const SECONDS_PER_DAY: i64 = 86_400;

/// A resolved lease with its display fields filled in.
///
/// Derived fields that cannot be computed are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedLease {
    pub ip: IpAddr,
    pub hardware_address: Option<String>,
    pub state: BindingState,
    /// Lease start in local time, or empty.
    pub start: String,
    /// Lease expiration in local time, or empty.
    pub end: String,
    /// Time left until expiration, or empty if expired or open-ended.
    pub remaining: String,
    /// Pool (shared network) the address belongs to, or empty.
    pub pool: String,
    pub hostname: Option<String>,
    pub tstp: String,
    pub tsfp: String,
    pub atsfp: String,
    pub cltt: String,
}

/// Converts [`LeaseRecord`]s into [`EnrichedLease`]s against a fixed "now".
#[derive(Debug, Clone)]
pub struct Enricher<Tz: TimeZone> {
    now: DateTime<Utc>,
    zone: Tz,
    pool_key: String,
}

impl Enricher<Local> {
    /// Snapshots the current time and displays times in the host's zone.
    pub fn local(pool_key: impl Into<String>) -> Self {
        Self::new(Utc::now(), Local, pool_key)
    }
}

impl<Tz: TimeZone> Enricher<Tz> {
    /// Creates an enricher with an explicit clock reading and display zone.
    ///
    /// `pool_key` names the `set` attribute that tags a lease with its pool.
    pub fn new(now: DateTime<Utc>, zone: Tz, pool_key: impl Into<String>) -> Self {
        Self {
            now,
            zone,
            pool_key: pool_key.into(),
        }
    }

    /// The instant remaining times are measured from.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Derives the display fields of one record. Never fails.
    pub fn enrich(&self, record: &LeaseRecord) -> EnrichedLease {
        EnrichedLease {
            ip: record.address,
            hardware_address: record.hardware_address.clone(),
            state: record.binding_state,
            start: self.local_time(record.start),
            end: self.local_time(record.end),
            remaining: format_remaining(self.now, record.end),
            pool: record
                .attribute(&self.pool_key)
                .map(str::to_string)
                .unwrap_or_default(),
            hostname: record.hostname.clone(),
            tstp: record.tstp.clone(),
            tsfp: record.tsfp.clone(),
            atsfp: record.atsfp.clone(),
            cltt: record.cltt.clone(),
        }
    }

    pub fn enrich_all<'a>(
        &self,
        records: impl IntoIterator<Item = &'a LeaseRecord>,
    ) -> Vec<EnrichedLease> {
        records.into_iter().map(|record| self.enrich(record)).collect()
    }

    /// Renders a timestamp in the display zone, or "" when it is missing or
    /// the shifted time falls outside the representable range.
    fn local_time(&self, timestamp: Option<DateTime<Utc>>) -> String {
        let Some(timestamp) = timestamp else {
            return String::new();
        };

        let utc = timestamp.naive_utc();
        let offset = self.zone.offset_from_utc_datetime(&utc).fix();
        utc.checked_add_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))
            .map(|local| local.format(DISPLAY_FORMAT).to_string())
            .unwrap_or_default()
    }
}

/// Formats the time from `now` until `end` as `H:MM:SS`, prefixed with a
/// day count once it exceeds a day. Past or missing ends yield "".
pub fn format_remaining(now: DateTime<Utc>, end: Option<DateTime<Utc>>) -> String {
    let Some(end) = end else {
        return String::new();
    };

    let remaining = end.signed_duration_since(now);
    if remaining < TimeDelta::zero() {
        return String::new();
    }

    let total = remaining.num_seconds();
    let days = total / SECONDS_PER_DAY;
    let seconds = total % SECONDS_PER_DAY;
    let clock = format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    );

    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        days => format!("{} days, {}", days, clock),
    }
}
