//! Collapsing journal records into one authoritative lease per address.
//!
//! Each renewal appends a new record, so a journal usually holds several
//! records per address. The record that started most recently wins. When
//! two records share the same latest start, the later one in journal order
//! wins, which is exactly what a stable ascending sort by start followed by
//! overwrite-by-address would produce.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::net::IpAddr;

use crate::lease::LeaseRecord;

/// Returns one record per distinct address, ordered by address.
///
/// Records without a start time lose to any dated record for the same
/// address.
pub fn resolve(records: impl IntoIterator<Item = LeaseRecord>) -> Vec<LeaseRecord> {
    let mut latest: BTreeMap<IpAddr, LeaseRecord> = BTreeMap::new();

    for record in records {
        match latest.entry(record.address) {
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
            Entry::Occupied(mut entry) => {
                if record.start >= entry.get().start {
                    entry.insert(record);
                }
            }
        }
    }

    latest.into_values().collect()
}
