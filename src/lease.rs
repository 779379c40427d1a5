//! Lease records as written to the journal by the DHCP daemon.
//!
//! A [`LeaseRecord`] is one entry of the append-only journal. The same
//! address shows up many times over the life of a journal (every renewal
//! appends a fresh entry), so records are not unique by address; see
//! [`resolve`](crate::resolve) for collapsing them.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a lease as recorded by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingState {
    /// Address is available for allocation.
    Free,
    /// Address is bound to a client.
    Active,
    /// Lease ran out without being renewed.
    Expired,
    /// Client gave the address back (DHCPRELEASE).
    Released,
    /// Address was declined or found in use by someone else.
    Abandoned,
    /// Failover peer reset the lease.
    Reset,
    /// Address is reserved for the failover peer.
    Backup,
}

impl BindingState {
    /// Every binding state, in the order the server documents them.
    pub const ALL: [BindingState; 7] = [
        Self::Active,
        Self::Free,
        Self::Expired,
        Self::Released,
        Self::Abandoned,
        Self::Reset,
        Self::Backup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Released => "released",
            Self::Abandoned => "abandoned",
            Self::Reset => "reset",
            Self::Backup => "backup",
        }
    }
}

impl TryFrom<&str> for BindingState {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "free" => Ok(Self::Free),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "released" => Ok(Self::Released),
            "abandoned" => Ok(Self::Abandoned),
            "reset" => Ok(Self::Reset),
            "backup" => Ok(Self::Backup),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lease entry from the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// The leased address (IPv4 lease or IPv6 `iaaddr`).
    pub address: IpAddr,

    /// Link-layer address of the client, without the hardware type.
    pub hardware_address: Option<String>,

    /// Client-supplied hostname (`client-hostname`).
    pub hostname: Option<String>,

    pub binding_state: BindingState,

    /// When the lease started (UTC). `None` if absent or unparsable.
    pub start: Option<DateTime<Utc>>,

    /// When the lease ends (UTC). `None` for `never` or unparsable values.
    pub end: Option<DateTime<Utc>>,

    /// Attributes from `set <key> = "<value>";` statements, uninterpreted.
    pub sets: BTreeMap<String, String>,

    /// Raw `tstp` value (time sent to failover peer).
    pub tstp: String,
    /// Raw `tsfp` value (time sent from failover peer).
    pub tsfp: String,
    /// Raw `atsfp` value (actual time sent from failover peer).
    pub atsfp: String,
    /// Raw `cltt` value (client last transaction time).
    pub cltt: String,
}

impl LeaseRecord {
    /// Creates a record with no timestamps, attributes, or client details.
    pub fn new(address: IpAddr, binding_state: BindingState) -> Self {
        Self {
            address,
            hardware_address: None,
            hostname: None,
            binding_state,
            start: None,
            end: None,
            sets: BTreeMap::new(),
            tstp: String::new(),
            tsfp: String::new(),
            atsfp: String::new(),
            cltt: String::new(),
        }
    }

    /// Returns the value of a `set` attribute, if the daemon wrote one.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.sets.get(key).map(String::as_str)
    }
}
