//! Filtering and ordering enriched leases.
//!
//! A [`LeaseQuery`] is validated up front (unknown states or sort keys are
//! rejected before the journal is touched) and then applied to the enriched
//! leases. Asking for a pool that is not configured is not an error: the
//! query returns an empty [`Report`] carrying a [`Notice`].

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::enrich::EnrichedLease;
use crate::error::{Error, Result};
use crate::lease::BindingState;
use crate::pool::PoolConfig;

/// State filter tokens accepted from callers. `all` disables filtering.
pub const STATE_NAMES: [&str; 8] = [
    "all",
    "active",
    "free",
    "expired",
    "released",
    "abandoned",
    "reset",
    "backup",
];

/// Lease fields a query can be sorted by, in display order.
pub const SORT_KEYS: [&str; 8] = [
    "ip",
    "hardware_address",
    "state",
    "start",
    "end",
    "remaining",
    "pool",
    "hostname",
];

/// Which binding states a query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateFilter {
    All,
    Only(BTreeSet<BindingState>),
}

impl Default for StateFilter {
    fn default() -> Self {
        Self::only([BindingState::Active])
    }
}

impl StateFilter {
    /// Values accepted by [`parse`](Self::parse).
    pub fn allowed() -> &'static [&'static str] {
        &STATE_NAMES
    }

    pub fn only(states: impl IntoIterator<Item = BindingState>) -> Self {
        Self::Only(states.into_iter().collect())
    }

    /// Builds a filter from state names such as `["active", "expired"]`.
    ///
    /// `all` anywhere in the list selects every state. An empty list gives
    /// the default filter (active leases only).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] for any unknown name.
    pub fn parse<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Result<Self> {
        let mut all = false;
        let mut states = BTreeSet::new();

        for name in names {
            let name = name.as_ref();
            if name == "all" {
                all = true;
                continue;
            }
            let state = BindingState::try_from(name).map_err(|state| Error::InvalidState {
                state,
                allowed: Self::allowed(),
            })?;
            states.insert(state);
        }

        Ok(if all {
            Self::All
        } else if states.is_empty() {
            Self::default()
        } else {
            Self::Only(states)
        })
    }

    pub fn matches(&self, state: BindingState) -> bool {
        match self {
            Self::All => true,
            Self::Only(states) => states.contains(&state),
        }
    }
}

/// Field a query is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Numeric address order (`10.0.0.2` before `10.0.0.10`).
    #[default]
    Ip,
    HardwareAddress,
    State,
    Start,
    End,
    Remaining,
    Pool,
    Hostname,
}

impl SortKey {
    pub const ALL: [SortKey; 8] = [
        Self::Ip,
        Self::HardwareAddress,
        Self::State,
        Self::Start,
        Self::End,
        Self::Remaining,
        Self::Pool,
        Self::Hostname,
    ];

    /// Values accepted by [`FromStr`].
    pub fn allowed() -> &'static [&'static str] {
        &SORT_KEYS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::HardwareAddress => "hardware_address",
            Self::State => "state",
            Self::Start => "start",
            Self::End => "end",
            Self::Remaining => "remaining",
            Self::Pool => "pool",
            Self::Hostname => "hostname",
        }
    }

    /// Compares two leases by this field. Absent values sort first.
    pub fn compare(&self, a: &EnrichedLease, b: &EnrichedLease) -> Ordering {
        match self {
            Self::Ip => a.ip.cmp(&b.ip),
            Self::HardwareAddress => a.hardware_address.cmp(&b.hardware_address),
            Self::State => a.state.as_str().cmp(b.state.as_str()),
            Self::Start => a.start.cmp(&b.start),
            Self::End => a.end.cmp(&b.end),
            Self::Remaining => a.remaining.cmp(&b.remaining),
            Self::Pool => a.pool.cmp(&b.pool),
            Self::Hostname => a.hostname.cmp(&b.hostname),
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == key)
            .ok_or_else(|| Error::InvalidSortKey {
                key: key.to_string(),
                allowed: Self::allowed(),
            })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable condition reported alongside query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The requested pool is not in the configuration.
    NoSuchPool(String),
    /// The DHCP service is configured but not running, so leases shown as
    /// active may already have lapsed.
    ServiceStopped(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchPool(pool) => write!(f, "Pool {} does not exist.", pool),
            Self::ServiceStopped(_) => write!(
                f,
                "WARNING: DHCP server is configured but not started. Data may be stale."
            ),
        }
    }
}

/// Query results plus any notices the caller should show.
#[derive(Debug, Clone, PartialEq)]
pub struct Report<T> {
    pub rows: Vec<T>,
    pub notices: Vec<Notice>,
}

impl<T> Report<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            rows,
            notices: Vec::new(),
        }
    }

    /// A report with no rows, explained by `notice`.
    pub fn empty(notice: Notice) -> Self {
        Self {
            rows: Vec::new(),
            notices: vec![notice],
        }
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }
}

/// State filter, optional pool and ordering for a lease listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseQuery {
    pub states: StateFilter,
    pub pool: Option<String>,
    pub sort: SortKey,
}

impl LeaseQuery {
    /// Validates caller input into a query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] or [`Error::InvalidSortKey`].
    pub fn parse<S: AsRef<str>>(
        states: impl IntoIterator<Item = S>,
        pool: Option<String>,
        sort: &str,
    ) -> Result<Self> {
        Ok(Self {
            sort: sort.parse()?,
            states: StateFilter::parse(states)?,
            pool,
        })
    }

    /// Whether a lease passes the state and pool predicates.
    pub fn matches(&self, lease: &EnrichedLease) -> bool {
        self.states.matches(lease.state)
            && self
                .pool
                .as_deref()
                .is_none_or(|pool| lease.pool == pool)
    }

    /// Filters and sorts `leases`.
    ///
    /// The pool, if any, is checked against `config` first; an unknown pool
    /// yields an empty report with [`Notice::NoSuchPool`]. Sorting is stable,
    /// so running a query over its own output returns it unchanged.
    pub fn run(
        &self,
        leases: impl IntoIterator<Item = EnrichedLease>,
        config: &impl PoolConfig,
    ) -> Report<EnrichedLease> {
        if let Some(pool) = &self.pool
            && !config.pool_exists(pool)
        {
            return Report::empty(Notice::NoSuchPool(pool.clone()));
        }

        let mut rows: Vec<EnrichedLease> = leases
            .into_iter()
            .filter(|lease| self.matches(lease))
            .collect();
        rows.sort_by(|a, b| self.sort.compare(a, b));

        debug!("Query matched {} leases, sorted by {}", rows.len(), self.sort);
        Report::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    struct KnownPools(Vec<&'static str>);

    impl PoolConfig for KnownPools {
        fn pool_exists(&self, pool: &str) -> bool {
            self.0.iter().any(|known| *known == pool)
        }

        fn list_pools(&self) -> Vec<String> {
            self.0.iter().map(|pool| pool.to_string()).collect()
        }

        fn list_subnets(&self, _pool: &str) -> Vec<String> {
            Vec::new()
        }

        fn list_ranges(&self, _pool: &str, _subnet: &str) -> Vec<String> {
            Vec::new()
        }

        fn range_bounds(&self, _pool: &str, _subnet: &str, _range: &str) -> Option<(IpAddr, IpAddr)> {
            None
        }
    }

    fn lease(ip: &str, state: BindingState, pool: &str) -> EnrichedLease {
        EnrichedLease {
            ip: ip.parse().unwrap(),
            hardware_address: None,
            state,
            start: String::new(),
            end: String::new(),
            remaining: String::new(),
            pool: pool.to_string(),
            hostname: None,
            tstp: String::new(),
            tsfp: String::new(),
            atsfp: String::new(),
            cltt: String::new(),
        }
    }

    fn sample() -> Vec<EnrichedLease> {
        vec![
            lease("10.0.0.10", BindingState::Active, "LAN"),
            lease("10.0.0.2", BindingState::Free, "LAN"),
            lease("10.0.0.1", BindingState::Active, "WIFI"),
            lease("10.0.0.3", BindingState::Expired, ""),
        ]
    }

    fn config() -> KnownPools {
        KnownPools(vec!["LAN", "WIFI"])
    }

    fn ips(report: &Report<EnrichedLease>) -> Vec<String> {
        report.rows.iter().map(|lease| lease.ip.to_string()).collect()
    }

    #[test]
    fn test_state_filter_parse() {
        assert_eq!(StateFilter::parse(["all"]).unwrap(), StateFilter::All);
        assert_eq!(StateFilter::parse(["active", "all"]).unwrap(), StateFilter::All);
        assert_eq!(StateFilter::parse(Vec::<String>::new()).unwrap(), StateFilter::default());
        assert_eq!(
            StateFilter::parse(["expired", "free"]).unwrap(),
            StateFilter::only([BindingState::Free, BindingState::Expired])
        );
    }

    #[test]
    fn test_state_filter_rejects_unknown_state() {
        let error = StateFilter::parse(["active", "leased"]).unwrap_err();
        match error {
            Error::InvalidState { state, allowed } => {
                assert_eq!(state, "leased");
                assert_eq!(allowed, &STATE_NAMES);
            }
            other => panic!("Expected InvalidState, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_key_conversions() {
        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse::<SortKey>().unwrap(), key);
        }
        assert_eq!(SortKey::ALL.map(|key| key.as_str()), SORT_KEYS);
        assert!(matches!(
            "tstp".parse::<SortKey>(),
            Err(Error::InvalidSortKey { .. })
        ));
    }

    #[test]
    fn test_error_lists_allowed_values() {
        let message = "bogus".parse::<SortKey>().unwrap_err().to_string();
        assert!(message.contains("ip, hardware_address, state"));
    }

    #[test]
    fn test_sort_by_ip_is_numeric() {
        let leases = vec![
            lease("10.0.0.10", BindingState::Active, ""),
            lease("10.0.0.2", BindingState::Active, ""),
            lease("10.0.0.1", BindingState::Active, ""),
        ];
        let report = LeaseQuery::default().run(leases, &config());
        assert_eq!(ips(&report), vec!["10.0.0.1", "10.0.0.2", "10.0.0.10"]);
    }

    #[test]
    fn test_all_states_keeps_every_lease() {
        let query = LeaseQuery {
            states: StateFilter::All,
            ..LeaseQuery::default()
        };
        assert_eq!(query.run(sample(), &config()).rows.len(), sample().len());
    }

    #[test]
    fn test_default_query_selects_active() {
        let report = LeaseQuery::default().run(sample(), &config());
        assert_eq!(ips(&report), vec!["10.0.0.1", "10.0.0.10"]);
        assert!(report.notices.is_empty());
    }

    #[test]
    fn test_pool_filter() {
        let query = LeaseQuery::parse(["all"], Some("LAN".to_string()), "ip").unwrap();
        let report = query.run(sample(), &config());
        assert_eq!(ips(&report), vec!["10.0.0.2", "10.0.0.10"]);
    }

    #[test]
    fn test_unknown_pool_is_empty_with_notice() {
        let query = LeaseQuery::parse(["all"], Some("GUEST".to_string()), "ip").unwrap();
        let report = query.run(sample(), &config());
        assert!(report.rows.is_empty());
        assert_eq!(report.notices, vec![Notice::NoSuchPool("GUEST".to_string())]);
        assert_eq!(report.notices[0].to_string(), "Pool GUEST does not exist.");
    }

    #[test]
    fn test_sort_by_field_is_stable() {
        let query = LeaseQuery::parse(["all"], None, "pool").unwrap();
        let report = query.run(sample(), &config());
        assert_eq!(
            ips(&report),
            vec!["10.0.0.3", "10.0.0.10", "10.0.0.2", "10.0.0.1"]
        );
    }

    #[test]
    fn test_sort_by_state_name() {
        let query = LeaseQuery::parse(["all"], None, "state").unwrap();
        let states: Vec<BindingState> = query
            .run(sample(), &config())
            .rows
            .iter()
            .map(|lease| lease.state)
            .collect();
        assert_eq!(
            states,
            vec![
                BindingState::Active,
                BindingState::Active,
                BindingState::Expired,
                BindingState::Free,
            ]
        );
    }

    #[test]
    fn test_query_is_idempotent() {
        let query = LeaseQuery::parse(["active", "free"], Some("LAN".to_string()), "state").unwrap();
        let once = query.run(sample(), &config());
        let twice = query.run(once.rows.clone(), &config());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_ipv4_sorts_before_ipv6() {
        let leases = vec![
            lease("2001:db8::1", BindingState::Active, ""),
            lease("192.0.2.1", BindingState::Active, ""),
        ];
        let report = LeaseQuery::default().run(leases, &config());
        assert_eq!(report.rows[0].ip, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    }
}
