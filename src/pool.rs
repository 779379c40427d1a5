//! Pool capacity and utilization statistics.
//!
//! A pool (shared network) is made of subnets, each with one or more
//! inclusive address ranges. Pool capacity is the total number of addresses
//! in those ranges; utilization compares it with the number of active
//! leases the journal holds for the pool.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::enrich::EnrichedLease;
use crate::error::{Error, Result};
use crate::lease::BindingState;
use crate::query::{LeaseQuery, Notice, Report, StateFilter};

/// Read access to the committed pool/subnet/range configuration.
///
/// Enumeration order is meaningful: statistics for all pools are reported
/// in the order [`list_pools`](Self::list_pools) returns them.
pub trait PoolConfig {
    fn pool_exists(&self, pool: &str) -> bool;

    fn list_pools(&self) -> Vec<String>;

    fn list_subnets(&self, pool: &str) -> Vec<String>;

    fn list_ranges(&self, pool: &str, subnet: &str) -> Vec<String>;

    /// Inclusive `(start, stop)` bounds of a range, if it exists.
    fn range_bounds(&self, pool: &str, subnet: &str, range: &str) -> Option<(IpAddr, IpAddr)>;
}

/// Number of addresses in the inclusive range `start..=stop`.
///
/// # Errors
///
/// Returns [`Error::InvalidRange`] if the bounds are of different address
/// families or `start > stop`.
pub fn range_size(start: IpAddr, stop: IpAddr) -> Result<u128> {
    let (low, high) = match (start, stop) {
        (IpAddr::V4(start), IpAddr::V4(stop)) => (u32::from(start) as u128, u32::from(stop) as u128),
        (IpAddr::V6(start), IpAddr::V6(stop)) => (u128::from(start), u128::from(stop)),
        _ => return Err(Error::InvalidRange { start, stop }),
    };

    if low > high {
        return Err(Error::InvalidRange { start, stop });
    }

    // A full IPv6 range holds 2^128 addresses, one more than u128 can count.
    Ok((high - low).saturating_add(1))
}

/// Total number of addresses in every range of every subnet of `pool`.
pub fn pool_capacity(config: &impl PoolConfig, pool: &str) -> Result<u128> {
    let mut capacity: u128 = 0;

    for subnet in config.list_subnets(pool) {
        for range in config.list_ranges(pool, &subnet) {
            let Some((start, stop)) = config.range_bounds(pool, &subnet, &range) else {
                debug!("Range {} of {} in {} has no bounds", range, subnet, pool);
                continue;
            };
            capacity = capacity.saturating_add(range_size(start, stop)?);
        }
    }

    Ok(capacity)
}

/// Usage summary for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStat {
    #[serde(rename = "pool")]
    pub name: String,
    #[serde(rename = "size")]
    pub capacity: u128,
    #[serde(rename = "leases")]
    pub active: usize,
    /// Negative when the journal holds more active leases than the ranges
    /// contain (e.g. after the ranges were shrunk).
    pub available: i128,
    /// Rounded half to even; 0 for an empty pool.
    #[serde(rename = "percentage")]
    pub utilization: u64,
}

impl PoolStat {
    pub fn new(name: impl Into<String>, capacity: u128, active: usize) -> Self {
        let active_wide = active as u128;
        let available = if capacity >= active_wide {
            i128::try_from(capacity - active_wide).unwrap_or(i128::MAX)
        } else {
            -i128::try_from(active_wide - capacity).unwrap_or(i128::MAX)
        };

        let utilization = if capacity == 0 {
            0
        } else {
            (active as f64 / capacity as f64 * 100.0).round_ties_even() as u64
        };

        Self {
            name: name.into(),
            capacity,
            active,
            available,
            utilization,
        }
    }
}

/// Computes statistics for `pool`, or for every configured pool if `None`.
///
/// `leases` are the enriched leases of the whole journal; only active ones
/// tagged with a pool count towards it. An unknown `pool` yields an empty
/// report carrying [`Notice::NoSuchPool`].
///
/// # Errors
///
/// Returns [`Error::InvalidRange`] if a configured range is malformed.
pub fn pool_statistics(
    config: &impl PoolConfig,
    leases: &[EnrichedLease],
    pool: Option<&str>,
) -> Result<Report<PoolStat>> {
    let pools = match pool {
        Some(pool) if !config.pool_exists(pool) => {
            return Ok(Report::empty(Notice::NoSuchPool(pool.to_string())));
        }
        Some(pool) => vec![pool.to_string()],
        None => config.list_pools(),
    };

    let mut stats = Vec::with_capacity(pools.len());
    for pool in pools {
        let capacity = pool_capacity(config, &pool)?;
        let query = LeaseQuery {
            states: StateFilter::only([BindingState::Active]),
            pool: Some(pool.clone()),
            ..LeaseQuery::default()
        };
        let active = leases.iter().filter(|lease| query.matches(lease)).count();
        debug!("Pool {}: {} of {} addresses active", pool, active, capacity);
        stats.push(PoolStat::new(pool, capacity, active));
    }

    Ok(Report::new(stats))
}
