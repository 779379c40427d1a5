//! # leasestat
//!
//! Lease listings and pool statistics from an ISC DHCP lease journal
//! (`dhcpd.leases`).
//!
//! ## Features
//!
//! - Lenient journal parsing that tolerates a half-written trailing entry
//! - One authoritative lease per address (latest start wins)
//! - Local-time display fields and time remaining per lease
//! - Filtering by binding state and pool, numeric address ordering
//! - Pool capacity and utilization from configured address ranges
//!
//! ## Quick Start
//!
//! ```no_run
//! use leasestat::{Config, Enricher, LeaseQuery, load_journal, resolve};
//!
//! #[tokio::main]
//! async fn main() -> leasestat::Result<()> {
//!     let config = Config::load("config.json")?;
//!     let query = LeaseQuery::parse(["active"], None, "ip")?;
//!
//!     let records = resolve(load_journal(&config.leases_file).await?);
//!     let leases = Enricher::local(config.pool_key.as_str()).enrich_all(&records);
//!
//!     for lease in query.run(leases, &config).rows {
//!         println!("{} {} {}", lease.ip, lease.state, lease.remaining);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`journal`] - Journal text → [`LeaseRecord`]s
//! - [`resolve()`] - One record per address
//! - [`Enricher`] - Display fields ([`EnrichedLease`])
//! - [`LeaseQuery`] - State/pool filters and ordering
//! - [`pool_statistics`] - Capacity and utilization per pool ([`PoolStat`])
//! - [`Config`] - JSON configuration, implements [`PoolConfig`]

pub mod config;
pub mod enrich;
pub mod error;
pub mod journal;
pub mod lease;
pub mod pool;
pub mod query;
pub mod resolve;
pub mod service;

pub use config::Config;
pub use enrich::{EnrichedLease, Enricher};
pub use error::{Error, Result};
pub use journal::{load_journal, parse_journal};
pub use lease::{BindingState, LeaseRecord};
pub use pool::{PoolConfig, PoolStat, pool_capacity, pool_statistics};
pub use query::{LeaseQuery, Notice, Report, SortKey, StateFilter};
pub use resolve::resolve;
pub use service::{ServiceStatus, Systemctl, check_service};
