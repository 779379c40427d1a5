use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use crate::error::{Error, Result};
use crate::pool::{PoolConfig, range_size};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub leases_file: String,
    #[serde(default = "default_pool_key")]
    pub pool_key: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub shared_networks: Vec<SharedNetwork>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedNetwork {
    pub name: String,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    pub subnet: String,
    #[serde(default)]
    pub ranges: Vec<AddressRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRange {
    pub name: String,
    pub start: IpAddr,
    pub stop: IpAddr,
}

fn default_pool_key() -> String {
    "shared-networkname".to_string()
}

fn default_service_name() -> String {
    "isc-dhcp-server.service".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            leases_file: "/config/dhcpd.leases".to_string(),
            pool_key: default_pool_key(),
            service_name: default_service_name(),
            shared_networks: Vec::new(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_key.is_empty() {
            return Err(Error::InvalidConfig("pool_key must not be empty".to_string()));
        }

        let mut names = HashSet::new();
        for network in &self.shared_networks {
            if network.name.is_empty() {
                return Err(Error::InvalidConfig(
                    "shared network name must not be empty".to_string(),
                ));
            }
            if !names.insert(network.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "shared network {} is defined more than once",
                    network.name
                )));
            }

            for subnet in &network.subnets {
                for range in &subnet.ranges {
                    if range_size(range.start, range.stop).is_err() {
                        return Err(Error::InvalidConfig(format!(
                            "range {} of subnet {} in {} is invalid: {} - {}",
                            range.name, subnet.subnet, network.name, range.start, range.stop
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether any DHCP pool is defined at all.
    pub fn is_configured(&self) -> bool {
        !self.shared_networks.is_empty()
    }

    fn network(&self, pool: &str) -> Option<&SharedNetwork> {
        self.shared_networks
            .iter()
            .find(|network| network.name == pool)
    }

    fn subnet(&self, pool: &str, subnet: &str) -> Option<&Subnet> {
        self.network(pool)?
            .subnets
            .iter()
            .find(|candidate| candidate.subnet == subnet)
    }
}

impl PoolConfig for Config {
    fn pool_exists(&self, pool: &str) -> bool {
        self.network(pool).is_some()
    }

    fn list_pools(&self) -> Vec<String> {
        self.shared_networks
            .iter()
            .map(|network| network.name.clone())
            .collect()
    }

    fn list_subnets(&self, pool: &str) -> Vec<String> {
        self.network(pool)
            .map(|network| {
                network
                    .subnets
                    .iter()
                    .map(|subnet| subnet.subnet.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn list_ranges(&self, pool: &str, subnet: &str) -> Vec<String> {
        self.subnet(pool, subnet)
            .map(|subnet| subnet.ranges.iter().map(|range| range.name.clone()).collect())
            .unwrap_or_default()
    }

    fn range_bounds(&self, pool: &str, subnet: &str, range: &str) -> Option<(IpAddr, IpAddr)> {
        self.subnet(pool, subnet)?
            .ranges
            .iter()
            .find(|candidate| candidate.name == range)
            .map(|range| (range.start, range.stop))
    }
}
