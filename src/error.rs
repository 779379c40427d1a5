//! Error types for lease queries.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants. Conditions a caller can recover
//! from (an unknown pool, a stopped service) are not errors; they travel as
//! [`Notice`](crate::Notice)s inside a [`Report`](crate::Report).

use std::net::IpAddr;

/// Errors that can occur while loading or querying a lease journal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system I/O error.
    ///
    /// Returned when the lease journal or the configuration file is missing
    /// or unreadable. An existing but empty journal is not an error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (configuration file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A requested lease state is not one of the known states.
    #[error("Invalid lease state '{state}', choose from: {}", .allowed.join(", "))]
    InvalidState {
        state: String,
        allowed: &'static [&'static str],
    },

    /// A requested sort key is not one of the lease fields.
    #[error("Invalid sort key '{key}', choose from: {}", .allowed.join(", "))]
    InvalidSortKey {
        key: String,
        allowed: &'static [&'static str],
    },

    /// Invalid configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate) when the
    /// configuration contains invalid values (e.g., duplicate pool names).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An address range whose bounds cannot describe an inclusive span.
    ///
    /// The bounds are of different address families, or `start > stop`.
    #[error("Invalid address range {start} - {stop}")]
    InvalidRange { start: IpAddr, stop: IpAddr },
}

/// A specialized Result type for lease query operations.
pub type Result<T> = std::result::Result<T, Error>;
