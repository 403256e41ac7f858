//! Error types for Dome
//!
//! Only configuration and asset-load failures are surfaced to the operator.
//! Clock, loop and transient decode conditions are not errors and never
//! appear here.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal setup errors; the process aborts before the frame loop starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither the command line nor the config file established a role
    #[error("No role assigned: pass --primary/--replica or set `role` in the config")]
    NoRole,

    /// Both roles were requested at once
    #[error("Conflicting role flags: a node is either primary or replica")]
    ConflictingRole,

    /// The replication transport could not be opened
    #[error("Replication transport unavailable on {addr}: {reason}")]
    TransportUnavailable { addr: String, reason: String },

    /// A configured address could not be parsed
    #[error("Invalid network address '{0}'")]
    InvalidAddress(String),

    /// A config value is out of its valid range
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Result type for setup operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Asset and decoder errors (local and recoverable)
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The asset id could not be resolved against the media root
    #[error("Asset '{0}' not found under the media root")]
    AssetNotFound(String),

    /// The asset path exists but holds nothing decodable
    #[error("No decodable frames in {0:?}")]
    EmptyStream(PathBuf),

    /// The decoder rejected the file
    #[error("Unsupported media {path:?}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    /// Filesystem error while opening media
    #[error("I/O error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The background decode thread could not be started
    #[error("Failed to start decoder thread: {0}")]
    ThreadSpawn(String),
}

/// Result type for decoder operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Wire and transport errors of the replication channel
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// Datagram shorter than header + state
    #[error("Snapshot truncated: got {got} bytes, expected {expected}")]
    Truncated { got: usize, expected: usize },

    /// Header magic does not match
    #[error("Not a snapshot datagram (bad magic {0:#010x})")]
    BadMagic(u32),

    /// Sender uses a different SharedState layout
    #[error("Snapshot layout mismatch: version {version} / {size} bytes, expected version {expected_version} / {expected_size} bytes")]
    LayoutMismatch {
        version: u32,
        size: u64,
        expected_version: u32,
        expected_size: u64,
    },

    /// Underlying transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// Result type for replication operations
pub type ReplicationResult<T> = Result<T, ReplicationError>;
