use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    //-------------------------------------------------------------------------
    // IO / Parsing
    //-------------------------------------------------------------------------
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {path}\n\n{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: hcl::Error,
    },

    //-------------------------------------------------------------------------
    // Top-level
    //-------------------------------------------------------------------------
    #[error("configuration validation failed with {} error(s): {errors:?}", errors.len())]
    Validation { errors: Vec<ConfigError> },

    //-------------------------------------------------------------------------
    // Clusters
    //-------------------------------------------------------------------------
    #[error("cluster name must not be empty")]
    EmptyClusterName,

    #[error("duplicate cluster definition: {name}")]
    DuplicateCluster { name: String },

    #[error("local cluster '{name}' is not defined")]
    UnknownLocalCluster { name: String },

    #[error("cluster '{cluster}' enables both zone-aware and locality-weighted balancing")]
    ConflictingLocalityModes { cluster: String },

    //-------------------------------------------------------------------------
    // Hosts
    //-------------------------------------------------------------------------
    #[error("priority {priority} exceeds the maximum of {max}")]
    PriorityOutOfRange { priority: u32, max: u32 },

    #[error("host at priority {priority} has an empty address")]
    EmptyAddress { priority: u32 },

    #[error("duplicate host '{address}' at priority {priority}")]
    DuplicateHost { address: String, priority: u32 },

    #[error("sum of {what} weights at priority {priority} exceeds {}", u32::MAX)]
    WeightOverflow { priority: u32, what: &'static str },

    //-------------------------------------------------------------------------
    // Load balancer
    //-------------------------------------------------------------------------
    #[error("overprovisioning factor must be > 0, got {value}")]
    InvalidOverprovisioningFactor { value: u32 },

    #[error("{what} must be a percentage in 0..=100, got {value}")]
    InvalidPercent { what: &'static str, value: u32 },

    #[error("least request choice count must be >= 2, got {value}")]
    InvalidChoiceCount { value: u32 },
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: hcl::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Collapse collected errors: none is success, one is returned as is,
    /// several are wrapped in [`ConfigError::Validation`].
    pub fn from_errors(mut errors: Vec<ConfigError>) -> Result<(), ConfigError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::Validation { errors }),
        }
    }
}
