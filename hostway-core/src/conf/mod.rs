mod error;
mod parse;
pub mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use error::ConfigError;
pub use parse::{parse_clusters, parse_clusters_str};
pub use types::*;
pub use validation::{validate_cluster, validate_clusters, validate_hosts, validate_load_balancer};

use std::path::Path;

/// Parse and validate a clusters file.
pub fn load_clusters(path: &Path) -> Result<ClustersConfig, ConfigError> {
    let cfg = parse_clusters(path)?;
    validate_clusters(&cfg)?;
    Ok(cfg)
}
