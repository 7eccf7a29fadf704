use crate::conf::ConfigError;
use crate::conf::types::ClustersConfig;
use std::fs;
use std::path::Path;

/// Parse a clusters file. No semantic validation is done here.
pub fn parse_clusters(path: &Path) -> Result<ClustersConfig, ConfigError> {
    let s = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    hcl::from_str(&s).map_err(|e| ConfigError::parse(path, e))
}

/// Same as [`parse_clusters`] for config that did not come from a file.
pub fn parse_clusters_str(s: &str) -> Result<ClustersConfig, ConfigError> {
    hcl::from_str(s).map_err(|e| ConfigError::parse("<inline>", e))
}
