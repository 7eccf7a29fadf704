use crate::conf::parse_clusters_str;
use crate::runtime::{ClusterManager, ReloadSummary};
use crate::traffic::{DecisionReason, LoadBalancerContext};
use crate::upstream::Locality;
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

const INITIAL: &str = r#"
clusters = [
  { name = "api", priorities = [ { endpoints = [ { address = "a:1" } ] } ] },
  { name = "auth", priorities = [ { endpoints = [ { address = "b:1" } ] } ] },
]
"#;

const NEXT: &str = r#"
clusters = [
  { name = "api", priorities = [ { endpoints = [ { address = "a:2" } ] } ] },
  { name = "search", priorities = [ { endpoints = [ { address = "s:1" } ] } ] },
]
"#;

#[test]
fn reload_adds_updates_and_removes_clusters() {
    // Arrange
    let manager = ClusterManager::new();
    manager.reload(&parse_clusters_str(INITIAL).unwrap()).unwrap();
    let api = manager.get("api").unwrap();
    let mut lb = manager.load_balancer("api").unwrap();

    // Act
    let summary = manager.reload(&parse_clusters_str(NEXT).unwrap()).unwrap();

    // Assert
    assert_eq!(
        summary,
        ReloadSummary {
            added: vec!["search".to_string()],
            updated: vec!["api".to_string()],
            removed: vec!["auth".to_string()],
        }
    );
    assert_eq!(manager.names(), ["api", "search"]);
    assert!(Arc::ptr_eq(&api, &manager.get("api").unwrap()));

    let host = lb.choose_host(&mut LoadBalancerContext::new()).unwrap();
    assert_eq!(host.address(), "a:2");
}

#[test]
fn invalid_reload_changes_nothing() {
    // Arrange
    let manager = ClusterManager::new();
    manager.reload(&parse_clusters_str(INITIAL).unwrap()).unwrap();
    let bad = parse_clusters_str(
        r#"
clusters = [
  { name = "api", priorities = [ { endpoints = [ { address = "" } ] } ] },
]
"#,
    )
    .unwrap();

    // Act
    let result = manager.reload(&bad);

    // Assert
    assert!(result.is_err());
    assert_eq!(manager.names(), ["api", "auth"]);
}

#[test]
fn reload_from_path_reads_and_validates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clusters.hcl");
    fs::write(&path, INITIAL).unwrap();
    let manager = ClusterManager::new();

    let summary = manager.reload_from_path(&path).unwrap();

    assert_eq!(summary.added.len(), 2);
    assert!(manager.reload_from_path(&dir.path().join("missing.hcl")).is_err());
    assert_eq!(manager.len(), 2);
}

#[test]
fn remove_and_get() {
    let manager = ClusterManager::new();
    manager.reload(&parse_clusters_str(INITIAL).unwrap()).unwrap();

    assert!(manager.remove("auth").is_some());
    assert!(manager.remove("auth").is_none());
    assert!(manager.get("auth").is_none());
    assert!(manager.load_balancer("auth").is_none());
    assert!(!manager.is_empty());
}

#[test]
fn zone_aware_cluster_is_wired_to_local_cluster() {
    // Arrange
    let manager = ClusterManager::new();
    let cfg = parse_clusters_str(
        r#"
local_cluster = "edge"
clusters = [
  {
    name = "edge"
    priorities = [ { endpoints = [
      { address = "e1", zone = "a" }, { address = "e2", zone = "a" },
      { address = "e3", zone = "b" }, { address = "e4", zone = "b" },
    ] } ]
  },
  {
    name = "api"
    load_balancer = { zone_aware = { min_cluster_size = 2 } }
    priorities = [ { endpoints = [
      { address = "a1", zone = "a" }, { address = "a2", zone = "a" },
      { address = "b1", zone = "b" }, { address = "b2", zone = "b" },
    ] } ]
  },
]
"#,
    )
    .unwrap();
    manager.reload(&cfg).unwrap();
    let mut lb = manager.load_balancer("api").unwrap();
    let here = Locality::zone("", "a");
    let mut ctx = LoadBalancerContext::new().with_local_locality(&here);

    // Act
    let decision = lb.decide(&mut ctx).unwrap();

    // Assert
    assert_eq!(manager.local_cluster().unwrap().name(), "edge");
    assert_eq!(decision.reason, DecisionReason::LocalityDirect);
    assert_eq!(decision.host.locality(), &here);
}
