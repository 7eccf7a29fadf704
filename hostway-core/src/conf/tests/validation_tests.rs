use crate::conf::types::{
    ClusterConfig, ClustersConfig, EndpointConfig, LoadBalancerConfig, PriorityConfig,
    ZoneAwareConfig,
};
use crate::conf::{ConfigError, validate_cluster, validate_clusters, validate_load_balancer};

fn endpoint(address: &str) -> EndpointConfig {
    EndpointConfig {
        address: address.to_string(),
        weight: 1,
        region: String::new(),
        zone: String::new(),
        sub_zone: String::new(),
        health: None,
        excluded: None,
    }
}

fn cluster(name: &str, addresses: &[&str]) -> ClusterConfig {
    ClusterConfig {
        name: name.to_string(),
        priorities: vec![PriorityConfig {
            endpoints: addresses.iter().map(|a| endpoint(a)).collect(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[test]
fn validate_minimal_clusters() {
    // Arrange
    let cfg = ClustersConfig {
        local_cluster: Some("edge".to_string()),
        clusters: vec![cluster("edge", &["a:1"]), cluster("api", &["b:1", "c:1"])],
    };

    // Act
    let result = validate_clusters(&cfg);

    // Assert
    assert!(result.is_ok());
}

#[test]
fn duplicate_cluster_names_are_rejected() {
    let cfg = ClustersConfig {
        local_cluster: None,
        clusters: vec![cluster("api", &["a:1"]), cluster("api", &["b:1"])],
    };

    let err = validate_clusters(&cfg).unwrap_err();

    assert!(matches!(err, ConfigError::DuplicateCluster { ref name } if name == "api"));
}

#[test]
fn errors_across_clusters_are_aggregated() {
    // Arrange
    let mut bad_lb = cluster("lb", &["a:1"]);
    bad_lb.load_balancer.overprovisioning_factor = 0;
    bad_lb.load_balancer.healthy_panic_threshold = 101;
    let cfg = ClustersConfig {
        local_cluster: Some("missing".to_string()),
        clusters: vec![cluster("", &["a:1"]), cluster("dup", &["x:1", "x:1"]), bad_lb],
    };

    // Act
    let err = validate_clusters(&cfg).unwrap_err();

    // Assert
    let ConfigError::Validation { errors } = err else {
        panic!("expected aggregated errors");
    };
    assert_eq!(errors.len(), 5);
    assert!(matches!(errors[0], ConfigError::EmptyClusterName));
    assert!(matches!(errors[1], ConfigError::DuplicateHost { .. }));
    assert!(matches!(errors[2], ConfigError::InvalidOverprovisioningFactor { value: 0 }));
    assert!(matches!(
        errors[3],
        ConfigError::InvalidPercent { value: 101, .. }
    ));
    assert!(matches!(errors[4], ConfigError::UnknownLocalCluster { .. }));
}

#[test]
fn empty_address_is_rejected() {
    let mut errors = Vec::new();

    validate_cluster(&cluster("c", &[""]), &mut errors);

    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ConfigError::EmptyAddress { priority: 0 }));
}

#[test]
fn zero_weight_is_not_an_error() {
    let mut c = cluster("c", &["a:1"]);
    c.priorities[0].endpoints[0].weight = 0;
    let mut errors = Vec::new();

    validate_cluster(&c, &mut errors);

    assert!(errors.is_empty());
}

#[test]
fn too_many_priorities_are_rejected() {
    let mut c = cluster("c", &[]);
    c.priorities = vec![PriorityConfig::default(); 200];
    let mut errors = Vec::new();

    validate_cluster(&c, &mut errors);

    assert!(matches!(
        errors[..],
        [ConfigError::PriorityOutOfRange { priority: 199, max: 127 }]
    ));
}

#[test]
fn zone_aware_and_locality_weighted_conflict() {
    let lb = LoadBalancerConfig {
        locality_weighted: true,
        zone_aware: Some(ZoneAwareConfig::default()),
        ..LoadBalancerConfig::default()
    };
    let mut errors = Vec::new();

    validate_load_balancer("api", &lb, &mut errors);

    assert!(matches!(
        errors[..],
        [ConfigError::ConflictingLocalityModes { ref cluster }] if cluster == "api"
    ));
}

#[test]
fn disabled_zone_aware_does_not_conflict() {
    let lb = LoadBalancerConfig {
        locality_weighted: true,
        zone_aware: Some(ZoneAwareConfig {
            enabled: false,
            ..ZoneAwareConfig::default()
        }),
        ..LoadBalancerConfig::default()
    };
    let mut errors = Vec::new();

    validate_load_balancer("api", &lb, &mut errors);

    assert!(errors.is_empty());
}

#[test]
fn choice_count_and_routing_percent_are_checked() {
    let lb = LoadBalancerConfig {
        least_request_choice_count: 1,
        zone_aware: Some(ZoneAwareConfig {
            routing_enabled_percent: 150,
            ..ZoneAwareConfig::default()
        }),
        ..LoadBalancerConfig::default()
    };
    let mut errors = Vec::new();

    validate_load_balancer("api", &lb, &mut errors);

    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], ConfigError::InvalidChoiceCount { value: 1 }));
    assert!(matches!(
        errors[1],
        ConfigError::InvalidPercent { value: 150, .. }
    ));
}

#[test]
fn validation_error_message_counts_errors() {
    let err = ConfigError::Validation {
        errors: vec![ConfigError::EmptyClusterName, ConfigError::EmptyClusterName],
    };

    assert!(err.to_string().starts_with("configuration validation failed with 2 error(s)"));
}
