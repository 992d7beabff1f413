use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use herd::commands::AGENT_CONFIG_PATH;
use herd::*;
use herd_testkit::*;
use tokio::net::TcpListener;

fn service_config(calls: &[ControlPlaneCall], name: &str) -> Option<BTreeMap<String, String>> {
    calls.iter().find_map(|call| match call {
        ControlPlaneCall::UpdateServiceConfig { service, config } if service == name => {
            Some(config.clone())
        }
        _ => None,
    })
}

fn role_config(calls: &[ControlPlaneCall], name: &str) -> Option<BTreeMap<String, String>> {
    calls.iter().find_map(|call| match call {
        ControlPlaneCall::UpdateRoleConfig { role_name, config, .. } if role_name == name => {
            Some(config.clone())
        }
        _ => None,
    })
}

#[tokio::test]
async fn test_bootstrap_core_topology() {
    let cluster = sample_cluster();
    let harness = Harness::new(&cluster).await.unwrap();

    harness.deployer.configure_cluster(&cluster).await.unwrap();

    let calls = harness.control_plane.calls();
    let created_services: Vec<_> = calls
        .iter()
        .filter_map(|call| match call {
            ControlPlaneCall::CreateService { name, service_type } => {
                Some((name.as_str(), service_type.as_str()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        created_services,
        vec![("hdfs01", "HDFS"), ("yarn01", "YARN"), ("oozie01", "OOZIE")]
    );

    let roles: HashSet<_> = calls
        .iter()
        .filter_map(|call| match call {
            ControlPlaneCall::CreateRole { role_name, .. } => Some(role_name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        roles,
        HashSet::from([
            "NN_master_1",
            "RM_master_1",
            "DN_worker_1",
            "NM_worker_1",
            "DN_worker_2",
            "NM_worker_2",
        ])
    );

    assert_eq!(
        calls.first(),
        Some(&ControlPlaneCall::GetAllHosts),
        "agent barrier precedes every mutating call"
    );
    let names = harness.control_plane.call_names();
    assert_eq!(&names[..2], &["create_mgmt_service", "create_cluster"]);
    assert_eq!(names.last(), Some(&"deploy_configs"));
    assert!(calls.contains(&ControlPlaneCall::CreateCluster {
        name: "sample".into(),
        version: "CDH5".into(),
    }));

    // Every host was set up and every connection released.
    assert_eq!(
        harness.connector.instances_that_ran("apt-get install -y"),
        HashSet::from(["mgr-1", "master-1", "worker-1", "worker-2"].map(String::from))
    );
    assert!(harness
        .connector
        .commands_for("worker-2")
        .contains(&"sed -i.back 's/^server_host=.*/server_host=mgr-1/' /etc/cloudera-scm-agent/config.ini".to_string()));
    assert_eq!(
        harness.connector.instances_that_ran("cloudera-scm-server"),
        HashSet::from(["mgr-1".to_string()])
    );
    assert_eq!(harness.connector.open_connections(), 0);
}

#[tokio::test]
async fn test_role_and_service_configuration() {
    let cluster = full_cluster().with_cluster_config("HDFS", "dfs_replication", "2");
    let harness = Harness::new(&cluster).await.unwrap();

    harness.deployer.configure_cluster(&cluster).await.unwrap();
    let calls = harness.control_plane.calls();

    let datanode = role_config(&calls, "DN_worker_1").unwrap();
    assert_eq!(
        datanode.get("dfs_data_dir_list").map(String::as_str),
        Some("/volumes/disk1/fs/dn,/volumes/disk2/fs/dn")
    );
    let namenode = role_config(&calls, "NN_master_1").unwrap();
    assert_eq!(namenode.get("dfs_name_dir_list").map(String::as_str), Some("/mnt/fs/nn"));

    let hive = service_config(&calls, "hive01").unwrap();
    assert_eq!(hive["hive_metastore_database_host"], "10.0.0.10");
    assert_eq!(hive["hive_metastore_database_port"], "7432");
    assert_eq!(hive["hive_metastore_database_password"], "fixture-password");

    let hue = service_config(&calls, "hue01").unwrap();
    assert_eq!(hue["hue_webhdfs"], "NN_master_1");
    assert_eq!(hue["oozie_service"], "oozie01");

    assert_eq!(service_config(&calls, "hdfs01").unwrap()["dfs_replication"], "2");
    assert!(service_config(&calls, "spark_on_yarn01").is_some());
    assert!(
        !calls.iter().any(|call| matches!(call, ControlPlaneCall::CreateRole { role_type: Role::Manager, .. })),
        "the manager never becomes a control-plane role"
    );
}

#[tokio::test]
async fn test_swift_bridge_merged_into_core_site() {
    let cluster = sample_cluster();
    let harness = Harness::new(&cluster).await.unwrap();

    harness.deployer.configure_cluster(&cluster).await.unwrap();

    for instance in cluster.instances() {
        let core_site = harness.connector.file(&instance.name, CORE_SITE_PATH).unwrap();
        assert!(core_site.starts_with("fs.defaultFS=hdfs://master-1.herd.test:8020\n"));
        assert!(core_site.contains("fs.swift.blocksize=32768\n"));
        assert!(core_site.contains("fs.swift.impl=org.apache.hadoop.fs.swift.snative.SwiftNativeFileSystem"));
    }
    assert_eq!(
        harness.connector.instances_that_ran("hadoop-openstack.jar").len(),
        4
    );
}

#[tokio::test]
async fn test_swift_disabled_by_general_setting() {
    let cluster = sample_cluster().with_cluster_config("general", "Enable Swift", "false");
    let harness = Harness::new(&cluster).await.unwrap();

    harness.deployer.configure_cluster(&cluster).await.unwrap();

    assert!(!harness.connector.ran("hadoop-openstack.jar"));
    assert_eq!(
        harness.connector.file("worker-1", CORE_SITE_PATH).as_deref(),
        Some(CORE_SITE)
    );
}

#[tokio::test]
async fn test_swift_requires_site_codec() {
    let cluster = sample_cluster();
    let harness = Harness::new(&cluster).await.unwrap();
    let port = harness.listener.local_addr().unwrap().port();
    let deployer = DeployerBuilder::new(fast_config(port))
        .with_control_plane(Arc::new(harness.control_plane.clone()))
        .with_connector(Arc::new(harness.connector.clone()))
        .build()
        .unwrap();

    let err = deployer.configure_cluster(&cluster).await.unwrap_err();
    assert!(matches!(err, ProvisionError::MissingCollaborator("site codec")));
    assert_eq!(harness.connector.connections_opened(), 0);
    assert!(harness.control_plane.calls().is_empty());
}

#[tokio::test]
async fn test_site_codec_optional_when_swift_disabled() {
    let cluster = sample_cluster().with_cluster_config("general", "Enable Swift", "false");
    let harness = Harness::new(&cluster).await.unwrap();
    let port = harness.listener.local_addr().unwrap().port();
    let deployer = DeployerBuilder::new(fast_config(port))
        .with_control_plane(Arc::new(harness.control_plane.clone()))
        .with_connector(Arc::new(harness.connector.clone()))
        .build()
        .unwrap();

    deployer.configure_cluster(&cluster).await.unwrap();

    assert_eq!(harness.control_plane.call_names().last(), Some(&"deploy_configs"));
}

#[tokio::test]
async fn test_pre_installed_image_skips_packages() {
    let cluster = sample_cluster();
    let harness = Harness::new(&cluster).await.unwrap();
    harness.connector.put_file("mgr-1", AGENT_CONFIG_PATH, "[General]\n");

    harness.deployer.configure_cluster(&cluster).await.unwrap();

    assert!(!harness.connector.ran("apt-get install"));
    assert!(!harness.connector.ran("sources.list.d"));
    assert_eq!(harness.connector.instances_that_ran("cloudera-scm-agent start").len(), 4);
}

#[tokio::test]
async fn test_package_failure_reported_after_all_hosts() {
    let cluster = sample_cluster();
    let harness = Harness::new(&cluster).await.unwrap();
    harness.connector.fail_command("apt-get install");

    let err = harness.deployer.configure_cluster(&cluster).await.unwrap_err();

    match err {
        ProvisionError::RemoteOperation { task, failed, total, .. } => {
            assert_eq!(task, "install_packages");
            assert_eq!(failed, 4);
            assert_eq!(total, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.connector.instances_that_ran("apt-get install").len(), 4);
    assert!(!harness.connector.ran("cloudera-scm-agent start"));
    assert!(harness.control_plane.call_names().is_empty());
    assert_eq!(harness.connector.open_connections(), 0);
}

#[tokio::test]
async fn test_agent_barrier_deadline() {
    let cluster = sample_cluster();
    let control_plane = MockControlPlane::new();
    control_plane.register_hosts(["mgr-1.herd.test", "master-1.herd.test", "worker-1.herd.test"]);
    let harness = Harness::with(&cluster, control_plane, |config| config).await.unwrap();

    let err = harness.deployer.configure_cluster(&cluster).await.unwrap_err();

    match &err {
        ProvisionError::DeadlineExceeded { barrier, cluster, node, .. } => {
            assert_eq!(barrier, "agent registration");
            assert_eq!(cluster, "sample");
            assert_eq!(node, "worker-2.herd.test");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.control_plane.count("get_all_hosts") > 1);
    assert!(harness.control_plane.call_names().is_empty());
}

#[tokio::test]
async fn test_agent_deadline_names_hosts_missing_at_last_check() {
    let cluster = sample_cluster();
    let control_plane = MockControlPlane::new();
    control_plane.register_hosts(["mgr-1.herd.test", "master-1.herd.test"]);
    let harness = Harness::with(&cluster, control_plane, |config| {
        config.with_agent_barrier(Duration::from_millis(400), Duration::from_millis(10))
    })
    .await
    .unwrap();

    let late = harness.control_plane.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        late.register_hosts(["worker-1.herd.test"]);
    });

    let err = harness.deployer.configure_cluster(&cluster).await.unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::DeadlineExceeded { ref node, .. } if node == "worker-2.herd.test"
    ));
}

#[tokio::test]
async fn test_agents_registering_late() {
    let cluster = sample_cluster();
    let control_plane = MockControlPlane::registered(&cluster);
    control_plane.hide_hosts_for(3);
    let harness = Harness::with(&cluster, control_plane, |config| config).await.unwrap();

    harness.deployer.configure_cluster(&cluster).await.unwrap();

    assert_eq!(harness.control_plane.count("get_all_hosts"), 4);
}

#[tokio::test]
async fn test_unreachable_manager_deadline() {
    let cluster = sample_cluster();
    let harness = Harness::new(&cluster).await.unwrap();
    drop(harness.listener);

    let err = harness.deployer.configure_cluster(&cluster).await.unwrap_err();

    match &err {
        ProvisionError::DeadlineExceeded { barrier, node, .. } => {
            assert_eq!(barrier, "control plane reachability");
            assert_eq!(node, MANAGER_IP);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.control_plane.count("get_all_hosts"), 0);
}

#[tokio::test]
async fn test_invalid_topology_rejected_before_any_work() {
    let cluster = Cluster::new("headless").with_node_group(worker_group(2));
    let harness = Harness::new(&cluster).await.unwrap();

    let err = harness.deployer.configure_cluster(&cluster).await.unwrap_err();

    assert!(matches!(err, ProvisionError::InvalidTopology(_)));
    assert_eq!(harness.connector.connections_opened(), 0);
}

#[tokio::test]
async fn test_cluster_without_namenode_rejected_before_any_work() {
    let cluster = Cluster::new("no-namenode")
        .with_node_group(manager_group())
        .with_node_group(worker_group(1));
    let harness = Harness::new(&cluster).await.unwrap();

    let err = harness.deployer.configure_cluster(&cluster).await.unwrap_err();

    assert!(matches!(err, ProvisionError::InvalidTopology(ref reason) if reason.contains("NAMENODE")));
    assert_eq!(harness.connector.connections_opened(), 0);
    assert!(harness.control_plane.calls().is_empty());
}

#[tokio::test]
async fn test_manager_reachability_retries_refused_connections() {
    let cluster = sample_cluster();
    let harness = Harness::with(&cluster, MockControlPlane::registered(&cluster), |config| {
        config.with_manager_barrier(Duration::from_secs(5), Duration::from_millis(10))
    })
    .await
    .unwrap();
    let address = harness.listener.local_addr().unwrap();
    let Harness {
        deployer,
        listener,
        ..
    } = harness;
    drop(listener);

    // The API port only opens after the first attempts were refused.
    let late_listener = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let listener = TcpListener::bind(address).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(listener);
    });
    let mut events = deployer.subscribe();

    deployer.configure_cluster(&cluster).await.unwrap();
    late_listener.abort();

    let mut reachability_attempts = None;
    while let Ok(event) = events.try_recv() {
        if let DeployEventPayload::BarrierSatisfied { barrier, attempts } = event.payload {
            if barrier == "control plane reachability" {
                reachability_attempts = Some(attempts);
            }
        }
    }
    let attempts = reachability_attempts.unwrap();
    assert!(attempts > 1, "barrier cleared on attempt {attempts}");
}

#[tokio::test]
async fn test_phase_events_in_order() {
    let cluster = sample_cluster();
    let harness = Harness::new(&cluster).await.unwrap();
    let mut events = harness.deployer.subscribe();

    harness.deployer.configure_cluster(&cluster).await.unwrap();

    let mut completed = Vec::new();
    let mut barriers = Vec::new();
    let mut deployment_ids = HashSet::new();
    while let Ok(event) = events.try_recv() {
        deployment_ids.insert(event.meta.deployment_id);
        match event.payload {
            DeployEventPayload::PhaseCompleted { phase, .. } => completed.push(phase),
            DeployEventPayload::BarrierSatisfied { barrier, .. } => barriers.push(barrier),
            _ => {}
        }
    }

    assert_eq!(
        completed,
        vec![
            Phase::DetectPreInstalled,
            Phase::ConfigureOs,
            Phase::InstallPackages,
            Phase::StartAgents,
            Phase::StartManager,
            Phase::AwaitAgents,
            Phase::CreateMgmtService,
            Phase::CreateServices,
            Phase::ConfigureServices,
            Phase::AssignRoles,
            Phase::DeployConfigs,
            Phase::ConfigureSwift,
        ]
    );
    assert_eq!(barriers, vec!["control plane reachability", "agent registration"]);
    assert_eq!(deployment_ids.len(), 1);
}

#[tokio::test]
async fn test_failed_phase_is_published() {
    let cluster = sample_cluster();
    let harness = Harness::new(&cluster).await.unwrap();
    harness.control_plane.fail_on("create_service");
    let mut events = harness.deployer.subscribe();

    let err = harness.deployer.configure_cluster(&cluster).await.unwrap_err();
    assert!(matches!(err, ProvisionError::ControlPlane { ref call, .. } if call == "create_service"));

    let mut failed = None;
    while let Ok(event) = events.try_recv() {
        if let DeployEventPayload::PhaseFailed { phase, error_kind, .. } = event.payload {
            failed = Some((phase, error_kind));
        }
    }
    assert_eq!(failed, Some((Phase::CreateServices, "control_plane".to_string())));
}
