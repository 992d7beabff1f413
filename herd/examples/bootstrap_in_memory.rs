//! Bootstrap, start, scale and decommission a cluster against in-memory collaborators.
//!
//! Uses herd-testkit's recording control plane and remote connector, so no
//! hosts or control-plane API are needed. Set `RUST_LOG=herd=debug` for
//! per-phase detail.

use herd::*;
use herd_testkit::{full_cluster, with_new_workers, Harness};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("herd=info")),
        )
        .init();

    println!("=== herd in-memory deployment ===\n");

    let (cluster, added) = with_new_workers(&full_cluster(), 2);
    let existing: Vec<Instance> = cluster
        .instances()
        .filter(|i| !added.contains(i))
        .cloned()
        .collect();
    let initial = {
        let mut initial = cluster.clone();
        for group in &mut initial.node_groups {
            group.instances.retain(|i| !added.contains(i));
        }
        initial
    };

    let harness = Harness::new(&cluster).await?;
    let mut events = harness.deployer.subscribe();

    println!("1. Planned services:");
    for service in harness.deployer.planner().plan(&initial) {
        println!("   {service} ({})", service.service_type());
    }

    println!("\n2. Configuring {} instances...", existing.len());
    harness.deployer.configure_cluster(&initial).await?;

    println!("\n3. Starting services...");
    harness.deployer.start_cluster(&initial).await?;

    println!("\n4. Adding {} workers...", added.len());
    harness.deployer.scale_cluster(&cluster, &added).await?;

    println!("\n5. Removing {}...", added[0].name);
    harness
        .deployer
        .decommission_cluster(&cluster, &added[..1])
        .await?;

    println!("\n=== Events ===");
    while let Ok(event) = events.try_recv() {
        match event.payload {
            DeployEventPayload::PhaseCompleted { phase, elapsed_ms } => {
                println!("   {phase:<22} {elapsed_ms}ms");
            }
            DeployEventPayload::ServiceStarted { service } => println!("   started {service}"),
            _ => {}
        }
    }

    println!("\n=== Summary ===");
    println!("Control-plane calls: {}", harness.control_plane.calls().len());
    println!("Remote commands:     {}", harness.connector.commands().len());
    println!("Open connections:    {}", harness.connector.open_connections());

    Ok(())
}
