use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::runtime::Builder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use custom_dv::config::{LinkConfig, SimulationConfig};
use custom_dv::report::CostMatrix;
use custom_dv::{LinkChangePolicy, RouterNetwork, Simulation, TableSnapshot};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Runtime {
    /// Single-threaded, deterministic delivery queue
    Sim,
    /// One tokio task per node
    Actors,
}

#[derive(Parser)]
#[command(name = "custom_dv", about = "Distance-vector routing simulator")]
struct Cli {
    /// JSON topology file; the built-in four node network when omitted
    #[arg(long)]
    config: Option<String>,

    #[arg(long, value_enum, default_value_t = Runtime::Sim)]
    runtime: Runtime,

    /// Extra link change a:b:cost, applied after convergence (repeatable)
    #[arg(long = "link-change", value_parser = LinkConfig::parse)]
    link_changes: Vec<LinkConfig>,

    /// React to link changes instead of ignoring them
    #[arg(long)]
    reconverge: bool,

    #[arg(long)]
    max_deliveries: Option<usize>,

    /// Seconds to wait for the actor runtime to go quiet
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Print final tables as JSON
    #[arg(long)]
    json: bool,

    /// Fail unless every node matches a centralized shortest-path computation
    #[arg(long)]
    verify: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    dump_config: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path).with_context(|| format!("loading {}", path))?,
        None => SimulationConfig::default(),
    };
    config.link_changes.extend(cli.link_changes.iter().cloned());
    if cli.reconverge {
        config.link_change_policy = LinkChangePolicy::Reconverge;
    }
    if let Some(max) = cli.max_deliveries {
        config.max_deliveries = max;
    }

    if let Some(path) = &cli.dump_config {
        config.save(path)?;
        info!("Configuration written to {}", path);
        return Ok(());
    }

    info!(
        "Starting {} node network ({:?} runtime, link changes: {:?})",
        config.node_count, cli.runtime, config.link_change_policy
    );

    let snapshots = match cli.runtime {
        Runtime::Sim => run_simulation(&config, cli.verify)?,
        Runtime::Actors => {
            let rt = Builder::new_multi_thread().enable_all().build()?;
            rt.block_on(run_actors(&config, Duration::from_secs(cli.timeout), cli.verify))?
        }
    };

    print_results(&snapshots, cli.json)
}

fn run_simulation(config: &SimulationConfig, verify: bool) -> Result<Vec<TableSnapshot>> {
    let topology = config.to_topology()?;
    let mut sim = Simulation::new(topology, config.link_change_policy);

    sim.start();
    let report = sim.run_until_quiescent(config.max_deliveries)?;
    info!("Initial convergence: {:?}", report);
    if verify {
        sim.verify()?;
    }

    for change in &config.link_changes {
        sim.change_link(change.a, change.b, change.cost, change.bidirectional)?;
        match sim.run_until_quiescent(config.max_deliveries) {
            Ok(report) => info!("After link change {}-{}: {:?}", change.a, change.b, report),
            Err(e) => {
                error!("Link change {}-{} did not settle: {}", change.a, change.b, e);
                return Err(e.into());
            }
        }
        if verify {
            sim.verify()?;
        }
    }

    Ok(sim.snapshots())
}

async fn run_actors(config: &SimulationConfig, timeout: Duration, verify: bool) -> Result<Vec<TableSnapshot>> {
    let topology = config.to_topology()?;
    let mut network = RouterNetwork::spawn(topology, config.link_change_policy);

    network.wait_for_convergence(timeout).await?;
    if verify {
        network.verify().await?;
    }

    for change in &config.link_changes {
        network.change_link(change.a, change.b, change.cost, change.bidirectional)?;
        network.wait_for_convergence(timeout).await?;
        if verify {
            network.verify().await?;
        }
    }

    let snapshots = network.snapshots().await?;
    network.shutdown().await?;
    Ok(snapshots)
}

fn print_results(snapshots: &[TableSnapshot], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshots)?);
        return Ok(());
    }

    for snapshot in snapshots {
        println!("{}", snapshot);
    }
    let best: Vec<_> = snapshots.iter().map(|s| s.best_costs().to_vec()).collect();
    println!("Best costs:\n{}", CostMatrix(&best));
    Ok(())
}
