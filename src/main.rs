use anyhow::{Context, bail};
use clap::Parser;
use partition_allocator::allocation::{Allocation, AllocationDiff, AllocationStats, PartitionUniverse};
use partition_allocator::config::AllocatorConfig;
use partition_allocator::solver::{Allocator, CancelFlag, RunStatus, TracingSink};
use partition_allocator::topology::{Level, TopologySpec, Zone, zone_name_from_path};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "partition-allocator", version, about = "Failure-domain aware partition placement")]
struct Cli {
    /// Topology file (`.top` or JSON)
    #[arg(short, long)]
    topology: PathBuf,

    /// Prior allocation to start from
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where every solved snapshot is written
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Share of every disk made available to placement
    #[arg(long, default_value_t = 0.8)]
    fill_level: f64,

    /// Initial overlap tolerance between two disks
    #[arg(long, default_value_t = 1)]
    overlap: usize,

    /// Initial disjoint level (rack, chassis, host or disk)
    #[arg(long, default_value = "rack")]
    disjoint_level: Level,

    /// Log statistics of the input allocation and exit
    #[arg(short, long)]
    print: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn output_path(cli: &Cli) -> PathBuf {
    if let Some(output) = &cli.output {
        return output.clone();
    }
    match &cli.input {
        Some(input) => {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "alloc.json".to_string());
            input.with_file_name(format!("new_{}", name))
        }
        None => PathBuf::from("new_alloc.json"),
    }
}

fn load_zone(path: &Path, config: &AllocatorConfig) -> anyhow::Result<Zone> {
    let spec = TopologySpec::load(path)?;
    let scaled = spec.scaled(config.fill_level, config.replication_factor);
    let zone = Zone::build(&zone_name_from_path(path), &scaled);
    tracing::info!(
        "Zone {}: {} hosts, {} disks, {} of {} locations usable",
        zone.name(),
        spec.host_count(),
        zone.count(Level::Disk),
        zone.capacity(),
        spec.total_capacity()
    );
    Ok(zone)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let config = AllocatorConfig {
        fill_level: cli.fill_level,
        initial_overlap_tolerance: cli.overlap,
        initial_disjoint_level: cli.disjoint_level,
        ..Default::default()
    };
    config.validate()?;

    let zone = load_zone(&cli.topology, &config)?;

    let initial = match &cli.input {
        Some(path) => {
            let (allocation, report) = Allocation::load(path, &zone, config.replication_factor)?;
            report.log();
            allocation
        }
        None => Allocation::empty(
            &zone,
            PartitionUniverse::new(zone.capacity(), config.replication_factor, None),
        ),
    };

    if cli.print {
        if initial.is_empty() {
            bail!("Nothing to print: the allocation is empty");
        }
        AllocationStats::compute(&zone, &initial, config.replication_factor).log();
        return Ok(());
    }

    let output = output_path(&cli);
    tracing::info!("Writing snapshots to {}", output.display());

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping after the current attempt");
            on_signal.cancel();
        }
    });

    let summary = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let allocator = Allocator::new(&zone, config, initial.clone())?;
        let summary = allocator.run(&cancel, &mut TracingSink, |allocation, _| {
            allocation.save(&output, &zone)
        })?;

        if let Some(best) = &summary.best {
            tracing::info!("Movement against the input allocation:");
            AllocationDiff::between(&zone, &initial, best).log();
        }
        Ok(summary)
    })
    .await
    .context("Allocation task panicked")??;

    match (summary.status, summary.best_objective) {
        (RunStatus::Complete, Some(objective)) => {
            tracing::info!("Complete allocation with objective {}", objective);
        }
        (status, Some(objective)) => {
            tracing::warn!("Stopped with {:?}; best snapshot has objective {}", status, objective);
        }
        (status, None) => {
            tracing::warn!("Stopped with {:?}; no allocation was found", status);
        }
    }

    Ok(())
}
