//! benchpin command-line tool

use anyhow::{Context, Result};
use benchpin_core::allocator::{allocate, RunRequest};
use benchpin_core::memory::{check_memory, memory_banks_per_run, MemorySource};
use benchpin_sysfs::{parse_int_list, SysfsConfig, SysfsMemory, SysfsTopology};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// benchpin - assign CPU cores and memory banks to parallel benchmark runs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CPU cores per run
    #[arg(short, long)]
    cores_per_run: usize,

    /// Number of runs executed in parallel
    #[arg(short, long, default_value_t = 1)]
    runs: usize,

    /// Use only one logical core per physical core
    #[arg(long)]
    no_hyperthreading: bool,

    /// Restrict allocation to these cores (e.g. "0-7,16-23")
    #[arg(long)]
    cores: Option<String>,

    /// Check that every run can get this many bytes of memory
    #[arg(long)]
    memory_per_run: Option<u64>,

    /// Mount point of sysfs
    #[arg(long, default_value = "/sys")]
    sys_root: String,

    /// Directory of the cpuset cgroup the runs are placed in
    #[arg(long)]
    cgroup_cpuset: Option<String>,

    /// Directory of the memory cgroup the runs are placed in
    #[arg(long)]
    cgroup_memory: Option<String>,

    /// Print the assignment as JSON
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("benchpin={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = SysfsConfig::default().with_sys_root(&args.sys_root);
    if let Some(path) = &args.cgroup_cpuset {
        config = config.with_cgroup_cpuset(path);
    }
    if let Some(path) = &args.cgroup_memory {
        config = config.with_cgroup_memory(path);
    }

    let subset = args
        .cores
        .as_deref()
        .map(parse_int_list)
        .transpose()
        .context("invalid --cores")?;

    let topology = SysfsTopology::new(config.clone())
        .snapshot(subset.as_deref())
        .context("could not read CPU information from kernel")?;

    let request = RunRequest::builder()
        .cores_per_run(args.cores_per_run)
        .run_count(args.runs)
        .use_hyperthreading(!args.no_hyperthreading)
        .build()?;
    let assignment = allocate(&request, &topology)?;
    info!("Assigned {} runs with {} cores each", assignment.len(), args.cores_per_run);

    let memory = SysfsMemory::new(config);
    let banks = if memory.has_numa_support() {
        memory_banks_per_run(&assignment, &topology, &memory.allowed_banks()?)
    } else {
        None
    };
    if let Some(per_run) = args.memory_per_run {
        check_memory(per_run, args.runs, banks.as_deref(), &memory)?;
        info!("Memory check passed for {per_run} bytes per run");
    }

    if args.json {
        let output = serde_json::json!({
            "runs": assignment,
            "memory_banks": banks,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{assignment}");
        if let Some(banks) = &banks {
            for (run, banks) in banks.iter().enumerate() {
                println!("run {run} memory banks: {banks:?}");
            }
        }
    }

    Ok(())
}
