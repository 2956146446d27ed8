use anyhow::Context;
use bridge::http::{bridge_bind_address, IngestBridge};
use clap::Parser;
use locatorcore::prelude::{DeviceId, Ticks};
use locatorcore::Position;
use log::warn;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod bridge;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Acoustic source locator driver")]
struct Args {
    /// Replay a synthetic scenario through the locator and report the fixes
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load geometry, clock offsets and scenario from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 16)]
    rounds: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Timestamp noise in ticks
    #[arg(long, default_value_t = 0)]
    jitter: Ticks,
    /// Device that never reports
    #[arg(long)]
    silent_device: Option<DeviceId>,
    /// Accept live detections over HTTP until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.rounds, args.seed, args.jitter, args.silent_device)
    };

    if args.offline {
        let runner = Runner::new(workflow_config.clone());
        let result = runner.run_scenario()?;

        println!(
            "Offline run -> rounds {}, fixes {}, pending {:?}",
            result.rounds.len(),
            result.fix_count(),
            result.pending
        );

        let mut report = String::new();
        for round in &result.rounds {
            let line = match round.position {
                Position::Fix(coordinate) => format!(
                    "seq={} x={:.3} y={:.3}\n",
                    round.sequence_number, coordinate.x, coordinate.y
                ),
                Position::NoResult(reason) => {
                    format!("seq={} no_result={:?}\n", round.sequence_number, reason)
                }
            };
            print!("{}", line);
            report.push_str(&line);
        }
        report.push_str(&format!("metrics={:?}\n", result.metrics));

        let report_path = PathBuf::from("tools/data/locator_runs.log");
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&report_path)
            .with_context(|| format!("opening {}", report_path.display()))?;
        file.write_all(report.as_bytes())?;
    }

    if args.serve {
        let bridge = Arc::new(IngestBridge::new(&workflow_config)?);
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for the ingest bridge")?;
        runtime.block_on(async {
            let shutdown = async {
                if let Err(err) = signal::ctrl_c().await {
                    warn!("awaiting Ctrl+C failed, stopping bridge: {}", err);
                }
            };
            let (address, server) = bridge.bind(bridge_bind_address(), shutdown)?;
            println!("Ingest bridge running on {} (Ctrl+C to stop)...", address);
            server.await;
            Ok::<(), anyhow::Error>(())
        })?;
        let metrics = bridge.snapshot().metrics;
        println!(
            "Bridge stopped -> rounds {}, fixes {}",
            metrics.rounds_released, metrics.fixes
        );
    }

    Ok(())
}
