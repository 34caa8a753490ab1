use anyhow::{Result, anyhow};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

use pose2frame::cli::{Cli, Commands};
use pose2frame::commands::{self, BatchOptions, ResolveOptions};
use pose2frame::graph::parse_sample_mode;
use pose2frame::graph_io;
use pose2frame::pose::Pose;
use pose2frame::resolver::RetryPolicy;
use pose2frame::rotation::rpy_to_quat;

fn parse_triple(s: &str, what: &str) -> Result<[f64; 3]> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(anyhow!("{} must contain exactly 3 comma-separated values", what));
    }
    let mut out = [0.0; 3];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("failed to parse {} component: '{}'", what, part))?;
    }
    Ok(out)
}

fn parse_quad(s: &str, what: &str) -> Result<[f64; 4]> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err(anyhow!("{} must contain exactly 4 comma-separated values", what));
    }
    let mut out = [0.0; 4];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("failed to parse {} component: '{}'", what, part))?;
    }
    Ok(out)
}

fn build_pose(position: &str, rpy: Option<&str>, quat: Option<&str>) -> Result<Pose> {
    let position = parse_triple(position, "position")?;
    let orientation = match (quat, rpy) {
        (Some(q), _) => parse_quad(q, "quat")?,
        (None, Some(angles)) => {
            let [roll, pitch, yaw] = parse_triple(angles, "rpy")?;
            rpy_to_quat(roll, pitch, yaw)
        }
        (None, None) => [0.0, 0.0, 0.0, 1.0],
    };
    Ok(Pose::new(position, orientation))
}

fn build_policy(
    burst: usize,
    attempts: usize,
    timeout_ms: u64,
    backoff_ms: u64,
    deadline_ms: Option<u64>,
) -> RetryPolicy {
    RetryPolicy {
        publish_burst: burst,
        max_attempts: attempts,
        attempt_timeout: Duration::from_millis(timeout_ms),
        backoff: Duration::from_millis(backoff_ms),
        deadline: deadline_ms.map(Duration::from_millis),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { graph } => graph_io::inspect_graph(&graph),
        Commands::Resolve {
            graph,
            position,
            rpy,
            quat,
            from,
            agv,
            burst,
            attempts,
            timeout_ms,
            backoff_ms,
            deadline_ms,
            propagation_ms,
            sample_mode,
            json,
        } => {
            let options = ResolveOptions {
                graph_path: graph,
                pose: build_pose(&position, rpy.as_deref(), quat.as_deref())?,
                source_frame: from,
                agv,
                policy: build_policy(burst, attempts, timeout_ms, backoff_ms, deadline_ms),
                propagation: Duration::from_millis(propagation_ms),
                sample_mode: parse_sample_mode(&sample_mode)?,
                json,
            };
            commands::run_resolve(&options)
        }
        Commands::Locate {
            graph,
            frame,
            attempts,
            timeout_ms,
            backoff_ms,
            propagation_ms,
            sample_mode,
            json,
        } => commands::run_locate(
            &graph,
            &frame,
            build_policy(15, attempts, timeout_ms, backoff_ms, None),
            Duration::from_millis(propagation_ms),
            parse_sample_mode(&sample_mode)?,
            json,
        ),
        Commands::Batch {
            graph,
            detections,
            agv,
            jobs,
            dedupe_tolerance,
            out,
            progress,
            attempts,
            timeout_ms,
            backoff_ms,
            propagation_ms,
            sample_mode,
        } => {
            let options = BatchOptions {
                graph_path: graph,
                detections_path: detections,
                agv,
                jobs,
                dedupe_tolerance,
                out,
                policy: build_policy(15, attempts, timeout_ms, backoff_ms, None),
                propagation: Duration::from_millis(propagation_ms),
                sample_mode: parse_sample_mode(&sample_mode)?,
                show_progress: progress,
            };
            commands::run_batch(&options)
        }
        Commands::Rpy { x, y, z, w } => {
            commands::run_rpy(x, y, z, w);
            Ok(())
        }
        Commands::Quat { roll, pitch, yaw } => {
            commands::run_quat(roll, pitch, yaw);
            Ok(())
        }
        Commands::Aliases {} => {
            commands::print_aliases();
            Ok(())
        }
    }
}
