//! App-level operations behind the CLI subcommands

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::time::Duration;

use crate::client::ChannelClient;
use crate::detection::{Detection, is_same_object, log_detection};
use crate::error::ResolveError;
use crate::graph::SampleMode;
use crate::graph_io::{load_detections, load_graph};
use crate::pose::Pose;
use crate::resolver::{FrameAliases, FrameResolver, RetryPolicy, WORLD_FRAME};
use crate::rotation::{format_pose, format_quaternion, quat_to_rpy, rpy_to_quat};

/// Options for a single pose resolution against a graph file
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Path to the graph JSON file
    pub graph_path: String,
    /// Pose to resolve
    pub pose: Pose,
    /// Frame the pose is expressed in
    pub source_frame: String,
    /// Resolve into this AGV's tray frame instead of world
    pub agv: Option<String>,
    /// Retry/timeout policy
    pub policy: RetryPolicy,
    /// Simulated propagation delay of the publish channel
    pub propagation: Duration,
    /// Dynamic edge sampling mode
    pub sample_mode: SampleMode,
    /// Emit the result as JSON instead of formatted text
    pub json: bool,
}

/// Resolve one pose and print it.
pub fn run_resolve(options: &ResolveOptions) -> Result<()> {
    let graph = load_graph(&options.graph_path)?;
    let client =
        ChannelClient::new(graph, options.propagation).with_sample_mode(options.sample_mode);
    let resolver = FrameResolver::new(client).with_policy(options.policy);

    let resolved = match &options.agv {
        Some(agv) => resolver.resolve_to_tray(&options.pose, agv)?,
        None => resolver.resolve_to_world(&options.pose, &options.source_frame)?,
    };
    print_resolved(&resolved, options.json)
}

/// Resolve an already-published frame into world and print it.
pub fn run_locate(
    graph_path: &str,
    frame: &str,
    policy: RetryPolicy,
    propagation: Duration,
    sample_mode: SampleMode,
    json: bool,
) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let client = ChannelClient::new(graph, propagation).with_sample_mode(sample_mode);
    let resolver = FrameResolver::new(client).with_policy(policy);
    let resolved = resolver.resolve_frame_to_world(frame)?;
    print_resolved(&resolved, json)
}

fn print_resolved(pose: &Pose, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(pose)?);
    } else {
        println!("{}", format_pose(pose));
    }
    Ok(())
}

/// Options for resolving a detection batch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Path to the graph JSON file
    pub graph_path: String,
    /// Path to the detection batch JSON file
    pub detections_path: String,
    /// Resolve into this AGV's tray frame instead of world
    pub agv: Option<String>,
    /// Worker threads (0 = rayon default)
    pub jobs: usize,
    /// Planar distance under which same-type detections collapse
    pub dedupe_tolerance: f64,
    /// Output path; stdout when unset
    pub out: Option<String>,
    /// Retry/timeout policy
    pub policy: RetryPolicy,
    /// Simulated propagation delay of the publish channel
    pub propagation: Duration,
    /// Dynamic edge sampling mode
    pub sample_mode: SampleMode,
    /// Show progress bar
    pub show_progress: bool,
}

/// Resolve every detection of a batch into the target frame, in parallel,
/// collapsing near-duplicate reports of the same part.
pub fn run_batch(options: &BatchOptions) -> Result<()> {
    let graph = load_graph(&options.graph_path)?;
    let detections = load_detections(&options.detections_path)?;
    let client =
        ChannelClient::new(graph, options.propagation).with_sample_mode(options.sample_mode);
    let resolver = FrameResolver::new(client).with_policy(options.policy);

    // Fail fast on a bad alias instead of failing every detection
    let target_frame = match &options.agv {
        Some(agv) => resolver.aliases().tray_frame(agv)?.to_string(),
        None => WORLD_FRAME.to_string(),
    };

    let pb = if options.show_progress {
        let pb = ProgressBar::new(detections.len() as u64);
        pb.set_style(ProgressStyle::with_template("{spinner} {pos}/{len} poses").unwrap());
        Some(pb)
    } else {
        None
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
        .context("failed to build worker pool")?;
    let agv = options.agv.as_deref();
    let outcomes: Vec<(usize, Result<Pose, ResolveError>)> = pool.install(|| {
        detections
            .par_iter()
            .enumerate()
            .map(|(index, det)| {
                let outcome = resolve_detection(&resolver, det, agv);
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                (index, outcome)
            })
            .collect()
    });
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let mut resolved: Vec<Detection> = Vec::new();
    let mut failed = 0usize;
    let mut duplicates = 0usize;
    let mut ordered = outcomes;
    ordered.sort_by_key(|(index, _)| *index);
    for (index, outcome) in ordered {
        match outcome {
            Ok(pose) => {
                let candidate = Detection {
                    object: detections[index].object.clone(),
                    frame_id: target_frame.clone(),
                    pose,
                };
                if resolved
                    .iter()
                    .any(|kept| is_same_object(kept, &candidate, options.dedupe_tolerance))
                {
                    duplicates += 1;
                    continue;
                }
                log_detection(&candidate);
                resolved.push(candidate);
            }
            Err(err) => {
                tracing::warn!(
                    object = %detections[index].object,
                    frame = %detections[index].frame_id,
                    "resolution failed: {err}"
                );
                failed += 1;
            }
        }
    }

    println!(
        "Batch: {} detections, {} resolved, {} failed, {} duplicates collapsed → frame: {}",
        detections.len(),
        resolved.len(),
        failed,
        duplicates,
        target_frame
    );

    let payload = serde_json::to_string_pretty(&resolved)?;
    match &options.out {
        Some(path) => std::fs::write(path, payload)
            .with_context(|| format!("failed to write batch output: {}", path))?,
        None => println!("{payload}"),
    }
    Ok(())
}

fn resolve_detection(
    resolver: &FrameResolver<ChannelClient>,
    det: &Detection,
    agv: Option<&str>,
) -> Result<Pose, ResolveError> {
    let world = if det.frame_id == WORLD_FRAME {
        det.pose
    } else {
        resolver.resolve_to_world(&det.pose, &det.frame_id)?
    };
    match agv {
        Some(id) => resolver.resolve_to_tray(&world, id),
        None => Ok(world),
    }
}

/// Print `(roll, pitch, yaw)` for a quaternion.
pub fn run_rpy(x: f64, y: f64, z: f64, w: f64) {
    let (roll, pitch, yaw) = quat_to_rpy([x, y, z, w]);
    println!("roll: {:.6} pitch: {:.6} yaw: {:.6}", roll, pitch, yaw);
}

/// Print the quaternion for `(roll, pitch, yaw)`.
pub fn run_quat(roll: f64, pitch: f64, yaw: f64) {
    println!("{}", format_quaternion(rpy_to_quat(roll, pitch, yaw)));
}

/// Print the known AGV → tray-frame aliases.
pub fn print_aliases() {
    println!("Known AGV tray-frame aliases:");
    println!("---------------------------------");
    for (id, frame) in FrameAliases::default().iter() {
        println!("{:<10} → {}", id, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            publish_burst: 15,
            max_attempts: 5,
            attempt_timeout: Duration::from_millis(200),
            backoff: Duration::from_millis(10),
            deadline: None,
        }
    }

    fn write_fixture(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    const GRAPH_JSON: &str = r#"{
        "edges": [
            { "parent": "world", "child": "camera_1", "translation": [0.0, 0.0, 1.0] },
            { "parent": "world", "child": "kit_tray_2", "translation": [2.0, 0.0, 0.0] }
        ]
    }"#;

    #[test]
    fn resolve_options_roundtrip_through_graph_file() {
        let graph_path = write_fixture("pose2frame_commands_resolve.json", GRAPH_JSON);
        let options = ResolveOptions {
            graph_path: graph_path.clone(),
            pose: Pose::new([1.0, 2.0, 0.0], [0.0, 0.0, 0.0, 1.0]),
            source_frame: "camera_1".to_string(),
            agv: None,
            policy: fast_policy(),
            propagation: Duration::from_millis(10),
            sample_mode: SampleMode::Nearest,
            json: true,
        };
        run_resolve(&options).unwrap();
        std::fs::remove_file(&graph_path).unwrap();
    }

    #[test]
    fn batch_resolves_dedupes_and_writes_output() {
        let graph_path = write_fixture("pose2frame_commands_batch_graph.json", GRAPH_JSON);
        let detections_path = write_fixture(
            "pose2frame_commands_batch_dets.json",
            r#"[
                { "object": "gear_part", "frame_id": "camera_1",
                  "pose": { "position": [1.0, 2.0, 0.0], "orientation": [0.0, 0.0, 0.0, 1.0] } },
                { "object": "gear_part", "frame_id": "camera_1",
                  "pose": { "position": [1.01, 2.0, 0.0], "orientation": [0.0, 0.0, 0.0, 1.0] } },
                { "object": "gear_part", "frame_id": "ghost_camera",
                  "pose": { "position": [0.0, 0.0, 0.0], "orientation": [0.0, 0.0, 0.0, 1.0] } }
            ]"#,
        );
        let out_path = std::env::temp_dir()
            .join("pose2frame_commands_batch_out.json")
            .to_string_lossy()
            .to_string();
        let mut policy = fast_policy();
        policy.max_attempts = 2;
        policy.attempt_timeout = Duration::from_millis(50);
        let options = BatchOptions {
            graph_path: graph_path.clone(),
            detections_path: detections_path.clone(),
            agv: None,
            jobs: 2,
            dedupe_tolerance: 0.05,
            out: Some(out_path.clone()),
            policy,
            propagation: Duration::from_millis(5),
            sample_mode: SampleMode::Nearest,
            show_progress: false,
        };
        run_batch(&options).unwrap();

        let written = std::fs::read_to_string(&out_path).unwrap();
        let resolved: Vec<Detection> = serde_json::from_str(&written).unwrap();
        // Two near-identical camera detections collapse to one; the ghost
        // camera detection fails and is dropped.
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].frame_id, "world");
        assert!((resolved[0].pose.position[2] - 1.0).abs() < 1e-9);

        for path in [&graph_path, &detections_path, &out_path] {
            std::fs::remove_file(path).unwrap();
        }
    }

    #[test]
    fn batch_rejects_unknown_agv_up_front() {
        let graph_path = write_fixture("pose2frame_commands_badagv_graph.json", GRAPH_JSON);
        let detections_path =
            write_fixture("pose2frame_commands_badagv_dets.json", "[]");
        let options = BatchOptions {
            graph_path: graph_path.clone(),
            detections_path: detections_path.clone(),
            agv: Some("agv9".to_string()),
            jobs: 1,
            dedupe_tolerance: 0.05,
            out: None,
            policy: fast_policy(),
            propagation: Duration::ZERO,
            sample_mode: SampleMode::Nearest,
            show_progress: false,
        };
        let err = run_batch(&options).unwrap_err();
        assert!(format!("{err:#}").contains("agv9"));
        std::fs::remove_file(&graph_path).unwrap();
        std::fs::remove_file(&detections_path).unwrap();
    }
}
