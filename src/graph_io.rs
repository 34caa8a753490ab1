//! Graph and detection files: JSON load plus the `inspect` table

use anyhow::{Context, Result};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::graph::{EdgeSample, GraphBuffer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    Static,
    Dynamic,
}

fn identity_rotation() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

/// One edge record of a graph file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub kind: EdgeKind,
    /// Sample time in seconds, dynamic edges only
    #[serde(default)]
    pub t: f64,
    pub translation: [f64; 3],
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
}

/// Top-level graph file: a flat edge list.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphFile {
    pub edges: Vec<EdgeRecord>,
}

/// Load a JSON graph file into a `GraphBuffer`.
pub fn load_graph(path: &str) -> Result<GraphBuffer> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to open graph file: {}", path))?;
    let file: GraphFile = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse graph file: {}", path))?;
    let mut graph = GraphBuffer::new();
    for edge in &file.edges {
        let sample = EdgeSample {
            t: edge.t,
            translation: edge.translation,
            rotation: edge.rotation,
        };
        match edge.kind {
            EdgeKind::Static => {
                graph.insert_static(&edge.parent, &edge.child, sample);
            }
            EdgeKind::Dynamic => graph.insert_dynamic(&edge.parent, &edge.child, sample),
        }
    }
    Ok(graph)
}

/// Load a JSON detection batch.
pub fn load_detections(path: &str) -> Result<Vec<Detection>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to open detections file: {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse detections file: {}", path))
}

/// Print the frames and edges of a graph file.
pub fn inspect_graph(path: &str) -> Result<()> {
    let graph = load_graph(path)?;
    let frames = graph.frames();
    let static_count = graph.static_edges().count();
    let dynamic_count = graph.dynamic_edges().count();

    println!("Graph: {}", path);
    println!(
        "Frames: {}, Static edges: {}, Dynamic edges: {}\n",
        frames.len(),
        static_count,
        dynamic_count
    );

    let mut table = Table::new();
    table.set_titles(row!["Parent", "Child", "Kind", "Samples", "First(s)", "Last(s)"]);
    for ((parent, child), _sample) in graph.static_edges() {
        table.add_row(row![parent, child, "static", 1, "-", "-"]);
    }
    for ((parent, child), samples) in graph.dynamic_edges() {
        let first = samples.first().map(|s| format!("{:.3}", s.t)).unwrap_or_default();
        let last = samples.last().map(|s| format!("{:.3}", s.t)).unwrap_or_default();
        table.add_row(row![parent, child, "dynamic", samples.len(), first, last]);
    }
    table.printstd();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LookupTime, SampleMode};
    use std::io::Write;

    const GRAPH_JSON: &str = r#"{
        "edges": [
            { "parent": "world", "child": "camera_1", "translation": [0.0, 0.0, 1.0] },
            { "parent": "world", "child": "agv1", "kind": "dynamic", "t": 0.0,
              "translation": [0.0, 0.0, 0.0], "rotation": [0.0, 0.0, 0.0, 1.0] },
            { "parent": "world", "child": "agv1", "kind": "dynamic", "t": 4.0,
              "translation": [4.0, 0.0, 0.0], "rotation": [0.0, 0.0, 0.0, 1.0] }
        ]
    }"#;

    fn write_fixture(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn graph_file_loads_and_resolves() {
        let path = write_fixture("pose2frame_graph_io_load.json", GRAPH_JSON);
        let graph = load_graph(&path).unwrap();
        let iso = graph
            .resolve("world", "camera_1", LookupTime::Latest, SampleMode::Nearest)
            .unwrap();
        assert!((iso.translation.vector.z - 1.0).abs() < 1e-9);
        let agv = graph
            .resolve("world", "agv1", LookupTime::At(2.0), SampleMode::Interpolate)
            .unwrap();
        assert!((agv.translation.vector.x - 2.0).abs() < 1e-9);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_rotation_defaults_to_identity() {
        let path = write_fixture("pose2frame_graph_io_default_rot.json", GRAPH_JSON);
        let graph = load_graph(&path).unwrap();
        let iso = graph
            .resolve("world", "camera_1", LookupTime::Latest, SampleMode::Nearest)
            .unwrap();
        assert_eq!(iso.rotation.quaternion().w, 1.0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_graph("/nonexistent/graph.json").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/graph.json"));
    }

    #[test]
    fn detection_batch_loads() {
        let path = write_fixture(
            "pose2frame_graph_io_detections.json",
            r#"[
                { "object": "gear_part", "frame_id": "camera_1",
                  "pose": { "position": [1.0, 2.0, 0.0], "orientation": [0.0, 0.0, 0.0, 1.0] } }
            ]"#,
        );
        let dets = load_detections(&path).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].object, "gear_part");
        assert_eq!(dets[0].frame_id, "camera_1");
        std::fs::remove_file(&path).unwrap();
    }
}
