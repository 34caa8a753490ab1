//! Named-frame transform graph: edge storage, path finding, sampling
//!
//! `GraphBuffer` is the in-memory frame tree the bundled client reads and
//! writes. The external-service contract the resolver depends on is the
//! [`TransformClient`] trait; `GraphBuffer` itself is synchronous and
//! unaware of propagation delay.

use anyhow::{Result, anyhow};
use nalgebra::{Isometry3, Translation3};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::error::ResolveError;
use crate::rotation::unit_quaternion;

/// One time-stamped rigid transform on an edge, child expressed in parent.
#[derive(Clone, Copy, Debug)]
pub struct EdgeSample {
    /// Sample time in seconds (0.0 for static edges)
    pub t: f64,
    pub translation: [f64; 3],
    /// Rotation quaternion `[x, y, z, w]`
    pub rotation: [f64; 4],
}

impl EdgeSample {
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let trans = Translation3::new(self.translation[0], self.translation[1], self.translation[2]);
        Isometry3::from_parts(trans, unit_quaternion(self.rotation))
    }

    pub fn from_isometry(t: f64, iso: &Isometry3<f64>) -> Self {
        let trans = iso.translation.vector;
        let quat = iso.rotation.quaternion();
        Self {
            t,
            translation: [trans.x, trans.y, trans.z],
            rotation: [quat.i, quat.j, quat.k, quat.w],
        }
    }
}

/// How dynamic edges are sampled at a requested time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleMode {
    Nearest,
    Interpolate,
    Exact,
}

pub fn parse_sample_mode(s: &str) -> Result<SampleMode> {
    match s {
        "nearest" => Ok(SampleMode::Nearest),
        "interpolate" => Ok(SampleMode::Interpolate),
        "exact" => Ok(SampleMode::Exact),
        _ => Err(anyhow!("Invalid sample-mode: {}", s)),
    }
}

/// Time argument of a lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LookupTime {
    /// Most recent available sample on every dynamic edge
    Latest,
    /// Seconds on the graph's clock
    At(f64),
}

/// Contract of the externally-maintained transform graph service.
///
/// `lookup_transform(target, source, ..)` returns `T_target←source`: the
/// source frame expressed in target coordinates, so its translation is the
/// source origin seen from the target frame. `publish_static_transform`
/// registers (or re-registers) an edge; it is unacknowledged and subject to
/// asynchronous propagation delay, which is why the resolver retries.
pub trait TransformClient {
    fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        time: LookupTime,
        timeout: Duration,
    ) -> Result<Isometry3<f64>, ResolveError>;

    fn publish_static_transform(&self, parent: &str, child: &str, transform: &Isometry3<f64>);
}

/// In-memory tree of named coordinate frames.
#[derive(Clone, Debug, Default)]
pub struct GraphBuffer {
    // key: (parent, child)
    static_edges: BTreeMap<(String, String), EdgeSample>,
    dynamic: BTreeMap<(String, String), Vec<EdgeSample>>, // sorted by t
    // parent -> children, for cycle detection on static inserts
    static_children: HashMap<String, HashSet<String>>,
}

impl GraphBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a static edge parent → child. Re-registering overwrites the
    /// previous sample. An edge that would close a cycle in the static graph
    /// is skipped with a warning; returns whether the edge was stored.
    pub fn insert_static(&mut self, parent: &str, child: &str, sample: EdgeSample) -> bool {
        if self.would_create_cycle(parent, child) {
            tracing::warn!("static edge {parent} -> {child} would create a cycle, skipping");
            return false;
        }
        self.static_edges.insert((parent.to_string(), child.to_string()), sample);
        self.static_children
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
        true
    }

    /// Append a time-stamped sample to a dynamic edge.
    pub fn insert_dynamic(&mut self, parent: &str, child: &str, sample: EdgeSample) {
        let samples = self
            .dynamic
            .entry((parent.to_string(), child.to_string()))
            .or_default();
        samples.push(sample);
        // Graph files are usually time-ordered already
        if samples.len() > 1 && samples[samples.len() - 2].t > sample.t {
            samples.sort_unstable_by(|a, b| a.t.total_cmp(&b.t));
        }
    }

    fn would_create_cycle(&self, parent: &str, child: &str) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![child.to_string()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            if node == parent {
                return true;
            }
            if let Some(children) = self.static_children.get(&node) {
                stack.extend(children.iter().cloned());
            }
        }
        false
    }

    /// Resolve `T_target←source` at the requested time, composing edges along
    /// the connecting path. `None` when the frames are not connected or a
    /// dynamic edge has no usable sample.
    pub fn resolve(
        &self,
        target: &str,
        source: &str,
        at: LookupTime,
        mode: SampleMode,
    ) -> Option<Isometry3<f64>> {
        if target == source {
            return Some(Isometry3::identity());
        }
        let hops = self.find_path(source, target)?;
        let mut iso = Isometry3::identity();
        for (from, to) in &hops {
            // Each hop contributes T_to←from; walking source → target left-composes
            let step = self.hop_transform(to, from, at, mode)?;
            iso = step * iso;
        }
        Some(iso)
    }

    /// BFS over both edge directions; hops returned in source → target order.
    fn find_path(&self, source: &str, target: &str) -> Option<Vec<(String, String)>> {
        let mut prev: HashMap<String, String> = HashMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(source.to_string());
        visited.insert(source.to_string());
        while let Some(current) = queue.pop_front() {
            if current == target {
                let mut hops = Vec::new();
                let mut node = current;
                while let Some(p) = prev.get(&node) {
                    hops.push((p.clone(), node.clone()));
                    node = p.clone();
                }
                hops.reverse();
                return Some(hops);
            }
            for next in self.neighbors(&current) {
                if visited.insert(next.clone()) {
                    prev.insert(next.clone(), current.clone());
                    queue.push_back(next);
                }
            }
        }
        None
    }

    fn neighbors(&self, node: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (parent, child) in self.static_edges.keys().chain(self.dynamic.keys()) {
            if parent == node {
                out.push(child.clone());
            } else if child == node {
                out.push(parent.clone());
            }
        }
        out
    }

    /// `T_to←from` for one hop, inverting when the stored edge points the
    /// other way. Static edges shadow dynamic ones on the same pair.
    fn hop_transform(
        &self,
        to: &str,
        from: &str,
        at: LookupTime,
        mode: SampleMode,
    ) -> Option<Isometry3<f64>> {
        let fwd = (to.to_string(), from.to_string());
        let rev = (from.to_string(), to.to_string());
        if let Some(sample) = self.static_edges.get(&fwd) {
            return Some(sample.to_isometry());
        }
        if let Some(sample) = self.static_edges.get(&rev) {
            return Some(sample.to_isometry().inverse());
        }
        if let Some(samples) = self.dynamic.get(&fwd) {
            return sample_at(samples, at, mode);
        }
        if let Some(samples) = self.dynamic.get(&rev) {
            return sample_at(samples, at, mode).map(|iso| iso.inverse());
        }
        None
    }

    /// Every frame name appearing on any edge.
    pub fn frames(&self) -> Vec<String> {
        let mut set: HashSet<&str> = HashSet::new();
        for (parent, child) in self.static_edges.keys().chain(self.dynamic.keys()) {
            set.insert(parent.as_str());
            set.insert(child.as_str());
        }
        let mut frames: Vec<String> = set.into_iter().map(str::to_string).collect();
        frames.sort();
        frames
    }

    pub fn static_edges(&self) -> impl Iterator<Item = (&(String, String), &EdgeSample)> {
        self.static_edges.iter()
    }

    pub fn dynamic_edges(&self) -> impl Iterator<Item = (&(String, String), &[EdgeSample])> {
        self.dynamic.iter().map(|(key, samples)| (key, samples.as_slice()))
    }
}

fn sample_at(samples: &[EdgeSample], at: LookupTime, mode: SampleMode) -> Option<Isometry3<f64>> {
    let t = match at {
        LookupTime::Latest => return samples.last().map(EdgeSample::to_isometry),
        LookupTime::At(t) => t,
    };
    match mode {
        SampleMode::Exact => samples
            .iter()
            .find(|s| (s.t - t).abs() < 1e-9)
            .map(EdgeSample::to_isometry),
        SampleMode::Nearest => samples
            .iter()
            .min_by(|a, b| (a.t - t).abs().total_cmp(&(b.t - t).abs()))
            .map(EdgeSample::to_isometry),
        SampleMode::Interpolate => {
            let before = samples.iter().rev().find(|s| s.t <= t);
            let after = samples.iter().find(|s| s.t >= t);
            match (before, after) {
                (Some(b), Some(a)) if (a.t - b.t).abs() > 1e-9 => {
                    let alpha = (t - b.t) / (a.t - b.t);
                    let trans = [
                        b.translation[0] + alpha * (a.translation[0] - b.translation[0]),
                        b.translation[1] + alpha * (a.translation[1] - b.translation[1]),
                        b.translation[2] + alpha * (a.translation[2] - b.translation[2]),
                    ];
                    let rot = unit_quaternion(b.rotation).slerp(&unit_quaternion(a.rotation), alpha);
                    let quat = rot.quaternion();
                    let sample = EdgeSample {
                        t,
                        translation: trans,
                        rotation: [quat.i, quat.j, quat.k, quat.w],
                    };
                    Some(sample.to_isometry())
                }
                (Some(b), _) => Some(b.to_isometry()),
                (_, Some(a)) => Some(a.to_isometry()),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn static_sample(translation: [f64; 3], rotation: [f64; 4]) -> EdgeSample {
        EdgeSample { t: 0.0, translation, rotation }
    }

    const IDENT: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

    #[test]
    fn chain_composes_source_into_target() {
        let mut graph = GraphBuffer::new();
        graph.insert_static("world", "bin", static_sample([0.0, 0.0, 1.0], IDENT));
        graph.insert_static("bin", "part", static_sample([1.0, 2.0, 0.0], IDENT));
        let iso = graph
            .resolve("world", "part", LookupTime::Latest, SampleMode::Nearest)
            .unwrap();
        let trans = iso.translation.vector;
        assert!((trans.x - 1.0).abs() < 1e-9);
        assert!((trans.y - 2.0).abs() < 1e-9);
        assert!((trans.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reverse_lookup_inverts() {
        let mut graph = GraphBuffer::new();
        graph.insert_static("world", "bin", static_sample([0.0, 0.0, 1.0], IDENT));
        let iso = graph
            .resolve("bin", "world", LookupTime::Latest, SampleMode::Nearest)
            .unwrap();
        assert!((iso.translation.vector.z + 1.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_applies_to_downstream_translation() {
        let mut graph = GraphBuffer::new();
        let yaw_90 = crate::rotation::rpy_to_quat(0.0, 0.0, FRAC_PI_2);
        graph.insert_static("world", "turntable", static_sample([0.0, 0.0, 0.0], yaw_90));
        graph.insert_static("turntable", "slot", static_sample([1.0, 0.0, 0.0], IDENT));
        let iso = graph
            .resolve("world", "slot", LookupTime::Latest, SampleMode::Nearest)
            .unwrap();
        let trans = iso.translation.vector;
        assert!(trans.x.abs() < 1e-9);
        assert!((trans.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_frame_is_identity() {
        let graph = GraphBuffer::new();
        let iso = graph
            .resolve("world", "world", LookupTime::Latest, SampleMode::Nearest)
            .unwrap();
        assert_eq!(iso, Isometry3::identity());
    }

    #[test]
    fn disconnected_frames_do_not_resolve() {
        let mut graph = GraphBuffer::new();
        graph.insert_static("world", "bin", static_sample([1.0, 0.0, 0.0], IDENT));
        graph.insert_static("agv", "tray", static_sample([0.0, 1.0, 0.0], IDENT));
        assert!(
            graph
                .resolve("world", "tray", LookupTime::Latest, SampleMode::Nearest)
                .is_none()
        );
    }

    #[test]
    fn cycle_edges_are_skipped() {
        let mut graph = GraphBuffer::new();
        assert!(graph.insert_static("a", "b", static_sample([1.0, 0.0, 0.0], IDENT)));
        assert!(graph.insert_static("b", "c", static_sample([1.0, 0.0, 0.0], IDENT)));
        assert!(!graph.insert_static("c", "a", static_sample([1.0, 0.0, 0.0], IDENT)));
    }

    #[test]
    fn republish_same_edge_overwrites() {
        let mut graph = GraphBuffer::new();
        assert!(graph.insert_static("world", "target", static_sample([1.0, 0.0, 0.0], IDENT)));
        assert!(graph.insert_static("world", "target", static_sample([2.0, 0.0, 0.0], IDENT)));
        let iso = graph
            .resolve("world", "target", LookupTime::Latest, SampleMode::Nearest)
            .unwrap();
        assert!((iso.translation.vector.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn dynamic_sampling_modes() {
        let mut graph = GraphBuffer::new();
        graph.insert_dynamic(
            "world",
            "agv1",
            EdgeSample { t: 0.0, translation: [0.0, 0.0, 0.0], rotation: IDENT },
        );
        graph.insert_dynamic(
            "world",
            "agv1",
            EdgeSample { t: 10.0, translation: [10.0, 0.0, 0.0], rotation: IDENT },
        );

        let nearest = graph
            .resolve("world", "agv1", LookupTime::At(2.0), SampleMode::Nearest)
            .unwrap();
        assert!(nearest.translation.vector.x.abs() < 1e-9);

        let interp = graph
            .resolve("world", "agv1", LookupTime::At(2.5), SampleMode::Interpolate)
            .unwrap();
        assert!((interp.translation.vector.x - 2.5).abs() < 1e-9);

        let latest = graph
            .resolve("world", "agv1", LookupTime::Latest, SampleMode::Nearest)
            .unwrap();
        assert!((latest.translation.vector.x - 10.0).abs() < 1e-9);

        assert!(
            graph
                .resolve("world", "agv1", LookupTime::At(3.0), SampleMode::Exact)
                .is_none()
        );
    }

    #[test]
    fn frames_lists_every_node() {
        let mut graph = GraphBuffer::new();
        graph.insert_static("world", "bin", static_sample([0.0, 0.0, 0.0], IDENT));
        graph.insert_dynamic(
            "world",
            "agv1",
            EdgeSample { t: 0.0, translation: [0.0, 0.0, 0.0], rotation: IDENT },
        );
        assert_eq!(graph.frames(), vec!["agv1", "bin", "world"]);
    }
}
