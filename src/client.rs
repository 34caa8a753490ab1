//! Transform client over an eventually-consistent publish channel
//!
//! Publishes do not land in the graph immediately: they travel through a
//! channel to a background ingest thread that applies them after the
//! configured propagation delay, the way an unacknowledged broadcast
//! behaves. Lookups poll the shared graph until their timeout.

use flume::{Receiver, Sender};
use nalgebra::Isometry3;
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::ResolveError;
use crate::graph::{EdgeSample, GraphBuffer, LookupTime, SampleMode, TransformClient};

struct PublishJob {
    parent: String,
    child: String,
    sample: EdgeSample,
    apply_at: Instant,
}

/// Live [`TransformClient`] backed by a shared [`GraphBuffer`].
///
/// Safe for concurrent readers and publishers; the ingest thread is the
/// only writer. Dropping the client closes the channel and joins the
/// thread.
pub struct ChannelClient {
    graph: Arc<RwLock<GraphBuffer>>,
    tx: Option<Sender<PublishJob>>,
    ingest: Option<JoinHandle<()>>,
    propagation_delay: Duration,
    poll_interval: Duration,
    mode: SampleMode,
}

impl ChannelClient {
    /// Start a client over `seed`, applying publishes after
    /// `propagation_delay`.
    pub fn new(seed: GraphBuffer, propagation_delay: Duration) -> Self {
        let graph = Arc::new(RwLock::new(seed));
        let (tx, rx): (Sender<PublishJob>, Receiver<PublishJob>) = flume::unbounded();
        let ingest_graph = Arc::clone(&graph);
        let ingest = std::thread::spawn(move || ingest_worker(rx, ingest_graph));
        Self {
            graph,
            tx: Some(tx),
            ingest: Some(ingest),
            propagation_delay,
            poll_interval: Duration::from_millis(10),
            mode: SampleMode::Nearest,
        }
    }

    pub fn with_sample_mode(mut self, mode: SampleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Handle to the underlying graph, for hosts that seed edges at runtime.
    pub fn shared_graph(&self) -> Arc<RwLock<GraphBuffer>> {
        Arc::clone(&self.graph)
    }
}

fn ingest_worker(rx: Receiver<PublishJob>, graph: Arc<RwLock<GraphBuffer>>) {
    while let Ok(job) = rx.recv() {
        let now = Instant::now();
        if job.apply_at > now {
            std::thread::sleep(job.apply_at - now);
        }
        graph
            .write()
            .unwrap()
            .insert_static(&job.parent, &job.child, job.sample);
    }
}

impl TransformClient for ChannelClient {
    fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        time: LookupTime,
        timeout: Duration,
    ) -> Result<Isometry3<f64>, ResolveError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(iso) = self.graph.read().unwrap().resolve(target, source, time, self.mode) {
                return Ok(iso);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ResolveError::LookupTimeout {
                    target: target.to_string(),
                    source: source.to_string(),
                    timeout,
                });
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn publish_static_transform(&self, parent: &str, child: &str, transform: &Isometry3<f64>) {
        let job = PublishJob {
            parent: parent.to_string(),
            child: child.to_string(),
            sample: EdgeSample::from_isometry(0.0, transform),
            apply_at: Instant::now() + self.propagation_delay,
        };
        if let Some(tx) = &self.tx {
            let _ = tx.send(job);
        }
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        // Close the channel so the ingest thread drains and exits
        self.tx.take();
        if let Some(handle) = self.ingest.take() {
            let _ = handle.join();
        }
    }
}
