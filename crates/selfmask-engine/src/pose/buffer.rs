use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use glam::DAffine3;
use parking_lot::{Condvar, Mutex};

use super::chain::{self, Edge};
use super::{LookupFailure, PoseLookup, PoseTime};
use crate::sensor::Stamp;

/// Samples kept per dynamic edge when no history length is given.
const DEFAULT_HISTORY: usize = 64;

#[derive(Debug)]
struct EdgeSamples {
    parent: String,
    is_static: bool,
    /// Ascending by stamp.
    samples: VecDeque<(Stamp, DAffine3)>,
}

impl EdgeSamples {
    fn latest(&self) -> Option<&(Stamp, DAffine3)> {
        self.samples.back()
    }

    /// The newest sample not after `at`, provided data has reached `at`.
    fn sample_at(&self, at: PoseTime) -> Option<DAffine3> {
        let at = match at {
            PoseTime::At(stamp) if !self.is_static => stamp,
            _ => return self.latest().map(|(_, tf)| *tf),
        };
        let (newest, _) = self.latest()?;
        if *newest < at {
            return None;
        }
        self.samples
            .iter()
            .rev()
            .find(|(stamp, _)| *stamp <= at)
            .or_else(|| self.samples.front())
            .map(|(_, tf)| *tf)
    }
}

#[derive(Debug, Default)]
struct Tree {
    edges: HashMap<String, EdgeSamples>,
    parents: HashSet<String>,
}

impl Tree {
    fn edge_above(&self, frame: &str, at: PoseTime) -> Result<Edge, LookupFailure> {
        if let Some(edge) = self.edges.get(frame) {
            return match edge.sample_at(at) {
                Some(tf) => Ok(Edge::Parent(edge.parent.clone(), tf)),
                None => Err(LookupFailure::NotYetAvailable {
                    frame: frame.to_string(),
                    requested: at,
                    latest: edge.latest().map(|(s, _)| *s).unwrap_or_default(),
                }),
            };
        }
        if self.parents.contains(frame) {
            return Ok(Edge::Root);
        }
        Err(LookupFailure::UnknownFrame(frame.to_string()))
    }
}

/// Thread-safe, time-indexed frame tree fed by an external producer.
///
/// A producer thread calls [`PoseBuffer::insert`] as transforms arrive; the
/// pipeline thread calls [`PoseLookup::lookup`], which waits (up to its
/// timeout) for data covering the requested time.
#[derive(Debug)]
pub struct PoseBuffer {
    tree: Mutex<Tree>,
    updated: Condvar,
    history: usize,
}

impl PoseBuffer {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Keeps at most `history` samples per dynamic edge.
    pub fn with_history(history: usize) -> Self {
        Self {
            tree: Mutex::new(Tree::default()),
            updated: Condvar::new(),
            history: history.max(1),
        }
    }

    /// Records `parent_from_child` at `stamp`.
    ///
    /// Out-of-order samples are inserted in place; the oldest sample is
    /// dropped once the history is full.
    pub fn insert(&self, parent: &str, child: &str, stamp: Stamp, parent_from_child: DAffine3) {
        {
            let mut tree = self.tree.lock();
            tree.parents.insert(parent.to_string());
            let edge = tree
                .edges
                .entry(child.to_string())
                .or_insert_with(|| EdgeSamples {
                    parent: parent.to_string(),
                    is_static: false,
                    samples: VecDeque::with_capacity(self.history),
                });

            if edge.parent != parent {
                log::debug!("frame \"{child}\" reparented from \"{}\" to \"{parent}\"", edge.parent);
                edge.parent = parent.to_string();
                edge.samples.clear();
            }
            edge.is_static = false;

            let idx = edge.samples.partition_point(|(s, _)| *s <= stamp);
            edge.samples.insert(idx, (stamp, parent_from_child));
            while edge.samples.len() > self.history {
                edge.samples.pop_front();
            }
        }
        self.updated.notify_all();
    }

    /// Records a transform valid at all times.
    pub fn insert_static(&self, parent: &str, child: &str, parent_from_child: DAffine3) {
        {
            let mut tree = self.tree.lock();
            tree.parents.insert(parent.to_string());
            let mut samples = VecDeque::with_capacity(1);
            // Stamp unused: static edges answer every request.
            samples.push_back((Stamp::default(), parent_from_child));
            tree.edges.insert(
                child.to_string(),
                EdgeSamples {
                    parent: parent.to_string(),
                    is_static: true,
                    samples,
                },
            );
        }
        self.updated.notify_all();
    }

    /// Drops all transforms.
    pub fn clear(&self) {
        let mut tree = self.tree.lock();
        tree.edges.clear();
        tree.parents.clear();
    }
}

impl Default for PoseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseLookup for PoseBuffer {
    fn lookup(
        &self,
        source: &str,
        target: &str,
        at: PoseTime,
        timeout: Duration,
    ) -> Result<DAffine3, LookupFailure> {
        let deadline = Instant::now() + timeout;
        let mut tree = self.tree.lock();

        loop {
            let result = chain::resolve(source, target, |frame| tree.edge_above(frame, at));
            match result {
                Ok(tf) => return Ok(tf),
                // Anything else cannot be fixed by waiting for more data.
                Err(e @ (LookupFailure::Cycle(_) | LookupFailure::Backend(_))) => return Err(e),
                Err(pending) => {
                    if self.updated.wait_until(&mut tree, deadline).timed_out() {
                        return Err(pending);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use glam::DVec3;

    use super::*;

    fn tf(x: f64) -> DAffine3 {
        DAffine3::from_translation(DVec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn latest_uses_newest_sample() {
        let buf = PoseBuffer::new();
        buf.insert("odom", "base", Stamp(10), tf(1.0));
        buf.insert("odom", "base", Stamp(20), tf(2.0));

        let t = buf.lookup("base", "odom", PoseTime::Latest, Duration::ZERO).unwrap();
        assert_eq!(t.translation.x, 2.0);
    }

    #[test]
    fn stamped_lookup_uses_sample_not_after_request() {
        let buf = PoseBuffer::new();
        buf.insert("odom", "base", Stamp(10), tf(1.0));
        buf.insert("odom", "base", Stamp(30), tf(3.0));
        buf.insert("odom", "base", Stamp(20), tf(2.0));

        let t = buf.lookup("base", "odom", PoseTime::At(Stamp(25)), Duration::ZERO).unwrap();
        assert_eq!(t.translation.x, 2.0);
    }

    #[test]
    fn stamp_zero_is_a_real_time() {
        let buf = PoseBuffer::new();
        buf.insert("odom", "base", Stamp(0), tf(1.0));
        buf.insert("odom", "base", Stamp(10), tf(2.0));

        let at_zero = buf.lookup("base", "odom", PoseTime::At(Stamp(0)), Duration::ZERO).unwrap();
        let latest = buf.lookup("base", "odom", PoseTime::Latest, Duration::ZERO).unwrap();
        assert_eq!(at_zero.translation.x, 1.0);
        assert_eq!(latest.translation.x, 2.0);
    }

    #[test]
    fn future_request_times_out_with_reason() {
        let buf = PoseBuffer::new();
        buf.insert("odom", "base", Stamp(10), tf(1.0));

        let err = buf
            .lookup("base", "odom", PoseTime::At(Stamp(50)), Duration::from_millis(5))
            .unwrap_err();
        assert_eq!(
            err,
            LookupFailure::NotYetAvailable {
                frame: "base".to_string(),
                requested: PoseTime::At(Stamp(50)),
                latest: Stamp(10),
            }
        );
    }

    #[test]
    fn static_edges_answer_any_time() {
        let buf = PoseBuffer::new();
        buf.insert_static("base", "camera", tf(0.5));
        buf.insert("odom", "base", Stamp(100), tf(1.0));

        let t = buf.lookup("camera", "odom", PoseTime::At(Stamp(100)), Duration::ZERO).unwrap();
        assert_eq!(t.translation.x, 1.5);
    }

    #[test]
    fn history_is_bounded() {
        let buf = PoseBuffer::with_history(2);
        for i in 1..=5 {
            buf.insert("odom", "base", Stamp(i * 10), tf(i as f64));
        }
        // Stamp 15 predates the retained window; the oldest retained sample answers.
        let t = buf.lookup("base", "odom", PoseTime::At(Stamp(15)), Duration::ZERO).unwrap();
        assert_eq!(t.translation.x, 4.0);
    }

    #[test]
    fn waiting_lookup_sees_late_data() {
        let buf = Arc::new(PoseBuffer::new());
        let producer = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                buf.insert("odom", "base", Stamp(5), tf(7.0));
            })
        };

        let t = buf
            .lookup("base", "odom", PoseTime::At(Stamp(5)), Duration::from_secs(5))
            .unwrap();
        assert_eq!(t.translation.x, 7.0);
        producer.join().unwrap();
    }
}
