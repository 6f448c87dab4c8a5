use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use glam::DAffine3;

use super::chain::{self, Edge};
use super::LookupFailure;
use crate::sensor::Stamp;

/// Which transform a lookup asks for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PoseTime {
    /// The newest data the backend has.
    Latest,
    /// Data valid at a capture time.
    At(Stamp),
}

impl fmt::Display for PoseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoseTime::Latest => write!(f, "latest"),
            PoseTime::At(stamp) => write!(f, "{stamp}"),
        }
    }
}

/// Pose-lookup capability.
///
/// `lookup(source, target, at, timeout)` returns `target_from_source`: the
/// transform mapping points expressed in `source` into `target`, valid at
/// `at`. Implementations may block, but never longer than `timeout`.
pub trait PoseLookup {
    fn lookup(
        &self,
        source: &str,
        target: &str,
        at: PoseTime,
        timeout: Duration,
    ) -> Result<DAffine3, LookupFailure>;
}

impl<T: PoseLookup + ?Sized> PoseLookup for &T {
    fn lookup(
        &self,
        source: &str,
        target: &str,
        at: PoseTime,
        timeout: Duration,
    ) -> Result<DAffine3, LookupFailure> {
        (**self).lookup(source, target, at, timeout)
    }
}

/// Time-independent frame tree. Never blocks.
///
/// Used for fixed setups (a replay with known poses) and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPoseLookup {
    /// child → (parent, parent_from_child)
    edges: HashMap<String, (String, DAffine3)>,
    roots: HashSet<String>,
}

impl StaticPoseLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `child` as rigidly attached to `parent`.
    ///
    /// Replaces any previous parent of `child`.
    pub fn set(&mut self, parent: &str, child: &str, parent_from_child: DAffine3) {
        self.edges
            .insert(child.to_string(), (parent.to_string(), parent_from_child));
        self.roots.insert(parent.to_string());
    }

    /// Builder form of [`StaticPoseLookup::set`].
    pub fn with(mut self, parent: &str, child: &str, parent_from_child: DAffine3) -> Self {
        self.set(parent, child, parent_from_child);
        self
    }

    /// Removes `child` and its edge. Frames below it become unreachable.
    pub fn remove(&mut self, child: &str) {
        self.edges.remove(child);
    }

    fn edge_above(&self, frame: &str) -> Result<Edge, LookupFailure> {
        if let Some((parent, tf)) = self.edges.get(frame) {
            return Ok(Edge::Parent(parent.clone(), *tf));
        }
        if self.roots.contains(frame) {
            return Ok(Edge::Root);
        }
        Err(LookupFailure::UnknownFrame(frame.to_string()))
    }
}

impl PoseLookup for StaticPoseLookup {
    fn lookup(
        &self,
        source: &str,
        target: &str,
        _at: PoseTime,
        _timeout: Duration,
    ) -> Result<DAffine3, LookupFailure> {
        chain::resolve(source, target, |frame| self.edge_above(frame))
    }
}

#[cfg(test)]
mod tests {
    use glam::{DQuat, DVec3};

    use super::*;

    fn tf(x: f64, y: f64, z: f64) -> DAffine3 {
        DAffine3::from_translation(DVec3::new(x, y, z))
    }

    fn tree() -> StaticPoseLookup {
        StaticPoseLookup::new()
            .with("odom", "base_link", tf(1.0, 0.0, 0.0))
            .with("base_link", "head", tf(0.0, 0.0, 1.0))
            .with("base_link", "arm", tf(0.0, 0.5, 0.0))
    }

    fn lookup(t: &StaticPoseLookup, source: &str, target: &str) -> Result<DAffine3, LookupFailure> {
        t.lookup(source, target, PoseTime::Latest, Duration::ZERO)
    }

    #[test]
    fn resolves_up_the_tree() {
        let t = tree();
        let odom_from_head = lookup(&t, "head", "odom").unwrap();
        assert_eq!(odom_from_head.translation, DVec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn resolves_across_siblings() {
        let t = tree();
        let head_from_arm = lookup(&t, "arm", "head").unwrap();
        let p = head_from_arm.transform_point3(DVec3::ZERO);
        assert!((p - DVec3::new(0.0, 0.5, -1.0)).length() < 1e-12);
    }

    #[test]
    fn inverse_direction_composes_to_identity() {
        let mut t = tree();
        t.set(
            "head",
            "camera",
            DAffine3::from_rotation_translation(DQuat::from_rotation_y(0.3), DVec3::X),
        );
        let a = lookup(&t, "camera", "arm").unwrap();
        let b = lookup(&t, "arm", "camera").unwrap();
        let id = a * b;
        assert!(id.abs_diff_eq(DAffine3::IDENTITY, 1e-12));
    }

    #[test]
    fn same_frame_is_identity() {
        assert_eq!(lookup(&tree(), "head", "head").unwrap(), DAffine3::IDENTITY);
    }

    #[test]
    fn unknown_frame_fails() {
        assert_eq!(
            lookup(&tree(), "gripper", "odom"),
            Err(LookupFailure::UnknownFrame("gripper".to_string()))
        );
    }

    #[test]
    fn separate_trees_are_disconnected() {
        let t = tree().with("map", "landmark", tf(0.0, 0.0, 0.0));
        assert!(matches!(
            lookup(&t, "landmark", "head"),
            Err(LookupFailure::Disconnected { .. })
        ));
    }

    #[test]
    fn removed_edge_detaches_subtree() {
        let mut t = tree().with("head", "camera", tf(0.1, 0.0, 0.0));
        t.remove("head");

        assert!(matches!(
            lookup(&t, "camera", "odom"),
            Err(LookupFailure::Disconnected { .. })
        ));
        assert!(lookup(&t, "arm", "odom").is_ok());
    }

    #[test]
    fn cycle_is_reported() {
        let t = StaticPoseLookup::new()
            .with("a", "b", DAffine3::IDENTITY)
            .with("b", "a", DAffine3::IDENTITY)
            .with("x", "y", DAffine3::IDENTITY);
        assert!(matches!(lookup(&t, "a", "y"), Err(LookupFailure::Cycle(_))));
    }
}
