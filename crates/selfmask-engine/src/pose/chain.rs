use glam::DAffine3;

use super::LookupFailure;

/// Upper bound on tree depth; anything deeper is treated as a cycle.
const MAX_DEPTH: usize = 256;

/// Result of asking for the edge above one frame.
pub(super) enum Edge {
    /// `parent_from_child` towards the named parent.
    Parent(String, DAffine3),
    /// The frame is a root.
    Root,
}

/// Walks `frame` up to its root, returning the root name and `root_from_frame`.
fn root_from<F>(frame: &str, edge_above: &F) -> Result<(String, DAffine3), LookupFailure>
where
    F: Fn(&str) -> Result<Edge, LookupFailure>,
{
    let mut current = frame.to_string();
    let mut root_from_frame = DAffine3::IDENTITY;

    for _ in 0..MAX_DEPTH {
        match edge_above(&current)? {
            Edge::Root => return Ok((current, root_from_frame)),
            Edge::Parent(parent, parent_from_current) => {
                root_from_frame = parent_from_current * root_from_frame;
                current = parent;
            }
        }
    }

    Err(LookupFailure::Cycle(frame.to_string()))
}

/// Resolves `target_from_source` through the frames' common root.
pub(super) fn resolve<F>(source: &str, target: &str, edge_above: F) -> Result<DAffine3, LookupFailure>
where
    F: Fn(&str) -> Result<Edge, LookupFailure>,
{
    if source == target {
        // Still require the frame to exist.
        edge_above(source)?;
        return Ok(DAffine3::IDENTITY);
    }

    let (source_root, root_from_source) = root_from(source, &edge_above)?;
    let (target_root, root_from_target) = root_from(target, &edge_above)?;

    if source_root != target_root {
        return Err(LookupFailure::Disconnected {
            source: source.to_string(),
            target: target.to_string(),
        });
    }

    Ok(root_from_target.inverse() * root_from_source)
}
