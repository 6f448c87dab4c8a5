use std::collections::HashMap;
use std::time::Instant;

use glam::DAffine3;

use crate::config::ModelEntry;
use crate::pose::{PoseLookup, PoseTime};
use crate::scene::{DrawList, MeshDraw};

use super::description::ModelDescription;
use super::error::ModelLoadError;
use super::mesh::{MeshHandle, MeshLibrary};
use super::source::ModelSource;

/// Per-frame inputs shared by every model.
pub struct ModelFrame<'a> {
    /// Camera optical frame ← fixed frame, mounting offset already applied.
    pub camera_from_fixed: DAffine3,
    pub fixed_frame: &'a str,
    pub at: PoseTime,
    /// Shared by every link lookup of the frame.
    pub deadline: Instant,
    pub poses: &'a dyn PoseLookup,
}

#[derive(Debug, Clone, PartialEq)]
struct LinkVisual {
    /// Namespaced frame name used for pose lookups.
    frame: String,
    /// Link frame ← mesh frame.
    origin: DAffine3,
    mesh: MeshHandle,
}

/// A loaded robot: visual geometry per link, posed per frame by lookup.
#[derive(Debug, Clone)]
pub struct ArticulatedModel {
    name: String,
    prefix: String,
    visuals: Vec<LinkVisual>,
}

impl ArticulatedModel {
    /// Registers every visual's mesh in `library`.
    ///
    /// Fails without touching `library` when the description is empty or a
    /// mesh is malformed.
    pub fn build(
        name: &str,
        prefix: &str,
        description: &ModelDescription,
        library: &mut MeshLibrary,
    ) -> Result<Self, ModelLoadError> {
        if description.is_empty() {
            return Err(ModelLoadError::Empty(name.to_string()));
        }

        let mut staged = Vec::new();
        for link in &description.links {
            for visual in &link.visuals {
                let mesh = visual.geometry.to_mesh();
                mesh.check().map_err(|reason| ModelLoadError::InvalidMesh {
                    model: name.to_string(),
                    link: link.name.clone(),
                    reason,
                })?;
                if mesh.is_empty() {
                    continue;
                }
                staged.push((link_frame(prefix, &link.name), visual.origin.transform(), mesh));
            }
        }
        if staged.is_empty() {
            return Err(ModelLoadError::Empty(name.to_string()));
        }

        let visuals = staged
            .into_iter()
            .map(|(frame, origin, mesh)| LinkVisual {
                frame,
                origin,
                mesh: library.insert(mesh),
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            visuals,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn visual_count(&self) -> usize {
        self.visuals.len()
    }

    /// Pushes one draw per visual whose link pose resolves.
    ///
    /// A link that cannot be resolved is skipped for this frame only. Each
    /// lookup waits at most until `frame.deadline`, so a frame with many
    /// missing links costs one timeout, not one per link.
    /// Returns the number of draws pushed.
    pub fn render(&self, frame: &ModelFrame<'_>, draws: &mut DrawList) -> usize {
        let mut resolved: HashMap<&str, Option<DAffine3>> = HashMap::new();
        let mut pushed = 0;

        for visual in &self.visuals {
            let fixed_from_link = *resolved.entry(visual.frame.as_str()).or_insert_with(|| {
                let remaining = frame.deadline.saturating_duration_since(Instant::now());
                match frame.poses.lookup(&visual.frame, frame.fixed_frame, frame.at, remaining) {
                    Ok(tf) => Some(tf),
                    Err(e) => {
                        log::debug!("{}: skipping link {}: {e}", self.name, visual.frame);
                        None
                    }
                }
            });
            let Some(fixed_from_link) = fixed_from_link else { continue };

            draws.push(MeshDraw::new(
                visual.mesh,
                frame.camera_from_fixed * fixed_from_link * visual.origin,
            ));
            pushed += 1;
        }
        pushed
    }
}

/// Renderable model kinds.
#[derive(Debug, Clone)]
pub enum RobotModel {
    Articulated(ArticulatedModel),
}

impl RobotModel {
    pub fn name(&self) -> &str {
        match self {
            RobotModel::Articulated(m) => m.name(),
        }
    }

    pub fn render(&self, frame: &ModelFrame<'_>, draws: &mut DrawList) -> usize {
        match self {
            RobotModel::Articulated(m) => m.render(frame, draws),
        }
    }
}

/// `<prefix>/<link>`, or just the link when the prefix is empty.
pub fn link_frame(prefix: &str, link: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let link = link.trim_start_matches('/');
    if prefix.is_empty() {
        link.to_string()
    } else {
        format!("{prefix}/{link}")
    }
}

/// Resolves every configured model. Failures are logged and skipped.
pub fn load_models<S: ModelSource>(
    entries: &[ModelEntry],
    source: &S,
    library: &mut MeshLibrary,
) -> Vec<RobotModel> {
    let mut models = Vec::with_capacity(entries.len());

    for entry in entries {
        let loaded = source
            .resolve(&entry.model)
            .and_then(|d| ArticulatedModel::build(&entry.model, &entry.tf_prefix, &d, library));

        match loaded {
            Ok(model) => {
                log::info!(
                    "loaded model '{}' (prefix '{}', {} visual(s))",
                    model.name(),
                    model.prefix(),
                    model.visual_count()
                );
                models.push(RobotModel::Articulated(model));
            }
            Err(e) => log::error!("skipping model '{}': {e}", entry.model),
        }
    }

    if models.is_empty() && !entries.is_empty() {
        log::warn!("no robot model could be loaded; nothing will be filtered");
    }
    models
}
