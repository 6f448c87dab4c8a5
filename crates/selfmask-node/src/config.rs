//! Replay node configuration.
//!
//! The node reads the engine's filter configuration and a `[replay]` table
//! from the same TOML file:
//!
//! ```toml
//! fixed_frame = "base_link"
//! camera_frame = "camera_depth_optical_frame"
//! # ... remaining filter keys ...
//!
//! [replay]
//! width = 640
//! height = 480
//! fx = 525.0
//! fy = 525.0
//! cx = 319.5
//! cy = 239.5
//! frames = ["frames/000.f32", "frames/001.f32"]
//! models_dir = "models"
//! output_dir = "out"
//!
//! [[replay.poses]]
//! parent = "base_link"
//! child = "camera_depth_optical_frame"
//! translation = [0.2, 0.0, 0.5]
//! rotation = [0.0, 0.0, 0.0, 1.0]
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use selfmask_engine::config::FilterConfig;
use selfmask_engine::pose::StaticPoseLookup;
use selfmask_engine::sensor::{CameraIntrinsics, ExtrinsicOffset};

/// A fixed transform `parent ← child`.
#[derive(Debug, Clone, Deserialize)]
pub struct PoseEntry {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub translation: [f64; 3],
    /// Quaternion `[x, y, z, w]`.
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
}

fn identity_rotation() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaySection {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Raw little-endian `f32` frames, row-major, `width * height` samples each.
    pub frames: Vec<PathBuf>,
    /// Nominal capture rate, used to synthesize frame stamps.
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,
    /// Frame id stamped on replayed frames; the camera frame when absent.
    #[serde(default)]
    pub frame_id: Option<String>,
    pub models_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_true")]
    pub write_depth: bool,
    #[serde(default = "default_true")]
    pub write_mask: bool,
    #[serde(default)]
    pub poses: Vec<PoseEntry>,
}

fn default_rate_hz() -> f64 {
    30.0
}

#[derive(Debug, Deserialize)]
struct ReplayFile {
    replay: ReplaySection,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub filter: FilterConfig,
    pub replay: ReplaySection,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        Self::from_toml_str(&content, base)
    }

    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self> {
        let filter = FilterConfig::from_toml_str(content)?;
        let ReplayFile { mut replay } =
            toml::from_str(content).context("malformed [replay] section")?;
        replay.validate()?;
        replay.resolve_paths(base);
        Ok(Self { filter, replay })
    }
}

impl ReplaySection {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("replay size must be non-zero, got {}x{}", self.width, self.height);
        }
        if !(self.fx > 0.0 && self.fy > 0.0) {
            bail!("replay focal lengths must be positive");
        }
        if !(self.rate_hz.is_finite() && self.rate_hz > 0.0) {
            bail!("replay rate_hz must be positive, got {}", self.rate_hz);
        }
        for p in &self.poses {
            let norm2: f64 = p.rotation.iter().map(|v| v * v).sum();
            if !norm2.is_finite() || norm2 < 1e-12 {
                bail!("pose {} <- {} has a zero rotation", p.parent, p.child);
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.frames.iter_mut().for_each(join);
        join(&mut self.models_dir);
        join(&mut self.output_dir);
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::new(self.fx, self.fy, self.cx, self.cy, self.width, self.height)
    }

    pub fn pose_lookup(&self) -> StaticPoseLookup {
        let mut poses = StaticPoseLookup::new();
        for p in &self.poses {
            let tf = ExtrinsicOffset::new(p.translation, p.rotation).transform();
            poses.set(&p.parent, &p.child, tf);
        }
        poses
    }
}
