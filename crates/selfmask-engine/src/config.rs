//! Startup configuration.
//!
//! Loaded once from a TOML file. Every field without a default is required:
//! a missing or mis-shaped field is fatal, there is no partial operation.
//!
//! ```toml
//! fixed_frame = "base_link"
//! camera_frame = "head_camera_depth_optical_frame"
//! depth_distance_threshold = 0.05
//! filter_replace_value = 5.0
//! show_gui = false
//!
//! [camera_offset]
//! translation = [0.0, 0.0, 0.0]
//! rotation = [0.0, 0.0, 0.0, 1.0]   # x y z w
//!
//! [[models]]
//! model = "robot_description"
//! tf_prefix = ""
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::FilterSettings;
use crate::logging::LoggingConfig;
use crate::sensor::ExtrinsicOffset;

/// Configuration errors. All of them abort startup.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            ConfigError::Parse(e) => write!(f, "malformed config: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Mounting offset as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraOffsetConfig {
    pub translation: [f64; 3],
    /// Quaternion `[x, y, z, w]`.
    pub rotation: [f64; 4],
}

/// One robot model to render.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelEntry {
    /// Identifier of the description source (resolved by a `ModelSource`).
    pub model: String,
    /// Namespace prefix for the model's link frames.
    pub tf_prefix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSection {
    /// `env_logger` filter string; `RUST_LOG` is used when absent.
    pub filter: Option<String>,
}

/// Filter configuration as read from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    pub fixed_frame: String,
    pub camera_frame: String,
    pub camera_offset: CameraOffsetConfig,
    /// How far behind the rendered model a sensed point may lie and still be erased.
    pub depth_distance_threshold: f64,
    /// Value written into erased pixels.
    pub filter_replace_value: f64,
    pub show_gui: bool,
    pub models: Vec<ModelEntry>,

    #[serde(default = "default_near_plane")]
    pub near_plane: f64,
    #[serde(default = "default_far_plane")]
    pub far_plane: f64,
    #[serde(default = "default_pose_timeout_ms")]
    pub pose_timeout_ms: u64,
    /// Look up the camera pose at the frame's capture time instead of the latest one.
    #[serde(default)]
    pub pose_at_frame_stamp: bool,

    #[serde(default)]
    pub logging: LoggingSection,
}

fn default_near_plane() -> f64 {
    0.1
}

fn default_far_plane() -> f64 {
    8.0
}

fn default_pose_timeout_ms() -> u64 {
    100
}

impl FilterConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FilterConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.fixed_frame.is_empty() {
            return invalid("fixed_frame must not be empty".into());
        }
        if self.camera_frame.is_empty() {
            return invalid("camera_frame must not be empty".into());
        }
        let t = self.depth_distance_threshold;
        if !(t.is_finite() && t > 0.0) {
            return invalid(format!("depth_distance_threshold must be > 0, got {t}"));
        }
        if !self.filter_replace_value.is_finite() {
            return invalid("filter_replace_value must be finite".into());
        }
        let (n, f) = (self.near_plane, self.far_plane);
        if !(n.is_finite() && f.is_finite() && n > 0.0 && n < f) {
            return invalid(format!("need 0 < near_plane < far_plane, got {n} / {f}"));
        }
        if self.camera_offset.translation.iter().any(|v| !v.is_finite()) {
            return invalid("camera_offset.translation must be finite".into());
        }
        let q = self.camera_offset.rotation;
        let norm2: f64 = q.iter().map(|v| v * v).sum();
        if !norm2.is_finite() || norm2 < 1e-12 {
            return invalid(format!("camera_offset.rotation is not a rotation: {q:?}"));
        }
        Ok(())
    }

    /// Converts to the pipeline's runtime settings.
    pub fn settings(&self) -> FilterSettings {
        FilterSettings {
            fixed_frame: self.fixed_frame.clone(),
            camera_frame: self.camera_frame.clone(),
            camera_offset: ExtrinsicOffset::new(
                self.camera_offset.translation,
                self.camera_offset.rotation,
            ),
            max_diff: self.depth_distance_threshold as f32,
            replace_value: self.filter_replace_value as f32,
            show_debug_display: self.show_gui,
            near_plane: self.near_plane as f32,
            far_plane: self.far_plane as f32,
            pose_timeout: Duration::from_millis(self.pose_timeout_ms),
            pose_at_frame_stamp: self.pose_at_frame_stamp,
        }
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig::with_filter(self.logging.filter.clone())
    }

    /// Logs every resolved value at info level.
    pub fn log_summary(&self) {
        let t = self.camera_offset.translation;
        let r = self.camera_offset.rotation;
        log::info!("using fixed frame {}", self.fixed_frame);
        log::info!("using camera frame {}", self.camera_frame);
        log::info!("using camera translational offset: {} {} {}", t[0], t[1], t[2]);
        log::info!("using camera rotational offset: {} {} {} {}", r[0], r[1], r[2], r[3]);
        log::info!("using depth distance threshold {}", self.depth_distance_threshold);
        log::info!("using filter replace value {}", self.filter_replace_value);
        log::info!("showing gui / visualization: {}", if self.show_gui { "ON" } else { "OFF" });
        log::info!("using clip planes near={} far={}", self.near_plane, self.far_plane);
        log::info!("pose lookup timeout {} ms", self.pose_timeout_ms);
        log::info!("{} model(s) configured", self.models.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        fixed_frame = "base_link"
        camera_frame = "head_camera_depth_optical_frame"
        depth_distance_threshold = 0.05
        filter_replace_value = 5.0
        show_gui = false

        [camera_offset]
        translation = [0.0, 0.1, 0.0]
        rotation = [0.0, 0.0, 0.0, 1.0]

        [[models]]
        model = "robot_description"
        tf_prefix = ""

        [[models]]
        model = "second_robot_description"
        tf_prefix = "robot2"
    "#;

    fn without(key: &str) -> String {
        VALID
            .lines()
            .filter(|l| !l.trim_start().starts_with(key))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ── parsing ───────────────────────────────────────────────────────────

    #[test]
    fn parses_valid_config_with_defaults() {
        let c = FilterConfig::from_toml_str(VALID).unwrap();
        assert_eq!(c.fixed_frame, "base_link");
        assert_eq!(c.models.len(), 2);
        assert_eq!(c.models[1].tf_prefix, "robot2");
        assert_eq!(c.near_plane, 0.1);
        assert_eq!(c.far_plane, 8.0);
        assert_eq!(c.pose_timeout_ms, 100);
        assert!(!c.pose_at_frame_stamp);
    }

    #[test]
    fn settings_carry_converted_values() {
        let s = FilterConfig::from_toml_str(VALID).unwrap().settings();
        assert_eq!(s.max_diff, 0.05);
        assert_eq!(s.replace_value, 5.0);
        assert!(!s.show_debug_display);
        assert_eq!(s.pose_timeout, Duration::from_millis(100));
        assert_eq!(s.camera_offset.translation.y, 0.1);
    }

    // ── required fields ───────────────────────────────────────────────────

    #[test]
    fn missing_required_fields_are_fatal() {
        for key in [
            "fixed_frame",
            "camera_frame",
            "depth_distance_threshold",
            "filter_replace_value",
            "show_gui",
        ] {
            let err = FilterConfig::from_toml_str(&without(key)).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{key}: {err}");
        }
    }

    #[test]
    fn missing_models_is_fatal() {
        let text: String = VALID.split("[[models]]").next().unwrap().to_string();
        assert!(matches!(
            FilterConfig::from_toml_str(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn wrong_offset_shape_is_fatal() {
        let text = VALID.replace("translation = [0.0, 0.1, 0.0]", "translation = [0.0, 0.1]");
        assert!(matches!(FilterConfig::from_toml_str(&text), Err(ConfigError::Parse(_))));

        let text = VALID.replace("rotation = [0.0, 0.0, 0.0, 1.0]", "rotation = [0.0, 0.0, 1.0]");
        assert!(matches!(FilterConfig::from_toml_str(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn wrong_type_is_fatal() {
        let text = VALID.replace("show_gui = false", "show_gui = \"no\"");
        assert!(matches!(FilterConfig::from_toml_str(&text), Err(ConfigError::Parse(_))));
    }

    // ── value ranges ──────────────────────────────────────────────────────

    #[test]
    fn non_positive_threshold_is_rejected() {
        let text = VALID.replace("depth_distance_threshold = 0.05", "depth_distance_threshold = 0.0");
        assert!(matches!(FilterConfig::from_toml_str(&text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn inverted_planes_are_rejected() {
        let text = format!("near_plane = 9.0\n{VALID}");
        assert!(matches!(FilterConfig::from_toml_str(&text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_quaternion_is_rejected() {
        let text = VALID.replace("rotation = [0.0, 0.0, 0.0, 1.0]", "rotation = [0.0, 0.0, 0.0, 0.0]");
        assert!(matches!(FilterConfig::from_toml_str(&text), Err(ConfigError::Invalid(_))));
    }
}
