use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_video_addr() -> String {
    "127.0.0.1:5559".to_string()
}

fn default_joints_addr() -> String {
    "127.0.0.1:5560".to_string()
}

fn default_perception_addr() -> String {
    "127.0.0.1:5557".to_string()
}

fn default_command_bind_addr() -> String {
    "0.0.0.0:5561".to_string()
}

fn default_robot_addr() -> String {
    "127.0.0.1:9559".to_string()
}

fn default_frame_width() -> u32 {
    320
}

fn default_frame_height() -> u32 {
    240
}

fn default_tuning_path() -> std::path::PathBuf {
    "tuning.json".into()
}

/// Application configuration, loaded once at startup.
///
/// The runtime-tunable parameters live in the separate JSON document at
/// [`FixateConfig::tuning_path`], which is re-read while running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixateConfig {
    /// Address of the video publisher.
    #[serde(default = "default_video_addr")]
    pub video_addr: String,
    /// Address of the joint-state publisher.
    #[serde(default = "default_joints_addr")]
    pub joints_addr: String,
    /// Address of the perception inference service.
    #[serde(default = "default_perception_addr")]
    pub perception_addr: String,
    /// Bind address for the external command channel.
    #[serde(default = "default_command_bind_addr")]
    pub command_bind_addr: String,
    /// Address of the robot RPC shim.
    #[serde(default = "default_robot_addr")]
    pub robot_addr: String,
    /// Nominal camera frame size; larger frames are accepted and used at
    /// their decoded size.
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    /// Path of the hot-reloaded tuning JSON. Relative paths are resolved
    /// against the config file's directory.
    #[serde(default = "default_tuning_path")]
    pub tuning_path: std::path::PathBuf,
    /// When set, per-tick motion telemetry is appended here as CSV.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_csv: Option<std::path::PathBuf>,
}

impl Default for FixateConfig {
    fn default() -> Self {
        // the defaults encoded in the serde attributes
        toml::from_str("").unwrap()
    }
}

/// If `path` is relative, make it relative to `dirname`.
fn fixup_relative_path(path: &mut std::path::PathBuf, dirname: &std::path::Path) {
    if path.is_relative() {
        *path = dirname.join(&path);
    }
}

/// Read and parse the application config, resolving relative paths
/// against the config file location.
pub fn parse_config_file<P: AsRef<std::path::Path>>(path: P) -> Result<FixateConfig> {
    let path = path.as_ref();
    let buf = std::fs::read_to_string(path)?;
    let mut cfg: FixateConfig = toml::from_str(&buf)?;
    let dirname = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    fixup_relative_path(&mut cfg.tuning_path, dirname);
    if let Some(telemetry) = cfg.telemetry_csv.as_mut() {
        fixup_relative_path(telemetry, dirname);
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = FixateConfig::default();
        assert_eq!(cfg.video_addr, "127.0.0.1:5559");
        assert_eq!(cfg.frame_width, 320);
        assert!(cfg.telemetry_csv.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res: std::result::Result<FixateConfig, _> = toml::from_str("no_such_key = 1\n");
        assert!(res.is_err());
    }

    #[test]
    fn relative_tuning_path_is_anchored_at_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("fixate.toml");
        let mut f = std::fs::File::create(&cfg_path).unwrap();
        writeln!(f, "tuning_path = \"tune/head.json\"").unwrap();
        drop(f);
        let cfg = parse_config_file(&cfg_path).unwrap();
        assert_eq!(cfg.tuning_path, dir.path().join("tune/head.json"));
    }
}
