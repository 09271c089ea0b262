// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration: a `serde`-backed struct persisted as `config.json`,
//! the only on-disk state the service keeps. Loaded once at startup; a
//! reload is implemented as a full process restart (see [`restart`]) rather
//! than in-place mutation, matching the original reference implementation's
//! `os.execv`-based reload.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::RegionShape;

pub const CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub dbscan_eps: f32,
    pub dbscan_min_samples: usize,
    pub max_match_dist: f32,
    pub frame_dt_sec: f32,
    pub max_cluster_id: i32,
    pub region_shape: RegionShape,
    pub cluster_radius: f32,
    pub cone_center_theta: f32,
    pub cone_center_phi: f32,
    pub cone_half_angle: f32,
    pub udp_port: u16,
    pub http_port: u16,
    pub static_dir: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            dbscan_eps: 0.3,
            dbscan_min_samples: 4,
            max_match_dist: 1.0,
            frame_dt_sec: 0.1,
            max_cluster_id: 1000,
            region_shape: RegionShape::Sphere,
            cluster_radius: 10.0,
            cone_center_theta: 0.0,
            cone_center_phi: 0.0,
            cone_half_angle: std::f32::consts::FRAC_PI_4,
            udp_port: 2115,
            http_port: 8080,
            static_dir: "./public".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Io(std::io::Error),
    Invalid(&'static str),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "config.json parse error: {e}"),
            ConfigError::Io(e) => write!(f, "config.json io error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl Configuration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dbscan_min_samples < 1 {
            return Err(ConfigError::Invalid("dbscan_min_samples must be >= 1"));
        }
        if self.cluster_radius <= 0.0 {
            return Err(ConfigError::Invalid("cluster_radius must be > 0"));
        }
        if self.dbscan_eps <= 0.0 {
            return Err(ConfigError::Invalid("dbscan_eps must be > 0"));
        }
        if self.frame_dt_sec <= 0.0 {
            return Err(ConfigError::Invalid("frame_dt_sec must be > 0"));
        }
        if self.max_cluster_id < 1 {
            return Err(ConfigError::Invalid("max_cluster_id must be >= 1"));
        }
        if self.region_shape == RegionShape::Cone
            && !(self.cone_half_angle > 0.0 && self.cone_half_angle <= std::f32::consts::PI)
        {
            return Err(ConfigError::Invalid(
                "cone_half_angle must be within (0, pi] when region_shape is cone",
            ));
        }
        Ok(())
    }

    /// Loads `config.json` from the working directory, validating it. If the
    /// file does not exist, a default configuration is written out and
    /// returned, so the file is always present after a first successful
    /// boot — see DESIGN.md for why this departs from the original's
    /// unconditional load.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        if Path::new(CONFIG_PATH).exists() {
            let text = std::fs::read_to_string(CONFIG_PATH)?;
            let cfg: Configuration = serde_json::from_str(&text)?;
            cfg.validate()?;
            Ok(cfg)
        } else {
            let cfg = Configuration::default();
            cfg.save()?;
            Ok(cfg)
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(CONFIG_PATH, text)?;
        Ok(())
    }
}

/// Re-execs the current process in place, the Rust analogue of the original
/// implementation's `os.execv` reload. Never returns on success; `libc` is
/// already linked for socket tuning elsewhere in the service.
pub fn restart() -> ! {
    let exe = std::env::current_exe().expect("current_exe must resolve to restart");
    let exe_c = std::ffi::CString::new(exe.to_string_lossy().as_bytes()).unwrap();
    let args: Vec<std::ffi::CString> = std::env::args()
        .map(|a| std::ffi::CString::new(a).unwrap())
        .collect();
    let mut argv: Vec<*const libc::c_char> = args.iter().map(|a| a.as_ptr()).collect();
    argv.push(std::ptr::null());

    tracing::warn!("restarting process to apply new configuration");
    unsafe {
        libc::execvp(exe_c.as_ptr(), argv.as_ptr());
    }
    panic!("execvp failed: {}", std::io::Error::last_os_error());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_validates() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_min_samples() {
        let mut cfg = Configuration::default();
        cfg.dbscan_min_samples = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_cluster_radius() {
        let mut cfg = Configuration::default();
        cfg.cluster_radius = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cone_requires_half_angle_in_range() {
        let mut cfg = Configuration::default();
        cfg.region_shape = RegionShape::Cone;
        cfg.cone_half_angle = 0.0;
        assert!(cfg.validate().is_err());

        cfg.cone_half_angle = std::f32::consts::PI;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = Configuration::default();
        let text = serde_json::to_string(&cfg).unwrap();
        let back: Configuration = serde_json::from_str(&text).unwrap();
        assert_eq!(cfg, back);
    }
}
