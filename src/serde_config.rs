//! Training configuration files (feature: `serde`).
//!
//! `LearnConfig` is stored inside a small versioned envelope so the file format
//! can change without breaking old files silently. Missing fields take their
//! defaults, and every loaded configuration is validated.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, LearnConfig, Result};

pub const CONFIG_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLearnConfig {
    pub format_version: u32,
    #[serde(default)]
    pub learn: LearnConfig,
}

impl SerializedLearnConfig {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != CONFIG_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported config format_version {}; expected {}",
                self.format_version, CONFIG_FORMAT_VERSION
            )));
        }
        self.learn
            .validate()
            .map_err(|e| Error::InvalidData(format!("invalid learn config: {e}")))
    }
}

impl From<&LearnConfig> for SerializedLearnConfig {
    fn from(cfg: &LearnConfig) -> Self {
        Self {
            format_version: CONFIG_FORMAT_VERSION,
            learn: *cfg,
        }
    }
}

impl LearnConfig {
    /// Serialize to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&SerializedLearnConfig::from(self))
            .map_err(|e| Error::InvalidData(format!("failed to serialize config: {e}")))
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedLearnConfig = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse config json: {e}")))?;
        ser.validate()?;
        Ok(ser.learn)
    }

    /// Save to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        let p = path.as_ref();
        std::fs::write(p, s)
            .map_err(|e| Error::InvalidData(format!("failed to write {}: {e}", p.display())))
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::InvalidData(format!("failed to read {}: {e}", p.display())))?;
        Self::from_json_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{RandomDensity, Reduction};

    #[test]
    fn json_roundtrips() {
        let mut cfg = LearnConfig {
            retries: 7,
            quit_error: 0.5,
            ..LearnConfig::default()
        };
        cfg.anneal.escape.density = RandomDensity::Cauchy;
        cfg.anneal.escape.reduction = Reduction::Fast;

        let json = cfg.to_json_string_pretty().unwrap();
        assert!(json.contains("\"cauchy\""));
        assert_eq!(LearnConfig::from_json_str(&json).unwrap(), cfg);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = LearnConfig::from_json_str(
            r#"{"format_version":1,"learn":{"pretries":3,"anneal":{"initial":{"n_temps":2}}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.pretries, 3);
        assert_eq!(cfg.anneal.initial.n_temps, 2);
        assert_eq!(cfg.anneal.initial.n_iters, LearnConfig::default().anneal.initial.n_iters);
        assert_eq!(cfg.anneal.escape, LearnConfig::default().anneal.escape);
    }

    #[test]
    fn rejects_unknown_version_and_invalid_values() {
        let err = LearnConfig::from_json_str(r#"{"format_version":999}"#).unwrap_err();
        assert!(format!("{err}").contains("format_version"));

        let err = LearnConfig::from_json_str(r#"{"format_version":1,"learn":{"pretries":0}}"#)
            .unwrap_err();
        assert!(format!("{err}").contains("pretries"));
    }

    #[test]
    fn save_and_load_file() {
        let path = std::env::temp_dir().join(format!("rust_mlfn_cfg_{}.json", std::process::id()));
        let cfg = LearnConfig::default();
        cfg.save_json(&path).unwrap();
        let loaded = LearnConfig::load_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, cfg);
    }
}
