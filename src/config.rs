// src/config.rs - Pipeline thresholds, loadable from a JSON file
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalizer: NormalizerConfig,
    pub stabilizer: StabilizerConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub min_hand_confidence: f64,
    pub min_anchor_confidence: f64,
    pub min_joint_confidence: f64,
    /// Both neighbours of a synthesized joint must exceed this.
    pub min_interpolation_confidence: f64,
    pub interpolated_confidence: f64,
    /// Normalized image units.
    pub min_hand_width: f64,
    pub perspective_gain: f64,
    pub min_valid_points: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_hand_confidence: 0.3,
            min_anchor_confidence: 0.3,
            min_joint_confidence: 0.2,
            min_interpolation_confidence: 0.3,
            interpolated_confidence: 0.2,
            min_hand_width: 0.01,
            perspective_gain: 0.2,
            min_valid_points: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub classification_interval_ms: u64,
    pub history_size: usize,
    /// Top label probability must be strictly above this to enter history.
    pub sample_threshold: f64,
    pub min_majority: usize,
    pub min_mean_confidence: f64,
    pub required_streak: u32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            classification_interval_ms: 200,
            history_size: 10,
            sample_threshold: 0.8,
            min_majority: 5,
            min_mean_confidence: 0.85,
            required_streak: 2,
        }
    }
}

impl StabilizerConfig {
    pub fn classification_interval(&self) -> Duration {
        Duration::from_millis(self.classification_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub required_consecutive: u32,
    pub min_confidence: f64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            required_consecutive: 3,
            min_confidence: 0.85,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Loads the per-user config if one exists, defaults otherwise.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "signtracker", "SignTracker")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = PipelineConfig::default();
        assert_eq!(config.normalizer.min_valid_points, 12);
        assert_eq!(config.stabilizer.history_size, 10);
        assert_eq!(config.stabilizer.classification_interval(), Duration::from_millis(200));
        assert_eq!(config.completion.required_consecutive, 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "stabilizer": { "classification_interval_ms": 50 } }"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.stabilizer.classification_interval_ms, 50);
        assert_eq!(config.stabilizer.min_majority, 5);
        assert_eq!(config.normalizer, NormalizerConfig::default());
    }

    #[test]
    fn test_json_roundtrip_of_defaults() {
        let json = PipelineConfig::default().to_json().unwrap();
        assert!(json.contains("\"sample_threshold\": 0.8"));
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, PipelineConfig::default());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = PipelineConfig::load("/nonexistent/sign_tracker.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
