use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::{EngineConfig, ReliabilityRule};
use crate::error::{DpeError, Result};
use crate::feed::FeedFormat;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl Config {
    /// Layered load: defaults, then the explicit file (or global then
    /// project files), then `DPE_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("DPE_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(DpeError::MissingConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a full config from TOML text, without any layering.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut config = Self::default();
        let patch: ConfigPatch =
            toml::from_str(raw).map_err(|err| DpeError::Config(format!("parse config: {err}")))?;
        config.merge_patch(patch);
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| DpeError::Serialization(err.to_string()))
    }

    /// Store location, defaulting to `<root>/patterns.db`.
    #[must_use]
    pub fn store_path(&self, root: &Path) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| root.join("patterns.db"))
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("dpe/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        let path = root.join("config.toml");
        Self::load_patch(&path)
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| DpeError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| DpeError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.engine {
            merge_engine(&mut self.engine, patch);
        }
        if let Some(patch) = patch.store {
            self.store.merge(patch);
        }
        if let Some(patch) = patch.feed {
            self.feed.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_usize("DPE_ENGINE_HISTORY_CAP")? {
            self.engine.history_cap = value;
        }
        if let Some(value) = env_u8("DPE_ENGINE_OUTCOME_THRESHOLD")? {
            self.engine.outcome_threshold = value;
        }
        if let Some(value) = env_usize("DPE_ENGINE_TREND_WINDOW")? {
            self.engine.trend_window = value;
        }
        if let Some(value) = env_usize("DPE_ENGINE_TREND_MIN")? {
            self.engine.trend_min = value;
        }
        if let Some(value) = env_u64("DPE_ENGINE_MIN_SAMPLES")? {
            self.engine.min_samples = value;
        }
        if let Some(value) = env_f64("DPE_ENGINE_RISK_CONFIDENCE")? {
            self.engine.risk_confidence = value;
        }
        if let Some(value) = env_usize("DPE_ENGINE_RISK_VOTES")? {
            self.engine.risk_votes = value;
        }
        if let Some(value) = env_f64("DPE_ENGINE_FLOOR")? {
            self.engine.floor = value;
        }

        if let Some(value) = env_string("DPE_STORE_PATH") {
            self.store.path = Some(PathBuf::from(value));
        }
        if let Some(value) = env_u64("DPE_STORE_KEEPALIVE_SECONDS")? {
            self.store.keepalive_seconds = value;
        }

        if let Some(value) = env_string("DPE_FEED_FORMAT") {
            self.feed.format = value.parse()?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.history_cap == 0 {
            return Err(DpeError::Config("engine.history_cap must be at least 1".into()));
        }
        if engine.trend_window == 0 || engine.trend_min > engine.trend_window {
            return Err(DpeError::Config(format!(
                "engine.trend_min ({}) must be within engine.trend_window ({})",
                engine.trend_min, engine.trend_window
            )));
        }
        if !(0.0..=1.0).contains(&engine.risk_confidence) {
            return Err(DpeError::Config(format!(
                "engine.risk_confidence must be within 0..=1, got {}",
                engine.risk_confidence
            )));
        }
        if engine.risk_votes == 0 {
            return Err(DpeError::Config("engine.risk_votes must be at least 1".into()));
        }
        if engine.floor <= 0.0 {
            return Err(DpeError::Config(format!(
                "engine.floor must be positive, got {}",
                engine.floor
            )));
        }
        for (name, rule) in [("weight", engine.weight), ("power", engine.power)] {
            if !(0.0..=1.0).contains(&rule.decay) {
                return Err(DpeError::Config(format!(
                    "engine.{name}.decay must be within 0..=1, got {}",
                    rule.decay
                )));
            }
            for (step, value) in [("reward", rule.reward), ("penalty", rule.penalty)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(DpeError::Config(format!(
                        "engine.{name}.{step} must be a non-negative number, got {value}"
                    )));
                }
            }
        }
        if self.store.keepalive_seconds == 0 {
            return Err(DpeError::Config("store.keepalive_seconds must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_keepalive_seconds")]
    pub keepalive_seconds: u64,
}

const fn default_keepalive_seconds() -> u64 {
    60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            keepalive_seconds: default_keepalive_seconds(),
        }
    }
}

impl StoreConfig {
    fn merge(&mut self, patch: StorePatch) {
        if let Some(value) = patch.path {
            self.path = Some(value);
        }
        if let Some(value) = patch.keepalive_seconds {
            self.keepalive_seconds = value;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub format: FeedFormat,
}

impl FeedConfig {
    fn merge(&mut self, patch: FeedPatch) {
        if let Some(value) = patch.format {
            self.format = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub engine: Option<EnginePatch>,
    pub store: Option<StorePatch>,
    pub feed: Option<FeedPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EnginePatch {
    pub history_cap: Option<usize>,
    pub outcome_threshold: Option<u8>,
    pub trend_window: Option<usize>,
    pub trend_min: Option<usize>,
    pub min_samples: Option<u64>,
    pub risk_confidence: Option<f64>,
    pub risk_votes: Option<usize>,
    pub weight: Option<RulePatch>,
    pub power: Option<RulePatch>,
    pub floor: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RulePatch {
    pub decay: Option<f64>,
    pub reward: Option<f64>,
    pub penalty: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StorePatch {
    pub path: Option<PathBuf>,
    pub keepalive_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FeedPatch {
    pub format: Option<FeedFormat>,
}

fn merge_engine(engine: &mut EngineConfig, patch: EnginePatch) {
    if let Some(value) = patch.history_cap {
        engine.history_cap = value;
    }
    if let Some(value) = patch.outcome_threshold {
        engine.outcome_threshold = value;
    }
    if let Some(value) = patch.trend_window {
        engine.trend_window = value;
    }
    if let Some(value) = patch.trend_min {
        engine.trend_min = value;
    }
    if let Some(value) = patch.min_samples {
        engine.min_samples = value;
    }
    if let Some(value) = patch.risk_confidence {
        engine.risk_confidence = value;
    }
    if let Some(value) = patch.risk_votes {
        engine.risk_votes = value;
    }
    if let Some(patch) = patch.weight {
        merge_rule(&mut engine.weight, patch);
    }
    if let Some(patch) = patch.power {
        merge_rule(&mut engine.power, patch);
    }
    if let Some(value) = patch.floor {
        engine.floor = value;
    }
}

fn merge_rule(rule: &mut ReliabilityRule, patch: RulePatch) {
    if let Some(value) = patch.decay {
        rule.decay = value;
    }
    if let Some(value) = patch.reward {
        rule.reward = value;
    }
    if let Some(value) = patch.penalty {
        rule.penalty = value;
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| DpeError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_u8(key: &str) -> Result<Option<u8>> {
    env_parse(key)
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    env_parse(key)
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    env_parse(key)
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    env_parse(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.engine.history_cap, 200);
        assert_eq!(config.engine.outcome_threshold, 11);
        assert_eq!(config.engine.min_samples, 5);
        assert!((config.engine.risk_confidence - 0.55).abs() < f64::EPSILON);
        assert_eq!(config.engine.weight, ReliabilityRule::WEIGHT);
        assert_eq!(config.engine.power, ReliabilityRule::POWER);
        assert_eq!(config.store.keepalive_seconds, 60);
        assert_eq!(config.feed.format, FeedFormat::Packet);
    }

    #[test]
    fn partial_tables_only_override_named_fields() {
        let config = Config::from_toml(
            r#"
            [engine]
            min_samples = 8

            [engine.power]
            reward = 0.4

            [feed]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.min_samples, 8);
        assert_eq!(config.engine.history_cap, 200);
        assert!((config.engine.power.reward - 0.4).abs() < f64::EPSILON);
        assert!((config.engine.power.decay - 0.94).abs() < f64::EPSILON);
        assert_eq!(config.feed.format, FeedFormat::Json);
    }

    #[test]
    fn rejects_inverted_trend_bounds() {
        let err = Config::from_toml("[engine]\ntrend_window = 3\ntrend_min = 4\n").unwrap_err();
        assert!(matches!(err, DpeError::Config(_)));
    }

    #[test]
    fn rejects_zero_risk_votes() {
        let err = Config::from_toml("[engine]\nrisk_votes = 0\n").unwrap_err();
        assert!(err.to_string().contains("risk_votes"));
        assert!(Config::from_toml("[engine]\nrisk_votes = 1\n").is_ok());
    }

    #[test]
    fn rejects_negative_rule_steps() {
        let err = Config::from_toml("[engine.power]\npenalty = -0.2\n").unwrap_err();
        assert!(matches!(err, DpeError::Config(ref message) if message.contains("power.penalty")));
        assert!(Config::from_toml("[engine.weight]\nreward = -1.0\n").is_err());
        assert!(Config::from_toml("[engine.weight]\nreward = 0.0\n").is_ok());
    }

    #[test]
    fn rejects_unknown_feed_format() {
        assert!(Config::from_toml("[feed]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn store_path_defaults_under_root() {
        let config = Config::default();
        let root = Path::new("/tmp/dpe-root");
        assert_eq!(config.store_path(root), root.join("patterns.db"));
    }

    #[test]
    fn toml_output_parses_back() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[engine.weight]"));
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn explicit_path_is_the_only_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("custom.toml");
        std::fs::write(&explicit, "[store]\nkeepalive_seconds = 15\n").unwrap();
        std::fs::write(dir.path().join("config.toml"), "[store]\nkeepalive_seconds = 99\n")
            .unwrap();

        let config = Config::load(Some(&explicit), dir.path()).unwrap();
        assert_eq!(config.store.keepalive_seconds, 15);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml")), dir.path()).unwrap_err();
        assert!(matches!(err, DpeError::MissingConfig(_)));
    }
}
