//! Run configuration, loaded from `stacker.toml`
//!
//! ```toml
//! [model]
//! name = "gpt-4o"
//! temperature = 0.4
//!
//! [run]
//! max_iterations = 2
//! stop_when_done = true
//!
//! [arm]
//! speed = 0.4
//! top_view = [-0.1619, -0.6234, 0.45, 1e-5, -3.14159, -1e-5]
//! ```
//!
//! Every field is optional; missing ones take the defaults below.

use crate::hardware::Pose;
use serde::Deserialize;
use stacker_vlm::{Error, ErrorKind, ProviderConfig, Result};
use std::path::Path;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackerConfig {
    pub model: ModelConfig,
    pub run: RunConfig,
    pub arm: ArmConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub name: String,
    pub temperature: f32,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gpt-4o".into(),
            temperature: 0.4,
            base_url: OPENAI_BASE_URL.into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Upper bound on scene/instruction iterations
    pub max_iterations: usize,
    /// Stop as soon as the model answers `None`/`None`
    pub stop_when_done: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            stop_when_done: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArmConfig {
    pub speed: f32,
    /// Looking straight down at the workspace
    pub top_view: Pose,
    /// Looking at the stack from the side
    pub side_view: Pose,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            speed: 0.4,
            top_view: Pose([
                -0.16188220333609551,
                -0.6234229524443915,
                0.45,
                1e-5,
                -std::f64::consts::PI,
                -1e-5,
            ]),
            side_view: Pose([
                0.0360674358115564,
                -0.20624107287146376,
                0.2646274319314355,
                1.8434675848139614,
                1.4569842711938066,
                -1.2315497051361715,
            ]),
        }
    }
}

impl StackerConfig {
    /// Read and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("config::load")
                .with_context("path", path.display().to_string())
        })?;
        Self::from_toml(&text).map_err(|e| e.with_context("path", path.display().to_string()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| {
            Error::new(ErrorKind::ConfigInvalid, e.message().to_string())
                .with_operation("config::parse")
                .set_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.name.trim().is_empty() {
            return Err(Error::config_invalid("model.name", "model name is empty"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(Error::config_invalid(
                "model.temperature",
                format!("temperature {} outside 0..=2", self.model.temperature),
            ));
        }
        if self.run.max_iterations == 0 {
            return Err(Error::config_invalid("run.max_iterations", "iteration budget is zero"));
        }
        if !(self.arm.speed > 0.0 && self.arm.speed <= 1.0) {
            return Err(Error::config_invalid(
                "arm.speed",
                format!("speed {} outside (0, 1]", self.arm.speed),
            ));
        }
        Ok(())
    }

    /// Provider settings, with the API key taken from the environment.
    ///
    /// The hosted OpenAI endpoint requires a key; any other base URL is
    /// treated as a self-hosted server where the key is optional.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let api_key = std::env::var(&self.model.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        let hosted = self.model.base_url.trim_end_matches('/') == OPENAI_BASE_URL;

        let config = match (hosted, api_key) {
            (true, Some(key)) => ProviderConfig::openai(key),
            (true, None) => {
                return Err(Error::config_invalid(
                    "model.api_key_env",
                    format!("environment variable {} is not set", self.model.api_key_env),
                ))
            }
            (false, key) => {
                let mut config = ProviderConfig::local(&self.model.base_url, &self.model.name);
                config.api_key = key;
                config
            }
        };

        Ok(config
            .with_base_url(&self.model.base_url)
            .with_model(&self.model.name)
            .with_timeout(self.model.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacker_vlm::ProviderType;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StackerConfig::from_toml("").unwrap();
        assert_eq!(config.model.name, "gpt-4o");
        assert!((config.model.temperature - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.run.max_iterations, 2);
        assert!(config.run.stop_when_done);
        assert_eq!(config.arm.top_view.as_array()[2], 0.45);
    }

    #[test]
    fn test_partial_override() {
        let config = StackerConfig::from_toml(
            r#"
            [model]
            temperature = 0.0

            [run]
            max_iterations = 8
            stop_when_done = false

            [arm]
            side_view = [0.0, -0.2, 0.3, 1.8, 1.4, -1.2]
            "#,
        )
        .unwrap();
        assert_eq!(config.model.name, "gpt-4o");
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.run.max_iterations, 8);
        assert!(!config.run.stop_when_done);
        assert_eq!(config.arm.side_view, Pose([0.0, -0.2, 0.3, 1.8, 1.4, -1.2]));
    }

    #[test]
    fn test_rejects_invalid_values() {
        for (text, field) in [
            ("[model]\ntemperature = 3.5", "model.temperature"),
            ("[run]\nmax_iterations = 0", "run.max_iterations"),
            ("[arm]\nspeed = 0.0", "arm.speed"),
            ("[model]\nname = \"\"", "model.name"),
        ] {
            let err = StackerConfig::from_toml(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigInvalid, "{text}");
            assert_eq!(err.context_value("field"), Some(field));
        }
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_poses() {
        let err = StackerConfig::from_toml("[run]\nmax_iteration = 3").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = StackerConfig::from_toml("[arm]\ntop_view = [1.0, 2.0]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run]\nmax_iterations = 5").unwrap();

        let config = StackerConfig::load(file.path()).unwrap();
        assert_eq!(config.run.max_iterations, 5);

        let err = StackerConfig::load(file.path().with_extension("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_local_provider_without_key() {
        let config = StackerConfig::from_toml(
            r#"
            [model]
            name = "llava"
            base_url = "http://localhost:11434/v1"
            api_key_env = "STACKER_TEST_UNSET_KEY"
            "#,
        )
        .unwrap();
        let provider = config.provider_config().unwrap();
        assert_eq!(provider.provider_type, ProviderType::Local);
        assert!(provider.api_key.is_none());
        assert_eq!(provider.default_model.as_deref(), Some("llava"));
    }

    #[test]
    fn test_hosted_provider_requires_key() {
        let config = StackerConfig::from_toml(
            "[model]\napi_key_env = \"STACKER_TEST_UNSET_KEY\"",
        )
        .unwrap();
        let err = config.provider_config().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
