//! Layered settings
//!
//! The obfuscator configuration is assembled from, lowest to highest
//! precedence: the JSON configuration file, `CODECLOAK_*` environment
//! variables and command line flags. Only `preset` and `seed` are layered;
//! every other engine option comes from the configuration file.

use codecloak_core::engine::EngineSettings;
use codecloak_core::{resolve, CodeCloakError, ObfuscatorConfig, ResolvedOptions};
use config::{Config, Environment};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "CODECLOAK";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] CodeCloakError),

    #[error("settings error: {0}")]
    Layering(#[from] config::ConfigError),
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub preset: Option<String>,
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct Layered {
    preset: Option<String>,
    seed: Option<String>,
}

/// Read the optional configuration file and apply environment and command
/// line overrides on top of it.
pub fn load(path: Option<&Path>, cli: &CliOverrides) -> Result<ObfuscatorConfig, SettingsError> {
    let mut config = match path {
        Some(path) => {
            let document = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "loaded configuration file");
            ObfuscatorConfig::from_json_str(&document)?
        }
        None => ObfuscatorConfig::new(),
    };

    let mut builder = Config::builder();
    if let Some(preset) = &config.preset {
        builder = builder.set_default("preset", preset.as_str())?;
    }
    if let Some(seed) = config.overrides.get("seed").and_then(seed_text) {
        builder = builder.set_default("seed", seed)?;
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));

    // Command line flags take precedence
    if let Some(preset) = &cli.preset {
        builder = builder.set_override("preset", preset.as_str())?;
    }
    if let Some(seed) = cli.seed {
        builder = builder.set_override("seed", seed.to_string())?;
    }

    let layered: Layered = builder.build()?.try_deserialize()?;
    config.preset = layered.preset;
    if let Some(seed) = layered.seed {
        let value = match seed.parse::<u64>() {
            Ok(number) => Value::from(number),
            Err(_) => Value::String(seed),
        };
        config.overrides.insert("seed".to_string(), value);
    }

    Ok(config)
}

/// Resolve `config` and make sure the engine accepts every option value, so
/// a bad configuration fails once instead of once per file.
pub fn validate(config: &ObfuscatorConfig) -> Result<ResolvedOptions, SettingsError> {
    let options = resolve(Some(config))?;
    EngineSettings::from_options(&options).map_err(CodeCloakError::from)?;
    Ok(options)
}

fn seed_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn command_line_beats_file() {
        let file = config_file(r#"{"preset": "low", "seed": 5, "compact": false}"#);
        let cli = CliOverrides {
            preset: Some("high".into()),
            seed: Some(9),
        };
        let config = load(Some(file.path()), &cli).unwrap();
        assert_eq!(config.preset.as_deref(), Some("high"));
        assert_eq!(config.overrides["seed"], json!(9));
        assert_eq!(config.overrides["compact"], json!(false));
    }

    #[test]
    fn file_values_survive_without_flags() {
        let file = config_file(r#"{"preset": "low", "seed": "alpha"}"#);
        let config = load(Some(file.path()), &CliOverrides::default()).unwrap();
        // CODECLOAK_* variables are not set by the test harness
        assert_eq!(config.preset.as_deref(), Some("low"));
        assert_eq!(config.overrides["seed"], json!("alpha"));
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let err = load(Some(Path::new("/nonexistent/codecloak.json")), &CliOverrides::default())
            .unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/codecloak.json"));
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let file = config_file("{ preset: low");
        let err = load(Some(file.path()), &CliOverrides::default()).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(ref e) if e.is_configuration()));
    }

    #[test]
    fn validate_rejects_unknown_presets_and_bad_values() {
        assert!(validate(&ObfuscatorConfig::with_preset("extreme")).is_err());

        let bad = ObfuscatorConfig::with_preset("low").set("splitStringsChunkLength", -3);
        let err = validate(&bad).unwrap_err();
        assert!(err.to_string().contains("splitStringsChunkLength"));

        let good = ObfuscatorConfig::with_preset("high");
        assert_eq!(validate(&good).unwrap().get("debugProtection"), Some(&json!(true)));
    }
}
