//! User configuration and preset resolution

use crate::{CodeCloakError, OptionBag, Preset, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the engine option that produces a reversible source map.
pub const SOURCE_MAP_OPTION: &str = "sourceMap";

/// Caller-supplied configuration: a preset selector plus free-form engine
/// option overrides.
///
/// In JSON the overrides sit next to `preset`:
///
/// ```json
/// { "preset": "high", "compact": false, "reservedNames": ["^init$"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObfuscatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(flatten)]
    pub overrides: OptionBag,
}

impl ObfuscatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preset(preset: impl Into<String>) -> Self {
        Self {
            preset: Some(preset.into()),
            overrides: OptionBag::new(),
        }
    }

    /// Set a single engine option override.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Parse a configuration document.
    pub fn from_json_str(document: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(document).map_err(|e| {
            CodeCloakError::Configuration(format!("malformed configuration document: {}", e))
        })?;
        if !value.is_object() {
            return Err(CodeCloakError::Configuration(
                "configuration document must be a JSON object".into(),
            ));
        }
        serde_json::from_value(value).map_err(|e| {
            CodeCloakError::Configuration(format!("malformed configuration document: {}", e))
        })
    }

    /// The selected preset, validated against the closed set.
    pub fn selected_preset(&self) -> Result<Preset> {
        match &self.preset {
            Some(name) => name.parse(),
            None => Ok(Preset::default()),
        }
    }
}

/// A concrete option bag ready for the engine. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedOptions {
    options: OptionBag,
}

impl ResolvedOptions {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.options.iter()
    }

    pub fn as_map(&self) -> &OptionBag {
        &self.options
    }

    /// A copy with source map generation disabled, whatever the caller asked for.
    pub fn without_source_map(&self) -> ResolvedOptions {
        let mut options = self.options.clone();
        options.insert(SOURCE_MAP_OPTION.to_string(), Value::Bool(false));
        ResolvedOptions { options }
    }
}

impl From<OptionBag> for ResolvedOptions {
    fn from(options: OptionBag) -> Self {
        Self { options }
    }
}

/// Overlay the caller's overrides onto the selected preset.
///
/// With no configuration the `medium` preset is used. An unknown preset name
/// fails with [`CodeCloakError::Configuration`]; unknown option keys are passed
/// through for the engine to judge.
pub fn resolve(config: Option<&ObfuscatorConfig>) -> Result<ResolvedOptions> {
    let preset = match config {
        Some(cfg) => cfg.selected_preset()?,
        None => Preset::default(),
    };

    let mut options = preset.options().clone();
    if let Some(cfg) = config {
        for (key, value) in &cfg.overrides {
            // A stray "preset" inside the flattened map is a selector, not an option
            if key == "preset" {
                continue;
            }
            options.insert(key.clone(), value.clone());
        }
    }

    Ok(ResolvedOptions { options })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flattened_document() {
        let cfg = ObfuscatorConfig::from_json_str(
            r#"{"preset": "high", "compact": false, "reservedNames": ["^keep"]}"#,
        )
        .unwrap();
        assert_eq!(cfg.preset.as_deref(), Some("high"));
        assert_eq!(cfg.overrides["compact"], json!(false));
        assert_eq!(cfg.overrides["reservedNames"], json!(["^keep"]));
        assert!(!cfg.overrides.contains_key("preset"));
    }

    #[test]
    fn rejects_malformed_document() {
        let err = ObfuscatorConfig::from_json_str("{ not json").unwrap_err();
        assert!(err.is_configuration());

        let err = ObfuscatorConfig::from_json_str("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn preset_of_wrong_type_is_rejected() {
        let err = ObfuscatorConfig::from_json_str(r#"{"preset": 3}"#).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn source_map_is_forced_off() {
        let cfg = ObfuscatorConfig::with_preset("low").set(SOURCE_MAP_OPTION, true);
        let resolved = resolve(Some(&cfg)).unwrap();
        assert_eq!(resolved.get(SOURCE_MAP_OPTION), Some(&json!(true)));
        let forced = resolved.without_source_map();
        assert_eq!(forced.get(SOURCE_MAP_OPTION), Some(&json!(false)));
        // the original is left alone
        assert_eq!(resolved.get(SOURCE_MAP_OPTION), Some(&json!(true)));
    }
}
