//! Built-in obfuscation presets

use crate::{CodeCloakError, OptionBag};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Named bundle of transformation intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Low,
    #[default]
    Medium,
    High,
}

impl Preset {
    pub fn all() -> [Preset; 3] {
        [Preset::Low, Preset::Medium, Preset::High]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Low => "low",
            Preset::Medium => "medium",
            Preset::High => "high",
        }
    }

    /// The complete option set for this preset.
    pub fn options(&self) -> &'static OptionBag {
        match self {
            Preset::Low => &LOW,
            Preset::Medium => &MEDIUM,
            Preset::High => &HIGH,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = CodeCloakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Preset::Low),
            "medium" => Ok(Preset::Medium),
            "high" => Ok(Preset::High),
            other => Err(CodeCloakError::Configuration(format!(
                "unknown preset '{}' (expected one of: low, medium, high)",
                other
            ))),
        }
    }
}

fn bag(value: Value) -> OptionBag {
    match value {
        Value::Object(map) => map,
        _ => OptionBag::new(),
    }
}

static LOW: Lazy<OptionBag> = Lazy::new(|| {
    bag(json!({
        "compact": true,
        "controlFlowFlattening": false,
        "deadCodeInjection": false,
        "debugProtection": false,
        "debugProtectionInterval": 0,
        "disableConsoleOutput": false,
        "identifierNamesGenerator": "hexadecimal",
        "log": false,
        "numbersToExpressions": false,
        "renameGlobals": false,
        "selfDefending": false,
        "simplify": true,
        "splitStrings": false,
        "stringArray": true,
        "stringArrayCallsTransform": false,
        "stringArrayEncoding": [],
        "stringArrayIndexShift": false,
        "stringArrayRotate": false,
        "stringArrayShuffle": false,
        "stringArrayWrappersCount": 0,
        "stringArrayWrappersChainedCalls": false,
        "stringArrayWrappersParametersMaxCount": 2,
        "stringArrayWrappersType": "variable",
        "stringArrayThreshold": 0.75,
        "transformObjectKeys": false,
        "unicodeEscapeSequence": false
    }))
});

static MEDIUM: Lazy<OptionBag> = Lazy::new(|| {
    bag(json!({
        "compact": true,
        "controlFlowFlattening": true,
        "controlFlowFlatteningThreshold": 0.5,
        "deadCodeInjection": true,
        "deadCodeInjectionThreshold": 0.4,
        "debugProtection": false,
        "debugProtectionInterval": 0,
        "disableConsoleOutput": true,
        "identifierNamesGenerator": "hexadecimal",
        "log": false,
        "numbersToExpressions": true,
        "renameGlobals": false,
        "selfDefending": true,
        "simplify": true,
        "splitStrings": true,
        "splitStringsChunkLength": 5,
        "stringArray": true,
        "stringArrayCallsTransform": true,
        "stringArrayCallsTransformThreshold": 0.5,
        "stringArrayEncoding": ["base64"],
        "stringArrayIndexShift": true,
        "stringArrayRotate": true,
        "stringArrayShuffle": true,
        "stringArrayWrappersCount": 2,
        "stringArrayWrappersChainedCalls": true,
        "stringArrayWrappersParametersMaxCount": 4,
        "stringArrayWrappersType": "function",
        "stringArrayThreshold": 0.75,
        "transformObjectKeys": true,
        "unicodeEscapeSequence": false
    }))
});

static HIGH: Lazy<OptionBag> = Lazy::new(|| {
    bag(json!({
        "compact": true,
        "controlFlowFlattening": true,
        "controlFlowFlatteningThreshold": 0.75,
        "deadCodeInjection": true,
        "deadCodeInjectionThreshold": 0.6,
        "debugProtection": true,
        "debugProtectionInterval": 2000,
        "disableConsoleOutput": true,
        "identifierNamesGenerator": "hexadecimal",
        "log": false,
        "numbersToExpressions": true,
        "renameGlobals": true,
        "selfDefending": true,
        "simplify": true,
        "splitStrings": true,
        "splitStringsChunkLength": 3,
        "stringArray": true,
        "stringArrayCallsTransform": true,
        "stringArrayCallsTransformThreshold": 0.75,
        "stringArrayEncoding": ["base64", "rc4"],
        "stringArrayIndexesType": ["hexadecimal-number"],
        "stringArrayIndexShift": true,
        "stringArrayRotate": true,
        "stringArrayShuffle": true,
        "stringArrayWrappersCount": 5,
        "stringArrayWrappersChainedCalls": true,
        "stringArrayWrappersParametersMaxCount": 5,
        "stringArrayWrappersType": "function",
        "stringArrayThreshold": 0.75,
        "transformObjectKeys": true,
        "unicodeEscapeSequence": true
    }))
});
