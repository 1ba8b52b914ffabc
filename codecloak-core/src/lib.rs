//! CodeCloak: preset-driven JavaScript obfuscation
//!
//! A small preset vocabulary (`low`, `medium`, `high`) resolves into the flat
//! option bag an [`Engine`] understands. [`Obfuscator`] ties the two together
//! and guarantees that no source map leaves an obfuscation.
//!
//! ```
//! use codecloak_core::{obfuscate, ObfuscatorConfig};
//!
//! let config = ObfuscatorConfig::with_preset("low").set("identifierNamesGenerator", "mangled");
//! let result = obfuscate("function add(a, b) { return a + b; }", Some(&config)).unwrap();
//! assert_eq!(result.obfuscated_code, "function c(d,e){return d+e;}");
//! assert!(result.source_map.is_none());
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod obfuscator;
pub mod presets;

/// Flat mapping of engine option names to JSON values.
pub type OptionBag = serde_json::Map<String, serde_json::Value>;

// Re-exports
pub use config::{resolve, ObfuscatorConfig, ResolvedOptions, SOURCE_MAP_OPTION};
pub use engine::{Engine, EngineError, EngineOutput, LexicalEngine};
pub use errors::{CodeCloakError, Result};
pub use obfuscator::{obfuscate, ObfuscateResult, Obfuscator};
pub use presets::Preset;
