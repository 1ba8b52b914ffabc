//! Obfuscation entry point

use crate::config::{resolve, ObfuscatorConfig};
use crate::engine::{Engine, LexicalEngine};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of one obfuscation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObfuscateResult {
    pub obfuscated_code: String,
    /// Always `None`: source maps are switched off before the engine runs.
    pub source_map: Option<String>,
}

/// Resolves configuration and runs an [`Engine`] over source text.
///
/// Holds nothing but the engine: every call stands on its own.
pub struct Obfuscator<E: Engine = LexicalEngine> {
    engine: E,
}

impl Default for Obfuscator {
    fn default() -> Self {
        Self::new()
    }
}

impl Obfuscator {
    pub fn new() -> Self {
        Self::with_engine(LexicalEngine::new())
    }
}

impl<E: Engine> Obfuscator<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Obfuscate `code` with the preset and overrides in `config`.
    ///
    /// `sourceMap` is forced off after the overrides are applied, so no
    /// mapping back to the original source ever leaves this call.
    pub fn obfuscate(
        &self,
        code: &str,
        config: Option<&ObfuscatorConfig>,
    ) -> Result<ObfuscateResult> {
        let options = resolve(config)?.without_source_map();
        debug!(options = options.len(), input_bytes = code.len(), "invoking engine");

        let output = self.engine.transform(code, &options)?;

        let source_map = match output.source_map {
            Some(map) if !map.is_empty() => {
                warn!("engine returned a source map although sourceMap was disabled");
                Some(map)
            }
            _ => None,
        };

        Ok(ObfuscateResult {
            obfuscated_code: output.code,
            source_map,
        })
    }
}

/// Obfuscate with the built-in engine.
pub fn obfuscate(code: &str, config: Option<&ObfuscatorConfig>) -> Result<ObfuscateResult> {
    Obfuscator::new().obfuscate(code, config)
}
