//! Transformation engine boundary and the built-in lexical engine
//!
//! [`Engine`] is the seam the obfuscator calls through. [`LexicalEngine`] is
//! the default implementation: it tokenizes the program, resolves every
//! identifier to the scope that declares it, and rewrites the token stream
//! (renaming, string array, numeric expressions, protection prologue)
//! without building a syntax tree.

mod emit;
pub mod lexer;
mod names;
mod numbers;
mod prologue;
mod rename;
mod rewrite;
mod scope;
mod settings;
mod sourcemap;
mod strings;
mod syntax;

pub use settings::{
    EngineSettings, IdentifierNamesGenerator, IndexesType, StringEncoding, WrappersType,
};

use crate::ResolvedOptions;
use names::NameGenerator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The source text is not a program the engine can read.
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("invalid value for option '{name}': expected {expected}")]
    InvalidOption { name: String, expected: String },
}

/// What an engine hands back for one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub code: String,
    /// Source Map v3 document, when the `sourceMap` option asked for one.
    pub source_map: Option<String>,
}

pub trait Engine: Send + Sync {
    fn transform(&self, source: &str, options: &ResolvedOptions)
        -> Result<EngineOutput, EngineError>;
}

/// Token-level JavaScript rewriter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalEngine;

impl LexicalEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for LexicalEngine {
    fn transform(
        &self,
        source: &str,
        options: &ResolvedOptions,
    ) -> Result<EngineOutput, EngineError> {
        let settings = EngineSettings::from_options(options)?;
        let mut rng = if settings.seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(settings.seed)
        };

        let lexed = lexer::tokenize(source)?;
        let matches = syntax::check(&lexed.tokens)?;

        if lexed.tokens.is_empty() {
            return Ok(EngineOutput {
                code: lexed.hashbang.unwrap_or_default(),
                source_map: None,
            });
        }

        let analysis = scope::analyze(&lexed.tokens, &matches);

        let mut taken = analysis.identifiers.clone();
        taken.extend(scope::PRESERVED_NAMES.iter().map(|n| n.to_string()));
        let mut names = NameGenerator::new(
            settings.identifier_names_generator,
            &settings.identifiers_prefix,
            &settings.identifiers_dictionary,
            taken,
            &mut rng,
        );

        let renames = rename::plan(&analysis, &settings, &mut names, &mut rng);
        let pieces = rewrite::rewrite(
            &lexed.tokens,
            &matches,
            &analysis,
            &renames,
            &settings,
            &mut names,
            &mut rng,
        );
        let emitted = emit::emit(lexed.hashbang.as_deref(), &pieces, settings.compact);

        let source_map = settings
            .source_map
            .then(|| sourcemap::build(&emitted.mappings, source, &settings));

        if settings.log {
            info!(
                tokens = lexed.tokens.len(),
                renamed = renames.len(),
                input_bytes = source.len(),
                output_bytes = emitted.code.len(),
                "obfuscation finished"
            );
        } else {
            debug!(
                tokens = lexed.tokens.len(),
                renamed = renames.len(),
                "obfuscation finished"
            );
        }

        Ok(EngineOutput {
            code: emitted.code,
            source_map,
        })
    }
}
