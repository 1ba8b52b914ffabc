//! Typed view over the engine option bag

use super::names::is_valid_identifier;
use super::EngineError;
use crate::ResolvedOptions;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierNamesGenerator {
    Hexadecimal,
    Mangled,
    MangledShuffled,
    Dictionary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringEncoding {
    None,
    Base64,
    Rc4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexesType {
    HexadecimalNumber,
    HexadecimalNumericString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrappersType {
    Variable,
    Function,
}

/// Options the lexical engine implements.
const IMPLEMENTED: &[&str] = &[
    "compact",
    "deadCodeInjection",
    "deadCodeInjectionThreshold",
    "debugProtection",
    "debugProtectionInterval",
    "disableConsoleOutput",
    "forceTransformStrings",
    "identifierNamesGenerator",
    "identifiersDictionary",
    "identifiersPrefix",
    "inputFileName",
    "log",
    "numbersToExpressions",
    "reservedNames",
    "reservedStrings",
    "seed",
    "selfDefending",
    "sourceMap",
    "sourceMapFileName",
    "splitStrings",
    "splitStringsChunkLength",
    "stringArray",
    "stringArrayEncoding",
    "stringArrayIndexesType",
    "stringArrayIndexShift",
    "stringArrayRotate",
    "stringArrayShuffle",
    "stringArrayThreshold",
    "stringArrayWrappersChainedCalls",
    "stringArrayWrappersCount",
    "stringArrayWrappersParametersMaxCount",
    "stringArrayWrappersType",
    "unicodeEscapeSequence",
];

/// Options other engines understand; accepted here but without effect.
const ACCEPTED: &[&str] = &[
    "controlFlowFlattening",
    "controlFlowFlatteningThreshold",
    "domainLock",
    "domainLockRedirectUrl",
    "identifierNamesCache",
    "ignoreImports",
    "optionsPreset",
    "renameGlobals",
    "renameProperties",
    "renamePropertiesMode",
    "simplify",
    "sourceMapBaseUrl",
    "sourceMapMode",
    "sourceMapSourcesMode",
    "stringArrayCallsTransform",
    "stringArrayCallsTransformThreshold",
    "target",
    "transformObjectKeys",
];

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub compact: bool,
    pub identifier_names_generator: IdentifierNamesGenerator,
    pub identifiers_dictionary: Vec<String>,
    pub identifiers_prefix: String,
    pub reserved_names: Vec<Regex>,
    pub reserved_strings: Vec<Regex>,
    pub force_transform_strings: Vec<Regex>,
    pub numbers_to_expressions: bool,
    pub split_strings: bool,
    pub split_strings_chunk_length: usize,
    pub string_array: bool,
    pub string_array_threshold: f64,
    pub string_array_encoding: Vec<StringEncoding>,
    pub string_array_indexes_type: Vec<IndexesType>,
    pub string_array_index_shift: bool,
    pub string_array_rotate: bool,
    pub string_array_shuffle: bool,
    pub string_array_wrappers_count: usize,
    pub string_array_wrappers_chained_calls: bool,
    pub string_array_wrappers_parameters_max_count: usize,
    pub string_array_wrappers_type: WrappersType,
    pub unicode_escape_sequence: bool,
    pub dead_code_injection: bool,
    pub dead_code_injection_threshold: f64,
    pub debug_protection: bool,
    pub debug_protection_interval: u64,
    pub disable_console_output: bool,
    pub self_defending: bool,
    pub source_map: bool,
    pub source_map_file_name: Option<String>,
    pub input_file_name: Option<String>,
    pub seed: u64,
    pub log: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            compact: true,
            identifier_names_generator: IdentifierNamesGenerator::Hexadecimal,
            identifiers_dictionary: Vec::new(),
            identifiers_prefix: String::new(),
            reserved_names: Vec::new(),
            reserved_strings: Vec::new(),
            force_transform_strings: Vec::new(),
            numbers_to_expressions: false,
            split_strings: false,
            split_strings_chunk_length: 10,
            string_array: true,
            string_array_threshold: 0.75,
            string_array_encoding: vec![StringEncoding::None],
            string_array_indexes_type: vec![IndexesType::HexadecimalNumber],
            string_array_index_shift: true,
            string_array_rotate: true,
            string_array_shuffle: true,
            string_array_wrappers_count: 1,
            string_array_wrappers_chained_calls: true,
            string_array_wrappers_parameters_max_count: 2,
            string_array_wrappers_type: WrappersType::Variable,
            unicode_escape_sequence: false,
            dead_code_injection: false,
            dead_code_injection_threshold: 0.4,
            debug_protection: false,
            debug_protection_interval: 0,
            disable_console_output: false,
            self_defending: false,
            source_map: false,
            source_map_file_name: None,
            input_file_name: None,
            seed: 0,
            log: false,
        }
    }
}

impl EngineSettings {
    pub fn from_options(options: &ResolvedOptions) -> Result<Self, EngineError> {
        let read = Reader { options };
        let defaults = EngineSettings::default();

        for (key, value) in options.iter() {
            if IMPLEMENTED.contains(&key.as_str()) {
                continue;
            }
            if ACCEPTED.contains(&key.as_str()) {
                if is_enabled(value) {
                    debug!(option = %key, "option has no effect in the lexical engine");
                }
                continue;
            }
            warn!(option = %key, "ignoring unknown engine option");
        }

        let identifier_names_generator = match read.string("identifierNamesGenerator")?.as_deref()
        {
            None | Some("hexadecimal") => IdentifierNamesGenerator::Hexadecimal,
            Some("mangled") => IdentifierNamesGenerator::Mangled,
            Some("mangled-shuffled") => IdentifierNamesGenerator::MangledShuffled,
            Some("dictionary") => IdentifierNamesGenerator::Dictionary,
            Some(_) => {
                return Err(invalid(
                    "identifierNamesGenerator",
                    "one of hexadecimal, mangled, mangled-shuffled, dictionary",
                ))
            }
        };

        let identifiers_dictionary = read.string_list("identifiersDictionary")?;
        if let Some(word) = identifiers_dictionary
            .iter()
            .find(|w| !is_valid_identifier(w))
        {
            return Err(invalid(
                "identifiersDictionary",
                &format!("valid identifiers ('{}' is not)", word),
            ));
        }
        if identifier_names_generator == IdentifierNamesGenerator::Dictionary
            && identifiers_dictionary.is_empty()
        {
            return Err(invalid(
                "identifiersDictionary",
                "a non-empty list when identifierNamesGenerator is 'dictionary'",
            ));
        }

        let identifiers_prefix = read.string("identifiersPrefix")?.unwrap_or_default();
        if !identifiers_prefix.is_empty() && !is_valid_identifier(&identifiers_prefix) {
            return Err(invalid("identifiersPrefix", "a valid identifier prefix"));
        }

        let string_array_encoding = match options.get("stringArrayEncoding") {
            None => defaults.string_array_encoding.clone(),
            Some(_) => {
                let names = read.string_list("stringArrayEncoding")?;
                let mut encodings = Vec::new();
                for name in names {
                    let encoding = match name.as_str() {
                        "none" => StringEncoding::None,
                        "base64" => StringEncoding::Base64,
                        "rc4" => StringEncoding::Rc4,
                        _ => {
                            return Err(invalid(
                                "stringArrayEncoding",
                                "a list of none, base64, rc4",
                            ))
                        }
                    };
                    if !encodings.contains(&encoding) {
                        encodings.push(encoding);
                    }
                }
                if encodings.is_empty() {
                    encodings.push(StringEncoding::None);
                }
                encodings
            }
        };

        let string_array_indexes_type = match options.get("stringArrayIndexesType") {
            None => defaults.string_array_indexes_type.clone(),
            Some(_) => {
                let mut types = Vec::new();
                for name in read.string_list("stringArrayIndexesType")? {
                    let kind = match name.as_str() {
                        "hexadecimal-number" => IndexesType::HexadecimalNumber,
                        "hexadecimal-numeric-string" => IndexesType::HexadecimalNumericString,
                        _ => {
                            return Err(invalid(
                                "stringArrayIndexesType",
                                "a list of hexadecimal-number, hexadecimal-numeric-string",
                            ))
                        }
                    };
                    if !types.contains(&kind) {
                        types.push(kind);
                    }
                }
                if types.is_empty() {
                    types.push(IndexesType::HexadecimalNumber);
                }
                types
            }
        };

        let string_array_wrappers_type = match read.string("stringArrayWrappersType")?.as_deref() {
            None | Some("variable") => WrappersType::Variable,
            Some("function") => WrappersType::Function,
            Some(_) => {
                return Err(invalid(
                    "stringArrayWrappersType",
                    "either 'variable' or 'function'",
                ))
            }
        };

        let split_strings_chunk_length =
            read.count("splitStringsChunkLength", defaults.split_strings_chunk_length as u64)?;
        if split_strings_chunk_length == 0 {
            return Err(invalid("splitStringsChunkLength", "a positive integer"));
        }

        let parameters_max_count = read.count(
            "stringArrayWrappersParametersMaxCount",
            defaults.string_array_wrappers_parameters_max_count as u64,
        )?;
        if parameters_max_count < 2 {
            return Err(invalid(
                "stringArrayWrappersParametersMaxCount",
                "an integer of at least 2",
            ));
        }

        let seed = match options.get("seed") {
            Some(Value::String(s)) => s.parse::<u64>().unwrap_or_else(|_| hash_seed(s)),
            _ => read.count("seed", 0)?,
        };

        Ok(Self {
            compact: read.bool("compact", defaults.compact)?,
            identifier_names_generator,
            identifiers_dictionary,
            identifiers_prefix,
            reserved_names: read.patterns("reservedNames")?,
            reserved_strings: read.patterns("reservedStrings")?,
            force_transform_strings: read.patterns("forceTransformStrings")?,
            numbers_to_expressions: read
                .bool("numbersToExpressions", defaults.numbers_to_expressions)?,
            split_strings: read.bool("splitStrings", defaults.split_strings)?,
            split_strings_chunk_length: split_strings_chunk_length as usize,
            string_array: read.bool("stringArray", defaults.string_array)?,
            string_array_threshold: read
                .ratio("stringArrayThreshold", defaults.string_array_threshold)?,
            string_array_encoding,
            string_array_indexes_type,
            string_array_index_shift: read
                .bool("stringArrayIndexShift", defaults.string_array_index_shift)?,
            string_array_rotate: read.bool("stringArrayRotate", defaults.string_array_rotate)?,
            string_array_shuffle: read.bool("stringArrayShuffle", defaults.string_array_shuffle)?,
            string_array_wrappers_count: read.count(
                "stringArrayWrappersCount",
                defaults.string_array_wrappers_count as u64,
            )? as usize,
            string_array_wrappers_chained_calls: read.bool(
                "stringArrayWrappersChainedCalls",
                defaults.string_array_wrappers_chained_calls,
            )?,
            string_array_wrappers_parameters_max_count: parameters_max_count as usize,
            string_array_wrappers_type,
            unicode_escape_sequence: read
                .bool("unicodeEscapeSequence", defaults.unicode_escape_sequence)?,
            dead_code_injection: read.bool("deadCodeInjection", defaults.dead_code_injection)?,
            dead_code_injection_threshold: read.ratio(
                "deadCodeInjectionThreshold",
                defaults.dead_code_injection_threshold,
            )?,
            debug_protection: read.bool("debugProtection", defaults.debug_protection)?,
            debug_protection_interval: read
                .count("debugProtectionInterval", defaults.debug_protection_interval)?,
            disable_console_output: read
                .bool("disableConsoleOutput", defaults.disable_console_output)?,
            self_defending: read.bool("selfDefending", defaults.self_defending)?,
            source_map: read.bool("sourceMap", defaults.source_map)?,
            source_map_file_name: read.string("sourceMapFileName")?,
            input_file_name: read.string("inputFileName")?,
            seed,
            log: read.bool("log", defaults.log)?,
        })
    }
}

fn invalid(name: &str, expected: &str) -> EngineError {
    EngineError::InvalidOption {
        name: name.to_string(),
        expected: expected.to_string(),
    }
}

fn is_enabled(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

/// FNV-1a, so textual seeds stay stable across runs and platforms.
fn hash_seed(text: &str) -> u64 {
    text.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

struct Reader<'a> {
    options: &'a ResolvedOptions,
}

impl Reader<'_> {
    fn bool(&self, name: &str, default: bool) -> Result<bool, EngineError> {
        match self.options.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(invalid(name, "a boolean")),
        }
    }

    fn ratio(&self, name: &str, default: f64) -> Result<f64, EngineError> {
        match self.options.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if (0.0..=1.0).contains(&v) => Ok(v),
                _ => Err(invalid(name, "a number between 0 and 1")),
            },
            Some(_) => Err(invalid(name, "a number between 0 and 1")),
        }
    }

    fn count(&self, name: &str, default: u64) -> Result<u64, EngineError> {
        match self.options.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
                .ok_or_else(|| invalid(name, "a non-negative integer")),
            Some(_) => Err(invalid(name, "a non-negative integer")),
        }
    }

    fn string(&self, name: &str) -> Result<Option<String>, EngineError> {
        match self.options.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(name, "a string")),
        }
    }

    fn string_list(&self, name: &str) -> Result<Vec<String>, EngineError> {
        match self.options.get(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(invalid(name, "a list of strings")),
                })
                .collect(),
            Some(_) => Err(invalid(name, "a list of strings")),
        }
    }

    fn patterns(&self, name: &str) -> Result<Vec<Regex>, EngineError> {
        self.string_list(name)?
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    invalid(name, &format!("a list of regular expressions ({})", e))
                })
            })
            .collect()
    }
}
