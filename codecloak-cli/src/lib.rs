//! Command line front end for CodeCloak
//!
//! Finds JavaScript files, obfuscates them concurrently with the core
//! library and writes the results according to an output policy.

pub mod batch;
pub mod cli;
pub mod discovery;
pub mod logger;
pub mod metrics;
pub mod output;
pub mod settings;
