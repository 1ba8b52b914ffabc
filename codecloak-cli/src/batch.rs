//! Concurrent obfuscation of many files
//!
//! Files are read and written with `tokio::fs`; the obfuscation itself runs on
//! the blocking pool. At most `concurrency` files are in flight and outcomes
//! are delivered in input order. One failing file never stops the batch.

use codecloak_core::{CodeCloakError, ObfuscatorConfig, Obfuscator};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Obfuscate {
        path: PathBuf,
        #[source]
        source: CodeCloakError,
    },

    #[error("worker for {path} stopped: {message}")]
    Worker { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub bytes_read: usize,
    pub bytes_written: usize,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<FileStats, FileError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }
}

/// Obfuscate every `(input, output)` pair, calling `on_outcome` as each one
/// completes.
pub async fn run<F>(
    obfuscator: Arc<Obfuscator>,
    config: Arc<ObfuscatorConfig>,
    jobs: Vec<(PathBuf, PathBuf)>,
    concurrency: usize,
    mut on_outcome: F,
) -> BatchReport
where
    F: FnMut(&FileOutcome),
{
    let mut report = BatchReport::default();
    let mut outcomes = stream::iter(jobs)
        .map(|(input, output)| {
            let obfuscator = Arc::clone(&obfuscator);
            let config = Arc::clone(&config);
            async move {
                let result = process_file(obfuscator, config, &input, &output).await;
                FileOutcome {
                    input,
                    output,
                    result,
                }
            }
        })
        .buffered(concurrency.max(1));

    while let Some(outcome) = outcomes.next().await {
        match &outcome.result {
            Ok(stats) => debug!(
                input = %outcome.input.display(),
                output = %outcome.output.display(),
                bytes_read = stats.bytes_read,
                bytes_written = stats.bytes_written,
                "file obfuscated"
            ),
            Err(e) => warn!(input = %outcome.input.display(), "{}", e),
        }
        on_outcome(&outcome);
        report.outcomes.push(outcome);
    }
    report
}

async fn process_file(
    obfuscator: Arc<Obfuscator>,
    config: Arc<ObfuscatorConfig>,
    input: &Path,
    output: &Path,
) -> Result<FileStats, FileError> {
    let source = tokio::fs::read_to_string(input)
        .await
        .map_err(|source| FileError::Read {
            path: input.to_path_buf(),
            source,
        })?;
    let bytes_read = source.len();

    let result =
        tokio::task::spawn_blocking(move || obfuscator.obfuscate(&source, Some(config.as_ref())))
            .await
            .map_err(|e| FileError::Worker {
                path: input.to_path_buf(),
                message: e.to_string(),
            })?
            .map_err(|source| FileError::Obfuscate {
                path: input.to_path_buf(),
                source,
            })?;

    let write_error = |source| FileError::Write {
        path: output.to_path_buf(),
        source,
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(output, &result.obfuscated_code)
        .await
        .map_err(write_error)?;

    Ok(FileStats {
        bytes_read,
        bytes_written: result.obfuscated_code.len(),
    })
}
