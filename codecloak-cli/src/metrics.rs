use crate::batch::FileOutcome;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Batch counters, exported in the Prometheus text format.
pub struct Metrics {
    registry: Registry,
    pub files_obfuscated: IntCounter,
    pub files_failed: IntCounter,
    pub bytes_read: IntCounter,
    pub bytes_written: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let files_obfuscated =
            IntCounter::new("codecloak_files_obfuscated_total", "Files obfuscated and written")?;
        registry.register(Box::new(files_obfuscated.clone()))?;

        let files_failed = IntCounter::new("codecloak_files_failed_total", "Files that failed")?;
        registry.register(Box::new(files_failed.clone()))?;

        let bytes_read = IntCounter::new("codecloak_bytes_read_total", "Source bytes read")?;
        registry.register(Box::new(bytes_read.clone()))?;

        let bytes_written =
            IntCounter::new("codecloak_bytes_written_total", "Obfuscated bytes written")?;
        registry.register(Box::new(bytes_written.clone()))?;

        Ok(Self {
            registry,
            files_obfuscated,
            files_failed,
            bytes_read,
            bytes_written,
        })
    }

    pub fn record(&self, outcome: &FileOutcome) {
        match &outcome.result {
            Ok(stats) => {
                self.files_obfuscated.inc();
                self.bytes_read.inc_by(stats.bytes_read as u64);
                self.bytes_written.inc_by(stats.bytes_written as u64);
            }
            Err(_) => self.files_failed.inc(),
        }
    }

    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{FileError, FileStats};
    use std::path::PathBuf;

    #[test]
    fn records_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record(&FileOutcome {
            input: PathBuf::from("a.js"),
            output: PathBuf::from("a.obfuscated.js"),
            result: Ok(FileStats {
                bytes_read: 10,
                bytes_written: 42,
            }),
        });
        metrics.record(&FileOutcome {
            input: PathBuf::from("b.js"),
            output: PathBuf::from("b.obfuscated.js"),
            result: Err(FileError::Read {
                path: PathBuf::from("b.js"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        });

        assert_eq!(metrics.files_obfuscated.get(), 1);
        assert_eq!(metrics.files_failed.get(), 1);
        let text = metrics.render().unwrap();
        assert!(text.contains("codecloak_bytes_written_total 42"));
        assert!(text.contains("codecloak_bytes_read_total 10"));
    }
}
