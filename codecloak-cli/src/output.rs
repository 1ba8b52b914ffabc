//! Where obfuscated files are written

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const GENERATED_SUFFIX: &str = "obfuscated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Overwrite every input.
    InPlace,
    /// Mirror inputs under a directory, keeping their path below the
    /// working directory.
    Directory(PathBuf),
    /// Single input written to an explicit path.
    File(PathBuf),
    /// `name.js` becomes `name.obfuscated.js` next to the input.
    Sibling,
}

impl OutputPolicy {
    /// `output` counts as a directory when it already is one, ends with a
    /// path separator, or several inputs have to go somewhere.
    pub fn choose(output: Option<&Path>, in_place: bool, inputs: usize) -> Self {
        if in_place {
            return OutputPolicy::InPlace;
        }
        match output {
            None => OutputPolicy::Sibling,
            Some(path) if path.is_dir() || has_trailing_separator(path) || inputs > 1 => {
                OutputPolicy::Directory(path.to_path_buf())
            }
            Some(path) => OutputPolicy::File(path.to_path_buf()),
        }
    }

    pub fn target(&self, input: &Path, cwd: &Path) -> PathBuf {
        match self {
            OutputPolicy::InPlace => input.to_path_buf(),
            OutputPolicy::File(path) => path.clone(),
            OutputPolicy::Sibling => sibling_path(input),
            OutputPolicy::Directory(dir) => match input.strip_prefix(cwd) {
                Ok(relative) => dir.join(relative),
                Err(_) => dir.join(input.file_name().unwrap_or(input.as_os_str())),
            },
        }
    }
}

fn has_trailing_separator(path: &Path) -> bool {
    let text = path.to_string_lossy();
    text.ends_with('/') || text.ends_with(std::path::MAIN_SEPARATOR)
}

/// `dir/app.min.js` becomes `dir/app.min.obfuscated.js`.
pub fn sibling_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    let mut name = OsString::from(stem);
    name.push(".");
    name.push(GENERATED_SUFFIX);
    if let Some(extension) = input.extension() {
        name.push(".");
        name.push(extension);
    }
    input.with_file_name(name)
}
