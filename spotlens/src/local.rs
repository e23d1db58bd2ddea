//! Local-folder mode
//!
//! A sample loaded from a directory on disk resolves its relative resource
//! URLs against that directory, producing `file://` URLs the fetcher reads
//! directly.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Directory a sample's relative URLs are resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    /// Attach `path`, which must be an existing directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let root = path
            .canonicalize()
            .map_err(|err| Error::LocalDirectoryUnavailable(format!("{}: {err}", path.display())))?;
        if !root.is_dir() {
            return Err(Error::LocalDirectoryUnavailable(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rewrite `url` to a `file://` URL under the root
    ///
    /// Absolute URLs (anything with a scheme) are returned unchanged.
    pub fn resolve(&self, url: &str) -> Result<String> {
        if url::Url::parse(url).is_ok() {
            return Ok(url.to_string());
        }
        let relative = url.trim_start_matches("./").trim_start_matches('/');
        let path = self.root.join(relative);
        url::Url::from_file_path(&path)
            .map(String::from)
            .map_err(|()| Error::LocalDirectoryUnavailable(format!("{} is not absolute", path.display())))
    }
}

/// Resolve `url` through `directory` when one is attached
pub(crate) fn resolve_url(directory: Option<&LocalDirectory>, url: &str) -> Result<String> {
    match directory {
        Some(directory) => directory.resolve(url),
        None => Ok(url.to_string()),
    }
}
