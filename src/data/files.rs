use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::MailbatchError;

/// Input files available to a run, keyed by file name.
///
/// Iteration is lexicographic by file name, which gives shared attachments a
/// stable order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileCollection {
    files: BTreeMap<String, PathBuf>,
}

impl FileCollection {
    /// Collect every regular file directly inside `dir`. Subdirectories are ignored.
    pub fn from_dir(dir: &Path) -> crate::Result<Self> {
        let io_err = |source| MailbatchError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = BTreeMap::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                let absolute = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
                files.insert(name.to_string(), absolute);
            }
        }
        tracing::debug!(dir = %dir.display(), count = files.len(), "collected input files");
        Ok(Self { files })
    }

    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let files = paths
            .into_iter()
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_string();
                Some((name, p))
            })
            .collect();
        Self { files }
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.files.iter().map(|(n, p)| (n.as_str(), p.as_path()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// `true` when `name` carries one of `allowed` extensions (case-insensitive,
/// leading dots ignored). An empty allow-list permits everything.
pub fn has_allowed_extension(name: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) else {
        return false;
    };
    allowed
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
