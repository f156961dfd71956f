//! File-system access rooted at the scripts directory.
//!
//! Every path handed to [`ScriptFs`] is relative to the root, e.g.
//! `cascadingerrors/post.txt`.  Absolute paths and `..` components are
//! refused so an HTTP caller cannot read outside the root.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Read-only view of the scripts directory.
pub trait ScriptFs: Send + Sync {
    fn read_to_string(&self, path: &str) -> io::Result<String>;

    /// Entry names (not paths) of a directory, sorted.
    fn list_dir(&self, path: &str) -> io::Result<Vec<String>>;

    fn exists(&self, path: &str) -> bool;

    fn is_dir(&self, path: &str) -> bool;
}

/// [`ScriptFs`] over the local disk.
#[derive(Debug, Clone)]
pub struct DiskScripts {
    root: PathBuf,
}

impl DiskScripts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `rel` onto the root, refusing anything that escapes it.
    pub fn resolve(&self, rel: &str) -> io::Result<PathBuf> {
        let rel = Path::new(rel.trim_start_matches("./"));
        for comp in rel.components() {
            match comp {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("{} is outside the scripts root", rel.display()),
                    ))
                }
            }
        }
        Ok(self.root.join(rel))
    }
}

impl ScriptFs for DiskScripts {
    fn read_to_string(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path)?)
    }

    fn list_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.resolve(path)?)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_dir()).unwrap_or(false)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
