//! Immutable forward-slash path values used throughout the naming and
//! storage protocol.
//!
//! A [`Path`] is an ordered sequence of non-empty components; the root is
//! the empty sequence and renders as `"/"`. Components may not contain `/`
//! or `:`. See spec §3/§4.A.

use std::fmt;
use std::fs;
use std::path::{Path as StdPath, PathBuf};

use crate::error::{DfsError, Result};

/// A forward-slash-delimited path inside the distributed filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// Parses a path from its string form. Fails if `s` is empty, does not
    /// start with `/`, or contains `:`. Empty components between slashes
    /// are dropped (so `/a//b/` parses the same as `/a/b`).
    pub fn new(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(DfsError::IllegalArgument("path string is empty".into()));
        }
        if !s.starts_with('/') {
            return Err(DfsError::IllegalArgument(format!(
                "path string must start with '/': {s:?}"
            )));
        }
        if s.contains(':') {
            return Err(DfsError::IllegalArgument(format!(
                "path string must not contain ':': {s:?}"
            )));
        }
        let components =
            s.split('/').filter(|c| !c.is_empty()).map(str::to_owned).collect();
        Ok(Self { components })
    }

    /// Root path: the empty component sequence.
    pub fn root() -> Self {
        Self { components: Vec::new() }
    }

    /// Builds `parent/component`. Fails if `component` is empty or contains
    /// `/` or `:`.
    pub fn with_component(parent: &Path, component: &str) -> Result<Self> {
        if component.is_empty() {
            return Err(DfsError::IllegalArgument("component is empty".into()));
        }
        if component.contains('/') || component.contains(':') {
            return Err(DfsError::IllegalArgument(format!(
                "component must not contain '/' or ':': {component:?}"
            )));
        }
        let mut components = parent.components.clone();
        components.push(component.to_owned());
        Ok(Self { components })
    }

    /// Iterates over the components in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// True if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The parent path. Fails for the root.
    pub fn parent(&self) -> Result<Path> {
        if self.is_root() {
            return Err(DfsError::IllegalArgument("root has no parent".into()));
        }
        let components = self.components[..self.components.len() - 1].to_vec();
        Ok(Path { components })
    }

    /// The last component. Fails for the root.
    pub fn last(&self) -> Result<&str> {
        self.components.last().map(String::as_str).ok_or_else(|| {
            DfsError::IllegalArgument("root has no last component".into())
        })
    }

    /// True iff `other`'s component sequence is a prefix of this path's
    /// component sequence. This mandates component-prefix semantics (spec
    /// §9 open question), not the source's buggy string-prefix check: under
    /// string-prefix, `/ab` would wrongly be reported as a subpath of `/a`.
    pub fn is_subpath(&self, other: &Path) -> bool {
        other.components.len() <= self.components.len()
            && self.components[..other.components.len()] == other.components[..]
    }

    /// Materializes this path under a local filesystem root.
    pub fn to_file(&self, root: &StdPath) -> PathBuf {
        let mut buf = root.to_path_buf();
        for component in &self.components {
            buf.push(component);
        }
        buf
    }

    /// Enumerates every *file* (not directory) under `directory` on the
    /// local filesystem, returning one [`Path`] per file, relative to
    /// `directory`. Fails with [`DfsError::NotFound`] if `directory` does
    /// not exist, and with [`DfsError::IllegalArgument`] if it exists but is
    /// not a directory.
    pub fn list(directory: &StdPath) -> Result<Vec<Path>> {
        let metadata = fs::metadata(directory).map_err(|_| {
            DfsError::NotFound(format!("{} does not exist", directory.display()))
        })?;
        if !metadata.is_dir() {
            return Err(DfsError::IllegalArgument(format!(
                "{} is not a directory",
                directory.display()
            )));
        }
        let mut out = Vec::new();
        walk(directory, directory, &mut out)?;
        Ok(out)
    }
}

fn walk(root: &StdPath, dir: &StdPath, out: &mut Vec<Path>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let entry_path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &entry_path, out)?;
        } else {
            let relative = entry_path.strip_prefix(root).expect("entry under root");
            let components: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(Path { components });
        }
    }
    Ok(())
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Path {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        Path::new(s)
    }
}
