//! The in-memory naming tree (spec §3/§4.F): an n-ary tree of
//! [`PathNode`]s rooted at the directory tree's root. Directories carry a
//! child map; file-leaves carry the [`ServerStubs`] that owns their bytes.
//! Modeling the two kinds as enum variants makes the spec's invariant —
//! "directories MUST NOT carry an owner; file-leaves MUST NOT have
//! children" — true by construction rather than by convention.

use std::collections::HashMap;

use crate::error::{DfsError, Result};
use crate::naming::registry::ServerStubs;
use crate::path::Path;

/// One node of the naming tree.
#[derive(Debug)]
pub enum PathNode {
    Directory { children: HashMap<String, PathNode> },
    File { owner: ServerStubs },
}

impl PathNode {
    fn new_directory() -> Self {
        PathNode::Directory { children: HashMap::new() }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, PathNode::Directory { .. })
    }
}

/// What happened when [`Tree::try_insert_file`] attempted to place a file
/// at a given path — used by the registration merge algorithm (spec
/// §4.H) to distinguish "already registered by someone else" from "path is
/// blocked by an incompatible node".
pub enum InsertOutcome {
    Inserted,
    /// The exact target path already exists as a file-leaf.
    AlreadyFile,
    /// The target path, or one of its ancestors, is blocked by an
    /// incompatible existing node (a directory at the target, or a
    /// file-leaf where a directory is needed along the way).
    Blocked,
}

/// The naming tree: a single root directory plus every node reachable
/// under it.
#[derive(Debug)]
pub struct Tree {
    root: PathNode,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self { root: PathNode::new_directory() }
    }

    /// Traverses to the node at `path`. Fails with [`DfsError::NotFound`]
    /// if any component along the way is missing.
    pub fn get(&self, path: &Path) -> Result<&PathNode> {
        let mut node = &self.root;
        for component in path.iter() {
            let PathNode::Directory { children } = node else {
                return Err(not_found(path));
            };
            node = children.get(component).ok_or_else(|| not_found(path))?;
        }
        Ok(node)
    }

    /// True iff a node exists at `path`.
    pub fn exists(&self, path: &Path) -> bool {
        self.get(path).is_ok()
    }

    /// True iff the node at `path` is a directory. Fails with
    /// [`DfsError::NotFound`] if `path` does not exist.
    pub fn is_directory(&self, path: &Path) -> Result<bool> {
        Ok(self.get(path)?.is_directory())
    }

    /// The child names of the directory at `path`, in unspecified order.
    /// Fails with [`DfsError::NotFound`] if `path` is not an existing
    /// directory.
    pub fn list(&self, path: &Path) -> Result<Vec<String>> {
        match self.get(path)? {
            PathNode::Directory { children } => Ok(children.keys().cloned().collect()),
            PathNode::File { .. } => Err(not_found(path)),
        }
    }

    /// The owner of the file-leaf at `path`. Fails with
    /// [`DfsError::NotFound`] if `path` is missing or names a directory.
    pub fn owner_of(&self, path: &Path) -> Result<ServerStubs> {
        match self.get(path)? {
            PathNode::File { owner } => Ok(owner.clone()),
            PathNode::Directory { .. } => Err(not_found(path)),
        }
    }

    /// Inserts an empty directory at `path`, creating no ancestors (the
    /// caller — [`crate::naming::service::NamingService::create_directory`]
    /// — has already checked the parent exists). Returns `false` if a node
    /// already exists at `path`.
    pub fn insert_directory(&mut self, path: &Path) -> Result<bool> {
        let parent_path = path.parent()?;
        let name = path.last()?.to_string();
        let parent = self.directory_mut(&parent_path)?;
        if parent.contains_key(&name) {
            return Ok(false);
        }
        parent.insert(name, PathNode::new_directory());
        Ok(true)
    }

    /// Inserts a file-leaf owned by `owner` at `path` (caller has already
    /// checked the parent exists and `path` is free). Returns `false` if a
    /// node already exists at `path`.
    pub fn insert_file(&mut self, path: &Path, owner: ServerStubs) -> Result<bool> {
        let parent_path = path.parent()?;
        let name = path.last()?.to_string();
        let parent = self.directory_mut(&parent_path)?;
        if parent.contains_key(&name) {
            return Ok(false);
        }
        parent.insert(name, PathNode::File { owner });
        Ok(true)
    }

    /// Registration's merge step (spec §4.H): attempts to place a file
    /// owned by `owner` at `path`, creating missing intermediate
    /// directories along the way.
    pub fn try_insert_file(&mut self, path: &Path, owner: ServerStubs) -> InsertOutcome {
        if path.is_root() {
            return InsertOutcome::Blocked;
        }
        let mut node = &mut self.root;
        let components: Vec<&str> = path.iter().collect();
        for component in &components[..components.len() - 1] {
            let PathNode::Directory { children } = node else {
                return InsertOutcome::Blocked;
            };
            node = children
                .entry(component.to_string())
                .or_insert_with(PathNode::new_directory);
        }
        let PathNode::Directory { children } = node else {
            return InsertOutcome::Blocked;
        };
        let last = components[components.len() - 1];
        match children.get(last) {
            None => {
                children.insert(last.to_string(), PathNode::File { owner });
                InsertOutcome::Inserted
            }
            Some(PathNode::File { .. }) => InsertOutcome::AlreadyFile,
            Some(PathNode::Directory { .. }) => InsertOutcome::Blocked,
        }
    }

    /// Every `(path, owner)` pair for file-leaves at or under `path`
    /// (`path` itself, if it is a file-leaf). Fails with
    /// [`DfsError::NotFound`] if `path` does not exist.
    pub fn file_leaves_in_subtree(&self, path: &Path) -> Result<Vec<(Path, ServerStubs)>> {
        let node = self.get(path)?;
        let mut out = Vec::new();
        collect_leaves(node, path, &mut out);
        Ok(out)
    }

    /// Detaches the node at `path` from its parent. Fails with
    /// [`DfsError::NotFound`] if `path` does not exist; fails with
    /// [`DfsError::IllegalArgument`] for the root, which has no parent to
    /// detach from.
    pub fn remove(&mut self, path: &Path) -> Result<PathNode> {
        let parent_path = path.parent()?;
        let name = path.last()?.to_string();
        let parent = self.directory_mut(&parent_path)?;
        parent.remove(&name).ok_or_else(|| not_found(path))
    }

    fn directory_mut(&mut self, path: &Path) -> Result<&mut HashMap<String, PathNode>> {
        let mut node = &mut self.root;
        for component in path.iter() {
            let PathNode::Directory { children } = node else {
                return Err(not_found(path));
            };
            node = children.get_mut(component).ok_or_else(|| not_found(path))?;
        }
        match node {
            PathNode::Directory { children } => Ok(children),
            PathNode::File { .. } => Err(not_found(path)),
        }
    }
}

fn collect_leaves(node: &PathNode, path: &Path, out: &mut Vec<(Path, ServerStubs)>) {
    match node {
        PathNode::File { owner } => out.push((path.clone(), owner.clone())),
        PathNode::Directory { children } => {
            for (name, child) in children {
                let child_path = Path::with_component(path, name).expect("valid child name");
                collect_leaves(child, &child_path, out);
            }
        }
    }
}

fn not_found(path: &Path) -> DfsError {
    DfsError::NotFound(format!("{path} does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use crate::rpc::stub::RemoteRef;

    fn owner(port: u16) -> ServerStubs {
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        ServerStubs::new(RemoteRef::new(addr, "StorageData"), RemoteRef::new(addr, "StorageCommand"))
    }

    #[test]
    fn root_is_an_empty_directory() {
        let tree = Tree::new();
        assert!(tree.is_directory(&Path::root()).unwrap());
        assert!(tree.list(&Path::root()).unwrap().is_empty());
    }

    #[test]
    fn missing_component_is_not_found() {
        let tree = Tree::new();
        assert!(matches!(tree.is_directory(&Path::new("/x").unwrap()), Err(DfsError::NotFound(_))));
    }

    #[test]
    fn insert_directory_then_file_and_list() {
        let mut tree = Tree::new();
        assert!(tree.insert_directory(&Path::new("/x").unwrap()).unwrap());
        assert!(tree.insert_file(&Path::new("/x/y.txt").unwrap(), owner(1)).unwrap());

        assert!(tree.is_directory(&Path::new("/x").unwrap()).unwrap());
        assert!(!tree.is_directory(&Path::new("/x/y.txt").unwrap()).unwrap());
        assert_eq!(tree.list(&Path::new("/x").unwrap()).unwrap(), vec!["y.txt".to_string()]);
    }

    #[test]
    fn insert_over_existing_returns_false() {
        let mut tree = Tree::new();
        let p = Path::new("/x").unwrap();
        assert!(tree.insert_directory(&p).unwrap());
        assert!(!tree.insert_directory(&p).unwrap());
    }

    #[test]
    fn try_insert_file_creates_ancestors() {
        let mut tree = Tree::new();
        let path = Path::new("/a/b/c.txt").unwrap();
        assert!(matches!(tree.try_insert_file(&path, owner(1)), InsertOutcome::Inserted));
        assert!(tree.is_directory(&Path::new("/a").unwrap()).unwrap());
        assert!(tree.is_directory(&Path::new("/a/b").unwrap()).unwrap());
        assert_eq!(tree.owner_of(&path).unwrap(), owner(1));
    }

    #[test]
    fn try_insert_file_already_file_is_reported_as_duplicate() {
        let mut tree = Tree::new();
        let path = Path::new("/a.txt").unwrap();
        assert!(matches!(tree.try_insert_file(&path, owner(1)), InsertOutcome::Inserted));
        assert!(matches!(tree.try_insert_file(&path, owner(2)), InsertOutcome::AlreadyFile));
        // First-registered-wins.
        assert_eq!(tree.owner_of(&path).unwrap(), owner(1));
    }

    #[test]
    fn try_insert_file_blocked_by_directory_at_target() {
        let mut tree = Tree::new();
        let path = Path::new("/a").unwrap();
        assert!(tree.insert_directory(&path).unwrap());
        assert!(matches!(tree.try_insert_file(&path, owner(1)), InsertOutcome::Blocked));
    }

    #[test]
    fn remove_detaches_and_prevents_further_traversal() {
        let mut tree = Tree::new();
        let path = Path::new("/a/b.txt").unwrap();
        tree.try_insert_file(&path, owner(1));
        tree.remove(&path).unwrap();
        assert!(matches!(tree.get(&path), Err(DfsError::NotFound(_))));
        // Parent directory remains.
        assert!(tree.is_directory(&Path::new("/a").unwrap()).unwrap());
    }

    #[test]
    fn file_leaves_in_subtree_collects_every_owner() {
        let mut tree = Tree::new();
        tree.try_insert_file(&Path::new("/d/e/f.txt").unwrap(), owner(1));
        tree.try_insert_file(&Path::new("/d/e/g.txt").unwrap(), owner(2));

        let mut leaves = tree.file_leaves_in_subtree(&Path::new("/d").unwrap()).unwrap();
        leaves.sort_by_key(|(p, _)| p.to_string());
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].0.to_string(), "/d/e/f.txt");
        assert_eq!(leaves[0].1, owner(1));
        assert_eq!(leaves[1].0.to_string(), "/d/e/g.txt");
        assert_eq!(leaves[1].1, owner(2));
    }
}
