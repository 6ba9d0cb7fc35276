//! The naming service (spec §4.G): `isDirectory`, `list`, `createFile`,
//! `createDirectory`, `delete`, `getStorage`. All six traverse the shared
//! [`NamingState`](crate::naming::NamingState) tree; `createFile` and
//! `delete` additionally command a storage server through its command
//! stub.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{DfsError, Result};
use crate::naming::SharedNamingState;
use crate::path::Path;
use crate::rpc::skeleton::{Dispatch, Dispatched};
use crate::rpc::stub::{invoke, RemoteRef};
use crate::rpc::wire;
use crate::storage::service::StorageCommandStub;

/// The naming service's typed interface. Readers (`is_directory`, `list`,
/// `get_storage`) may run concurrently with each other; writers
/// (`create_file`, `create_directory`, `delete`) are serialized against
/// both readers and each other (spec §5) by the underlying
/// [`tokio::sync::RwLock`].
#[async_trait]
pub trait NamingService: Send + Sync {
    async fn is_directory(&self, path: &Path) -> Result<bool>;
    async fn list(&self, path: &Path) -> Result<Vec<String>>;
    async fn create_file(&self, path: &Path) -> Result<bool>;
    async fn create_directory(&self, path: &Path) -> Result<bool>;
    async fn delete(&self, path: &Path) -> Result<bool>;
    async fn get_storage(&self, path: &Path) -> Result<RemoteRef>;
}

/// The concrete naming service, backed by the shared tree+registry lock.
pub struct NamingServiceImpl {
    state: SharedNamingState,
}

impl NamingServiceImpl {
    pub fn new(state: SharedNamingState) -> Self {
        Self { state }
    }

    /// Fails with [`DfsError::NotFound`] unless `parent` both exists and is
    /// a directory — the shared precondition for `createFile` and
    /// `createDirectory` (spec §4.G).
    fn require_existing_directory(
        state: &crate::naming::NamingState,
        parent: &Path,
    ) -> Result<()> {
        if state.tree.is_directory(parent)? {
            Ok(())
        } else {
            Err(DfsError::NotFound(format!("{parent} is not a directory")))
        }
    }
}

#[async_trait]
impl NamingService for NamingServiceImpl {
    async fn is_directory(&self, path: &Path) -> Result<bool> {
        let state = self.state.read().await;
        state.tree.is_directory(path)
    }

    async fn list(&self, path: &Path) -> Result<Vec<String>> {
        let state = self.state.read().await;
        state.tree.list(path)
    }

    async fn create_file(&self, path: &Path) -> Result<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let parent = path.parent()?;

        let owner = {
            let mut state = self.state.write().await;
            Self::require_existing_directory(&state, &parent)?;
            if state.tree.exists(path) {
                return Ok(false);
            }
            let owner = state
                .registry
                .pick_for_placement()
                .ok_or_else(|| DfsError::IllegalState("no storage servers registered".into()))?;
            // Publish ownership only after the remote create succeeds, so a
            // failed command never leaves a file-leaf with no backing file.
            owner
        };

        let command = StorageCommandStub::new(owner.command);
        command.create(path).await?;

        // The write lock was dropped while `create` ran unlocked, so
        // another `create_file(path)` may have raced us and won between
        // the check above and this insert. Only the winner may report
        // `true`; the loser must not leave the file it just created on
        // `owner` untracked by the tree.
        let inserted = {
            let mut state = self.state.write().await;
            state.tree.insert_file(path, owner.clone())?
        };
        if !inserted {
            tracing::warn!(%path, owner = %owner.command, "lost create_file race, deleting orphaned remote copy");
            command.delete(path).await?;
        }
        Ok(inserted)
    }

    async fn create_directory(&self, path: &Path) -> Result<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let parent = path.parent()?;
        let mut state = self.state.write().await;
        Self::require_existing_directory(&state, &parent)?;
        state.tree.insert_directory(path)
    }

    async fn delete(&self, path: &Path) -> Result<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let leaves = {
            let state = self.state.read().await;
            state.tree.file_leaves_in_subtree(path)?
        };
        for (leaf_path, owner) in &leaves {
            StorageCommandStub::new(owner.command).delete(leaf_path).await?;
        }
        let mut state = self.state.write().await;
        state.tree.remove(path)?;
        Ok(true)
    }

    async fn get_storage(&self, path: &Path) -> Result<RemoteRef> {
        let state = self.state.read().await;
        Ok(state.tree.owner_of(path)?.data)
    }
}

#[async_trait]
impl Dispatch for NamingServiceImpl {
    fn interface_name(&self) -> &'static str {
        "Naming"
    }

    async fn dispatch(
        &self,
        method: &str,
        _param_types: &[String],
        args: &[u8],
    ) -> Result<Dispatched> {
        let mut cur = std::io::Cursor::new(args);
        match method {
            "isDirectory" => {
                let path = decode_path(&mut cur)?;
                dispatch_result(self.is_directory(&path).await, encode_bool)
            }
            "list" => {
                let path = decode_path(&mut cur)?;
                dispatch_result(self.list(&path).await, encode_string_seq)
            }
            "createFile" => {
                let path = decode_path(&mut cur)?;
                dispatch_result(self.create_file(&path).await, encode_bool)
            }
            "createDirectory" => {
                let path = decode_path(&mut cur)?;
                dispatch_result(self.create_directory(&path).await, encode_bool)
            }
            "delete" => {
                let path = decode_path(&mut cur)?;
                dispatch_result(self.delete(&path).await, encode_bool)
            }
            "getStorage" => {
                let path = decode_path(&mut cur)?;
                dispatch_result(self.get_storage(&path).await, encode_remote_ref)
            }
            other => Err(DfsError::RpcFailure(format!("unknown Naming method {other}"))),
        }
    }
}

fn decode_path(cur: &mut std::io::Cursor<&[u8]>) -> Result<Path> {
    Path::new(&wire::read_string(cur)?)
}

fn encode_bool(value: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    wire::write_bool(&mut buf, value)?;
    Ok(buf)
}

fn encode_string_seq(value: Vec<String>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    wire::write_seq(&mut buf, &value, |w, s| wire::write_string(w, s))?;
    Ok(buf)
}

fn encode_remote_ref(value: RemoteRef) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    value.encode(&mut buf)?;
    Ok(buf)
}

/// Turns a service method's [`Result`] into a [`Dispatched`]: application
/// failures become [`Dispatched::Failure`] rather than propagating as
/// [`Err`], which [`Dispatch::dispatch`] reserves for marshaling/lookup
/// failures (spec §4.C).
fn dispatch_result<T>(
    result: Result<T>,
    encode: impl FnOnce(T) -> Result<Vec<u8>>,
) -> Result<Dispatched> {
    match result {
        Ok(value) => Ok(Dispatched::Ok(encode(value)?)),
        Err(e) => Ok(Dispatched::Failure(crate::rpc::codec_failure(&e))),
    }
}

/// Client-side proxy for the naming service (spec §4.D). The client-side
/// CLI or library that would use this stub is explicitly out of scope
/// (spec §1); this type exists so storage-server startup and tests have a
/// typed way to call `getStorage`/`list`/etc. over the wire.
#[derive(Debug, Clone, Copy)]
pub struct NamingStub {
    remote: RemoteRef,
}

impl NamingStub {
    pub fn new(remote: RemoteRef) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> RemoteRef {
        self.remote
    }

    pub async fn is_directory(&self, path: &Path) -> Result<bool> {
        let payload = self.call("isDirectory", path).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_bool(&mut cur)
    }

    pub async fn list(&self, path: &Path) -> Result<Vec<String>> {
        let payload = self.call("list", path).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_seq(&mut cur, |r| wire::read_string(r))
    }

    pub async fn create_file(&self, path: &Path) -> Result<bool> {
        let payload = self.call("createFile", path).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_bool(&mut cur)
    }

    pub async fn create_directory(&self, path: &Path) -> Result<bool> {
        let payload = self.call("createDirectory", path).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_bool(&mut cur)
    }

    pub async fn delete(&self, path: &Path) -> Result<bool> {
        let payload = self.call("delete", path).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_bool(&mut cur)
    }

    pub async fn get_storage(&self, path: &Path) -> Result<RemoteRef> {
        let payload = self.call("getStorage", path).await?;
        let mut cur = std::io::Cursor::new(payload.as_slice());
        RemoteRef::decode(&mut cur, "StorageData")
    }

    async fn call(&self, method: &'static str, path: &Path) -> Result<Vec<u8>> {
        let mut args = Vec::new();
        wire::write_string(&mut args, &path.to_string())?;
        invoke(&self.remote, method, &["Path"], args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::registry::{Registry, ServerStubs};
    use crate::naming::tree::Tree;
    use crate::naming::NamingState;
    use crate::rpc::skeleton::Skeleton;
    use std::net::SocketAddr;
    use std::sync::Arc as StdArc;
    use tokio::sync::RwLock;

    struct FakeCommandTarget;

    #[async_trait]
    impl Dispatch for FakeCommandTarget {
        fn interface_name(&self) -> &'static str {
            "StorageCommand"
        }

        async fn dispatch(
            &self,
            method: &str,
            _param_types: &[String],
            _args: &[u8],
        ) -> Result<Dispatched> {
            match method {
                "create" | "delete" => {
                    let mut buf = Vec::new();
                    wire::write_bool(&mut buf, true)?;
                    Ok(Dispatched::Ok(buf))
                }
                other => Err(DfsError::RpcFailure(format!("unexpected method {other}"))),
            }
        }
    }

    async fn fake_storage() -> (ServerStubs, StdArc<Skeleton<FakeCommandTarget>>) {
        let skeleton = StdArc::new(Skeleton::new(
            StdArc::new(FakeCommandTarget),
            "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
        ));
        let addr = skeleton.start().await.unwrap();
        let stubs = ServerStubs::new(
            RemoteRef::new(addr, "StorageData"),
            RemoteRef::new(addr, "StorageCommand"),
        );
        (stubs, skeleton)
    }

    fn service(state: SharedNamingState) -> NamingServiceImpl {
        NamingServiceImpl::new(state)
    }

    #[tokio::test]
    async fn create_file_requires_an_existing_parent_directory() {
        let state: SharedNamingState =
            StdArc::new(RwLock::new(NamingState { tree: Tree::new(), registry: Registry::new() }));
        let svc = service(state);
        let err = svc.create_file(&Path::new("/missing/x.txt").unwrap()).await.unwrap_err();
        assert!(matches!(err, DfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_file_with_empty_registry_is_illegal_state() {
        let state: SharedNamingState =
            StdArc::new(RwLock::new(NamingState { tree: Tree::new(), registry: Registry::new() }));
        let svc = service(state);
        let err = svc.create_file(&Path::new("/x.txt").unwrap()).await.unwrap_err();
        assert!(matches!(err, DfsError::IllegalState(_)));
    }

    #[tokio::test]
    async fn create_directory_does_not_require_a_registered_server() {
        let state: SharedNamingState =
            StdArc::new(RwLock::new(NamingState { tree: Tree::new(), registry: Registry::new() }));
        let svc = service(state);
        assert!(svc.create_directory(&Path::new("/x").unwrap()).await.unwrap());
        assert!(svc.is_directory(&Path::new("/x").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn create_file_commands_the_picked_server_and_binds_ownership() {
        let (stubs, skeleton) = fake_storage().await;
        let mut registry = Registry::new();
        registry.push(stubs.clone());
        let state: SharedNamingState =
            StdArc::new(RwLock::new(NamingState { tree: Tree::new(), registry }));
        let svc = service(state.clone());

        assert!(svc.create_file(&Path::new("/x/y.txt").unwrap()).await.unwrap());
        assert!(svc.is_directory(&Path::new("/x").unwrap()).await.unwrap());
        let owner = svc.get_storage(&Path::new("/x/y.txt").unwrap()).await.unwrap();
        assert_eq!(owner, stubs.data);

        skeleton.stop().await;
    }

    #[tokio::test]
    async fn delete_commands_every_owner_in_the_subtree() {
        let (stubs, skeleton) = fake_storage().await;
        let mut tree = Tree::new();
        tree.try_insert_file(&Path::new("/d/e/f.txt").unwrap(), stubs.clone());
        tree.try_insert_file(&Path::new("/d/e/g.txt").unwrap(), stubs.clone());
        let state: SharedNamingState =
            StdArc::new(RwLock::new(NamingState { tree, registry: Registry::new() }));
        let svc = service(state);

        assert!(svc.delete(&Path::new("/d").unwrap()).await.unwrap());
        let err = svc.is_directory(&Path::new("/d").unwrap()).await.unwrap_err();
        assert!(matches!(err, DfsError::NotFound(_)));

        skeleton.stop().await;
    }
}
