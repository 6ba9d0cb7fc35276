//! The storage server's two served interfaces (spec §4.E): the
//! client-facing data interface (`size`/`read`/`write`) and the
//! naming-facing command interface (`create`/`delete`), each behind its
//! own [`Skeleton`] on its own port. [`StorageServer`] wires both up and
//! runs the startup registration protocol.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{DfsError, Result};
use crate::naming::registration::RegistrationStub;
use crate::path::Path;
use crate::rpc::skeleton::{Dispatch, Dispatched, Skeleton};
use crate::rpc::stub::{invoke, RemoteRef};
use crate::rpc::wire;
use crate::storage::adapter::LocalStorage;

/// The client-facing data interface.
#[async_trait]
pub trait StorageData: Send + Sync {
    async fn size(&self, path: &Path) -> Result<u64>;
    async fn read(&self, path: &Path, offset: i64, length: i64) -> Result<Vec<u8>>;
    async fn write(&self, path: &Path, offset: i64, data: Vec<u8>) -> Result<()>;
}

/// The naming-facing command interface.
#[async_trait]
pub trait StorageCommand: Send + Sync {
    async fn create(&self, path: &Path) -> Result<bool>;
    async fn delete(&self, path: &Path) -> Result<bool>;
}

pub struct StorageDataImpl {
    storage: Arc<LocalStorage>,
}

impl StorageDataImpl {
    pub fn new(storage: Arc<LocalStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl StorageData for StorageDataImpl {
    async fn size(&self, path: &Path) -> Result<u64> {
        self.storage.size(path).await
    }

    async fn read(&self, path: &Path, offset: i64, length: i64) -> Result<Vec<u8>> {
        self.storage.read(path, offset, length).await
    }

    async fn write(&self, path: &Path, offset: i64, data: Vec<u8>) -> Result<()> {
        self.storage.write(path, offset, &data).await
    }
}

#[async_trait]
impl Dispatch for StorageDataImpl {
    fn interface_name(&self) -> &'static str {
        "StorageData"
    }

    async fn dispatch(&self, method: &str, _param_types: &[String], args: &[u8]) -> Result<Dispatched> {
        let mut cur = std::io::Cursor::new(args);
        match method {
            "size" => {
                let path = decode_path(&mut cur)?;
                dispatch_result(self.size(&path).await, encode_u64)
            }
            "read" => {
                let path = decode_path(&mut cur)?;
                let offset = wire::read_i64(&mut cur)?;
                let length = wire::read_i64(&mut cur)?;
                dispatch_result(self.read(&path, offset, length).await, encode_bytes)
            }
            "write" => {
                let path = decode_path(&mut cur)?;
                let offset = wire::read_i64(&mut cur)?;
                let data = wire::read_bytes(&mut cur)?;
                dispatch_result(self.write(&path, offset, data).await, |()| Ok(Vec::new()))
            }
            other => Err(DfsError::RpcFailure(format!("unknown StorageData method {other}"))),
        }
    }
}

pub struct StorageCommandImpl {
    storage: Arc<LocalStorage>,
}

impl StorageCommandImpl {
    pub fn new(storage: Arc<LocalStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl StorageCommand for StorageCommandImpl {
    async fn create(&self, path: &Path) -> Result<bool> {
        self.storage.create(path).await
    }

    async fn delete(&self, path: &Path) -> Result<bool> {
        self.storage.delete(path).await
    }
}

#[async_trait]
impl Dispatch for StorageCommandImpl {
    fn interface_name(&self) -> &'static str {
        "StorageCommand"
    }

    async fn dispatch(&self, method: &str, _param_types: &[String], args: &[u8]) -> Result<Dispatched> {
        let mut cur = std::io::Cursor::new(args);
        let path = decode_path(&mut cur)?;
        match method {
            "create" => dispatch_result(self.create(&path).await, encode_bool),
            "delete" => dispatch_result(self.delete(&path).await, encode_bool),
            other => Err(DfsError::RpcFailure(format!("unknown StorageCommand method {other}"))),
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

fn encode_u64(value: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    wire::write_u64(&mut buf, value)?;
    Ok(buf)
}

fn encode_bytes(value: Vec<u8>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    wire::write_bytes(&mut buf, &value)?;
    Ok(buf)
}

fn dispatch_result<T>(result: Result<T>, encode: impl FnOnce(T) -> Result<Vec<u8>>) -> Result<Dispatched> {
    match result {
        Ok(value) => Ok(Dispatched::Ok(encode(value)?)),
        Err(e) => Ok(Dispatched::Failure(crate::rpc::codec_failure(&e))),
    }
}

/// Client-side proxy for the data interface (spec §4.D): what a client
/// holds after `NamingStub::get_storage`.
#[derive(Debug, Clone, Copy)]
pub struct StorageDataStub {
    remote: RemoteRef,
}

impl StorageDataStub {
    pub fn new(remote: RemoteRef) -> Self {
        Self { remote }
    }

    pub async fn size(&self, path: &Path) -> Result<u64> {
        let mut args = Vec::new();
        wire::write_string(&mut args, &path.to_string())?;
        let payload = invoke(&self.remote, "size", &["Path"], args).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_u64(&mut cur)
    }

    pub async fn read(&self, path: &Path, offset: i64, length: i64) -> Result<Vec<u8>> {
        let mut args = Vec::new();
        wire::write_string(&mut args, &path.to_string())?;
        wire::write_i64(&mut args, offset)?;
        wire::write_i64(&mut args, length)?;
        let payload = invoke(&self.remote, "read", &["Path", "i64", "i64"], args).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_bytes(&mut cur)
    }

    pub async fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<()> {
        let mut args = Vec::new();
        wire::write_string(&mut args, &path.to_string())?;
        wire::write_i64(&mut args, offset)?;
        wire::write_bytes(&mut args, data)?;
        invoke(&self.remote, "write", &["Path", "i64", "bytes"], args).await?;
        Ok(())
    }
}

/// Client-side proxy for the command interface (spec §4.D): what the
/// naming service holds for a file-leaf's owner to command `create`/
/// `delete`.
#[derive(Debug, Clone, Copy)]
pub struct StorageCommandStub {
    remote: RemoteRef,
}

impl StorageCommandStub {
    pub fn new(remote: RemoteRef) -> Self {
        Self { remote }
    }

    pub async fn create(&self, path: &Path) -> Result<bool> {
        self.call("create", path).await
    }

    pub async fn delete(&self, path: &Path) -> Result<bool> {
        self.call("delete", path).await
    }

    async fn call(&self, method: &'static str, path: &Path) -> Result<bool> {
        let mut args = Vec::new();
        wire::write_string(&mut args, &path.to_string())?;
        let payload = invoke(&self.remote, method, &["Path"], args).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_bool(&mut cur)
    }
}

/// Ties a [`LocalStorage`] to its two skeletons and runs the startup
/// registration protocol against a naming server (spec §4.E).
pub struct StorageServer {
    storage: Arc<LocalStorage>,
    data_skeleton: Arc<Skeleton<StorageDataImpl>>,
    command_skeleton: Arc<Skeleton<StorageCommandImpl>>,
}

impl StorageServer {
    pub fn new(root: PathBuf, data_bind: SocketAddr, command_bind: SocketAddr) -> Self {
        let storage = Arc::new(LocalStorage::new(root));
        Self {
            data_skeleton: Arc::new(Skeleton::new(Arc::new(StorageDataImpl::new(Arc::clone(&storage))), data_bind)),
            command_skeleton: Arc::new(Skeleton::new(
                Arc::new(StorageCommandImpl::new(Arc::clone(&storage))),
                command_bind,
            )),
            storage,
        }
    }

    /// Verifies the root, starts both skeletons, registers with the naming
    /// server at `naming_addr`, deletes the duplicates it returns, and
    /// prunes. `hostname` is the externally visible host used to build the
    /// stubs sent to the naming server (spec §4.E).
    pub async fn start(&self, hostname: &str, naming_addr: SocketAddr) -> Result<(SocketAddr, SocketAddr)> {
        self.storage.verify_root().await?;

        let data_addr = self.data_skeleton.start().await?;
        let command_addr = self.command_skeleton.start().await?;

        let data_remote = RemoteRef::new(with_host(data_addr, hostname)?, "StorageData");
        let command_remote = RemoteRef::new(with_host(command_addr, hostname)?, "StorageCommand");

        let files = Path::list(self.storage.root())?;
        let registration = RegistrationStub::new(RemoteRef::new(naming_addr, "Registration"));
        let duplicates = registration.register(data_remote, command_remote, files).await?;

        for path in &duplicates {
            self.storage.delete(path).await?;
        }
        tracing::info!(count = duplicates.len(), "deleted duplicate files reported by naming server");

        Ok((data_addr, command_addr))
    }

    pub async fn stop(&self) {
        self.data_skeleton.stop().await;
        self.command_skeleton.stop().await;
    }
}

fn with_host(addr: SocketAddr, hostname: &str) -> Result<SocketAddr> {
    format!("{hostname}:{}", addr.port())
        .parse()
        .map_err(|e| DfsError::RpcFailure(format!("bad hostname {hostname:?}: {e}")))
}
