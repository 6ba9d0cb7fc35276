//! The registration handshake (spec §4.H): a storage server reports its
//! local file listing once; the naming server merges it into the tree and
//! reports back which of those paths were already owned by an
//! earlier-registered server.

use async_trait::async_trait;

use crate::error::{DfsError, Result};
use crate::naming::registry::ServerStubs;
use crate::naming::tree::InsertOutcome;
use crate::naming::SharedNamingState;
use crate::path::Path;
use crate::rpc::skeleton::{Dispatch, Dispatched};
use crate::rpc::stub::{invoke, RemoteRef};
use crate::rpc::wire;

/// The registration service's typed interface.
#[async_trait]
pub trait RegistrationService: Send + Sync {
    /// Registers a storage server and merges `files` into the tree.
    /// Fails with [`DfsError::IllegalState`] if `(data, command)` has
    /// already registered. Returns the subset of `files` that duplicate an
    /// earlier registration's file-leaves — the caller deletes these
    /// locally and prunes (spec §4.E startup protocol).
    async fn register(&self, data: RemoteRef, command: RemoteRef, files: Vec<Path>) -> Result<Vec<Path>>;
}

pub struct RegistrationServiceImpl {
    state: SharedNamingState,
}

impl RegistrationServiceImpl {
    pub fn new(state: SharedNamingState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl RegistrationService for RegistrationServiceImpl {
    async fn register(&self, data: RemoteRef, command: RemoteRef, files: Vec<Path>) -> Result<Vec<Path>> {
        let stubs = ServerStubs::new(data, command);
        let requested = files.len();
        let mut state = self.state.write().await;

        if state.registry.contains(&stubs) {
            tracing::warn!(%data, %command, "rejecting duplicate registration");
            return Err(DfsError::IllegalState(format!("{stubs:?} already registered")));
        }
        state.registry.push(stubs.clone());

        let mut duplicates = Vec::new();
        for path in files {
            match state.tree.try_insert_file(&path, stubs.clone()) {
                InsertOutcome::Inserted => {}
                InsertOutcome::AlreadyFile => duplicates.push(path),
                // Blocked by a directory at the target: the path is not
                // inserted but is not reported as a duplicate either (spec
                // §4.H step 4 distinguishes the two cases).
                InsertOutcome::Blocked => {}
            }
        }
        tracing::info!(
            %data, %command, requested, duplicates = duplicates.len(), registered_servers = state.registry.len(),
            "registration merged"
        );
        Ok(duplicates)
    }
}

#[async_trait]
impl Dispatch for RegistrationServiceImpl {
    fn interface_name(&self) -> &'static str {
        "Registration"
    }

    async fn dispatch(
        &self,
        method: &str,
        _param_types: &[String],
        args: &[u8],
    ) -> Result<Dispatched> {
        match method {
            "register" => {
                let mut cur = std::io::Cursor::new(args);
                let data = RemoteRef::decode(&mut cur, "StorageData")?;
                let command = RemoteRef::decode(&mut cur, "StorageCommand")?;
                let files = wire::read_seq(&mut cur, |r| Path::new(&wire::read_string(r)?))?;

                match self.register(data, command, files).await {
                    Ok(duplicates) => {
                        let mut buf = Vec::new();
                        let as_strings: Vec<String> = duplicates.iter().map(Path::to_string).collect();
                        wire::write_seq(&mut buf, &as_strings, |w, s| wire::write_string(w, s))?;
                        Ok(Dispatched::Ok(buf))
                    }
                    Err(e) => Ok(Dispatched::Failure(crate::rpc::codec_failure(&e))),
                }
            }
            other => Err(DfsError::RpcFailure(format!("unknown Registration method {other}"))),
        }
    }
}

/// Client-side proxy for the registration interface, used by a storage
/// server at startup (spec §4.E).
#[derive(Debug, Clone, Copy)]
pub struct RegistrationStub {
    remote: RemoteRef,
}

impl RegistrationStub {
    pub fn new(remote: RemoteRef) -> Self {
        Self { remote }
    }

    pub async fn register(&self, data: RemoteRef, command: RemoteRef, files: Vec<Path>) -> Result<Vec<Path>> {
        let mut args = Vec::new();
        data.encode(&mut args)?;
        command.encode(&mut args)?;
        let as_strings: Vec<String> = files.iter().map(Path::to_string).collect();
        wire::write_seq(&mut args, &as_strings, |w, s| wire::write_string(w, s))?;

        let payload = invoke(&self.remote, "register", &["RemoteRef", "RemoteRef", "Path[]"], args).await?;
        let mut cur = std::io::Cursor::new(payload);
        wire::read_seq(&mut cur, |r| Path::new(&wire::read_string(r)?))
    }
}
