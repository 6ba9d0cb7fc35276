//! Client-side proxy machinery (spec §4.D).
//!
//! [`RemoteRef`] is the address+interface pair every concrete stub (e.g.
//! `NamingStub`, `StorageDataStub`) wraps. Its `equals`/`hashCode`/
//! `toString` analogues ([`PartialEq`], [`Hash`], [`Display`]) are resolved
//! locally and never touch the network, matching spec §4.D exactly; every
//! other method call opens a connection, writes one request, reads one
//! reply, and closes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::error::{DfsError, Result};
use crate::rpc::message::{Request, Response};
use crate::rpc::{decode_error, wire};

/// Address and interface name identifying one remote endpoint. Equality,
/// hashing, and display never touch the network (spec §4.D).
#[derive(Debug, Clone, Copy)]
pub struct RemoteRef {
    addr: SocketAddr,
    interface: &'static str,
}

impl RemoteRef {
    pub fn new(addr: SocketAddr, interface: &'static str) -> Self {
        Self { addr, interface }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    /// Encodes this reference for embedding in a wire record (e.g. the
    /// `ServerStubs` sent during registration). Stubs are serializable: a
    /// `RemoteRef` decoded on another host keeps the same remote address
    /// and behaves identically (spec §4.D).
    pub fn encode(&self, dst: &mut Vec<u8>) -> Result<()> {
        wire::write_string(dst, &self.addr.to_string())?;
        wire::write_string(dst, self.interface)
    }

    /// Decodes a [`RemoteRef`] previously written by [`RemoteRef::encode`].
    /// `interface` is supplied by the caller (each typed stub knows its own
    /// interface name) rather than round-tripped as a `&'static str`.
    pub fn decode(src: &mut impl std::io::Read, interface: &'static str) -> Result<Self> {
        let addr_str = wire::read_string(src)?;
        let _recorded_interface = wire::read_string(src)?;
        let addr = addr_str
            .parse()
            .map_err(|e| DfsError::RpcFailure(format!("bad address {addr_str:?}: {e}")))?;
        Ok(Self { addr, interface })
    }
}

impl PartialEq for RemoteRef {
    fn eq(&self, other: &Self) -> bool {
        self.interface == other.interface && self.addr == other.addr
    }
}

impl Eq for RemoteRef {}

impl Hash for RemoteRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.interface.hash(state);
        self.addr.hash(state);
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.interface, self.addr)
    }
}

/// Opens a connection to `remote`, writes one request, reads one reply,
/// and closes. Returns the decoded return payload on success, or the
/// remote's [`DfsError`] (application-level or transport-level) on
/// failure. This is the one place client method calls ever touch the
/// network (spec §4.D).
pub async fn invoke(
    remote: &RemoteRef,
    method: &'static str,
    param_types: &[&'static str],
    args: Vec<u8>,
) -> Result<Vec<u8>> {
    let mut socket = TcpStream::connect(remote.addr())
        .await
        .map_err(|e| DfsError::RpcFailure(format!("connect to {remote}: {e}")))?;
    let _ = socket.set_nodelay(true);

    let request = Request::new(
        method,
        param_types.iter().map(|s| s.to_string()).collect(),
        args,
    );
    request.write_to(&mut socket).await?;

    let response = Response::read_from(&mut socket).await?;
    if response.success {
        Ok(response.payload)
    } else {
        Err(decode_error(&response.payload))
    }
}
