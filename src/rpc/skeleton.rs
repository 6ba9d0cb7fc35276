//! Server-side endpoint: bind a listener, accept connections, dispatch one
//! request per connection to a target, and marshal the result back. See
//! spec §4.C.
//!
//! Grounded on the teacher's accept loop (`lib.rs::handle_forever`/
//! `process_socket`) and its task-per-connection split
//! (`read_task.rs`/`vfs_task.rs`/`stream_writer.rs`), collapsed here to one
//! worker task per connection since every connection is exactly one
//! request/reply (spec §4.B).

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::error::{DfsError, Result};
use crate::rpc::message::{Request, Response};

/// Outcome of dispatching one request to a served interface's target.
pub enum Dispatched {
    /// The target method returned successfully; payload is its encoded
    /// return value.
    Ok(Vec<u8>),
    /// The target method raised an application-level failure (one of the
    /// non-rpc-failure [`DfsError`] kinds); payload is its encoding.
    Failure(Vec<u8>),
}

/// Implemented by the concrete service exposed through a [`Skeleton`].
/// Method lookup by name (and the declared parameter-type descriptors) is a
/// string-keyed table built once, fixed at construction — the systems
/// analogue of the source's reflection-based lookup (spec §9).
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// Name of the interface served, used for stub `toString`/equality and
    /// logging.
    fn interface_name(&self) -> &'static str;

    /// Resolves `method`+`param_types` against the target's method table,
    /// decodes `args`, invokes the target, and encodes the outcome.
    /// Returns [`DfsError::RpcFailure`] for an unknown method/signature or a
    /// marshaling failure — never for an application-level failure, which
    /// is reported as [`Dispatched::Failure`] instead.
    async fn dispatch(
        &self,
        method: &str,
        param_types: &[String],
        args: &[u8],
    ) -> Result<Dispatched>;
}

/// Called exactly once when the listener task exits, with `None` for a
/// clean [`Skeleton::stop`] and `Some(cause)` for an unexpected accept
/// failure.
pub type StoppedHook = Box<dyn FnOnce(Option<std::io::Error>) + Send + 'static>;

enum State {
    Unstarted,
    Running { local_addr: SocketAddr, stop: Arc<Notify>, listener_task: JoinHandle<()> },
    Stopping,
    Stopped,
}

/// Server-side endpoint for one served interface.
///
/// `start` is forbidden while `Running` or after the skeleton has ever
/// reached `Stopped` — calling it again fails with
/// [`DfsError::IllegalState`], matching spec §7's classification of
/// "skeleton started twice" as an illegal-state error.
pub struct Skeleton<D: Dispatch> {
    target: Arc<D>,
    bind_addr: SocketAddr,
    state: Mutex<State>,
    stopped_hook: Mutex<Option<StoppedHook>>,
}

impl<D: Dispatch> Skeleton<D> {
    /// Constructs a skeleton for `target`, bound to `bind_addr` once
    /// started. Pass port `0` to have the OS choose a free port at
    /// [`Skeleton::start`].
    pub fn new(target: Arc<D>, bind_addr: SocketAddr) -> Self {
        Self { target, bind_addr, state: Mutex::new(State::Unstarted), stopped_hook: Mutex::new(None) }
    }

    /// Registers the hook invoked exactly once when the listener exits.
    pub async fn on_stopped(&self, hook: StoppedHook) {
        *self.stopped_hook.lock().await = Some(hook);
    }

    /// Binds the listener and starts the accept loop. Queries for the bound
    /// address after this call resolve a wildcard bind address to the
    /// local host (spec §4.C).
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr> {
        let mut state = self.state.lock().await;
        match &*state {
            State::Unstarted => {}
            State::Running { .. } => {
                return Err(DfsError::IllegalState("skeleton already running".into()))
            }
            State::Stopping | State::Stopped => {
                return Err(DfsError::IllegalState("skeleton already stopped".into()))
            }
        }

        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| DfsError::RpcFailure(format!("bind {}: {e}", self.bind_addr)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DfsError::RpcFailure(format!("local_addr: {e}")))?;

        let stop = Arc::new(Notify::new());
        let this = Arc::clone(self);
        let loop_stop = Arc::clone(&stop);
        let listener_task = tokio::spawn(async move { this.accept_loop(listener, loop_stop).await });

        *state = State::Running { local_addr, stop, listener_task };
        tracing::info!(interface = self.target.interface_name(), %local_addr, "skeleton started");
        Ok(local_addr)
    }

    /// Closes the listener and waits for the accept loop to exit.
    /// In-flight worker tasks are allowed to run to completion. Idempotent
    /// once stopped.
    pub async fn stop(self: &Arc<Self>) {
        let (stop, listener_task) = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, State::Stopping) {
                State::Running { stop, listener_task, .. } => (stop, listener_task),
                other => {
                    *state = other;
                    return;
                }
            }
        };
        stop.notify_one();
        let _ = listener_task.await;
        *self.state.lock().await = State::Stopped;
    }

    /// The bound address, once [`Skeleton::start`] has returned.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock().await {
            State::Running { local_addr, .. } => Some(*local_addr),
            _ => None,
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, stop: Arc<Notify>) {
        let cause = loop {
            tokio::select! {
                _ = stop.notified() => break None,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            let target = Arc::clone(&self.target);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(target, socket).await {
                                    tracing::warn!(%peer, error = %e, "connection worker failed");
                                }
                            });
                        }
                        Err(e) => break Some(e),
                    }
                }
            }
        };
        if let Some(hook) = self.stopped_hook.lock().await.take() {
            hook(cause);
        }
    }
}

async fn handle_connection<D: Dispatch>(target: Arc<D>, mut socket: TcpStream) -> Result<()> {
    let _ = socket.set_nodelay(true);
    let request = Request::read_from(&mut socket).await?;
    tracing::debug!(method = %request.method, "dispatching request");

    let response = match target.dispatch(&request.method, &request.param_types, &request.args).await {
        Ok(Dispatched::Ok(payload)) => Response::ok(payload),
        Ok(Dispatched::Failure(payload)) => Response::failure(payload),
        Err(e) => {
            tracing::warn!(method = %request.method, error = %e, "dispatch failed");
            Response::failure(crate::rpc::codec_failure(&e))
        }
    };
    response.write_to(&mut socket).await
}
