//! The naming server: an in-memory path [`tree::Tree`] plus a
//! [`registry::Registry`] of registered storage servers, exposed over two
//! skeletons (the naming service and the registration service). See spec
//! §4.F/§4.G/§4.H.

pub mod registration;
pub mod registry;
pub mod service;
pub mod tree;

use std::sync::Arc;

use tokio::sync::RwLock;

use registry::Registry;
use tree::Tree;

/// The naming server's entire shared mutable state, under one lock (spec
/// §9 suggests independent locks for the tree and the registry; this
/// implementation deliberately uses a single lock instead, so that
/// `createFile`'s pick-then-bind and `register`'s check-then-insert are
/// each atomic with respect to every other naming operation — see
/// DESIGN.md).
#[derive(Default)]
pub struct NamingState {
    pub tree: Tree,
    pub registry: Registry,
}

pub type SharedNamingState = Arc<RwLock<NamingState>>;

/// Constructs a fresh, empty shared naming state.
pub fn new_shared_state() -> SharedNamingState {
    Arc::new(RwLock::new(NamingState::default()))
}
