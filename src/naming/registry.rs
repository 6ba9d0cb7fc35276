//! The storage-server registry (spec §3/§4.H): an ordered, duplicate-free
//! sequence of [`ServerStubs`], the pair identifying one registered
//! storage server.

use crate::rpc::stub::RemoteRef;

/// The (data-stub, command-stub) pair identifying one registered storage
/// server. Equality is structural over both members (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerStubs {
    /// Client-facing data interface: `size`/`read`/`write`.
    pub data: RemoteRef,
    /// Naming-facing command interface: `create`/`delete`.
    pub command: RemoteRef,
}

impl ServerStubs {
    pub fn new(data: RemoteRef, command: RemoteRef) -> Self {
        Self { data, command }
    }
}

/// Storage servers in registration order, used for round-robin placement
/// of newly created files (spec §3/§9: placement strategy is
/// unspecified, any deterministic or randomized choice is acceptable).
#[derive(Debug, Default)]
pub struct Registry {
    servers: Vec<ServerStubs>,
    next_placement: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self { servers: Vec::new(), next_placement: 0 }
    }

    /// True if `stubs` is already registered (structural equality).
    pub fn contains(&self, stubs: &ServerStubs) -> bool {
        self.servers.contains(stubs)
    }

    /// Appends a newly registered server. Caller must have already checked
    /// [`Registry::contains`] to enforce the "registers at most once"
    /// invariant.
    pub fn push(&mut self, stubs: ServerStubs) {
        self.servers.push(stubs);
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Picks the next storage server to own a newly created file, cycling
    /// round-robin through the registration order.
    pub fn pick_for_placement(&mut self) -> Option<ServerStubs> {
        if self.servers.is_empty() {
            return None;
        }
        let server = self.servers[self.next_placement % self.servers.len()].clone();
        self.next_placement = self.next_placement.wrapping_add(1);
        Some(server)
    }
}
