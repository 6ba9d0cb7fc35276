//! A small distributed filesystem: a naming server that owns the global
//! directory tree, and storage servers that own file bytes, connected by a
//! custom length-framed remote-invocation runtime. See DESIGN.md for how
//! each module maps onto the design.

pub mod error;
pub mod naming;
pub mod path;
pub mod rpc;
pub mod storage;
