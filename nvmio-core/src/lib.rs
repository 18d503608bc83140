// vim: tw=80
//! Host-side command and I/O layer for NVMe namespaces
//!
//! Commands are issued through a [`Device`](device::Device), either
//! synchronously or into a bounded [`AsyncCtx`](async_ctx::AsyncCtx) that the
//! caller reaps later.  Zoned namespaces are handled by [`zone`] and the
//! Simple-Copy command by [`scc`].

// I use a common pattern of naming a module's test submodule "t".  Silence
// clippy's complaints about the resulting module names.
#![allow(clippy::module_inception)]

// I just don't like the look of e.g. "Scc" as opposed to "SCC" in docs.
#![allow(clippy::upper_case_acronyms)]

pub mod async_ctx;
pub mod backend;
pub mod cmd;
pub mod device;
pub mod executor;
pub mod scc;
pub mod types;
pub mod util;
pub mod zone;

pub use crate::types::*;
