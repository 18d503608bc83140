// vim: tw=80
//! Backend transports
//!
//! Each backend provides synchronous execution, asynchronous queues, and the
//! handful of collaborator queries that nvmio needs.  The core never looks
//! below this interface.

use crate::{
    cmd::{Cmd, Completion},
    device::{Geometry, IdfyCtrlr, IdfyNs},
    types::*,
    zone::{ReportFilter, ZoneDescriptor},
};

#[cfg(test)] use mockall::automock;

mod emu;
mod file;
mod null;

pub use self::emu::{Emu, EmuConfig, EmuZoned};
pub use self::file::{FileBackend, FileConfig};
pub use self::null::Null;

/// Everything a transport must provide.
#[cfg_attr(test, automock)]
pub trait Backend: Send + Sync {
    /// Short name, for diagnostics
    fn name(&self) -> &'static str;

    fn geometry(&self) -> Geometry;

    fn idfy_ctrlr(&self) -> IdfyCtrlr;

    fn idfy_ns(&self) -> IdfyNs;

    /// Execute one command and block until it completes.
    ///
    /// Device-reported errors are returned as `Ok` with a failing status.
    /// `Err` is reserved for failures of the transport itself.
    fn execute(&self, cmd: &mut Cmd)
        -> std::result::Result<Completion, ExecError>;

    /// The deepest queue that [`Backend::queue`] may create
    fn max_depth(&self) -> u32;

    /// Create a new submission/completion queue, for use by an `AsyncCtx`.
    fn queue(&self, depth: u32)
        -> std::result::Result<Box<dyn Queue>, ExecError>;

    /// Report zone descriptors, beginning with the zone that contains `slba`.
    ///
    /// Conventional namespaces report no zones.
    fn zone_report(&self, slba: LbaT, filter: ReportFilter)
        -> std::result::Result<Vec<ZoneDescriptor>, ExecError>;
}

/// A backend's native submission/completion mechanism.
///
/// The caller guarantees that each submitted `Cmd` stays at the same address,
/// unmodified, until its completion has been reaped.
#[cfg_attr(test, automock)]
pub trait Queue: Send {
    /// Submit a command.  `slot` identifies it in the eventual completion.
    fn submit(&mut self, slot: SlotT, cmd: &mut Cmd)
        -> std::result::Result<(), ExecError>;

    /// Append all available completions to `out`.  If `wait` is set, block
    /// until at least one is available, unless none are pending at all.
    fn reap(&mut self, wait: bool, out: &mut Vec<(SlotT, Completion)>)
        -> std::result::Result<(), ExecError>;

    /// Release the backend resources of a drained queue.
    fn terminate(&mut self);
}
