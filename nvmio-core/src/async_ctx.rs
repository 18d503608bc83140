// vim: tw=80
//! Asynchronous command contexts
//!
//! An [`AsyncCtx`] multiplexes up to `depth` outstanding commands onto one
//! backend queue.  Its slot table is allocated once, at creation, and never
//! grows.

use fixedbitset::FixedBitSet;
use nix::errno::Errno;
use std::{fmt::{self, Debug, Formatter}, mem};
use tracing::warn;
use crate::{
    backend::Queue,
    cmd::{Cmd, Completion},
    executor::{log_completion, Callback},
    types::*,
};

/// Lifecycle state of an [`AsyncCtx`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CtxState {
    /// No commands are outstanding.
    Idle,
    /// At least one command is outstanding.
    Active,
    /// Torn down; no further use is possible.
    Terminated,
}

/// An outstanding command.  Holding the `Cmd` here keeps its buffers alive
/// until the completion is delivered.
struct Slot {
    cmd: Cmd,
    cb: Callback,
}

/// A bounded set of in-flight asynchronous commands.
///
/// Callbacks run on the thread that reaps, from within
/// [`reap_poll`](AsyncCtx::reap_poll) or [`reap_wait`](AsyncCtx::reap_wait),
/// and never from within submission.
pub struct AsyncCtx {
    /// Identifies the backend whose queue this is
    owner: usize,
    depth: u32,
    outstanding: u32,
    slots: Box<[Option<Slot>]>,
    /// Set bits mark free slots
    free: FixedBitSet,
    queue: Box<dyn Queue>,
    /// Scratch space for reaped completions.  Kept around to save
    /// allocations.
    reaped: Vec<(SlotT, Completion)>,
    terminated: bool,
}

impl Debug for AsyncCtx {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("AsyncCtx")
            .field("owner", &self.owner)
            .field("depth", &self.depth)
            .field("outstanding", &self.outstanding)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

impl AsyncCtx {
    pub(crate) fn new(owner: usize, depth: u32, queue: Box<dyn Queue>)
        -> Self
    {
        let slots = (0..depth).map(|_| None).collect::<Vec<_>>()
            .into_boxed_slice();
        let mut free = FixedBitSet::with_capacity(depth as usize);
        free.insert_range(..);
        AsyncCtx {
            owner,
            depth,
            outstanding: 0,
            slots,
            free,
            queue,
            reaped: Vec::with_capacity(depth as usize),
            terminated: false
        }
    }

    /// Was this context created by the backend identified by `owner`?
    pub(crate) fn belongs_to(&self, owner: usize) -> bool {
        self.owner == owner
    }

    /// Maximum number of outstanding commands
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of commands submitted but not yet reaped
    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn state(&self) -> CtxState {
        if self.terminated {
            CtxState::Terminated
        } else if self.outstanding > 0 {
            CtxState::Active
        } else {
            CtxState::Idle
        }
    }

    /// Occupy a free slot with `cmd` and hand it to the backend.
    pub(crate) fn enqueue(&mut self, cmd: Cmd, cb: Callback)
        -> std::result::Result<SlotT, ExecError>
    {
        if self.terminated {
            return Err(ExecError::ContextTerminated);
        }
        let idx = self.free.ones().next().ok_or(ExecError::ContextSaturated)?;
        let slot = self.slots[idx].insert(Slot { cmd, cb });
        match self.queue.submit(idx as SlotT, &mut slot.cmd) {
            Ok(()) => {
                self.free.set(idx, false);
                self.outstanding += 1;
                Ok(idx as SlotT)
            },
            Err(e) => {
                // Not accepted, so the callback must never run
                self.slots[idx] = None;
                Err(e)
            }
        }
    }

    fn reap(&mut self, wait: bool) -> std::result::Result<u32, ExecError> {
        if self.terminated {
            return Err(ExecError::ContextTerminated);
        }
        if self.outstanding == 0 {
            return Ok(0);
        }
        let mut reaped = mem::take(&mut self.reaped);
        let r = self.queue.reap(wait, &mut reaped);
        let mut n = 0;
        let mut lost = false;
        for (idx, mut c) in reaped.drain(..) {
            let slot = self.slots.get_mut(idx as usize).and_then(Option::take);
            let Some(Slot { cmd, cb }) = slot else {
                warn!(slot = idx, "completion for a slot with no command");
                lost = true;
                continue;
            };
            // Release the caller's buffers and the slot before the callback
            // runs, so it may reuse both.
            drop(cmd);
            self.free.insert(idx as usize);
            self.outstanding -= 1;
            c.slot = Some(idx);
            log_completion(&c);
            cb(c);
            n += 1;
        }
        self.reaped = reaped;
        r?;
        if lost {
            return Err(ExecError::TransportFailure(Errno::EPROTO));
        }
        Ok(n)
    }

    /// Deliver every completion that is already available, without blocking.
    ///
    /// Returns the number of callbacks invoked.
    pub fn reap_poll(&mut self) -> std::result::Result<u32, ExecError> {
        self.reap(false)
    }

    /// Block until at least one completion is available, then deliver every
    /// available completion.  Returns immediately if nothing is outstanding.
    ///
    /// Returns the number of callbacks invoked.
    pub fn reap_wait(&mut self) -> std::result::Result<u32, ExecError> {
        loop {
            let n = self.reap(true)?;
            if n > 0 || self.outstanding == 0 {
                return Ok(n);
            }
        }
    }

    /// Reap until no commands are outstanding.
    ///
    /// Returns the total number of callbacks invoked.
    pub fn wait_all(&mut self) -> std::result::Result<u32, ExecError> {
        let mut total = 0;
        while self.outstanding > 0 {
            total += self.reap_wait()?;
        }
        Ok(total)
    }

    /// Tear down the context.
    ///
    /// Refused while commands are outstanding, in which case the context
    /// remains fully usable.  Terminating twice is harmless.
    pub fn terminate(&mut self) -> std::result::Result<(), TeardownError> {
        if self.terminated {
            return Ok(());
        }
        if self.outstanding > 0 {
            return Err(TeardownError::OutstandingCommands(self.outstanding));
        }
        self.queue.terminate();
        self.terminated = true;
        Ok(())
    }
}

impl Drop for AsyncCtx {
    fn drop(&mut self) {
        if self.outstanding > 0 {
            warn!(outstanding = self.outstanding,
                  "AsyncCtx dropped with commands in flight");
        }
    }
}

// LCOV_EXCL_STOP
