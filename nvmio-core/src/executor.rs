// vim: tw=80
//! Command execution, synchronous or asynchronous
//!
//! Every command passes the same validation before reaching the backend,
//! whichever mode it is issued in.

use tracing::debug;
use crate::{
    async_ctx::AsyncCtx,
    cmd::{Cmd, Completion, Op},
    device::Device,
    types::*,
    zone::ZoneAction,
};

/// Invoked exactly once with the completion of an asynchronous command, from
/// within [`AsyncCtx::reap_poll`] or [`AsyncCtx::reap_wait`].
pub type Callback = Box<dyn FnOnce(Completion) + Send>;

/// How a single command should be issued
pub enum Mode<'a> {
    /// Block until the command completes.
    Sync,
    /// Submit into the given context and return immediately.
    Async(&'a mut AsyncCtx, Callback),
}

/// What became of a command issued with [`Device::run`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// A synchronous command finished.
    Completed(Completion),
    /// An asynchronous command was accepted into this slot.
    Submitted(SlotT),
}

impl Outcome {
    /// The completion of a synchronous command
    pub fn completion(&self) -> Option<Completion> {
        match self {
            Outcome::Completed(c) => Some(*c),
            Outcome::Submitted(_) => None
        }
    }
}

pub(crate) fn log_completion(c: &Completion) {
    if !c.is_ok() {
        debug!(opc = ?c.opc, slot = ?c.slot, result = c.result,
               "command failed: {}", c);
    }
}

impl Device {
    fn check_len(&self, actual: usize, nlb: u32, per_block: u32)
        -> std::result::Result<(), ExecError>
    {
        let expected = nlb as usize * per_block as usize;
        if expected != actual {
            Err(ExecError::BufferSizeMismatch { expected, actual })
        } else {
            Ok(())
        }
    }

    fn check_io(&self, nlb: u32, data: usize, meta: Option<usize>)
        -> std::result::Result<(), ExecError>
    {
        if nlb == 0 {
            return Err(ExecError::InvalidBlockCount);
        }
        let geo = self.geometry();
        self.check_len(data, nlb, geo.lba_nbytes)?;
        if let Some(meta) = meta {
            self.check_len(meta, nlb, geo.nbytes_oob)?;
        }
        Ok(())
    }

    /// Reject commands that can never succeed, before they reach the device.
    fn validate(&self, cmd: &Cmd) -> std::result::Result<(), ExecError> {
        if cmd.nsid != self.nsid() {
            return Err(ExecError::InvalidNamespace(cmd.nsid));
        }
        match &cmd.op {
            Op::Read { nlb, data, meta, .. } =>
                self.check_io(*nlb, data.len(), meta.as_ref().map(|m| m.len())),
            Op::Write { nlb, data, meta, .. } |
            Op::Append { nlb, data, meta, .. } =>
                self.check_io(*nlb, data.len(), meta.as_ref().map(|m| m.len())),
            Op::ZoneMgmtSend { action, ext, .. } => {
                let Some(ext) = ext else {
                    return Ok(());
                };
                let zdes = self.geometry().zoned
                    .map(|z| z.zdes as usize)
                    .unwrap_or(0);
                if *action != ZoneAction::Open || zdes == 0 {
                    // Extension data is meaningless here; so is any buffer
                    // size.
                    Err(ExecError::BufferSizeMismatch {
                        expected: 0,
                        actual: ext.len()
                    })
                } else if ext.len() != zdes {
                    Err(ExecError::BufferSizeMismatch {
                        expected: zdes,
                        actual: ext.len()
                    })
                } else {
                    Ok(())
                }
            },
            Op::Copy {..} => Ok(())
        }
    }

    /// Execute a command synchronously, blocking until it completes.
    ///
    /// A device-reported failure is returned as `Ok` with a failing status.
    #[tracing::instrument(skip(self), level = "trace")]
    pub fn execute(&self, mut cmd: Cmd)
        -> std::result::Result<Completion, ExecError>
    {
        self.validate(&cmd)?;
        let c = self.backend().execute(&mut cmd)?;
        log_completion(&c);
        Ok(c)
    }

    /// Submit a command into `ctx` without waiting for it.
    ///
    /// On success, `cb` will be invoked exactly once by a later reap.  On
    /// failure, the command was not accepted and `cb` is dropped uncalled.
    /// `ctx` must have been created by this `Device` or one of its clones.
    #[tracing::instrument(skip(self, ctx, cb), level = "trace")]
    pub fn submit(&self, ctx: &mut AsyncCtx, cmd: Cmd, cb: Callback)
        -> std::result::Result<SlotT, ExecError>
    {
        if !ctx.belongs_to(self.backend_id()) {
            return Err(ExecError::ForeignContext);
        }
        self.validate(&cmd)?;
        ctx.enqueue(cmd, cb)
    }

    /// Issue a command in the given mode.
    pub fn run(&self, cmd: Cmd, mode: Mode)
        -> std::result::Result<Outcome, ExecError>
    {
        match mode {
            Mode::Sync => self.execute(cmd).map(Outcome::Completed),
            Mode::Async(ctx, cb) =>
                self.submit(ctx, cmd, cb).map(Outcome::Submitted)
        }
    }

    /// Read `nlb` blocks starting at `slba` into `data`.
    pub fn read(&self, nsid: NsidT, slba: LbaT, nlb: u32, data: IoVecMut,
                meta: Option<IoVecMut>, mode: Mode)
        -> std::result::Result<Outcome, ExecError>
    {
        self.run(Cmd::read(nsid, slba, nlb, data, meta), mode)
    }

    /// Write `nlb` blocks from `data` starting at `slba`.
    pub fn write(&self, nsid: NsidT, slba: LbaT, nlb: u32, data: IoVec,
                 meta: Option<IoVec>, mode: Mode)
        -> std::result::Result<Outcome, ExecError>
    {
        self.run(Cmd::write(nsid, slba, nlb, data, meta), mode)
    }

    /// Append `nlb` blocks from `data` to the zone starting at `zslba`.
    pub fn append(&self, nsid: NsidT, zslba: LbaT, nlb: u32, data: IoVec,
                  meta: Option<IoVec>, mode: Mode)
        -> std::result::Result<Outcome, ExecError>
    {
        self.run(Cmd::append(nsid, zslba, nlb, data, meta), mode)
    }
}

// LCOV_EXCL_STOP
