// vim: tw=80
//! A backend that accepts everything and does nothing

use std::collections::VecDeque;
use crate::{
    backend::{Backend, Queue},
    cmd::{Cmd, Completion, Op},
    device::{Geometry, IdfyCtrlr, IdfyNs, Ocfs, Oncs},
    types::*,
    zone::{ReportFilter, ZoneDescriptor},
};

/// Deepest queue supported by the null backend
pub const NULL_MAX_DEPTH: u32 = 23;

const NULL_NSZE: LbaT = 1 << 32;

/// Completes every command successfully without touching any data.  Useful
/// for measuring the overhead of the submission path.
#[derive(Clone, Copy, Debug, Default)]
pub struct Null {}

impl Null {
    fn complete(cmd: &Cmd) -> Completion {
        let result = match cmd.op {
            Op::Append { zslba, .. } => zslba,
            _ => 0
        };
        Completion::success(cmd.opc(), result)
    }
}

impl Backend for Null {
    fn name(&self) -> &'static str {
        "null"
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            nsid: 1,
            nsze: NULL_NSZE,
            lba_nbytes: 512,
            nbytes_oob: 0,
            zoned: None
        }
    }

    fn idfy_ctrlr(&self) -> IdfyCtrlr {
        let mut oncs = Oncs::default();
        oncs.set_copy(true);
        let mut ocfs = Ocfs::default();
        ocfs.set_fmt0(true);
        IdfyCtrlr { oncs, ocfs }
    }

    fn idfy_ns(&self) -> IdfyNs {
        IdfyNs { nsze: NULL_NSZE, mcl: 128, msrc: 127, mssrl: 128 }
    }

    fn execute(&self, cmd: &mut Cmd)
        -> std::result::Result<Completion, ExecError>
    {
        Ok(Null::complete(cmd))
    }

    fn max_depth(&self) -> u32 {
        NULL_MAX_DEPTH
    }

    fn queue(&self, depth: u32)
        -> std::result::Result<Box<dyn Queue>, ExecError>
    {
        Ok(Box::new(NullQueue {
            done: VecDeque::with_capacity(depth as usize)
        }))
    }

    fn zone_report(&self, _slba: LbaT, _filter: ReportFilter)
        -> std::result::Result<Vec<ZoneDescriptor>, ExecError>
    {
        Ok(Vec::new())
    }
}

struct NullQueue {
    done: VecDeque<(SlotT, Completion)>
}

impl Queue for NullQueue {
    fn submit(&mut self, slot: SlotT, cmd: &mut Cmd)
        -> std::result::Result<(), ExecError>
    {
        self.done.push_back((slot, Null::complete(cmd)));
        Ok(())
    }

    fn reap(&mut self, _wait: bool, out: &mut Vec<(SlotT, Completion)>)
        -> std::result::Result<(), ExecError>
    {
        out.extend(self.done.drain(..));
        Ok(())
    }

    fn terminate(&mut self) {
        self.done.clear();
    }
}

// LCOV_EXCL_STOP
