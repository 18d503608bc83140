// vim: tw=80
//! Command requests and completion records

use nix::errno::Errno;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{self, Debug, Display, Formatter};
use crate::{
    scc::{CopyFormat, SourceRange},
    types::*,
    zone::ZoneAction,
};

/// NVM command set opcodes understood by nvmio
#[derive(Clone, Copy, Debug, Eq, Hash, IntoPrimitive, PartialEq,
         TryFromPrimitive)]
#[repr(u8)]
pub enum Opc {
    Write = 0x01,
    Read = 0x02,
    Copy = 0x19,
    ZoneMgmtSend = 0x79,
    ZoneAppend = 0x7D,
}

/// The operation-specific part of a [`Cmd`].
///
/// Block counts (`nlb`) are one-based here.  Converting them to the
/// zero-based wire representation is the transport's business.
pub enum Op {
    Read {
        slba: LbaT,
        nlb: u32,
        data: IoVecMut,
        meta: Option<IoVecMut>,
    },
    Write {
        slba: LbaT,
        nlb: u32,
        data: IoVec,
        meta: Option<IoVec>,
    },
    /// Zone Append.  The device picks the LBA and reports it in the
    /// completion's `result`.
    Append {
        zslba: LbaT,
        nlb: u32,
        data: IoVec,
        meta: Option<IoVec>,
    },
    ZoneMgmtSend {
        zslba: LbaT,
        action: ZoneAction,
        /// Zone descriptor extension data.  Only valid with
        /// [`ZoneAction::Open`].
        ext: Option<IoVec>,
    },
    Copy {
        sdlba: LbaT,
        range: SourceRange,
        format: CopyFormat,
    },
}

/// A single command request, addressed to one namespace.
pub struct Cmd {
    pub nsid: NsidT,
    pub op: Op,
}

impl Cmd {
    pub fn read(nsid: NsidT, slba: LbaT, nlb: u32, data: IoVecMut,
                meta: Option<IoVecMut>) -> Self
    {
        Cmd { nsid, op: Op::Read { slba, nlb, data, meta } }
    }

    pub fn write(nsid: NsidT, slba: LbaT, nlb: u32, data: IoVec,
                 meta: Option<IoVec>) -> Self
    {
        Cmd { nsid, op: Op::Write { slba, nlb, data, meta } }
    }

    pub fn append(nsid: NsidT, zslba: LbaT, nlb: u32, data: IoVec,
                  meta: Option<IoVec>) -> Self
    {
        Cmd { nsid, op: Op::Append { zslba, nlb, data, meta } }
    }

    pub fn zone_mgmt_send(nsid: NsidT, zslba: LbaT, action: ZoneAction,
                          ext: Option<IoVec>) -> Self
    {
        Cmd { nsid, op: Op::ZoneMgmtSend { zslba, action, ext } }
    }

    pub fn copy(nsid: NsidT, sdlba: LbaT, range: SourceRange,
                format: CopyFormat) -> Self
    {
        Cmd { nsid, op: Op::Copy { sdlba, range, format } }
    }

    pub fn opc(&self) -> Opc {
        match self.op {
            Op::Read {..} => Opc::Read,
            Op::Write {..} => Opc::Write,
            Op::Append {..} => Opc::ZoneAppend,
            Op::ZoneMgmtSend {..} => Opc::ZoneMgmtSend,
            Op::Copy {..} => Opc::Copy,
        }
    }
}

impl Debug for Cmd {
    // The payload buffers don't print usefully, so show their sizes instead.
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut ds = f.debug_struct("Cmd");
        ds.field("nsid", &self.nsid).field("opc", &self.opc());
        match &self.op {
            Op::Read { slba, nlb, data, meta } => {
                ds.field("slba", slba)
                    .field("nlb", nlb)
                    .field("data_nbytes", &data.len())
                    .field("meta_nbytes", &meta.as_ref().map(|m| m.len()))
            },
            Op::Write { slba, nlb, data, meta } => {
                ds.field("slba", slba)
                    .field("nlb", nlb)
                    .field("data_nbytes", &data.len())
                    .field("meta_nbytes", &meta.as_ref().map(|m| m.len()))
            },
            Op::Append { zslba, nlb, data, meta } => {
                ds.field("zslba", zslba)
                    .field("nlb", nlb)
                    .field("data_nbytes", &data.len())
                    .field("meta_nbytes", &meta.as_ref().map(|m| m.len()))
            },
            Op::ZoneMgmtSend { zslba, action, ext } => {
                ds.field("zslba", zslba)
                    .field("action", action)
                    .field("ext_nbytes", &ext.as_ref().map(|e| e.len()))
            },
            Op::Copy { sdlba, range, format } => {
                ds.field("sdlba", sdlba)
                    .field("nr", &range.len())
                    .field("format", format)
            },
        };
        ds.finish()
    }
}

/// Status reported by the device, decoded into type and code.
///
/// `dnr` is the device's "Do Not Retry" hint.  It is reported, never acted
/// upon.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StatusCode {
    /// Status Code Type
    pub sct: u8,
    /// Status Code
    pub sc: u8,
    pub dnr: bool,
}

impl StatusCode {
    pub const INVALID_OPCODE: Self = Self::generic(0x01);
    pub const INVALID_FIELD: Self = Self::generic(0x02);
    pub const DATA_XFER_ERROR: Self = Self::generic(0x04);
    pub const INTERNAL_ERROR: Self = Self::generic(0x06);
    pub const INVALID_NAMESPACE: Self = Self::generic(0x0B);
    pub const LBA_OUT_OF_RANGE: Self = Self::generic(0x80);
    pub const CMD_SIZE_LIMIT_EXCEEDED: Self = Self::cmd_specific(0x83);
    pub const ZONE_BOUNDARY_ERROR: Self = Self::cmd_specific(0xB8);
    pub const ZONE_FULL: Self = Self::cmd_specific(0xB9);
    pub const ZONE_READ_ONLY: Self = Self::cmd_specific(0xBA);
    pub const ZONE_OFFLINE: Self = Self::cmd_specific(0xBB);
    pub const ZONE_INVALID_WRITE: Self = Self::cmd_specific(0xBC);
    pub const TOO_MANY_ACTIVE_ZONES: Self = Self::cmd_specific(0xBD);
    pub const TOO_MANY_OPEN_ZONES: Self = Self::cmd_specific(0xBE);
    pub const ZONE_INVALID_TRANSITION: Self = Self::cmd_specific(0xBF);

    pub const fn generic(sc: u8) -> Self {
        StatusCode { sct: 0, sc, dnr: false }
    }

    pub const fn cmd_specific(sc: u8) -> Self {
        StatusCode { sct: 1, sc, dnr: false }
    }

    /// Set the Do Not Retry bit
    pub const fn dnr(mut self) -> Self {
        self.dnr = true;
        self
    }

    /// Compare type and code, ignoring the retry hint.
    pub fn matches(&self, other: &StatusCode) -> bool {
        self.sct == other.sct && self.sc == other.sc
    }

    /// Human-readable name of the status, as the NVMe specifications spell
    /// it.
    pub fn name(&self) -> &'static str {
        match (self.sct, self.sc) {
            (0, 0x00) => "Successful Completion",
            (0, 0x01) => "Invalid Command Opcode",
            (0, 0x02) => "Invalid Field in Command",
            (0, 0x04) => "Data Transfer Error",
            (0, 0x06) => "Internal Error",
            (0, 0x0B) => "Invalid Namespace or Format",
            (0, 0x80) => "LBA Out of Range",
            (1, 0x83) => "Command Size Limit Exceeded",
            (1, 0xB8) => "Zone Boundary Error",
            (1, 0xB9) => "Zone Is Full",
            (1, 0xBA) => "Zone Is Read Only",
            (1, 0xBB) => "Zone Is Offline",
            (1, 0xBC) => "Zone Invalid Write",
            (1, 0xBD) => "Too Many Active Zones",
            (1, 0xBE) => "Too Many Open Zones",
            (1, 0xBF) => "Invalid Zone State Transition",
            _ => "Unknown Status"
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} (sct {:#x} sc {:#x}{})", self.name(), self.sct, self.sc,
               if self.dnr {", dnr"} else {""})
    }
}

/// Outcome of one command
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Success,
    /// The device completed the command with an error status.
    Device(StatusCode),
    /// The command never reached the device, or its completion was lost.
    Transport(Errno),
}

/// The record delivered exactly once for every accepted command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Completion {
    pub opc: Opc,
    pub status: Status,
    /// Command-specific result.  The assigned LBA for Zone Append; the index
    /// of the lowest failed source range entry for a failed Copy.
    pub result: u64,
    /// The `AsyncCtx` slot that the command occupied, if it was submitted
    /// asynchronously.
    pub slot: Option<SlotT>,
}

impl Completion {
    pub fn success(opc: Opc, result: u64) -> Self {
        Completion { opc, status: Status::Success, result, slot: None }
    }

    pub fn error(opc: Opc, sc: StatusCode, result: u64) -> Self {
        Completion { opc, status: Status::Device(sc), result, slot: None }
    }

    pub fn transport(opc: Opc, errno: Errno) -> Self {
        Completion { opc, status: Status::Transport(errno), result: 0,
                     slot: None }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Success
    }

    /// Did the device complete this command with the given status, ignoring
    /// the retry hint?
    pub fn has_status(&self, sc: StatusCode) -> bool {
        match self.status {
            Status::Device(s) => s.matches(&sc),
            _ => false
        }
    }

    /// For a failed Copy, the index of the lowest-numbered source range entry
    /// that failed, exactly as the device reported it.
    pub fn failed_range(&self) -> Option<u32> {
        match (self.opc, self.status) {
            (Opc::Copy, Status::Device(_)) => Some(self.result as u32),
            _ => None
        }
    }

    /// For a successful Zone Append, the LBA where the data landed.
    pub fn assigned_lba(&self) -> Option<LbaT> {
        match (self.opc, self.status) {
            (Opc::ZoneAppend, Status::Success) => Some(self.result),
            _ => None
        }
    }
}

impl Display for Completion {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:?}: ", self.opc)?;
        match self.status {
            Status::Success => write!(f, "Successful Completion")?,
            Status::Device(sc) => write!(f, "{}", sc)?,
            Status::Transport(e) => write!(f, "transport error {}", e)?,
        }
        write!(f, ", result {:#x}", self.result)
    }
}

// LCOV_EXCL_STOP
