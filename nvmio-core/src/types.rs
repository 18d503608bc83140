// vim: tw=80
//! Common type definitions used throughout nvmio

use divbuf::{DivBuf, DivBufMut};
use nix::errno::Errno;
use thiserror::Error;
use std::io;

/// Indexes an LBA within a namespace.
pub type LbaT = u64;

/// Namespace identifier
pub type NsidT = u32;

/// Indexes a slot within an `AsyncCtx`.
pub type SlotT = u32;

/// Payload buffer for commands that transfer data to the device.  It is a
/// reference-counted handle to caller-owned memory.
pub type IoVec = DivBuf;

/// Payload buffer for commands that transfer data from the device.  Uniquely
/// owned for the duration of the command.
pub type IoVecMut = DivBufMut;

/// Errors detected while submitting a command, before the device sees it, or
/// while talking to the backend transport.
///
/// Errors reported by the device itself are never returned as an
/// `ExecError`; they are carried in the [`Completion`](crate::cmd::Completion).
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum ExecError {
    #[error("Invalid namespace id {0}")]
    InvalidNamespace(NsidT),
    #[error("Buffer size mismatch: expected {expected} bytes but got {actual}")]
    BufferSizeMismatch {
        expected: usize,
        actual: usize
    },
    #[error("Block count may not be zero")]
    InvalidBlockCount,
    #[error("No free slot in the async context")]
    ContextSaturated,
    #[error("The async context has been terminated")]
    ContextTerminated,
    #[error("The async context belongs to a different device")]
    ForeignContext,
    #[error("Invalid queue depth {depth}; the backend supports 1 to {max}")]
    InvalidDepth {
        depth: u32,
        max: u32
    },
    #[error("Transport failure: {0}")]
    TransportFailure(Errno),
}

impl From<io::Error> for ExecError {
    fn from(e: io::Error) -> Self {
        let errno = e.raw_os_error()
            .map(Errno::from_raw)
            .unwrap_or(Errno::EIO);
        ExecError::TransportFailure(errno)
    }
}

impl From<Errno> for ExecError {
    fn from(e: Errno) -> Self {
        ExecError::TransportFailure(e)
    }
}

/// A Simple-Copy source range violates the namespace's copy limits, or can't
/// be represented at all.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    #[error("The source range has no entries")]
    Empty,
    #[error("Source range list of {nbytes} bytes holds a partial entry")]
    Truncated {
        nbytes: usize
    },
    #[error("Source range entry {index} has zero length")]
    ZeroLength {
        index: usize
    },
    #[error("Too many source range entries: {count} exceeds MSRC + 1 = {max}")]
    TooManyRanges {
        count: usize,
        max: usize
    },
    #[error("Total copy length {total} exceeds MCL = {max}")]
    CopyLengthExceeded {
        total: u64,
        max: u64
    },
    #[error("Source range entry {index} has length {nlb}, exceeding MSSRL = {max}")]
    RangeLengthExceeded {
        index: usize,
        nlb: u64,
        max: u64
    },
}

/// Errors tearing down an `AsyncCtx`
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum TeardownError {
    #[error("{0} commands are still outstanding")]
    OutstandingCommands(u32),
}

/// nvmio's umbrella error type, used by operations that can fail in more than
/// one way.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Teardown(#[from] TeardownError),
    #[error("No zone matches the request")]
    NoZone,
    #[error("The namespace is not zoned")]
    NotZoned,
    #[error("Zone {0:#x} has no writable capacity")]
    ZeroCapacity(LbaT),
    #[error("Unsupported by the device: {0}")]
    Unsupported(String),
    #[error("Invalid device configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

// LCOV_EXCL_STOP
