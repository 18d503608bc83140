// vim: tw=80
//! Zoned Namespace support
//!
//! Zone descriptors are snapshots of device state.  nvmio never caches or
//! mutates them, and never second-guesses a zone management action: the
//! device decides whether a transition is legal.

use bitfield::bitfield;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::{
    cmp,
    fmt::{self, Display, Formatter},
    num::NonZeroU32,
};
use crate::{
    cmd::{Cmd, Completion},
    device::Device,
    executor::{Mode, Outcome},
    types::*,
};

/// Zone state, as encoded in the Zone Descriptor's ZS field
#[derive(Clone, Copy, Debug, Eq, Hash, IntoPrimitive, PartialEq,
         TryFromPrimitive)]
#[repr(u8)]
pub enum ZoneState {
    Empty = 0x1,
    ImplicitlyOpened = 0x2,
    ExplicitlyOpened = 0x3,
    Closed = 0x4,
    ReadOnly = 0xD,
    Full = 0xE,
    Offline = 0xF,
}

impl ZoneState {
    /// Is the zone in one of the open states?
    pub fn is_open(self) -> bool {
        matches!(self, ZoneState::ImplicitlyOpened |
                 ZoneState::ExplicitlyOpened)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, IntoPrimitive, PartialEq,
         TryFromPrimitive)]
#[repr(u8)]
pub enum ZoneType {
    SeqWriteRequired = 0x2,
}

bitfield! {
    /// Zone Attributes
    #[derive(Clone, Copy, Default, Eq, PartialEq)]
    pub struct ZoneAttrs(u8);
    impl Debug;
    /// Zone Finished by Controller
    pub zfc, set_zfc: 0;
    /// Finish Zone Recommended
    pub fzr, set_fzr: 1;
    /// Reset Zone Recommended
    pub rzr, set_rzr: 2;
    /// Zone Descriptor Extension Valid
    pub zdev, set_zdev: 7;
}

/// Zone Send Action
#[derive(Clone, Copy, Debug, Eq, Hash, IntoPrimitive, PartialEq,
         TryFromPrimitive)]
#[repr(u8)]
pub enum ZoneAction {
    Close = 0x1,
    Finish = 0x2,
    Open = 0x3,
    Reset = 0x4,
    Offline = 0x5,
}

/// Zone Receive Action Specific field: which zones to report
#[derive(Clone, Copy, Debug, Default, Eq, Hash, IntoPrimitive, PartialEq,
         TryFromPrimitive)]
#[repr(u8)]
pub enum ReportFilter {
    #[default]
    All = 0x0,
    Empty = 0x1,
    ImplicitlyOpened = 0x2,
    ExplicitlyOpened = 0x3,
    Closed = 0x4,
    Full = 0x5,
    ReadOnly = 0x6,
    Offline = 0x7,
}

impl ReportFilter {
    /// Does a zone in state `zs` pass this filter?
    pub fn matches(self, zs: ZoneState) -> bool {
        match self {
            ReportFilter::All => true,
            ReportFilter::Empty => zs == ZoneState::Empty,
            ReportFilter::ImplicitlyOpened =>
                zs == ZoneState::ImplicitlyOpened,
            ReportFilter::ExplicitlyOpened =>
                zs == ZoneState::ExplicitlyOpened,
            ReportFilter::Closed => zs == ZoneState::Closed,
            ReportFilter::Full => zs == ZoneState::Full,
            ReportFilter::ReadOnly => zs == ZoneState::ReadOnly,
            ReportFilter::Offline => zs == ZoneState::Offline,
        }
    }
}

impl From<ZoneState> for ReportFilter {
    fn from(zs: ZoneState) -> Self {
        match zs {
            ZoneState::Empty => ReportFilter::Empty,
            ZoneState::ImplicitlyOpened => ReportFilter::ImplicitlyOpened,
            ZoneState::ExplicitlyOpened => ReportFilter::ExplicitlyOpened,
            ZoneState::Closed => ReportFilter::Closed,
            ZoneState::ReadOnly => ReportFilter::ReadOnly,
            ZoneState::Full => ReportFilter::Full,
            ZoneState::Offline => ReportFilter::Offline,
        }
    }
}

/// A snapshot of one zone's state
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZoneDescriptor {
    pub zt: ZoneType,
    pub zs: ZoneState,
    pub za: ZoneAttrs,
    /// Zone capacity in LBAs
    pub zcap: LbaT,
    /// Zone start LBA
    pub zslba: LbaT,
    /// Write pointer
    pub wp: LbaT,
    /// Zone descriptor extension data.  Present only when `za.zdev()` is set.
    pub ext: Option<Box<[u8]>>,
}

impl Display for ZoneDescriptor {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{{zslba: {:#x}, wp: {:#x}, zcap: {:#x}, zt: {:?}, \
               zs: {:?}, za: {:#04x}}}",
               self.zslba, self.wp, self.zcap, self.zt, self.zs, self.za.0)
    }
}

/// The result of a Zone Management Receive command
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Report {
    /// The LBA that the report started from
    pub slba: LbaT,
    /// Size of each descriptor's extension, in bytes
    pub zdes: u32,
    pub descrs: Vec<ZoneDescriptor>,
}

impl Report {
    pub fn iter(&self) -> impl Iterator<Item=&ZoneDescriptor> {
        self.descrs.iter()
    }

    pub fn len(&self) -> usize {
        self.descrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descrs.is_empty()
    }
}

/// How whole-zone I/O should be split into commands
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Batch {
    /// One command per logical block
    #[default]
    PerBlock,
    /// Up to this many blocks per command
    Blocks(NonZeroU32)
}

impl Batch {
    fn nlb(self) -> u32 {
        match self {
            Batch::PerBlock => 1,
            Batch::Blocks(n) => n.get()
        }
    }
}

/// Report the zones of namespace `nsid`, starting with the zone that contains
/// `slba`.
#[tracing::instrument(skip(dev))]
pub fn report(dev: &Device, nsid: NsidT, slba: LbaT, filter: ReportFilter)
    -> Result<Report>
{
    if nsid != dev.nsid() {
        return Err(ExecError::InvalidNamespace(nsid).into());
    }
    let zgeo = dev.geometry().zoned.ok_or(Error::NotZoned)?;
    let descrs = dev.backend().zone_report(slba, filter)?;
    Ok(Report { slba, zdes: zgeo.zdes, descrs })
}

/// Fetch the descriptor of the zone that contains `slba`.
pub fn descr_from_dev(dev: &Device, slba: LbaT) -> Result<ZoneDescriptor> {
    report(dev, dev.nsid(), slba, ReportFilter::All)?
        .descrs
        .into_iter()
        .next()
        .ok_or(Error::NoZone)
}

/// Fetch the descriptor of the lowest-addressed zone in state `zs`.
pub fn descr_from_dev_in_state(dev: &Device, zs: ZoneState)
    -> Result<ZoneDescriptor>
{
    report(dev, dev.nsid(), 0, zs.into())?
        .descrs
        .into_iter()
        .next()
        .ok_or(Error::NoZone)
}

/// Find a zone that is ready to be written from the beginning: Empty,
/// sequential-write-required, and with nonzero capacity.  If `zslba` is given,
/// only that zone is considered.
pub fn find_usable(dev: &Device, zslba: Option<LbaT>)
    -> Result<ZoneDescriptor>
{
    report(dev, dev.nsid(), zslba.unwrap_or(0), ReportFilter::All)?
        .descrs
        .into_iter()
        .filter(|d| zslba.map(|z| d.zslba == z).unwrap_or(true))
        .find(|d| d.zs == ZoneState::Empty &&
                  d.zt == ZoneType::SeqWriteRequired &&
                  d.zcap > 0)
        .ok_or(Error::NoZone)
}

/// Send a zone management action.
///
/// `ext` is zone descriptor extension data, and may only accompany
/// [`ZoneAction::Open`].  The device's verdict on the transition is reported
/// in the completion.
#[tracing::instrument(skip(dev, ext, mode))]
pub fn manage(dev: &Device, nsid: NsidT, zslba: LbaT, action: ZoneAction,
              ext: Option<IoVec>, mode: Mode)
    -> Result<Outcome>
{
    let cmd = Cmd::zone_mgmt_send(nsid, zslba, action, ext);
    Ok(dev.run(cmd, mode)?)
}

fn zone_len(dev: &Device, descr: &ZoneDescriptor, actual: usize)
    -> Result<u64>
{
    if descr.zcap == 0 {
        return Err(Error::ZeroCapacity(descr.zslba));
    }
    let expected = descr.zcap as usize * dev.lba_nbytes() as usize;
    if expected != actual {
        return Err(ExecError::BufferSizeMismatch { expected, actual }.into());
    }
    Ok(descr.zcap)
}

/// Read the whole capacity of a zone into `buf`, in LBA order.
///
/// Stops at, and returns, the first failing completion.  Otherwise returns
/// the last one.
#[tracing::instrument(skip(dev, buf))]
pub fn read(dev: &Device, nsid: NsidT, descr: &ZoneDescriptor,
            mut buf: IoVecMut, batch: Batch) -> Result<Completion>
{
    let zcap = zone_len(dev, descr, buf.len())?;
    let lba_nbytes = dev.lba_nbytes() as usize;
    let mut last = None;
    let mut lba = descr.zslba;
    while lba < descr.zslba + zcap {
        let nlb = cmp::min(u64::from(batch.nlb()), descr.zslba + zcap - lba)
            as u32;
        let chunk = buf.split_to(nlb as usize * lba_nbytes);
        let c = dev.execute(Cmd::read(nsid, lba, nlb, chunk, None))?;
        if !c.is_ok() {
            return Ok(c);
        }
        last = Some(c);
        lba += u64::from(nlb);
    }
    last.ok_or(Error::ZeroCapacity(descr.zslba))
}

/// Write `buf` over the whole capacity of an empty zone, in write pointer
/// order.
///
/// Stops at, and returns, the first failing completion.  Otherwise returns
/// the last one.
#[tracing::instrument(skip(dev, buf))]
pub fn write(dev: &Device, nsid: NsidT, descr: &ZoneDescriptor,
             mut buf: IoVec, batch: Batch) -> Result<Completion>
{
    let zcap = zone_len(dev, descr, buf.len())?;
    let lba_nbytes = dev.lba_nbytes() as usize;
    let mut last = None;
    let mut lba = descr.zslba;
    while lba < descr.zslba + zcap {
        let nlb = cmp::min(u64::from(batch.nlb()), descr.zslba + zcap - lba)
            as u32;
        let chunk = buf.split_to(nlb as usize * lba_nbytes);
        let c = dev.execute(Cmd::write(nsid, lba, nlb, chunk, None))?;
        if !c.is_ok() {
            return Ok(c);
        }
        last = Some(c);
        lba += u64::from(nlb);
    }
    last.ok_or(Error::ZeroCapacity(descr.zslba))
}

/// Fill the whole capacity of an empty zone from `buf` using Zone Append.
///
/// Stops at, and returns, the first failing completion.  Otherwise returns
/// the last one, whose assigned LBA is that of the final batch.
#[tracing::instrument(skip(dev, buf))]
pub fn append(dev: &Device, nsid: NsidT, descr: &ZoneDescriptor,
              mut buf: IoVec, batch: Batch) -> Result<Completion>
{
    let zcap = zone_len(dev, descr, buf.len())?;
    let lba_nbytes = dev.lba_nbytes() as usize;
    let mut last = None;
    let mut nwritten = 0;
    while nwritten < zcap {
        let nlb = cmp::min(u64::from(batch.nlb()), zcap - nwritten) as u32;
        let chunk = buf.split_to(nlb as usize * lba_nbytes);
        let c = dev.execute(Cmd::append(nsid, descr.zslba, nlb, chunk, None))?;
        if !c.is_ok() {
            return Ok(c);
        }
        last = Some(c);
        nwritten += u64::from(nlb);
    }
    last.ok_or(Error::ZeroCapacity(descr.zslba))
}

// LCOV_EXCL_STOP
