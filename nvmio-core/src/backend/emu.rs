// vim: tw=80
//! An in-memory emulated namespace
//!
//! The emulator plays the device's part: it enforces the zoned write rules
//! and the zone state machine, and reports violations as NVMe status codes.

use serde_derive::{Deserialize, Serialize};
use std::{
    ops::Range,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};
use crate::{
    backend::{Backend, Queue},
    cmd::{Cmd, Completion, Op, StatusCode},
    device::{Geometry, IdfyCtrlr, IdfyNs, Ocfs, Oncs, ZonedGeometry},
    scc::{self, CopyFormat, CopyLimits, SourceRange},
    types::*,
    zone::{ReportFilter, ZoneAction, ZoneAttrs, ZoneDescriptor, ZoneState,
           ZoneType},
};

/// Zoned layout of an emulated namespace
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmuZoned {
    pub nzones: u32,
    /// Zone size in LBAs
    pub zone_size: LbaT,
    /// Writable LBAs per zone.  Defaults to the zone size.
    pub zone_capacity: Option<LbaT>,
    /// Zone descriptor extension size in bytes.  0 disables extensions.
    pub zdes: u32,
    /// Limit on simultaneously open zones, if any
    pub max_open: Option<u32>,
}

impl Default for EmuZoned {
    fn default() -> Self {
        EmuZoned {
            nzones: 8,
            zone_size: 64,
            zone_capacity: None,
            zdes: 64,
            max_open: None,
        }
    }
}

impl EmuZoned {
    pub fn max_open(mut self, max_open: u32) -> Self {
        self.max_open = Some(max_open);
        self
    }

    pub fn nzones(mut self, nzones: u32) -> Self {
        self.nzones = nzones;
        self
    }

    pub fn zdes(mut self, zdes: u32) -> Self {
        self.zdes = zdes;
        self
    }

    pub fn zone_capacity(mut self, zcap: LbaT) -> Self {
        self.zone_capacity = Some(zcap);
        self
    }

    pub fn zone_size(mut self, zone_size: LbaT) -> Self {
        self.zone_size = zone_size;
        self
    }

    fn zcap(&self) -> LbaT {
        self.zone_capacity.unwrap_or(self.zone_size)
    }
}

/// Configuration of an emulated namespace.
///
/// URI options for `emu:` have the same names as the fields, plus the
/// [`EmuZoned`] field names, which imply `zoned=1`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmuConfig {
    pub nsid: NsidT,
    pub lba_nbytes: u32,
    /// Metadata bytes per LBA
    pub nbytes_oob: u32,
    /// Namespace size in LBAs.  Ignored for zoned namespaces, whose size
    /// follows from the zone layout.
    pub nlbas: LbaT,
    pub zoned: Option<EmuZoned>,
    /// Maximum Copy Length
    pub mcl: u32,
    /// Maximum Source Range Count, zero-based
    pub msrc: u8,
    /// Maximum Single Source Range Length
    pub mssrl: u16,
    /// Support the Copy command at all
    pub copy: bool,
    pub max_depth: u32,
    /// Number of reaps that pass before a submitted command's completion
    /// becomes available
    pub poll_latency: u32,
}

impl Default for EmuConfig {
    fn default() -> Self {
        EmuConfig {
            nsid: 1,
            lba_nbytes: 512,
            nbytes_oob: 0,
            nlbas: 8192,
            zoned: None,
            mcl: 128,
            msrc: 127,
            mssrl: 128,
            copy: true,
            max_depth: 128,
            poll_latency: 0,
        }
    }
}

fn parse<T: FromStr>(k: &str, v: &str) -> Result<T> {
    v.parse::<T>()
        .map_err(|_| Error::InvalidConfig(format!("Bad value {v:?} for {k}")))
}

fn parse_bool(k: &str, v: &str) -> Result<bool> {
    match v {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::InvalidConfig(format!("Bad value {v:?} for {k}")))
    }
}

impl EmuConfig {
    /// Apply one `key=value` option from a URI
    pub fn apply(&mut self, k: &str, v: &str) -> Result<()> {
        match k {
            "nsid" => self.nsid = parse(k, v)?,
            "lba_nbytes" => self.lba_nbytes = parse(k, v)?,
            "nbytes_oob" => self.nbytes_oob = parse(k, v)?,
            "nlbas" => self.nlbas = parse(k, v)?,
            "zoned" => {
                if parse_bool(k, v)? {
                    self.zoned_mut();
                } else {
                    self.zoned = None;
                }
            },
            "nzones" => self.zoned_mut().nzones = parse(k, v)?,
            "zone_size" => self.zoned_mut().zone_size = parse(k, v)?,
            "zone_capacity" =>
                self.zoned_mut().zone_capacity = Some(parse(k, v)?),
            "zdes" => self.zoned_mut().zdes = parse(k, v)?,
            "max_open" => self.zoned_mut().max_open = Some(parse(k, v)?),
            "mcl" => self.mcl = parse(k, v)?,
            "msrc" => self.msrc = parse(k, v)?,
            "mssrl" => self.mssrl = parse(k, v)?,
            "copy" => self.copy = parse_bool(k, v)?,
            "max_depth" => self.max_depth = parse(k, v)?,
            "poll_latency" => self.poll_latency = parse(k, v)?,
            _ => return Err(Error::InvalidConfig(
                    format!("Unknown emu: option {k:?}")))
        }
        Ok(())
    }

    pub fn copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }

    pub fn copy_limits(mut self, limits: CopyLimits) -> Self {
        self.mcl = limits.mcl;
        self.msrc = limits.msrc;
        self.mssrl = limits.mssrl;
        self
    }

    pub fn lba_nbytes(mut self, lba_nbytes: u32) -> Self {
        self.lba_nbytes = lba_nbytes;
        self
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn nbytes_oob(mut self, nbytes_oob: u32) -> Self {
        self.nbytes_oob = nbytes_oob;
        self
    }

    pub fn nlbas(mut self, nlbas: LbaT) -> Self {
        self.nlbas = nlbas;
        self
    }

    pub fn nsid(mut self, nsid: NsidT) -> Self {
        self.nsid = nsid;
        self
    }

    pub fn poll_latency(mut self, poll_latency: u32) -> Self {
        self.poll_latency = poll_latency;
        self
    }

    pub fn zoned(mut self, zoned: EmuZoned) -> Self {
        self.zoned = Some(zoned);
        self
    }

    fn limits(&self) -> CopyLimits {
        CopyLimits { mcl: self.mcl, msrc: self.msrc, mssrl: self.mssrl }
    }

    /// Namespace size in LBAs, or `None` if it overflows.
    fn checked_nsze(&self) -> Option<LbaT> {
        match &self.zoned {
            Some(z) => LbaT::from(z.nzones).checked_mul(z.zone_size),
            None => Some(self.nlbas)
        }
    }

    /// Only meaningful once the config has been validated.
    fn nsze(&self) -> LbaT {
        self.checked_nsze().unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(Error::InvalidConfig(msg.to_owned()));
        if self.lba_nbytes == 0 {
            return bad("lba_nbytes must be nonzero");
        }
        if self.max_depth == 0 {
            return bad("max_depth must be nonzero");
        }
        if let Some(z) = &self.zoned {
            if z.nzones == 0 || z.zone_size == 0 {
                return bad("zoned namespaces need nonzero nzones and zone_size");
            }
            if z.zcap() > z.zone_size {
                return bad("zone_capacity may not exceed zone_size");
            }
        }
        let Some(nsze) = self.checked_nsze() else {
            return bad("nzones * zone_size overflows");
        };
        if nsze == 0 {
            return bad("namespace may not be empty");
        }
        // The media lives in memory, so it must be addressable
        let fits = |bs: u32| nsze.checked_mul(LbaT::from(bs))
            .and_then(|n| isize::try_from(n).ok())
            .is_some();
        if !fits(self.lba_nbytes) || !fits(self.nbytes_oob) {
            return bad("namespace is too large to emulate");
        }
        Ok(())
    }

    fn zoned_mut(&mut self) -> &mut EmuZoned {
        self.zoned.get_or_insert_with(EmuZoned::default)
    }
}

/// A device-side error: the status, and the command-specific result that
/// accompanies it.
struct Failure {
    sc: StatusCode,
    result: u64,
}

impl From<StatusCode> for Failure {
    fn from(sc: StatusCode) -> Self {
        Failure { sc, result: 0 }
    }
}

type DevResult = std::result::Result<u64, Failure>;

#[derive(Debug)]
struct Zone {
    zslba: LbaT,
    zcap: LbaT,
    wp: LbaT,
    zs: ZoneState,
    ext: Option<Box<[u8]>>,
}

impl Zone {
    fn descriptor(&self) -> ZoneDescriptor {
        let mut za = ZoneAttrs::default();
        za.set_zdev(self.ext.is_some());
        ZoneDescriptor {
            zt: ZoneType::SeqWriteRequired,
            zs: self.zs,
            za,
            zcap: self.zcap,
            zslba: self.zslba,
            wp: self.wp,
            ext: self.ext.clone()
        }
    }
}

/// The emulated medium, and all of its state
struct Media {
    cfg: EmuConfig,
    nsze: LbaT,
    data: Vec<u8>,
    oob: Vec<u8>,
    /// Empty for conventional namespaces
    zones: Vec<Zone>,
}

impl Media {
    fn new(cfg: EmuConfig) -> Self {
        let nsze = cfg.nsze();
        let zones = match &cfg.zoned {
            Some(z) => (0..LbaT::from(z.nzones)).map(|i| Zone {
                zslba: i * z.zone_size,
                zcap: z.zcap(),
                wp: i * z.zone_size,
                zs: ZoneState::Empty,
                ext: None
            }).collect(),
            None => Vec::new()
        };
        Media {
            cfg,
            nsze,
            data: vec![0; (nsze * LbaT::from(cfg.lba_nbytes)) as usize],
            oob: vec![0; (nsze * LbaT::from(cfg.nbytes_oob)) as usize],
            zones,
        }
    }

    fn byte_range(&self, slba: LbaT, nlb: LbaT) -> Range<usize> {
        let bs = LbaT::from(self.cfg.lba_nbytes);
        (slba * bs) as usize..((slba + nlb) * bs) as usize
    }

    fn oob_range(&self, slba: LbaT, nlb: LbaT) -> Range<usize> {
        let bs = LbaT::from(self.cfg.nbytes_oob);
        (slba * bs) as usize..((slba + nlb) * bs) as usize
    }

    fn check_range(&self, slba: LbaT, nlb: LbaT)
        -> std::result::Result<(), StatusCode>
    {
        match slba.checked_add(nlb) {
            Some(end) if end <= self.nsze => Ok(()),
            _ => Err(StatusCode::LBA_OUT_OF_RANGE)
        }
    }

    fn check_xfer(&self, nlb: LbaT, data: usize, meta: Option<usize>)
        -> std::result::Result<(), StatusCode>
    {
        let bad_data = nlb * LbaT::from(self.cfg.lba_nbytes) != data as LbaT;
        let bad_meta = meta.map(|m| {
            nlb * LbaT::from(self.cfg.nbytes_oob) != m as LbaT
        }).unwrap_or(false);
        if nlb == 0 || bad_data || bad_meta {
            Err(StatusCode::INVALID_FIELD)
        } else {
            Ok(())
        }
    }

    fn zone_size(&self) -> Option<LbaT> {
        self.cfg.zoned.as_ref().map(|z| z.zone_size)
    }

    fn zone_idx(&self, lba: LbaT) -> Option<usize> {
        self.zone_size().map(|zs| (lba / zs) as usize)
    }

    /// Find the zone starting at `zslba`
    fn zone_start(&self, zslba: LbaT) -> std::result::Result<usize, StatusCode>
    {
        let zsze = self.zone_size().ok_or(StatusCode::INVALID_OPCODE)?;
        if zslba >= self.nsze {
            Err(StatusCode::LBA_OUT_OF_RANGE)
        } else if zslba % zsze != 0 {
            Err(StatusCode::INVALID_FIELD)
        } else {
            Ok((zslba / zsze) as usize)
        }
    }

    fn nopen(&self) -> usize {
        self.zones.iter().filter(|z| z.zs.is_open()).count()
    }

    /// Would opening one more zone exceed the open zone limit?
    fn check_open_limit(&self) -> std::result::Result<(), StatusCode> {
        let max_open = self.cfg.zoned.as_ref().and_then(|z| z.max_open);
        match max_open {
            Some(max) if self.nopen() >= max as usize =>
                Err(StatusCode::TOO_MANY_OPEN_ZONES),
            _ => Ok(())
        }
    }

    /// Check whether `nlb` blocks may be written at `slba`.  Returns the
    /// index of the zone that will be written, for zoned namespaces.
    fn check_write(&self, slba: LbaT, nlb: LbaT)
        -> std::result::Result<Option<usize>, StatusCode>
    {
        self.check_range(slba, nlb)?;
        let Some(zi) = self.zone_idx(slba) else {
            return Ok(None);
        };
        let z = &self.zones[zi];
        match z.zs {
            ZoneState::Full => return Err(StatusCode::ZONE_FULL),
            ZoneState::ReadOnly => return Err(StatusCode::ZONE_READ_ONLY),
            ZoneState::Offline => return Err(StatusCode::ZONE_OFFLINE),
            _ => ()
        }
        if slba != z.wp {
            return Err(StatusCode::ZONE_INVALID_WRITE);
        }
        if slba + nlb > z.zslba + z.zcap {
            return Err(StatusCode::ZONE_BOUNDARY_ERROR);
        }
        if matches!(z.zs, ZoneState::Empty | ZoneState::Closed) {
            self.check_open_limit()?;
        }
        Ok(Some(zi))
    }

    /// Store data that has already passed `check_write`, and advance the
    /// write pointer.
    fn commit(&mut self, slba: LbaT, nlb: LbaT, data: &[u8],
              meta: Option<&[u8]>, zi: Option<usize>)
    {
        let r = self.byte_range(slba, nlb);
        self.data[r].copy_from_slice(data);
        if let Some(meta) = meta {
            let r = self.oob_range(slba, nlb);
            self.oob[r].copy_from_slice(meta);
        }
        if let Some(zi) = zi {
            let z = &mut self.zones[zi];
            z.wp += nlb;
            if z.wp == z.zslba + z.zcap {
                z.zs = ZoneState::Full;
            } else if matches!(z.zs, ZoneState::Empty | ZoneState::Closed) {
                z.zs = ZoneState::ImplicitlyOpened;
            }
        }
    }

    fn check_readable(&self, slba: LbaT, nlb: LbaT)
        -> std::result::Result<(), StatusCode>
    {
        self.check_range(slba, nlb)?;
        if let (Some(first), Some(last)) =
            (self.zone_idx(slba), self.zone_idx(slba + nlb - 1))
        {
            if self.zones[first..=last].iter()
                .any(|z| z.zs == ZoneState::Offline)
            {
                return Err(StatusCode::ZONE_OFFLINE);
            }
        }
        Ok(())
    }

    fn read(&self, slba: LbaT, nlb: LbaT, data: &mut [u8],
            meta: Option<&mut [u8]>) -> DevResult
    {
        self.check_xfer(nlb, data.len(), meta.as_ref().map(|m| m.len()))?;
        self.check_readable(slba, nlb)?;
        data.copy_from_slice(&self.data[self.byte_range(slba, nlb)]);
        if let Some(meta) = meta {
            meta.copy_from_slice(&self.oob[self.oob_range(slba, nlb)]);
        }
        Ok(0)
    }

    fn write(&mut self, slba: LbaT, nlb: LbaT, data: &[u8],
             meta: Option<&[u8]>) -> DevResult
    {
        self.check_xfer(nlb, data.len(), meta.map(<[u8]>::len))?;
        let zi = self.check_write(slba, nlb)?;
        self.commit(slba, nlb, data, meta, zi);
        Ok(0)
    }

    fn append(&mut self, zslba: LbaT, nlb: LbaT, data: &[u8],
              meta: Option<&[u8]>) -> DevResult
    {
        self.check_xfer(nlb, data.len(), meta.map(<[u8]>::len))?;
        let zi = self.zone_start(zslba)?;
        let wp = self.zones[zi].wp;
        let zi = self.check_write(wp, nlb)?;
        self.commit(wp, nlb, data, meta, zi);
        Ok(wp)
    }

    fn zone_mgmt(&mut self, zslba: LbaT, action: ZoneAction,
                 ext: Option<&[u8]>) -> DevResult
    {
        use ZoneState::*;

        let zi = self.zone_start(zslba)?;
        let zdes = self.cfg.zoned.as_ref().map(|z| z.zdes).unwrap_or(0);
        let zs = self.zones[zi].zs;
        match (zs, action) {
            (ReadOnly, ZoneAction::Offline) | (Offline, ZoneAction::Offline)
                => (),
            (ReadOnly, _) => return Err(StatusCode::ZONE_READ_ONLY.into()),
            (Offline, _) => return Err(StatusCode::ZONE_OFFLINE.into()),
            _ => ()
        }
        if let Some(ext) = ext {
            if action != ZoneAction::Open || ext.len() != zdes as usize ||
                zdes == 0
            {
                return Err(StatusCode::INVALID_FIELD.into());
            }
            if zs != Empty {
                return Err(StatusCode::ZONE_INVALID_TRANSITION.into());
            }
        }
        let next = match (action, zs) {
            (ZoneAction::Open, Empty | Closed) => {
                self.check_open_limit()?;
                ExplicitlyOpened
            },
            (ZoneAction::Open, ImplicitlyOpened | ExplicitlyOpened) =>
                ExplicitlyOpened,
            (ZoneAction::Close, ImplicitlyOpened | ExplicitlyOpened) => {
                let z = &self.zones[zi];
                if z.wp == z.zslba && z.ext.is_none() {
                    Empty
                } else {
                    Closed
                }
            },
            (ZoneAction::Close, Closed) => Closed,
            (ZoneAction::Finish, Empty | ImplicitlyOpened | ExplicitlyOpened |
             Closed | Full) => Full,
            (ZoneAction::Reset, Empty | ImplicitlyOpened | ExplicitlyOpened |
             Closed | Full) => Empty,
            (ZoneAction::Offline, ReadOnly | Offline) => Offline,
            _ => return Err(StatusCode::ZONE_INVALID_TRANSITION.into())
        };
        match next {
            Full => {
                let z = &mut self.zones[zi];
                z.wp = z.zslba + z.zcap;
            },
            Empty if action == ZoneAction::Reset => {
                let zsze = self.zone_size().unwrap_or(0);
                let r = self.byte_range(zslba, zsze);
                self.data[r].fill(0);
                let r = self.oob_range(zslba, zsze);
                self.oob[r].fill(0);
                let z = &mut self.zones[zi];
                z.wp = z.zslba;
                z.ext = None;
            },
            _ => ()
        }
        let z = &mut self.zones[zi];
        z.zs = next;
        if let Some(ext) = ext {
            z.ext = Some(Box::from(ext));
        }
        Ok(0)
    }

    /// Copy from the source range list `descrs`, in wire format.
    fn copy(&mut self, sdlba: LbaT, descrs: &[u8], format: CopyFormat)
        -> DevResult
    {
        if !self.cfg.copy {
            return Err(StatusCode::INVALID_OPCODE.into());
        }
        let Ok(range) = SourceRange::decode(descrs, format) else {
            return Err(StatusCode::INVALID_FIELD.into());
        };
        if scc::validate(&range, &self.cfg.limits()).is_err() {
            return Err(StatusCode::CMD_SIZE_LIMIT_EXCEEDED.into());
        }
        let total = range.nlb_total();
        let mut data = Vec::with_capacity(self.byte_range(0, total).len());
        let mut oob = Vec::with_capacity(self.oob_range(0, total).len());
        for (i, e) in range.iter().enumerate() {
            let nlb = LbaT::from(e.nblocks());
            self.check_readable(e.slba, nlb)
                .map_err(|sc| Failure { sc, result: i as u64 })?;
            data.extend_from_slice(&self.data[self.byte_range(e.slba, nlb)]);
            oob.extend_from_slice(&self.oob[self.oob_range(e.slba, nlb)]);
        }
        let zi = self.check_write(sdlba, total)?;
        self.commit(sdlba, total, &data, Some(&oob), zi);
        Ok(0)
    }

    fn exec(&mut self, cmd: &mut Cmd) -> Completion {
        let opc = cmd.opc();
        let r = if cmd.nsid != self.cfg.nsid {
            Err(StatusCode::INVALID_NAMESPACE.into())
        } else {
            match &mut cmd.op {
                Op::Read { slba, nlb, data, meta } =>
                    self.read(*slba, LbaT::from(*nlb), &mut data[..],
                              meta.as_deref_mut()),
                Op::Write { slba, nlb, data, meta } =>
                    self.write(*slba, LbaT::from(*nlb), &data[..],
                               meta.as_deref()),
                Op::Append { zslba, nlb, data, meta } =>
                    self.append(*zslba, LbaT::from(*nlb), &data[..],
                                meta.as_deref()),
                Op::ZoneMgmtSend { zslba, action, ext } =>
                    self.zone_mgmt(*zslba, *action, ext.as_deref()),
                Op::Copy { sdlba, range, format } =>
                    self.copy(*sdlba, &range.encode(*format), *format),
            }
        };
        match r {
            Ok(result) => Completion::success(opc, result),
            Err(f) => Completion::error(opc, f.sc.dnr(), f.result)
        }
    }

    fn zone_report(&self, slba: LbaT, filter: ReportFilter)
        -> Vec<ZoneDescriptor>
    {
        let Some(first) = self.zone_idx(slba) else {
            return Vec::new();
        };
        self.zones.iter()
            .skip(first)
            .filter(|z| filter.matches(z.zs))
            .map(Zone::descriptor)
            .collect()
    }
}

/// An in-memory emulated namespace.
///
/// Clones share the same medium.
#[derive(Clone)]
pub struct Emu {
    cfg: EmuConfig,
    media: Arc<Mutex<Media>>,
}

impl Emu {
    pub fn new(cfg: EmuConfig) -> Result<Self> {
        cfg.validate()?;
        let media = Arc::new(Mutex::new(Media::new(cfg)));
        Ok(Emu { cfg, media })
    }

    pub fn config(&self) -> &EmuConfig {
        &self.cfg
    }

    fn media(&self) -> MutexGuard<'_, Media> {
        self.media.lock().unwrap()
    }

    /// Force the zone starting at `zslba` into state `zs`, as a device might
    /// after a media failure.
    pub fn set_zone_state(&self, zslba: LbaT, zs: ZoneState) -> Result<()> {
        let mut media = self.media();
        if media.cfg.zoned.is_none() {
            return Err(Error::NotZoned);
        }
        let zi = media.zone_start(zslba).map_err(|_| Error::NoZone)?;
        media.zones[zi].zs = zs;
        Ok(())
    }
}

impl Backend for Emu {
    fn name(&self) -> &'static str {
        "emu"
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            nsid: self.cfg.nsid,
            nsze: self.cfg.nsze(),
            lba_nbytes: self.cfg.lba_nbytes,
            nbytes_oob: self.cfg.nbytes_oob,
            zoned: self.cfg.zoned.map(|z| ZonedGeometry {
                nzones: z.nzones,
                zone_size: z.zone_size,
                zdes: z.zdes
            })
        }
    }

    fn idfy_ctrlr(&self) -> IdfyCtrlr {
        let mut oncs = Oncs::default();
        oncs.set_copy(self.cfg.copy);
        let mut ocfs = Ocfs::default();
        ocfs.set_fmt0(self.cfg.copy);
        IdfyCtrlr { oncs, ocfs }
    }

    fn idfy_ns(&self) -> IdfyNs {
        IdfyNs {
            nsze: self.cfg.nsze(),
            mcl: self.cfg.mcl,
            msrc: self.cfg.msrc,
            mssrl: self.cfg.mssrl
        }
    }

    fn execute(&self, cmd: &mut Cmd)
        -> std::result::Result<Completion, ExecError>
    {
        Ok(self.media().exec(cmd))
    }

    fn max_depth(&self) -> u32 {
        self.cfg.max_depth
    }

    fn queue(&self, depth: u32)
        -> std::result::Result<Box<dyn Queue>, ExecError>
    {
        Ok(Box::new(EmuQueue {
            media: self.media.clone(),
            latency: self.cfg.poll_latency,
            pending: Vec::with_capacity(depth as usize)
        }))
    }

    fn zone_report(&self, slba: LbaT, filter: ReportFilter)
        -> std::result::Result<Vec<ZoneDescriptor>, ExecError>
    {
        Ok(self.media().zone_report(slba, filter))
    }
}

struct Pending {
    slot: SlotT,
    completion: Completion,
    /// Reaps remaining before the completion is visible
    ready_in: u32,
}

/// Commands execute against the medium at submission.  Their completions
/// become visible after the configured number of reaps.
struct EmuQueue {
    media: Arc<Mutex<Media>>,
    latency: u32,
    pending: Vec<Pending>,
}

impl Queue for EmuQueue {
    fn submit(&mut self, slot: SlotT, cmd: &mut Cmd)
        -> std::result::Result<(), ExecError>
    {
        let completion = self.media.lock().unwrap().exec(cmd);
        self.pending.push(Pending { slot, completion, ready_in: self.latency });
        Ok(())
    }

    fn reap(&mut self, wait: bool, out: &mut Vec<(SlotT, Completion)>)
        -> std::result::Result<(), ExecError>
    {
        loop {
            let before = out.len();
            self.pending.retain_mut(|p| {
                if p.ready_in == 0 {
                    out.push((p.slot, p.completion));
                    false
                } else {
                    p.ready_in -= 1;
                    true
                }
            });
            if !wait || out.len() > before || self.pending.is_empty() {
                return Ok(());
            }
        }
    }

    fn terminate(&mut self) {
        self.pending.clear();
    }
}

// LCOV_EXCL_STOP
