// vim: tw=80
//! A conventional namespace backed by a regular file

use nix::sys::uio::{pread, pwrite};
use serde_derive::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    path::Path,
    str::FromStr,
    sync::Arc,
};
use crate::{
    backend::{Backend, Queue},
    cmd::{Cmd, Completion, Op, Opc, StatusCode},
    device::{Geometry, IdfyCtrlr, IdfyNs, Ocfs, Oncs},
    scc::{self, CopyLimits, SourceRange},
    types::*,
    zone::{ReportFilter, ZoneDescriptor},
};

/// Configuration of a file-backed namespace
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub lba_nbytes: u32,
    pub mcl: u32,
    pub msrc: u8,
    pub mssrl: u16,
    pub max_depth: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            lba_nbytes: 512,
            mcl: 128,
            msrc: 127,
            mssrl: 128,
            max_depth: 64,
        }
    }
}

impl FileConfig {
    /// Apply one `key=value` option from a URI
    pub fn apply(&mut self, k: &str, v: &str) -> Result<()> {
        fn parse<T: FromStr>(k: &str, v: &str) -> Result<T> {
            v.parse::<T>().map_err(|_| Error::InvalidConfig(
                    format!("Bad value {v:?} for {k}")))
        }
        match k {
            "lba_nbytes" => self.lba_nbytes = parse(k, v)?,
            "mcl" => self.mcl = parse(k, v)?,
            "msrc" => self.msrc = parse(k, v)?,
            "mssrl" => self.mssrl = parse(k, v)?,
            "max_depth" => self.max_depth = parse(k, v)?,
            _ => return Err(Error::InvalidConfig(
                    format!("Unknown file: option {k:?}")))
        }
        Ok(())
    }

    pub fn lba_nbytes(mut self, lba_nbytes: u32) -> Self {
        self.lba_nbytes = lba_nbytes;
        self
    }

    fn limits(&self) -> CopyLimits {
        CopyLimits { mcl: self.mcl, msrc: self.msrc, mssrl: self.mssrl }
    }
}

struct Inner {
    file: File,
    cfg: FileConfig,
    nsze: LbaT,
}

/// Fill all of `buf` from `off`.  Bytes beyond EOF read as zero.
fn pread_all(file: &File, buf: &mut [u8], off: u64) -> nix::Result<()> {
    let mut done = 0;
    while done < buf.len() {
        let n = pread(file, &mut buf[done..], (off + done as u64) as i64)?;
        if n == 0 {
            buf[done..].fill(0);
            break;
        }
        done += n;
    }
    Ok(())
}

fn pwrite_all(file: &File, buf: &[u8], off: u64) -> nix::Result<()> {
    let mut done = 0;
    while done < buf.len() {
        done += pwrite(file, &buf[done..], (off + done as u64) as i64)?;
    }
    Ok(())
}

impl Inner {
    fn offset(&self, lba: LbaT) -> u64 {
        lba * u64::from(self.cfg.lba_nbytes)
    }

    fn check_range(&self, slba: LbaT, nlb: LbaT)
        -> std::result::Result<(), StatusCode>
    {
        match slba.checked_add(nlb) {
            Some(end) if end <= self.nsze => Ok(()),
            _ => Err(StatusCode::LBA_OUT_OF_RANGE)
        }
    }

    fn copy(&self, sdlba: LbaT, range: &SourceRange)
        -> std::result::Result<Completion, nix::Error>
    {
        let fail = |sc: StatusCode, i: usize|
            Ok(Completion::error(Opc::Copy, sc.dnr(), i as u64));
        if scc::validate(range, &self.cfg.limits()).is_err() {
            return fail(StatusCode::CMD_SIZE_LIMIT_EXCEEDED, 0);
        }
        let total = range.nlb_total();
        if self.check_range(sdlba, total).is_err() {
            return fail(StatusCode::LBA_OUT_OF_RANGE, 0);
        }
        let bs = self.cfg.lba_nbytes as usize;
        let mut buf = vec![0u8; total as usize * bs];
        let mut done = 0;
        for (i, e) in range.iter().enumerate() {
            let nlb = LbaT::from(e.nblocks());
            if let Err(sc) = self.check_range(e.slba, nlb) {
                return fail(sc, i);
            }
            let len = nlb as usize * bs;
            pread_all(&self.file, &mut buf[done..done + len],
                      self.offset(e.slba))?;
            done += len;
        }
        pwrite_all(&self.file, &buf, self.offset(sdlba))?;
        Ok(Completion::success(Opc::Copy, 0))
    }

    fn exec(&self, cmd: &mut Cmd) -> Completion {
        let opc = cmd.opc();
        let r = match &mut cmd.op {
            Op::Read { slba, nlb, data, meta: None } => {
                match self.check_range(*slba, LbaT::from(*nlb)) {
                    Ok(()) => pread_all(&self.file, &mut data[..],
                                        self.offset(*slba))
                        .map(|_| Completion::success(opc, 0)),
                    Err(sc) => Ok(Completion::error(opc, sc.dnr(), 0))
                }
            },
            Op::Write { slba, nlb, data, meta: None } => {
                match self.check_range(*slba, LbaT::from(*nlb)) {
                    Ok(()) => pwrite_all(&self.file, &data[..],
                                         self.offset(*slba))
                        .map(|_| Completion::success(opc, 0)),
                    Err(sc) => Ok(Completion::error(opc, sc.dnr(), 0))
                }
            },
            Op::Read {..} | Op::Write {..} =>
                Ok(Completion::error(opc, StatusCode::INVALID_FIELD.dnr(), 0)),
            Op::Copy { sdlba, range, .. } => self.copy(*sdlba, range),
            Op::Append {..} | Op::ZoneMgmtSend {..} =>
                Ok(Completion::error(opc, StatusCode::INVALID_OPCODE.dnr(), 0))
        };
        r.unwrap_or_else(|errno| Completion::transport(opc, errno))
    }
}

/// A conventional namespace stored in a regular file.
///
/// The namespace size is the file size, rounded down to whole blocks.
/// Metadata and zones are not supported.
#[derive(Clone)]
pub struct FileBackend {
    inner: Arc<Inner>,
}

impl FileBackend {
    pub fn open<P: AsRef<Path>>(path: P, cfg: FileConfig) -> Result<Self> {
        if cfg.lba_nbytes == 0 || cfg.max_depth == 0 {
            return Err(Error::InvalidConfig(
                    "lba_nbytes and max_depth must be nonzero".to_owned()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .map_err(|e| Error::InvalidConfig(
                    format!("{}: {}", path.as_ref().display(), e)))?;
        let len = file.metadata().map_err(ExecError::from)?.len();
        let nsze = len / u64::from(cfg.lba_nbytes);
        if nsze == 0 {
            return Err(Error::InvalidConfig(
                    format!("{} is smaller than one block",
                            path.as_ref().display())));
        }
        Ok(FileBackend { inner: Arc::new(Inner { file, cfg, nsze }) })
    }
}

impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            nsid: 1,
            nsze: self.inner.nsze,
            lba_nbytes: self.inner.cfg.lba_nbytes,
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
        let cfg = &self.inner.cfg;
        IdfyNs {
            nsze: self.inner.nsze,
            mcl: cfg.mcl,
            msrc: cfg.msrc,
            mssrl: cfg.mssrl
        }
    }

    fn execute(&self, cmd: &mut Cmd)
        -> std::result::Result<Completion, ExecError>
    {
        Ok(self.inner.exec(cmd))
    }

    fn max_depth(&self) -> u32 {
        self.inner.cfg.max_depth
    }

    fn queue(&self, depth: u32)
        -> std::result::Result<Box<dyn Queue>, ExecError>
    {
        Ok(Box::new(FileQueue {
            inner: self.inner.clone(),
            done: VecDeque::with_capacity(depth as usize)
        }))
    }

    fn zone_report(&self, _slba: LbaT, _filter: ReportFilter)
        -> std::result::Result<Vec<ZoneDescriptor>, ExecError>
    {
        Ok(Vec::new())
    }
}

/// Positional I/O is synchronous, so commands complete during submission.
struct FileQueue {
    inner: Arc<Inner>,
    done: VecDeque<(SlotT, Completion)>,
}

impl Queue for FileQueue {
    fn submit(&mut self, slot: SlotT, cmd: &mut Cmd)
        -> std::result::Result<(), ExecError>
    {
        let c = self.inner.exec(cmd);
        self.done.push_back((slot, c));
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
