// vim: tw=80
//! Simple Copy support probing and verification

use std::sync::{Arc, Mutex};

use clap::Parser;
use nvmio_core::{
    cmd::{Cmd, Completion},
    device::Device,
    executor::Mode,
    scc::{self, CopyFormat, SourceRange},
    util::{buf_diff, buf_fill, Fill},
    NsidT,
};

use crate::{check, Error, Result};

fn idfy_pr(dev: &Device) {
    let ctrlr = dev.idfy_ctrlr();
    let ns = dev.idfy_ns();
    println!("idfy_ctrlr:");
    println!("  oncs: {{copy: {}}}", ctrlr.oncs.copy());
    println!("  ocfs: {{fmt0: {}, fmt1: {}}}", ctrlr.ocfs.fmt0(),
             ctrlr.ocfs.fmt1());
    println!("idfy_ns:");
    println!("  nsze: {:#x}", ns.nsze);
    println!("  mcl: {}", ns.mcl);
    println!("  msrc: {}", ns.msrc);
    println!("  mssrl: {}", ns.mssrl);
}

fn range_pr(range: &SourceRange) {
    println!("source_range:");
    println!("  nr: {}", range.len() - 1);
    for (i, e) in range.iter().enumerate() {
        println!("  - {{idx: {i}, slba: {:#x}, nlb: {}}}", e.slba, e.nlb);
    }
}

/// Take the completion that a callback stored.  It's an error if the callback
/// never ran, or if the command failed.
pub(crate) fn delivered(done: &Mutex<Option<Completion>>)
    -> Result<Completion>
{
    let c = done.lock().unwrap().take()
        .ok_or_else(|| Error::Verification(
            "no completion was delivered for the copy".into()))?;
    check(c)
}

/// Write `tlbas` blocks of known data, copy them with one Simple Copy, and
/// check what lands at the destination.
fn scopy_verify(dev: &Device, nsid: NsidT, tlbas: u64, sync: bool)
    -> Result<()>
{
    let ns = dev.idfy_ns();
    if tlbas == 0 || tlbas > u64::from(ns.mcl) ||
        tlbas > u64::from(ns.msrc) + 1
    {
        return Err(Error::Verification(format!(
            "Cannot copy {tlbas} blocks with mcl: {}, msrc: {}",
            ns.mcl, ns.msrc)));
    }
    let range = scc::build_range((0..tlbas).map(|lba| (lba, 1)))
        .map_err(nvmio_core::Error::from)?;
    let sdlba = range.dest_after_last();
    let lba_nbytes = dev.lba_nbytes() as usize;
    let nbytes = tlbas as usize * lba_nbytes;

    let dbs = dev.buf_alloc(nbytes);
    buf_fill(&mut dbs.try_mut().unwrap(), Fill::Anum);
    let vbs = dev.buf_alloc(nbytes);
    buf_fill(&mut vbs.try_mut().unwrap(), Fill::Zero);

    // Known data at the sources, zeros at the destination
    let mut db = dbs.try_const().unwrap();
    for e in range.iter() {
        let chunk = db.split_to(e.nblocks() as usize * lba_nbytes);
        let cmd = Cmd::write(nsid, e.slba, e.nblocks(), chunk, None);
        check(dev.execute(cmd)?)?;
    }
    let cmd = Cmd::write(nsid, sdlba, tlbas as u32, vbs.try_const().unwrap(),
                         None);
    check(dev.execute(cmd)?)?;

    println!("Copying:");
    range_pr(&range);
    println!("To:");
    println!("sdlba: {sdlba:#018x}");

    if sync {
        println!("Using synchronous mode");
        let o = scc::execute_copy(dev, nsid, sdlba, range, CopyFormat::Zero,
                                  Mode::Sync)?;
        if let Some(c) = o.completion() {
            check(c)?;
        }
    } else {
        println!("Using asynchronous mode");
        let mut ctx = dev.async_init(2)?;
        let done = Arc::new(Mutex::new(None));
        let done2 = done.clone();
        let cb = Box::new(move |c: Completion| {
            *done2.lock().unwrap() = Some(c);
        });
        scc::execute_copy(dev, nsid, sdlba, range, CopyFormat::Zero,
                          Mode::Async(&mut ctx, cb))?;
        ctx.wait_all()?;
        ctx.terminate().map_err(nvmio_core::Error::from)?;
        delivered(&done)?;
    }

    let cmd = Cmd::read(nsid, sdlba, tlbas as u32, vbs.try_mut().unwrap(),
                        None);
    check(dev.execute(cmd)?)?;
    let diff = buf_diff(&dbs.try_const().unwrap(), &vbs.try_const().unwrap());
    if diff > 0 {
        return Err(Error::Verification(format!(
            "verification failed, diff: {diff}")));
    }
    Ok(())
}

/// Report whether the device supports Simple Copy
#[derive(Parser, Clone, Debug)]
pub(crate) struct Support {}

impl Support {
    pub(crate) fn main(self, dev: &Device) -> Result<()> {
        idfy_pr(dev);
        let support = scc::support(dev);
        for m in support.missing() {
            println!("Missing: {m}");
        }
        scc::require_support(dev)?;
        Ok(())
    }
}

/// Print the identify fields that describe Simple Copy
#[derive(Parser, Clone, Debug)]
pub(crate) struct Idfy {}

impl Idfy {
    pub(crate) fn main(self, dev: &Device) -> Result<()> {
        idfy_pr(dev);
        Ok(())
    }
}

/// Copy a single block and verify the result
#[derive(Parser, Clone, Debug)]
pub(crate) struct Scopy {
    /// Copy synchronously instead of through an asynchronous context
    #[clap(long)]
    pub(crate) sync: bool,
}

impl Scopy {
    pub(crate) fn main(self, dev: &Device, nsid: NsidT) -> Result<()> {
        scopy_verify(dev, nsid, 1, self.sync)
    }
}

/// Copy as many single-block ranges as the device allows, and verify the
/// result
#[derive(Parser, Clone, Debug)]
pub(crate) struct ScopyMsrc {
    /// Copy synchronously instead of through an asynchronous context
    #[clap(long)]
    pub(crate) sync: bool,
}

impl ScopyMsrc {
    pub(crate) fn main(self, dev: &Device, nsid: NsidT) -> Result<()> {
        let tlbas = u64::from(dev.idfy_ns().msrc) + 1;
        scopy_verify(dev, nsid, tlbas, self.sync)
    }
}

#[derive(Parser, Clone, Debug)]
/// Simple Copy Command tools
pub(crate) enum SccCmd {
    Idfy(Idfy),
    Scopy(Scopy),
    ScopyMsrc(ScopyMsrc),
    Support(Support),
}
