// vim: tw=80
//! Zoned namespace management tools

use clap::Parser;
use nvmio_core::{
    device::Device,
    executor::Mode,
    util::{buf_diff, buf_fill, Fill},
    zone::{self, ReportFilter, ZoneAction, ZoneState},
    LbaT,
    NsidT,
};

use crate::{check, Error, Result};

/// Explicitly open an empty zone with zone descriptor extension data, and
/// verify that the device reports it back.
#[derive(Parser, Clone, Debug)]
pub(crate) struct OpenZdext {
    /// Start LBA of the zone.  Defaults to the first usable zone.
    #[clap(long)]
    pub(crate) slba: Option<LbaT>,
}

impl OpenZdext {
    pub(crate) fn main(self, dev: &Device, nsid: NsidT) -> Result<()> {
        let zdes = dev.geometry().zoned.map(|z| z.zdes).unwrap_or(0) as usize;
        if zdes == 0 {
            return Err(Error::Verification(
                "Device does not support zone descriptor extensions".into()));
        }
        let ext = dev.buf_alloc(zdes);
        buf_fill(&mut ext.try_mut().unwrap(), Fill::Anum);

        let before = zone::find_usable(dev, self.slba)?;
        println!("Before:");
        println!("{before}");

        let o = zone::manage(dev, nsid, before.zslba, ZoneAction::Reset, None,
                             Mode::Sync)?;
        if let Some(c) = o.completion() {
            check(c)?;
        }
        println!("Sending explicit open with {zdes} bytes of extension data");
        let o = zone::manage(dev, nsid, before.zslba, ZoneAction::Open,
                             Some(ext.try_const().unwrap()), Mode::Sync)?;
        if let Some(c) = o.completion() {
            check(c)?;
        }

        let report = zone::report(dev, nsid, before.zslba, ReportFilter::All)?;
        let after = report.descrs.into_iter()
            .next()
            .ok_or(nvmio_core::Error::NoZone)?;
        println!("After:");
        println!("{after}");

        let ext_after = after.ext.as_deref().unwrap_or(&[]);
        let diff = buf_diff(&ext.try_const().unwrap(), ext_after);
        if diff > 0 {
            return Err(Error::Verification(format!(
                "zone descriptor extension differs in {diff} bytes")));
        }
        if !after.za.zdev() {
            return Err(Error::Verification("za.zdev is not set".into()));
        }
        if after.zs != ZoneState::ExplicitlyOpened {
            return Err(Error::Verification(format!(
                "unexpected zone state {:?}", after.zs)));
        }
        Ok(())
    }
}

#[derive(Parser, Clone, Debug)]
/// Zone management and reporting
pub(crate) enum ZndCmd {
    OpenZdext(OpenZdext),
}
