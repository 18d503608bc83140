// vim: tw=80
//! Whole-zone synchronous I/O

use std::{fs, num::NonZeroU32, path::PathBuf, time::Instant};

use clap::Parser;
use nvmio_core::{
    device::Device,
    util::{buf_fill, Fill},
    zone::{self, ZoneDescriptor, ZoneState},
    LbaT,
    NsidT,
};

use crate::{batch, check, timer_pr, Result};

/// Pick the zone named by `--slba`, or else the first empty one.
fn select(dev: &Device, slba: Option<LbaT>) -> Result<ZoneDescriptor> {
    let descr = match slba {
        Some(slba) => zone::descr_from_dev(dev, slba)?,
        None => zone::descr_from_dev_in_state(dev, ZoneState::Empty)?
    };
    println!("Using the following zone:");
    println!("{descr}");
    Ok(descr)
}

/// Read a whole zone
#[derive(Parser, Clone, Debug)]
pub(crate) struct Read {
    /// Start LBA of the zone.  Defaults to the first empty zone.
    #[clap(long)]
    pub(crate) slba:        Option<LbaT>,
    /// Blocks per command.  Defaults to one.
    #[clap(long)]
    pub(crate) batch:       Option<NonZeroU32>,
    /// Save the data read to this file
    #[clap(long)]
    pub(crate) data_output: Option<PathBuf>,
}

impl Read {
    pub(crate) fn main(self, dev: &Device, nsid: NsidT) -> Result<()> {
        let descr = select(dev, self.slba)?;
        let nbytes = descr.zcap as usize * dev.lba_nbytes() as usize;
        let dbs = dev.buf_alloc(nbytes);
        println!("Read from uri: {:?}", dev.uri());
        let start = Instant::now();
        let db = dbs.try_mut().unwrap();
        check(zone::read(dev, nsid, &descr, db, batch(self.batch))?)?;
        timer_pr("Wall-clock", start, nbytes);
        if let Some(path) = self.data_output {
            println!("Dumping {nbytes} bytes to {path:?}");
            fs::write(path, &dbs.try_const().unwrap()[..])?;
        }
        Ok(())
    }
}

/// Fill a whole zone with Write commands
#[derive(Parser, Clone, Debug)]
pub(crate) struct Write {
    /// Start LBA of the zone.  Defaults to the first empty zone.
    #[clap(long)]
    pub(crate) slba:       Option<LbaT>,
    /// Blocks per command.  Defaults to one.
    #[clap(long)]
    pub(crate) batch:      Option<NonZeroU32>,
    /// Data pattern: anum, zero, or a byte value
    #[clap(long, default_value = "anum")]
    pub(crate) data_input: Fill,
}

impl Write {
    pub(crate) fn main(self, dev: &Device, nsid: NsidT) -> Result<()> {
        let descr = select(dev, self.slba)?;
        let nbytes = descr.zcap as usize * dev.lba_nbytes() as usize;
        let dbs = dev.buf_alloc(nbytes);
        buf_fill(&mut dbs.try_mut().unwrap(), self.data_input);
        println!("Write to uri: {:?}", dev.uri());
        let start = Instant::now();
        let db = dbs.try_const().unwrap();
        check(zone::write(dev, nsid, &descr, db, batch(self.batch))?)?;
        timer_pr("Wall-clock", start, nbytes);
        Ok(())
    }
}

/// Fill a whole zone with Zone Append commands
#[derive(Parser, Clone, Debug)]
pub(crate) struct Append {
    /// Start LBA of the zone.  Defaults to the first empty zone.
    #[clap(long)]
    pub(crate) slba:       Option<LbaT>,
    /// Blocks per command.  Defaults to one.
    #[clap(long)]
    pub(crate) batch:      Option<NonZeroU32>,
    /// Data pattern: anum, zero, or a byte value
    #[clap(long, default_value = "anum")]
    pub(crate) data_input: Fill,
}

impl Append {
    pub(crate) fn main(self, dev: &Device, nsid: NsidT) -> Result<()> {
        let descr = select(dev, self.slba)?;
        let nbytes = descr.zcap as usize * dev.lba_nbytes() as usize;
        let dbs = dev.buf_alloc(nbytes);
        buf_fill(&mut dbs.try_mut().unwrap(), self.data_input);
        println!("Append to uri: {:?}", dev.uri());
        let start = Instant::now();
        let db = dbs.try_const().unwrap();
        let c = check(zone::append(dev, nsid, &descr, db,
                                   batch(self.batch))?)?;
        timer_pr("Wall-clock", start, nbytes);
        if let Some(lba) = c.assigned_lba() {
            println!("Last assigned LBA: {lba:#x}");
        }
        Ok(())
    }
}

#[derive(Parser, Clone, Debug)]
/// Whole-zone I/O on a zoned namespace
pub(crate) enum ZonedCmd {
    Append(Append),
    Read(Read),
    Write(Write),
}
