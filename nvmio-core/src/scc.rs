// vim: tw=80
//! Simple Copy: source range construction, validation, and execution

use byteorder::{ByteOrder, LittleEndian};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::{
    cmd::Cmd,
    device::{Device, IdfyNs},
    executor::{Mode, Outcome},
    types::*,
};

/// The longest single range that a format-0 entry can encode
pub const MAX_ENTRY_NLB: u32 = 1 << 16;

/// Size of one format-0 source range entry in bytes
pub const FMT0_ENTRY_NBYTES: usize = 32;

/// Copy descriptor format
#[derive(Clone, Copy, Debug, Default, Eq, Hash, IntoPrimitive, PartialEq,
         TryFromPrimitive)]
#[repr(u8)]
pub enum CopyFormat {
    #[default]
    Zero = 0,
}

/// One source range entry.
///
/// As on the wire, `nlb` is zero-based: an entry covering one block has
/// `nlb == 0`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RangeEntry {
    pub slba: LbaT,
    pub nlb: u16,
}

impl RangeEntry {
    /// Number of blocks covered by this entry
    pub fn nblocks(&self) -> u32 {
        u32::from(self.nlb) + 1
    }
}

/// A non-empty, ordered list of source ranges for a Copy command
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceRange {
    entries: Vec<RangeEntry>,
}

impl SourceRange {
    /// The LBA just past the last block of the last entry.  A common choice
    /// of destination.
    pub fn dest_after_last(&self) -> LbaT {
        // Never empty, by construction
        self.entries.last()
            .map(|e| e.slba + LbaT::from(e.nblocks()))
            .unwrap_or(0)
    }

    /// Encode the range as a list of source range entries in `format`.
    pub fn encode(&self, format: CopyFormat) -> Vec<u8> {
        match format {
            CopyFormat::Zero => {
                let mut buf = vec![0u8; self.entries.len() * FMT0_ENTRY_NBYTES];
                for (e, chunk) in self.entries.iter()
                    .zip(buf.chunks_exact_mut(FMT0_ENTRY_NBYTES))
                {
                    LittleEndian::write_u64(&mut chunk[8..16], e.slba);
                    LittleEndian::write_u16(&mut chunk[16..18], e.nlb);
                }
                buf
            }
        }
    }

    /// Parse a list of source range entries in `format`, as a device
    /// receives it.
    pub fn decode(buf: &[u8], format: CopyFormat)
        -> std::result::Result<SourceRange, ValidationError>
    {
        match format {
            CopyFormat::Zero => {
                if buf.len() % FMT0_ENTRY_NBYTES != 0 {
                    let nbytes = buf.len();
                    return Err(ValidationError::Truncated { nbytes });
                }
                let entries = buf.chunks_exact(FMT0_ENTRY_NBYTES)
                    .map(|chunk| RangeEntry {
                        slba: LittleEndian::read_u64(&chunk[8..16]),
                        nlb: LittleEndian::read_u16(&chunk[16..18]),
                    }).collect::<Vec<_>>();
                if entries.is_empty() {
                    return Err(ValidationError::Empty);
                }
                Ok(SourceRange { entries })
            }
        }
    }

    pub fn entries(&self) -> &[RangeEntry] {
        &self.entries[..]
    }

    pub fn iter(&self) -> impl Iterator<Item=&RangeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a `SourceRange` can't be built empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of blocks to be copied
    pub fn nlb_total(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.nblocks())).sum()
    }
}

/// A namespace's Simple Copy limits
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CopyLimits {
    /// Maximum Copy Length, in blocks
    pub mcl: u32,
    /// Maximum Source Range Count, zero-based
    pub msrc: u8,
    /// Maximum Single Source Range Length, in blocks
    pub mssrl: u16,
}

impl From<&IdfyNs> for CopyLimits {
    fn from(idfy: &IdfyNs) -> Self {
        CopyLimits { mcl: idfy.mcl, msrc: idfy.msrc, mssrl: idfy.mssrl }
    }
}

/// Build a source range from `(slba, block count)` pairs.
///
/// Only checks that the range is representable.  See [`validate`] for the
/// namespace's limits.
pub fn build_range<I>(entries: I)
    -> std::result::Result<SourceRange, ValidationError>
    where I: IntoIterator<Item=(LbaT, u32)>
{
    let entries = entries.into_iter()
        .enumerate()
        .map(|(index, (slba, len))| {
            if len == 0 {
                Err(ValidationError::ZeroLength { index })
            } else if len > MAX_ENTRY_NLB {
                Err(ValidationError::RangeLengthExceeded {
                    index,
                    nlb: u64::from(len),
                    max: u64::from(MAX_ENTRY_NLB)
                })
            } else {
                Ok(RangeEntry { slba, nlb: (len - 1) as u16 })
            }
        }).collect::<std::result::Result<Vec<_>, _>>()?;
    if entries.is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(SourceRange { entries })
}

/// Check a source range against a namespace's copy limits.
///
/// The checks run in a fixed order, and the first violation is reported:
/// the number of entries against MSRC, then the total length against MCL,
/// then each entry against MSSRL.
pub fn validate(range: &SourceRange, limits: &CopyLimits)
    -> std::result::Result<(), ValidationError>
{
    let max_ranges = usize::from(limits.msrc) + 1;
    if range.len() > max_ranges {
        return Err(ValidationError::TooManyRanges {
            count: range.len(),
            max: max_ranges
        });
    }
    let total = range.nlb_total();
    if total > u64::from(limits.mcl) {
        return Err(ValidationError::CopyLengthExceeded {
            total,
            max: u64::from(limits.mcl)
        });
    }
    for (index, e) in range.iter().enumerate() {
        if e.nblocks() > u32::from(limits.mssrl) {
            return Err(ValidationError::RangeLengthExceeded {
                index,
                nlb: u64::from(e.nblocks()),
                max: u64::from(limits.mssrl)
            });
        }
    }
    Ok(())
}

/// Copy the blocks of `range` to consecutive LBAs starting at `sdlba`.
///
/// The range is validated against the namespace's limits first; nothing is
/// submitted if that fails.  If the device fails the copy, the index of the
/// lowest failed entry is available from
/// [`Completion::failed_range`](crate::cmd::Completion::failed_range).
#[tracing::instrument(skip(dev, range, mode), fields(nr = range.len()))]
pub fn execute_copy(dev: &Device, nsid: NsidT, sdlba: LbaT,
                    range: SourceRange, format: CopyFormat, mode: Mode)
    -> Result<Outcome>
{
    validate(&range, &CopyLimits::from(&dev.idfy_ns()))?;
    let cmd = Cmd::copy(nsid, sdlba, range, format);
    Ok(dev.run(cmd, mode)?)
}

/// What a device says about its Simple Copy support
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SccSupport {
    /// ONCS advertises the Copy command
    pub oncs_copy: bool,
    /// OCFS advertises descriptor format 0
    pub ocfs_fmt0: bool,
    pub limits: CopyLimits,
}

impl SccSupport {
    pub fn is_supported(&self) -> bool {
        self.missing().is_empty()
    }

    /// Name every missing prerequisite of Simple Copy.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.oncs_copy {
            missing.push("ONCS.copy");
        }
        if !self.ocfs_fmt0 {
            missing.push("OCFS.fmt0");
        }
        if self.limits.mcl == 0 {
            missing.push("MCL");
        }
        if self.limits.mssrl == 0 {
            missing.push("MSSRL");
        }
        missing
    }
}

/// Probe the device's Simple Copy support
pub fn support(dev: &Device) -> SccSupport {
    let ctrlr = dev.idfy_ctrlr();
    SccSupport {
        oncs_copy: ctrlr.oncs.copy(),
        ocfs_fmt0: ctrlr.ocfs.fmt0(),
        limits: CopyLimits::from(&dev.idfy_ns())
    }
}

/// Like [`support`], but fail unless Simple Copy is fully supported.
pub fn require_support(dev: &Device) -> Result<SccSupport> {
    let s = support(dev);
    if s.is_supported() {
        Ok(s)
    } else {
        Err(Error::Unsupported(format!("Simple Copy; missing {}",
                                       s.missing().join(", "))))
    }
}

// LCOV_EXCL_STOP
