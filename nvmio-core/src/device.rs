// vim: tw=80
//! Device handles
//!
//! A [`Device`] binds one namespace of one backend.  It is cheap to clone and
//! may be shared between threads.

use bitfield::bitfield;
use divbuf::DivBufShared;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};
use crate::{
    async_ctx::AsyncCtx,
    backend::{Backend, Emu, EmuConfig, FileBackend, FileConfig, Null},
    types::*,
};

/// Geometry of a zoned namespace
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ZonedGeometry {
    pub nzones: u32,
    /// Zone size in LBAs
    pub zone_size: LbaT,
    /// Size of a zone descriptor extension in bytes.  0 if the namespace
    /// doesn't support extensions.
    pub zdes: u32,
}

/// Size and layout of a namespace, as the backend reports it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Geometry {
    pub nsid: NsidT,
    /// Namespace size in LBAs
    pub nsze: LbaT,
    pub lba_nbytes: u32,
    /// Metadata bytes per LBA
    pub nbytes_oob: u32,
    /// `Some` for zoned namespaces.
    pub zoned: Option<ZonedGeometry>,
}

impl Geometry {
    pub fn is_zoned(&self) -> bool {
        self.zoned.is_some()
    }
}

bitfield! {
    /// Optional NVM Command Support
    #[derive(Clone, Copy, Default, Eq, PartialEq)]
    pub struct Oncs(u16);
    impl Debug;
    pub copy, set_copy: 8;
}

bitfield! {
    /// Optional Copy Formats Supported
    #[derive(Clone, Copy, Default, Eq, PartialEq)]
    pub struct Ocfs(u16);
    impl Debug;
    pub fmt0, set_fmt0: 0;
    pub fmt1, set_fmt1: 1;
}

/// The subset of the Identify Controller data that nvmio consumes
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IdfyCtrlr {
    pub oncs: Oncs,
    pub ocfs: Ocfs,
}

/// The subset of the Identify Namespace data that nvmio consumes
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IdfyNs {
    pub nsze: LbaT,
    /// Maximum Copy Length, in LBAs
    pub mcl: u32,
    /// Maximum Source Range Count.  Zero-based.
    pub msrc: u8,
    /// Maximum Single Source Range Length, in LBAs
    pub mssrl: u16,
}

/// An open namespace
#[derive(Clone)]
pub struct Device {
    backend: Arc<dyn Backend>,
    uri: String,
    geo: Geometry,
}

impl Device {
    /// Open a device by URI.
    ///
    /// Recognized schemes:
    /// * `null:` - Completes every command successfully, touching no data.
    /// * `emu:[?key=value&...]` - An in-memory emulated namespace.  See
    ///   [`EmuConfig`] for the keys.
    /// * `file:<path>[?key=value&...]` - A conventional namespace backed by a
    ///   regular file.  See [`FileConfig`] for the keys.
    pub fn open(uri: &str) -> Result<Self> {
        Device::open_with(uri, EmuConfig::default())
    }

    /// Like [`Device::open`], but `emu:` URIs start from `emu_defaults`
    /// instead of [`EmuConfig::default`].  Query options still override it.
    #[tracing::instrument(skip(emu_defaults))]
    pub fn open_with(uri: &str, emu_defaults: EmuConfig) -> Result<Self> {
        let (scheme, rest) = uri.split_once(':')
            .ok_or_else(|| Error::InvalidConfig(
                format!("URI {uri:?} has no scheme")))?;
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None)
        };
        let opts = parse_query(query)?;
        let backend: Arc<dyn Backend> = match scheme {
            "null" => {
                if let Some((k, _)) = opts.first() {
                    return Err(Error::InvalidConfig(
                        format!("null: takes no option {k:?}")));
                }
                Arc::new(Null::default())
            },
            "emu" => {
                let mut cfg = emu_defaults;
                for (k, v) in opts {
                    cfg.apply(k, v)?;
                }
                Arc::new(Emu::new(cfg)?)
            },
            "file" => {
                if path.is_empty() {
                    return Err(Error::InvalidConfig(
                        "file: requires a path".to_owned()));
                }
                let mut cfg = FileConfig::default();
                for (k, v) in opts {
                    cfg.apply(k, v)?;
                }
                Arc::new(FileBackend::open(path, cfg)?)
            },
            _ => return Err(Error::InvalidConfig(
                    format!("Unknown URI scheme {scheme:?}")))
        };
        Ok(Device::from_backend(uri, backend))
    }

    /// Bind a device to an already constructed backend
    pub fn from_backend(uri: &str, backend: Arc<dyn Backend>) -> Self {
        let geo = backend.geometry();
        Device { backend, uri: uri.to_owned(), geo }
    }

    /// Create an asynchronous context with room for `depth` outstanding
    /// commands.
    pub fn async_init(&self, depth: u32) -> std::result::Result<AsyncCtx, ExecError>
    {
        let max = self.backend.max_depth();
        if depth == 0 || depth > max {
            return Err(ExecError::InvalidDepth { depth, max });
        }
        let queue = self.backend.queue(depth)?;
        Ok(AsyncCtx::new(self.backend_id(), depth, queue))
    }

    /// Identity of the backend, shared by all clones of this `Device`.
    pub(crate) fn backend_id(&self) -> usize {
        Arc::as_ptr(&self.backend) as *const () as usize
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// Allocate a zero-filled buffer suitable for I/O to this device.
    pub fn buf_alloc(&self, nbytes: usize) -> DivBufShared {
        DivBufShared::from(vec![0u8; nbytes])
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geo
    }

    pub fn idfy_ctrlr(&self) -> IdfyCtrlr {
        self.backend.idfy_ctrlr()
    }

    pub fn idfy_ns(&self) -> IdfyNs {
        self.backend.idfy_ns()
    }

    /// Size of one logical block in bytes
    pub fn lba_nbytes(&self) -> u32 {
        self.geo.lba_nbytes
    }

    /// The namespace that this device handle addresses
    pub fn nsid(&self) -> NsidT {
        self.geo.nsid
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl Debug for Device {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Device")
            .field("uri", &self.uri)
            .field("backend", &self.backend.name())
            .field("geo", &self.geo)
            .finish()
    }
}

fn parse_query(query: Option<&str>) -> Result<Vec<(&str, &str)>> {
    let Some(query) = query else {
        return Ok(Vec::new());
    };
    query.split('&')
        .filter(|kv| !kv.is_empty())
        .map(|kv| kv.split_once('=')
             .ok_or_else(|| Error::InvalidConfig(
                     format!("Malformed URI option {kv:?}"))))
        .collect()
}

// LCOV_EXCL_STOP
