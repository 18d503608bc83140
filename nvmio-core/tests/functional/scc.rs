// vim: tw=80

mod copy {
    use nvmio_core::{
        cmd::{Completion, StatusCode},
        device::Device,
        executor::Mode,
        scc::{self, CopyFormat},
        util::{buf_diff, buf_fill, Fill},
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    const NBLOCKS: u32 = 16;

    /// Write `NBLOCKS` blocks of recognizable data at LBA 0, and return it.
    fn prepare(dev: &Device) -> Vec<u8> {
        let dbs = dev.buf_alloc(NBLOCKS as usize * 512);
        buf_fill(&mut dbs.try_mut().unwrap(), Fill::Anum);
        let c = t!(dev.write(1, 0, NBLOCKS, dbs.try_const().unwrap(), None,
                             Mode::Sync))
            .completion()
            .unwrap();
        assert!(c.is_ok(), "{}", c);
        dbs.try_const().unwrap().to_vec()
    }

    fn read_back(dev: &Device, slba: u64) -> Vec<u8> {
        let dbs = dev.buf_alloc(NBLOCKS as usize * 512);
        let c = t!(dev.read(1, slba, NBLOCKS, dbs.try_mut().unwrap(), None,
                            Mode::Sync))
            .completion()
            .unwrap();
        assert!(c.is_ok(), "{}", c);
        dbs.try_const().unwrap().to_vec()
    }

    /// Copy single-block ranges to just past the last source block
    #[rstest]
    #[case("emu:?nlbas=256")]
    #[case("emu:?nlbas=256&lba_nbytes=512&poll_latency=1")]
    fn sync(#[case] uri: &str) {
        let dev = t!(Device::open(uri));
        let expected = prepare(&dev);
        let range = t!(scc::build_range((0..NBLOCKS).map(|i| (i.into(), 1))));
        let sdlba = range.dest_after_last();
        assert_eq!(sdlba, u64::from(NBLOCKS));
        let o = t!(scc::execute_copy(&dev, 1, sdlba, range, CopyFormat::Zero,
                                     Mode::Sync));
        let c = o.completion().unwrap();
        assert!(c.is_ok(), "{}", c);
        assert_eq!(buf_diff(&expected, &read_back(&dev, sdlba)), 0);
    }

    /// Two copies in flight at once, each moving half of the source
    #[test]
    fn r#async() {
        let dev = t!(Device::open("emu:?nlbas=256&poll_latency=2"));
        let expected = prepare(&dev);
        let mut ctx = t!(dev.async_init(2));
        let done = Arc::new(Mutex::new(Vec::new()));
        let half = NBLOCKS / 2;
        for i in 0..2u32 {
            let range = t!(scc::build_range(
                (i * half..(i + 1) * half).map(|l| (l.into(), 1))));
            let d2 = done.clone();
            let cb = Box::new(move |c: Completion| d2.lock().unwrap().push(c));
            let sdlba = 64 + u64::from(i * half);
            t!(scc::execute_copy(&dev, 1, sdlba, range, CopyFormat::Zero,
                                 Mode::Async(&mut ctx, cb)));
        }
        assert_eq!(ctx.wait_all(), Ok(2));
        let done = done.lock().unwrap();
        assert_eq!(done.len(), 2);
        assert!(done.iter().all(Completion::is_ok));
        assert_eq!(buf_diff(&expected, &read_back(&dev, 64)), 0);
    }

    /// The index of the failing source range is passed through unchanged
    #[test]
    fn partial_failure() {
        let dev = t!(Device::open("emu:?nlbas=64"));
        let range = t!(scc::build_range(vec![(0, 1), (8, 2), (63, 2), (4, 1)]));
        let o = t!(scc::execute_copy(&dev, 1, 32, range, CopyFormat::Zero,
                                     Mode::Sync));
        let c = o.completion().unwrap();
        assert!(c.has_status(StatusCode::LBA_OUT_OF_RANGE), "{}", c);
        assert_eq!(c.failed_range(), Some(2));
    }

    /// A device that lacks Copy says so in the completion
    #[test]
    fn unsupported() {
        let dev = t!(Device::open("emu:?copy=0"));
        let range = t!(scc::build_range(vec![(0, 1)]));
        let o = t!(scc::execute_copy(&dev, 1, 8, range, CopyFormat::Zero,
                                     Mode::Sync));
        let c = o.completion().unwrap();
        assert!(c.has_status(StatusCode::INVALID_OPCODE), "{}", c);
        assert_eq!(c.failed_range(), None);
    }
}

mod limits {
    use nvmio_core::{
        device::Device,
        executor::Mode,
        scc::{self, CopyFormat},
        Error,
        ValidationError,
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// Copies exactly at MCL pass, and one block more is refused before
    /// submission.
    #[rstest]
    #[case(16, true)]
    #[case(17, false)]
    fn mcl(#[case] nblocks: u64, #[case] ok: bool) {
        let dev = t!(Device::open("emu:?nlbas=256&mcl=16"));
        let range = t!(scc::build_range((0..nblocks).map(|l| (l, 1))));
        let r = scc::execute_copy(&dev, 1, 128, range, CopyFormat::Zero,
                                  Mode::Sync);
        if ok {
            assert!(t!(r).completion().unwrap().is_ok());
        } else {
            assert_eq!(r, Err(Error::Validation(
                ValidationError::CopyLengthExceeded { total: 17, max: 16 })));
        }
    }

    #[test]
    fn mssrl() {
        let dev = t!(Device::open("emu:?nlbas=256&mssrl=4"));
        let range = t!(scc::build_range(vec![(0, 4), (10, 5)]));
        let r = scc::execute_copy(&dev, 1, 128, range, CopyFormat::Zero,
                                  Mode::Sync);
        assert_eq!(r, Err(Error::Validation(
            ValidationError::RangeLengthExceeded { index: 1, nlb: 5, max: 4 }
        )));
    }

    #[test]
    fn msrc() {
        let dev = t!(Device::open("emu:?nlbas=256&msrc=1"));
        let range = t!(scc::build_range(vec![(0, 1), (2, 1), (4, 1)]));
        let r = scc::execute_copy(&dev, 1, 128, range, CopyFormat::Zero,
                                  Mode::Sync);
        assert_eq!(r, Err(Error::Validation(
            ValidationError::TooManyRanges { count: 3, max: 2 })));
    }
}

mod support {
    use nvmio_core::{device::Device, scc, Error};
    use pretty_assertions::assert_eq;

    #[test]
    fn supported() {
        let dev = t!(Device::open("emu:?mcl=64&mssrl=32&msrc=7"));
        let s = t!(scc::require_support(&dev));
        assert!(s.is_supported());
        assert_eq!(s.limits.mcl, 64);
        assert_eq!(s.limits.mssrl, 32);
        assert_eq!(s.limits.msrc, 7);
    }

    #[test]
    fn unsupported() {
        let dev = t!(Device::open("emu:?copy=0&mssrl=0"));
        let s = scc::support(&dev);
        assert_eq!(s.missing(), vec!["ONCS.copy", "OCFS.fmt0", "MSSRL"]);
        assert!(matches!(scc::require_support(&dev),
                         Err(Error::Unsupported(_))));
    }
}
