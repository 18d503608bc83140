// vim: tw=80

mod file {
    use nvmio_core::{
        cmd::{Completion, StatusCode},
        device::Device,
        executor::Mode,
        scc::{self, CopyFormat},
        util::{buf_diff, buf_fill, Fill},
        zone::{self, ReportFilter},
        Error,
    };
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::{
        fs,
        sync::{Arc, Mutex},
    };
    use tempfile::{Builder, TempDir};

    struct Harness {
        _tempdir: TempDir,
        path: String,
    }

    /// A 1 MiB backing file
    #[fixture]
    fn harness() -> Harness {
        let tempdir = t!(Builder::new().prefix("nvmio-file").tempdir());
        let path = tempdir.path().join("ns0");
        t!(fs::File::create(&path).and_then(|f| f.set_len(1 << 20)));
        Harness {
            path: path.to_str().unwrap().to_owned(),
            _tempdir: tempdir,
        }
    }

    #[rstest]
    #[case(512)]
    #[case(4096)]
    fn geometry(harness: Harness, #[case] lba_nbytes: u32) {
        let uri = format!("file:{}?lba_nbytes={}", harness.path, lba_nbytes);
        let dev = t!(Device::open(&uri));
        assert_eq!(dev.lba_nbytes(), lba_nbytes);
        assert_eq!(dev.geometry().nsze, (1 << 20) / u64::from(lba_nbytes));
        assert!(!dev.geometry().is_zoned());
    }

    #[rstest]
    fn sync_round_trip(harness: Harness) {
        let dev = t!(Device::open(&format!("file:{}", harness.path)));
        let wdbs = dev.buf_alloc(4 * 512);
        buf_fill(&mut wdbs.try_mut().unwrap(), Fill::Anum);
        let c = t!(dev.write(1, 7, 4, wdbs.try_const().unwrap(), None,
                             Mode::Sync)).completion().unwrap();
        assert!(c.is_ok(), "{}", c);

        // Reopening sees the same data
        drop(dev);
        let dev = t!(Device::open(&format!("file:{}", harness.path)));
        let rdbs = dev.buf_alloc(4 * 512);
        let c = t!(dev.read(1, 7, 4, rdbs.try_mut().unwrap(), None,
                            Mode::Sync)).completion().unwrap();
        assert!(c.is_ok(), "{}", c);
        assert_eq!(buf_diff(&wdbs.try_const().unwrap(),
                            &rdbs.try_const().unwrap()), 0);
    }

    #[rstest]
    fn async_round_trip(harness: Harness) {
        let dev = t!(Device::open(&format!("file:{}", harness.path)));
        let mut ctx = t!(dev.async_init(2));
        let done = Arc::new(Mutex::new(Vec::new()));
        let wdbs = dev.buf_alloc(2 * 512);
        buf_fill(&mut wdbs.try_mut().unwrap(), Fill::Byte(0xa5));
        let mut db = wdbs.try_const().unwrap();
        for lba in [100, 200] {
            let d2 = done.clone();
            let cb = Box::new(move |c: Completion| d2.lock().unwrap().push(c));
            t!(dev.write(1, lba, 1, db.split_to(512), None,
                         Mode::Async(&mut ctx, cb)));
        }
        assert_eq!(ctx.wait_all(), Ok(2));
        assert!(done.lock().unwrap().iter().all(Completion::is_ok));

        let contents = t!(fs::read(&harness.path));
        assert!(contents[100 * 512..101 * 512].iter().all(|b| *b == 0xa5));
        assert!(contents[200 * 512..201 * 512].iter().all(|b| *b == 0xa5));
        assert!(contents[101 * 512..200 * 512].iter().all(|b| *b == 0));
    }

    /// Copy is emulated with reads and writes
    #[rstest]
    fn copy(harness: Harness) {
        let dev = t!(Device::open(&format!("file:{}", harness.path)));
        let wdbs = dev.buf_alloc(2 * 512);
        buf_fill(&mut wdbs.try_mut().unwrap(), Fill::Anum);
        t!(dev.write(1, 0, 2, wdbs.try_const().unwrap(), None, Mode::Sync));
        let range = t!(scc::build_range(vec![(1, 1), (0, 1)]));
        let o = t!(scc::execute_copy(&dev, 1, 10, range, CopyFormat::Zero,
                                     Mode::Sync));
        assert!(o.completion().unwrap().is_ok());
        let contents = t!(fs::read(&harness.path));
        let w = wdbs.try_const().unwrap();
        assert_eq!(&contents[10 * 512..11 * 512], &w[512..]);
        assert_eq!(&contents[11 * 512..12 * 512], &w[..512]);
    }

    #[rstest]
    fn no_zones(harness: Harness) {
        let dev = t!(Device::open(&format!("file:{}", harness.path)));
        assert_eq!(zone::report(&dev, 1, 0, ReportFilter::All),
                   Err(Error::NotZoned));
        let dbs = dev.buf_alloc(512);
        let c = t!(dev.append(1, 0, 1, dbs.try_const().unwrap(), None,
                              Mode::Sync)).completion().unwrap();
        assert!(c.has_status(StatusCode::INVALID_OPCODE));
    }

    #[test]
    fn missing_path() {
        assert!(matches!(Device::open("file:"), Err(Error::InvalidConfig(_))));
        assert!(matches!(Device::open("file:/nonexistent/nvmio/ns"),
                         Err(Error::InvalidConfig(_))));
    }
}
