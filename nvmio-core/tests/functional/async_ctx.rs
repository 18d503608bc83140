// vim: tw=80

mod capacity {
    use nvmio_core::{
        async_ctx::CtxState,
        cmd::Cmd,
        device::Device,
        executor::Callback,
        ExecError,
    };
    use pretty_assertions::assert_eq;

    fn noop() -> Callback {
        Box::new(|_| ())
    }

    /// A context never holds more than `depth` commands
    #[test]
    fn saturation() {
        let dev = t!(Device::open("emu:?poll_latency=1"));
        let mut ctx = t!(dev.async_init(4));
        let dbs = dev.buf_alloc(512);
        for i in 0..4 {
            let cmd = Cmd::write(1, i, 1, dbs.try_const().unwrap(), None);
            t!(dev.submit(&mut ctx, cmd, noop()));
            assert_eq!(ctx.outstanding(), i as u32 + 1);
        }
        let cmd = Cmd::write(1, 4, 1, dbs.try_const().unwrap(), None);
        assert_eq!(dev.submit(&mut ctx, cmd, noop()),
                   Err(ExecError::ContextSaturated));
        assert_eq!(ctx.outstanding(), 4);

        // Completions aren't ready until the second poll
        assert_eq!(ctx.reap_poll(), Ok(0));
        assert_eq!(ctx.outstanding(), 4);
        assert_eq!(ctx.reap_poll(), Ok(4));
        assert_eq!(ctx.state(), CtxState::Idle);

        // Freed slots are reusable
        let cmd = Cmd::write(1, 4, 1, dbs.try_const().unwrap(), None);
        t!(dev.submit(&mut ctx, cmd, noop()));
        assert_eq!(ctx.wait_all(), Ok(1));
    }

    #[test]
    fn null_depth_limit() {
        let dev = t!(Device::open("null:"));
        assert_eq!(dev.async_init(24).err(),
                   Some(ExecError::InvalidDepth { depth: 24, max: 23 }));
        let ctx = t!(dev.async_init(23));
        assert_eq!(ctx.depth(), 23);
    }

    #[test]
    fn emu_depth_limit() {
        let dev = t!(Device::open("emu:?max_depth=2"));
        assert!(dev.async_init(3).is_err());
        assert!(dev.async_init(2).is_ok());
    }
}

mod ownership {
    use nvmio_core::{
        cmd::Completion,
        device::Device,
        executor::{Mode, Outcome},
        ExecError,
    };
    use pretty_assertions::assert_eq;

    /// A context may only carry commands for the device that created it
    #[test]
    fn foreign_context() {
        let null = t!(Device::open("null:"));
        let emu = t!(Device::open("emu:?nlbas=16"));
        let mut ctx = t!(null.async_init(4));
        let dbs = emu.buf_alloc(2 * 512);
        let cb = Box::new(|_: Completion| panic!("must not be called"));
        let r = emu.write(1, 1000, 2, dbs.try_const().unwrap(), None,
                          Mode::Async(&mut ctx, cb));
        assert_eq!(r, Err(ExecError::ForeignContext));
        let cb = Box::new(|_: Completion| panic!("must not be called"));
        let r = emu.write(1, 0, 2, dbs.try_const().unwrap(), None,
                          Mode::Async(&mut ctx, cb));
        assert_eq!(r, Err(ExecError::ForeignContext));
        assert_eq!(ctx.outstanding(), 0);
        assert_eq!(ctx.wait_all(), Ok(0));
    }

    /// Clones of a device share its contexts
    #[test]
    fn cloned_device() {
        let dev = t!(Device::open("emu:?nlbas=16"));
        let dev2 = dev.clone();
        let mut ctx = t!(dev.async_init(1));
        let dbs = dev.buf_alloc(512);
        let cb = Box::new(|c: Completion| assert!(c.is_ok()));
        let r = dev2.write(1, 0, 1, dbs.try_const().unwrap(), None,
                           Mode::Async(&mut ctx, cb));
        assert_eq!(r, Ok(Outcome::Submitted(0)));
        assert_eq!(ctx.wait_all(), Ok(1));
    }
}

mod delivery {
    use nvmio_core::{
        cmd::{Cmd, Completion},
        device::Device,
    };
    use pretty_assertions::assert_eq;
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    /// Every accepted command's callback runs exactly once, however the
    /// submissions and reaps interleave.
    #[test_log::test]
    fn exactly_once() {
        const N: u32 = 100;
        let dev = t!(Device::open("emu:?nlbas=128&poll_latency=1"));
        let mut ctx = t!(dev.async_init(8));
        let dbs = dev.buf_alloc(512);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reaped = 0;
        for i in 0..N {
            while ctx.outstanding() == ctx.depth() {
                reaped += t!(ctx.reap_poll());
            }
            let seen2 = seen.clone();
            let cb = Box::new(move |c: Completion| {
                assert!(c.is_ok());
                seen2.lock().unwrap().push(i);
            });
            let lba = u64::from(i % 128);
            let cmd = Cmd::write(1, lba, 1, dbs.try_const().unwrap(), None);
            t!(dev.submit(&mut ctx, cmd, cb));
        }
        reaped += t!(ctx.wait_all());
        assert_eq!(reaped, N);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..N).collect::<Vec<_>>());
    }

    /// Each completion reports the slot its command occupied
    #[test]
    fn slot_reported() {
        let dev = t!(Device::open("null:"));
        let mut ctx = t!(dev.async_init(4));
        let dbs = dev.buf_alloc(512);
        let slots = Arc::new(Mutex::new(Vec::new()));
        let mut submitted = Vec::new();
        for _ in 0..3 {
            let slots2 = slots.clone();
            let cmd = Cmd::read(1, 0, 1, dbs.try_mut().unwrap(), None);
            let cb = Box::new(move |c: Completion| {
                slots2.lock().unwrap().push(c.slot.unwrap())
            });
            let slot = t!(dev.submit(&mut ctx, cmd, cb));
            submitted.push(slot);
            // Only one DivBufMut may exist at a time
            assert_eq!(t!(ctx.reap_wait()), 1);
        }
        assert_eq!(*slots.lock().unwrap(), submitted);
    }

    /// The callback may reclaim the buffer its command used
    #[test]
    fn reclaim_in_callback() {
        let dev = t!(Device::open("emu:"));
        let mut ctx = t!(dev.async_init(1));
        let dbs = Arc::new(dev.buf_alloc(4096));
        let dbs2 = dbs.clone();
        let cmd = Cmd::read(1, 0, 8, dbs.try_mut().unwrap(), None);
        t!(dev.submit(&mut ctx, cmd, Box::new(move |c: Completion| {
            assert!(c.is_ok());
            let mut db = dbs2.try_mut().unwrap();
            db[0] = 0xff;
        })));
        assert_eq!(ctx.reap_wait(), Ok(1));
        assert_eq!(dbs.try_const().unwrap()[0], 0xff);
    }

    /// A context may be reaped on a different thread than it was filled on
    #[test]
    fn reap_elsewhere() {
        let dev = t!(Device::open("emu:?poll_latency=3"));
        let mut ctx = t!(dev.async_init(8));
        let dbs = dev.buf_alloc(512);
        for i in 0..8 {
            let cmd = Cmd::write(1, i, 1, dbs.try_const().unwrap(), None);
            t!(dev.submit(&mut ctx, cmd, Box::new(|_| ())));
        }
        let r = thread::spawn(move || {
            let n = ctx.wait_all();
            (n, ctx)
        }).join().unwrap();
        assert_eq!(r.0, Ok(8));
        assert_eq!(r.1.outstanding(), 0);
    }
}

mod teardown {
    use nvmio_core::{
        async_ctx::CtxState,
        cmd::Cmd,
        device::Device,
        ExecError,
        TeardownError,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn busy() {
        let dev = t!(Device::open("emu:?poll_latency=1"));
        let mut ctx = t!(dev.async_init(2));
        let dbs = dev.buf_alloc(512);
        for i in 0..2 {
            let cmd = Cmd::write(1, i, 1, dbs.try_const().unwrap(), None);
            t!(dev.submit(&mut ctx, cmd, Box::new(|_| ())));
        }
        assert_eq!(ctx.terminate(), Err(TeardownError::OutstandingCommands(2)));

        // The context remains fully usable
        assert_eq!(ctx.state(), CtxState::Active);
        assert_eq!(ctx.reap_wait(), Ok(2));
        assert_eq!(ctx.terminate(), Ok(()));
        assert_eq!(ctx.state(), CtxState::Terminated);

        let cmd = Cmd::write(1, 0, 1, dbs.try_const().unwrap(), None);
        assert_eq!(dev.submit(&mut ctx, cmd, Box::new(|_| ())),
                   Err(ExecError::ContextTerminated));
        assert_eq!(ctx.reap_wait(), Err(ExecError::ContextTerminated));
    }

    #[test]
    fn idle() {
        let dev = t!(Device::open("null:"));
        let mut ctx = t!(dev.async_init(1));
        assert_eq!(ctx.state(), CtxState::Idle);
        assert_eq!(ctx.terminate(), Ok(()));
    }
}
