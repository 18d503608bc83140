// vim: tw=80
//! Functional tests for nvmio-core, run against the bundled backends

#![allow(clippy::module_inception)]

macro_rules! t {
    ($e:expr) => (match $e {
        Ok(e) => e,
        Err(e) => panic!("{} failed with {:?}", stringify!($e), e),
    })
}

mod async_ctx;
mod file;
mod scc;
