// vim: tw=80
//! End-to-end tests of the nvmio command line tools

mod scc;
mod util;
mod znd;
mod zoned;
