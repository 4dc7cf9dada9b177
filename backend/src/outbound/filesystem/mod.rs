//! Filesystem adapters.

mod cap_std_dump_store;

pub use cap_std_dump_store::CapStdDumpStore;
