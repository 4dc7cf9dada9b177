//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Each port is a trait the domain calls; outbound adapters implement them.
//! Fixture implementations let the server and tests run without a database.

mod macros;
pub(crate) use macros::define_port_error;

mod dump_source;
mod dump_store;
mod mirror_source;
mod mirror_store;

#[cfg(test)]
pub use dump_source::MockDumpSource;
pub use dump_source::{DumpSource, DumpSourceError, FixtureDumpSource};
#[cfg(test)]
pub use dump_store::MockDumpStore;
pub use dump_store::{DumpStore, DumpStoreError, FixtureDumpStore, StoredDump};
#[cfg(test)]
pub use mirror_source::MockMirrorSource;
pub use mirror_source::{FixtureMirrorSource, MirrorSource, MirrorSourceError};
#[cfg(test)]
pub use mirror_store::MockMirrorStore;
pub use mirror_store::{FixtureMirrorStore, MirrorStore, MirrorStoreError};
