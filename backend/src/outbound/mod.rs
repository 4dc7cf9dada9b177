//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: the primary MySQL database and the local SQLite mirror
//! - **filesystem**: the dump directory
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod filesystem;
pub mod persistence;
