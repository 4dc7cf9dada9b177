//! Database adapters for the primary MySQL server and the local mirror.
//!
//! - **Primary reads**: `diesel-async` over a `bb8` pool feeds the mirror
//!   syncer; `sqlx` reads arbitrary tables for dump generation.
//! - **Local mirror**: a synchronous Diesel SQLite connection, migrated on
//!   open and driven from blocking tasks.
//!
//! Row structs and schema definitions stay internal; adapters translate them
//! into domain records and map every database failure onto port errors.

mod diesel_basic_error_mapping;
mod diesel_mirror_source;
mod mirror_models;
mod pool;
mod schema;
mod sqlite_mirror_store;
mod sqlx_dump_source;

pub use diesel_mirror_source::DieselMirrorSource;
pub use pool::{DbPool, PoolConfig, PoolError, mysql_url};
pub use sqlite_mirror_store::SqliteMirrorStore;
pub use sqlx_dump_source::SqlxDumpSource;
