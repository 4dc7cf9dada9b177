//! SQLite adapter for the local mirror.
//!
//! Diesel's SQLite connection is synchronous, so every call hops onto the
//! blocking pool and serialises on a single connection. Each call is one
//! transaction.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use diesel::connection::SimpleConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info};

use crate::domain::mirror::{ColumnDrift, MirrorBatch, MirrorRows, MirrorTable};
use crate::domain::ports::{MirrorStore, MirrorStoreError};

use super::mirror_models::{
    BatchRow, BrandRow, CategoryRow, CompanyRow, CustomerRow, PaymentTypeRow, ProductRow,
    ProductVariationRow, StatusRow, StockRow, SupplierRow, UnitRow, UserRow,
};
use super::schema::{
    batch, brand, category, company, customer, declared_columns, missing_from, payment_type,
    product, product_variations, status, stock, supplier, unit, user,
};

/// Mirror schema migrations compiled into the binary.
pub const MIRROR_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Rows per `INSERT` statement, well under SQLite's bound-parameter limit.
const INSERT_CHUNK: usize = 500;

const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA busy_timeout = 5000;";

#[derive(Debug, QueryableByName)]
struct TableColumnRow {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Local mirror stored in a single SQLite file.
#[derive(Clone)]
pub struct SqliteMirrorStore {
    conn: Arc<Mutex<SqliteConnection>>,
    location: PathBuf,
}

impl SqliteMirrorStore {
    /// Open (creating if needed) the mirror at `path` and apply migrations.
    pub fn open(path: &Path) -> Result<Self, MirrorStoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| {
                MirrorStoreError::connection(format!(
                    "cannot create {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let url = path.to_str().ok_or_else(|| {
            MirrorStoreError::connection(format!("non UTF-8 mirror path {}", path.display()))
        })?;
        let mut conn = SqliteConnection::establish(url)
            .map_err(|err| MirrorStoreError::connection(err.to_string()))?;
        conn.batch_execute(CONNECTION_PRAGMAS)
            .map_err(|err| MirrorStoreError::connection(err.to_string()))?;
        Self::from_connection(conn, path.to_path_buf())
    }

    /// Private in-memory mirror, used by tests and fixture runs.
    pub fn open_in_memory() -> Result<Self, MirrorStoreError> {
        let conn = SqliteConnection::establish(":memory:")
            .map_err(|err| MirrorStoreError::connection(err.to_string()))?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(
        mut conn: SqliteConnection,
        location: PathBuf,
    ) -> Result<Self, MirrorStoreError> {
        let applied = conn
            .run_pending_migrations(MIRROR_MIGRATIONS)
            .map_err(|err| MirrorStoreError::connection(format!("migration failed: {err}")))?;
        info!(
            location = %location.display(),
            migrations = applied.len(),
            "mirror database ready"
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    /// Where the mirror lives.
    pub fn location(&self) -> &Path {
        &self.location
    }

    async fn with_connection<F, T>(&self, work: F) -> Result<T, MirrorStoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, MirrorStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            work(&mut guard)
        })
        .await
        .map_err(|err| MirrorStoreError::connection(format!("mirror worker failed: {err}")))?
    }

    /// Current contents of `table`, ordered by primary key.
    pub async fn snapshot(&self, table: MirrorTable) -> Result<MirrorRows, MirrorStoreError> {
        self.with_connection(move |conn| {
            load_table(conn, table).map_err(|err| write_error(table, &err))
        })
        .await
    }
}

fn write_error(table: MirrorTable, err: &diesel::result::Error) -> MirrorStoreError {
    MirrorStoreError::write(table.name(), err.to_string())
}

fn shape_mismatch(table: MirrorTable) -> diesel::result::Error {
    diesel::result::Error::QueryBuilderError(
        format!("row shape does not match table {table}").into(),
    )
}

/// How a batch is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Upsert,
    Replace,
}

macro_rules! write_rows {
    ($conn:expr, $table:ident, $row:ty, $records:expr, $mode:expr) => {{
        let rows: Vec<$row> = $records.iter().map(<$row>::from).collect();
        if $mode == WriteMode::Replace {
            diesel::delete($table::table).execute($conn)?;
        }
        let mut written = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            written += diesel::replace_into($table::table)
                .values(chunk)
                .execute($conn)?;
        }
        Ok(written)
    }};
}

fn write_batch(
    conn: &mut SqliteConnection,
    batch: &MirrorBatch,
    mode: WriteMode,
) -> QueryResult<usize> {
    use MirrorRows as R;
    use MirrorTable as T;

    match (batch.table, &batch.rows) {
        (T::Brand, R::Lookup(records)) => write_rows!(conn, brand, BrandRow, records, mode),
        (T::Category, R::Lookup(records)) => write_rows!(conn, category, CategoryRow, records, mode),
        (T::Unit, R::Lookup(records)) => write_rows!(conn, unit, UnitRow, records, mode),
        (T::Batch, R::Lookup(records)) => write_rows!(conn, batch, BatchRow, records, mode),
        (T::Status, R::Lookup(records)) => write_rows!(conn, status, StatusRow, records, mode),
        (T::PaymentType, R::Lookup(records)) => {
            write_rows!(conn, payment_type, PaymentTypeRow, records, mode)
        }
        (T::Company, R::Party(records)) => write_rows!(conn, company, CompanyRow, records, mode),
        (T::Customer, R::Party(records)) => {
            write_rows!(conn, customer, CustomerRow, records, mode)
        }
        (T::Supplier, R::Supplier(records)) => {
            write_rows!(conn, supplier, SupplierRow, records, mode)
        }
        (T::User, R::User(records)) => write_rows!(conn, user, UserRow, records, mode),
        (T::Product, R::Product(records)) => write_rows!(conn, product, ProductRow, records, mode),
        (T::ProductVariation, R::ProductVariation(records)) => {
            write_rows!(conn, product_variations, ProductVariationRow, records, mode)
        }
        (T::Stock, R::Stock(records)) => write_rows!(conn, stock, StockRow, records, mode),
        (table, _) => Err(shape_mismatch(table)),
    }
}

fn clear_table(conn: &mut SqliteConnection, table: MirrorTable) -> QueryResult<usize> {
    match table {
        MirrorTable::Brand => diesel::delete(brand::table).execute(conn),
        MirrorTable::Category => diesel::delete(category::table).execute(conn),
        MirrorTable::Unit => diesel::delete(unit::table).execute(conn),
        MirrorTable::Batch => diesel::delete(batch::table).execute(conn),
        MirrorTable::Status => diesel::delete(status::table).execute(conn),
        MirrorTable::PaymentType => diesel::delete(payment_type::table).execute(conn),
        MirrorTable::Company => diesel::delete(company::table).execute(conn),
        MirrorTable::Customer => diesel::delete(customer::table).execute(conn),
        MirrorTable::Supplier => diesel::delete(supplier::table).execute(conn),
        MirrorTable::User => diesel::delete(user::table).execute(conn),
        MirrorTable::Product => diesel::delete(product::table).execute(conn),
        MirrorTable::ProductVariation => diesel::delete(product_variations::table).execute(conn),
        MirrorTable::Stock => diesel::delete(stock::table).execute(conn),
    }
}

macro_rules! read_rows {
    ($conn:expr, $table:ident, $row:ty, $shape:ident) => {{
        let rows: Vec<$row> = $table::table
            .select(<$row>::as_select())
            .order($table::id)
            .load($conn)?;
        Ok(MirrorRows::$shape(rows.into_iter().map(Into::into).collect()))
    }};
}

fn load_table(conn: &mut SqliteConnection, table: MirrorTable) -> QueryResult<MirrorRows> {
    match table {
        MirrorTable::Brand => read_rows!(conn, brand, BrandRow, Lookup),
        MirrorTable::Category => read_rows!(conn, category, CategoryRow, Lookup),
        MirrorTable::Unit => read_rows!(conn, unit, UnitRow, Lookup),
        MirrorTable::Batch => read_rows!(conn, batch, BatchRow, Lookup),
        MirrorTable::Status => read_rows!(conn, status, StatusRow, Lookup),
        MirrorTable::PaymentType => read_rows!(conn, payment_type, PaymentTypeRow, Lookup),
        MirrorTable::Company => read_rows!(conn, company, CompanyRow, Party),
        MirrorTable::Customer => read_rows!(conn, customer, CustomerRow, Party),
        MirrorTable::Supplier => read_rows!(conn, supplier, SupplierRow, Supplier),
        MirrorTable::User => read_rows!(conn, user, UserRow, User),
        MirrorTable::Product => read_rows!(conn, product, ProductRow, Product),
        MirrorTable::ProductVariation => {
            read_rows!(conn, product_variations, ProductVariationRow, ProductVariation)
        }
        MirrorTable::Stock => read_rows!(conn, stock, StockRow, Stock),
    }
}

fn apply(
    conn: &mut SqliteConnection,
    batch: &MirrorBatch,
    mode: WriteMode,
) -> Result<usize, MirrorStoreError> {
    let written = conn
        .transaction(|conn| write_batch(conn, batch, mode))
        .map_err(|err| write_error(batch.table, &err))?;
    debug!(table = %batch.table, written, ?mode, "mirror table written");
    Ok(written)
}

#[async_trait]
impl MirrorStore for SqliteMirrorStore {
    async fn upsert(&self, batch: MirrorBatch) -> Result<usize, MirrorStoreError> {
        self.with_connection(move |conn| apply(conn, &batch, WriteMode::Upsert))
            .await
    }

    async fn replace_all(&self, batch: MirrorBatch) -> Result<usize, MirrorStoreError> {
        self.with_connection(move |conn| apply(conn, &batch, WriteMode::Replace))
            .await
    }

    async fn clear(&self, table: MirrorTable) -> Result<usize, MirrorStoreError> {
        self.with_connection(move |conn| {
            conn.transaction(|conn| clear_table(conn, table))
                .map_err(|err| write_error(table, &err))
        })
        .await
    }

    async fn missing_columns(&self) -> Result<Vec<ColumnDrift>, MirrorStoreError> {
        self.with_connection(|conn| {
            let mut drift = Vec::new();
            for table in MirrorTable::ALL {
                let present: Vec<String> = sql_query("SELECT name FROM pragma_table_info(?)")
                    .bind::<Text, _>(table.name())
                    .load::<TableColumnRow>(conn)
                    .map_err(|err| MirrorStoreError::query(err.to_string()))?
                    .into_iter()
                    .map(|row| row.name)
                    .collect();
                let missing = missing_from(declared_columns(table), &present);
                if !missing.is_empty() {
                    drift.push(ColumnDrift { table, missing });
                }
            }
            Ok(drift)
        })
        .await
    }
}

#[cfg(test)]
#[path = "sqlite_mirror_store_tests.rs"]
mod tests;
