//! Diesel-async adapter reading mirrored tables from the primary MySQL.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::mirror::{ColumnDrift, MirrorBatch, MirrorRows, MirrorTable};
use crate::domain::ports::{MirrorSource, MirrorSourceError};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::mirror_models::{
    BatchRow, BrandRow, CategoryRow, CompanyRow, CustomerRow, PaymentTypeRow, ProductRow,
    ProductVariationRow, StatusRow, StockRow, SupplierRow, UnitRow, UserRow,
};
use super::pool::{DbPool, PoolError};
use super::schema::{
    batch, brand, category, company, customer, declared_columns, missing_from, payment_type,
    product, product_variations, status, stock, supplier, unit, user,
};

#[derive(Debug, QueryableByName)]
struct ColumnNameRow {
    #[diesel(sql_type = Text)]
    column_name: String,
}

/// Mirror source backed by the primary database pool.
#[derive(Clone)]
pub struct DieselMirrorSource {
    pool: DbPool,
}

impl DieselMirrorSource {
    /// Create a new source over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> MirrorSourceError {
    map_basic_pool_error(error, MirrorSourceError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> MirrorSourceError {
    map_basic_diesel_error(error, MirrorSourceError::query, MirrorSourceError::connection)
}

/// Load every row of `$table` through `$row` into `MirrorRows::$shape`.
macro_rules! load_all {
    ($conn:expr, $table:ident, $row:ty, $shape:ident) => {{
        let rows: Vec<$row> = $table::table
            .select(<$row>::as_select())
            .order($table::id)
            .load(&mut $conn)
            .await
            .map_err(map_diesel_error)?;
        MirrorRows::$shape(rows.into_iter().map(Into::into).collect())
    }};
}

#[async_trait]
impl MirrorSource for DieselMirrorSource {
    async fn fetch(&self, table: MirrorTable) -> Result<MirrorBatch, MirrorSourceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = match table {
            MirrorTable::Brand => load_all!(conn, brand, BrandRow, Lookup),
            MirrorTable::Category => load_all!(conn, category, CategoryRow, Lookup),
            MirrorTable::Unit => load_all!(conn, unit, UnitRow, Lookup),
            MirrorTable::Batch => load_all!(conn, batch, BatchRow, Lookup),
            MirrorTable::Status => load_all!(conn, status, StatusRow, Lookup),
            MirrorTable::PaymentType => load_all!(conn, payment_type, PaymentTypeRow, Lookup),
            MirrorTable::Company => load_all!(conn, company, CompanyRow, Party),
            MirrorTable::Customer => load_all!(conn, customer, CustomerRow, Party),
            MirrorTable::Supplier => load_all!(conn, supplier, SupplierRow, Supplier),
            MirrorTable::User => load_all!(conn, user, UserRow, User),
            MirrorTable::Product => load_all!(conn, product, ProductRow, Product),
            MirrorTable::ProductVariation => {
                load_all!(conn, product_variations, ProductVariationRow, ProductVariation)
            }
            MirrorTable::Stock => {
                let rows: Vec<StockRow> = stock::table
                    .filter(stock::quantity.gt(0.0))
                    .select(StockRow::as_select())
                    .order(stock::id)
                    .load(&mut conn)
                    .await
                    .map_err(map_diesel_error)?;
                MirrorRows::Stock(rows.into_iter().map(Into::into).collect())
            }
        };
        debug!(table = %table, rows = rows.len(), "fetched primary snapshot");
        Ok(MirrorBatch::new(table, rows))
    }

    async fn missing_columns(&self) -> Result<Vec<ColumnDrift>, MirrorSourceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut drift = Vec::new();
        for table in MirrorTable::ALL {
            let present: Vec<String> = sql_query(
                "SELECT COLUMN_NAME AS column_name FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ?",
            )
            .bind::<Text, _>(table.name())
            .load::<ColumnNameRow>(&mut conn)
            .await
            .map_err(map_diesel_error)?
            .into_iter()
            .map(|row| row.column_name)
            .collect();
            let missing = missing_from(declared_columns(table), &present);
            if !missing.is_empty() {
                drift.push(ColumnDrift { table, missing });
            }
        }
        Ok(drift)
    }
}
