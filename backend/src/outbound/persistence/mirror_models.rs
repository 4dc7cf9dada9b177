//! Diesel row structs for the mirrored tables.
//!
//! Every struct is bound to one table and checked against both backends, so
//! the same row reads from MySQL and writes to SQLite. These types stay in
//! the persistence layer; the domain sees the records in
//! [`crate::domain::mirror`].

use chrono::{NaiveDateTime, Timelike};
use diesel::prelude::*;

use crate::domain::mirror::{
    LookupRecord, PartyRecord, ProductRecord, ProductVariationRecord, StockRecord, SupplierRecord,
    UserRecord,
};

use super::schema::{
    batch, brand, category, company, customer, payment_type, product, product_variations, status,
    stock, supplier, unit, user,
};

/// Normalisation applied to each value before it is written to the mirror.
pub(crate) trait MirrorValue: Sized {
    fn canonical(self) -> Self {
        self
    }
}

impl MirrorValue for i32 {}
impl MirrorValue for f64 {}
impl MirrorValue for String {}
impl MirrorValue for Option<i32> {}
impl MirrorValue for Option<f64> {}
impl MirrorValue for Option<String> {}

/// Timestamps are stored with whole-second precision so SQLite holds
/// `YYYY-MM-DD HH:MM:SS` text.
impl MirrorValue for Option<NaiveDateTime> {
    fn canonical(self) -> Self {
        self.map(|value| value.with_nanosecond(0).unwrap_or(value))
    }
}

/// Declare a row struct for `$table` mapping to and from `$record`.
macro_rules! mirror_row {
    ($row:ident, $table:ident, $record:ident { $($field:ident : $ty:ty),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
        #[diesel(table_name = $table)]
        #[diesel(check_for_backend(diesel::mysql::Mysql, diesel::sqlite::Sqlite))]
        pub(crate) struct $row {
            $(pub $field: $ty,)+
        }

        impl From<$row> for $record {
            fn from(row: $row) -> Self {
                Self { $($field: row.$field,)+ }
            }
        }

        impl From<&$record> for $row {
            fn from(record: &$record) -> Self {
                Self { $($field: record.$field.clone().canonical(),)+ }
            }
        }
    };
}

macro_rules! lookup_row {
    ($($row:ident => $table:ident),+ $(,)?) => {
        $(
            mirror_row!($row, $table, LookupRecord {
                id: i32,
                name: String,
                created_at: Option<NaiveDateTime>,
                updated_at: Option<NaiveDateTime>,
            });
        )+
    };
}

lookup_row!(
    BrandRow => brand,
    CategoryRow => category,
    UnitRow => unit,
    BatchRow => batch,
    StatusRow => status,
    PaymentTypeRow => payment_type,
);

macro_rules! party_row {
    ($($row:ident => $table:ident),+ $(,)?) => {
        $(
            mirror_row!($row, $table, PartyRecord {
                id: i32,
                name: String,
                contact: Option<String>,
                email: Option<String>,
                address: Option<String>,
                created_at: Option<NaiveDateTime>,
                updated_at: Option<NaiveDateTime>,
            });
        )+
    };
}

party_row!(CompanyRow => company, CustomerRow => customer);

mirror_row!(SupplierRow, supplier, SupplierRecord {
    id: i32,
    name: String,
    company_id: Option<i32>,
    contact: Option<String>,
    email: Option<String>,
    address: Option<String>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
});

mirror_row!(UserRow, user, UserRecord {
    id: i32,
    name: String,
    email: Option<String>,
    role: Option<String>,
    status_id: Option<i32>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
});

mirror_row!(ProductRow, product, ProductRecord {
    id: i32,
    name: String,
    code: Option<String>,
    barcode: Option<String>,
    category_id: Option<i32>,
    brand_id: Option<i32>,
    unit_id: Option<i32>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
});

mirror_row!(ProductVariationRow, product_variations, ProductVariationRecord {
    id: i32,
    product_id: i32,
    name: String,
    barcode: Option<String>,
    status_id: Option<i32>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
});

mirror_row!(StockRow, stock, StockRecord {
    id: i32,
    product_id: i32,
    variation_id: Option<i32>,
    batch_id: Option<i32>,
    barcode: Option<String>,
    quantity: f64,
    cost_price: Option<f64>,
    selling_price: Option<f64>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
});
