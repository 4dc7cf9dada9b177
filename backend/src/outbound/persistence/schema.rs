//! Diesel table definitions for the mirrored tables.
//!
//! The same definitions address the primary MySQL tables and their SQLite
//! mirrors: both sides carry exactly these columns. SQLite stores
//! `Timestamp` values as text, which the row mappers keep in the canonical
//! `YYYY-MM-DD HH:MM:SS` form.
//!
//! # Maintenance
//!
//! Adding a column means updating the table below, [`declared_columns`], the
//! row structs in `mirror_models`, and the SQLite migration. The
//! `declared_columns_match_table_definitions` test catches a missed list.

use crate::domain::mirror::MirrorTable;

diesel::table! {
    brand (id) {
        id -> Integer,
        name -> Text,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    category (id) {
        id -> Integer,
        name -> Text,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    unit (id) {
        id -> Integer,
        name -> Text,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    batch (id) {
        id -> Integer,
        name -> Text,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    status (id) {
        id -> Integer,
        name -> Text,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    payment_type (id) {
        id -> Integer,
        name -> Text,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    company (id) {
        id -> Integer,
        name -> Text,
        contact -> Nullable<Text>,
        email -> Nullable<Text>,
        address -> Nullable<Text>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    customer (id) {
        id -> Integer,
        name -> Text,
        contact -> Nullable<Text>,
        email -> Nullable<Text>,
        address -> Nullable<Text>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    supplier (id) {
        id -> Integer,
        name -> Text,
        company_id -> Nullable<Integer>,
        contact -> Nullable<Text>,
        email -> Nullable<Text>,
        address -> Nullable<Text>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    /// Staff accounts. Password hashes are deliberately absent.
    user (id) {
        id -> Integer,
        name -> Text,
        email -> Nullable<Text>,
        role -> Nullable<Text>,
        status_id -> Nullable<Integer>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    product (id) {
        id -> Integer,
        name -> Text,
        code -> Nullable<Text>,
        barcode -> Nullable<Text>,
        category_id -> Nullable<Integer>,
        brand_id -> Nullable<Integer>,
        unit_id -> Nullable<Integer>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    product_variations (id) {
        id -> Integer,
        product_id -> Integer,
        name -> Text,
        barcode -> Nullable<Text>,
        status_id -> Nullable<Integer>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    /// Stock lines. Only rows with a positive quantity reach the mirror.
    stock (id) {
        id -> Integer,
        product_id -> Integer,
        variation_id -> Nullable<Integer>,
        batch_id -> Nullable<Integer>,
        barcode -> Nullable<Text>,
        quantity -> Double,
        cost_price -> Nullable<Double>,
        selling_price -> Nullable<Double>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
    }
}

const LOOKUP_COLUMNS: &[&str] = &["id", "name", "created_at", "updated_at"];
const PARTY_COLUMNS: &[&str] = &[
    "id",
    "name",
    "contact",
    "email",
    "address",
    "created_at",
    "updated_at",
];
const SUPPLIER_COLUMNS: &[&str] = &[
    "id",
    "name",
    "company_id",
    "contact",
    "email",
    "address",
    "created_at",
    "updated_at",
];
const USER_COLUMNS: &[&str] = &[
    "id",
    "name",
    "email",
    "role",
    "status_id",
    "created_at",
    "updated_at",
];
const PRODUCT_COLUMNS: &[&str] = &[
    "id",
    "name",
    "code",
    "barcode",
    "category_id",
    "brand_id",
    "unit_id",
    "created_at",
    "updated_at",
];
const PRODUCT_VARIATION_COLUMNS: &[&str] = &[
    "id",
    "product_id",
    "name",
    "barcode",
    "status_id",
    "created_at",
    "updated_at",
];
const STOCK_COLUMNS: &[&str] = &[
    "id",
    "product_id",
    "variation_id",
    "batch_id",
    "barcode",
    "quantity",
    "cost_price",
    "selling_price",
    "created_at",
    "updated_at",
];

/// Column names declared for `table`, in definition order.
pub fn declared_columns(table: MirrorTable) -> &'static [&'static str] {
    match table {
        MirrorTable::Brand
        | MirrorTable::Category
        | MirrorTable::Unit
        | MirrorTable::Batch
        | MirrorTable::Status
        | MirrorTable::PaymentType => LOOKUP_COLUMNS,
        MirrorTable::Company | MirrorTable::Customer => PARTY_COLUMNS,
        MirrorTable::Supplier => SUPPLIER_COLUMNS,
        MirrorTable::User => USER_COLUMNS,
        MirrorTable::Product => PRODUCT_COLUMNS,
        MirrorTable::ProductVariation => PRODUCT_VARIATION_COLUMNS,
        MirrorTable::Stock => STOCK_COLUMNS,
    }
}

/// Columns in `declared` that are absent from `present`.
pub fn missing_from(declared: &[&str], present: &[String]) -> Vec<String> {
    declared
        .iter()
        .filter(|column| !present.iter().any(|found| found.eq_ignore_ascii_case(column)))
        .map(|column| (*column).to_owned())
        .collect()
}
