//! Row shapes carried between the primary database and the mirror.
//!
//! Each record lists exactly the columns both databases share. Timestamps
//! are naive: the primary stores shop-local wall time.

use chrono::NaiveDateTime;

use super::MirrorTable;

/// Lookup row: brand, category, unit, batch, status, payment type.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRecord {
    pub id: i32,
    pub name: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Contactable party: company or customer.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyRecord {
    pub id: i32,
    pub name: String,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Supplier, a party attached to a company.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierRecord {
    pub id: i32,
    pub name: String,
    pub company_id: Option<i32>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Staff account. Credentials are never mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status_id: Option<i32>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub id: i32,
    pub name: String,
    pub code: Option<String>,
    pub barcode: Option<String>,
    pub category_id: Option<i32>,
    pub brand_id: Option<i32>,
    pub unit_id: Option<i32>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductVariationRecord {
    pub id: i32,
    pub product_id: i32,
    pub name: String,
    pub barcode: Option<String>,
    pub status_id: Option<i32>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Sellable stock line used for barcode lookups at the till.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRecord {
    pub id: i32,
    pub product_id: i32,
    pub variation_id: Option<i32>,
    pub batch_id: Option<i32>,
    pub barcode: Option<String>,
    pub quantity: f64,
    pub cost_price: Option<f64>,
    pub selling_price: Option<f64>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Records that carry a primary key.
pub trait Keyed {
    fn id(&self) -> i32;
}

macro_rules! impl_keyed {
    ($($record:ty),+ $(,)?) => {
        $(
            impl Keyed for $record {
                fn id(&self) -> i32 {
                    self.id
                }
            }
        )+
    };
}

impl_keyed!(
    LookupRecord,
    PartyRecord,
    SupplierRecord,
    UserRecord,
    ProductRecord,
    ProductVariationRecord,
    StockRecord,
);

/// Rows of one table, typed by record shape.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorRows {
    Lookup(Vec<LookupRecord>),
    Party(Vec<PartyRecord>),
    Supplier(Vec<SupplierRecord>),
    User(Vec<UserRecord>),
    Product(Vec<ProductRecord>),
    ProductVariation(Vec<ProductVariationRecord>),
    Stock(Vec<StockRecord>),
}

/// Replace rows sharing a key, append the rest.
fn merge_by_id<T: Keyed>(existing: &mut Vec<T>, incoming: Vec<T>) {
    for record in incoming {
        match existing.iter_mut().find(|current| current.id() == record.id()) {
            Some(current) => *current = record,
            None => existing.push(record),
        }
    }
}

impl MirrorRows {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Lookup(rows) => rows.len(),
            Self::Party(rows) => rows.len(),
            Self::Supplier(rows) => rows.len(),
            Self::User(rows) => rows.len(),
            Self::Product(rows) => rows.len(),
            Self::ProductVariation(rows) => rows.len(),
            Self::Stock(rows) => rows.len(),
        }
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Primary keys in row order.
    pub fn ids(&self) -> Vec<i32> {
        fn collect<T: Keyed>(rows: &[T]) -> Vec<i32> {
            rows.iter().map(Keyed::id).collect()
        }
        match self {
            Self::Lookup(rows) => collect(rows),
            Self::Party(rows) => collect(rows),
            Self::Supplier(rows) => collect(rows),
            Self::User(rows) => collect(rows),
            Self::Product(rows) => collect(rows),
            Self::ProductVariation(rows) => collect(rows),
            Self::Stock(rows) => collect(rows),
        }
    }

    /// Upsert `incoming` into `self` by primary key.
    ///
    /// Returns `false`, leaving `self` untouched, when the shapes differ.
    pub fn merge(&mut self, incoming: Self) -> bool {
        match (self, incoming) {
            (Self::Lookup(current), Self::Lookup(rows)) => merge_by_id(current, rows),
            (Self::Party(current), Self::Party(rows)) => merge_by_id(current, rows),
            (Self::Supplier(current), Self::Supplier(rows)) => merge_by_id(current, rows),
            (Self::User(current), Self::User(rows)) => merge_by_id(current, rows),
            (Self::Product(current), Self::Product(rows)) => merge_by_id(current, rows),
            (Self::ProductVariation(current), Self::ProductVariation(rows)) => {
                merge_by_id(current, rows);
            }
            (Self::Stock(current), Self::Stock(rows)) => merge_by_id(current, rows),
            _ => return false,
        }
        true
    }
}

/// A snapshot of one table pulled from the primary.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorBatch {
    pub table: MirrorTable,
    pub rows: MirrorRows,
}

impl MirrorBatch {
    pub fn new(table: MirrorTable, rows: MirrorRows) -> Self {
        Self { table, rows }
    }

    /// Number of rows in the snapshot.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop stock lines with nothing left to sell. Other shapes are kept.
    ///
    /// Returns how many rows were dropped.
    pub fn retain_sellable(&mut self) -> usize {
        let MirrorRows::Stock(rows) = &mut self.rows else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|row| row.quantity > 0.0);
        before - rows.len()
    }
}
