//! The set of mirrored tables and how each one is synchronised.

use std::fmt;

use super::MirrorRows;

/// How a table reacts to the remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSyncPolicy {
    /// Insert-or-replace by primary key. An empty remote snapshot leaves the
    /// local table untouched, so a transient empty read never wipes
    /// reference data.
    UpsertKeepOnEmpty,
    /// Delete everything, then insert the snapshot. An empty remote snapshot
    /// clears the local table: for stock, empty means nothing is sellable.
    ReplaceClearOnEmpty,
}

/// A primary-database table mirrored into the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MirrorTable {
    Brand,
    Category,
    Unit,
    Batch,
    Status,
    PaymentType,
    Company,
    Supplier,
    Customer,
    User,
    Product,
    ProductVariation,
    Stock,
}

impl MirrorTable {
    /// Low-churn lookup tables, synchronised concurrently.
    pub const REFERENCE: [Self; 10] = [
        Self::Brand,
        Self::Category,
        Self::Unit,
        Self::Batch,
        Self::Status,
        Self::PaymentType,
        Self::Company,
        Self::Supplier,
        Self::Customer,
        Self::User,
    ];

    /// Transactional tables, synchronised one after the other.
    pub const CORE: [Self; 2] = [Self::Product, Self::ProductVariation];

    /// Every mirrored table in pass order.
    pub const ALL: [Self; 13] = [
        Self::Brand,
        Self::Category,
        Self::Unit,
        Self::Batch,
        Self::Status,
        Self::PaymentType,
        Self::Company,
        Self::Supplier,
        Self::Customer,
        Self::User,
        Self::Product,
        Self::ProductVariation,
        Self::Stock,
    ];

    /// Table name, identical in the primary and the mirror.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Brand => "brand",
            Self::Category => "category",
            Self::Unit => "unit",
            Self::Batch => "batch",
            Self::Status => "status",
            Self::PaymentType => "payment_type",
            Self::Company => "company",
            Self::Supplier => "supplier",
            Self::Customer => "customer",
            Self::User => "user",
            Self::Product => "product",
            Self::ProductVariation => "product_variations",
            Self::Stock => "stock",
        }
    }

    /// Empty row set shaped for this table.
    pub fn empty_rows(self) -> MirrorRows {
        match self {
            Self::Brand
            | Self::Category
            | Self::Unit
            | Self::Batch
            | Self::Status
            | Self::PaymentType => MirrorRows::Lookup(Vec::new()),
            Self::Company | Self::Customer => MirrorRows::Party(Vec::new()),
            Self::Supplier => MirrorRows::Supplier(Vec::new()),
            Self::User => MirrorRows::User(Vec::new()),
            Self::Product => MirrorRows::Product(Vec::new()),
            Self::ProductVariation => MirrorRows::ProductVariation(Vec::new()),
            Self::Stock => MirrorRows::Stock(Vec::new()),
        }
    }

    /// Synchronisation policy for this table.
    pub const fn policy(self) -> TableSyncPolicy {
        match self {
            Self::Stock => TableSyncPolicy::ReplaceClearOnEmpty,
            _ => TableSyncPolicy::UpsertKeepOnEmpty,
        }
    }
}

impl fmt::Display for MirrorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
