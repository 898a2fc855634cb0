// Shared surface of the two trip store adapters

use crate::error::Result;
use crate::id::StoreTag;
use crate::model::TripRecord;
use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

/// Date-range filter over `transaction_date`. Open-ended on either side.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateFilter {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }
}

/// Per-store sort: newest edits first, then newest trips, then highest key.
/// The federation engine applies the same key globally with the store tag
/// as the cross-store tiebreak.
pub(crate) const STORE_ORDER_SQL: &str =
    "ORDER BY updated_at DESC, transaction_date DESC, local_id DESC";

/// Uniform operations over one physical store. Inserts and updates stay on
/// the concrete adapters because their draft/patch types differ; the engine
/// uses this trait for everything it does generically. An adapter never
/// reaches into the other store.
pub trait TripStore {
    fn tag(&self) -> StoreTag;

    /// One page of records in store order. `fetch` is an over-fetch bound
    /// supplied by the engine, not the caller's page size.
    fn list_page(&self, filter: &DateFilter, fetch: usize) -> Result<Vec<TripRecord>>;

    /// Number of records matching the filter.
    fn count(&self, filter: &DateFilter) -> Result<u64>;

    fn get_by_local_id(&self, local_id: i64) -> Result<Option<TripRecord>>;

    /// Returns false if the row was already gone.
    fn delete_by_local_id(&mut self, local_id: i64) -> Result<bool>;
}

/// Append the optional date-window clauses and collect their parameters.
pub(crate) fn push_date_window(
    sql: &mut String,
    filter: &DateFilter,
    params: &mut Vec<Box<dyn rusqlite::ToSql>>,
) {
    if let Some(from) = filter.from {
        sql.push_str(" AND transaction_date >= ?");
        params.push(Box::new(from.to_string()));
    }
    if let Some(to) = filter.to {
        sql.push_str(" AND transaction_date <= ?");
        params.push(Box::new(to.to_string()));
    }
}

// ============================================================================
// Column mapping helpers
//
// Money and dates are stored as TEXT (exact decimal strings, ISO dates);
// list/object columns as JSON. Conversion failures map onto rusqlite's own
// error type so row closures stay uniform.
// ============================================================================

pub(crate) fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<rust_decimal::Decimal> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| conversion_err(idx, Box::new(e)))
}

pub(crate) fn opt_decimal_col(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<rust_decimal::Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion_err(idx, Box::new(e))))
        .transpose()
}

pub(crate) fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: chrono::ParseError| conversion_err(idx, Box::new(e)))
}

pub(crate) fn opt_date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e: chrono::ParseError| conversion_err(idx, Box::new(e)))
    })
    .transpose()
}

pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, Box::new(e)))
}

pub(crate) fn opt_json_col<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_err(idx, Box::new(e))))
        .transpose()
}

fn conversion_err(
    idx: usize,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, source)
}
