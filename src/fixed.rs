// Fixed-contract trip store adapter
//
// Owns its own database file and auto-increment key. Master data is
// referenced by id; the ordered vehicle/driver reference lists are persisted
// as JSON array columns, a quirk of this store's schema that never leaks
// past the adapter.

use crate::adapter::{
    DateFilter, STORE_ORDER_SQL, TripStore, date_col, decimal_col, json_col, opt_decimal_col,
    opt_json_col, push_date_window,
};
use crate::error::{LedgerError, Result};
use crate::id::StoreTag;
use crate::model::{FixedDraft, FixedPatch, FixedTrip, TripRecord, TripStatus, TripType, now_ms};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::debug;

const TAG: StoreTag = StoreTag::Fixed;
const DB_FILE: &str = "fixed_trips.db";

const COLUMNS: &str = "local_id, transaction_date, opening_km, closing_km, status, trip_close, \
     fixed_freight, per_km_rate, toll_expenses, parking_charges, loading_charges, \
     unloading_charges, other_charges, revenue_override, receipt_file_ids, \
     vehicle_ids, driver_ids, vendor_id, customer_id, project_id, replacement_driver, \
     advance_paid, balance_paid, created_at, updated_at";

const INSERT_SQL: &str = "INSERT INTO fixed_trips (transaction_date, opening_km, closing_km, \
     status, trip_close, fixed_freight, per_km_rate, toll_expenses, parking_charges, \
     loading_charges, unloading_charges, other_charges, revenue_override, receipt_file_ids, \
     vehicle_ids, driver_ids, vendor_id, customer_id, project_id, replacement_driver, \
     advance_paid, balance_paid, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const UPDATE_SQL: &str = "UPDATE fixed_trips SET transaction_date = ?, opening_km = ?, \
     closing_km = ?, status = ?, trip_close = ?, fixed_freight = ?, per_km_rate = ?, \
     toll_expenses = ?, parking_charges = ?, loading_charges = ?, unloading_charges = ?, \
     other_charges = ?, revenue_override = ?, receipt_file_ids = ?, vehicle_ids = ?, \
     driver_ids = ?, vendor_id = ?, customer_id = ?, project_id = ?, replacement_driver = ?, \
     advance_paid = ?, balance_paid = ?, created_at = ?, updated_at = ? WHERE local_id = ?";

pub struct FixedStore {
    db: Connection,
}

impl FixedStore {
    /// Open or create the fixed-contract store inside the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        let db = Connection::open(dir.join(DB_FILE)).map_err(|e| TAG.io(e))?;
        let store = Self { db };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS fixed_trips (
                    local_id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    transaction_date    TEXT NOT NULL,
                    opening_km          INTEGER,
                    closing_km          INTEGER,
                    status              TEXT NOT NULL,
                    trip_close          INTEGER NOT NULL,
                    fixed_freight       TEXT NOT NULL,
                    per_km_rate         TEXT NOT NULL,
                    toll_expenses       TEXT NOT NULL,
                    parking_charges     TEXT NOT NULL,
                    loading_charges     TEXT NOT NULL,
                    unloading_charges   TEXT NOT NULL,
                    other_charges       TEXT NOT NULL,
                    revenue_override    TEXT,
                    receipt_file_ids    TEXT NOT NULL,
                    vehicle_ids         TEXT NOT NULL,
                    driver_ids          TEXT NOT NULL,
                    vendor_id           INTEGER,
                    customer_id         INTEGER,
                    project_id          INTEGER,
                    replacement_driver  TEXT,
                    advance_paid        TEXT NOT NULL,
                    balance_paid        TEXT NOT NULL,
                    created_at          INTEGER NOT NULL,
                    updated_at          INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_fixed_trips_sort
                    ON fixed_trips(updated_at, transaction_date);
                CREATE INDEX IF NOT EXISTS idx_fixed_trips_date
                    ON fixed_trips(transaction_date);
                "#,
            )
            .map_err(|e| TAG.io(e))
    }

    /// Insert a new fixed trip; the store assigns `local_id` and stamps both
    /// timestamps.
    pub fn insert(&mut self, draft: FixedDraft) -> Result<FixedTrip> {
        let mut trip = draft.into_trip(now_ms());
        let errors = trip.validation_errors();
        if !errors.is_empty() {
            return Err(LedgerError::validation(errors));
        }

        let values = row_values(&trip)?;
        let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        self.db
            .execute(INSERT_SQL, refs.as_slice())
            .map_err(|e| TAG.io(e))?;
        trip.local_id = self.db.last_insert_rowid();

        debug!(local_id = trip.local_id, "inserted fixed trip");
        Ok(trip)
    }

    /// Patch an existing trip inside a transaction: read, merge, re-validate,
    /// write with a fresh server-stamped `updated_at`.
    pub fn update_by_local_id(
        &mut self,
        local_id: i64,
        patch: &FixedPatch,
    ) -> Result<Option<FixedTrip>> {
        let tx = self.db.transaction().map_err(|e| TAG.io(e))?;

        let Some(mut trip) = get_row(&tx, local_id)? else {
            return Ok(None);
        };

        patch.apply(&mut trip);
        trip.core.updated_at = now_ms();

        let errors = trip.validation_errors();
        if !errors.is_empty() {
            return Err(LedgerError::validation(errors));
        }

        let mut values = row_values(&trip)?;
        values.push(Box::new(local_id));
        let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        tx.execute(UPDATE_SQL, refs.as_slice()).map_err(|e| TAG.io(e))?;
        tx.commit().map_err(|e| TAG.io(e))?;

        debug!(local_id, "updated fixed trip");
        Ok(Some(trip))
    }
}

impl TripStore for FixedStore {
    fn tag(&self) -> StoreTag {
        TAG
    }

    fn list_page(&self, filter: &DateFilter, fetch: usize) -> Result<Vec<TripRecord>> {
        let mut sql = format!("SELECT {} FROM fixed_trips WHERE 1=1", COLUMNS);
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        push_date_window(&mut sql, filter, &mut values);
        sql.push(' ');
        sql.push_str(STORE_ORDER_SQL);
        sql.push_str(" LIMIT ?");
        values.push(Box::new(fetch as i64));

        let mut stmt = self.db.prepare(&sql).map_err(|e| TAG.io(e))?;
        let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt
            .query_map(refs.as_slice(), map_trip_row)
            .map_err(|e| TAG.io(e))?;

        let mut trips = Vec::new();
        for row in rows {
            trips.push(TripRecord::Fixed(row.map_err(|e| TAG.io(e))?));
        }
        Ok(trips)
    }

    fn count(&self, filter: &DateFilter) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM fixed_trips WHERE 1=1");
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        push_date_window(&mut sql, filter, &mut values);

        let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let count: i64 = self
            .db
            .query_row(&sql, refs.as_slice(), |row| row.get(0))
            .map_err(|e| TAG.io(e))?;
        Ok(count as u64)
    }

    fn get_by_local_id(&self, local_id: i64) -> Result<Option<TripRecord>> {
        Ok(get_row(&self.db, local_id)?.map(TripRecord::Fixed))
    }

    fn delete_by_local_id(&mut self, local_id: i64) -> Result<bool> {
        let affected = self
            .db
            .execute("DELETE FROM fixed_trips WHERE local_id = ?", params![local_id])
            .map_err(|e| TAG.io(e))?;
        Ok(affected > 0)
    }
}

fn get_row(conn: &Connection, local_id: i64) -> Result<Option<FixedTrip>> {
    let sql = format!("SELECT {} FROM fixed_trips WHERE local_id = ?", COLUMNS);
    conn.query_row(&sql, params![local_id], map_trip_row)
        .optional()
        .map_err(|e| TAG.io(e))
}

fn map_trip_row(row: &Row<'_>) -> rusqlite::Result<FixedTrip> {
    let status_raw: String = row.get(4)?;
    let status = TripStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown trip status: {}", status_raw).into(),
        )
    })?;

    Ok(FixedTrip {
        local_id: row.get(0)?,
        core: crate::model::TripCore {
            trip_type: TripType::Fixed,
            transaction_date: date_col(row, 1)?,
            opening_km: row.get(2)?,
            closing_km: row.get(3)?,
            status,
            trip_close: row.get(5)?,
            fixed_freight: decimal_col(row, 6)?,
            per_km_rate: decimal_col(row, 7)?,
            toll_expenses: decimal_col(row, 8)?,
            parking_charges: decimal_col(row, 9)?,
            loading_charges: decimal_col(row, 10)?,
            unloading_charges: decimal_col(row, 11)?,
            other_charges: decimal_col(row, 12)?,
            revenue_override: opt_decimal_col(row, 13)?,
            receipt_file_ids: json_col(row, 14)?,
            created_at: row.get(23)?,
            updated_at: row.get(24)?,
        },
        vehicle_ids: json_col(row, 15)?,
        driver_ids: json_col(row, 16)?,
        vendor_id: row.get(17)?,
        customer_id: row.get(18)?,
        project_id: row.get(19)?,
        replacement_driver: opt_json_col(row, 20)?,
        advance_paid: decimal_col(row, 21)?,
        balance_paid: decimal_col(row, 22)?,
    })
}

/// Bind values in `INSERT_SQL`/`UPDATE_SQL` column order.
fn row_values(trip: &FixedTrip) -> Result<Vec<Box<dyn rusqlite::ToSql>>> {
    let core = &trip.core;
    let replacement_driver = trip
        .replacement_driver
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| TAG.io(e))?;

    let values: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(core.transaction_date.to_string()),
        Box::new(core.opening_km),
        Box::new(core.closing_km),
        Box::new(core.status.as_str()),
        Box::new(core.trip_close),
        Box::new(core.fixed_freight.to_string()),
        Box::new(core.per_km_rate.to_string()),
        Box::new(core.toll_expenses.to_string()),
        Box::new(core.parking_charges.to_string()),
        Box::new(core.loading_charges.to_string()),
        Box::new(core.unloading_charges.to_string()),
        Box::new(core.other_charges.to_string()),
        Box::new(core.revenue_override.map(|d| d.to_string())),
        Box::new(serde_json::to_string(&core.receipt_file_ids).map_err(|e| TAG.io(e))?),
        Box::new(serde_json::to_string(&trip.vehicle_ids).map_err(|e| TAG.io(e))?),
        Box::new(serde_json::to_string(&trip.driver_ids).map_err(|e| TAG.io(e))?),
        Box::new(trip.vendor_id),
        Box::new(trip.customer_id),
        Box::new(trip.project_id),
        Box::new(replacement_driver),
        Box::new(trip.advance_paid.to_string()),
        Box::new(trip.balance_paid.to_string()),
        Box::new(core.created_at),
        Box::new(core.updated_at),
    ];
    Ok(values)
}
