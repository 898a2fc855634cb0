// Ad-hoc/replacement trip store adapter
//
// Owns its own database file and auto-increment key, independent of the
// fixed store. Vehicle/vendor/driver are denormalized free-text columns,
// since this store exists precisely because those are not in master data.
// The advance/balance payment sub-records are flattened into columns.

use crate::adapter::{
    DateFilter, STORE_ORDER_SQL, TripStore, date_col, decimal_col, json_col, opt_date_col,
    opt_decimal_col, push_date_window,
};
use crate::error::{LedgerError, Result};
use crate::id::StoreTag;
use crate::model::{
    AdhocDraft, AdhocPatch, AdhocTrip, PaymentDetail, TripRecord, TripStatus, TripType, now_ms,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::debug;

const TAG: StoreTag = StoreTag::Adhoc;
const DB_FILE: &str = "adhoc_trips.db";

const COLUMNS: &str = "local_id, trip_type, transaction_date, opening_km, closing_km, status, \
     trip_close, fixed_freight, per_km_rate, toll_expenses, parking_charges, loading_charges, \
     unloading_charges, other_charges, revenue_override, receipt_file_ids, trip_no, \
     vehicle_number, vendor_name, driver_name, driver_number, driver_aadhar_number, \
     driver_licence_number, advance_amount, advance_mode, advance_date, advance_approved_by, \
     advance_paid_by, balance_amount, balance_mode, balance_date, balance_approved_by, \
     balance_paid_by, created_at, updated_at";

const INSERT_SQL: &str = "INSERT INTO adhoc_trips (trip_type, transaction_date, opening_km, \
     closing_km, status, trip_close, fixed_freight, per_km_rate, toll_expenses, parking_charges, \
     loading_charges, unloading_charges, other_charges, revenue_override, receipt_file_ids, \
     trip_no, vehicle_number, vendor_name, driver_name, driver_number, driver_aadhar_number, \
     driver_licence_number, advance_amount, advance_mode, advance_date, advance_approved_by, \
     advance_paid_by, balance_amount, balance_mode, balance_date, balance_approved_by, \
     balance_paid_by, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
     ?, ?, ?, ?, ?, ?, ?)";

const UPDATE_SQL: &str = "UPDATE adhoc_trips SET trip_type = ?, transaction_date = ?, \
     opening_km = ?, closing_km = ?, status = ?, trip_close = ?, fixed_freight = ?, \
     per_km_rate = ?, toll_expenses = ?, parking_charges = ?, loading_charges = ?, \
     unloading_charges = ?, other_charges = ?, revenue_override = ?, receipt_file_ids = ?, \
     trip_no = ?, vehicle_number = ?, vendor_name = ?, driver_name = ?, driver_number = ?, \
     driver_aadhar_number = ?, driver_licence_number = ?, advance_amount = ?, advance_mode = ?, \
     advance_date = ?, advance_approved_by = ?, advance_paid_by = ?, balance_amount = ?, \
     balance_mode = ?, balance_date = ?, balance_approved_by = ?, balance_paid_by = ?, \
     created_at = ?, updated_at = ? WHERE local_id = ?";

pub struct AdhocStore {
    db: Connection,
}

impl AdhocStore {
    /// Open or create the ad-hoc/replacement store inside the given
    /// directory.
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
                CREATE TABLE IF NOT EXISTS adhoc_trips (
                    local_id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    trip_type             TEXT NOT NULL,
                    transaction_date      TEXT NOT NULL,
                    opening_km            INTEGER,
                    closing_km            INTEGER,
                    status                TEXT NOT NULL,
                    trip_close            INTEGER NOT NULL,
                    fixed_freight         TEXT NOT NULL,
                    per_km_rate           TEXT NOT NULL,
                    toll_expenses         TEXT NOT NULL,
                    parking_charges       TEXT NOT NULL,
                    loading_charges       TEXT NOT NULL,
                    unloading_charges     TEXT NOT NULL,
                    other_charges         TEXT NOT NULL,
                    revenue_override      TEXT,
                    receipt_file_ids      TEXT NOT NULL,
                    trip_no               TEXT NOT NULL,
                    vehicle_number        TEXT NOT NULL,
                    vendor_name           TEXT NOT NULL,
                    driver_name           TEXT NOT NULL,
                    driver_number         TEXT NOT NULL,
                    driver_aadhar_number  TEXT,
                    driver_licence_number TEXT,
                    advance_amount        TEXT,
                    advance_mode          TEXT,
                    advance_date          TEXT,
                    advance_approved_by   TEXT,
                    advance_paid_by       TEXT,
                    balance_amount        TEXT,
                    balance_mode          TEXT,
                    balance_date          TEXT,
                    balance_approved_by   TEXT,
                    balance_paid_by       TEXT,
                    created_at            INTEGER NOT NULL,
                    updated_at            INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_adhoc_trips_sort
                    ON adhoc_trips(updated_at, transaction_date);
                CREATE INDEX IF NOT EXISTS idx_adhoc_trips_date
                    ON adhoc_trips(transaction_date);
                "#,
            )
            .map_err(|e| TAG.io(e))
    }

    /// Insert a new ad-hoc or replacement trip; the store assigns `local_id`
    /// and stamps both timestamps.
    pub fn insert(&mut self, draft: AdhocDraft) -> Result<AdhocTrip> {
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

        debug!(local_id = trip.local_id, trip_type = trip.core.trip_type.as_str(), "inserted ad-hoc trip");
        Ok(trip)
    }

    /// Patch an existing trip inside a transaction: read, merge, re-validate,
    /// write with a fresh server-stamped `updated_at`.
    pub fn update_by_local_id(
        &mut self,
        local_id: i64,
        patch: &AdhocPatch,
    ) -> Result<Option<AdhocTrip>> {
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

        debug!(local_id, "updated ad-hoc trip");
        Ok(Some(trip))
    }
}

impl TripStore for AdhocStore {
    fn tag(&self) -> StoreTag {
        TAG
    }

    fn list_page(&self, filter: &DateFilter, fetch: usize) -> Result<Vec<TripRecord>> {
        let mut sql = format!("SELECT {} FROM adhoc_trips WHERE 1=1", COLUMNS);
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
            trips.push(TripRecord::AdhocOrReplacement(row.map_err(|e| TAG.io(e))?));
        }
        Ok(trips)
    }

    fn count(&self, filter: &DateFilter) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM adhoc_trips WHERE 1=1");
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
        Ok(get_row(&self.db, local_id)?.map(TripRecord::AdhocOrReplacement))
    }

    fn delete_by_local_id(&mut self, local_id: i64) -> Result<bool> {
        let affected = self
            .db
            .execute("DELETE FROM adhoc_trips WHERE local_id = ?", params![local_id])
            .map_err(|e| TAG.io(e))?;
        Ok(affected > 0)
    }
}

fn get_row(conn: &Connection, local_id: i64) -> Result<Option<AdhocTrip>> {
    let sql = format!("SELECT {} FROM adhoc_trips WHERE local_id = ?", COLUMNS);
    conn.query_row(&sql, params![local_id], map_trip_row)
        .optional()
        .map_err(|e| TAG.io(e))
}

fn map_trip_row(row: &Row<'_>) -> rusqlite::Result<AdhocTrip> {
    let trip_type = text_enum(row, 1, TripType::parse, "trip type")?;
    let status = text_enum(row, 5, TripStatus::parse, "trip status")?;

    Ok(AdhocTrip {
        local_id: row.get(0)?,
        core: crate::model::TripCore {
            trip_type,
            transaction_date: date_col(row, 2)?,
            opening_km: row.get(3)?,
            closing_km: row.get(4)?,
            status,
            trip_close: row.get(6)?,
            fixed_freight: decimal_col(row, 7)?,
            per_km_rate: decimal_col(row, 8)?,
            toll_expenses: decimal_col(row, 9)?,
            parking_charges: decimal_col(row, 10)?,
            loading_charges: decimal_col(row, 11)?,
            unloading_charges: decimal_col(row, 12)?,
            other_charges: decimal_col(row, 13)?,
            revenue_override: opt_decimal_col(row, 14)?,
            receipt_file_ids: json_col(row, 15)?,
            created_at: row.get(33)?,
            updated_at: row.get(34)?,
        },
        trip_no: row.get(16)?,
        vehicle_number: row.get(17)?,
        vendor_name: row.get(18)?,
        driver_name: row.get(19)?,
        driver_number: row.get(20)?,
        driver_aadhar_number: row.get(21)?,
        driver_licence_number: row.get(22)?,
        advance: payment_cols(row, 23)?,
        balance: payment_cols(row, 28)?,
    })
}

fn text_enum<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
    what: &str,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown {}: {}", what, raw).into(),
        )
    })
}

/// A payment sub-record spans five consecutive columns; a NULL amount means
/// no sub-record was captured.
fn payment_cols(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<PaymentDetail>> {
    let amount = opt_decimal_col(row, base)?;
    match amount {
        None => Ok(None),
        Some(amount) => Ok(Some(PaymentDetail {
            amount,
            mode: row.get(base + 1)?,
            date: opt_date_col(row, base + 2)?,
            approved_by: row.get(base + 3)?,
            paid_by: row.get(base + 4)?,
        })),
    }
}

fn push_payment(values: &mut Vec<Box<dyn rusqlite::ToSql>>, payment: &Option<PaymentDetail>) {
    match payment {
        Some(p) => {
            values.push(Box::new(p.amount.to_string()));
            values.push(Box::new(p.mode.clone()));
            values.push(Box::new(p.date.map(|d| d.to_string())));
            values.push(Box::new(p.approved_by.clone()));
            values.push(Box::new(p.paid_by.clone()));
        }
        None => {
            for _ in 0..5 {
                values.push(Box::new(None::<String>));
            }
        }
    }
}

/// Bind values in `INSERT_SQL`/`UPDATE_SQL` column order.
fn row_values(trip: &AdhocTrip) -> Result<Vec<Box<dyn rusqlite::ToSql>>> {
    let core = &trip.core;
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(core.trip_type.as_str()),
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
        Box::new(trip.trip_no.clone()),
        Box::new(trip.vehicle_number.clone()),
        Box::new(trip.vendor_name.clone()),
        Box::new(trip.driver_name.clone()),
        Box::new(trip.driver_number.clone()),
        Box::new(trip.driver_aadhar_number.clone()),
        Box::new(trip.driver_licence_number.clone()),
    ];
    push_payment(&mut values, &trip.advance);
    push_payment(&mut values, &trip.balance);
    values.push(Box::new(core.created_at));
    values.push(Box::new(core.updated_at));
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn draft() -> AdhocDraft {
        serde_json::from_value(serde_json::json!({
            "trip_type": "adhoc",
            "transaction_date": "2026-03-14",
            "trip_no": "TRP-88",
            "vehicle_number": "KA01AB1234",
            "vendor_name": "Sharma Logistics",
            "driver_name": "Ravi",
            "driver_number": "9876543210",
            "fixed_freight": "800.00",
            "advance": {
                "amount": "300.00",
                "mode": "upi",
                "date": "2026-03-13",
                "approved_by": "ops",
                "paid_by": "accounts"
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_insert_and_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut store = AdhocStore::open(temp.path()).unwrap();

        let inserted = store.insert(draft()).unwrap();
        assert_eq!(inserted.local_id, 1);

        let fetched = store.get_by_local_id(1).unwrap().unwrap();
        let TripRecord::AdhocOrReplacement(fetched) = fetched else {
            panic!("expected ad-hoc trip")
        };
        assert_eq!(fetched.trip_no, "TRP-88");
        assert_eq!(fetched.vendor_name, "Sharma Logistics");
        let advance = fetched.advance.unwrap();
        assert_eq!(advance.amount, dec!(300.00));
        assert_eq!(advance.mode.as_deref(), Some("upi"));
        assert!(fetched.balance.is_none());
    }

    #[test]
    fn test_replacement_type_persists() {
        let temp = TempDir::new().unwrap();
        let mut store = AdhocStore::open(temp.path()).unwrap();

        let mut d = draft();
        d.trip_type = TripType::Replacement;
        let inserted = store.insert(d).unwrap();
        let fetched = store.get_by_local_id(inserted.local_id).unwrap().unwrap();
        assert_eq!(fetched.core().trip_type, TripType::Replacement);
    }

    #[test]
    fn test_insert_rejects_bad_driver_number() {
        let temp = TempDir::new().unwrap();
        let mut store = AdhocStore::open(temp.path()).unwrap();

        let mut bad = draft();
        bad.driver_number = "98765".to_string();
        match store.insert(bad) {
            Err(LedgerError::Validation { fields }) => {
                assert_eq!(fields, vec!["driver_number"])
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_local_ids_independent_of_fixed_store() {
        // Both stores start numbering at 1; nothing in this adapter is
        // aware of the fixed store's keyspace.
        let temp = TempDir::new().unwrap();
        let mut store = AdhocStore::open(temp.path()).unwrap();
        let inserted = store.insert(draft()).unwrap();
        assert_eq!(inserted.local_id, 1);
    }

    #[test]
    fn test_update_sets_balance_payment() {
        let temp = TempDir::new().unwrap();
        let mut store = AdhocStore::open(temp.path()).unwrap();

        let inserted = store.insert(draft()).unwrap();
        let patch = AdhocPatch {
            balance: Some(PaymentDetail {
                amount: dec!(500.00),
                mode: Some("cash".to_string()),
                date: None,
                approved_by: None,
                paid_by: None,
            }),
            ..Default::default()
        };
        let updated = store
            .update_by_local_id(inserted.local_id, &patch)
            .unwrap()
            .unwrap();
        assert_eq!(updated.balance.as_ref().unwrap().amount, dec!(500.00));
        // advance untouched by the patch
        assert_eq!(updated.advance.as_ref().unwrap().amount, dec!(300.00));
    }

    #[test]
    fn test_delete_missing_is_false() {
        let temp = TempDir::new().unwrap();
        let mut store = AdhocStore::open(temp.path()).unwrap();
        assert!(!store.delete_by_local_id(99).unwrap());
    }
}
