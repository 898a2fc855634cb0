// Data model for the federated trip ledger
//
// Two record variants share one base: fixed-contract trips reference master
// data by id, ad-hoc/replacement trips carry denormalized free text because
// their vehicle/vendor/driver are deliberately not in master data.

use crate::calc::FinancialInputs;
use crate::error::{LedgerError, Result};
use crate::id::StoreTag;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Business trip category. `Adhoc` and `Replacement` both live in the
/// ad-hoc store; `Fixed` lives in the fixed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    Fixed,
    Adhoc,
    Replacement,
}

impl TripType {
    pub fn as_str(self) -> &'static str {
        match self {
            TripType::Fixed => "fixed",
            TripType::Adhoc => "adhoc",
            TripType::Replacement => "replacement",
        }
    }

    pub fn parse(s: &str) -> Option<TripType> {
        match s {
            "fixed" => Some(TripType::Fixed),
            "adhoc" => Some(TripType::Adhoc),
            "replacement" => Some(TripType::Replacement),
            _ => None,
        }
    }

    /// Which physical store records of this type belong to.
    pub fn store_tag(self) -> StoreTag {
        match self {
            TripType::Fixed => StoreTag::Fixed,
            TripType::Adhoc | TripType::Replacement => StoreTag::Adhoc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<TripStatus> {
        match s {
            "pending" => Some(TripStatus::Pending),
            "completed" => Some(TripStatus::Completed),
            "cancelled" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }
}

/// Fields common to both record variants, including every input the
/// derived-field calculator reads. Timestamps are epoch milliseconds and
/// always server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripCore {
    pub trip_type: TripType,
    pub transaction_date: NaiveDate,
    pub opening_km: Option<u32>,
    pub closing_km: Option<u32>,
    pub status: TripStatus,
    pub trip_close: bool,
    pub fixed_freight: Decimal,
    pub per_km_rate: Decimal,
    pub toll_expenses: Decimal,
    pub parking_charges: Decimal,
    pub loading_charges: Decimal,
    pub unloading_charges: Decimal,
    pub other_charges: Decimal,
    pub revenue_override: Option<Decimal>,
    /// Opaque document references resolved by the upload collaborator.
    pub receipt_file_ids: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TripCore {
    /// Kilometers travelled, clamped to zero when readings are missing or
    /// inverted.
    pub fn km_travelled(&self) -> u32 {
        match (self.opening_km, self.closing_km) {
            (Some(open), Some(close)) => close.saturating_sub(open),
            _ => 0,
        }
    }

    fn collect_errors(&self, fields: &mut Vec<String>) {
        if let (Some(open), Some(close)) = (self.opening_km, self.closing_km)
            && close < open
        {
            fields.push("closing_km".to_string());
        }
        for (name, value) in [
            ("fixed_freight", self.fixed_freight),
            ("per_km_rate", self.per_km_rate),
            ("toll_expenses", self.toll_expenses),
            ("parking_charges", self.parking_charges),
            ("loading_charges", self.loading_charges),
            ("unloading_charges", self.unloading_charges),
            ("other_charges", self.other_charges),
        ] {
            if value < Decimal::ZERO {
                fields.push(name.to_string());
            }
        }
        if let Some(revenue) = self.revenue_override
            && revenue < Decimal::ZERO
        {
            fields.push("revenue_override".to_string());
        }
    }
}

/// Stand-in driver on a fixed trip when the rostered driver is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementDriver {
    pub name: String,
    pub phone: String,
}

/// Advance/balance payment detail on ad-hoc trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetail {
    pub amount: Decimal,
    pub mode: Option<String>,
    pub date: Option<NaiveDate>,
    pub approved_by: Option<String>,
    pub paid_by: Option<String>,
}

/// Fixed-contract trip: everything references master data by id. The
/// vehicle/driver id lists are ordered; the first vehicle is primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedTrip {
    pub local_id: i64,
    #[serde(flatten)]
    pub core: TripCore,
    pub vehicle_ids: Vec<i64>,
    pub driver_ids: Vec<i64>,
    pub vendor_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub project_id: Option<i64>,
    pub replacement_driver: Option<ReplacementDriver>,
    pub advance_paid: Decimal,
    pub balance_paid: Decimal,
}

impl FixedTrip {
    pub fn validation_errors(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.core.trip_type != TripType::Fixed {
            fields.push("trip_type".to_string());
        }
        self.core.collect_errors(&mut fields);
        if self.vehicle_ids.is_empty() {
            fields.push("vehicle_ids".to_string());
        }
        if self.driver_ids.is_empty() {
            fields.push("driver_ids".to_string());
        }
        if self.advance_paid < Decimal::ZERO {
            fields.push("advance_paid".to_string());
        }
        if self.balance_paid < Decimal::ZERO {
            fields.push("balance_paid".to_string());
        }
        fields
    }
}

/// Ad-hoc or replacement trip: free-text vehicle/vendor/driver with no
/// referential integrity, plus a required business trip number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdhocTrip {
    pub local_id: i64,
    #[serde(flatten)]
    pub core: TripCore,
    pub trip_no: String,
    pub vehicle_number: String,
    pub vendor_name: String,
    pub driver_name: String,
    pub driver_number: String,
    pub driver_aadhar_number: Option<String>,
    pub driver_licence_number: Option<String>,
    pub advance: Option<PaymentDetail>,
    pub balance: Option<PaymentDetail>,
}

impl AdhocTrip {
    pub fn validation_errors(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.core.trip_type == TripType::Fixed {
            fields.push("trip_type".to_string());
        }
        self.core.collect_errors(&mut fields);
        for (name, value) in [
            ("trip_no", &self.trip_no),
            ("vehicle_number", &self.vehicle_number),
            ("vendor_name", &self.vendor_name),
            ("driver_name", &self.driver_name),
        ] {
            if value.trim().is_empty() {
                fields.push(name.to_string());
            }
        }
        if self.driver_number.len() != 10 || !self.driver_number.chars().all(|c| c.is_ascii_digit())
        {
            fields.push("driver_number".to_string());
        }
        if let Some(advance) = &self.advance
            && advance.amount < Decimal::ZERO
        {
            fields.push("advance.amount".to_string());
        }
        if let Some(balance) = &self.balance
            && balance.amount < Decimal::ZERO
        {
            fields.push("balance.amount".to_string());
        }
        fields
    }
}

/// A trip from either store. Serialized without an outer tag: `trip_type`
/// inside the core already distinguishes the variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TripRecord {
    Fixed(FixedTrip),
    AdhocOrReplacement(AdhocTrip),
}

impl TripRecord {
    pub fn core(&self) -> &TripCore {
        match self {
            TripRecord::Fixed(t) => &t.core,
            TripRecord::AdhocOrReplacement(t) => &t.core,
        }
    }

    pub fn local_id(&self) -> i64 {
        match self {
            TripRecord::Fixed(t) => t.local_id,
            TripRecord::AdhocOrReplacement(t) => t.local_id,
        }
    }

    pub fn store_tag(&self) -> StoreTag {
        match self {
            TripRecord::Fixed(_) => StoreTag::Fixed,
            TripRecord::AdhocOrReplacement(_) => StoreTag::Adhoc,
        }
    }

    /// Inputs for the derived-field calculator. Fixed trips carry plain
    /// advance/balance amounts; ad-hoc trips take them from their payment
    /// sub-records.
    pub fn financial_inputs(&self) -> FinancialInputs {
        let core = self.core();
        let (advance_paid, balance_paid) = match self {
            TripRecord::Fixed(t) => (t.advance_paid, t.balance_paid),
            TripRecord::AdhocOrReplacement(t) => (
                t.advance.as_ref().map(|p| p.amount).unwrap_or(Decimal::ZERO),
                t.balance.as_ref().map(|p| p.amount).unwrap_or(Decimal::ZERO),
            ),
        };
        FinancialInputs {
            fixed_freight: core.fixed_freight,
            per_km_rate: core.per_km_rate,
            toll_expenses: core.toll_expenses,
            parking_charges: core.parking_charges,
            loading_charges: core.loading_charges,
            unloading_charges: core.unloading_charges,
            other_charges: core.other_charges,
            km_travelled: core.km_travelled(),
            advance_paid,
            balance_paid,
            revenue_override: core.revenue_override,
        }
    }
}

// ============================================================================
// Drafts (create) and patches (update)
// ============================================================================

/// New fixed-contract trip. Derived fields are not part of the draft;
/// `deny_unknown_fields` rejects any attempt to supply them.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedDraft {
    pub trip_type: TripType,
    pub transaction_date: NaiveDate,
    #[serde(default)]
    pub opening_km: Option<u32>,
    #[serde(default)]
    pub closing_km: Option<u32>,
    #[serde(default)]
    pub status: Option<TripStatus>,
    #[serde(default)]
    pub trip_close: bool,
    pub vehicle_ids: Vec<i64>,
    pub driver_ids: Vec<i64>,
    #[serde(default)]
    pub vendor_id: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub replacement_driver: Option<ReplacementDriver>,
    #[serde(default)]
    pub fixed_freight: Decimal,
    #[serde(default)]
    pub per_km_rate: Decimal,
    #[serde(default)]
    pub toll_expenses: Decimal,
    #[serde(default)]
    pub parking_charges: Decimal,
    #[serde(default)]
    pub loading_charges: Decimal,
    #[serde(default)]
    pub unloading_charges: Decimal,
    #[serde(default)]
    pub other_charges: Decimal,
    #[serde(default)]
    pub revenue_override: Option<Decimal>,
    #[serde(default)]
    pub receipt_file_ids: Vec<String>,
    #[serde(default)]
    pub advance_paid: Decimal,
    #[serde(default)]
    pub balance_paid: Decimal,
}

impl FixedDraft {
    /// Materialize the draft as a record. `local_id` is assigned by the
    /// store afterwards; validation runs on the result.
    pub(crate) fn into_trip(self, now: i64) -> FixedTrip {
        FixedTrip {
            local_id: 0,
            core: TripCore {
                trip_type: self.trip_type,
                transaction_date: self.transaction_date,
                opening_km: self.opening_km,
                closing_km: self.closing_km,
                status: self.status.unwrap_or(TripStatus::Pending),
                trip_close: self.trip_close,
                fixed_freight: self.fixed_freight,
                per_km_rate: self.per_km_rate,
                toll_expenses: self.toll_expenses,
                parking_charges: self.parking_charges,
                loading_charges: self.loading_charges,
                unloading_charges: self.unloading_charges,
                other_charges: self.other_charges,
                revenue_override: self.revenue_override,
                receipt_file_ids: self.receipt_file_ids,
                created_at: now,
                updated_at: now,
            },
            vehicle_ids: self.vehicle_ids,
            driver_ids: self.driver_ids,
            vendor_id: self.vendor_id,
            customer_id: self.customer_id,
            project_id: self.project_id,
            replacement_driver: self.replacement_driver,
            advance_paid: self.advance_paid,
            balance_paid: self.balance_paid,
        }
    }
}

/// New ad-hoc or replacement trip.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdhocDraft {
    pub trip_type: TripType,
    pub transaction_date: NaiveDate,
    #[serde(default)]
    pub opening_km: Option<u32>,
    #[serde(default)]
    pub closing_km: Option<u32>,
    #[serde(default)]
    pub status: Option<TripStatus>,
    #[serde(default)]
    pub trip_close: bool,
    pub trip_no: String,
    pub vehicle_number: String,
    pub vendor_name: String,
    pub driver_name: String,
    pub driver_number: String,
    #[serde(default)]
    pub driver_aadhar_number: Option<String>,
    #[serde(default)]
    pub driver_licence_number: Option<String>,
    #[serde(default)]
    pub advance: Option<PaymentDetail>,
    #[serde(default)]
    pub balance: Option<PaymentDetail>,
    #[serde(default)]
    pub fixed_freight: Decimal,
    #[serde(default)]
    pub per_km_rate: Decimal,
    #[serde(default)]
    pub toll_expenses: Decimal,
    #[serde(default)]
    pub parking_charges: Decimal,
    #[serde(default)]
    pub loading_charges: Decimal,
    #[serde(default)]
    pub unloading_charges: Decimal,
    #[serde(default)]
    pub other_charges: Decimal,
    #[serde(default)]
    pub revenue_override: Option<Decimal>,
    #[serde(default)]
    pub receipt_file_ids: Vec<String>,
}

impl AdhocDraft {
    pub(crate) fn into_trip(self, now: i64) -> AdhocTrip {
        AdhocTrip {
            local_id: 0,
            core: TripCore {
                trip_type: self.trip_type,
                transaction_date: self.transaction_date,
                opening_km: self.opening_km,
                closing_km: self.closing_km,
                status: self.status.unwrap_or(TripStatus::Pending),
                trip_close: self.trip_close,
                fixed_freight: self.fixed_freight,
                per_km_rate: self.per_km_rate,
                toll_expenses: self.toll_expenses,
                parking_charges: self.parking_charges,
                loading_charges: self.loading_charges,
                unloading_charges: self.unloading_charges,
                other_charges: self.other_charges,
                revenue_override: self.revenue_override,
                receipt_file_ids: self.receipt_file_ids,
                created_at: now,
                updated_at: now,
            },
            trip_no: self.trip_no,
            vehicle_number: self.vehicle_number,
            vendor_name: self.vendor_name,
            driver_name: self.driver_name,
            driver_number: self.driver_number,
            driver_aadhar_number: self.driver_aadhar_number,
            driver_licence_number: self.driver_licence_number,
            advance: self.advance,
            balance: self.balance,
        }
    }
}

/// A create request, already routed to its owning store by `trip_type`.
#[derive(Debug, Clone)]
pub enum TripDraft {
    Fixed(FixedDraft),
    AdhocOrReplacement(AdhocDraft),
}

impl TripDraft {
    /// Parse an API-shaped draft body, routing on the declared `trip_type`.
    pub fn from_json(value: serde_json::Value) -> Result<TripDraft> {
        let trip_type = value
            .get("trip_type")
            .and_then(|v| v.as_str())
            .and_then(TripType::parse)
            .ok_or_else(|| LedgerError::validation(vec!["trip_type".to_string()]))?;

        match trip_type {
            TripType::Fixed => serde_json::from_value(value)
                .map(TripDraft::Fixed)
                .map_err(|e| LedgerError::validation(vec![offending_field(&e)])),
            TripType::Adhoc | TripType::Replacement => serde_json::from_value(value)
                .map(TripDraft::AdhocOrReplacement)
                .map_err(|e| LedgerError::validation(vec![offending_field(&e)])),
        }
    }
}

/// Partial update for a fixed trip. Absent fields are left unchanged.
/// `trip_type`, timestamps and derived fields are structurally absent and
/// rejected as unknown fields when supplied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FixedPatch {
    pub transaction_date: Option<NaiveDate>,
    pub opening_km: Option<u32>,
    pub closing_km: Option<u32>,
    pub status: Option<TripStatus>,
    pub trip_close: Option<bool>,
    pub vehicle_ids: Option<Vec<i64>>,
    pub driver_ids: Option<Vec<i64>>,
    pub vendor_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub project_id: Option<i64>,
    pub replacement_driver: Option<ReplacementDriver>,
    pub fixed_freight: Option<Decimal>,
    pub per_km_rate: Option<Decimal>,
    pub toll_expenses: Option<Decimal>,
    pub parking_charges: Option<Decimal>,
    pub loading_charges: Option<Decimal>,
    pub unloading_charges: Option<Decimal>,
    pub other_charges: Option<Decimal>,
    pub revenue_override: Option<Decimal>,
    pub receipt_file_ids: Option<Vec<String>>,
    pub advance_paid: Option<Decimal>,
    pub balance_paid: Option<Decimal>,
}

impl FixedPatch {
    pub(crate) fn apply(&self, trip: &mut FixedTrip) {
        let core = &mut trip.core;
        apply_core_patch(
            core,
            &self.transaction_date,
            &self.opening_km,
            &self.closing_km,
            &self.status,
            &self.trip_close,
            &self.fixed_freight,
            &self.per_km_rate,
            &self.toll_expenses,
            &self.parking_charges,
            &self.loading_charges,
            &self.unloading_charges,
            &self.other_charges,
            &self.revenue_override,
            &self.receipt_file_ids,
        );
        if let Some(v) = &self.vehicle_ids {
            trip.vehicle_ids = v.clone();
        }
        if let Some(v) = &self.driver_ids {
            trip.driver_ids = v.clone();
        }
        if let Some(v) = self.vendor_id {
            trip.vendor_id = Some(v);
        }
        if let Some(v) = self.customer_id {
            trip.customer_id = Some(v);
        }
        if let Some(v) = self.project_id {
            trip.project_id = Some(v);
        }
        if let Some(v) = &self.replacement_driver {
            trip.replacement_driver = Some(v.clone());
        }
        if let Some(v) = self.advance_paid {
            trip.advance_paid = v;
        }
        if let Some(v) = self.balance_paid {
            trip.balance_paid = v;
        }
    }
}

/// Partial update for an ad-hoc/replacement trip.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AdhocPatch {
    pub transaction_date: Option<NaiveDate>,
    pub opening_km: Option<u32>,
    pub closing_km: Option<u32>,
    pub status: Option<TripStatus>,
    pub trip_close: Option<bool>,
    pub trip_no: Option<String>,
    pub vehicle_number: Option<String>,
    pub vendor_name: Option<String>,
    pub driver_name: Option<String>,
    pub driver_number: Option<String>,
    pub driver_aadhar_number: Option<String>,
    pub driver_licence_number: Option<String>,
    pub advance: Option<PaymentDetail>,
    pub balance: Option<PaymentDetail>,
    pub fixed_freight: Option<Decimal>,
    pub per_km_rate: Option<Decimal>,
    pub toll_expenses: Option<Decimal>,
    pub parking_charges: Option<Decimal>,
    pub loading_charges: Option<Decimal>,
    pub unloading_charges: Option<Decimal>,
    pub other_charges: Option<Decimal>,
    pub revenue_override: Option<Decimal>,
    pub receipt_file_ids: Option<Vec<String>>,
}

impl AdhocPatch {
    pub(crate) fn apply(&self, trip: &mut AdhocTrip) {
        let core = &mut trip.core;
        apply_core_patch(
            core,
            &self.transaction_date,
            &self.opening_km,
            &self.closing_km,
            &self.status,
            &self.trip_close,
            &self.fixed_freight,
            &self.per_km_rate,
            &self.toll_expenses,
            &self.parking_charges,
            &self.loading_charges,
            &self.unloading_charges,
            &self.other_charges,
            &self.revenue_override,
            &self.receipt_file_ids,
        );
        if let Some(v) = &self.trip_no {
            trip.trip_no = v.clone();
        }
        if let Some(v) = &self.vehicle_number {
            trip.vehicle_number = v.clone();
        }
        if let Some(v) = &self.vendor_name {
            trip.vendor_name = v.clone();
        }
        if let Some(v) = &self.driver_name {
            trip.driver_name = v.clone();
        }
        if let Some(v) = &self.driver_number {
            trip.driver_number = v.clone();
        }
        if let Some(v) = &self.driver_aadhar_number {
            trip.driver_aadhar_number = Some(v.clone());
        }
        if let Some(v) = &self.driver_licence_number {
            trip.driver_licence_number = Some(v.clone());
        }
        if let Some(v) = &self.advance {
            trip.advance = Some(v.clone());
        }
        if let Some(v) = &self.balance {
            trip.balance = Some(v.clone());
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_core_patch(
    core: &mut TripCore,
    transaction_date: &Option<NaiveDate>,
    opening_km: &Option<u32>,
    closing_km: &Option<u32>,
    status: &Option<TripStatus>,
    trip_close: &Option<bool>,
    fixed_freight: &Option<Decimal>,
    per_km_rate: &Option<Decimal>,
    toll_expenses: &Option<Decimal>,
    parking_charges: &Option<Decimal>,
    loading_charges: &Option<Decimal>,
    unloading_charges: &Option<Decimal>,
    other_charges: &Option<Decimal>,
    revenue_override: &Option<Decimal>,
    receipt_file_ids: &Option<Vec<String>>,
) {
    if let Some(v) = transaction_date {
        core.transaction_date = *v;
    }
    if let Some(v) = opening_km {
        core.opening_km = Some(*v);
    }
    if let Some(v) = closing_km {
        core.closing_km = Some(*v);
    }
    if let Some(v) = status {
        core.status = *v;
    }
    if let Some(v) = trip_close {
        core.trip_close = *v;
    }
    if let Some(v) = fixed_freight {
        core.fixed_freight = *v;
    }
    if let Some(v) = per_km_rate {
        core.per_km_rate = *v;
    }
    if let Some(v) = toll_expenses {
        core.toll_expenses = *v;
    }
    if let Some(v) = parking_charges {
        core.parking_charges = *v;
    }
    if let Some(v) = loading_charges {
        core.loading_charges = *v;
    }
    if let Some(v) = unloading_charges {
        core.unloading_charges = *v;
    }
    if let Some(v) = other_charges {
        core.other_charges = *v;
    }
    if let Some(v) = revenue_override {
        core.revenue_override = Some(*v);
    }
    if let Some(v) = receipt_file_ids {
        core.receipt_file_ids = v.clone();
    }
}

/// A partial update, already routed to its owning store.
#[derive(Debug, Clone)]
pub enum TripPatch {
    Fixed(FixedPatch),
    AdhocOrReplacement(AdhocPatch),
}

impl TripPatch {
    /// Parse an API-shaped patch body for the store the decoded id names.
    /// The store is never inferred from the body, so a patch cannot move a
    /// record between stores.
    pub fn from_json(tag: StoreTag, value: serde_json::Value) -> Result<TripPatch> {
        match tag {
            StoreTag::Fixed => serde_json::from_value(value)
                .map(TripPatch::Fixed)
                .map_err(|e| LedgerError::validation(vec![offending_field(&e)])),
            StoreTag::Adhoc => serde_json::from_value(value)
                .map(TripPatch::AdhocOrReplacement)
                .map_err(|e| LedgerError::validation(vec![offending_field(&e)])),
        }
    }

    pub fn store_tag(&self) -> StoreTag {
        match self {
            TripPatch::Fixed(_) => StoreTag::Fixed,
            TripPatch::AdhocOrReplacement(_) => StoreTag::Adhoc,
        }
    }
}

/// Reduce a serde error on a draft/patch body to the field name it
/// complains about (serde quotes it in backticks), so `Validation` carries
/// clean field names from every producer. Location suffixes are stripped
/// when no field is named.
fn offending_field(err: &serde_json::Error) -> String {
    let msg = err.to_string();
    if let Some(start) = msg.find('`')
        && let Some(len) = msg[start + 1..].find('`')
    {
        return msg[start + 1..start + 1 + len].to_string();
    }
    match msg.find(" at line ") {
        Some(pos) => msg[..pos].to_string(),
        None => msg,
    }
}

/// Current timestamp in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time before Unix epoch")
        .as_millis() as i64
}
