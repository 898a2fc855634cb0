// TripLedger - federated trip ledger over two independently-keyed stores
//
// Fixed-contract trips and ad-hoc/replacement trips live in physically
// separate stores, each with its own auto-incrementing key starting at 1.
// The ledger presents them as one sorted, paginated collection and routes
// point reads, updates and deletes through a store-tagged unified id. A
// bare integer is never treated as identity, and no operation ever infers
// identity from row position.
//
// Consistency boundary: a federated page is built from two independent
// queries with no shared transaction. A record inserted or deleted in
// either store while a list call is in flight may shift a page boundary or
// leave a page one item short or long; `total_approx` is advisory. Each
// individual mutation is atomic within its own store. This is an accepted
// boundary condition of the two-store layout, not a bug to paper over.
//
// All financial fields (total freight, balance, variance, revenue, margin)
// are derived by one pure calculator on every read and never persisted.

pub mod adapter;
pub mod adhoc;
pub mod calc;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod id;
pub mod model;

// Re-export main types for convenience
pub use adapter::{DateFilter, TripStore};
pub use adhoc::AdhocStore;
pub use calc::{DerivedFields, FinancialInputs, compute_financials};
pub use config::LedgerConfig;
pub use engine::{FederatedPage, Ledger, MAX_PAGE_LIMIT, PageItem, TripView};
pub use error::{LedgerError, Result};
pub use fixed::FixedStore;
pub use id::{StoreTag, UnifiedId};
pub use model::{
    AdhocDraft, AdhocPatch, AdhocTrip, FixedDraft, FixedPatch, FixedTrip, PaymentDetail,
    ReplacementDriver, TripCore, TripDraft, TripPatch, TripRecord, TripStatus, TripType, now_ms,
};
