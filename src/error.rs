// Error taxonomy for the federated ledger

use crate::id::StoreTag;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Failures surfaced by the ledger and its store adapters.
///
/// "Not found" is intentionally absent: a syntactically valid id that no
/// longer resolves is reported as `Ok(None)` (or `Ok(false)` for delete) so
/// callers can treat it as gone rather than as a fault.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    /// Required or malformed fields for the declared trip type.
    #[error("validation failed: {}", fields.join(", "))]
    Validation { fields: Vec<String> },

    /// The supplied unified transaction id could not be parsed.
    #[error("malformed unified transaction id: {0:?}")]
    MalformedId(String),

    /// The unified transaction id names a store that does not exist.
    #[error("unknown store tag: {0:?}")]
    UnknownStore(String),

    /// The underlying store call failed (connection, constraint, codec).
    #[error("{tag} store i/o failure")]
    AdapterIo {
        tag: StoreTag,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The ledger data directory could not be opened or created.
    #[error("failed to open ledger at {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LedgerError {
    pub(crate) fn validation(fields: Vec<String>) -> Self {
        LedgerError::Validation { fields }
    }
}

impl StoreTag {
    /// Wrap a store-level failure with the tag of the store it came from.
    pub(crate) fn io<E>(self, source: E) -> LedgerError
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        LedgerError::AdapterIo {
            tag: self,
            source: source.into(),
        }
    }
}
