use tracing::warn;

use crate::data_types::{RecordData, SelectOption};

mod repository;

pub use repository::{FieldChanges, NewField, RepositoryStore};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("{reason}")]
    Validation { reason: String },

    #[error("Base {id:?} doesn't exist")]
    BaseDoesNotExist { id: String },

    #[error("Table {id:?} doesn't exist")]
    TableDoesNotExist { id: String },

    #[error("Field {id:?} doesn't exist")]
    FieldDoesNotExist { id: String },

    #[error("Record {id:?} doesn't exist")]
    RecordDoesNotExist { id: String },

    #[error("View {id:?} doesn't exist")]
    ViewDoesNotExist { id: String },

    #[error("Position {position} is already taken in table {table_id:?}")]
    FieldPositionTaken { table_id: String, position: i32 },

    #[error("{entity} {id:?} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("No table selected")]
    NoTableSelected,

    #[error("No base selected")]
    NoBaseSelected,

    #[error("Invalid {field_type} value {input:?}: {reason}")]
    InvalidValue {
        field_type: String,
        input: String,
        reason: String,
    },

    #[error("Internal SQL error: {0}")]
    SqlxError(sqlx::Error),

    #[error("Failed serializing JSON: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

// Serialized payloads are schemaless at the storage layer: anything that doesn't
// parse is treated as empty rather than failing the whole listing.

pub(crate) fn decode_options(raw: Option<&str>, field_id: &str) -> Vec<SelectOption> {
    match raw {
        None => vec![],
        Some(s) if s.trim().is_empty() => vec![],
        Some(s) => serde_json::from_str(s).unwrap_or_else(|e| {
            warn!("Malformed option list on field {field_id}, ignoring: {e}");
            vec![]
        }),
    }
}

pub(crate) fn decode_record_data(raw: &str, record_id: &str) -> RecordData {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Malformed data on record {record_id}, ignoring: {e}");
        RecordData::new()
    })
}

pub(crate) fn decode_view_config(
    raw: Option<&str>,
    view_id: &str,
) -> Option<serde_json::Value> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Malformed config on view {view_id}, ignoring: {e}");
            None
        }
    }
}
