use std::fmt::{self, Write};

use chrono::{DateTime, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};
use url::Url;

use crate::catalog::{CatalogError, CatalogResult, RepositoryStore};
use crate::config::schema::CommitMode;
use crate::data_types::{Field, FieldId, FieldType, RecordId};
use crate::loader::DataLoader;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingCell {
    pub record_id: RecordId,
    pub field_id: FieldId,
    pub draft: String,
    pub original: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EndEdit {
    Blur,
    Enter,
    Escape,
}

/// Text to parse and persist into a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommit {
    pub record_id: RecordId,
    pub field_id: FieldId,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellCommit {
    Persisted,
    /// The local copy changed but the write failed
    LocalOnly,
    /// The record isn't loaded, nothing changed
    UnknownRecord,
}

/// The single cell under edit, if any.
#[derive(Debug, Clone)]
pub struct GridSession {
    editing: Option<EditingCell>,
    mode: CommitMode,
}

impl GridSession {
    pub fn new(mode: CommitMode) -> Self {
        Self {
            editing: None,
            mode,
        }
    }

    pub fn mode(&self) -> CommitMode {
        self.mode
    }

    pub fn editing(&self) -> Option<&EditingCell> {
        self.editing.as_ref()
    }

    pub fn is_editing(&self, record_id: &str, field_id: &str) -> bool {
        self.editing
            .as_ref()
            .map(|c| c.record_id == record_id && c.field_id == field_id)
            .unwrap_or(false)
    }

    /// Start editing a cell. A previous edit is dropped without being committed.
    pub fn begin_edit(&mut self, record_id: &str, field_id: &str, current_text: String) {
        if let Some(previous) = self.editing.take() {
            if previous.draft != previous.original {
                debug!(
                    "Discarding draft of {}/{}",
                    previous.record_id, previous.field_id
                );
            }
        }

        self.editing = Some(EditingCell {
            record_id: record_id.to_string(),
            field_id: field_id.to_string(),
            draft: current_text.clone(),
            original: current_text,
        });
    }

    /// Replace the draft. In per-change mode every input is committed right away.
    pub fn input(&mut self, text: &str) -> Option<PendingCommit> {
        let cell = self.editing.as_mut()?;
        cell.draft = text.to_string();

        match self.mode {
            CommitMode::OnConfirm => None,
            CommitMode::PerChange => Some(PendingCommit {
                record_id: cell.record_id.clone(),
                field_id: cell.field_id.clone(),
                text: cell.draft.clone(),
            }),
        }
    }

    pub fn end_edit(&mut self, reason: EndEdit) -> Option<PendingCommit> {
        let cell = self.editing.take()?;

        match (self.mode, reason) {
            (CommitMode::OnConfirm, EndEdit::Blur | EndEdit::Enter)
                if cell.draft != cell.original =>
            {
                Some(PendingCommit {
                    record_id: cell.record_id,
                    field_id: cell.field_id,
                    text: cell.draft,
                })
            }
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.editing = None;
    }
}

/// Merge `value` into the loaded record and persist its full mapping. Write
/// failures are logged and leave the local change in place.
pub async fn update_cell_value(
    store: &RepositoryStore,
    loader: &mut DataLoader,
    owner_id: &str,
    record_id: &str,
    field_id: &str,
    value: Value,
) -> CellCommit {
    let Some(record) = loader.record_mut(record_id) else {
        warn!("Record {record_id} isn't loaded, dropping update of {field_id}");
        return CellCommit::UnknownRecord;
    };
    record.data.insert(field_id.to_string(), value);
    let data = record.data.clone();

    match store.update_record_data(record_id, owner_id, &data).await {
        Ok(saved) => {
            if let Some(record) = loader.record_mut(record_id) {
                record.updated_at = saved.updated_at;
            }
            CellCommit::Persisted
        }
        Err(e) => {
            warn!("Couldn't save record {record_id}: {e}");
            CellCommit::LocalOnly
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellDisplay {
    Checkbox(bool),
    Tag { label: String, color: Option<String> },
    Text(String),
    Empty,
}

impl fmt::Display for CellDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellDisplay::Checkbox(true) => write!(f, "[x]"),
            CellDisplay::Checkbox(false) => write!(f, "[ ]"),
            CellDisplay::Tag { label, .. } => write!(f, "{label}"),
            CellDisplay::Text(text) => write!(f, "{text}"),
            CellDisplay::Empty => Ok(()),
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, ISO_DATE)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|d| d.date_naive()))
}

fn format_date(date: NaiveDate, date_format: &str) -> Option<String> {
    // An invalid format string errors out here rather than panicking in to_string()
    let mut out = String::new();
    write!(out, "{}", date.format(date_format)).ok()?;
    Some(out)
}

fn option_labels(field: &Field, value: &Value) -> Vec<String> {
    let ids: Vec<&str> = match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::String(id) => vec![id.as_str()],
        _ => vec![],
    };

    ids.into_iter()
        .filter_map(|id| field.options.iter().find(|o| o.id == id))
        .map(|o| o.name.clone())
        .collect()
}

fn raw_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn render_cell(field: &Field, value: Option<&Value>, date_format: &str) -> CellDisplay {
    if field.field_type == FieldType::Checkbox {
        return CellDisplay::Checkbox(value.and_then(Value::as_bool).unwrap_or(false));
    }

    let Some(value) = value else {
        return CellDisplay::Empty;
    };

    match field.field_type {
        FieldType::Select => value
            .as_str()
            .and_then(|id| field.options.iter().find(|o| o.id == id))
            .map(|o| CellDisplay::Tag {
                label: o.name.clone(),
                color: o.color.clone(),
            })
            .unwrap_or(CellDisplay::Empty),
        FieldType::Multiselect => {
            let labels = option_labels(field, value);
            if labels.is_empty() {
                CellDisplay::Empty
            } else {
                CellDisplay::Text(labels.join(", "))
            }
        }
        FieldType::Date => value
            .as_str()
            .and_then(parse_date)
            .and_then(|d| format_date(d, date_format))
            .map(CellDisplay::Text)
            .unwrap_or(CellDisplay::Empty),
        _ => raw_text(value)
            .map(CellDisplay::Text)
            .unwrap_or(CellDisplay::Empty),
    }
}

/// The text a cell editor starts from
pub fn edit_text(field: &Field, value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    match field.field_type {
        FieldType::Select | FieldType::Multiselect => option_labels(field, value).join(", "),
        FieldType::Checkbox => value.as_bool().unwrap_or(false).to_string(),
        _ => raw_text(value).unwrap_or_default(),
    }
}

fn invalid(field: &Field, input: &str, reason: &str) -> CatalogError {
    CatalogError::InvalidValue {
        field_type: field.field_type.to_string(),
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Turn typed text into the value stored for `field`. Blank input clears the cell.
pub fn parse_input(field: &Field, text: &str) -> CatalogResult<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match field.field_type {
        FieldType::Number => trimmed
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid(field, text, "not a number")),
        FieldType::Checkbox => match trimmed.to_lowercase().as_str() {
            "true" | "yes" | "1" | "x" => Ok(Value::Bool(true)),
            "false" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid(field, text, "expected yes or no")),
        },
        FieldType::Date => {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, ISO_DATE) {
                Ok(Value::String(date.format(ISO_DATE).to_string()))
            } else if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
                Ok(Value::String(datetime.to_rfc3339()))
            } else {
                Err(invalid(field, text, "expected YYYY-MM-DD or an RFC 3339 timestamp"))
            }
        }
        FieldType::Url => Url::parse(trimmed)
            .map(|_| Value::String(trimmed.to_string()))
            .map_err(|e| invalid(field, text, &e.to_string())),
        FieldType::Email => {
            if EMAIL_RE.is_match(trimmed) {
                Ok(Value::String(trimmed.to_string()))
            } else {
                Err(invalid(field, text, "not an email address"))
            }
        }
        FieldType::Select => field
            .find_option(trimmed)
            .map(|o| Value::String(o.id.clone()))
            .ok_or_else(|| invalid(field, text, "no such option")),
        FieldType::Multiselect => trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|needle| {
                field
                    .find_option(needle)
                    .map(|o| Value::String(o.id.clone()))
                    .ok_or_else(|| invalid(field, needle, "no such option"))
            })
            .collect::<CatalogResult<Vec<_>>>()
            .map(Value::Array),
        FieldType::Text | FieldType::Phone | FieldType::Attachment => {
            Ok(Value::String(text.to_string()))
        }
    }
}
