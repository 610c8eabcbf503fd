use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub type BaseId = String;
pub type TableId = String;
pub type FieldId = String;
pub type RecordId = String;
pub type ViewId = String;
pub type UserId = String;
pub type OptionId = String;
/// Unix milliseconds
pub type Timestamp = i64;

/// Field id -> value. Values are only meaningful next to the table's fields.
pub type RecordData = BTreeMap<FieldId, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base {
    pub id: BaseId,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub id: TableId,
    pub base_id: BaseId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Select,
    Multiselect,
    Checkbox,
    Url,
    Email,
    Phone,
    Attachment,
}

impl FieldType {
    /// Inputs that persist on toggle/selection rather than on confirm
    pub fn commits_immediately(&self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::Select)
    }

    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Multiselect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: OptionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl SelectOption {
    pub fn new(id: &str, name: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: Some(color.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub id: FieldId,
    pub table_id: TableId,
    pub name: String,
    pub field_type: FieldType,
    pub options: Vec<SelectOption>,
    pub required: bool,
    pub position: i32,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Field {
    /// Match an option by id first, then by (case-insensitive) label
    pub fn find_option(&self, needle: &str) -> Option<&SelectOption> {
        self.options
            .iter()
            .find(|o| o.id == needle)
            .or_else(|| {
                self.options
                    .iter()
                    .find(|o| o.name.eq_ignore_ascii_case(needle))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub table_id: TableId,
    pub data: RecordData,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Record {
    pub fn value(&self, field_id: &str) -> Option<&serde_json::Value> {
        self.data.get(field_id)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    Grid,
    Form,
    Calendar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub id: ViewId,
    pub table_id: TableId,
    pub name: String,
    pub view_type: ViewType,
    pub config: Option<serde_json::Value>,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
