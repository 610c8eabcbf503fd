use std::fmt::Debug;

use async_trait::async_trait;
use strum_macros::Display;

use crate::data_types::{
    BaseId, FieldId, RecordId, TableId, Timestamp, UserId, ViewId,
};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct BaseRow {
    pub id: BaseId,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub id: TableId,
    pub base_id: BaseId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub id: FieldId,
    pub table_id: TableId,
    pub name: String,
    pub field_type: String,
    pub options: Option<String>,
    pub required: bool,
    pub position: i32,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub id: RecordId,
    pub table_id: TableId,
    pub data: String,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct ViewRow {
    pub id: ViewId,
    pub table_id: TableId,
    pub name: String,
    pub view_type: String,
    pub config: Option<String>,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Partial field update; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdate {
    pub name: Option<String>,
    pub field_type: Option<String>,
    pub options: Option<String>,
    pub required: Option<bool>,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OrderColumn {
    #[strum(serialize = "created_at")]
    CreatedAt,
    #[strum(serialize = "position")]
    Position,
    #[strum(serialize = "name")]
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SortDirection {
    #[strum(serialize = "ASC")]
    Asc,
    #[strum(serialize = "DESC")]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: OrderColumn,
    pub direction: SortDirection,
}

impl OrderBy {
    pub const fn asc(column: OrderColumn) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    pub const fn desc(column: OrderColumn) -> Self {
        Self {
            column,
            direction: SortDirection::Desc,
        }
    }

    /// ORDER BY clause; `seq` breaks ties between rows created in the same millisecond
    pub fn to_sql(&self) -> String {
        format!(
            "ORDER BY {} {}, seq {}",
            self.column, self.direction, self.direction
        )
    }
}

/// Wrapper for conversion of database-specific error codes into actual errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unique constraint violated: {0}")]
    UniqueConstraintViolation(sqlx::Error),
    #[error("Foreign key constraint violated: {0}")]
    FKConstraintViolation(sqlx::Error),

    // All other errors
    #[error(transparent)]
    SqlxError(sqlx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The remote data service. Every list/get/update/delete is scoped to an owner;
/// rows belonging to other owners are invisible.
#[async_trait]
pub trait Repository: Send + Sync + Debug {
    async fn setup(&self);

    async fn create_base(&self, base: &BaseRow) -> Result<BaseRow, Error>;

    async fn get_base(&self, id: &str, owner_id: &str) -> Result<BaseRow, Error>;

    async fn list_bases(&self, owner_id: &str, order: OrderBy) -> Result<Vec<BaseRow>, Error>;

    async fn create_table(&self, table: &TableRow) -> Result<TableRow, Error>;

    async fn get_table(&self, id: &str, owner_id: &str) -> Result<TableRow, Error>;

    async fn list_tables(
        &self,
        base_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<TableRow>, Error>;

    async fn create_field(&self, field: &FieldRow) -> Result<FieldRow, Error>;

    async fn list_fields(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<FieldRow>, Error>;

    async fn update_field(
        &self,
        id: &str,
        owner_id: &str,
        update: &FieldUpdate,
    ) -> Result<FieldRow, Error>;

    async fn create_record(&self, record: &RecordRow) -> Result<RecordRow, Error>;

    async fn list_records(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<RecordRow>, Error>;

    async fn update_record(
        &self,
        id: &str,
        owner_id: &str,
        data: &str,
        updated_at: Timestamp,
    ) -> Result<RecordRow, Error>;

    async fn create_view(&self, view: &ViewRow) -> Result<ViewRow, Error>;

    async fn list_views(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<ViewRow>, Error>;

    // Deletions only exist to compensate a failed cascade. They return an error
    // (RowNotFound) if nothing was deleted.
    async fn delete_base(&self, id: &str, owner_id: &str) -> Result<(), Error>;

    async fn delete_table(&self, id: &str, owner_id: &str) -> Result<(), Error>;

    async fn delete_field(&self, id: &str, owner_id: &str) -> Result<(), Error>;

    async fn delete_view(&self, id: &str, owner_id: &str) -> Result<(), Error>;
}
