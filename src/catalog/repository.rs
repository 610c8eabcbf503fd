use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

use crate::catalog::{
    decode_options, decode_record_data, decode_view_config, CatalogError, CatalogResult,
};
use crate::data_types::{
    Base, Field, FieldType, Record, RecordData, SelectOption, Table, View, ViewType,
};
use crate::repository::interface::{
    BaseRow, Error as RepositoryError, FieldRow, FieldUpdate, OrderBy, OrderColumn,
    RecordRow, Repository, TableRow, ViewRow,
};
use crate::utils::{generate_id, now_millis};

const BASES_ORDER: OrderBy = OrderBy::asc(OrderColumn::CreatedAt);
const TABLES_ORDER: OrderBy = OrderBy::asc(OrderColumn::CreatedAt);
const FIELDS_ORDER: OrderBy = OrderBy::asc(OrderColumn::Position);
const RECORDS_ORDER: OrderBy = OrderBy::desc(OrderColumn::CreatedAt);
const VIEWS_ORDER: OrderBy = OrderBy::asc(OrderColumn::CreatedAt);

/// Field definition as entered in a form or a cascade step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewField {
    pub name: String,
    pub field_type: FieldType,
    pub options: Vec<SelectOption>,
    pub required: bool,
    pub position: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldChanges {
    pub name: Option<String>,
    pub field_type: Option<FieldType>,
    pub options: Option<Vec<SelectOption>>,
    pub required: Option<bool>,
}

// The native entity store: typed access to the remote data service.
#[derive(Debug, Clone)]
pub struct RepositoryStore {
    pub repository: Arc<dyn Repository>,
}

impl From<RepositoryError> for CatalogError {
    fn from(err: RepositoryError) -> CatalogError {
        CatalogError::SqlxError(match err {
            RepositoryError::UniqueConstraintViolation(e) => e,
            RepositoryError::FKConstraintViolation(e) => e,
            RepositoryError::SqlxError(e) => e,
        })
    }
}

fn is_not_found(err: &RepositoryError) -> bool {
    matches!(err, RepositoryError::SqlxError(sqlx::Error::RowNotFound))
}

impl From<BaseRow> for Base {
    fn from(row: BaseRow) -> Self {
        Base {
            id: row.id,
            name: row.name,
            description: row.description,
            color: row.color,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<TableRow> for Table {
    fn from(row: TableRow) -> Self {
        Table {
            id: row.id,
            base_id: row.base_id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<FieldRow> for Field {
    fn from(row: FieldRow) -> Self {
        let field_type = FieldType::from_str(&row.field_type).unwrap_or_else(|_| {
            warn!(
                "Unknown type {:?} on field {}, treating it as text",
                row.field_type, row.id
            );
            FieldType::Text
        });
        let options = decode_options(row.options.as_deref(), &row.id);

        Field {
            id: row.id,
            table_id: row.table_id,
            name: row.name,
            field_type,
            options,
            required: row.required,
            position: row.position,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        let data = decode_record_data(&row.data, &row.id);

        Record {
            id: row.id,
            table_id: row.table_id,
            data,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ViewRow> for View {
    fn from(row: ViewRow) -> Self {
        let view_type = ViewType::from_str(&row.view_type).unwrap_or_else(|_| {
            warn!(
                "Unknown type {:?} on view {}, treating it as a grid",
                row.view_type, row.id
            );
            ViewType::Grid
        });
        let config = decode_view_config(row.config.as_deref(), &row.id);

        View {
            id: row.id,
            table_id: row.table_id,
            name: row.name,
            view_type,
            config,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn encode_options(options: &[SelectOption]) -> CatalogResult<Option<String>> {
    if options.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(options)?))
    }
}

impl RepositoryStore {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    // Bases

    pub async fn create_base(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
        color: &str,
    ) -> CatalogResult<Base> {
        let now = now_millis();
        let row = BaseRow {
            id: generate_id("bas", 0),
            name: name.to_string(),
            description: description.map(str::to_string),
            color: color.to_string(),
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.create_base(&row).await.map_err(|e| match e {
            RepositoryError::UniqueConstraintViolation(_) => CatalogError::AlreadyExists {
                entity: "Base",
                id: row.id.clone(),
            },
            e => e.into(),
        })?;

        Ok(created.into())
    }

    pub async fn get_base(&self, id: &str, owner_id: &str) -> CatalogResult<Base> {
        self.repository
            .get_base(id, owner_id)
            .await
            .map(Base::from)
            .map_err(|e| {
                if is_not_found(&e) {
                    CatalogError::BaseDoesNotExist { id: id.to_string() }
                } else {
                    e.into()
                }
            })
    }

    pub async fn list_bases(&self, owner_id: &str) -> CatalogResult<Vec<Base>> {
        let rows = self.repository.list_bases(owner_id, BASES_ORDER).await?;
        Ok(rows.into_iter().map(Base::from).collect())
    }

    pub async fn delete_base(&self, id: &str, owner_id: &str) -> CatalogResult<()> {
        Ok(self.repository.delete_base(id, owner_id).await?)
    }

    // Tables

    pub async fn create_table(
        &self,
        owner_id: &str,
        base_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> CatalogResult<Table> {
        // The foreign key only proves the base exists, not that it's ours
        self.get_base(base_id, owner_id).await?;

        let now = now_millis();
        let row = TableRow {
            id: generate_id("tbl", 0),
            base_id: base_id.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.create_table(&row).await.map_err(|e| match e {
            RepositoryError::FKConstraintViolation(_) => CatalogError::BaseDoesNotExist {
                id: base_id.to_string(),
            },
            RepositoryError::UniqueConstraintViolation(_) => CatalogError::AlreadyExists {
                entity: "Table",
                id: row.id.clone(),
            },
            e => e.into(),
        })?;

        Ok(created.into())
    }

    pub async fn get_table(&self, id: &str, owner_id: &str) -> CatalogResult<Table> {
        self.repository
            .get_table(id, owner_id)
            .await
            .map(Table::from)
            .map_err(|e| {
                if is_not_found(&e) {
                    CatalogError::TableDoesNotExist { id: id.to_string() }
                } else {
                    e.into()
                }
            })
    }

    pub async fn list_tables(&self, base_id: &str, owner_id: &str) -> CatalogResult<Vec<Table>> {
        let rows = self
            .repository
            .list_tables(base_id, owner_id, TABLES_ORDER)
            .await?;
        Ok(rows.into_iter().map(Table::from).collect())
    }

    pub async fn delete_table(&self, id: &str, owner_id: &str) -> CatalogResult<()> {
        Ok(self.repository.delete_table(id, owner_id).await?)
    }

    // Fields

    /// `index` only feeds id generation, so sibling fields created in one batch get
    /// distinct ids
    pub async fn create_field(
        &self,
        owner_id: &str,
        table_id: &str,
        field: &NewField,
        index: usize,
    ) -> CatalogResult<Field> {
        self.get_table(table_id, owner_id).await?;

        let now = now_millis();
        let row = FieldRow {
            id: generate_id("fld", index),
            table_id: table_id.to_string(),
            name: field.name.clone(),
            field_type: field.field_type.to_string(),
            options: encode_options(&field.options)?,
            required: field.required,
            position: field.position,
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.create_field(&row).await.map_err(|e| match e {
            RepositoryError::FKConstraintViolation(_) => CatalogError::TableDoesNotExist {
                id: table_id.to_string(),
            },
            RepositoryError::UniqueConstraintViolation(_) => {
                CatalogError::FieldPositionTaken {
                    table_id: table_id.to_string(),
                    position: field.position,
                }
            }
            e => e.into(),
        })?;

        Ok(created.into())
    }

    pub async fn list_fields(&self, table_id: &str, owner_id: &str) -> CatalogResult<Vec<Field>> {
        let rows = self
            .repository
            .list_fields(table_id, owner_id, FIELDS_ORDER)
            .await?;
        Ok(rows.into_iter().map(Field::from).collect())
    }

    /// Position for a field appended after the existing ones
    pub async fn next_field_position(&self, table_id: &str, owner_id: &str) -> CatalogResult<i32> {
        let fields = self.list_fields(table_id, owner_id).await?;
        Ok(fields.iter().map(|f| f.position + 1).max().unwrap_or(0))
    }

    pub async fn update_field(
        &self,
        id: &str,
        owner_id: &str,
        changes: &FieldChanges,
    ) -> CatalogResult<Field> {
        let update = FieldUpdate {
            name: changes.name.clone(),
            field_type: changes.field_type.map(|t| t.to_string()),
            options: match &changes.options {
                // An explicitly emptied list is stored as "[]" so it overrides the old one
                Some(options) => Some(serde_json::to_string(options)?),
                None => None,
            },
            required: changes.required,
            updated_at: now_millis(),
        };

        self.repository
            .update_field(id, owner_id, &update)
            .await
            .map(Field::from)
            .map_err(|e| {
                if is_not_found(&e) {
                    CatalogError::FieldDoesNotExist { id: id.to_string() }
                } else {
                    e.into()
                }
            })
    }

    pub async fn delete_field(&self, id: &str, owner_id: &str) -> CatalogResult<()> {
        Ok(self.repository.delete_field(id, owner_id).await?)
    }

    // Records

    pub async fn create_record(
        &self,
        owner_id: &str,
        table_id: &str,
        data: &RecordData,
    ) -> CatalogResult<Record> {
        self.get_table(table_id, owner_id).await?;

        let now = now_millis();
        let row = RecordRow {
            id: generate_id("rec", 0),
            table_id: table_id.to_string(),
            data: serde_json::to_string(data)?,
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.create_record(&row).await.map_err(|e| match e {
            RepositoryError::FKConstraintViolation(_) => CatalogError::TableDoesNotExist {
                id: table_id.to_string(),
            },
            e => e.into(),
        })?;

        Ok(created.into())
    }

    pub async fn list_records(&self, table_id: &str, owner_id: &str) -> CatalogResult<Vec<Record>> {
        let rows = self
            .repository
            .list_records(table_id, owner_id, RECORDS_ORDER)
            .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    /// Persist the full value mapping of a record
    pub async fn update_record_data(
        &self,
        id: &str,
        owner_id: &str,
        data: &RecordData,
    ) -> CatalogResult<Record> {
        let serialized = serde_json::to_string(data)?;

        self.repository
            .update_record(id, owner_id, &serialized, now_millis())
            .await
            .map(Record::from)
            .map_err(|e| {
                if is_not_found(&e) {
                    CatalogError::RecordDoesNotExist { id: id.to_string() }
                } else {
                    e.into()
                }
            })
    }

    // Views

    pub async fn create_view(
        &self,
        owner_id: &str,
        table_id: &str,
        name: &str,
        view_type: ViewType,
        config: Option<&serde_json::Value>,
    ) -> CatalogResult<View> {
        self.get_table(table_id, owner_id).await?;

        let now = now_millis();
        let row = ViewRow {
            id: generate_id("viw", 0),
            table_id: table_id.to_string(),
            name: name.to_string(),
            view_type: view_type.to_string(),
            config: config.map(serde_json::to_string).transpose()?,
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.create_view(&row).await.map_err(|e| match e {
            RepositoryError::FKConstraintViolation(_) => CatalogError::TableDoesNotExist {
                id: table_id.to_string(),
            },
            e => e.into(),
        })?;

        Ok(created.into())
    }

    pub async fn list_views(&self, table_id: &str, owner_id: &str) -> CatalogResult<Vec<View>> {
        let rows = self
            .repository
            .list_views(table_id, owner_id, VIEWS_ORDER)
            .await?;
        Ok(rows.into_iter().map(View::from).collect())
    }

    pub async fn delete_view(&self, id: &str, owner_id: &str) -> CatalogResult<()> {
        Ok(self.repository.delete_view(id, owner_id).await?)
    }
}
