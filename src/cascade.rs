use std::fmt;

use itertools::Itertools;
use tracing::{info, warn};

use crate::catalog::{CatalogResult, NewField, RepositoryStore};
use crate::config::schema::FailurePolicy;
use crate::data_types::{
    Base, BaseId, Field, FieldId, FieldType, SelectOption, Table, TableId, View, ViewId,
    ViewType,
};

pub const DEFAULT_TABLE_NAME: &str = "Table 1";
pub const DEFAULT_VIEW_NAME: &str = "Grid view";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBase {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTable {
    pub base_id: BaseId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TableCascade {
    pub table: Table,
    pub fields: Vec<Field>,
    pub view: View,
}

#[derive(Debug, Clone)]
pub struct BaseCascade {
    pub base: Base,
    pub table: Table,
    pub fields: Vec<Field>,
    pub view: View,
}

fn text_field(name: &str, position: i32) -> NewField {
    NewField {
        name: name.to_string(),
        field_type: FieldType::Text,
        options: vec![],
        required: false,
        position,
    }
}

/// Name and Notes, the schema every new table starts with
pub fn default_table_fields() -> Vec<NewField> {
    vec![text_field("Name", 0), text_field("Notes", 1)]
}

/// The first table of a new base also tracks a status
pub fn default_base_fields() -> Vec<NewField> {
    let mut fields = default_table_fields();
    fields.push(NewField {
        name: "Status".to_string(),
        field_type: FieldType::Select,
        options: vec![
            SelectOption::new("todo", "To do", "gray"),
            SelectOption::new("in_progress", "In progress", "blue"),
            SelectOption::new("done", "Done", "green"),
        ],
        required: false,
        position: 2,
    });
    fields
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Created {
    Base(BaseId),
    Table(TableId),
    Field(FieldId),
    View(ViewId),
}

impl fmt::Display for Created {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Created::Base(id) => write!(f, "base {id}"),
            Created::Table(id) => write!(f, "table {id}"),
            Created::Field(id) => write!(f, "field {id}"),
            Created::View(id) => write!(f, "view {id}"),
        }
    }
}

/// Everything a cascade has created so far, oldest first
#[derive(Debug, Default)]
struct Journal {
    created: Vec<Created>,
}

impl Journal {
    fn push(&mut self, entry: Created) {
        self.created.push(entry);
    }
}

/// Provisions a base or table together with the children it can't exist without.
/// Each step waits for the previous one, since children need their parent's id.
#[derive(Debug, Clone)]
pub struct CascadeBuilder {
    store: RepositoryStore,
    on_failure: FailurePolicy,
}

impl CascadeBuilder {
    pub fn new(store: RepositoryStore, on_failure: FailurePolicy) -> Self {
        Self { store, on_failure }
    }

    pub fn on_failure(&self) -> FailurePolicy {
        self.on_failure
    }

    pub async fn create_base(&self, owner_id: &str, new: &NewBase) -> CatalogResult<BaseCascade> {
        let mut journal = Journal::default();
        let result = self.provision_base(owner_id, new, &mut journal).await;

        let created = self.settle(owner_id, result, journal).await?;
        info!(
            "Created base {} ({}) with table {}",
            created.base.name, created.base.id, created.table.id
        );
        Ok(created)
    }

    pub async fn create_table(
        &self,
        owner_id: &str,
        new: &NewTable,
    ) -> CatalogResult<TableCascade> {
        let mut journal = Journal::default();
        let result = self
            .provision_table(
                owner_id,
                &new.base_id,
                &new.name,
                new.description.as_deref(),
                &default_table_fields(),
                &mut journal,
            )
            .await;

        let created = self.settle(owner_id, result, journal).await?;
        info!(
            "Created table {} ({}) in base {}",
            created.table.name, created.table.id, new.base_id
        );
        Ok(created)
    }

    async fn provision_base(
        &self,
        owner_id: &str,
        new: &NewBase,
        journal: &mut Journal,
    ) -> CatalogResult<BaseCascade> {
        let base = self
            .store
            .create_base(owner_id, &new.name, new.description.as_deref(), &new.color)
            .await?;
        journal.push(Created::Base(base.id.clone()));

        let TableCascade {
            table,
            fields,
            view,
        } = self
            .provision_table(
                owner_id,
                &base.id,
                DEFAULT_TABLE_NAME,
                None,
                &default_base_fields(),
                journal,
            )
            .await?;

        Ok(BaseCascade {
            base,
            table,
            fields,
            view,
        })
    }

    async fn provision_table(
        &self,
        owner_id: &str,
        base_id: &str,
        name: &str,
        description: Option<&str>,
        fields: &[NewField],
        journal: &mut Journal,
    ) -> CatalogResult<TableCascade> {
        let table = self
            .store
            .create_table(owner_id, base_id, name, description)
            .await?;
        journal.push(Created::Table(table.id.clone()));

        let mut created_fields = Vec::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            let created = self
                .store
                .create_field(owner_id, &table.id, field, index)
                .await?;
            journal.push(Created::Field(created.id.clone()));
            created_fields.push(created);
        }

        let view = self
            .store
            .create_view(owner_id, &table.id, DEFAULT_VIEW_NAME, ViewType::Grid, None)
            .await?;
        journal.push(Created::View(view.id.clone()));

        Ok(TableCascade {
            table,
            fields: created_fields,
            view,
        })
    }

    /// Apply the failure policy to a failed cascade. The original error is
    /// always what the caller gets back.
    async fn settle<T>(
        &self,
        owner_id: &str,
        result: CatalogResult<T>,
        journal: Journal,
    ) -> CatalogResult<T> {
        let error = match result {
            Ok(created) => return Ok(created),
            Err(e) => e,
        };

        if journal.created.is_empty() {
            return Err(error);
        }

        match self.on_failure {
            FailurePolicy::Rollback => {
                warn!(
                    "Cascade failed ({error}), removing {} created entities",
                    journal.created.len()
                );
                self.roll_back(owner_id, journal).await;
            }
            FailurePolicy::LeaveOrphans => {
                warn!(
                    "Cascade failed ({error}), leaving behind: {}",
                    journal.created.iter().join(", ")
                );
            }
        }

        Err(error)
    }

    // Newest first, so children go before their parents
    async fn roll_back(&self, owner_id: &str, journal: Journal) {
        for entry in journal.created.into_iter().rev() {
            let result = match &entry {
                Created::View(id) => self.store.delete_view(id, owner_id).await,
                Created::Field(id) => self.store.delete_field(id, owner_id).await,
                Created::Table(id) => self.store.delete_table(id, owner_id).await,
                Created::Base(id) => self.store.delete_base(id, owner_id).await,
            };

            if let Err(e) = result {
                warn!("Couldn't remove {entry}: {e}");
            }
        }
    }
}
