use tracing::debug;

use crate::data_types::{BaseId, TableId, ViewId};

/// What the sidebar currently points at. Lower levels only exist under their parent,
/// so a view can't be selected without a table and a table without a base.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    NoSelection,
    BaseSelected {
        base_id: BaseId,
    },
    TableSelected {
        base_id: BaseId,
        table_id: TableId,
    },
    ViewSelected {
        base_id: BaseId,
        table_id: TableId,
        view_id: ViewId,
    },
}

impl Selection {
    pub fn base_id(&self) -> Option<&str> {
        match self {
            Selection::NoSelection => None,
            Selection::BaseSelected { base_id }
            | Selection::TableSelected { base_id, .. }
            | Selection::ViewSelected { base_id, .. } => Some(base_id),
        }
    }

    pub fn table_id(&self) -> Option<&str> {
        match self {
            Selection::TableSelected { table_id, .. } | Selection::ViewSelected { table_id, .. } => {
                Some(table_id)
            }
            _ => None,
        }
    }

    pub fn view_id(&self) -> Option<&str> {
        match self {
            Selection::ViewSelected { view_id, .. } => Some(view_id),
            _ => None,
        }
    }

    /// Selects a base and drops any table/view, including when the base is
    /// already the selected one.
    pub fn select_base(&mut self, base_id: &str) {
        debug!("Selecting base {base_id}");
        *self = Selection::BaseSelected {
            base_id: base_id.to_string(),
        };
    }

    /// Selects a table under the current base and drops the view. Returns `false`
    /// and leaves the state alone when no base is selected.
    pub fn select_table(&mut self, table_id: &str) -> bool {
        let Some(base_id) = self.base_id().map(str::to_string) else {
            debug!("Ignoring selection of table {table_id}: no base selected");
            return false;
        };

        debug!("Selecting table {table_id} in base {base_id}");
        *self = Selection::TableSelected {
            base_id,
            table_id: table_id.to_string(),
        };
        true
    }

    /// Selects a view of the current table. Returns `false` when no table is selected.
    pub fn select_view(&mut self, view_id: &str) -> bool {
        let (Some(base_id), Some(table_id)) = (self.base_id(), self.table_id()) else {
            debug!("Ignoring selection of view {view_id}: no table selected");
            return false;
        };

        *self = Selection::ViewSelected {
            base_id: base_id.to_string(),
            table_id: table_id.to_string(),
            view_id: view_id.to_string(),
        };
        true
    }

    pub fn clear(&mut self) {
        *self = Selection::NoSelection;
    }
}
