use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{AuthProvider, AuthState, Subscription};
use crate::cascade::{BaseCascade, CascadeBuilder, TableCascade};
use crate::catalog::{CatalogError, CatalogResult, FieldChanges, NewField, RepositoryStore};
use crate::config::schema::{Cascade, Grid};
use crate::data_types::{
    Field, FieldId, FieldType, Record, RecordData, RecordId, SelectOption, User, View, ViewType,
};
use crate::grid::{
    edit_text, parse_input, render_cell, update_cell_value, CellCommit, CellDisplay, EndEdit,
    GridSession, PendingCommit,
};
use crate::loader::{DataLoader, LoadedData, Slot};
use crate::modal::{BaseModal, TableModal};
use crate::selection::Selection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub record_id: RecordId,
    pub cells: Vec<CellDisplay>,
}

/// The selected table as the grid shows it: field names as headers, newest record first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedGrid {
    pub headers: Vec<String>,
    pub field_ids: Vec<FieldId>,
    pub rows: Vec<RenderedRow>,
}

static NO_SELECTION: Selection = Selection::NoSelection;
static NOTHING_LOADED: LoadedData = LoadedData {
    bases: Vec::new(),
    base: None,
    tables: Vec::new(),
    table: None,
    fields: Vec::new(),
    records: Vec::new(),
    views: Vec::new(),
};

/// Latest auth state as pushed by the provider. `epoch` moves whenever the
/// signed-in user changes, including sign-out.
#[derive(Debug, Default)]
struct SessionWatch {
    state: Mutex<AuthState>,
    epoch: AtomicU64,
}

impl SessionWatch {
    fn observe(&self, next: &AuthState) {
        let mut state = self.state.lock();
        let user_id = |s: &AuthState| s.user.as_ref().map(|u| u.id.clone());
        if user_id(&state) != user_id(next) {
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        *state = next.clone();
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

// The object UI handlers talk to. Every operation that touches data checks the
// session first; without one it falls back to the signed-out landing state.
// Session changes pushed by the provider hide loaded data right away and reset
// the workspace on its next operation.
#[derive(Debug)]
pub struct Workspace {
    pub store: RepositoryStore,
    pub auth: Arc<dyn AuthProvider>,
    pub base_modal: BaseModal,
    pub table_modal: TableModal,
    cascade: CascadeBuilder,
    selection: Selection,
    loader: DataLoader,
    grid: GridSession,
    date_format: String,
    session: Arc<SessionWatch>,
    seen_epoch: u64,
    subscription: Option<Subscription>,
}

impl Workspace {
    pub fn new(
        store: RepositoryStore,
        auth: Arc<dyn AuthProvider>,
        grid: &Grid,
        cascade: &Cascade,
    ) -> Self {
        let session = Arc::new(SessionWatch::default());
        let watch = session.clone();
        let subscription =
            auth.on_auth_state_changed(Arc::new(move |state: &AuthState| watch.observe(state)));
        let seen_epoch = session.epoch();

        Self {
            cascade: CascadeBuilder::new(store.clone(), cascade.on_failure),
            store,
            auth,
            base_modal: BaseModal::default(),
            table_modal: TableModal::default(),
            selection: Selection::default(),
            loader: DataLoader::new(),
            grid: GridSession::new(grid.commit_mode),
            date_format: grid.date_format.clone(),
            session,
            seen_epoch,
            subscription: Some(subscription),
        }
    }

    /// What the auth provider last reported, loading flag included
    pub fn auth_state(&self) -> AuthState {
        self.session.state.lock().clone()
    }

    fn session_changed(&self) -> bool {
        self.session.epoch() != self.seen_epoch
    }

    fn sync_session(&mut self) {
        let epoch = self.session.epoch();
        if epoch != self.seen_epoch {
            debug!("Signed-in user changed, back to the landing state");
            self.reset_to_landing();
            self.seen_epoch = epoch;
        }
    }

    pub fn selection(&self) -> &Selection {
        if self.session_changed() {
            return &NO_SELECTION;
        }
        &self.selection
    }

    pub fn data(&self) -> &LoadedData {
        if self.session_changed() {
            return &NOTHING_LOADED;
        }
        self.loader.data()
    }

    pub fn grid_session(&self) -> &GridSession {
        &self.grid
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    fn reset_to_landing(&mut self) {
        self.selection.clear();
        self.loader.clear();
        self.grid.clear();
        self.base_modal.dismiss();
        self.table_modal.dismiss();
    }

    async fn current_user(&mut self) -> CatalogResult<User> {
        self.sync_session();
        match self.auth.me().await {
            Ok(user) => Ok(user),
            Err(e) => {
                debug!("No session ({e}), back to the landing state");
                self.reset_to_landing();
                Err(CatalogError::Unauthenticated)
            }
        }
    }

    fn selected_table_id(&self) -> CatalogResult<String> {
        self.selection
            .table_id()
            .map(str::to_string)
            .ok_or(CatalogError::NoTableSelected)
    }

    fn loaded_field(&self, field_id: &str) -> CatalogResult<&Field> {
        self.loader
            .data()
            .fields
            .iter()
            .find(|f| f.id == field_id)
            .ok_or_else(|| CatalogError::FieldDoesNotExist {
                id: field_id.to_string(),
            })
    }

    fn loaded_record(&self, record_id: &str) -> CatalogResult<&Record> {
        self.loader
            .data()
            .records
            .iter()
            .find(|r| r.id == record_id)
            .ok_or_else(|| CatalogError::RecordDoesNotExist {
                id: record_id.to_string(),
            })
    }

    async fn reload(&mut self, slot: Slot, user: &User) {
        if let Err(e) = self.loader.reload(&self.store, slot, &self.selection, user).await {
            warn!("Couldn't reload {slot}: {e}");
        }
    }

    /// Bring every loaded slot in line with the selection. Without a session
    /// everything is cleared and nothing is fetched.
    pub async fn refresh(&mut self) -> CatalogResult<()> {
        self.sync_session();
        let user = self.auth.me().await.ok();
        if user.is_none() {
            self.reset_to_landing();
        }
        self.loader
            .refresh(&self.store, &self.selection, user.as_ref())
            .await
    }

    // Selection

    pub async fn select_base(&mut self, base_id: &str) -> CatalogResult<()> {
        self.sync_session();
        self.selection.select_base(base_id);
        self.grid.clear();
        self.refresh().await
    }

    pub async fn select_table(&mut self, table_id: &str) -> CatalogResult<bool> {
        self.sync_session();
        if !self.selection.select_table(table_id) {
            return Ok(false);
        }
        self.grid.clear();
        self.refresh().await?;
        Ok(true)
    }

    pub async fn select_view(&mut self, view_id: &str) -> CatalogResult<bool> {
        self.sync_session();
        if !self.selection.select_view(view_id) {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    // Modals

    pub async fn submit_base_modal(&mut self) -> CatalogResult<BaseCascade> {
        let user = self.current_user().await?;
        let request = self.base_modal.begin_submit()?;

        let result = self.cascade.create_base(&user.id, &request).await;
        self.base_modal.finish_submit(&result);

        let created = result?;
        self.reload(Slot::Bases, &user).await;
        Ok(created)
    }

    pub async fn submit_table_modal(&mut self) -> CatalogResult<TableCascade> {
        let user = self.current_user().await?;
        let request = self.table_modal.begin_submit(self.selection.base_id())?;

        let result = self.cascade.create_table(&user.id, &request).await;
        self.table_modal.finish_submit(&result);

        let created = result?;
        self.reload(Slot::Tables, &user).await;
        Ok(created)
    }

    // Individual forms

    pub async fn add_record(&mut self) -> CatalogResult<Record> {
        let user = self.current_user().await?;
        let table_id = self.selected_table_id()?;

        let record = self
            .store
            .create_record(&user.id, &table_id, &RecordData::new())
            .await?;
        self.loader.prepend_record(record.clone());
        Ok(record)
    }

    pub async fn add_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        options: Vec<SelectOption>,
    ) -> CatalogResult<Field> {
        let user = self.current_user().await?;
        let table_id = self.selected_table_id()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Validation {
                reason: "Field name can't be empty".to_string(),
            });
        }
        if !options.is_empty() && !field_type.has_options() {
            return Err(CatalogError::Validation {
                reason: format!("A {field_type} field can't have options"),
            });
        }

        let position = self.store.next_field_position(&table_id, &user.id).await?;
        let field = self
            .store
            .create_field(
                &user.id,
                &table_id,
                &NewField {
                    name: name.to_string(),
                    field_type,
                    options,
                    required: false,
                    position,
                },
                0,
            )
            .await?;

        self.reload(Slot::Fields, &user).await;
        Ok(field)
    }

    async fn change_field(&mut self, field_id: &str, changes: FieldChanges) -> CatalogResult<Field> {
        let user = self.current_user().await?;
        self.selected_table_id()?;

        let field = self.store.update_field(field_id, &user.id, &changes).await?;
        self.loader.replace_field(field.clone());
        Ok(field)
    }

    pub async fn rename_field(&mut self, field_id: &str, name: &str) -> CatalogResult<Field> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Validation {
                reason: "Field name can't be empty".to_string(),
            });
        }

        self.change_field(
            field_id,
            FieldChanges {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_field_options(
        &mut self,
        field_id: &str,
        options: Vec<SelectOption>,
    ) -> CatalogResult<Field> {
        let field = self.loaded_field(field_id)?;
        if !field.field_type.has_options() {
            return Err(CatalogError::Validation {
                reason: format!("{} has no options to set", field.name),
            });
        }

        self.change_field(
            field_id,
            FieldChanges {
                options: Some(options),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn add_view(&mut self, name: &str, view_type: ViewType) -> CatalogResult<View> {
        let user = self.current_user().await?;
        let table_id = self.selected_table_id()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Validation {
                reason: "View name can't be empty".to_string(),
            });
        }

        let view = self
            .store
            .create_view(&user.id, &table_id, name, view_type, None)
            .await?;
        self.reload(Slot::Views, &user).await;
        Ok(view)
    }

    // Grid editing

    pub fn begin_edit(&mut self, record_id: &str, field_id: &str) -> CatalogResult<()> {
        self.sync_session();
        let field = self.loaded_field(field_id)?;
        if field.field_type.commits_immediately() {
            return Err(CatalogError::Validation {
                reason: format!("{} is changed by toggling or choosing, not typing", field.name),
            });
        }
        let record = self.loaded_record(record_id)?;
        let text = edit_text(field, record.value(field_id));

        self.grid.begin_edit(record_id, field_id, text);
        Ok(())
    }

    /// Keystrokes into the cell editor
    pub async fn input_text(&mut self, text: &str) -> CatalogResult<Option<CellCommit>> {
        match self.grid.input(text) {
            Some(pending) => self.commit(pending).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn end_edit(&mut self, reason: EndEdit) -> CatalogResult<Option<CellCommit>> {
        match self.grid.end_edit(reason) {
            Some(pending) => self.commit(pending).await.map(Some),
            None => Ok(None),
        }
    }

    async fn commit(&mut self, pending: PendingCommit) -> CatalogResult<CellCommit> {
        let value = parse_input(self.loaded_field(&pending.field_id)?, &pending.text)?;
        self.update_cell_value(&pending.record_id, &pending.field_id, value)
            .await
    }

    /// Set one cell, keeping the rest of the record. The grid shows the new value
    /// straight away; a failed write is only logged.
    pub async fn update_cell_value(
        &mut self,
        record_id: &str,
        field_id: &str,
        value: Value,
    ) -> CatalogResult<CellCommit> {
        let user = self.current_user().await?;

        Ok(update_cell_value(
            &self.store,
            &mut self.loader,
            &user.id,
            record_id,
            field_id,
            value,
        )
        .await)
    }

    pub async fn toggle_checkbox(
        &mut self,
        record_id: &str,
        field_id: &str,
    ) -> CatalogResult<CellCommit> {
        let field = self.loaded_field(field_id)?;
        if field.field_type != FieldType::Checkbox {
            return Err(CatalogError::Validation {
                reason: format!("{} isn't a checkbox", field.name),
            });
        }

        let checked = self
            .loaded_record(record_id)?
            .value(field_id)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.update_cell_value(record_id, field_id, Value::Bool(!checked))
            .await
    }

    /// Pick a select option by id or label
    pub async fn choose_option(
        &mut self,
        record_id: &str,
        field_id: &str,
        option: &str,
    ) -> CatalogResult<CellCommit> {
        let field = self.loaded_field(field_id)?;
        if field.field_type != FieldType::Select {
            return Err(CatalogError::Validation {
                reason: format!("{} isn't a select field", field.name),
            });
        }

        let value = parse_input(field, option)?;
        self.update_cell_value(record_id, field_id, value).await
    }

    pub fn render_grid(&self) -> RenderedGrid {
        if self.session_changed() {
            return RenderedGrid::default();
        }
        let data = self.loader.data();
        let editing = self.grid.editing();

        let rows = data
            .records
            .iter()
            .map(|record| RenderedRow {
                record_id: record.id.clone(),
                cells: data
                    .fields
                    .iter()
                    .map(|field| match editing {
                        Some(cell) if cell.record_id == record.id && cell.field_id == field.id => {
                            CellDisplay::Text(cell.draft.clone())
                        }
                        _ => render_cell(field, record.value(&field.id), &self.date_format),
                    })
                    .collect(),
            })
            .collect();

        RenderedGrid {
            headers: data.fields.iter().map(|f| f.name.clone()).collect(),
            field_ids: data.fields.iter().map(|f| f.id.clone()).collect(),
            rows,
        }
    }

    pub async fn logout(&mut self) {
        self.auth.logout().await;
        self.sync_session();
        self.reset_to_landing();
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Workspace;
    use crate::auth::LocalAuthProvider;
    use crate::catalog::CatalogError;
    use crate::config::schema::{Cascade, Grid};
    use crate::testutils::{make_store, signed_in_auth, test_users};

    #[tokio::test]
    async fn test_signed_out_workspace_refuses_writes() {
        let store = make_store().await;
        let auth = Arc::new(LocalAuthProvider::new(test_users()));
        let mut workspace = Workspace::new(store, auth, &Grid::default(), &Cascade::default());

        workspace.base_modal.show();
        workspace.base_modal.name = "Projects".to_string();
        assert!(matches!(
            workspace.submit_base_modal().await,
            Err(CatalogError::Unauthenticated)
        ));
        assert!(!workspace.base_modal.open);
    }

    #[tokio::test]
    async fn test_forms_need_a_table() {
        let store = make_store().await;
        let mut workspace =
            Workspace::new(store, signed_in_auth(), &Grid::default(), &Cascade::default());

        assert!(matches!(
            workspace.add_record().await,
            Err(CatalogError::NoTableSelected)
        ));
        assert!(!workspace.select_table("tbl_x").await.unwrap());
    }

    #[tokio::test]
    async fn test_new_base_shows_up_in_listing() {
        let store = make_store().await;
        let mut workspace =
            Workspace::new(store, signed_in_auth(), &Grid::default(), &Cascade::default());
        workspace.refresh().await.unwrap();
        assert!(workspace.data().bases.is_empty());

        workspace.base_modal.show();
        workspace.base_modal.name = "Projects".to_string();
        let created = workspace.submit_base_modal().await.unwrap();

        assert!(!workspace.base_modal.open);
        assert_eq!(workspace.data().bases.len(), 1);
        assert_eq!(workspace.data().bases[0].id, created.base.id);
    }
}
