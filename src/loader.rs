//! Keeps the data shown next to the current selection in sync with it.
//!
//! Every slot (bases list, current base, its tables, the current table with its
//! fields, records and views) is keyed by the ids it was fetched for. When a
//! key changes the slot is cleared and a fetch is planned; the fetches of one
//! refresh can run concurrently. Each slot also carries a generation that is
//! bumped whenever its key changes or it's reloaded, and a result is only
//! applied if it was fetched for the current generation. Results may arrive in
//! any order: the last fetch *issued* wins and older ones are dropped on arrival.

use std::collections::HashMap;

use futures::future::join_all;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::{debug, warn};

use crate::catalog::{CatalogResult, RepositoryStore};
use crate::data_types::{Base, Field, Record, Table, User, UserId, View};
use crate::selection::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Slot {
    Bases,
    Base,
    Tables,
    Table,
    Fields,
    Records,
    Views,
}

/// Ids a slot was loaded for. Views are keyed by the table alone, so `user_id` is
/// left out of their key even though fetching them needs a user.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SlotKey {
    scope_id: String,
    user_id: Option<UserId>,
}

#[derive(Debug, Default)]
struct SlotState {
    key: Option<SlotKey>,
    generation: u64,
    loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub slot: Slot,
    pub scope_id: String,
    pub user_id: UserId,
    pub generation: u64,
}

#[derive(Debug)]
pub enum Payload {
    Bases(Vec<Base>),
    Base(Base),
    Tables(Vec<Table>),
    Table(Table),
    Fields(Vec<Field>),
    Records(Vec<Record>),
    Views(Vec<View>),
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub request: FetchRequest,
    pub result: CatalogResult<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedData {
    pub bases: Vec<Base>,
    pub base: Option<Base>,
    pub tables: Vec<Table>,
    pub table: Option<Table>,
    /// Position ascending
    pub fields: Vec<Field>,
    /// Newest first
    pub records: Vec<Record>,
    pub views: Vec<View>,
}

impl LoadedData {
    fn clear(&mut self, slot: Slot) {
        match slot {
            Slot::Bases => self.bases.clear(),
            Slot::Base => self.base = None,
            Slot::Tables => self.tables.clear(),
            Slot::Table => self.table = None,
            Slot::Fields => self.fields.clear(),
            Slot::Records => self.records.clear(),
            Slot::Views => self.views.clear(),
        }
    }

    fn set(&mut self, payload: Payload) {
        match payload {
            Payload::Bases(bases) => self.bases = bases,
            Payload::Base(base) => self.base = Some(base),
            Payload::Tables(tables) => self.tables = tables,
            Payload::Table(table) => self.table = Some(table),
            Payload::Fields(fields) => self.fields = fields,
            Payload::Records(records) => self.records = records,
            Payload::Views(views) => self.views = views,
        }
    }
}

#[derive(Debug)]
pub struct DataLoader {
    slots: HashMap<Slot, SlotState>,
    data: LoadedData,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn key_for(slot: Slot, selection: &Selection, user: Option<&User>) -> Option<SlotKey> {
    let user = user?;
    let scoped = |id: Option<&str>| {
        id.map(|id| SlotKey {
            scope_id: id.to_string(),
            user_id: Some(user.id.clone()),
        })
    };

    match slot {
        Slot::Bases => scoped(Some(&user.id)),
        Slot::Base | Slot::Tables => scoped(selection.base_id()),
        Slot::Table | Slot::Fields | Slot::Records => scoped(selection.table_id()),
        Slot::Views => selection.table_id().map(|id| SlotKey {
            scope_id: id.to_string(),
            user_id: None,
        }),
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            slots: Slot::iter().map(|s| (s, SlotState::default())).collect(),
            data: LoadedData::default(),
        }
    }

    pub fn data(&self) -> &LoadedData {
        &self.data
    }

    pub fn is_loading(&self, slot: Slot) -> bool {
        self.slots.get(&slot).map(|s| s.loading).unwrap_or(false)
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        self.slots.entry(slot).or_default()
    }

    /// Compare every slot's key against the selection and user. Slots whose key
    /// changed are cleared; those that can be fetched get a request.
    pub fn plan(&mut self, selection: &Selection, user: Option<&User>) -> Vec<FetchRequest> {
        let mut requests = vec![];

        for slot in Slot::iter() {
            let wanted = key_for(slot, selection, user);
            let state = self.slot_mut(slot);
            if state.key == wanted {
                continue;
            }

            state.key = wanted.clone();
            state.generation += 1;
            let generation = state.generation;

            match (wanted, user) {
                (Some(key), Some(user)) => {
                    state.loading = true;
                    debug!("Loading {slot} for {}", key.scope_id);
                    requests.push(FetchRequest {
                        slot,
                        scope_id: key.scope_id,
                        user_id: user.id.clone(),
                        generation,
                    });
                }
                _ => {
                    state.loading = false;
                    debug!("Clearing {slot}");
                }
            }
            self.data.clear(slot);
        }

        requests
    }

    pub async fn fetch(store: &RepositoryStore, request: FetchRequest) -> FetchOutcome {
        let (id, owner) = (request.scope_id.as_str(), request.user_id.as_str());

        let result = match request.slot {
            Slot::Bases => store.list_bases(owner).await.map(Payload::Bases),
            Slot::Base => store.get_base(id, owner).await.map(Payload::Base),
            Slot::Tables => store.list_tables(id, owner).await.map(Payload::Tables),
            Slot::Table => store.get_table(id, owner).await.map(Payload::Table),
            Slot::Fields => store.list_fields(id, owner).await.map(Payload::Fields),
            Slot::Records => store.list_records(id, owner).await.map(Payload::Records),
            Slot::Views => store.list_views(id, owner).await.map(Payload::Views),
        };

        FetchOutcome { request, result }
    }

    /// Store a fetch result. `Ok(false)` means it was stale and got dropped;
    /// errors are only returned for current fetches.
    pub fn apply(&mut self, outcome: FetchOutcome) -> CatalogResult<bool> {
        let FetchOutcome { request, result } = outcome;
        let state = self.slot_mut(request.slot);

        if state.generation != request.generation {
            debug!(
                "Dropping stale {} for {} (generation {}, current {})",
                request.slot, request.scope_id, request.generation, state.generation
            );
            return Ok(false);
        }
        state.loading = false;

        match result {
            Ok(payload) => {
                self.data.set(payload);
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to load {} for {}: {e}", request.slot, request.scope_id);
                Err(e)
            }
        }
    }

    /// Plan, fetch concurrently and apply. Every outcome is applied; the first
    /// error is returned.
    pub async fn refresh(
        &mut self,
        store: &RepositoryStore,
        selection: &Selection,
        user: Option<&User>,
    ) -> CatalogResult<()> {
        let requests = self.plan(selection, user);
        let outcomes = join_all(requests.into_iter().map(|r| Self::fetch(store, r))).await;

        let mut first_error = None;
        for outcome in outcomes {
            if let Err(e) = self.apply(outcome) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Refetch a slot for the key the selection and user give it, whether or
    /// not it was loaded before. A no-op when that key can't be formed.
    pub async fn reload(
        &mut self,
        store: &RepositoryStore,
        slot: Slot,
        selection: &Selection,
        user: &User,
    ) -> CatalogResult<()> {
        let Some(key) = key_for(slot, selection, Some(user)) else {
            return Ok(());
        };

        let state = self.slot_mut(slot);
        let key_changed = state.key.as_ref() != Some(&key);
        state.key = Some(key.clone());
        state.generation += 1;
        state.loading = true;
        let generation = state.generation;
        if key_changed {
            self.data.clear(slot);
        }

        let request = FetchRequest {
            slot,
            scope_id: key.scope_id,
            user_id: user.id.clone(),
            generation,
        };
        debug!("Reloading {slot} for {}", request.scope_id);

        let outcome = Self::fetch(store, request).await;
        self.apply(outcome).map(|_| ())
    }

    /// Forget every slot; results still in flight will be dropped
    pub fn clear(&mut self) {
        for state in self.slots.values_mut() {
            state.key = None;
            state.generation += 1;
            state.loading = false;
        }
        self.data = LoadedData::default();
    }

    pub fn record_mut(&mut self, record_id: &str) -> Option<&mut Record> {
        self.data.records.iter_mut().find(|r| r.id == record_id)
    }

    pub fn prepend_record(&mut self, record: Record) {
        self.data.records.insert(0, record);
    }

    /// Swap in an updated copy of a loaded field
    pub fn replace_field(&mut self, field: Field) {
        if let Some(existing) = self.data.fields.iter_mut().find(|f| f.id == field.id) {
            *existing = field;
        }
    }
}
