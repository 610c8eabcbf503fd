use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::sqlite::SqliteJournalMode;

use crate::auth::LocalAuthProvider;
use crate::catalog::RepositoryStore;
use crate::config::schema::{str_to_hex_hash, AuthUser};
use crate::data_types::Timestamp;
use crate::repository::interface::{
    BaseRow, Error, FieldRow, FieldUpdate, OrderBy, RecordRow, Repository, Result, TableRow,
    ViewRow,
};
use crate::repository::sqlite::SqliteRepository;

pub const TEST_USER_ID: &str = "user-1";
pub const TEST_USER_EMAIL: &str = "ada@example.com";
pub const TEST_USER_PASSWORD: &str = "hunter2";

pub async fn make_sqlite_repository() -> Arc<SqliteRepository> {
    Arc::new(
        SqliteRepository::try_new("sqlite::memory:".to_string(), SqliteJournalMode::Wal)
            .await
            .expect("Error setting up the database"),
    )
}

pub async fn make_store() -> RepositoryStore {
    RepositoryStore::new(make_sqlite_repository().await)
}

pub fn test_users() -> Vec<AuthUser> {
    vec![
        AuthUser {
            id: TEST_USER_ID.to_string(),
            email: TEST_USER_EMAIL.to_string(),
            password_sha256: str_to_hex_hash(TEST_USER_PASSWORD),
        },
        AuthUser {
            id: "user-2".to_string(),
            email: "grace@example.com".to_string(),
            password_sha256: str_to_hex_hash("cobol"),
        },
    ]
}

/// An auth provider with the test user already signed in
pub fn signed_in_auth() -> Arc<LocalAuthProvider> {
    let auth = LocalAuthProvider::new(test_users());
    auth.sign_in(TEST_USER_EMAIL, TEST_USER_PASSWORD)
        .expect("test user signs in");
    Arc::new(auth)
}

/// Repository wrapper that logs every call by operation name and can fail the
/// n-th call of a given operation.
#[derive(Debug)]
pub struct FaultyRepository {
    inner: Arc<dyn Repository>,
    calls: Mutex<Vec<&'static str>>,
    fault: Mutex<Option<(&'static str, usize)>>,
}

impl FaultyRepository {
    pub fn new(inner: Arc<dyn Repository>) -> Self {
        Self {
            inner,
            calls: Mutex::new(vec![]),
            fault: Mutex::new(None),
        }
    }

    /// Fail the call to `operation` after letting `skip` of them through. One-shot.
    pub fn fail_on(&self, operation: &'static str, skip: usize) {
        *self.fault.lock() = Some((operation, skip));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, operation: &'static str) -> Result<(), Error> {
        self.calls.lock().push(operation);

        let mut fault = self.fault.lock();
        let fire = match fault.as_mut() {
            Some((op, skip)) if *op == operation => {
                if *skip == 0 {
                    true
                } else {
                    *skip -= 1;
                    false
                }
            }
            _ => false,
        };

        if fire {
            *fault = None;
            return Err(Error::SqlxError(sqlx::Error::Protocol(format!(
                "injected failure in {operation}"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for FaultyRepository {
    async fn setup(&self) {
        self.inner.setup().await
    }

    async fn create_base(&self, base: &BaseRow) -> Result<BaseRow, Error> {
        self.record("create_base")?;
        self.inner.create_base(base).await
    }

    async fn get_base(&self, id: &str, owner_id: &str) -> Result<BaseRow, Error> {
        self.record("get_base")?;
        self.inner.get_base(id, owner_id).await
    }

    async fn list_bases(&self, owner_id: &str, order: OrderBy) -> Result<Vec<BaseRow>, Error> {
        self.record("list_bases")?;
        self.inner.list_bases(owner_id, order).await
    }

    async fn create_table(&self, table: &TableRow) -> Result<TableRow, Error> {
        self.record("create_table")?;
        self.inner.create_table(table).await
    }

    async fn get_table(&self, id: &str, owner_id: &str) -> Result<TableRow, Error> {
        self.record("get_table")?;
        self.inner.get_table(id, owner_id).await
    }

    async fn list_tables(
        &self,
        base_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<TableRow>, Error> {
        self.record("list_tables")?;
        self.inner.list_tables(base_id, owner_id, order).await
    }

    async fn create_field(&self, field: &FieldRow) -> Result<FieldRow, Error> {
        self.record("create_field")?;
        self.inner.create_field(field).await
    }

    async fn list_fields(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<FieldRow>, Error> {
        self.record("list_fields")?;
        self.inner.list_fields(table_id, owner_id, order).await
    }

    async fn update_field(
        &self,
        id: &str,
        owner_id: &str,
        update: &FieldUpdate,
    ) -> Result<FieldRow, Error> {
        self.record("update_field")?;
        self.inner.update_field(id, owner_id, update).await
    }

    async fn create_record(&self, record: &RecordRow) -> Result<RecordRow, Error> {
        self.record("create_record")?;
        self.inner.create_record(record).await
    }

    async fn list_records(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<RecordRow>, Error> {
        self.record("list_records")?;
        self.inner.list_records(table_id, owner_id, order).await
    }

    async fn update_record(
        &self,
        id: &str,
        owner_id: &str,
        data: &str,
        updated_at: Timestamp,
    ) -> Result<RecordRow, Error> {
        self.record("update_record")?;
        self.inner.update_record(id, owner_id, data, updated_at).await
    }

    async fn create_view(&self, view: &ViewRow) -> Result<ViewRow, Error> {
        self.record("create_view")?;
        self.inner.create_view(view).await
    }

    async fn list_views(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<ViewRow>, Error> {
        self.record("list_views")?;
        self.inner.list_views(table_id, owner_id, order).await
    }

    async fn delete_base(&self, id: &str, owner_id: &str) -> Result<(), Error> {
        self.record("delete_base")?;
        self.inner.delete_base(id, owner_id).await
    }

    async fn delete_table(&self, id: &str, owner_id: &str) -> Result<(), Error> {
        self.record("delete_table")?;
        self.inner.delete_table(id, owner_id).await
    }

    async fn delete_field(&self, id: &str, owner_id: &str) -> Result<(), Error> {
        self.record("delete_field")?;
        self.inner.delete_field(id, owner_id).await
    }

    async fn delete_view(&self, id: &str, owner_id: &str) -> Result<(), Error> {
        self.record("delete_view")?;
        self.inner.delete_view(id, owner_id).await
    }
}
