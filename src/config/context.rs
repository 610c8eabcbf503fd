use std::sync::Arc;

use tracing::info;

use crate::{
    auth::LocalAuthProvider,
    catalog::RepositoryStore,
    context::Workspace,
    repository::{interface::Repository, sqlite::SqliteRepository},
};

#[cfg(feature = "store-postgres")]
use crate::repository::postgres::PostgresRepository;

use super::schema;

pub async fn build_repository(
    store: &schema::Store,
) -> Result<Arc<dyn Repository>, sqlx::Error> {
    let repository: Arc<dyn Repository> = match store {
        #[cfg(feature = "store-postgres")]
        schema::Store::Postgres(schema::Postgres { dsn, schema }) => {
            info!("Using PostgreSQL store (schema {schema})");
            Arc::new(PostgresRepository::try_new(dsn.to_string(), schema.to_string()).await?)
        }
        schema::Store::Sqlite(schema::Sqlite { dsn, journal_mode }) => {
            info!("Using SQLite store at {dsn}");
            Arc::new(SqliteRepository::try_new(dsn.to_string(), (*journal_mode).into()).await?)
        }
    };

    Ok(repository)
}

/// Everything the front end needs: the store, a provider for the configured users
/// (kept concrete so the caller can sign in) and the workspace driving both.
pub async fn build_workspace(
    cfg: &schema::BasegridConfig,
) -> Result<(Workspace, Arc<LocalAuthProvider>), sqlx::Error> {
    let store = RepositoryStore::new(build_repository(&cfg.store).await?);
    let auth = Arc::new(LocalAuthProvider::new(cfg.auth.users.clone()));

    let workspace = Workspace::new(store, auth.clone(), &cfg.grid, &cfg.cascade);
    Ok((workspace, auth))
}
