use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::catalog::CatalogError;
use crate::config::schema::{str_to_hex_hash, AuthUser};
use crate::data_types::User;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Wrong email or password")]
    InvalidCredentials,
}

impl From<AuthError> for CatalogError {
    fn from(_: AuthError) -> Self {
        CatalogError::Unauthenticated
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_loading: bool,
}

pub type AuthHandler = Arc<dyn Fn(&AuthState) + Send + Sync>;

type Handlers = DashMap<u64, AuthHandler>;

/// Handle returned by `on_auth_state_changed`. Dropping it keeps the handler
/// registered; call `unsubscribe` to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    handlers: Weak<Handlers>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.remove(&self.id);
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync + Debug {
    /// The signed-in user; fails when there's no session
    async fn me(&self) -> Result<User, AuthError>;

    /// Registers `handler`, calls it with the current state right away and then
    /// on every session change
    fn on_auth_state_changed(&self, handler: AuthHandler) -> Subscription;

    async fn logout(&self);
}

/// Session provider backed by the users listed in the config file.
pub struct LocalAuthProvider {
    users: Vec<AuthUser>,
    state: RwLock<AuthState>,
    handlers: Arc<Handlers>,
    next_handler_id: AtomicU64,
}

impl Debug for LocalAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAuthProvider")
            .field("users", &self.users.len())
            .field("state", &*self.state.read())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl LocalAuthProvider {
    pub fn new(users: Vec<AuthUser>) -> Self {
        Self {
            users,
            state: RwLock::new(AuthState::default()),
            handlers: Arc::new(DashMap::new()),
            next_handler_id: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        // The read guard has to be gone before set_state takes the write lock
        let current = self.state.read().user.clone();
        self.set_state(AuthState {
            user: current,
            is_loading: true,
        });

        let hash = str_to_hex_hash(password);
        let user = self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email) && u.password_sha256 == hash)
            .map(|u| User {
                id: u.id.clone(),
                email: u.email.clone(),
            });

        match user {
            Some(user) => {
                info!("Signed in as {}", user.email);
                self.set_state(AuthState {
                    user: Some(user.clone()),
                    is_loading: false,
                });
                Ok(user)
            }
            None => {
                debug!("Rejected sign-in for {email}");
                self.set_state(AuthState {
                    user: None,
                    is_loading: false,
                });
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    fn set_state(&self, state: AuthState) {
        *self.state.write() = state.clone();

        // Collect first: a handler may subscribe/unsubscribe while running
        let handlers: Vec<AuthHandler> =
            self.handlers.iter().map(|e| e.value().clone()).collect();
        for handler in handlers {
            handler(&state);
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn me(&self) -> Result<User, AuthError> {
        self.state
            .read()
            .user
            .clone()
            .ok_or(AuthError::Unauthenticated)
    }

    fn on_auth_state_changed(&self, handler: AuthHandler) -> Subscription {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.insert(id, handler.clone());

        handler(&self.state());

        Subscription {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    async fn logout(&self) {
        if let Some(user) = self.state.read().user.as_ref() {
            info!("Signing out {}", user.email);
        }
        self.set_state(AuthState::default());
    }
}
