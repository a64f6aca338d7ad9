//! Data-access boundary to the hosted backend.
//!
//! Everything the application persists goes through one of two traits:
//! [`ClientStore`] for the `clients` table and [`Identity`] for accounts,
//! sessions and user metadata. The REST implementation talks to the hosted
//! service; `crate::db` offers a direct Postgres store for the table.

pub mod rest;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Client, ClientPatch, ClientStatus, NewClient, ParseLabelError, Session, User};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("could not reach backend: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("client {0} not found")]
    NotFound(Uuid),

    #[error("unexpected backend response: {0}")]
    UnexpectedResponse(String),

    #[error("not signed in")]
    Unauthenticated,

    #[error("invalid client record: {0}")]
    InvalidRecord(#[from] ParseLabelError),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Row filter for `select`. Results are always newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClientQuery {
    pub owner: Option<Uuid>,
    pub status: Option<ClientStatus>,
}

impl ClientQuery {
    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            status: None,
        }
    }

    pub fn with_status(mut self, status: ClientStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Table-oriented CRUD over the `clients` resource.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn insert(&self, session: &Session, client: &NewClient) -> BackendResult<Client>;

    async fn list(&self, session: &Session, query: ClientQuery) -> BackendResult<Vec<Client>>;

    async fn get(&self, session: &Session, id: Uuid, owner: Option<Uuid>) -> BackendResult<Option<Client>>;

    /// Fails with [`BackendError::NotFound`] when no row matched.
    async fn update(
        &self,
        session: &Session,
        id: Uuid,
        owner: Option<Uuid>,
        patch: &ClientPatch,
    ) -> BackendResult<Client>;

    /// Fails with [`BackendError::NotFound`] when no row matched.
    async fn delete(&self, session: &Session, id: Uuid, owner: Option<Uuid>) -> BackendResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// The backend sent a confirmation mail; no session yet.
    ConfirmationRequired { email: String },
}

/// Identity service of the hosted backend.
#[async_trait]
pub trait Identity: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session>;

    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<SignUpOutcome>;

    /// Sends a one-time sign-in code (and link) to `email`.
    async fn send_magic_link(&self, email: &str) -> BackendResult<()>;

    async fn verify_email_code(&self, email: &str, code: &str) -> BackendResult<Session>;

    async fn refresh(&self, refresh_token: &str) -> BackendResult<Session>;

    async fn get_user(&self, access_token: &str) -> BackendResult<User>;

    async fn sign_out(&self, access_token: &str) -> BackendResult<()>;

    async fn update_user_metadata(
        &self,
        access_token: &str,
        metadata: Map<String, Value>,
    ) -> BackendResult<User>;
}
