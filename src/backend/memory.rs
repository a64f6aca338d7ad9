//! In-process stand-in for the hosted backend, used by tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{BackendError, BackendResult, ClientQuery, ClientStore, Identity, SignUpOutcome};
use crate::models::{Client, ClientPatch, NewClient, Session, User};

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    users: Vec<(User, String)>,
    sessions: Vec<Session>,
    inserts: i64,
    fail_writes: bool,
}

pub struct MemoryBackend {
    tables: Mutex<Tables>,
    epoch: DateTime<Utc>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            epoch: Utc::now(),
        }
    }

    /// Makes every subsequent table write fail with an API error.
    pub fn fail_writes(&self) {
        self.tables.lock().unwrap().fail_writes = true;
    }

    pub fn client_count(&self) -> usize {
        self.tables.lock().unwrap().clients.len()
    }

    /// Registers a user and returns a live session for them.
    pub fn register(&self, email: &str, password: &str) -> Session {
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: Map::new(),
        };
        let mut tables = self.tables.lock().unwrap();
        tables.users.push((user.clone(), password.to_string()));
        Self::issue(&mut tables, user, Duration::hours(1))
    }

    /// Expires the session's access token here and returns the client-side copy.
    pub fn expired_session(&self, session: &Session) -> Session {
        let expires_at = Utc::now() - Duration::minutes(5);
        let mut tables = self.tables.lock().unwrap();
        for issued in tables.sessions.iter_mut() {
            if issued.access_token == session.access_token {
                issued.expires_at = expires_at;
            }
        }
        Session {
            expires_at,
            ..session.clone()
        }
    }

    fn issue(tables: &mut Tables, user: User, ttl: Duration) -> Session {
        let session = Session {
            access_token: format!("access-{}", Uuid::new_v4()),
            refresh_token: format!("refresh-{}", Uuid::new_v4()),
            expires_at: Utc::now() + ttl,
            user,
        };
        tables.sessions.push(session.clone());
        session
    }

    fn check_write(tables: &Tables) -> BackendResult<()> {
        if tables.fail_writes {
            return Err(BackendError::Api {
                status: 503,
                message: "backend unavailable".into(),
            });
        }
        Ok(())
    }

    fn authorize(tables: &Tables, session: &Session) -> BackendResult<()> {
        let live = tables
            .sessions
            .iter()
            .any(|s| s.access_token == session.access_token && s.expires_at > Utc::now());
        if !live {
            return Err(BackendError::Api {
                status: 401,
                message: "JWT expired".into(),
            });
        }
        Ok(())
    }

    // Row-level policy: a session only ever sees its own user's rows.
    fn visible(client: &Client, session: &Session, owner: Option<Uuid>) -> bool {
        client.user_id == session.user.id && owner.is_none_or(|o| o == client.user_id)
    }
}

#[async_trait]
impl ClientStore for MemoryBackend {
    async fn insert(&self, session: &Session, client: &NewClient) -> BackendResult<Client> {
        let mut tables = self.tables.lock().unwrap();
        Self::authorize(&tables, session)?;
        Self::check_write(&tables)?;
        if client.user_id != session.user.id {
            return Err(BackendError::Api {
                status: 403,
                message: "new row violates row-level security policy".into(),
            });
        }

        tables.inserts += 1;
        let row = Client {
            id: Uuid::new_v4(),
            name: client.name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            status: client.status,
            onboarding_stage: client.onboarding_stage,
            user_id: client.user_id,
            created_at: self.epoch + Duration::seconds(tables.inserts),
        };
        tables.clients.push(row.clone());
        Ok(row)
    }

    async fn list(&self, session: &Session, query: ClientQuery) -> BackendResult<Vec<Client>> {
        let tables = self.tables.lock().unwrap();
        Self::authorize(&tables, session)?;
        let mut rows: Vec<Client> = tables
            .clients
            .iter()
            .filter(|c| Self::visible(c, session, query.owner))
            .filter(|c| query.status.is_none_or(|s| s == c.status))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get(&self, session: &Session, id: Uuid, owner: Option<Uuid>) -> BackendResult<Option<Client>> {
        let tables = self.tables.lock().unwrap();
        Self::authorize(&tables, session)?;
        Ok(tables
            .clients
            .iter()
            .find(|c| c.id == id && Self::visible(c, session, owner))
            .cloned())
    }

    async fn update(
        &self,
        session: &Session,
        id: Uuid,
        owner: Option<Uuid>,
        patch: &ClientPatch,
    ) -> BackendResult<Client> {
        let mut tables = self.tables.lock().unwrap();
        Self::authorize(&tables, session)?;
        Self::check_write(&tables)?;
        let client = tables
            .clients
            .iter_mut()
            .find(|c| c.id == id && Self::visible(c, session, owner))
            .ok_or(BackendError::NotFound(id))?;
        patch.apply_to(client);
        Ok(client.clone())
    }

    async fn delete(&self, session: &Session, id: Uuid, owner: Option<Uuid>) -> BackendResult<()> {
        let mut tables = self.tables.lock().unwrap();
        Self::authorize(&tables, session)?;
        Self::check_write(&tables)?;
        let before = tables.clients.len();
        tables
            .clients
            .retain(|c| !(c.id == id && Self::visible(c, session, owner)));
        if tables.clients.len() == before {
            return Err(BackendError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl Identity for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let mut tables = self.tables.lock().unwrap();
        let user = tables
            .users
            .iter()
            .find(|(u, p)| u.email.as_deref() == Some(email) && p == password)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| BackendError::Api {
                status: 400,
                message: "Invalid login credentials".into(),
            })?;
        Ok(Self::issue(&mut tables, user, Duration::hours(1)))
    }

    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<SignUpOutcome> {
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: Map::new(),
        };
        let mut tables = self.tables.lock().unwrap();
        tables.users.push((user.clone(), password.to_string()));
        Ok(SignUpOutcome::SignedIn(Self::issue(&mut tables, user, Duration::hours(1))))
    }

    async fn send_magic_link(&self, _email: &str) -> BackendResult<()> {
        Ok(())
    }

    async fn verify_email_code(&self, email: &str, code: &str) -> BackendResult<Session> {
        if code != "123456" {
            return Err(BackendError::Api {
                status: 403,
                message: "Token has expired or is invalid".into(),
            });
        }
        let mut tables = self.tables.lock().unwrap();
        let user = tables
            .users
            .iter()
            .find(|(u, _)| u.email.as_deref() == Some(email))
            .map(|(u, _)| u.clone())
            .ok_or(BackendError::Unauthenticated)?;
        Ok(Self::issue(&mut tables, user, Duration::hours(1)))
    }

    async fn refresh(&self, refresh_token: &str) -> BackendResult<Session> {
        let mut tables = self.tables.lock().unwrap();
        let position = tables
            .sessions
            .iter()
            .position(|s| s.refresh_token == refresh_token)
            .ok_or_else(|| BackendError::Api {
                status: 400,
                message: "Invalid Refresh Token".into(),
            })?;
        // Refresh tokens are single use.
        let old = tables.sessions.remove(position);
        Ok(Self::issue(&mut tables, old.user, Duration::hours(1)))
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<User> {
        let tables = self.tables.lock().unwrap();
        tables
            .sessions
            .iter()
            .find(|s| s.access_token == access_token)
            .map(|s| s.user.clone())
            .ok_or(BackendError::Unauthenticated)
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.sessions.retain(|s| s.access_token != access_token);
        Ok(())
    }

    async fn update_user_metadata(
        &self,
        access_token: &str,
        metadata: Map<String, Value>,
    ) -> BackendResult<User> {
        let mut tables = self.tables.lock().unwrap();
        let user_id = tables
            .sessions
            .iter()
            .find(|s| s.access_token == access_token)
            .map(|s| s.user.id)
            .ok_or(BackendError::Unauthenticated)?;

        let (user, _) = tables
            .users
            .iter_mut()
            .find(|(u, _)| u.id == user_id)
            .ok_or(BackendError::Unauthenticated)?;
        user.user_metadata.extend(metadata);
        Ok(user.clone())
    }
}
