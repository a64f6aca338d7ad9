use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{ClientQuery, ClientStore};
use crate::events::{RefreshBus, RefreshEvent};
use crate::models::{Client, ClientDraft, ClientPatch, ClientStatus, OnboardingStage, Session};
use crate::session::SessionManager;

/// Client operations for one signed-in user. Each write is a single backend
/// request; on success the refresh bus is told, on failure nothing changes.
#[derive(Clone)]
pub struct Tracker {
    store: Arc<dyn ClientStore>,
    session: Session,
    bus: RefreshBus,
}

impl Tracker {
    pub fn new(store: Arc<dyn ClientStore>, session: Session, bus: RefreshBus) -> Self {
        Self { store, session, bus }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    pub fn bus(&self) -> &RefreshBus {
        &self.bus
    }

    /// Picks up the current stored session, refreshing an expired access
    /// token. Returns false once there is no session left to resume.
    pub async fn resume(&mut self, sessions: &SessionManager) -> Result<bool> {
        match sessions.current().await? {
            Some(session) => {
                if session.access_token != self.session.access_token {
                    debug!(user = %session.user.id, "resumed with a fresh access token");
                }
                self.session = session;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn owner(&self) -> Uuid {
        self.session.user_id()
    }

    /// All of the user's clients, newest first.
    pub async fn clients(&self) -> Result<Vec<Client>> {
        Ok(self
            .store
            .list(&self.session, ClientQuery::owned_by(self.owner()))
            .await?)
    }

    pub async fn clients_with_status(&self, status: ClientStatus) -> Result<Vec<Client>> {
        let query = ClientQuery::owned_by(self.owner()).with_status(status);
        Ok(self.store.list(&self.session, query).await?)
    }

    pub async fn blocked_clients(&self) -> Result<Vec<Client>> {
        self.clients_with_status(ClientStatus::Blocked).await
    }

    pub async fn client(&self, id: Uuid) -> Result<Option<Client>> {
        Ok(self.store.get(&self.session, id, Some(self.owner())).await?)
    }

    pub async fn add_client(&self, draft: ClientDraft) -> Result<Client> {
        if !draft.is_valid() {
            return Err(anyhow!("a client needs both a name and an email"));
        }

        let row = draft.owned_by(self.owner());
        let client = self.store.insert(&self.session, &row).await?;
        info!(client = %client.id, name = %client.name, "added client");
        self.bus.emit(RefreshEvent::ClientsChanged);
        Ok(client)
    }

    pub async fn set_status(&self, id: Uuid, status: ClientStatus) -> Result<Client> {
        let client = self.update(id, ClientPatch::status(status)).await?;
        info!(client = %id, status = %status, "status changed");
        Ok(client)
    }

    pub async fn set_stage(&self, id: Uuid, stage: OnboardingStage) -> Result<Client> {
        let client = self.update(id, ClientPatch::stage(stage)).await?;
        info!(client = %id, stage = %stage, "onboarding stage changed");
        Ok(client)
    }

    pub async fn delete_client(&self, id: Uuid) -> Result<()> {
        self.store
            .delete(&self.session, id, Some(self.owner()))
            .await?;
        info!(client = %id, "deleted client");
        self.bus.emit(RefreshEvent::ClientsChanged);
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: ClientPatch) -> Result<Client> {
        let client = self
            .store
            .update(&self.session, id, Some(self.owner()), &patch)
            .await?;
        self.bus.emit(RefreshEvent::ClientsChanged);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::session::SessionFile;
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;

    fn tracker_for(backend: &Arc<MemoryBackend>, email: &str) -> Tracker {
        let session = backend.register(email, "hunter22");
        Tracker::new(backend.clone(), session, RefreshBus::new())
    }

    fn draft(name: &str) -> ClientDraft {
        ClientDraft {
            name: name.into(),
            email: format!("{}@clients.test", name.to_lowercase()),
            ..ClientDraft::default()
        }
    }

    #[tokio::test]
    async fn adding_a_client_creates_one_row_owned_by_the_user() {
        let backend = Arc::new(MemoryBackend::new());
        let tracker = tracker_for(&backend, "founder@example.com");

        let client = tracker.add_client(draft("Acme")).await.unwrap();

        assert_eq!(backend.client_count(), 1);
        assert_eq!(client.user_id, tracker.session().user.id);
        assert_eq!(client.status, ClientStatus::InProgress);
        assert_eq!(client.onboarding_stage, OnboardingStage::Docs);
    }

    #[tokio::test]
    async fn missing_required_fields_never_reach_the_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let tracker = tracker_for(&backend, "founder@example.com");

        let mut incomplete = draft("Acme");
        incomplete.email.clear();
        assert!(tracker.add_client(incomplete).await.is_err());
        assert_eq!(backend.client_count(), 0);
    }

    #[tokio::test]
    async fn clients_come_back_newest_first() {
        let backend = Arc::new(MemoryBackend::new());
        let tracker = tracker_for(&backend, "founder@example.com");
        for name in ["First", "Second", "Third"] {
            tracker.add_client(draft(name)).await.unwrap();
        }

        let names: Vec<String> = tracker
            .clients()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Third", "Second", "First"]);
    }

    #[tokio::test]
    async fn users_only_see_their_own_clients() {
        let backend = Arc::new(MemoryBackend::new());
        let alice = tracker_for(&backend, "alice@example.com");
        let bob = tracker_for(&backend, "bob@example.com");

        let acme = alice.add_client(draft("Acme")).await.unwrap();
        bob.add_client(draft("Globex")).await.unwrap();

        assert_eq!(alice.clients().await.unwrap().len(), 1);
        assert!(bob.client(acme.id).await.unwrap().is_none());
        assert!(bob.delete_client(acme.id).await.is_err());
        assert_eq!(backend.client_count(), 2);
    }

    #[tokio::test]
    async fn every_successful_write_emits_exactly_one_event() {
        let backend = Arc::new(MemoryBackend::new());
        let tracker = tracker_for(&backend, "founder@example.com");
        let mut receiver = tracker.bus().raw_subscribe();

        let acme = tracker.add_client(draft("Acme")).await.unwrap();
        assert_eq!(receiver.try_recv(), Ok(RefreshEvent::ClientsChanged));
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));

        tracker.set_status(acme.id, ClientStatus::Blocked).await.unwrap();
        assert_eq!(receiver.try_recv(), Ok(RefreshEvent::ClientsChanged));
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));

        tracker.set_stage(acme.id, OnboardingStage::Live).await.unwrap();
        assert_eq!(receiver.try_recv(), Ok(RefreshEvent::ClientsChanged));
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));

        tracker.delete_client(acme.id).await.unwrap();
        assert_eq!(receiver.try_recv(), Ok(RefreshEvent::ClientsChanged));
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));

        tracker.clients().await.unwrap();
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn status_filter_is_applied_by_the_store() {
        let backend = Arc::new(MemoryBackend::new());
        let tracker = tracker_for(&backend, "founder@example.com");
        let acme = tracker.add_client(draft("Acme")).await.unwrap();
        tracker.add_client(draft("Globex")).await.unwrap();
        tracker.set_status(acme.id, ClientStatus::Completed).await.unwrap();

        let completed = tracker.clients_with_status(ClientStatus::Completed).await.unwrap();
        let in_progress = tracker.clients_with_status(ClientStatus::InProgress).await.unwrap();

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, acme.id);
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].name, "Globex");
    }

    #[tokio::test]
    async fn resume_refreshes_an_expired_access_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let backend = Arc::new(MemoryBackend::new());
        let live = backend.register("founder@example.com", "hunter22");
        let stale = backend.expired_session(&live);
        SessionFile::new(&path).save(&stale).unwrap();
        let sessions = SessionManager::new(backend.clone(), SessionFile::new(&path));

        let mut tracker = Tracker::new(backend.clone(), stale, RefreshBus::new());
        assert!(tracker.clients().await.is_err());

        assert!(tracker.resume(&sessions).await.unwrap());
        assert_ne!(tracker.session().access_token, live.access_token);
        assert!(tracker.clients().await.unwrap().is_empty());
        tracker.add_client(draft("Acme")).await.unwrap();
    }

    #[tokio::test]
    async fn resume_reports_when_the_session_is_gone() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let live = backend.register("founder@example.com", "hunter22");
        let sessions = SessionManager::new(backend.clone(), SessionFile::new(dir.path().join("session.json")));

        let mut tracker = Tracker::new(backend.clone(), live, RefreshBus::new());
        assert!(!tracker.resume(&sessions).await.unwrap());
    }

    #[tokio::test]
    async fn status_and_stage_updates_emit_one_refresh_each() {
        let backend = Arc::new(MemoryBackend::new());
        let tracker = tracker_for(&backend, "founder@example.com");
        let acme = tracker.add_client(draft("Acme")).await.unwrap();
        let mut listener = tracker.bus().subscribe();

        let blocked = tracker.set_status(acme.id, ClientStatus::Blocked).await.unwrap();
        assert_eq!(blocked.status, ClientStatus::Blocked);
        assert!(listener.pending());

        let setup = tracker.set_stage(acme.id, OnboardingStage::Setup).await.unwrap();
        assert_eq!(setup.onboarding_stage, OnboardingStage::Setup);
        assert_eq!(setup.status, ClientStatus::Blocked);
        assert!(listener.pending());

        let blocked = tracker.blocked_clients().await.unwrap();
        assert_eq!(blocked.len(), 1);
    }

    #[tokio::test]
    async fn failed_writes_emit_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let tracker = tracker_for(&backend, "founder@example.com");
        let acme = tracker.add_client(draft("Acme")).await.unwrap();
        let mut listener = tracker.bus().subscribe();
        backend.fail_writes();

        assert!(tracker.set_status(acme.id, ClientStatus::Completed).await.is_err());
        assert!(tracker.delete_client(acme.id).await.is_err());
        assert!(!listener.pending());

        let stored = tracker.client(acme.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ClientStatus::InProgress);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let backend = Arc::new(MemoryBackend::new());
        let tracker = tracker_for(&backend, "founder@example.com");
        let acme = tracker.add_client(draft("Acme")).await.unwrap();

        tracker.delete_client(acme.id).await.unwrap();
        assert!(tracker.clients().await.unwrap().is_empty());
    }
}
