//! Session gate: keeps the signed-in session on disk between runs and hands
//! out a current, unexpired session on request.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::backend::{Identity, SignUpOutcome};
use crate::models::{Session, WorkspaceProfile};

/// JSON file holding the last signed-in session.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<Session>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let session = serde_json::from_str(&raw)
            .with_context(|| format!("session file {} is corrupt", self.path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(session)?)
            .with_context(|| format!("writing {}", self.path.display()))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

pub struct SessionManager {
    identity: Arc<dyn Identity>,
    file: SessionFile,
}

impl SessionManager {
    pub fn new(identity: Arc<dyn Identity>, file: SessionFile) -> Self {
        Self { identity, file }
    }

    /// The stored session, refreshed first if its access token has expired.
    /// A session that is unreadable or can no longer be refreshed is discarded.
    pub async fn current(&self) -> Result<Option<Session>> {
        let session = match self.file.load() {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(error = %format!("{:#}", err), "stored session is unreadable; signing out");
                self.file.clear()?;
                return Ok(None);
            }
        };

        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        match self.identity.refresh(&session.refresh_token).await {
            Ok(fresh) => {
                info!(user = %fresh.user.id, "refreshed expired session");
                self.file.save(&fresh)?;
                Ok(Some(fresh))
            }
            Err(err) => {
                warn!(error = %err, "stored session could not be refreshed; signing out");
                self.file.clear()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.identity.sign_in_with_password(email, password).await?;
        self.remember(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let outcome = self.identity.sign_up(email, password).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.file.save(session)?;
            info!(user = %session.user.id, "signed up");
        }
        Ok(outcome)
    }

    pub async fn send_magic_link(&self, email: &str) -> Result<()> {
        self.identity.send_magic_link(email).await?;
        info!("sign-in code sent");
        Ok(())
    }

    pub async fn verify_email_code(&self, email: &str, code: &str) -> Result<Session> {
        let session = self.identity.verify_email_code(email, code.trim()).await?;
        self.remember(session)
    }

    /// Always forgets the local session, even when the backend call fails.
    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        if let Err(err) = self.identity.sign_out(&session.access_token).await {
            warn!(error = %err, "backend sign-out failed");
        }
        self.file.clear()?;
        info!(user = %session.user.id, "signed out");
        Ok(())
    }

    /// Writes workspace metadata and returns the session carrying the updated user.
    pub async fn update_workspace(&self, session: &Session, profile: &WorkspaceProfile) -> Result<Session> {
        let user = self
            .identity
            .update_user_metadata(&session.access_token, profile.to_metadata())
            .await?;

        let updated = Session {
            user,
            ..session.clone()
        };
        self.file.save(&updated)?;
        Ok(updated)
    }

    fn remember(&self, session: Session) -> Result<Session> {
        self.file.save(&session)?;
        info!(user = %session.user.id, "signed in");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> (Arc<MemoryBackend>, SessionManager) {
        let backend = Arc::new(MemoryBackend::new());
        let file = SessionFile::new(dir.path().join("session.json"));
        let manager = SessionManager::new(backend.clone(), file);
        (backend, manager)
    }

    #[test]
    fn missing_file_means_no_session() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path().join("absent.json"));
        assert!(file.load().unwrap().is_none());
        file.clear().unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_discarded() {
        let dir = TempDir::new().unwrap();
        let (_backend, manager) = manager(&dir);
        fs::write(&manager.file.path, r#"{"access_token": "trunc"#).unwrap();
        assert!(manager.file.load().is_err());

        assert!(manager.current().await.unwrap().is_none());
        assert!(!manager.file.path.exists());
    }

    #[tokio::test]
    async fn sign_in_persists_session() {
        let dir = TempDir::new().unwrap();
        let (backend, manager) = manager(&dir);
        backend.register("founder@example.com", "hunter22");

        let session = manager
            .sign_in_with_password("founder@example.com", "hunter22")
            .await
            .unwrap();

        assert_eq!(manager.current().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_and_saved() {
        let dir = TempDir::new().unwrap();
        let (backend, manager) = manager(&dir);
        let live = backend.register("founder@example.com", "hunter22");
        manager.file.save(&backend.expired_session(&live)).unwrap();

        let current = manager.current().await.unwrap().unwrap();

        assert_ne!(current.access_token, live.access_token);
        assert_eq!(current.user.id, live.user.id);
        assert!(!current.is_expired(Utc::now()));
        assert_eq!(manager.file.load().unwrap(), Some(current));
    }

    #[tokio::test]
    async fn unrefreshable_session_is_cleared() {
        let dir = TempDir::new().unwrap();
        let (backend, manager) = manager(&dir);
        let live = backend.register("founder@example.com", "hunter22");
        let mut stale = backend.expired_session(&live);
        stale.refresh_token = "revoked".into();
        manager.file.save(&stale).unwrap();

        assert!(manager.current().await.unwrap().is_none());
        assert!(!manager.file.path.exists());
    }

    #[tokio::test]
    async fn sign_out_forgets_session() {
        let dir = TempDir::new().unwrap();
        let (backend, manager) = manager(&dir);
        backend.register("founder@example.com", "hunter22");
        let session = manager
            .sign_in_with_password("founder@example.com", "hunter22")
            .await
            .unwrap();

        manager.sign_out(&session).await.unwrap();
        assert!(manager.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn magic_link_code_signs_in() {
        let dir = TempDir::new().unwrap();
        let (backend, manager) = manager(&dir);
        backend.register("founder@example.com", "unused");

        manager.send_magic_link("founder@example.com").await.unwrap();
        assert!(manager.verify_email_code("founder@example.com", "000000").await.is_err());
        let session = manager
            .verify_email_code("founder@example.com", " 123456 ")
            .await
            .unwrap();

        assert_eq!(manager.current().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn workspace_update_lands_in_stored_session() {
        let dir = TempDir::new().unwrap();
        let (backend, manager) = manager(&dir);
        backend.register("founder@example.com", "hunter22");
        let session = manager
            .sign_in_with_password("founder@example.com", "hunter22")
            .await
            .unwrap();

        let profile = WorkspaceProfile {
            workspace_name: Some("Prism Creative".into()),
            onboarding_complete: true,
            bottleneck_focus: Some("Technical Setup".into()),
            client_volume: Some("6-15".into()),
        };
        let updated = manager.update_workspace(&session, &profile).await.unwrap();

        assert_eq!(updated.user.workspace(), profile);
        let stored = manager.current().await.unwrap().unwrap();
        assert_eq!(stored.user.workspace().display_name(), "Prism Creative");
    }
}
