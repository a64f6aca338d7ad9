use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::backend::{BackendError, BackendResult, ClientQuery, ClientStore};
use crate::models::{Client, ClientPatch, NewClient, OnboardingStage, Session};

const CLIENT_COLUMNS: &str = "id, name, email, phone, status, onboarding_stage, user_id, created_at";

/// Direct connection to the backend's Postgres database
pub struct Database {
    pool: PgPool,
}

#[derive(sqlx::FromRow, Debug)]
struct ClientRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    status: String,
    onboarding_stage: Option<String>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<ClientRow> for Client {
    type Error = BackendError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(Client {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            status: row.status.parse()?,
            onboarding_stage: row
                .onboarding_stage
                .as_deref()
                .map(str::parse::<OnboardingStage>)
                .transpose()?
                .unwrap_or_default(),
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

fn into_clients(rows: Vec<ClientRow>) -> BackendResult<Vec<Client>> {
    rows.into_iter().map(Client::try_from).collect()
}

impl Database {
    /// Create a new Database instance with a connection pool
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema under `migrations/`
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(self.get_pool()).await?;
        Ok(())
    }
}

// The session is unused here: the connection role bypasses row-level
// security, so the owner filter below is the only scoping.
#[async_trait]
impl ClientStore for Database {
    async fn insert(&self, _session: &Session, client: &NewClient) -> BackendResult<Client> {
        let sql = format!(
            r#"
            INSERT INTO clients (name, email, phone, status, onboarding_stage, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CLIENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(&client.name)
            .bind(&client.email)
            .bind(&client.phone)
            .bind(client.status.label())
            .bind(client.onboarding_stage.label())
            .bind(client.user_id)
            .fetch_one(self.get_pool())
            .await?;

        Client::try_from(row)
    }

    async fn list(&self, _session: &Session, query: ClientQuery) -> BackendResult<Vec<Client>> {
        let sql = format!(
            r#"
            SELECT {CLIENT_COLUMNS}
            FROM clients
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#
        );
        let rows = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(query.owner)
            .bind(query.status.map(|s| s.label()))
            .fetch_all(self.get_pool())
            .await?;

        into_clients(rows)
    }

    async fn get(&self, _session: &Session, id: Uuid, owner: Option<Uuid>) -> BackendResult<Option<Client>> {
        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)"
        );
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(self.get_pool())
            .await?;

        row.map(Client::try_from).transpose()
    }

    async fn update(
        &self,
        _session: &Session,
        id: Uuid,
        owner: Option<Uuid>,
        patch: &ClientPatch,
    ) -> BackendResult<Client> {
        let sql = format!(
            r#"
            UPDATE clients
            SET status = COALESCE($1, status),
                onboarding_stage = COALESCE($2, onboarding_stage)
            WHERE id = $3 AND ($4::uuid IS NULL OR user_id = $4)
            RETURNING {CLIENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(patch.status.map(|s| s.label()))
            .bind(patch.onboarding_stage.map(|s| s.label()))
            .bind(id)
            .bind(owner)
            .fetch_optional(self.get_pool())
            .await?;

        row.map(Client::try_from)
            .transpose()?
            .ok_or(BackendError::NotFound(id))
    }

    async fn delete(&self, _session: &Session, id: Uuid, owner: Option<Uuid>) -> BackendResult<()> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)")
            .bind(id)
            .bind(owner)
            .execute(self.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound(id));
        }
        Ok(())
    }
}

/// Initialize the database connection pool
pub async fn init(database_url: &str) -> Result<Database> {
    Database::new(database_url).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientStatus;

    fn row(status: &str, stage: Option<&str>) -> ClientRow {
        ClientRow {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            email: "ops@acme.test".into(),
            phone: None,
            status: status.into(),
            onboarding_stage: stage.map(str::to_string),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn converts_stored_labels() {
        let client = Client::try_from(row("Blocked", Some("Testing"))).unwrap();
        assert_eq!(client.status, ClientStatus::Blocked);
        assert_eq!(client.onboarding_stage, OnboardingStage::Testing);
    }

    #[test]
    fn null_stage_reads_as_docs() {
        let client = Client::try_from(row("Completed", None)).unwrap();
        assert_eq!(client.onboarding_stage, OnboardingStage::Docs);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = Client::try_from(row("Archived", None)).unwrap_err();
        assert!(matches!(err, BackendError::InvalidRecord(_)));
    }
}
