//! Hosted backend over HTTP: a PostgREST-style table API under `/rest/v1`
//! and a token-based identity API under `/auth/v1`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, TimeZone, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{BackendError, BackendResult, ClientQuery, ClientStore, Identity, SignUpOutcome};
use crate::config::Config;
use crate::models::{Client, ClientPatch, NewClient, Session, User};

const CLIENTS_TABLE: &str = "clients";

pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> BackendResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> BackendResult<Self> {
        Self::new(
            config.backend_url(),
            &config.backend_anon_key,
            config.request_timeout(),
        )
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, CLIENTS_TABLE)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    // Anonymous calls authenticate with the anon key itself.
    fn request(&self, method: Method, url: String, access_token: Option<&str>) -> RequestBuilder {
        let bearer = access_token.unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn table_request(&self, method: Method, session: &Session, filters: &[(String, String)]) -> RequestBuilder {
        self.request(method, self.table_url(), Some(&session.access_token))
            .query(filters)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> BackendResult<Session> {
        let response = self
            .request(Method::POST, self.auth_url("token"), None)
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = decode(response).await?;
        token.into_session()
    }
}

fn row_filters(id: Uuid, owner: Option<Uuid>) -> Vec<(String, String)> {
    let mut filters = vec![("id".to_string(), format!("eq.{id}"))];
    if let Some(owner) = owner {
        filters.push(("user_id".to_string(), format!("eq.{owner}")));
    }
    filters
}

fn select_filters(query: ClientQuery) -> Vec<(String, String)> {
    let mut filters = vec![
        ("select".to_string(), "*".to_string()),
        ("order".to_string(), "created_at.desc".to_string()),
    ];
    if let Some(owner) = query.owner {
        filters.push(("user_id".to_string(), format!("eq.{owner}")));
    }
    if let Some(status) = query.status {
        filters.push(("status".to_string(), format!("eq.{}", status.label())));
    }
    filters
}

/// Error body shapes of both APIs folded together.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

async fn check(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text
            }
        });

    Err(BackendError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let response = check(response).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| BackendError::UnexpectedResponse(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> BackendResult<Session> {
        let expires_at = match self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        {
            Some(at) => at,
            None => TimeDelta::try_seconds(self.expires_in)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .ok_or_else(|| {
                    BackendError::UnexpectedResponse(format!("token lifetime out of range: {}s", self.expires_in))
                })?,
        };

        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

#[async_trait]
impl ClientStore for RestBackend {
    async fn insert(&self, session: &Session, client: &NewClient) -> BackendResult<Client> {
        let response = self
            .table_request(Method::POST, session, &[])
            .header("Prefer", "return=representation")
            .json(&[client])
            .send()
            .await?;

        let rows: Vec<Client> = decode(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::UnexpectedResponse("insert returned no rows".into()))
    }

    async fn list(&self, session: &Session, query: ClientQuery) -> BackendResult<Vec<Client>> {
        let response = self
            .table_request(Method::GET, session, &select_filters(query))
            .send()
            .await?;

        let rows: Vec<Client> = decode(response).await?;
        debug!(count = rows.len(), "fetched clients");
        Ok(rows)
    }

    async fn get(&self, session: &Session, id: Uuid, owner: Option<Uuid>) -> BackendResult<Option<Client>> {
        let mut filters = vec![("select".to_string(), "*".to_string())];
        filters.extend(row_filters(id, owner));

        let response = self
            .table_request(Method::GET, session, &filters)
            .send()
            .await?;

        let rows: Vec<Client> = decode(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn update(
        &self,
        session: &Session,
        id: Uuid,
        owner: Option<Uuid>,
        patch: &ClientPatch,
    ) -> BackendResult<Client> {
        let response = self
            .table_request(Method::PATCH, session, &row_filters(id, owner))
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;

        let rows: Vec<Client> = decode(response).await?;
        rows.into_iter().next().ok_or(BackendError::NotFound(id))
    }

    async fn delete(&self, session: &Session, id: Uuid, owner: Option<Uuid>) -> BackendResult<()> {
        let response = self
            .table_request(Method::DELETE, session, &row_filters(id, owner))
            .header("Prefer", "return=representation")
            .send()
            .await?;

        let rows: Vec<Client> = decode(response).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl Identity for RestBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<SignUpOutcome> {
        let response = self
            .request(Method::POST, self.auth_url("signup"), None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        match decode::<SignUpResponse>(response).await? {
            SignUpResponse::Session(token) => Ok(SignUpOutcome::SignedIn(token.into_session()?)),
            SignUpResponse::User(user) => Ok(SignUpOutcome::ConfirmationRequired {
                email: user.email.unwrap_or_else(|| email.to_string()),
            }),
        }
    }

    async fn send_magic_link(&self, email: &str) -> BackendResult<()> {
        let response = self
            .request(Method::POST, self.auth_url("otp"), None)
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    async fn verify_email_code(&self, email: &str, code: &str) -> BackendResult<Session> {
        let response = self
            .request(Method::POST, self.auth_url("verify"), None)
            .json(&json!({ "type": "email", "email": email, "token": code }))
            .send()
            .await?;

        let token: TokenResponse = decode(response).await?;
        token.into_session()
    }

    async fn refresh(&self, refresh_token: &str) -> BackendResult<Session> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<User> {
        let response = self
            .request(Method::GET, self.auth_url("user"), Some(access_token))
            .send()
            .await?;

        decode(response).await
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        let response = self
            .request(Method::POST, self.auth_url("logout"), Some(access_token))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    async fn update_user_metadata(
        &self,
        access_token: &str,
        metadata: Map<String, Value>,
    ) -> BackendResult<User> {
        let response = self
            .request(Method::PUT, self.auth_url("user"), Some(access_token))
            .json(&json!({ "data": metadata }))
            .send()
            .await?;

        decode(response).await
    }
}
