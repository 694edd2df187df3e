//! HTTP implementation of the backend gateway.
//!
//! Talks to the hosted backend over its three REST surfaces: the identity
//! provider under `auth/v1`, row-level table access under `rest/v1`, and
//! object storage under `storage/v1`. Auth tokens are held in memory and
//! mirrored to a local file so a restarted process can resume its session.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::{OnceCell, RwLock, broadcast};
use tracing::{debug, instrument, warn};

use velour_core::{Email, OrderId, OrderStatus, UserId};

use super::wire::{
    NewOrderItemRecord, NewOrderRecord, NewUserRecord, OrderRecord, UserRecord, UserUpdate,
};
use super::{AuthEvent, AuthSession, BackendError, ShopBackend};
use crate::config::BackendConfig;
use async_trait::async_trait;

/// Storage bucket holding avatar uploads.
const AVATAR_BUCKET: &str = "avatars";

/// Capacity of the auth-event channel.
const AUTH_EVENT_CAPACITY: usize = 16;

/// File the client mirrors its tokens to, inside the configured state dir.
const AUTH_TOKEN_FILE: &str = "velour-auth.json";

/// HTTP client for the hosted backend.
///
/// Cheaply cloneable; all clones share one session and one auth-event
/// channel.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base: String,
    auth_path: PathBuf,
    session: RwLock<Option<AuthSession>>,
    session_loaded: OnceCell<()>,
    events_tx: broadcast::Sender<AuthEvent>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the anon key
    /// is not a valid header value.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let anon_key = config.anon_key.expose_secret();

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(anon_key)
                .map_err(|e| BackendError::Parse(format!("Invalid anon key format: {e}")))?,
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {anon_key}"))
                .map_err(|e| BackendError::Parse(format!("Invalid anon key format: {e}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        let (events_tx, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base: config.backend_url.as_str().trim_end_matches('/').to_string(),
                auth_path: config.state_dir.join(AUTH_TOKEN_FILE),
                session: RwLock::new(None),
                session_loaded: OnceCell::new(),
                events_tx,
            }),
        })
    }

    // =========================================================================
    // Session bookkeeping
    // =========================================================================

    /// Load persisted tokens from disk, once per client.
    async fn ensure_session_loaded(&self) {
        self.inner
            .session_loaded
            .get_or_init(|| async {
                match tokio::fs::read_to_string(&self.inner.auth_path).await {
                    Ok(raw) => match serde_json::from_str::<AuthSession>(&raw) {
                        Ok(session) => {
                            debug!(user_id = %session.user_id, "restored persisted auth tokens");
                            *self.inner.session.write().await = Some(session);
                        }
                        Err(e) => {
                            warn!(error = %e, "persisted auth tokens unreadable; starting signed out");
                        }
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(error = %e, "could not read persisted auth tokens");
                    }
                }
            })
            .await;
    }

    /// Install a session in memory and mirror it to disk.
    async fn store_session(&self, session: AuthSession) {
        *self.inner.session.write().await = Some(session.clone());

        if let Some(parent) = self.inner.auth_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        match serde_json::to_string(&session) {
            Ok(raw) => {
                if let Err(e) = tokio::fs::write(&self.inner.auth_path, raw).await {
                    debug!(error = %e, "could not persist auth tokens");
                }
            }
            Err(e) => debug!(error = %e, "could not serialize auth tokens"),
        }
    }

    /// Drop the held session and its on-disk mirror.
    async fn clear_session(&self) {
        *self.inner.session.write().await = None;
        match tokio::fs::remove_file(&self.inner.auth_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(error = %e, "could not remove persisted auth tokens"),
        }
    }

    /// Bearer token for user-scoped calls, when signed in.
    async fn user_bearer(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    fn emit(&self, event: AuthEvent) {
        // Err just means nobody is listening right now
        let _ = self.inner.events_tx.send(event);
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.inner.base)
    }

    /// Public URL for an object in a public bucket.
    fn public_object_url(&self, bucket: &str, object_key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{bucket}/{object_key}",
            self.inner.base
        )
    }

    /// Attach the signed-in user's bearer token, falling back to the anon
    /// default header.
    async fn with_user_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        self.ensure_session_loaded().await;
        match self.user_bearer().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turn a non-success response into an API error.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status: status.as_u16(),
            message: message.chars().take(500).collect(),
        })
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    /// Exchange credentials or a refresh token for a session.
    async fn request_token(
        &self,
        grant_type: &str,
        body: &serde_json::Value,
    ) -> Result<AuthSession, BackendError> {
        let url = self.endpoint(&format!("auth/v1/token?grant_type={grant_type}"));
        let response = self.inner.http.post(&url).json(body).send().await?;
        let response = Self::ensure_success(response).await?;
        let token: TokenResponse = Self::parse_json(response).await?;
        token.try_into()
    }

    /// Refresh an expired session, returning the replacement.
    ///
    /// A rejected refresh token means the session was revoked; the stored
    /// tokens are dropped and `Ok(None)` is returned.
    async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<Option<AuthSession>, BackendError> {
        let result = self
            .request_token(
                "refresh_token",
                &serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await;

        match result {
            Ok(session) => {
                self.store_session(session.clone()).await;
                Ok(Some(session))
            }
            Err(BackendError::Api { status, message }) if (400..500).contains(&status) => {
                debug!(status, message = %message, "refresh token rejected; clearing session");
                self.clear_session().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ShopBackend for BackendClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError> {
        let session = self
            .request_token(
                "password",
                &serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        self.store_session(session.clone()).await;
        self.emit(AuthEvent::SignedIn {
            session: session.clone(),
        });
        Ok(session)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError> {
        let url = self.endpoint("auth/v1/signup");
        let response = self
            .inner
            .http
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let token: TokenResponse = Self::parse_json(response).await?;
        let session: AuthSession = token.try_into()?;

        self.store_session(session.clone()).await;
        self.emit(AuthEvent::SignedIn {
            session: session.clone(),
        });
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), BackendError> {
        self.ensure_session_loaded().await;

        let Some(token) = self.user_bearer().await else {
            return Ok(());
        };

        let url = self.endpoint("auth/v1/logout");
        let result = async {
            let response = self
                .inner
                .http
                .post(&url)
                .bearer_auth(token)
                .send()
                .await?;
            Self::ensure_success(response).await?;
            Ok(())
        }
        .await;

        // The local session ends whether or not the provider heard us
        self.clear_session().await;
        self.emit(AuthEvent::SignedOut);
        result
    }

    #[instrument(skip(self))]
    async fn active_session(&self) -> Result<Option<AuthSession>, BackendError> {
        self.ensure_session_loaded().await;

        let held = self.inner.session.read().await.clone();
        match held {
            None => Ok(None),
            Some(session) if !session.is_expired() => Ok(Some(session)),
            Some(session) => match session.refresh_token {
                Some(refresh_token) => self.refresh_session(&refresh_token).await,
                None => {
                    debug!("session expired with no refresh token; clearing");
                    self.clear_session().await;
                    Ok(None)
                }
            },
        }
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn fetch_user(&self, id: UserId) -> Result<Option<UserRecord>, BackendError> {
        let url = self.endpoint(&format!("rest/v1/users?id=eq.{id}&select=*&limit=1"));
        let request = self.with_user_auth(self.inner.http.get(&url)).await;
        let response = Self::ensure_success(request.send().await?).await?;
        let rows: Vec<UserRecord> = Self::parse_json(response).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: &NewUserRecord) -> Result<UserRecord, BackendError> {
        let url = self.endpoint("rest/v1/users");
        let request = self
            .with_user_auth(self.inner.http.post(&url))
            .await
            .header("Prefer", "return=representation")
            .json(user);
        let response = Self::ensure_success(request.send().await?).await?;
        let rows: Vec<UserRecord> = Self::parse_json(response).await?;
        rows.into_iter().next().ok_or(BackendError::MissingRow)
    }

    #[instrument(skip(self, update), fields(user_id = %id))]
    async fn update_user(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<UserRecord, BackendError> {
        let url = self.endpoint(&format!("rest/v1/users?id=eq.{id}"));
        let request = self
            .with_user_auth(self.inner.http.patch(&url))
            .await
            .header("Prefer", "return=representation")
            .json(update);
        let response = Self::ensure_success(request.send().await?).await?;
        let rows: Vec<UserRecord> = Self::parse_json(response).await?;
        rows.into_iter().next().ok_or(BackendError::MissingRow)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderRecord>, BackendError> {
        let select = urlencoding::encode("*,order_items(*)");
        let url = self.endpoint(&format!(
            "rest/v1/orders?user_id=eq.{user_id}&select={select}&order=created_at.desc"
        ));
        let request = self.with_user_auth(self.inner.http.get(&url)).await;
        let response = Self::ensure_success(request.send().await?).await?;
        Self::parse_json(response).await
    }

    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    async fn insert_order(&self, order: &NewOrderRecord) -> Result<OrderRecord, BackendError> {
        let url = self.endpoint("rest/v1/orders");
        let request = self
            .with_user_auth(self.inner.http.post(&url))
            .await
            .header("Prefer", "return=representation")
            .json(order);
        let response = Self::ensure_success(request.send().await?).await?;
        let rows: Vec<OrderRecord> = Self::parse_json(response).await?;
        rows.into_iter().next().ok_or(BackendError::MissingRow)
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn insert_order_items(&self, items: &[NewOrderItemRecord]) -> Result<(), BackendError> {
        if items.is_empty() {
            return Ok(());
        }
        let url = self.endpoint("rest/v1/order_items");
        let request = self
            .with_user_auth(self.inner.http.post(&url))
            .await
            .header("Prefer", "return=minimal")
            .json(items);
        Self::ensure_success(request.send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    async fn update_order_status(
        &self,
        order_id: OrderId,
        user_id: UserId,
        status: OrderStatus,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&format!(
            "rest/v1/orders?id=eq.{order_id}&user_id=eq.{user_id}"
        ));
        let request = self
            .with_user_auth(self.inner.http.patch(&url))
            .await
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({
                "status": status,
                "updated_at": Utc::now(),
            }));
        Self::ensure_success(request.send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self, bytes), fields(object_key = %object_key, size = bytes.len()))]
    async fn upload_avatar(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        self.ensure_session_loaded().await;
        let Some(token) = self.user_bearer().await else {
            return Err(BackendError::NotSignedIn);
        };

        let url = self.endpoint(&format!("storage/v1/object/{AVATAR_BUCKET}/{object_key}"));
        let response = self
            .inner
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        Self::ensure_success(response).await?;

        Ok(self.public_object_url(AVATAR_BUCKET, object_key))
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events_tx.subscribe()
    }
}

// =============================================================================
// Wire types local to the auth endpoints
// =============================================================================

/// Token grant response from the identity provider.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
    email: String,
}

impl TryFrom<TokenResponse> for AuthSession {
    type Error = BackendError;

    fn try_from(token: TokenResponse) -> Result<Self, Self::Error> {
        let email = Email::parse(&token.user.email)
            .map_err(|e| BackendError::Parse(format!("session email invalid: {e}")))?;
        Ok(Self {
            user_id: token.user.id,
            email,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            obtained_at: Utc::now(),
        })
    }
}
