//! Scriptable in-memory backend for store and service tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use velour_core::{CustomerRole, Email, OrderId, OrderStatus, UserId};

use crate::backend::wire::{
    NewOrderItemRecord, NewOrderRecord, NewUserRecord, OrderRecord, UserRecord, UserUpdate,
};
use crate::backend::{AuthEvent, AuthSession, BackendError, ShopBackend};
use crate::models::CurrentUser;
use async_trait::async_trait;

pub fn sample_user() -> CurrentUser {
    CurrentUser {
        id: UserId::generate(),
        email: Email::parse("lin@example.com").unwrap(),
        name: "Lin Mei".to_string(),
        avatar_url: None,
        is_verified: true,
        role: CustomerRole::User,
        created_at: Utc::now(),
    }
}

pub fn record_for(user: &CurrentUser) -> UserRecord {
    UserRecord {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        avatar_url: user.avatar_url.clone(),
        is_verified: user.is_verified,
        role: user.role,
        created_at: user.created_at,
    }
}

pub fn session_for(user: &CurrentUser) -> AuthSession {
    AuthSession {
        user_id: user.id,
        email: user.email.clone(),
        access_token: format!("fake-access-{}", user.id),
        refresh_token: Some("fake-refresh".to_string()),
        expires_in: 3600,
        obtained_at: Utc::now(),
    }
}

fn api_error(status: u16, message: &str) -> BackendError {
    BackendError::Api {
        status,
        message: message.to_string(),
    }
}

/// One scripted `active_session` response: wait, then answer.
struct ScriptedProbe {
    delay: Duration,
    outcome: Result<Option<AuthSession>, ()>,
}

#[derive(Default)]
struct FakeState {
    session: Option<AuthSession>,
    users: HashMap<UserId, UserRecord>,
    orders: Vec<OrderRecord>,
    probe_script: VecDeque<ScriptedProbe>,
    inserted_users: Vec<NewUserRecord>,
    inserted_orders: Vec<NewOrderRecord>,
    inserted_items: Vec<NewOrderItemRecord>,
    status_updates: Vec<(OrderId, UserId, OrderStatus)>,
    uploads: Vec<String>,
}

/// In-memory stand-in for the hosted backend.
///
/// Failure flags make the next matching call return an API error; the
/// probe script overrides `active_session` one scripted step per call.
pub struct FakeBackend {
    state: Mutex<FakeState>,
    events: broadcast::Sender<AuthEvent>,
    pub fetch_user_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub fail_sign_in: AtomicBool,
    pub fail_sign_up: AtomicBool,
    pub fail_sign_out: AtomicBool,
    pub fail_active_session: AtomicBool,
    pub fail_fetch_user: AtomicBool,
    pub fail_insert_user: AtomicBool,
    pub fail_update_user: AtomicBool,
    pub fail_list_orders: AtomicBool,
    pub fail_insert_order: AtomicBool,
    pub fail_insert_items: AtomicBool,
    pub fail_update_status: AtomicBool,
    pub fail_upload: AtomicBool,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(FakeState::default()),
            events,
            fetch_user_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            fail_sign_in: AtomicBool::new(false),
            fail_sign_up: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            fail_active_session: AtomicBool::new(false),
            fail_fetch_user: AtomicBool::new(false),
            fail_insert_user: AtomicBool::new(false),
            fail_update_user: AtomicBool::new(false),
            fail_list_orders: AtomicBool::new(false),
            fail_insert_order: AtomicBool::new(false),
            fail_insert_items: AtomicBool::new(false),
            fail_update_status: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
        }
    }

    pub fn set_session(&self, session: Option<AuthSession>) {
        self.state.lock().unwrap().session = session;
    }

    pub fn put_user(&self, record: UserRecord) {
        self.state.lock().unwrap().users.insert(record.id, record);
    }

    pub fn push_order(&self, record: OrderRecord) {
        self.state.lock().unwrap().orders.push(record);
    }

    /// Queue one scripted `active_session` answer. `Err(())` scripts a
    /// backend failure.
    pub fn script_probe(&self, delay: Duration, outcome: Result<Option<AuthSession>, ()>) {
        self.state
            .lock()
            .unwrap()
            .probe_script
            .push_back(ScriptedProbe { delay, outcome });
    }

    /// Broadcast an auth event as the backend would.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    pub fn inserted_users(&self) -> Vec<NewUserRecord> {
        self.state.lock().unwrap().inserted_users.clone()
    }

    pub fn inserted_orders(&self) -> Vec<NewOrderRecord> {
        self.state.lock().unwrap().inserted_orders.clone()
    }

    pub fn inserted_items(&self) -> Vec<NewOrderItemRecord> {
        self.state.lock().unwrap().inserted_items.clone()
    }

    pub fn status_updates(&self) -> Vec<(OrderId, UserId, OrderStatus)> {
        self.state.lock().unwrap().status_updates.clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.state.lock().unwrap().uploads.clone()
    }
}

#[async_trait]
impl ShopBackend for FakeBackend {
    async fn sign_in(&self, email: &Email, _password: &str) -> Result<AuthSession, BackendError> {
        if self.fail_sign_in.load(Ordering::SeqCst) {
            return Err(api_error(400, "Invalid login credentials"));
        }
        let session = {
            let mut state = self.state.lock().unwrap();
            let row = state
                .users
                .values()
                .find(|row| row.email.as_str() == email.as_str())
                .cloned();
            let Some(row) = row else {
                return Err(api_error(400, "Invalid login credentials"));
            };
            let session = AuthSession {
                user_id: row.id,
                email: row.email,
                access_token: format!("fake-access-{}", row.id),
                refresh_token: Some("fake-refresh".to_string()),
                expires_in: 3600,
                obtained_at: Utc::now(),
            };
            state.session = Some(session.clone());
            session
        };
        self.emit(AuthEvent::SignedIn {
            session: session.clone(),
        });
        Ok(session)
    }

    async fn sign_up(&self, email: &Email, _password: &str) -> Result<AuthSession, BackendError> {
        if self.fail_sign_up.load(Ordering::SeqCst) {
            return Err(api_error(422, "User already registered"));
        }
        let session = AuthSession {
            user_id: UserId::generate(),
            email: email.clone(),
            access_token: "fake-access-new".to_string(),
            refresh_token: Some("fake-refresh".to_string()),
            expires_in: 3600,
            obtained_at: Utc::now(),
        };
        self.state.lock().unwrap().session = Some(session.clone());
        self.emit(AuthEvent::SignedIn {
            session: session.clone(),
        });
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().session = None;
        self.emit(AuthEvent::SignedOut);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(api_error(500, "logout failed"));
        }
        Ok(())
    }

    async fn active_session(&self) -> Result<Option<AuthSession>, BackendError> {
        let step = self.state.lock().unwrap().probe_script.pop_front();
        if let Some(step) = step {
            tokio::time::sleep(step.delay).await;
            return step
                .outcome
                .map_err(|()| api_error(500, "backend unavailable"));
        }
        if self.fail_active_session.load(Ordering::SeqCst) {
            return Err(api_error(500, "backend unavailable"));
        }
        Ok(self.state.lock().unwrap().session.clone())
    }

    async fn fetch_user(&self, id: UserId) -> Result<Option<UserRecord>, BackendError> {
        self.fetch_user_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch_user.load(Ordering::SeqCst) {
            return Err(api_error(500, "backend unavailable"));
        }
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn insert_user(&self, user: &NewUserRecord) -> Result<UserRecord, BackendError> {
        if self.fail_insert_user.load(Ordering::SeqCst) {
            return Err(api_error(409, "duplicate key value"));
        }
        let record = UserRecord {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_url: None,
            is_verified: user.is_verified,
            role: user.role,
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().unwrap();
        state.inserted_users.push(user.clone());
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_user(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<UserRecord, BackendError> {
        if self.fail_update_user.load(Ordering::SeqCst) {
            return Err(api_error(500, "backend unavailable"));
        }
        let mut state = self.state.lock().unwrap();
        let Some(row) = state.users.get_mut(&id) else {
            return Err(BackendError::MissingRow);
        };
        if let Some(name) = &update.name {
            row.name.clone_from(name);
        }
        if let Some(avatar_url) = &update.avatar_url {
            row.avatar_url = Some(avatar_url.clone());
        }
        Ok(row.clone())
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderRecord>, BackendError> {
        if self.fail_list_orders.load(Ordering::SeqCst) {
            return Err(api_error(500, "backend unavailable"));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .iter()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_order(&self, order: &NewOrderRecord) -> Result<OrderRecord, BackendError> {
        if self.fail_insert_order.load(Ordering::SeqCst) {
            return Err(api_error(500, "backend unavailable"));
        }
        let now = Utc::now();
        let record = OrderRecord {
            id: OrderId::generate(),
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address.clone(),
            tracking_number: None,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        };
        let mut state = self.state.lock().unwrap();
        state.inserted_orders.push(order.clone());
        state.orders.push(record.clone());
        Ok(record)
    }

    async fn insert_order_items(&self, items: &[NewOrderItemRecord]) -> Result<(), BackendError> {
        if self.fail_insert_items.load(Ordering::SeqCst) {
            return Err(api_error(500, "backend unavailable"));
        }
        self.state
            .lock()
            .unwrap()
            .inserted_items
            .extend_from_slice(items);
        Ok(())
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        user_id: UserId,
        status: OrderStatus,
    ) -> Result<(), BackendError> {
        if self.fail_update_status.load(Ordering::SeqCst) {
            return Err(api_error(500, "backend unavailable"));
        }
        let mut state = self.state.lock().unwrap();
        state.status_updates.push((order_id, user_id, status));
        if let Some(order) = state
            .orders
            .iter_mut()
            .find(|order| order.id == order_id && order.user_id == user_id)
        {
            order.status = status;
        }
        Ok(())
    }

    async fn upload_avatar(
        &self,
        object_key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BackendError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(api_error(500, "storage unavailable"));
        }
        self.state
            .lock()
            .unwrap()
            .uploads
            .push(object_key.to_string());
        Ok(format!(
            "https://fake.backend.dev/storage/v1/object/public/avatars/{object_key}"
        ))
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
