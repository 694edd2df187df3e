//! Observable session state.
//!
//! Holds the signed-in user (or no one) and a loading flag that stays true
//! until the first live-session probe finishes. Identity changes are
//! published through a `watch` channel and mirrored to the state file.
//!
//! The store fails closed: any probe failure, a timeout included, lands in
//! the signed-out state rather than an error the UI has to interpret.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use velour_core::UserId;

use crate::backend::{AuthEvent, BackendError, ShopBackend};
use crate::models::CurrentUser;
use crate::store::StateFile;

/// Published session state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user: Option<CurrentUser>,
    pub is_loading: bool,
}

impl SessionState {
    /// Whether someone is signed in. Derived from `user`, so it can never
    /// disagree with it.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug, Error)]
enum ProbeError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("backend call timed out")]
    TimedOut,
    #[error("no user row for session identity {0}")]
    MissingUserRow(UserId),
}

/// Container for the current shopper identity.
///
/// Construct inside a Tokio runtime: the store spawns a listener over the
/// backend's auth-event channel at build time and persists snapshots from
/// background tasks. One instance per application root; every clone of the
/// returned `Arc` shares the same state.
pub struct SessionStore {
    state: watch::Sender<SessionState>,
    backend: Arc<dyn ShopBackend>,
    state_file: Arc<StateFile>,
    probe_seq: AtomicU64,
    call_timeout: Duration,
}

impl SessionStore {
    /// Build the store, rehydrating the persisted user snapshot if one is
    /// readable. `is_loading` starts true either way; call
    /// [`SessionStore::check_session`] to reconcile against the live
    /// session.
    pub async fn new(
        backend: Arc<dyn ShopBackend>,
        state_file: StateFile,
        call_timeout: Duration,
    ) -> Arc<Self> {
        let user = state_file.load().await;
        let (state, _) = watch::channel(SessionState {
            user,
            is_loading: true,
        });
        let store = Arc::new(Self {
            state,
            backend,
            state_file: Arc::new(state_file),
            probe_seq: AtomicU64::new(0),
            call_timeout,
        });
        store.spawn_auth_listener();
        store
    }

    /// Observe session updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current state, cloned out of the channel.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<CurrentUser> {
        self.state.borrow().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Replace the signed-in identity and mirror it to the state file.
    pub fn set_user(&self, user: Option<CurrentUser>) {
        self.state
            .send_modify(|state| state.user.clone_from(&user));
        let file = Arc::clone(&self.state_file);
        tokio::spawn(async move { file.persist(user).await });
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.state.send_modify(|state| state.is_loading = is_loading);
    }

    /// Probe the backend for a live session and reconcile local state.
    ///
    /// A present session installs the freshly fetched user row; anything
    /// else, including timeouts, lands signed out. Concurrent probes are
    /// sequenced by ticket: a probe that finds itself superseded discards
    /// its result and leaves the terminal state to the newer one.
    #[instrument(skip(self))]
    pub async fn check_session(&self) {
        let ticket = self.probe_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.probe().await;

        if self.probe_seq.load(Ordering::SeqCst) != ticket {
            debug!("discarding superseded session probe");
            return;
        }
        match outcome {
            Ok(user) => self.set_user(user),
            Err(e) => {
                warn!(error = %e, "session probe failed; treating as signed out");
                self.set_user(None);
            }
        }
        self.set_loading(false);
    }

    /// Sign out. The remote call is best-effort; local identity and the
    /// persisted snapshot are cleared no matter what it returns.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        match timeout(self.call_timeout, self.backend.sign_out()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "remote sign-out failed; clearing local session anyway");
            }
            Err(_) => debug!("remote sign-out timed out; clearing local session anyway"),
        }
        self.set_user(None);
    }

    async fn probe(&self) -> Result<Option<CurrentUser>, ProbeError> {
        let session = timeout(self.call_timeout, self.backend.active_session())
            .await
            .map_err(|_| ProbeError::TimedOut)??;
        let Some(session) = session else {
            return Ok(None);
        };

        let row = timeout(self.call_timeout, self.backend.fetch_user(session.user_id))
            .await
            .map_err(|_| ProbeError::TimedOut)??;
        match row {
            Some(record) => Ok(Some(record.into())),
            None => Err(ProbeError::MissingUserRow(session.user_id)),
        }
    }

    /// React to backend auth events for as long as the store is alive.
    /// `SignedIn` re-probes rather than trusting the event payload;
    /// `SignedOut` clears directly. Both reactions are idempotent.
    fn spawn_auth_listener(self: &Arc<Self>) {
        let mut events = self.backend.auth_events();
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(store) = store.upgrade() else { break };
                        match event {
                            AuthEvent::SignedIn { .. } => store.check_session().await,
                            AuthEvent::SignedOut => store.set_user(None),
                        }
                    }
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth event stream lagged");
                    }
                }
            }
        });
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state.borrow())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::Ordering as AtomicOrdering;

    use crate::test_support::{FakeBackend, record_for, sample_user, session_for};

    use super::*;

    const CALL_TIMEOUT: Duration = Duration::from_secs(5);

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("velour-session-test-{}", uuid::Uuid::new_v4()))
            .join("velour-session.json")
    }

    async fn store_over(backend: &Arc<FakeBackend>, path: PathBuf) -> Arc<SessionStore> {
        let backend: Arc<dyn ShopBackend> = Arc::clone(backend) as Arc<dyn ShopBackend>;
        SessionStore::new(backend, StateFile::new(path), CALL_TIMEOUT).await
    }

    async fn cleanup(path: &std::path::Path) {
        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn test_starts_loading_and_unauthenticated() {
        let backend = Arc::new(FakeBackend::new());
        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;

        let state = store.snapshot();
        assert!(state.user.is_none());
        assert!(state.is_loading);
        assert!(!state.is_authenticated());

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_probe_without_session_lands_signed_out() {
        let backend = Arc::new(FakeBackend::new());
        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;

        store.check_session().await;

        let state = store.snapshot();
        assert!(state.user.is_none());
        assert!(!state.is_loading);

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_probe_installs_user_for_live_session() {
        let user = sample_user();
        let backend = Arc::new(FakeBackend::new());
        backend.put_user(record_for(&user));
        backend.set_session(Some(session_for(&user)));

        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;
        store.check_session().await;

        let state = store.snapshot();
        assert_eq!(state.user.as_ref().map(|u| u.id), Some(user.id));
        assert!(state.is_authenticated());
        assert!(!state.is_loading);

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_probe_failure_falls_back_to_signed_out() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail_active_session.store(true, AtomicOrdering::SeqCst);

        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;
        store.check_session().await;

        let state = store.snapshot();
        assert!(state.user.is_none());
        assert!(!state.is_loading);

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_probe_with_missing_user_row_falls_back() {
        let user = sample_user();
        let backend = Arc::new(FakeBackend::new());
        // Session exists but no row behind it
        backend.set_session(Some(session_for(&user)));

        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;
        store.check_session().await;

        assert!(store.snapshot().user.is_none());
        assert!(!store.snapshot().is_loading);

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_probe_with_failing_user_fetch_falls_back() {
        let user = sample_user();
        let backend = Arc::new(FakeBackend::new());
        backend.put_user(record_for(&user));
        backend.set_session(Some(session_for(&user)));
        backend.fail_fetch_user.store(true, AtomicOrdering::SeqCst);

        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;
        store.check_session().await;

        assert!(store.snapshot().user.is_none());

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_rehydrated_user_survives_until_probe_says_otherwise() {
        let user = sample_user();
        let path = scratch_path();

        // Seed the snapshot file from a previous "run"
        let seed = StateFile::new(path.clone());
        seed.persist(Some(user.clone())).await;

        let backend = Arc::new(FakeBackend::new());
        backend.fail_active_session.store(true, AtomicOrdering::SeqCst);
        let store = store_over(&backend, path.clone()).await;

        // Optimistic render state: persisted user, still loading
        let state = store.snapshot();
        assert_eq!(state.user.as_ref().map(|u| u.id), Some(user.id));
        assert!(state.is_loading);

        // The probe fails, so the optimistic identity is dropped
        store.check_session().await;
        assert!(store.snapshot().user.is_none());
        assert!(!store.snapshot().is_loading);

        cleanup(&path).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_lands_signed_out() {
        let backend = Arc::new(FakeBackend::new());
        backend.script_probe(Duration::from_secs(3600), Ok(None));

        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;
        store.check_session().await;

        let state = store.snapshot();
        assert!(state.user.is_none());
        assert!(!state.is_loading);

        cleanup(&path).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_probe_cannot_overwrite_newer_outcome() {
        let user = sample_user();
        let backend = Arc::new(FakeBackend::new());
        backend.put_user(record_for(&user));
        // First probe: slow, finds a session. Second probe: instant, finds none.
        backend.script_probe(Duration::from_secs(2), Ok(Some(session_for(&user))));
        backend.script_probe(Duration::ZERO, Ok(None));

        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;

        let slow = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.check_session().await })
        };
        // Let the slow probe take its ticket and park on the scripted delay
        tokio::task::yield_now().await;

        store.check_session().await;
        assert!(store.snapshot().user.is_none());
        assert!(!store.snapshot().is_loading);

        // The slow probe finishes afterwards and must discard its result
        slow.await.unwrap();
        assert!(store.snapshot().user.is_none());
        assert!(!store.snapshot().is_loading);

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_signed_out_event_clears_without_a_fetch() {
        let user = sample_user();
        let backend = Arc::new(FakeBackend::new());
        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;

        store.set_user(Some(user));
        let mut rx = store.subscribe();

        backend.emit(AuthEvent::SignedOut);
        let state = rx.wait_for(|s| s.user.is_none()).await.unwrap().clone();
        assert!(!state.is_authenticated());
        assert_eq!(backend.fetch_user_calls.load(AtomicOrdering::SeqCst), 0);

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_signed_in_event_triggers_refetch() {
        let user = sample_user();
        let backend = Arc::new(FakeBackend::new());
        backend.put_user(record_for(&user));
        backend.set_session(Some(session_for(&user)));

        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;
        let mut rx = store.subscribe();

        backend.emit(AuthEvent::SignedIn {
            session: session_for(&user),
        });
        let state = rx.wait_for(|s| s.user.is_some()).await.unwrap().clone();
        assert_eq!(state.user.as_ref().map(|u| u.id), Some(user.id));
        assert!(backend.fetch_user_calls.load(AtomicOrdering::SeqCst) >= 1);

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_logout_clears_locally_even_when_remote_fails() {
        let user = sample_user();
        let backend = Arc::new(FakeBackend::new());
        backend.fail_sign_out.store(true, AtomicOrdering::SeqCst);

        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;
        store.set_user(Some(user));
        assert!(store.is_authenticated());

        store.logout().await;
        assert!(!store.is_authenticated());
        assert_eq!(backend.sign_out_calls.load(AtomicOrdering::SeqCst), 1);

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_set_user_persists_and_logout_removes_snapshot() {
        let user = sample_user();
        let backend = Arc::new(FakeBackend::new());
        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;

        store.set_user(Some(user.clone()));
        let reader = StateFile::new(path.clone());
        let mut restored = None;
        for _ in 0..50 {
            restored = reader.load().await;
            if restored.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(restored.map(|u| u.id), Some(user.id));

        store.logout().await;
        for _ in 0..50 {
            if reader.load().await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reader.load().await.is_none());

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_is_authenticated_tracks_user_exactly() {
        let backend = Arc::new(FakeBackend::new());
        let path = scratch_path();
        let store = store_over(&backend, path.clone()).await;

        let state = store.snapshot();
        assert_eq!(state.is_authenticated(), state.user.is_some());

        store.set_user(Some(sample_user()));
        let state = store.snapshot();
        assert_eq!(state.is_authenticated(), state.user.is_some());
        assert!(state.is_authenticated());

        cleanup(&path).await;
    }
}
