//! Application root wiring the stores, services, and backend together.

use std::sync::Arc;

use crate::backend::{BackendClient, ShopBackend};
use crate::config::BackendConfig;
use crate::error::Error;
use crate::services::{AuthService, CheckoutService, OrderService, ProfileService};
use crate::store::{CartStore, SessionStore, StateFile};

/// The assembled storefront core.
///
/// This struct is cheaply cloneable via `Arc` and hands out the session and
/// cart stores plus the services built over them. Construct one per
/// process; every clone shares the same state.
#[derive(Clone)]
pub struct StorefrontApp {
    inner: Arc<StorefrontAppInner>,
}

struct StorefrontAppInner {
    config: BackendConfig,
    backend: Arc<dyn ShopBackend>,
    session: Arc<SessionStore>,
    cart: Arc<CartStore>,
    auth: AuthService,
    checkout: CheckoutService,
    orders: OrderService,
    profile: ProfileService,
}

impl StorefrontApp {
    /// Assemble the app over the HTTP backend client.
    ///
    /// The session store starts from the persisted snapshot with
    /// `is_loading` true; call `session().check_session()` once the runtime
    /// is up to reconcile against the live session.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built from the
    /// configuration.
    pub async fn new(config: BackendConfig) -> Result<Self, Error> {
        let backend: Arc<dyn ShopBackend> = Arc::new(BackendClient::new(&config)?);
        Ok(Self::with_backend(config, backend).await)
    }

    /// Assemble the app over any backend implementation.
    pub async fn with_backend(config: BackendConfig, backend: Arc<dyn ShopBackend>) -> Self {
        let state_file = StateFile::new(config.session_state_path());
        let session = SessionStore::new(
            Arc::clone(&backend),
            state_file,
            config.request_timeout,
        )
        .await;
        let cart = Arc::new(CartStore::new());

        let auth = AuthService::new(Arc::clone(&backend), Arc::clone(&session));
        let checkout = CheckoutService::new(
            Arc::clone(&backend),
            Arc::clone(&session),
            Arc::clone(&cart),
        );
        let orders = OrderService::new(Arc::clone(&backend));
        let profile = ProfileService::new(Arc::clone(&backend), Arc::clone(&session));

        Self {
            inner: Arc::new(StorefrontAppInner {
                config,
                backend,
                session,
                cart,
                auth,
                checkout,
                orders,
                profile,
            }),
        }
    }

    /// Get a reference to the backend configuration.
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    /// Get a reference to the backend gateway.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ShopBackend> {
        &self.inner.backend
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.inner.session
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &Arc<CartStore> {
        &self.inner.cart
    }

    /// Get a reference to the auth service.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Get a reference to the profile service.
    #[must_use]
    pub fn profile(&self) -> &ProfileService {
        &self.inner.profile
    }
}
