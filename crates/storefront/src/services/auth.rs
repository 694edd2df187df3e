//! Login and registration flows.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use velour_core::{CustomerRole, Email, EmailError};

use crate::backend::wire::NewUserRecord;
use crate::backend::{BackendError, ShopBackend};
use crate::models::CurrentUser;
use crate::store::SessionStore;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Errors from the login and registration flows.
///
/// Validation variants carry text fit for direct display; backend variants
/// keep their cause for the logs and map to a generic notification.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("Email is required")]
    MissingEmail,
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
    #[error("Weak password: {0}")]
    WeakPassword(String),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Login failed")]
    LoginFailed(#[source] BackendError),
    #[error("Registration failed")]
    RegistrationFailed(#[source] BackendError),
}

impl AuthFlowError {
    /// Notification text for the shopper. Backend causes collapse into a
    /// generic message; nothing here distinguishes wrong credentials from
    /// an unreachable server.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingEmail => "Enter your email address.".to_string(),
            Self::InvalidEmail(_) => "Enter a valid email address.".to_string(),
            Self::WeakPassword(message) => message.clone(),
            Self::PasswordMismatch => "The passwords do not match.".to_string(),
            Self::LoginFailed(_) => "Login failed. Check your email and password.".to_string(),
            Self::RegistrationFailed(_) => "Registration failed. Please try again.".to_string(),
        }
    }
}

/// Sign-in and sign-up against the backend's identity provider, installing
/// the resulting identity into the session store.
pub struct AuthService {
    backend: Arc<dyn ShopBackend>,
    session: Arc<SessionStore>,
}

impl AuthService {
    #[must_use]
    pub fn new(backend: Arc<dyn ShopBackend>, session: Arc<SessionStore>) -> Self {
        Self { backend, session }
    }

    /// Sign in with email and password.
    ///
    /// On success the freshly fetched user row is installed into the
    /// session store and returned.
    ///
    /// # Errors
    ///
    /// Validation failures are reported before any backend call; backend
    /// failures come back as [`AuthFlowError::LoginFailed`].
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<CurrentUser, AuthFlowError> {
        let email = parse_required_email(email)?;
        validate_password(password)?;

        let session = self
            .backend
            .sign_in(&email, password)
            .await
            .map_err(AuthFlowError::LoginFailed)?;
        let record = self
            .backend
            .fetch_user(session.user_id)
            .await
            .map_err(AuthFlowError::LoginFailed)?
            .ok_or(AuthFlowError::LoginFailed(BackendError::MissingRow))?;

        let user = CurrentUser::from(record);
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Create an account and sign in.
    ///
    /// Registers with the identity provider, then inserts the matching row
    /// into the users table: unverified, role `user`, display name falling
    /// back to the email local part when blank.
    ///
    /// # Errors
    ///
    /// Validation failures are reported before any backend call; backend
    /// failures come back as [`AuthFlowError::RegistrationFailed`].
    #[instrument(skip(self, password, confirm_password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<CurrentUser, AuthFlowError> {
        let email = parse_required_email(email)?;
        validate_password(password)?;
        if password != confirm_password {
            return Err(AuthFlowError::PasswordMismatch);
        }
        let display_name = match name.trim() {
            "" => email.local_part().to_string(),
            trimmed => trimmed.to_string(),
        };

        let session = self
            .backend
            .sign_up(&email, password)
            .await
            .map_err(AuthFlowError::RegistrationFailed)?;
        let record = self
            .backend
            .insert_user(&NewUserRecord {
                id: session.user_id,
                email,
                name: display_name,
                is_verified: false,
                role: CustomerRole::User,
            })
            .await
            .map_err(AuthFlowError::RegistrationFailed)?;

        let user = CurrentUser::from(record);
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }
}

fn parse_required_email(raw: &str) -> Result<Email, AuthFlowError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthFlowError::MissingEmail);
    }
    Ok(Email::parse(trimmed)?)
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthFlowError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthFlowError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
