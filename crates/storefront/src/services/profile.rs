//! Profile reads, name changes, and avatar upload.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use velour_core::UserId;

use crate::backend::wire::UserUpdate;
use crate::backend::{BackendError, ShopBackend};
use crate::models::CurrentUser;
use crate::store::SessionStore;

/// Fallback extension for avatar files named without one.
const DEFAULT_AVATAR_EXT: &str = "bin";

/// Errors from the profile flows.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Name is required")]
    MissingName,
    #[error("No file chosen")]
    MissingFile,
    #[error("Profile not found")]
    NotFound,
    #[error("Could not load profile")]
    Fetch(#[source] BackendError),
    #[error("Profile update failed")]
    Update(#[source] BackendError),
    #[error("Avatar upload failed")]
    Upload(#[source] BackendError),
}

impl ProfileError {
    /// Notification text for the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingName => "Enter a name.".to_string(),
            Self::MissingFile => "Choose an image first.".to_string(),
            Self::NotFound | Self::Fetch(_) => {
                "Could not load your profile. Please try again.".to_string()
            }
            Self::Update(_) => "Profile update failed. Please try again.".to_string(),
            Self::Upload(_) => "Avatar upload failed. Please try again.".to_string(),
        }
    }
}

/// Reads and edits the shopper's own user row, keeping the session store's
/// snapshot in step with every change.
pub struct ProfileService {
    backend: Arc<dyn ShopBackend>,
    session: Arc<SessionStore>,
}

impl ProfileService {
    #[must_use]
    pub fn new(backend: Arc<dyn ShopBackend>, session: Arc<SessionStore>) -> Self {
        Self { backend, session }
    }

    /// Fetch the user row.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] for an absent row and
    /// [`ProfileError::Fetch`] when the backend call fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn profile(&self, user_id: UserId) -> Result<CurrentUser, ProfileError> {
        let record = self
            .backend
            .fetch_user(user_id)
            .await
            .map_err(ProfileError::Fetch)?
            .ok_or(ProfileError::NotFound)?;
        Ok(record.into())
    }

    /// Change the display name and refresh the session snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::MissingName`] for a blank name and
    /// [`ProfileError::Update`] when the backend call fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn update_name(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<CurrentUser, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::MissingName);
        }

        let record = self
            .backend
            .update_user(
                user_id,
                &UserUpdate {
                    name: Some(name.to_string()),
                    ..UserUpdate::default()
                },
            )
            .await
            .map_err(ProfileError::Update)?;

        let user = CurrentUser::from(record);
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Upload a new avatar and persist its public URL on the user row.
    ///
    /// The object lands under `{user_id}/avatar-{millis}.{ext}`, so every
    /// upload gets a distinct key and stale CDN copies never shadow it.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::MissingFile`] for an empty upload,
    /// [`ProfileError::Upload`] when storage rejects the object, and
    /// [`ProfileError::Update`] when the row update fails.
    #[instrument(skip(self, bytes), fields(user_id = %user_id, size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        user_id: UserId,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<CurrentUser, ProfileError> {
        if bytes.is_empty() {
            return Err(ProfileError::MissingFile);
        }
        let extension = Path::new(filename)
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or(DEFAULT_AVATAR_EXT);
        let object_key = format!(
            "{user_id}/avatar-{}.{extension}",
            Utc::now().timestamp_millis()
        );

        let avatar_url = self
            .backend
            .upload_avatar(&object_key, bytes, content_type)
            .await
            .map_err(ProfileError::Upload)?;
        let record = self
            .backend
            .update_user(
                user_id,
                &UserUpdate {
                    avatar_url: Some(avatar_url),
                    ..UserUpdate::default()
                },
            )
            .await
            .map_err(ProfileError::Update)?;

        let user = CurrentUser::from(record);
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }
}
