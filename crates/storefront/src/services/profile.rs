//! Customer profiles.
//!
//! A profile holds the customer's name, phone, saved addresses and mailing
//! preferences. It is created with default preferences the first time the
//! signed-in user's profile is requested, so accounts that confirmed their
//! email before ever signing in get one too.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use lumiere_core::{Email, UserId};

use crate::models::{Address, AuthUser, NewProfile, Preferences, Profile, ProfileUpdate};
use crate::services::session::Session;
use crate::store::{RecordStore, StoreError};

/// Errors that can occur when reading or editing a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Nobody is signed in.
    #[error("sign in to manage your profile")]
    NotAuthenticated,

    /// A saved address has a blank field.
    #[error("{kind} address is missing {field}")]
    IncompleteAddress {
        kind: &'static str,
        field: &'static str,
    },

    /// Record store failure.
    #[error("remote store error: {0}")]
    Store(#[from] StoreError),
}

/// Profile access for the signed-in user.
#[derive(Clone)]
pub struct Profiles {
    store: Arc<dyn RecordStore>,
    session: Session,
}

impl Profiles {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, session: Session) -> Self {
        Self { store, session }
    }

    /// The signed-in user's profile, created on first access.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotAuthenticated` if nobody is signed in.
    #[instrument(skip(self))]
    pub async fn current(&self) -> Result<Profile, ProfileError> {
        let session = self.session.current().ok_or(ProfileError::NotAuthenticated)?;
        if let Some(profile) = self.store.profile(session.user.id).await? {
            return Ok(profile);
        }
        self.create(&session.user).await
    }

    /// Apply a partial update to the signed-in user's profile.
    ///
    /// Addresses are only accepted when every field is filled in.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotAuthenticated` if nobody is signed in.
    /// Returns `ProfileError::IncompleteAddress` if an address has a blank field.
    #[instrument(skip(self, update))]
    pub async fn update(&self, update: ProfileUpdate) -> Result<Profile, ProfileError> {
        let user_id = self.require_user()?;
        for (kind, address) in [
            ("shipping", &update.shipping_address),
            ("billing", &update.billing_address),
        ] {
            if let Some(field) = address.as_ref().and_then(Address::missing_field) {
                return Err(ProfileError::IncompleteAddress { kind, field });
            }
        }

        if update.is_empty() {
            return self.current().await;
        }

        // Create first so the update always has a row to land on
        if self.store.profile(user_id).await?.is_none() {
            self.current().await?;
        }

        let profile = self
            .store
            .update_profile(user_id, &update)
            .await?
            .ok_or_else(|| StoreError::EmptyResponse("profiles update".to_string()))?;
        tracing::info!(user_id = %user_id, "Profile updated");
        Ok(profile)
    }

    async fn create(&self, user: &AuthUser) -> Result<Profile, ProfileError> {
        let new = NewProfile {
            id: user.id,
            email: user.email.clone().map(Email::into_inner),
            preferences: Preferences::default(),
        };

        match self.store.insert_profile(new).await {
            Ok(profile) => {
                tracing::info!(user_id = %user.id, "Profile created");
                Ok(profile)
            }
            // Created concurrently by another client
            Err(StoreError::Conflict(_)) => self
                .store
                .profile(user.id)
                .await?
                .ok_or_else(|| StoreError::EmptyResponse("profiles select".to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }

    fn require_user(&self) -> Result<UserId, ProfileError> {
        self.session
            .current_user()
            .ok_or(ProfileError::NotAuthenticated)
    }
}

impl std::fmt::Debug for Profiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiles")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
