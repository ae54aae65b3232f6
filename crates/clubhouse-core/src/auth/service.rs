use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::api::{ApiClient, ApiError};
use crate::models::{NewUser, ProfileUpdate, User};
use crate::query::{Collection, QueryClient, QueryParams};

use super::SessionStore;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with email {0} already exists")]
    EmailTaken(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Session storage failed: {0:#}")]
    Session(#[from] anyhow::Error),
}

/// Sign-in state on top of the users endpoints.
///
/// Passwords are compared against the mock API's stored value as-is.
pub struct AuthService {
    cache: QueryClient<ApiClient>,
    session: SessionStore,
}

impl AuthService {
    pub fn new(cache: QueryClient<ApiClient>, session: SessionStore) -> Self {
        Self { cache, session }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionStore {
        &mut self.session
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.user()
    }

    fn api(&self) -> &ApiClient {
        self.cache.fetcher()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AuthError> {
        let records = self.api().find_users_by_email(email).await?;
        let user = records
            .into_iter()
            .find(|r| r.password.as_deref() == Some(password))
            .map(|r| r.user)
            .ok_or(AuthError::InvalidCredentials)?;

        self.session.set_user(Some(user.clone()))?;
        info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        if !self.api().find_users_by_email(email).await?.is_empty() {
            return Err(AuthError::EmailTaken(email.to_string()));
        }

        let new_user = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            member_since: Some(Utc::now().format("%Y-%m-%d").to_string()),
        };
        let user = self.api().create_user(&new_user).await?;

        self.session.set_user(Some(user.clone()))?;
        info!(user_id = %user.id, "Registered and signed in");
        Ok(user)
    }

    pub fn logout(&mut self) -> Result<(), AuthError> {
        if let Some(user) = self.session.user() {
            info!(user_id = %user.id, "Signed out");
        }
        self.session.set_user(None)?;
        Ok(())
    }

    /// Save profile changes for the signed-in member. The cached detail
    /// entry for that user is dropped so the next read sees the update.
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<User, AuthError> {
        let id = self
            .session
            .user()
            .map(|u| u.id.clone())
            .ok_or(AuthError::NotSignedIn)?;

        let user = self.api().update_user(id.as_str(), update).await?;
        self.session.set_user(Some(user.clone()))?;
        self.cache
            .invalidate(&QueryParams::detail(Collection::Users, id.as_str()));
        Ok(user)
    }
}
