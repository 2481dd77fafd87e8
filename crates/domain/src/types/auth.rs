//! Credential, identity and session types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Access/refresh token pair owned by the credential store
///
/// Both tokens are always present: the constructor and the deserializer
/// reject empty values, so a half-written pair can never be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCredentials")]
pub struct Credentials {
    access_token: String,
    refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawCredentials {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawCredentials> for Credentials {
    type Error = AppError;

    fn try_from(raw: RawCredentials) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.access_token, raw.refresh_token)?.with_expires_at(raw.expires_at))
    }
}

impl Credentials {
    /// Create a credential pair without a known expiry
    ///
    /// # Errors
    /// Returns a validation error if either token is empty.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, AppError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();

        if access_token.trim().is_empty() {
            return Err(AppError::validation("access token must not be empty"));
        }
        if refresh_token.trim().is_empty() {
            return Err(AppError::validation("refresh token must not be empty"));
        }

        Ok(Self { access_token, refresh_token, expires_at: None })
    }

    /// Set the absolute expiry of the access token
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Set the expiry relative to `now` from an `expires_in` value in seconds
    ///
    /// Non-positive values leave the expiry unknown.
    #[must_use]
    pub fn expiring_in(self, now: DateTime<Utc>, expires_in_secs: i64) -> Self {
        let expires_at = (expires_in_secs > 0).then(|| now + Duration::seconds(expires_in_secs));
        self.with_expires_at(expires_at)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the access token is expired, or will be within
    /// `threshold_secs`, at `now`. Tokens without an expiry are never
    /// considered expired.
    pub fn is_expired(&self, now: DateTime<Utc>, threshold_secs: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(threshold_secs) >= expires_at,
            None => false,
        }
    }
}

/// How the stored identity originally signed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    Email,
    Google,
    Apple,
}

/// Identity used for fallback re-authentication when refresh fails
///
/// Preconditions are explicit: `subject` is mandatory for every login method
/// and `email` is mandatory for [`LoginMethod::Email`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login_method: LoginMethod,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(login_method: LoginMethod, subject: impl Into<String>) -> Self {
        Self { login_method, subject: subject.into(), email: None }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Check that every field the login method needs is present
    ///
    /// # Errors
    /// Returns a validation error naming the missing field.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.subject.trim().is_empty() {
            return Err(AppError::validation("identity subject is required"));
        }

        let has_email = self.email.as_deref().is_some_and(|e| !e.trim().is_empty());
        if self.login_method == LoginMethod::Email && !has_email {
            return Err(AppError::validation("email is required for email login"));
        }

        Ok(())
    }
}

/// Session lifecycle notification broadcast to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Refresh and re-authentication both failed; credentials were cleared
    /// and the application must return to a logged-out state.
    Invalidated { reason: String },
}
