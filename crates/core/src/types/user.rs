//! User profiles and user administration records.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::{AccountId, UserId};
use super::role::{AccountRole, Role};
use super::validation::{InputError, required_text};

/// Longest accepted username.
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Shortest accepted password for new users and resets.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// The logged-in user's profile (`userInfo` in the persisted session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserProfile {
    /// Shallow-merge `patch` into the profile.
    pub fn merge(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = Some(email);
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = Some(avatar);
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }

    /// Whether this is a super-admin.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Initial shown in the navigation avatar.
    #[must_use]
    pub fn initial(&self) -> String {
        self.name
            .chars()
            .next()
            .map_or_else(|| "?".to_string(), |c| c.to_uppercase().collect())
    }
}

/// Partial profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// A user as listed on the user administration page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedUser {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Banned users cannot log in.
    #[serde(default)]
    pub ban: bool,
}

impl ManagedUser {
    /// Merge an accepted update into the local copy. Passwords are never
    /// stored locally.
    pub fn apply_patch(&mut self, patch: &UserPatch) {
        if let Some(username) = &patch.username {
            self.username.clone_from(username);
        }
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(ban) = patch.ban {
            self.ban = ban;
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

/// Body of `POST /admin/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub password: String,
}

impl NewUser {
    /// Apply the user form rules. A present e-mail is normalized in place.
    ///
    /// # Errors
    ///
    /// Returns the first rule the input breaks.
    pub fn validate(&mut self) -> Result<(), InputError> {
        required_text("username", &self.username, MAX_USERNAME_LENGTH)?;
        validate_password(&self.password)?;
        if let Some(email) = self.email.take().filter(|e| !e.trim().is_empty()) {
            let email = Email::parse(&email).map_err(|e| InputError::Invalid(e.to_string()))?;
            self.email = Some(email.into());
        }
        Ok(())
    }
}

/// Check a new password against the minimum length.
///
/// # Errors
///
/// Returns [`InputError::TooShort`] or [`InputError::Required`].
pub fn validate_password(password: &str) -> Result<(), InputError> {
    if password.is_empty() {
        return Err(InputError::Required { field: "password" });
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(InputError::TooShort {
            field: "password",
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Body of `PUT /admin/users/:id`. Also used for ban toggles, role changes
/// and password resets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(
        default,
        rename = "resetPassword",
        skip_serializing_if = "Option::is_none"
    )]
    pub reset_password: Option<bool>,
}

impl UserPatch {
    /// A password reset to `password`.
    #[must_use]
    pub fn password_reset(password: String) -> Self {
        Self {
            password: Some(password),
            reset_password: Some(true),
            ..Self::default()
        }
    }
}

/// An account bound to a user (`GET /admin/users/:id/accounts`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub display_id: Option<String>,
    #[serde(alias = "role", alias = "user_role")]
    pub account_role: AccountRole,
}

/// Body of the bind / re-role requests on a user's accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBinding {
    #[serde(rename = "accountId")]
    pub account_id: AccountId,
    pub role: AccountRole,
}
