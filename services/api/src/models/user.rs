//! User model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::validation::{ValidationErrors, normalize_email, validate_email, validate_name};

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Staff and superusers may mutate posts and tags
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// New user creation payload, already normalized and hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    /// Build a regular user; the email is normalized and must not be empty
    pub fn new(email: &str, name: &str, password_hash: String) -> Result<Self, ValidationErrors> {
        let email = normalize_email(email);

        let mut errors = ValidationErrors::new();
        errors.check("email", validate_email(&email));
        errors.check("name", validate_name(name));
        errors.finish()?;

        Ok(Self {
            email,
            name: name.to_string(),
            password_hash,
            is_staff: false,
            is_superuser: false,
        })
    }

    /// Superusers are always staff as well
    pub fn into_superuser(mut self) -> Self {
        self.is_staff = true;
        self.is_superuser = true;
        self
    }
}

/// User update payload
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

/// Request for user registration
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// Request for token issuance
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response for token issuance
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Request for updating the authenticated user
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Public view of a user; never carries the password
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = NewUser::new("test1@EXAMPLE.com", "", "hash".to_string()).unwrap();
        assert_eq!(user.email, "test1@example.com");
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
    }

    #[test]
    fn test_new_user_without_email_is_rejected() {
        let errors = NewUser::new("", "name", "hash".to_string()).unwrap_err();
        assert!(errors.contains("email"));
    }

    #[test]
    fn test_superuser_sets_staff_and_superuser() {
        let user = NewUser::new("test@example.com", "", "hash".to_string())
            .unwrap()
            .into_superuser();
        assert!(user.is_staff);
        assert!(user.is_superuser);
    }

    #[test]
    fn test_user_serialization_skips_password_hash() {
        let user = User {
            id: 1,
            email: "test@example.com".to_string(),
            name: "Test".to_string(),
            password_hash: "secret".to_string(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert!(!user.is_admin());
    }
}
