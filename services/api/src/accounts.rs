//! Account operations shared by the HTTP layer and the CLI

use tracing::{error, info};

use crate::error::ApiError;
use crate::models::{NewUser, User};
use crate::password::{hash_password, verify_password};
use crate::store::BlogStore;
use crate::validation::{REQUIRED, ValidationErrors, normalize_email, validate_password};

const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

/// Validate and hash a password, collecting the message under `password`
async fn hashed(password: &str, errors: &mut ValidationErrors) -> Result<Option<String>, ApiError> {
    errors.check("password", validate_password(password));
    if errors.contains("password") {
        return Ok(None);
    }

    let hash = hash_password(password).await.map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::InternalServerError
    })?;
    Ok(Some(hash))
}

async fn insert_user(
    store: &dyn BlogStore,
    email: &str,
    password: &str,
    name: &str,
    superuser: bool,
) -> Result<User, ApiError> {
    let mut errors = ValidationErrors::new();
    let password_hash = hashed(password, &mut errors).await?;

    let new_user = match NewUser::new(email, name, password_hash.clone().unwrap_or_default()) {
        Ok(new_user) => new_user,
        Err(mut field_errors) => {
            for message in errors.messages("password") {
                field_errors.add("password", message.clone());
            }
            return Err(field_errors.into());
        }
    };
    errors.finish()?;

    let new_user = if superuser {
        new_user.into_superuser()
    } else {
        new_user
    };

    let user = store.create_user(new_user).await?;
    info!("Created user {} (superuser: {})", user.id, user.is_superuser);
    Ok(user)
}

/// Register a regular user
pub async fn create_user(
    store: &dyn BlogStore,
    email: &str,
    password: &str,
    name: &str,
) -> Result<User, ApiError> {
    insert_user(store, email, password, name, false).await
}

/// Register a user with the staff and superuser flags set
pub async fn create_superuser(
    store: &dyn BlogStore,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    insert_user(store, email, password, "", true).await
}

/// Resolve credentials to an active user
pub async fn authenticate(
    store: &dyn BlogStore,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    let mut errors = ValidationErrors::new();
    if email.trim().is_empty() {
        errors.add("email", REQUIRED);
    }
    if password.is_empty() {
        errors.add("password", REQUIRED);
    }
    errors.finish()?;

    let user = store
        .find_user_by_email(&normalize_email(email))
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ValidationErrors::single("non_field_errors", BAD_CREDENTIALS))?;

    let verified = verify_password(&user.password_hash, password)
        .await
        .map_err(|e| {
            error!("Failed to verify password: {}", e);
            ApiError::InternalServerError
        })?;
    if !verified {
        return Err(ValidationErrors::single("non_field_errors", BAD_CREDENTIALS).into());
    }

    Ok(user)
}
