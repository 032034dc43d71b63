//! Access policy for resource endpoints
//!
//! Every post, tag and image operation is authorized here before the target
//! is loaded or the body is validated. Reads are open to everyone, including
//! anonymous callers; writes need an authenticated staff member or superuser.

use crate::models::User;

/// Operations a caller can attempt on a resource collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    PartialUpdate,
    Destroy,
    UploadImage,
}

impl Action {
    pub fn is_read_only(self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No authenticated caller
    Unauthenticated,
    /// Authenticated, but not an administrator
    Forbidden,
}

/// Decide whether `user` may perform `action`
pub fn authorize(user: Option<&User>, action: Action) -> Result<(), Denial> {
    if action.is_read_only() {
        return Ok(());
    }

    let user = user.ok_or(Denial::Unauthenticated)?;
    if user.is_admin() {
        Ok(())
    } else {
        Err(Denial::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const ALL: [Action; 7] = [
        Action::List,
        Action::Retrieve,
        Action::Create,
        Action::Update,
        Action::PartialUpdate,
        Action::Destroy,
        Action::UploadImage,
    ];

    fn user(is_staff: bool, is_superuser: bool) -> User {
        User {
            id: 1,
            email: "test@example.com".to_string(),
            name: String::new(),
            password_hash: String::new(),
            is_active: true,
            is_staff,
            is_superuser,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_anonymous_may_only_read() {
        for action in ALL {
            let expected = if action.is_read_only() {
                Ok(())
            } else {
                Err(Denial::Unauthenticated)
            };
            assert_eq!(authorize(None, action), expected, "{:?}", action);
        }
    }

    #[test]
    fn test_regular_user_is_read_only() {
        let regular = user(false, false);
        for action in ALL {
            let expected = if action.is_read_only() {
                Ok(())
            } else {
                Err(Denial::Forbidden)
            };
            assert_eq!(authorize(Some(&regular), action), expected, "{:?}", action);
        }
    }

    #[test]
    fn test_staff_and_superuser_may_do_everything() {
        for admin in [user(true, false), user(false, true), user(true, true)] {
            for action in ALL {
                assert_eq!(authorize(Some(&admin), action), Ok(()));
            }
        }
    }
}
