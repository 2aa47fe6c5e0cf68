/// Authorization checks for house-scoped resources
///
/// The permission model is flat:
///
/// 1. **House membership**: most resources belong to one house, and a caller
///    only ever sees their own house. Foreign resources are reported as not
///    found by the handlers, never as forbidden.
/// 2. **Role**: parents manage the house, its members, join codes and task
///    validation. Children can only work on chores.
/// 3. **Admin flag**: platform operators manage billing plans, affiliates and
///    every house through the admin routes.
///
/// # Example
///
/// ```
/// use hearth_shared::auth::authorization::{require_house, require_parent};
/// use hearth_shared::auth::middleware::AuthContext;
/// use hearth_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let auth = AuthContext {
///     user_id: Uuid::new_v4(),
///     house_id: Some(Uuid::new_v4()),
///     role: UserRole::Parent,
///     is_admin: false,
/// };
///
/// assert!(require_house(&auth).is_ok());
/// assert!(require_parent(&auth).is_ok());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("You are not part of a house yet")]
    NoHouse,

    #[error("Only parents can do this")]
    NotParent,

    #[error("Administrator access required")]
    NotAdmin,

    #[error("Resource belongs to another house")]
    OtherHouse,
}

/// Returns the caller's house id
pub fn require_house(auth: &AuthContext) -> Result<Uuid, AuthzError> {
    auth.house_id.ok_or(AuthzError::NoHouse)
}

/// Requires a parent with a house, returning the house id
pub fn require_parent(auth: &AuthContext) -> Result<Uuid, AuthzError> {
    let house_id = require_house(auth)?;
    if !auth.is_parent() {
        return Err(AuthzError::NotParent);
    }
    Ok(house_id)
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if !auth.is_admin {
        return Err(AuthzError::NotAdmin);
    }
    Ok(())
}

/// Requires `resource_house_id` to be the caller's house
pub fn require_same_house(auth: &AuthContext, resource_house_id: Uuid) -> Result<(), AuthzError> {
    match auth.house_id {
        Some(id) if id == resource_house_id => Ok(()),
        Some(_) => Err(AuthzError::OtherHouse),
        None => Err(AuthzError::NoHouse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn context(role: UserRole, house_id: Option<Uuid>, is_admin: bool) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            house_id,
            role,
            is_admin,
        }
    }

    #[test]
    fn test_require_house() {
        let house = Uuid::new_v4();
        assert_eq!(require_house(&context(UserRole::Child, Some(house), false)), Ok(house));
        assert_eq!(
            require_house(&context(UserRole::Parent, None, false)),
            Err(AuthzError::NoHouse)
        );
    }

    #[test]
    fn test_require_parent() {
        let house = Uuid::new_v4();
        assert_eq!(require_parent(&context(UserRole::Parent, Some(house), false)), Ok(house));
        assert_eq!(
            require_parent(&context(UserRole::Child, Some(house), false)),
            Err(AuthzError::NotParent)
        );
        assert_eq!(
            require_parent(&context(UserRole::Parent, None, false)),
            Err(AuthzError::NoHouse)
        );
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&context(UserRole::Child, None, true)).is_ok());
        assert_eq!(
            require_admin(&context(UserRole::Parent, Some(Uuid::new_v4()), false)),
            Err(AuthzError::NotAdmin)
        );
    }

    #[test]
    fn test_require_same_house() {
        let house = Uuid::new_v4();
        let auth = context(UserRole::Parent, Some(house), false);

        assert!(require_same_house(&auth, house).is_ok());
        assert_eq!(require_same_house(&auth, Uuid::new_v4()), Err(AuthzError::OtherHouse));
    }
}
