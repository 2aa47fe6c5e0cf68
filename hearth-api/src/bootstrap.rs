/// Startup tasks run before the server accepts traffic
///
/// With `ADMIN_EMAIL` and `ADMIN_PASSWORD` set, an administrator account is
/// guaranteed to exist. An existing account with that email is promoted;
/// its password is left alone.

use crate::config::AdminBootstrap;
use anyhow::Context;
use hearth_shared::{
    auth::password::{hash_password, validate_password_strength},
    models::user::{CreateUser, UpdateUser, User, UserRole},
};
use sqlx::PgPool;

/// First name given to a bootstrapped administrator
pub const ADMIN_FIRST_NAME: &str = "Admin";

/// What [`ensure_admin`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOutcome {
    Created,
    Promoted,
    AlreadyAdmin,
}

pub async fn ensure_admin(pool: &PgPool, admin: &AdminBootstrap) -> anyhow::Result<AdminOutcome> {
    let email = admin.email.trim().to_lowercase();

    if let Some(user) = User::find_by_email(pool, &email).await? {
        if user.is_admin {
            return Ok(AdminOutcome::AlreadyAdmin);
        }

        User::update(
            pool,
            user.id,
            UpdateUser {
                is_admin: Some(true),
                ..Default::default()
            },
        )
        .await?;

        tracing::info!(user_id = %user.id, "Existing user promoted to administrator");
        return Ok(AdminOutcome::Promoted);
    }

    validate_password_strength(&admin.password).context("ADMIN_PASSWORD is too weak")?;
    let password_hash = hash_password(&admin.password)?;

    let user = User::create(
        pool,
        CreateUser {
            first_name: ADMIN_FIRST_NAME.to_string(),
            last_name: None,
            email: Some(email),
            password_hash: Some(password_hash),
            role: UserRole::Parent,
            is_admin: true,
            house_id: None,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "Administrator account created");
    Ok(AdminOutcome::Created)
}
