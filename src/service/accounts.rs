use tracing::{info, warn};

use crate::db::models::{NewUser, Role, User, UserId};
use crate::db::store::UserRepository;
use crate::error::PortalError;
use crate::service::password::CredentialVerifier;

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Create a student account.
///
/// Errors: [`PortalError::MissingFields`] for blank input,
/// [`PortalError::EmailTaken`] when the store rejects the email.
pub async fn register<S>(
    store: &S,
    verifier: &CredentialVerifier,
    form: Registration,
) -> Result<UserId, PortalError>
where
    S: UserRepository + ?Sized,
{
    let email = form.email.trim();
    let display_name = form.display_name.trim();
    if email.is_empty() || form.password.is_empty() || display_name.is_empty() {
        return Err(PortalError::MissingFields);
    }

    let password_hash = verifier.hash(&form.password).await?;
    let id = store
        .create_user(NewUser {
            email: email.to_string(),
            password_hash,
            display_name: display_name.to_string(),
            role: Role::Student,
        })
        .await?;
    info!(user_id = id, "registered new user");
    Ok(id)
}

/// Check credentials. Unknown email and wrong password both yield
/// [`PortalError::InvalidCredentials`].
pub async fn authenticate<S>(
    store: &S,
    verifier: &CredentialVerifier,
    email: &str,
    password: &str,
) -> Result<User, PortalError>
where
    S: UserRepository + ?Sized,
{
    let Some(user) = store.find_user_by_email(email.trim()).await? else {
        // spend the same hashing time as a real check
        let _ = verifier.hash(password).await;
        return Err(PortalError::InvalidCredentials);
    };
    if !verifier.verify(password, &user.password_hash).await {
        return Err(PortalError::InvalidCredentials);
    }
    Ok(user)
}

/// Seed one admin account when the store has none.
///
/// Returns the new admin's id, or `None` when an admin already exists.
pub async fn bootstrap_admin<S>(
    store: &S,
    verifier: &CredentialVerifier,
    email: &str,
    password: &str,
) -> Result<Option<UserId>, PortalError>
where
    S: UserRepository + ?Sized,
{
    if store.count_admins().await? > 0 {
        info!("admin account already present");
        return Ok(None);
    }

    let password_hash = verifier.hash(password).await?;
    let id = store
        .create_user(NewUser {
            email: email.to_string(),
            password_hash,
            display_name: "Admin".to_string(),
            role: Role::Admin,
        })
        .await?;
    warn!(
        user_id = id,
        email = %email,
        "created bootstrap admin with the configured default password; change it"
    );
    Ok(Some(id))
}
