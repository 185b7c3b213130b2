//! Account commands: register, login, password and profile changes.

use super::require;
use crate::auth::{DEMO_DEV_USER, DEMO_QA_USER, Identity, PasswordHasher, TokenSigner};
use crate::models::{Role, User, UserProfile};
use crate::storage::{Query, Storage, fetch, find_one, insert, load, replace};
use crate::{Error, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
}

/// A signed-in user.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    find_one(conn, &Query::new().eq("username", username.trim()))
}

fn session(signer: &TokenSigner, user: &User) -> Result<Session> {
    let token = signer.issue(&Identity::new(user.id.clone(), user.role))?;
    Ok(Session {
        token,
        user: user.profile(),
    })
}

/// Create an account and sign it in.
pub fn register(
    storage: &mut Storage,
    signer: &TokenSigner,
    hasher: &dyn PasswordHasher,
    registration: Registration,
) -> Result<Session> {
    require(&registration.name, "Name")?;
    require(&registration.username, "Username")?;
    require(&registration.password, "Password")?;

    let password_hash = hasher.hash(&registration.password)?;
    let user = User::new(
        registration.name.trim().to_string(),
        registration.username.trim().to_string(),
        password_hash,
        registration.role.unwrap_or(Role::Qa),
    );

    storage.write(|tx| {
        if find_by_username(tx, &user.username)?.is_some() {
            return Err(Error::Validation("Username already taken".to_string()));
        }
        insert(tx, &user)
    })?;

    info!(user = %user.username, role = %user.role, "Registered user");
    session(signer, &user)
}

/// Check credentials and issue a token.
pub fn login(
    storage: &Storage,
    signer: &TokenSigner,
    hasher: &dyn PasswordHasher,
    credentials: Credentials,
) -> Result<Session> {
    let invalid = || Error::Unauthorized("Invalid username or password".to_string());

    let user = storage
        .read(|conn| find_by_username(conn, &credentials.username))?
        .ok_or_else(invalid)?;
    if !hasher.verify(&credentials.password, &user.password_hash) {
        return Err(invalid());
    }

    session(signer, &user)
}

pub fn change_password(
    storage: &mut Storage,
    identity: &Identity,
    hasher: &dyn PasswordHasher,
    change: PasswordChange,
) -> Result<()> {
    require(&change.new_password, "New password")?;
    let new_hash = hasher.hash(&change.new_password)?;

    storage.write(|tx| {
        let mut user: User = load(tx, &identity.user_id)?;
        if !hasher.verify(&change.current_password, &user.password_hash) {
            return Err(Error::Validation("Current password is incorrect".to_string()));
        }
        user.password_hash = new_hash;
        replace(tx, &user)
    })?;

    info!(user_id = %identity.user_id, "Password changed");
    Ok(())
}

pub fn update_profile(
    storage: &mut Storage,
    identity: &Identity,
    update: ProfileUpdate,
) -> Result<UserProfile> {
    storage.write(|tx| {
        let mut user: User = load(tx, &identity.user_id)?;

        if let Some(name) = update.name {
            require(&name, "Name")?;
            user.name = name.trim().to_string();
        }
        if let Some(username) = update.username {
            require(&username, "Username")?;
            let username = username.trim().to_string();
            if let Some(other) = find_by_username(tx, &username)? {
                if other.id != user.id {
                    return Err(Error::Validation("Username already taken".to_string()));
                }
            }
            user.username = username;
        }

        replace(tx, &user)?;
        Ok(user.profile())
    })
}

/// Create the fixed demo accounts if they are missing.
///
/// They carry no usable password; the demo tokens are their only way in.
pub fn ensure_demo_users(storage: &mut Storage) -> Result<()> {
    storage.write(|tx| {
        for (id, name, role) in [
            (DEMO_QA_USER, "Demo QA", Role::Qa),
            (DEMO_DEV_USER, "Demo Developer", Role::Dev),
        ] {
            if fetch::<User>(tx, id)?.is_some() {
                continue;
            }
            let mut user = User::new(name.to_string(), id.to_string(), "!".to_string(), role);
            user.id = id.to_string();
            insert(tx, &user)?;
            info!(user = id, "Created demo account");
        }
        Ok(())
    })
}
