// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registration, login, and profiles.

use std::sync::Arc;

use knot_core::{KnotError, PasswordHasher, User, UserId, UsernameCheck};
use knot_storage::queries::users;
use knot_storage::ConnectionPool;
use tracing::{debug, info};

use crate::validate;

const BAD_CREDENTIALS: &str = "invalid username or password";

#[derive(Clone)]
pub struct UserService {
    pool: Arc<ConnectionPool>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    pub fn new(pool: Arc<ConnectionPool>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { pool, hasher }
    }

    /// Creates an account. Hashing happens before a connection is taken from
    /// the pool, since it is deliberately slow.
    pub fn register(&self, username: &str, password: &str) -> Result<User, KnotError> {
        validate::username(username)?;
        validate::password(password)?;
        let hash = self.hasher.hash(password)?;

        let conn = self.pool.acquire()?;
        match users::create(&conn, username, &hash)? {
            Some(user) => {
                info!(user_id = user.id, "user registered");
                Ok(user)
            }
            None => Err(KnotError::Conflict(format!(
                "username {username} is already taken"
            ))),
        }
    }

    /// Checks credentials. Unknown users and wrong passwords fail the same way.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, KnotError> {
        let credentials = {
            let conn = self.pool.acquire()?;
            users::credentials(&conn, username)?
        };
        let Some((id, hash)) = credentials else {
            debug!("login for unknown username");
            return Err(KnotError::Unauthorized(BAD_CREDENTIALS.into()));
        };
        if !self.hasher.verify(password, &hash) {
            debug!(user_id = id, "login with wrong password");
            return Err(KnotError::Unauthorized(BAD_CREDENTIALS.into()));
        }
        self.get(id)
    }

    /// Replaces the password after checking the current one. Both hashing
    /// steps run without a pooled connection held.
    pub fn change_password(&self, id: UserId, old_password: &str, new_password: &str) -> Result<(), KnotError> {
        validate::password(new_password)?;
        let current = {
            let conn = self.pool.acquire()?;
            users::password_hash(&conn, id)?
        };
        let current = current.ok_or_else(|| KnotError::not_found("user", id))?;
        if !self.hasher.verify(old_password, &current) {
            debug!(user_id = id, "password change with wrong current password");
            return Err(KnotError::Unauthorized("current password is incorrect".into()));
        }
        let hash = self.hasher.hash(new_password)?;

        let conn = self.pool.acquire()?;
        if !users::update_password_hash(&conn, id, &hash)? {
            return Err(KnotError::not_found("user", id));
        }
        info!(user_id = id, "password changed");
        Ok(())
    }

    /// Reports whether `username` could be registered right now.
    pub fn check_username(&self, username: &str) -> Result<UsernameCheck, KnotError> {
        let valid = validate::username(username).is_ok();
        let available = valid && {
            let conn = self.pool.acquire()?;
            !users::username_exists(&conn, username)?
        };
        Ok(UsernameCheck {
            username: username.to_string(),
            valid,
            available,
        })
    }

    pub fn get(&self, id: UserId) -> Result<User, KnotError> {
        let conn = self.pool.acquire()?;
        users::get(&conn, id)?.ok_or_else(|| KnotError::not_found("user", id))
    }

    pub fn update_bio(&self, id: UserId, bio: &str) -> Result<User, KnotError> {
        validate::text("bio", bio, validate::BIO_MAX, false)?;
        let conn = self.pool.acquire()?;
        if !users::update_bio(&conn, id, bio)? {
            return Err(KnotError::not_found("user", id));
        }
        users::get(&conn, id)?.ok_or_else(|| KnotError::not_found("user", id))
    }
}
