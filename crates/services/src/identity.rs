use std::sync::Arc;

use assess_core::model::{
    Email, FormName, RegistrationDraft, SessionToken, User, UserError, UserId, Username,
};
use chrono::{DateTime, Duration, Utc};
use storage::repository::{SessionRecord, SessionRepository, StorageError, UserRepository};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::error::IdentityError;
use crate::password::{hash_password, verify_password};

/// A caller whose session resolved to exactly one user.
///
/// Only `IdentityGate` can produce one, so holding an `Identity` is proof the
/// caller authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: UserId,
    username: Username,
}

impl Identity {
    pub(crate) fn new(user_id: UserId, username: Username) -> Self {
        Self { user_id, username }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn username(&self) -> &Username {
        &self.username
    }
}

/// A freshly opened session, returned by register and login.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub token: SessionToken,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
    pub email: Email,
}

/// Registers users, opens and closes sessions, and resolves session tokens.
#[derive(Clone)]
pub struct IdentityGate {
    clock: Clock,
    session_ttl: Duration,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl IdentityGate {
    #[must_use]
    pub fn new(
        clock: Clock,
        session_ttl: Duration,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            session_ttl,
            users,
            sessions,
        }
    }

    /// Create an account with one `not_started` progress row per form and
    /// open a session for it.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidInput` for blank fields or a malformed email.
    /// Returns `IdentityError::Conflict` if the username or email is taken; nothing is created.
    /// Returns `IdentityError::Storage` if persistence fails.
    pub async fn register(&self, draft: RegistrationDraft) -> Result<SessionGrant, IdentityError> {
        let valid = draft.validate()?;
        let password_hash = hash_password(&valid.password)?;
        let user = User::new(
            UserId::generate(),
            valid.username,
            valid.email,
            password_hash,
            self.clock.now(),
        );

        match self.users.register_user(&user, &FormName::ALL).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                info!(username = %user.username(), "registration rejected: duplicate account");
                return Err(IdentityError::Conflict);
            }
            Err(err) => return Err(err.into()),
        }

        info!(user_id = %user.id(), username = %user.username(), "user registered");
        self.open_session(&user).await
    }

    /// Authenticate by username or email and open a session.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidInput` if either field is blank.
    /// Returns `IdentityError::BadCredentials` if the account is unknown or the password is wrong.
    /// Returns `IdentityError::Storage` if persistence fails.
    pub async fn login(&self, login: &str, password: &str) -> Result<SessionGrant, IdentityError> {
        let login = login.trim();
        if login.is_empty() {
            return Err(UserError::EmptyUsername.into());
        }
        if password.is_empty() {
            return Err(UserError::EmptyPassword.into());
        }

        let Some(user) = self.users.find_by_login(login).await? else {
            warn!("login rejected: unknown account");
            return Err(IdentityError::BadCredentials);
        };
        if !verify_password(password, user.password_hash())? {
            warn!(user_id = %user.id(), "login rejected: wrong password");
            return Err(IdentityError::BadCredentials);
        }

        let purged = self.sessions.purge_expired(self.clock.now()).await?;
        if purged > 0 {
            debug!(purged, "expired sessions removed");
        }

        info!(user_id = %user.id(), "user logged in");
        self.open_session(&user).await
    }

    /// End the session if there is one. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Storage` if persistence fails.
    pub async fn logout(&self, token: Option<&SessionToken>) -> Result<(), IdentityError> {
        if let Some(token) = token {
            self.sessions.delete_session(token).await?;
            debug!("session closed");
        }
        Ok(())
    }

    /// Resolve a session token to the user it belongs to.
    ///
    /// Expired sessions are deleted on the way out.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Unauthenticated` for a missing, unknown, or expired token.
    /// Returns `IdentityError::Storage` if persistence fails.
    pub async fn resolve(&self, token: Option<&SessionToken>) -> Result<Identity, IdentityError> {
        let token = token.ok_or(IdentityError::Unauthenticated)?;
        let session = self
            .sessions
            .get_session(token)
            .await?
            .ok_or(IdentityError::Unauthenticated)?;

        if session.is_expired(self.clock.now()) {
            self.sessions.delete_session(token).await?;
            debug!(user_id = %session.user_id, "expired session rejected");
            return Err(IdentityError::Unauthenticated);
        }

        let user = self
            .users
            .get_user(session.user_id)
            .await?
            .ok_or(IdentityError::Unauthenticated)?;
        Ok(Identity::new(user.id(), user.username().clone()))
    }

    async fn open_session(&self, user: &User) -> Result<SessionGrant, IdentityError> {
        let now = self.clock.now();
        let session = SessionRecord {
            token: SessionToken::generate(),
            user_id: user.id(),
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.sessions.create_session(&session).await?;

        Ok(SessionGrant {
            token: session.token,
            issued_at: session.created_at,
            expires_at: session.expires_at,
            identity: Identity::new(user.id(), user.username().clone()),
            email: user.email().clone(),
        })
    }
}
