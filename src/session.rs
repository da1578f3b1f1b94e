//! Explicit user session: who is signed in and whether consent was given.
//!
//! A `SessionContext` is constructed by the caller (usually `CoreState`),
//! optionally restored from the store, and disposed on shutdown. A fresh
//! context is signed out and unconsented; nothing signs a user in or
//! records consent implicitly.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{has_capability, AccessDecision};
use crate::db::{self, DatabaseError};
use crate::models::enums::{Capability, Role};

const USER_KEY: &str = "medai_user";
const CONSENT_KEY: &str = "medai_consent";
const CONSENT_DATE_KEY: &str = "medai_consent_date";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Email and password are required")]
    InvalidCredentials,
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Session storage error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Default)]
pub struct SessionContext {
    user: Option<User>,
    consented_at: Option<String>,
}

impl SessionContext {
    /// A signed-out, unconsented session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from the persisted user and consent entries.
    ///
    /// Unreadable entries are dropped and the session starts signed out.
    pub fn restore(conn: &Connection) -> Result<Self, SessionError> {
        let user: Option<User> = db::kv_get_json(conn, USER_KEY)?;
        let consented = db::kv_get(conn, CONSENT_KEY)?.as_deref() == Some("true");
        let consented_at = if consented && user.is_some() {
            Some(db::kv_get(conn, CONSENT_DATE_KEY)?.unwrap_or_default())
        } else {
            None
        };
        if let Some(u) = &user {
            tracing::info!(user = %u.email, role = %u.role, "Session restored");
        }
        Ok(Self { user, consented_at })
    }

    /// Mock sign-in: any non-empty email/password pair is accepted.
    /// Emails containing "admin" get the admin role, all others clinician.
    pub fn login(
        &mut self,
        conn: &Connection,
        email: &str,
        password: &str,
    ) -> Result<&User, SessionError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(SessionError::InvalidCredentials);
        }
        let role = if email.contains("admin") {
            Role::Admin
        } else {
            Role::Clinician
        };
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            role,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        db::kv_set_json(conn, USER_KEY, &user)?;
        tracing::info!(user = %user.email, role = %user.role, "Signed in");
        Ok(self.user.insert(user))
    }

    /// Sign out and forget consent, in memory and in the store.
    pub fn logout(&mut self, conn: &Connection) -> Result<(), SessionError> {
        db::kv_remove(conn, USER_KEY)?;
        db::kv_remove(conn, CONSENT_KEY)?;
        db::kv_remove(conn, CONSENT_DATE_KEY)?;
        if let Some(u) = self.user.take() {
            tracing::info!(user = %u.email, "Signed out");
        }
        self.consented_at = None;
        Ok(())
    }

    pub fn accept_consent(&mut self, conn: &Connection) -> Result<(), SessionError> {
        if self.user.is_none() {
            return Err(SessionError::NotAuthenticated);
        }
        let now = chrono::Utc::now().to_rfc3339();
        db::kv_set(conn, CONSENT_KEY, "true")?;
        db::kv_set(conn, CONSENT_DATE_KEY, &now)?;
        self.consented_at = Some(now);
        Ok(())
    }

    /// Drop in-memory state. Persisted entries are kept for the next restore.
    pub fn dispose(&mut self) {
        self.user = None;
        self.consented_at = None;
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_consented(&self) -> bool {
        self.consented_at.is_some()
    }

    pub fn consented_at(&self) -> Option<&str> {
        self.consented_at.as_deref()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.user.as_ref().is_some_and(|u| u.role == role)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| has_capability(u.role, capability))
    }

    /// Full gate for case operations: signed in, consented, capable.
    pub fn check(&self, capability: Capability) -> AccessDecision {
        let Some(user) = &self.user else {
            return AccessDecision::Unauthenticated;
        };
        if !self.has_consented() {
            return AccessDecision::ConsentRequired;
        }
        if !has_capability(user.role, capability) {
            return AccessDecision::Forbidden(capability);
        }
        AccessDecision::Allowed
    }
}
