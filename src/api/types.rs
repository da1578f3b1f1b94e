//! Shared types for the API layer.

use std::sync::Arc;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::Capability;
use crate::session::User;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Gate a handler on the session: signed in, consented, and holding
    /// `capability`. Returns the acting user.
    pub fn authorize(&self, capability: Capability) -> Result<User, ApiError> {
        let session = self.core.read_session()?;
        let decision = session.check(capability);
        if !decision.is_allowed() {
            tracing::debug!(capability = %capability, ?decision, "Access denied");
            return Err(decision.into());
        }
        session.user().cloned().ok_or(ApiError::Unauthorized)
    }
}
