//! Role-based capability lookup.
//!
//! A fixed table maps each role to the capabilities it holds. Lookups are
//! pure; nothing here touches the session or the store.
//!
//! | role      | capabilities                                              |
//! |-----------|-----------------------------------------------------------|
//! | admin     | create_case, view_case, download, settings, manage_users, view_sensitive |
//! | clinician | create_case, view_case, download, view_sensitive          |
//! | staff     | create_case, view_case, download                          |
//! | viewer    | view_case                                                 |

use crate::models::enums::{Capability, Role};

const ADMIN: &[Capability] = &[
    Capability::CreateCase,
    Capability::ViewCase,
    Capability::Download,
    Capability::Settings,
    Capability::ManageUsers,
    Capability::ViewSensitive,
];

const CLINICIAN: &[Capability] = &[
    Capability::CreateCase,
    Capability::ViewCase,
    Capability::Download,
    Capability::ViewSensitive,
];

const STAFF: &[Capability] = &[
    Capability::CreateCase,
    Capability::ViewCase,
    Capability::Download,
];

const VIEWER: &[Capability] = &[Capability::ViewCase];

/// Capabilities granted to a role.
pub fn capabilities_for(role: Role) -> &'static [Capability] {
    match role {
        Role::Admin => ADMIN,
        Role::Clinician => CLINICIAN,
        Role::Staff => STAFF,
        Role::Viewer => VIEWER,
    }
}

pub fn has_capability(role: Role, capability: Capability) -> bool {
    capabilities_for(role).contains(&capability)
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    /// No authenticated user.
    Unauthenticated,
    /// Authenticated but consent not yet given.
    ConsentRequired,
    /// Role lacks the capability.
    Forbidden(Capability),
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        self == Self::Allowed
    }
}
