//! Effective-role resolution from a caller's role assignments.
//!
//! Resolution order:
//! 1. Site given: pool = assignments on that site plus global ones.
//!    No site: pool = global assignments only.
//! 2. Empty pool: fall back to every assignment the caller has.
//! 3. Pick the most privileged role in the pool (first seen wins a tie).
//! 4. No assignments at all: `read_only`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::roles::{permissions_for, Permission, Role};

/// A role granted to a user, either on one site or globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub id: String,
    pub user_id: String,
    pub role_id: String,
    pub role_name: Role,
    /// `None` means the assignment applies to every site.
    pub site_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(user_id: &str, role: Role, site_id: Option<&str>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            role_id: role.as_str().to_string(),
            role_name: role,
            site_id: site_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.site_id.is_none()
    }
}

/// A refused action. Carries the message shown to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("You do not have permission to {action} (your role: {role})")]
    Denied { action: Permission, role: Role },
}

impl AuthorizationError {
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Resolves permissions from a snapshot of assignments fetched for a session.
#[derive(Debug, Clone, Default)]
pub struct PermissionResolver {
    assignments: Vec<RoleAssignment>,
}

impl PermissionResolver {
    pub fn new(assignments: Vec<RoleAssignment>) -> Self {
        Self { assignments }
    }

    pub fn assignments(&self) -> &[RoleAssignment] {
        &self.assignments
    }

    /// The single role whose permissions apply for `site`.
    pub fn effective_role(&self, site: Option<&str>) -> Role {
        let scoped: Vec<&RoleAssignment> = self
            .assignments
            .iter()
            .filter(|a| match site {
                Some(site) => a.is_global() || a.site_id.as_deref() == Some(site),
                None => a.is_global(),
            })
            .collect();

        let pool: Vec<&RoleAssignment> = if scoped.is_empty() {
            self.assignments.iter().collect()
        } else {
            scoped
        };

        let mut best: Option<Role> = None;
        for assignment in pool {
            let role = assignment.role_name;
            match best {
                Some(current) if role.privilege_rank() <= current.privilege_rank() => {}
                _ => best = Some(role),
            }
        }

        let role = best.unwrap_or(Role::ReadOnly);
        debug!(role = %role, site = site.unwrap_or("<global>"), "Resolved effective role");
        role
    }

    pub fn permissions(&self, site: Option<&str>) -> &'static [Permission] {
        permissions_for(self.effective_role(site))
    }

    pub fn can(&self, permission: Permission, site: Option<&str>) -> bool {
        self.effective_role(site).can(permission)
    }

    /// Like [`can`](Self::can), but returns the refusal for display.
    pub fn require(&self, permission: Permission, site: Option<&str>) -> Result<Role, AuthorizationError> {
        let role = self.effective_role(site);
        if role.can(permission) {
            Ok(role)
        } else {
            warn!(
                action = %permission,
                role = %role,
                site = site.unwrap_or("<global>"),
                "Action denied"
            );
            Err(AuthorizationError::Denied {
                action: permission,
                role,
            })
        }
    }
}
