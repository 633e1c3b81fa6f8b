//! Role-based permission resolution for already-authenticated callers.

pub mod resolver;
pub mod roles;

pub use resolver::{AuthorizationError, PermissionResolver, RoleAssignment};
pub use roles::{permissions_for, Permission, Role};
