use serde::{Deserialize, Serialize};

/// An action a caller may be permitted to trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Upload,
    Process,
    Retry,
    BulkProcess,
    Export,
    Verify,
    SetExpected,
    CommandPalette,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Permission::View,
        Permission::Upload,
        Permission::Process,
        Permission::Retry,
        Permission::BulkProcess,
        Permission::Export,
        Permission::Verify,
        Permission::SetExpected,
        Permission::CommandPalette,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Upload => "upload",
            Self::Process => "process",
            Self::Retry => "retry",
            Self::BulkProcess => "bulk_process",
            Self::Export => "export",
            Self::Verify => "verify",
            Self::SetExpected => "set_expected",
            Self::CommandPalette => "command_palette",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the eight assignable roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Executive,
    SiteManager,
    EnvironmentalManager,
    SafetyManager,
    FieldSampler,
    LabTech,
    Admin,
    ReadOnly,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Executive,
        Role::SiteManager,
        Role::EnvironmentalManager,
        Role::SafetyManager,
        Role::FieldSampler,
        Role::LabTech,
        Role::Admin,
        Role::ReadOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executive => "executive",
            Self::SiteManager => "site_manager",
            Self::EnvironmentalManager => "environmental_manager",
            Self::SafetyManager => "safety_manager",
            Self::FieldSampler => "field_sampler",
            Self::LabTech => "lab_tech",
            Self::Admin => "admin",
            Self::ReadOnly => "read_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }

    /// Position in the privilege order. Higher is more privileged; the top
    /// tier (admin, executive, environmental manager) shares one rank.
    pub fn privilege_rank(self) -> u8 {
        match self {
            Self::ReadOnly => 0,
            Self::FieldSampler => 1,
            Self::LabTech => 2,
            Self::SafetyManager => 3,
            Self::SiteManager => 4,
            Self::Admin | Self::Executive | Self::EnvironmentalManager => 5,
        }
    }

    pub fn can(self, permission: Permission) -> bool {
        permissions_for(self).contains(&permission)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const TOP_TIER: &[Permission] = &Permission::ALL;

const SITE_MANAGER: &[Permission] = &[
    Permission::View,
    Permission::Upload,
    Permission::Process,
    Permission::Retry,
    Permission::BulkProcess,
    Permission::Export,
    Permission::SetExpected,
    Permission::CommandPalette,
];

const SAFETY_MANAGER: &[Permission] = &[
    Permission::View,
    Permission::Upload,
    Permission::Export,
    Permission::CommandPalette,
];

const LAB_TECH: &[Permission] = &[
    Permission::View,
    Permission::Upload,
    Permission::Process,
    Permission::Retry,
    Permission::Verify,
    Permission::CommandPalette,
];

const FIELD_SAMPLER: &[Permission] = &[Permission::View, Permission::Upload];

const READ_ONLY: &[Permission] = &[Permission::View];

/// The static permission set of a role.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin | Role::Executive | Role::EnvironmentalManager => TOP_TIER,
        Role::SiteManager => SITE_MANAGER,
        Role::SafetyManager => SAFETY_MANAGER,
        Role::LabTech => LAB_TECH,
        Role::FieldSampler => FIELD_SAMPLER,
        Role::ReadOnly => READ_ONLY,
    }
}
