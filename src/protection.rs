//! Branch protection reconciliation
//!
//! Brings one (project, branch) pair to the canonical protection rule: push and
//! merge at Developer level, force-push disabled. The call sequence is fixed:
//!
//! 1. list the project's protected branches
//! 2. if the branch is already listed, delete its rule (result ignored)
//! 3. create the rule
//! 4. if creation reports the branch as already protected (400), update it in place
//!
//! Every failure here is reported through [`ProtectionOutcome`] and never aborts
//! the run.

use reqwest::StatusCode;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::gitlab::{GitLabClient, Project};

/// GitLab access tiers accepted by the protected branches API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    NoAccess,
    Developer,
    Maintainer,
    Admin,
}

impl AccessLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            AccessLevel::NoAccess => 0,
            AccessLevel::Developer => 30,
            AccessLevel::Maintainer => 40,
            AccessLevel::Admin => 60,
        }
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

/// Body of the create and update protection requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectionRule {
    pub name: String,
    pub push_access_level: AccessLevel,
    pub merge_access_level: AccessLevel,
    pub allow_force_push: bool,
}

impl ProtectionRule {
    /// The rule enforced on every configured branch
    pub fn developer(branch: &str) -> Self {
        Self {
            name: branch.to_string(),
            push_access_level: AccessLevel::Developer,
            merge_access_level: AccessLevel::Developer,
            allow_force_push: false,
        }
    }
}

/// Terminal state of one reconcile call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionOutcome {
    /// Rule created (201)
    Protected,
    /// Creation conflicted and the in-place update succeeded
    Updated,
    /// Dry run: nothing was changed
    Planned { already_protected: bool },
    /// Creation conflicted and the in-place update failed
    UpdateFailed { status: Option<u16> },
    /// Pre-check or creation failed
    Failed { status: Option<u16> },
}

impl ProtectionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ProtectionOutcome::UpdateFailed { .. } | ProtectionOutcome::Failed { .. }
        )
    }
}

impl fmt::Display for ProtectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn status(code: &Option<u16>) -> String {
            code.map(|c| c.to_string())
                .unwrap_or_else(|| "no response".to_string())
        }

        match self {
            ProtectionOutcome::Protected => write!(f, "protected"),
            ProtectionOutcome::Updated => write!(f, "updated"),
            ProtectionOutcome::Planned {
                already_protected: true,
            } => write!(f, "would re-protect"),
            ProtectionOutcome::Planned {
                already_protected: false,
            } => write!(f, "would protect"),
            ProtectionOutcome::UpdateFailed { status: code } => {
                write!(f, "update failed (status: {})", status(code))
            }
            ProtectionOutcome::Failed { status: code } => {
                write!(f, "failed (status: {})", status(code))
            }
        }
    }
}

/// Applies the canonical protection rule to project branches
#[derive(Clone)]
pub struct Reconciler {
    client: GitLabClient,
    dry_run: bool,
}

impl Reconciler {
    pub fn new(client: GitLabClient, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    /// Reconcile protection for one branch of one project
    pub async fn reconcile(&self, project: &Project, branch: &str) -> ProtectionOutcome {
        let existing = match self.client.list_protected_branches(project.id).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(
                    "Failed to read protected branches for branch {} in project {} (ID: {}): {}",
                    branch, project.name, project.id, e
                );
                return ProtectionOutcome::Failed {
                    status: e.status().map(|s| s.as_u16()),
                };
            }
        };
        let already_protected = existing.iter().any(|b| b.name == branch);

        if self.dry_run {
            info!(
                "[dry run] Would {} branch {} in project {} (ID: {})",
                if already_protected { "re-protect" } else { "protect" },
                branch,
                project.name,
                project.id
            );
            return ProtectionOutcome::Planned { already_protected };
        }

        if already_protected {
            info!(
                "Updating protection for branch {} in project {} (ID: {})...",
                branch, project.name, project.id
            );
            // Best effort: a failed delete surfaces as a 400 on create below
            match self.client.unprotect_branch(project.id, branch).await {
                Ok(status) => debug!("Unprotect {} returned {}", branch, status),
                Err(e) => debug!("Unprotect {} failed: {}", branch, e),
            }
        }

        let rule = ProtectionRule::developer(branch);
        match self.client.protect_branch(project.id, &rule).await {
            Ok(StatusCode::CREATED) => {
                info!(
                    "Branch {} in project {} (ID: {}) is now protected.",
                    branch, project.name, project.id
                );
                ProtectionOutcome::Protected
            }
            Ok(StatusCode::BAD_REQUEST) => {
                info!(
                    "Branch {} in project {} (ID: {}) is already protected. Updating settings.",
                    branch, project.name, project.id
                );
                self.update(project, &rule).await
            }
            Ok(status) => {
                error!(
                    "Failed to protect branch {} in project {} (ID: {}). Status: {}",
                    branch,
                    project.name,
                    project.id,
                    status.as_u16()
                );
                ProtectionOutcome::Failed {
                    status: Some(status.as_u16()),
                }
            }
            Err(e) => {
                error!(
                    "Failed to protect branch {} in project {} (ID: {}): {}",
                    branch, project.name, project.id, e
                );
                ProtectionOutcome::Failed {
                    status: e.status().map(|s| s.as_u16()),
                }
            }
        }
    }

    async fn update(&self, project: &Project, rule: &ProtectionRule) -> ProtectionOutcome {
        match self.client.update_protection(project.id, rule).await {
            Ok(StatusCode::OK) => {
                info!(
                    "Updated protection settings for branch {} in project {} (ID: {}).",
                    rule.name, project.name, project.id
                );
                ProtectionOutcome::Updated
            }
            Ok(status) => {
                warn!(
                    "Failed to update settings for branch {} in project {} (ID: {}). Status: {}",
                    rule.name,
                    project.name,
                    project.id,
                    status.as_u16()
                );
                ProtectionOutcome::UpdateFailed {
                    status: Some(status.as_u16()),
                }
            }
            Err(e) => {
                warn!(
                    "Failed to update settings for branch {} in project {} (ID: {}): {}",
                    rule.name, project.name, project.id, e
                );
                ProtectionOutcome::UpdateFailed {
                    status: e.status().map(|s| s.as_u16()),
                }
            }
        }
    }
}
