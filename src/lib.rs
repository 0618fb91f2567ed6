//! branch-protector - uniform GitLab branch protection across groups
//!
//! For every configured group, every project in the group gets the same
//! protection rule on every configured branch: push and merge restricted to
//! Developer and above, force-push disabled.
//!
//! ## Modules
//!
//! - [`config`]: Environment-driven run configuration
//! - [`gitlab`]: GitLab REST API client
//! - [`projects`]: Paginated group project enumeration
//! - [`protection`]: Per-branch protection reconciliation
//! - [`sync`]: Run orchestration and summary

pub mod config;
pub mod gitlab;
pub mod projects;
pub mod protection;
pub mod sync;

pub use config::Config;
pub use gitlab::{GitLabClient, GitLabError, Project};
pub use projects::list_projects;
pub use protection::{AccessLevel, ProtectionOutcome, ProtectionRule, Reconciler};
pub use sync::{BranchResult, Protector, RunSummary};
