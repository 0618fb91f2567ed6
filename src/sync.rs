//! Run orchestration
//!
//! Walks every configured group, enumerates its projects and reconciles each
//! configured branch. Work is strictly sequential. Failures to enumerate a
//! group abort the run; failures on a single branch are recorded and skipped.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::Config;
use crate::gitlab::{GitLabClient, Project};
use crate::projects::list_projects;
use crate::protection::{ProtectionOutcome, Reconciler};

/// Result of reconciling one branch of one project
#[derive(Debug, Clone)]
pub struct BranchResult {
    pub group: String,
    pub project_id: u64,
    pub project_name: String,
    pub branch: String,
    pub outcome: ProtectionOutcome,
}

/// Results from a complete protection run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub groups_processed: usize,
    pub projects_visited: usize,
    pub protected: usize,
    pub updated: usize,
    pub planned: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<BranchResult>,
}

impl RunSummary {
    fn compile(
        groups_processed: usize,
        projects_visited: usize,
        results: Vec<BranchResult>,
        duration: Duration,
    ) -> Self {
        let mut summary = Self {
            groups_processed,
            projects_visited,
            protected: 0,
            updated: 0,
            planned: 0,
            failed: 0,
            duration,
            results: Vec::new(),
        };

        for result in &results {
            match result.outcome {
                ProtectionOutcome::Protected => summary.protected += 1,
                ProtectionOutcome::Updated => summary.updated += 1,
                ProtectionOutcome::Planned { .. } => summary.planned += 1,
                ProtectionOutcome::UpdateFailed { .. } | ProtectionOutcome::Failed { .. } => {
                    summary.failed += 1
                }
            }
        }

        summary.results = results;
        summary
    }

    /// Results that ended in a failure state
    pub fn failures(&self) -> impl Iterator<Item = &BranchResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }
}

/// Drives a full protection run over the configured groups
#[derive(Clone)]
pub struct Protector {
    config: Arc<Config>,
    client: GitLabClient,
    reconciler: Reconciler,
}

impl Protector {
    /// Create a protector for the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let client = GitLabClient::new(&config).context("Failed to create GitLab client")?;
        let reconciler = Reconciler::new(client.clone(), config.dry_run);

        Ok(Self {
            config: Arc::new(config),
            client,
            reconciler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reconcile every configured branch on every project of every group
    pub async fn run(&self) -> Result<RunSummary> {
        let start_time = Instant::now();
        let mut results = Vec::new();
        let mut projects_visited = 0;

        for group in &self.config.groups {
            info!("Processing group: {}...", group);

            let projects = list_projects(&self.client, group)
                .await
                .with_context(|| format!("Failed to list projects for group {}", group))?;
            projects_visited += projects.len();

            for project in &projects {
                for branch in &self.config.protected_branches {
                    let outcome = self.reconciler.reconcile(project, branch).await;
                    results.push(BranchResult {
                        group: group.clone(),
                        project_id: project.id,
                        project_name: project.name.clone(),
                        branch: branch.clone(),
                        outcome,
                    });
                }
            }
        }

        let summary = RunSummary::compile(
            self.config.groups.len(),
            projects_visited,
            results,
            start_time.elapsed(),
        );

        info!(
            "Run completed in {:.2}s: {} protected, {} updated, {} planned, {} failed",
            summary.duration.as_secs_f64(),
            summary.protected,
            summary.updated,
            summary.planned,
            summary.failed
        );

        Ok(summary)
    }

    /// Enumerate the projects of every configured group without touching protections
    pub async fn list(&self) -> Result<Vec<(String, Vec<Project>)>> {
        let mut listing = Vec::with_capacity(self.config.groups.len());

        for group in &self.config.groups {
            let projects = list_projects(&self.client, group)
                .await
                .with_context(|| format!("Failed to list projects for group {}", group))?;
            listing.push((group.clone(), projects));
        }

        Ok(listing)
    }
}
