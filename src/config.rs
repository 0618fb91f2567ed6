use anyhow::{anyhow, Result};
use std::fmt;

/// Environment variable holding the GitLab base endpoint
pub const ENV_GITLAB_URL: &str = "GITLAB_URL";
/// Environment variable holding the API token
pub const ENV_GITLAB_TOKEN: &str = "GITLAB_TOKEN";
/// Environment variable holding the comma-separated group references
pub const ENV_GROUPS: &str = "GROUPS";
/// Environment variable holding the comma-separated branch names
pub const ENV_PROTECTED_BRANCHES: &str = "PROTECTED_BRANCHES";

/// Run configuration, built once at startup and never mutated
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Base endpoint of the GitLab instance (without `/api/v4`)
    pub gitlab_url: String,

    /// Token sent as the `PRIVATE-TOKEN` header
    pub gitlab_token: String,

    /// Group references to process, in order
    pub groups: Vec<String>,

    /// Branch names to protect in every project
    pub protected_branches: Vec<String>,

    /// Only report what would change
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gitlab_url = required(&lookup, ENV_GITLAB_URL)?;
        let gitlab_token = required(&lookup, ENV_GITLAB_TOKEN)?;
        let groups = required_list(&lookup, ENV_GROUPS)?;
        let protected_branches = required_list(&lookup, ENV_PROTECTED_BRANCHES)?;

        Ok(Self {
            gitlab_url: gitlab_url.trim().to_string(),
            gitlab_token,
            groups,
            protected_branches,
            dry_run: false,
        })
    }

    /// Return a copy with dry-run mode set
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Base URL of the v4 REST API
    pub fn api_base(&self) -> String {
        format!("{}/api/v4", self.gitlab_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("gitlab_url", &self.gitlab_url)
            .field("gitlab_token", &"<redacted>")
            .field("groups", &self.groups)
            .field("protected_branches", &self.protected_branches)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(anyhow!("{} environment variable is not set.", key)),
    }
}

fn required_list<F>(lookup: &F, key: &str) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let items = split_list(&required(lookup, key)?);
    if items.is_empty() {
        return Err(anyhow!("{} environment variable contains no entries.", key));
    }
    Ok(items)
}

/// Split a comma-separated list, trimming items and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
