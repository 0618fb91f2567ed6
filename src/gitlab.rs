//! GitLab REST API v4 client
//!
//! Thin typed wrapper over the handful of endpoints needed to enumerate group
//! projects and manage protected branches. One `reqwest::Client` is shared for
//! the whole run and carries the `PRIVATE-TOKEN` header on every request.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::protection::ProtectionRule;

/// Header GitLab reads personal/project access tokens from
pub const TOKEN_HEADER: &str = "private-token";

/// Errors raised by the GitLab client
#[derive(Debug, Error)]
pub enum GitLabError {
    #[error("invalid GitLab URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("GITLAB_TOKEN is not a valid HTTP header value")]
    InvalidToken,

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("group {group} was not found")]
    GroupNotFound { group: String },

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl GitLabError {
    /// HTTP status attached to the error, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GitLabError::Status { status, .. } => Some(*status),
            GitLabError::GroupNotFound { .. } => Some(StatusCode::NOT_FOUND),
            GitLabError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Group as returned by `GET /groups/{group}`
#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: u64,
    #[serde(default)]
    pub full_path: Option<String>,
}

/// Project as returned by the group projects listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl Project {
    /// Namespaced path when known, bare name otherwise
    pub fn display_name(&self) -> &str {
        self.path_with_namespace.as_deref().unwrap_or(&self.name)
    }
}

/// Entry of `GET /projects/{id}/protected_branches`
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectedBranch {
    pub name: String,
}

/// GitLab API client
#[derive(Clone, Debug)]
pub struct GitLabClient {
    http: reqwest::Client,
    base: Url,
}

impl GitLabClient {
    /// Create a client for the instance and token named in `config`
    pub fn new(config: &Config) -> Result<Self, GitLabError> {
        let api_base = config.api_base();
        let base = Url::parse(&api_base).map_err(|e| GitLabError::InvalidUrl {
            url: api_base.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(GitLabError::InvalidUrl {
                url: api_base,
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let mut token =
            HeaderValue::from_str(&config.gitlab_token).map_err(|_| GitLabError::InvalidToken)?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(TOKEN_HEADER), token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("branch-protector/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GitLabError::Client)?;

        Ok(Self { http, base })
    }

    /// Build an API URL from raw path segments; each segment is percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base URLs, so segments are always available
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Resolve a group name or path to its numeric ID
    pub async fn get_group(&self, group: &str) -> Result<Group, GitLabError> {
        let url = self.endpoint(&["groups", group]);
        match self.get_json::<Group>(url).await {
            Err(GitLabError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(GitLabError::GroupNotFound {
                    group: group.to_string(),
                })
            }
            other => other,
        }
    }

    /// Fetch one page of a group's projects
    pub async fn list_group_projects(
        &self,
        group_id: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Project>, GitLabError> {
        let mut url = self.endpoint(&["groups", &group_id.to_string(), "projects"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        self.get_json(url).await
    }

    /// List the protection rules currently configured on a project
    pub async fn list_protected_branches(
        &self,
        project_id: u64,
    ) -> Result<Vec<ProtectedBranch>, GitLabError> {
        let url = self.endpoint(&["projects", &project_id.to_string(), "protected_branches"]);
        self.get_json(url).await
    }

    /// Remove a branch protection rule, returning whatever status the server sent
    pub async fn unprotect_branch(
        &self,
        project_id: u64,
        branch: &str,
    ) -> Result<StatusCode, GitLabError> {
        let url = self.endpoint(&[
            "projects",
            &project_id.to_string(),
            "protected_branches",
            branch,
        ]);
        self.send(Method::DELETE, url, None).await
    }

    /// Create a branch protection rule, returning the raw response status
    pub async fn protect_branch(
        &self,
        project_id: u64,
        rule: &ProtectionRule,
    ) -> Result<StatusCode, GitLabError> {
        let url = self.endpoint(&["projects", &project_id.to_string(), "protected_branches"]);
        self.send(Method::POST, url, Some(rule)).await
    }

    /// Overwrite an existing branch protection rule, returning the raw response status
    pub async fn update_protection(
        &self,
        project_id: u64,
        rule: &ProtectionRule,
    ) -> Result<StatusCode, GitLabError> {
        let url = self.endpoint(&[
            "projects",
            &project_id.to_string(),
            "protected_branches",
            &rule.name,
        ]);
        self.send(Method::PUT, url, Some(rule)).await
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&ProtectionRule>,
    ) -> Result<StatusCode, GitLabError> {
        debug!("{} {}", method, url);

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| GitLabError::Transport {
                method,
                url: url.to_string(),
                source,
            })?;

        Ok(response.status())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GitLabError> {
        debug!("GET {}", url);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| GitLabError::Transport {
                method: Method::GET,
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitLabError::Status {
                method: Method::GET,
                url: url.to_string(),
                status,
                body,
            });
        }

        response.json::<T>().await.map_err(|source| GitLabError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
