//! Common test utilities and helpers for branch-protector tests

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

use branch_protector::Config;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "glpat-test-token";

/// Build a configuration pointing at a mock server
pub fn test_config(uri: &str, groups: &[&str], branches: &[&str]) -> Config {
    Config {
        gitlab_url: uri.to_string(),
        gitlab_token: TEST_TOKEN.to_string(),
        groups: groups.iter().map(|g| g.to_string()).collect(),
        protected_branches: branches.iter().map(|b| b.to_string()).collect(),
        dry_run: false,
    }
}

/// Mock GitLab instance built on top of wiremock
pub struct MockGitLab {
    pub server: MockServer,
}

impl MockGitLab {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Serve `GET /groups/{name}` and a single page of projects
    ///
    /// Nested group paths are matched in their percent-encoded form.
    pub async fn with_group(&self, name: &str, id: u64, projects: &[(u64, &str)]) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v4/groups/{}", name.replace('/', "%2F"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id})))
            .mount(&self.server)
            .await;

        let page: Vec<Value> = projects
            .iter()
            .map(|(pid, pname)| json!({"id": pid, "name": pname}))
            .collect();

        Mock::given(method("GET"))
            .and(path(format!("/api/v4/groups/{}/projects", id)))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/api/v4/groups/{}/projects", id)))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.server)
            .await;
    }

    /// Serve the current protected branch listing of a project
    pub async fn with_protected(&self, project_id: u64, branches: &[&str]) {
        let listing: Vec<Value> = branches.iter().map(|b| json!({"name": b})).collect();

        Mock::given(method("GET"))
            .and(path(format!("/api/v4/projects/{}/protected_branches", project_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing))
            .mount(&self.server)
            .await;
    }

    /// Answer every mutating call with the given statuses
    pub async fn with_mutations(&self, create: u16, update: u16, delete: u16) {
        for (verb, status) in [("POST", create), ("PUT", update), ("DELETE", delete)] {
            Mock::given(method(verb))
                .respond_with(ResponseTemplate::new(status))
                .mount(&self.server)
                .await;
        }
    }

    /// Method and path of every received request, in order
    pub async fn calls(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect()
    }

    /// Decoded JSON bodies of every request with the given method
    pub async fn bodies(&self, verb: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.to_string() == verb)
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }
}
