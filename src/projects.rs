//! Group project enumeration

use tracing::{debug, info};

use crate::gitlab::{GitLabClient, GitLabError, Project};

/// Page size used for group project listings
pub const PER_PAGE: u32 = 100;

/// List every project in a group, in the order the service returns them
///
/// The group reference is resolved to its numeric ID first. Pages are fetched
/// from 1 upwards until one comes back empty; total-count headers are ignored.
pub async fn list_projects(
    client: &GitLabClient,
    group: &str,
) -> Result<Vec<Project>, GitLabError> {
    let resolved = client.get_group(group).await?;
    let group_id = resolved.id;
    debug!(
        "Resolved group {} ({}) to ID {}",
        group,
        resolved.full_path.as_deref().unwrap_or(group),
        group_id
    );

    let mut projects = Vec::new();
    let mut page = 1u32;

    loop {
        let items = client.list_group_projects(group_id, page, PER_PAGE).await?;
        if items.is_empty() {
            break;
        }

        debug!("Fetched {} projects from page {} of group {}", items.len(), page, group);
        projects.extend(items);
        page += 1;
    }

    info!("Found {} projects in group {}.", projects.len(), group);
    Ok(projects)
}
