use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::github::{GitHubClient, GitHubError};
use crate::snapshot::write_snapshot;

pub const FILE_NAME: &str = "projects.json";

const QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    projectsV2(first: 1) {
      nodes {
        title
        items(first: 100) {
          nodes {
            content {
              ... on Issue {
                title
                url
                labels(first: 10) { nodes { name } }
                assignees(first: 10) { nodes { login } }
              }
              ... on PullRequest {
                title
                url
                labels(first: 10) { nodes { name } }
                assignees(first: 10) { nodes { login } }
              }
            }
            fieldValues(first: 10) {
              nodes {
                ... on ProjectV2ItemFieldSingleSelectValue {
                  name
                  field { ... on ProjectV2SingleSelectField { name } }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const DEFAULT_STATUS: &str = "todo";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectItem {
    pub title: String,
    pub url: String,
    pub status: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct ProjectSnapshot {
    pub items: Vec<ProjectItem>,
}

// GraphQL shapes. Union members that match neither fragment come back as
// empty objects, so every field is optional.

#[derive(Debug, Deserialize)]
pub struct ProjectsData {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    projects_v2: Option<Connection<ProjectNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Connection<T> {
    #[serde(default)]
    nodes: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
struct ProjectNode {
    items: Option<Connection<ItemNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemNode {
    content: Option<ItemContent>,
    field_values: Option<Connection<FieldValue>>,
}

#[derive(Debug, Deserialize)]
struct ItemContent {
    title: Option<String>,
    url: Option<String>,
    labels: Option<Connection<Named>>,
    assignees: Option<Connection<Login>>,
}

#[derive(Debug, Deserialize)]
struct FieldValue {
    name: Option<String>,
    field: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Login {
    login: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueResponse {
    pub title: String,
    pub html_url: String,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(default)]
    pub assignees: Vec<IssueAssignee>,
}

#[derive(Debug, Deserialize)]
pub struct IssueLabel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueAssignee {
    pub login: String,
}

fn nodes<T>(connection: Option<Connection<T>>) -> impl Iterator<Item = T> {
    connection
        .map(|c| c.nodes)
        .unwrap_or_default()
        .into_iter()
        .flatten()
}

/// Items of the first project board. Items without content (drafts the
/// query cannot see) are skipped.
pub fn board_items(data: ProjectsData) -> Vec<ProjectItem> {
    let Some(project) = nodes(data.repository.and_then(|r| r.projects_v2)).next() else {
        return Vec::new();
    };

    nodes(project.items)
        .filter_map(|item| {
            let content = item.content?;
            let status = nodes(item.field_values)
                .find(|fv| {
                    fv.field
                        .as_ref()
                        .and_then(|f| f.name.as_deref())
                        .is_some_and(|n| n.eq_ignore_ascii_case("status"))
                })
                .and_then(|fv| fv.name)
                .unwrap_or_else(|| DEFAULT_STATUS.to_string());

            Some(ProjectItem {
                title: content.title.unwrap_or_default(),
                url: content.url.unwrap_or_default(),
                status: status.to_lowercase(),
                labels: nodes(content.labels).filter_map(|l| l.name).collect(),
                assignees: nodes(content.assignees).map(|a| a.login).collect(),
            })
        })
        .collect()
}

/// Board-style status guessed from issue labels, then issue state.
pub fn status_from_labels(labels: &[String], state: &str) -> &'static str {
    let labels: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();

    if mentions_any(&labels, &["in progress", "doing"]) {
        "in progress"
    } else if mentions_any(&labels, &["done", "completed", "closed"]) || state == "closed" {
        "done"
    } else {
        DEFAULT_STATUS
    }
}

fn mentions_any(labels: &[String], needles: &[&str]) -> bool {
    labels
        .iter()
        .any(|label| needles.iter().any(|needle| label.contains(needle)))
}

pub fn issue_items(issues: Vec<IssueResponse>) -> Vec<ProjectItem> {
    issues
        .into_iter()
        .map(|issue| {
            let labels: Vec<String> = issue.labels.into_iter().map(|l| l.name).collect();
            ProjectItem {
                status: status_from_labels(&labels, &issue.state).to_string(),
                title: issue.title,
                url: issue.html_url,
                labels,
                assignees: issue.assignees.into_iter().map(|a| a.login).collect(),
            }
        })
        .collect()
}

/// Board items, or labelled issues when the repository has no board items.
pub async fn fetch_items(client: &GitHubClient) -> Result<Vec<ProjectItem>, GitHubError> {
    let data: ProjectsData = client.graphql(QUERY).await?;
    let items = board_items(data);
    if !items.is_empty() {
        return Ok(items);
    }

    info!("No Projects v2 items found, falling back to issues with labels");
    let issues: Vec<IssueResponse> = client.get_repo("/issues?state=all&per_page=50").await?;
    Ok(issue_items(issues))
}

/// Always writes a snapshot; on failure it holds no items.
pub async fn run(client: &GitHubClient, out_dir: &Path) -> Result<()> {
    let snapshot = match fetch_items(client).await {
        Ok(items) => ProjectSnapshot { items },
        Err(e) => {
            error!("Failed to fetch projects: {e}");
            ProjectSnapshot::default()
        }
    };

    write_snapshot(out_dir, FILE_NAME, &snapshot).await?;
    info!("Fetched {} project items", snapshot.items.len());
    Ok(())
}
