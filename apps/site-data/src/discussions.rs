use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::github::{GitHubClient, GitHubError};
use crate::snapshot::write_snapshot;

pub const FILE_NAME: &str = "discussions.json";

const QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    discussions(first: 25, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        title
        url
        author { login }
        createdAt
        category { name }
        comments { totalCount }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
pub struct DiscussionsData {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    discussions: Option<Connection<DiscussionNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Connection<T> {
    #[serde(default)]
    nodes: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscussionNode {
    title: String,
    url: String,
    author: Option<Login>,
    created_at: String,
    category: Option<Named>,
    comments: Option<TotalCount>,
}

#[derive(Debug, Deserialize)]
struct Login {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub title: String,
    pub url: String,
    pub author: String,
    pub created_at: String,
    pub category: String,
    pub comments: u64,
}

/// Flattens the GraphQL answer. A repository without discussions yields
/// an empty list.
pub fn flatten(data: DiscussionsData) -> Vec<Discussion> {
    data.repository
        .and_then(|r| r.discussions)
        .map(|c| c.nodes)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .map(|d| Discussion {
            title: d.title,
            url: d.url,
            author: d.author.map(|a| a.login).unwrap_or_else(|| "Unknown".into()),
            created_at: d.created_at,
            category: d.category.map(|c| c.name).unwrap_or_else(|| "General".into()),
            comments: d.comments.map(|c| c.total_count).unwrap_or(0),
        })
        .collect()
}

pub async fn fetch_discussions(client: &GitHubClient) -> Result<Vec<Discussion>, GitHubError> {
    let data: DiscussionsData = client.graphql(QUERY).await?;
    Ok(flatten(data))
}

/// Always writes a snapshot; on failure it is an empty list.
pub async fn run(client: &GitHubClient, out_dir: &Path) -> Result<()> {
    let discussions = match fetch_discussions(client).await {
        Ok(discussions) => discussions,
        Err(e) => {
            error!("Failed to fetch discussions: {e}");
            Vec::new()
        }
    };

    write_snapshot(out_dir, FILE_NAME, &discussions).await?;
    info!("Fetched {} discussions", discussions.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_applies_fallbacks() {
        let data: DiscussionsData = serde_json::from_value(json!({
            "repository": {
                "discussions": {
                    "nodes": [
                        {
                            "title": "Ideas",
                            "url": "https://github.com/o/r/discussions/1",
                            "author": {"login": "octo"},
                            "createdAt": "2024-05-01T10:00:00Z",
                            "category": {"name": "Q&A"},
                            "comments": {"totalCount": 3}
                        },
                        {
                            "title": "Ghost",
                            "url": "https://github.com/o/r/discussions/2",
                            "author": null,
                            "createdAt": "2024-05-02T10:00:00Z",
                            "category": null,
                            "comments": null
                        },
                        null
                    ]
                }
            }
        }))
        .unwrap();

        let discussions = flatten(data);
        assert_eq!(discussions.len(), 2);
        assert_eq!(discussions[0].author, "octo");
        assert_eq!(discussions[0].comments, 3);
        assert_eq!(discussions[1].author, "Unknown");
        assert_eq!(discussions[1].category, "General");
        assert_eq!(discussions[1].comments, 0);
    }

    #[test]
    fn test_flatten_missing_repository() {
        let data: DiscussionsData = serde_json::from_value(json!({"repository": null})).unwrap();
        assert!(flatten(data).is_empty());
    }

    #[test]
    fn test_discussion_serializes_camel_case() {
        let d = Discussion {
            title: "t".into(),
            url: "u".into(),
            author: "a".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
            category: "General".into(),
            comments: 0,
        };
        let json = serde_json::to_value(d).unwrap();
        assert_eq!(json["createdAt"], "2024-01-01T00:00:00Z");
    }
}
