//! Thin GitHub API client shared by the snapshot fetchers.
//!
//! REST calls go through [`GitHubClient::get`], GraphQL through
//! [`GitHubClient::graphql`]. Both send the same headers and the optional
//! token.

use std::fmt;
use std::str::FromStr;

use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

pub const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "gpt-builder-site";
const ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("GraphQL error: {0}")]
    GraphQl(String),
}

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(RepoRef {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(format!("expected <owner>/<name>, got '{s}'")),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    pub repo: RepoRef,
}

impl GitHubClient {
    pub fn new(repo: RepoRef, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: GITHUB_API_URL.to_string(),
            token: token.filter(|t| !t.is_empty()),
            repo,
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder
            .header(header::ACCEPT, ACCEPT)
            .header(header::USER_AGENT, USER_AGENT);
        match &self.token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("token {token}")),
            None => builder,
        }
    }

    /// GET `/repos/{owner}/{name}{suffix}`. Non-2xx answers become
    /// [`GitHubError::Api`].
    pub async fn get_repo<T: DeserializeOwned>(&self, suffix: &str) -> Result<T, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}{}",
            self.base_url, self.repo.owner, self.repo.name, suffix
        );
        self.get(&url).await
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, GitHubError> {
        debug!("GET {url}");
        let response = self.request(self.http.get(url)).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Runs `query` with `$owner`/`$name` bound to the configured repository.
    pub async fn graphql<T: DeserializeOwned>(&self, query: &str) -> Result<T, GitHubError> {
        let url = format!("{}/graphql", self.base_url);
        let payload = GraphQlRequest {
            query,
            variables: json!({ "owner": self.repo.owner, "name": self.repo.name }),
        };

        debug!("POST {url}");
        let response = self
            .request(self.http.post(&url))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        parse_graphql(&body)
    }
}

fn parse_graphql<T: DeserializeOwned>(body: &str) -> Result<T, GitHubError> {
    let parsed: GraphQlResponse<T> = serde_json::from_str(body)?;
    match parsed.data {
        Some(data) => Ok(data),
        None => {
            let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
            Err(GitHubError::GraphQl(if messages.is_empty() {
                "response carried no data".to_string()
            } else {
                messages.join("; ")
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_ref_parses_owner_and_name() {
        let repo: RepoRef = "cywf/gpt-builder".parse().unwrap();
        assert_eq!(repo.owner, "cywf");
        assert_eq!(repo.name, "gpt-builder");
        assert_eq!(repo.to_string(), "cywf/gpt-builder");
    }

    #[test]
    fn test_repo_ref_rejects_bad_shapes() {
        assert!("gpt-builder".parse::<RepoRef>().is_err());
        assert!("/gpt-builder".parse::<RepoRef>().is_err());
        assert!("a/b/c".parse::<RepoRef>().is_err());
    }

    #[test]
    fn test_graphql_errors_surface_messages() {
        let body = r#"{"data":null,"errors":[{"message":"Could not resolve"}]}"#;
        let err = parse_graphql::<Value>(body).unwrap_err();
        assert!(matches!(err, GitHubError::GraphQl(msg) if msg == "Could not resolve"));
    }

    #[test]
    fn test_graphql_data_is_returned() {
        let body = r#"{"data":{"repository":null}}"#;
        let data: Value = parse_graphql(body).unwrap();
        assert!(data["repository"].is_null());
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let client = GitHubClient::new("a/b".parse().unwrap(), Some(String::new()));
        assert!(client.token.is_none());
    }
}
