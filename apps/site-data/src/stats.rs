use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::github::GitHubClient;
use crate::snapshot::write_snapshot;

pub const FILE_NAME: &str = "stats.json";
const COMMIT_WEEKS: usize = 12;

#[derive(Debug, Deserialize)]
struct RepoResponse {
    stargazers_count: Option<u64>,
    forks_count: Option<u64>,
    subscribers_count: Option<u64>,
    open_issues_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct WeekActivity {
    pub week: i64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitWeek {
    pub week: i64,
    pub commits: u64,
}

#[derive(Debug, Serialize)]
pub struct CommitSummary {
    pub weeks: Vec<CommitWeek>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoStats {
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    /// Share of bytes per language, in percent with one decimal.
    pub languages: Map<String, Value>,
    pub commits: CommitSummary,
    pub updated_at: String,
}

/// Converts GitHub's byte counts into percentages, keeping GitHub's order.
pub fn language_percentages(bytes: &Map<String, Value>) -> Map<String, Value> {
    let total: u64 = bytes.values().filter_map(Value::as_u64).sum();

    bytes
        .iter()
        .map(|(lang, count)| {
            let count = count.as_u64().unwrap_or(0);
            let pct = if total == 0 {
                0.0
            } else {
                (count as f64 / total as f64 * 1000.0).round() / 10.0
            };
            (lang.clone(), Value::from(pct))
        })
        .collect()
}

/// Keeps the most recent weeks of commit activity.
pub fn recent_commits(activity: &[WeekActivity], weeks: usize) -> CommitSummary {
    let start = activity.len().saturating_sub(weeks);
    let weeks: Vec<CommitWeek> = activity[start..]
        .iter()
        .map(|w| CommitWeek {
            week: w.week,
            commits: w.total,
        })
        .collect();
    let total = weeks.iter().map(|w| w.commits).sum();
    CommitSummary { weeks, total }
}

/// Fetches repository counters, languages and commit activity.
/// Failure of the repository or language request is fatal; missing commit
/// statistics (GitHub answers 202 while computing them) yield no weeks.
pub async fn fetch_stats(client: &GitHubClient) -> Result<RepoStats> {
    let repo: RepoResponse = client
        .get_repo("")
        .await
        .with_context(|| format!("failed to fetch repository {}", client.repo))?;

    let languages: Map<String, Value> = client
        .get_repo("/languages")
        .await
        .context("failed to fetch languages")?;

    let activity: Vec<WeekActivity> = match client.get_repo("/stats/commit_activity").await {
        Ok(activity) => activity,
        Err(e) => {
            warn!("Commit activity unavailable: {e}");
            Vec::new()
        }
    };

    Ok(RepoStats {
        stars: repo.stargazers_count.unwrap_or(0),
        forks: repo.forks_count.unwrap_or(0),
        watchers: repo.subscribers_count.unwrap_or(0),
        open_issues: repo.open_issues_count.unwrap_or(0),
        languages: language_percentages(&languages),
        commits: recent_commits(&activity, COMMIT_WEEKS),
        updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub async fn run(client: &GitHubClient, out_dir: &Path) -> Result<()> {
    let stats = fetch_stats(client).await?;
    write_snapshot(out_dir, FILE_NAME, &stats).await?;

    info!("Repository statistics fetched successfully");
    info!("  Stars: {}", stats.stars);
    info!("  Forks: {}", stats.forks);
    info!("  Watchers: {}", stats.watchers);
    info!("  Open Issues: {}", stats.open_issues);
    Ok(())
}
