use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use log::{info, warn};
use serde::Deserialize;

use crate::config::GithubConfig;

pub const CHANGELOG_FILE: &str = "CHANGELOG.md";

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("readme-ssg/", env!("CARGO_PKG_VERSION"));
const TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub sha: String,
    pub url: String,
    pub author: String,
    pub message: String,
    pub date: String,
}

#[derive(Deserialize, Debug)]
struct CommitEntry {
    sha: String,
    html_url: String,
    commit: CommitDetail,
}

#[derive(Deserialize, Debug)]
struct CommitDetail {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Deserialize, Debug)]
struct CommitAuthor {
    name: String,
    date: String,
}

impl From<CommitEntry> for Change {
    fn from(entry: CommitEntry) -> Self {
        let (author, date) = entry
            .commit
            .author
            .map(|a| (a.name, a.date))
            .unwrap_or_else(|| ("unknown".to_string(), String::new()));

        Self {
            sha: entry.sha,
            url: entry.html_url,
            author,
            message: entry.commit.message,
            date,
        }
    }
}

fn commits_url(owner: &str, repo: &str) -> String {
    format!("{API_BASE}/repos/{owner}/{repo}/commits")
}

/// Most recent commits of the configured repository.
pub async fn fetch_changes(github: &GithubConfig) -> Result<Vec<Change>> {
    let (Some(owner), Some(repo)) = (&github.owner, &github.repo) else {
        return Err(anyhow!(
            "GitHub owner and repo must be set (GITHUB_OWNER/GITHUB_REPO or [github] in readme.toml)"
        ));
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECONDS))
        .user_agent(USER_AGENT)
        .build()
        .context("failed to create HTTP client")?;

    let url = commits_url(owner, repo);
    let mut request = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json");
    match &github.token {
        Some(token) => request = request.bearer_auth(token),
        None => warn!("no GITHUB_TOKEN set, using unauthenticated requests"),
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("failed to send request to {url}"))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(anyhow!("HTTP {status} from {url}: {error_text}"));
    }

    let json_text = response
        .text()
        .await
        .context("failed to read response body")?;
    let entries: Vec<CommitEntry> = serde_json::from_str(&json_text)
        .with_context(|| format!("failed to parse commits from {url}"))?;

    info!("fetched {} commits from {owner}/{repo}", entries.len());
    Ok(entries.into_iter().map(Change::from).collect())
}

pub fn render_changelog(changes: &[Change]) -> String {
    if changes.is_empty() {
        return "# Change Log\n\nNo changes recorded yet.".to_string();
    }

    let mut md = String::from("# Change Log\n\n");
    md.push_str("| Commit | Author | Message | Date |\n");
    md.push_str("|--------|--------|---------|------|\n");

    for change in changes {
        let short_sha: String = change.sha.chars().take(7).collect();
        let summary = change.message.lines().next().unwrap_or_default();
        md.push_str(&format!(
            "| [{}]({}) | {} | {} | {} |\n",
            short_sha,
            change.url,
            table_cell(&change.author),
            table_cell(summary),
            change.date
        ));
    }

    md
}

fn table_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
