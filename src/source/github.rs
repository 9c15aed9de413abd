use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{CandidateSource, RepositoryDetail, SearchPage};
use crate::error::SourceError;
use crate::models::{RepoId, RepositorySummary};
use crate::search::plan::SearchQuery;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const CLIENT_USER_AGENT: &str = concat!("repo-curator/", env!("CARGO_PKG_VERSION"));

/// [`CandidateSource`] backed by the GitHub REST API.
#[derive(Clone)]
pub struct GitHubSource {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubSource {
    pub fn new(client: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, CLIENT_USER_AGENT)
    }
}

#[async_trait]
impl CandidateSource for GitHubSource {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError> {
        let per_page = query.per_page.to_string();
        let response = self
            .get("/search/repositories")
            .query(&[
                ("q", query.q.as_str()),
                ("sort", query.sort.as_str()),
                ("order", query.order.as_str()),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: WireSearchResponse = response.json().await?;
        let items = body
            .items
            .into_iter()
            .filter_map(|raw| match parse_item(raw) {
                Ok(summary) => Some(summary),
                Err(reason) => {
                    tracing::warn!("Dropping malformed search item: {reason}");
                    None
                }
            })
            .collect();

        Ok(SearchPage { items, total_count: body.total_count })
    }

    async fn detail(&self, id: RepoId) -> Result<RepositoryDetail, SourceError> {
        let response = self.get(&format!("/repositories/{id}")).send().await?;
        let response = check_status(response).await?;

        let wire: WireRepository = response.json().await?;
        let subscribers_count = wire.subscribers_count.unwrap_or(0);
        let open_issues_count = wire.open_issues_count.unwrap_or(0);
        let summary = wire.into_summary().map_err(SourceError::Malformed)?;
        Ok(RepositoryDetail { summary, subscribers_count, open_issues_count })
    }
}

/// Map a non-success response to the matching [`SourceError`], telling rate
/// limits apart from hard failures.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = retry_after(response.headers());
    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    let body = response.text().await.unwrap_or_default();

    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && (quota_exhausted || body.to_lowercase().contains("rate limit")));

    if rate_limited {
        Err(SourceError::RateLimited { retry_after })
    } else {
        Err(SourceError::Http { status: status.as_u16(), body })
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[derive(Debug, Deserialize)]
struct WireSearchResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireOwner {
    login: Option<String>,
}

/// Response shape shared by search items and the single-repository lookup.
/// Everything is optional here and checked in [`WireRepository::into_summary`].
#[derive(Debug, Deserialize)]
struct WireRepository {
    id: Option<u64>,
    full_name: Option<String>,
    name: Option<String>,
    owner: Option<WireOwner>,
    description: Option<String>,
    html_url: Option<String>,
    stargazers_count: Option<u64>,
    forks_count: Option<u64>,
    watchers_count: Option<u64>,
    language: Option<String>,
    #[serde(default)]
    topics: Option<Vec<String>>,
    created_at: Option<String>,
    updated_at: Option<String>,
    pushed_at: Option<String>,
    subscribers_count: Option<u64>,
    open_issues_count: Option<u64>,
}

impl WireRepository {
    fn into_summary(self) -> Result<RepositorySummary, String> {
        let id = self.id.ok_or("missing id")?;
        let full_name = self
            .full_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("repository {id} missing full_name"))?;

        let (owner_part, name_part) = full_name.split_once('/').unwrap_or(("", full_name.as_str()));
        let owner = self
            .owner
            .and_then(|o| o.login)
            .unwrap_or_else(|| owner_part.to_string());
        let name = self.name.unwrap_or_else(|| name_part.to_string());
        let url = self
            .html_url
            .unwrap_or_else(|| format!("https://github.com/{full_name}"));

        Ok(RepositorySummary {
            id: RepoId(id),
            name,
            owner,
            description: self.description.filter(|d| !d.trim().is_empty()),
            url,
            stars: self.stargazers_count.unwrap_or(0),
            forks: self.forks_count.unwrap_or(0),
            watchers: self.watchers_count.unwrap_or(0),
            language: self.language,
            topics: self.topics.unwrap_or_default().into_iter().collect(),
            created_at: self.created_at.unwrap_or_default(),
            updated_at: self.updated_at.unwrap_or_default(),
            pushed_at: self.pushed_at.unwrap_or_default(),
            full_name,
        })
    }
}

fn parse_item(raw: serde_json::Value) -> Result<RepositorySummary, String> {
    let wire: WireRepository = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    wire.into_summary()
}
