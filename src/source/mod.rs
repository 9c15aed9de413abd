//! Where candidate repositories come from.

pub mod github;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::{RepoId, RepositorySummary};
use crate::search::plan::SearchQuery;

pub use github::GitHubSource;

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub items: Vec<RepositorySummary>,
    /// Total matches reported by the source, which may exceed `items.len()`.
    pub total_count: u64,
}

/// A summary plus the fields only the single-repository lookup returns.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryDetail {
    pub summary: RepositorySummary,
    pub subscribers_count: u64,
    pub open_issues_count: u64,
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Run one query and return at most one page. An empty page is not an error.
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError>;

    async fn detail(&self, id: RepoId) -> Result<RepositoryDetail, SourceError>;
}
