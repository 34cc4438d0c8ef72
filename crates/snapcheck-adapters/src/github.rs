//! Pull request comments through the GitHub REST API.
//!
//! Publishing first deals with earlier comments that start with the same
//! header: snapshot reports are folded into a collapsed `<details>` block,
//! device grids are deleted. The new body is then posted as a fresh comment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snapcheck_core::{CollaboratorResult, Notifier, REPORT_HEADER};
use tracing::{debug, info};

use crate::error::{into_notify, AdapterError, AdapterResult};
use crate::retry::{retry_with_backoff, RetryConfig};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const FOLD_SUMMARY: &str = "Open past snapshot test result";

/// Where to comment and how to authenticate.
#[derive(Debug, Clone)]
pub struct GithubTarget {
    pub owner: String,
    pub repository: String,
    pub pr_number: u64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct IssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

/// Wrap a previous report so it renders collapsed.
pub fn fold_comment_body(body: &str) -> String {
    format!("<details><summary>{FOLD_SUMMARY}</summary>\n\n{body}\n</details>\n")
}

/// Whether a comment body starts with `header`.
///
/// Folded comments start with `<details>` and no longer match.
pub fn has_header(body: &str, header: &str) -> bool {
    body.trim_start().starts_with(header)
}

/// What happens to earlier comments carrying the same header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviousComments {
    /// Rewrite them as a collapsed `<details>` block.
    #[default]
    Fold,
    Delete,
}

/// [`Notifier`] posting the report as a pull request comment.
pub struct GithubNotifier {
    client: reqwest::Client,
    api_base: String,
    target: GithubTarget,
    retry: RetryConfig,
    header: String,
    previous: PreviousComments,
}

impl GithubNotifier {
    pub fn new(target: GithubTarget) -> AdapterResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("snapcheck/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            target,
            retry: RetryConfig::default(),
            header: REPORT_HEADER.to_string(),
            previous: PreviousComments::Fold,
        })
    }

    /// Earlier comments starting with `header` are handled per `previous`.
    pub fn with_previous_comments(
        mut self,
        header: impl Into<String>,
        previous: PreviousComments,
    ) -> Self {
        self.header = header.into();
        self.previous = previous;
        self
    }

    /// Point at a GitHub Enterprise (or test) API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn issue_comments_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base, self.target.owner, self.target.repository, self.target.pr_number
        )
    }

    fn comment_url(&self, id: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/comments/{}",
            self.api_base, self.target.owner, self.target.repository, id
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.target.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> AdapterResult<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn list_comments(&self) -> AdapterResult<Vec<IssueComment>> {
        let url = self.issue_comments_url();
        let mut comments = Vec::new();
        let mut page = 1u32;
        loop {
            let page_param = page.to_string();
            let builder = self
                .request(reqwest::Method::GET, &url)
                .query(&[("per_page", "100"), ("page", page_param.as_str())]);
            let batch: Vec<IssueComment> =
                self.send(builder, "list comments").await?.json().await?;
            let last = batch.len() < 100;
            comments.extend(batch);
            if last {
                return Ok(comments);
            }
            page += 1;
        }
    }

    async fn previous_comments(&self) -> AdapterResult<Vec<IssueComment>> {
        let comments =
            retry_with_backoff(&self.retry, "list comments", || self.list_comments()).await?;
        Ok(comments
            .into_iter()
            .filter(|c| c.body.as_deref().is_some_and(|b| has_header(b, &self.header)))
            .collect())
    }

    async fn fold_previous(&self, comments: Vec<IssueComment>) -> AdapterResult<usize> {
        let mut folded = 0;
        for comment in comments {
            let folded_body = fold_comment_body(comment.body.as_deref().unwrap_or_default());
            let url = self.comment_url(comment.id);
            retry_with_backoff(&self.retry, "fold comment", || {
                let builder = self
                    .request(reqwest::Method::PATCH, &url)
                    .json(&CommentBody { body: &folded_body });
                self.send(builder, "update comment")
            })
            .await?;
            debug!(comment = comment.id, "folded previous comment");
            folded += 1;
        }
        Ok(folded)
    }

    async fn delete_previous(&self, comments: Vec<IssueComment>) -> AdapterResult<usize> {
        let mut deleted = 0;
        for comment in comments {
            let url = self.comment_url(comment.id);
            retry_with_backoff(&self.retry, "delete comment", || {
                self.send(
                    self.request(reqwest::Method::DELETE, &url),
                    "delete comment",
                )
            })
            .await?;
            debug!(comment = comment.id, "deleted previous comment");
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn post(&self, body: &str) -> AdapterResult<()> {
        let url = self.issue_comments_url();
        retry_with_backoff(&self.retry, "post comment", || {
            let builder = self
                .request(reqwest::Method::POST, &url)
                .json(&CommentBody { body });
            self.send(builder, "create comment")
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for GithubNotifier {
    async fn publish(&self, body: &str) -> CollaboratorResult<()> {
        let previous = self.previous_comments().await.map_err(into_notify)?;
        let replaced = match self.previous {
            PreviousComments::Fold => self.fold_previous(previous).await,
            PreviousComments::Delete => self.delete_previous(previous).await,
        }
        .map_err(into_notify)?;
        self.post(body).await.map_err(into_notify)?;
        info!(
            event = "github.commented",
            owner = %self.target.owner,
            repository = %self.target.repository,
            pr = self.target.pr_number,
            previous = ?self.previous,
            replaced = replaced,
        );
        Ok(())
    }
}
