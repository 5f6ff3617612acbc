//! HTTP adapter for the judge server's JSON API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FetchError;
use crate::models::{
    Contest, Identifier, Job, JobState, NewContest, NewJob, RanklistEntry, ServerError,
};
use crate::services::config_loader::ServerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringRule {
    Latest,
    Highest,
}

impl ScoringRule {
    pub const ALL: [ScoringRule; 2] = [ScoringRule::Latest, ScoringRule::Highest];

    pub fn as_str(self) -> &'static str {
        match self {
            ScoringRule::Latest => "latest",
            ScoringRule::Highest => "highest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreaker {
    SubmissionTime,
    SubmissionCount,
    UserId,
}

impl TieBreaker {
    pub const ALL: [TieBreaker; 3] = [
        TieBreaker::SubmissionTime,
        TieBreaker::SubmissionCount,
        TieBreaker::UserId,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TieBreaker::SubmissionTime => "submission_time",
            TieBreaker::SubmissionCount => "submission_count",
            TieBreaker::UserId => "user_id",
        }
    }
}

/// Ranking options the server applies before it sends the ranklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RanklistQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_rule: Option<ScoringRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tie_breaker: Option<TieBreaker>,
}

/// `GET /jobs` filters. Unset fields are left out of the query string.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JobFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_id: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
}

impl JobFilter {
    pub fn is_empty(&self) -> bool {
        *self == JobFilter::default()
    }
}

/// The judge server as the screens see it.
#[async_trait]
pub trait JudgeApi: Send + Sync {
    async fn list_contests(&self) -> Result<Vec<Contest>, FetchError>;
    async fn create_contest(&self, contest: &NewContest) -> Result<Contest, FetchError>;
    async fn get_contest(&self, id: &Identifier) -> Result<Contest, FetchError>;
    async fn get_ranklist(
        &self,
        contest_id: &Identifier,
        query: &RanklistQuery,
    ) -> Result<Vec<RanklistEntry>, FetchError>;
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, FetchError>;
    async fn create_job(&self, job: &NewJob) -> Result<Job, FetchError>;
    async fn get_job(&self, id: &Identifier) -> Result<Job, FetchError>;
    /// Re-queues a finished job and returns it as the server now has it.
    async fn rejudge_job(&self, id: &Identifier) -> Result<Job, FetchError>;
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ServerConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| FetchError::Request(format!("{}: {}", config.base_url, err)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::Request(format!(
                "{} cannot be used as a base url",
                config.base_url
            )));
        }

        let mut builder =
            reqwest::Client::builder().user_agent(concat!("mroj/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments to the base url, escaping each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Request(format!("{} has no path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, FetchError> {
        let url = self.endpoint(segments)?;
        debug!("{} {}", method, url);
        Ok(self.client.request(method, url))
    }
}

/// Sends the request and decodes a 200 body. Anything else is an error.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    if status != StatusCode::OK {
        let detail = serde_json::from_slice::<ServerError>(&body)
            .ok()
            .map(|err| format!("{} {}", err.reason, err.message));
        return Err(FetchError::Status { status, detail });
    }

    serde_json::from_slice(&body).map_err(FetchError::Decode)
}

#[async_trait]
impl JudgeApi for ApiClient {
    async fn list_contests(&self) -> Result<Vec<Contest>, FetchError> {
        send_json(self.request(Method::GET, &["contests"])?).await
    }

    async fn create_contest(&self, contest: &NewContest) -> Result<Contest, FetchError> {
        send_json(self.request(Method::POST, &["contests"])?.json(contest)).await
    }

    async fn get_contest(&self, id: &Identifier) -> Result<Contest, FetchError> {
        send_json(self.request(Method::GET, &["contests", id.as_str()])?).await
    }

    async fn get_ranklist(
        &self,
        contest_id: &Identifier,
        query: &RanklistQuery,
    ) -> Result<Vec<RanklistEntry>, FetchError> {
        let request = self
            .request(Method::GET, &["contests", contest_id.as_str(), "ranklist"])?
            .query(query);
        send_json(request).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, FetchError> {
        send_json(self.request(Method::GET, &["jobs"])?.query(filter)).await
    }

    async fn create_job(&self, job: &NewJob) -> Result<Job, FetchError> {
        send_json(self.request(Method::POST, &["jobs"])?.json(job)).await
    }

    async fn get_job(&self, id: &Identifier) -> Result<Job, FetchError> {
        send_json(self.request(Method::GET, &["jobs", id.as_str()])?).await
    }

    async fn rejudge_job(&self, id: &Identifier) -> Result<Job, FetchError> {
        // the server wraps the re-queued job in a one-element array
        let request = self.request(Method::PUT, &["jobs", id.as_str()])?;
        let jobs: Vec<Job> = send_json(request).await?;
        jobs.into_iter().next().ok_or_else(|| {
            FetchError::Decode(serde::de::Error::custom(format!(
                "empty rejudge response for job {id}"
            )))
        })
    }
}
