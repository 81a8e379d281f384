use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tracker_core::{Job, StartRequest};
use url::Url;

use crate::api::{
    ApiError, ErrorBody, JobStatusApi, JobSubmissionApi, RecentJobsApi, StartAccepted,
};
use crate::settings::TrackerSettings;

/// REST client for the scraping jobs API.
#[derive(Debug, Clone)]
pub struct HttpJobsApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpJobsApi {
    pub fn new(settings: &TrackerSettings) -> Result<Self, ApiError> {
        let mut raw = settings.api_base_url.trim().to_string();
        // `Url::join` drops the last segment unless the base ends with a slash.
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|err| ApiError::Transport(format!("invalid api base url {raw:?}: {err}")))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Transport(format!("invalid endpoint {path:?}: {err}")))
    }

    fn status_url(&self, job_id: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint("scrape/status")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport("api base url cannot carry a path".to_string()))?
            .push(job_id);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl JobSubmissionApi for HttpJobsApi {
    async fn start(&self, request: &StartRequest) -> Result<StartAccepted, ApiError> {
        let body =
            serde_json::to_vec(request).map_err(|err| ApiError::Decode(err.to_string()))?;
        let response = self
            .client
            .post(self.endpoint("scrape/start")?)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let bytes = read_success(response).await?;
        decode(&bytes)
    }
}

#[async_trait::async_trait]
impl JobStatusApi for HttpJobsApi {
    async fn get_status(&self, job_id: &str) -> Result<Option<Job>, ApiError> {
        let response = self
            .client
            .get(self.status_url(job_id)?)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = read_success(response).await?;
        decode(&bytes)
    }
}

#[async_trait::async_trait]
impl RecentJobsApi for HttpJobsApi {
    async fn get_recent(&self) -> Result<Vec<Job>, ApiError> {
        let response = self
            .client
            .get(self.endpoint("scrape/recent")?)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let bytes = read_success(response).await?;
        decode(&bytes)
    }
}

async fn read_success(response: reqwest::Response) -> Result<Vec<u8>, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    if !status.is_success() {
        // Error bodies are best effort; an unreadable one still yields the status.
        let body = serde_json::from_slice::<ErrorBody>(&bytes).unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(bytes.to_vec())
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Transport("request timed out".to_string());
    }
    if err.is_connect() {
        return ApiError::Transport("could not reach the jobs api".to_string());
    }
    ApiError::Transport(err.to_string())
}
