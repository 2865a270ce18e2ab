use reqwest::blocking::Client;

use crate::core::error::SourceError;
use crate::core::source::{describe, StatusSource};
use crate::core::status::JobStatus;

pub const DEFAULT_ENDPOINT: &str = "https://ml.googleapis.com";

/// Describes a job through the platform's REST `jobs.get` call.
pub struct HttpSource {
    id: String,
    client: Client,
    endpoint: String,
    project: String,
    access_token: Option<String>,
}

impl HttpSource {
    pub fn new(
        id: impl Into<String>,
        client: Client,
        endpoint: impl Into<String>,
        project: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            client,
            endpoint: endpoint.into(),
            project: project.into(),
            access_token,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/projects/{}/jobs/{}",
            self.endpoint.trim_end_matches('/'),
            self.project,
            self.id
        )
    }
}

impl StatusSource for HttpSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_status(&mut self) -> Result<JobStatus, SourceError> {
        let mut request = self.client.get(self.url());
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(SourceError::Http(format!("{status}: {}", body.trim())));
        }

        describe::parse_json(&body)
    }

    fn links(&self) -> Vec<String> {
        describe::console_links(&self.id, Some(&self.project))
    }
}
