//! Status sources: where the engine asks "what is job X doing right now".

use std::time::Duration;

use crate::core::error::SourceError;
use crate::core::status::{JobMetrics, JobStatus};

pub mod describe;
pub mod gcloud;
pub mod http;
pub mod synthetic;

pub use gcloud::GcloudSource;
pub use http::HttpSource;
pub use synthetic::{Step, SyntheticSource};

/// Capability set of one status source. Each tracked job owns its own instance.
pub trait StatusSource: Send {
    /// Job id this source reports on. Stable for the lifetime of the source.
    fn id(&self) -> &str;

    fn fetch_status(&mut self) -> Result<JobStatus, SourceError>;

    /// Point-in-time utilization, for sources that can report it.
    fn fetch_metrics(&mut self) -> Option<Result<JobMetrics, SourceError>> {
        None
    }

    /// Console and log links shown under the job's row.
    fn links(&self) -> Vec<String> {
        Vec::new()
    }
}

pub type SourceFactory = Box<dyn Fn(&str) -> Box<dyn StatusSource> + Send>;

/// Settings shared by every source of one kind.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    Synthetic,
    Gcloud {
        command: Vec<String>,
        project: Option<String>,
        timeout: Duration,
    },
    Http {
        endpoint: String,
        project: String,
        access_token: Option<String>,
        client: reqwest::blocking::Client,
    },
}

impl SourceConfig {
    pub fn http(
        endpoint: impl Into<String>,
        project: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(SourceConfig::Http {
            endpoint: endpoint.into(),
            project: project.into(),
            access_token,
            client,
        })
    }

    /// Creates a fresh source bound to `id`.
    pub fn build(&self, id: &str) -> Box<dyn StatusSource> {
        match self {
            SourceConfig::Synthetic => Box::new(SyntheticSource::randomized(id)),
            SourceConfig::Gcloud {
                command,
                project,
                timeout,
            } => Box::new(GcloudSource::new(
                id,
                command.clone(),
                project.clone(),
                *timeout,
            )),
            SourceConfig::Http {
                endpoint,
                project,
                access_token,
                client,
            } => Box::new(HttpSource::new(
                id,
                client.clone(),
                endpoint.clone(),
                project.clone(),
                access_token.clone(),
            )),
        }
    }

    pub fn into_factory(self) -> SourceFactory {
        Box::new(move |id: &str| self.build(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_binds_each_source_to_its_id() {
        let factory = SourceConfig::Synthetic.into_factory();
        let first = factory("job-1");
        let second = factory("job-2");
        assert_eq!(first.id(), "job-1");
        assert_eq!(second.id(), "job-2");
    }

    #[test]
    fn gcloud_sources_carry_console_links() {
        let config = SourceConfig::Gcloud {
            command: vec!["gcloud".to_string()],
            project: Some("proj".to_string()),
            timeout: Duration::from_secs(1),
        };
        let source = config.build("job-9");
        let links = source.links();
        assert_eq!(links.len(), 2);
        assert!(links[0].contains("job-9"));
    }
}
