use std::time::Duration;

use thiserror::Error;

/// Failure talking to a status source. Recovered locally by the engine.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to launch `{program}`: {message}")]
    Spawn { program: String, message: String },
    #[error("describe command failed (exit_code={exit_code:?}): {stderr}")]
    CommandFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("http request failed: {0}")]
    Http(String),
    #[error("could not parse job description: {0}")]
    Parse(String),
    #[error("synthetic source has no scripted steps")]
    Exhausted,
    #[error("status fetch panicked")]
    Panicked,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err.to_string())
    }
}

/// Failure loading or persisting the job registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("registry file {path} is not a valid job list: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to replace registry file {path}: {message}")]
    Persist { path: String, message: String },
}

/// A registration request that could not be honoured.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("empty job id")]
    Empty,
    #[error("request is not valid UTF-8")]
    NotUtf8,
    #[error("request exceeds {limit} bytes")]
    TooLong { limit: usize },
    #[error("invalid job id '{0}'")]
    InvalidId(String),
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum JobwatchError {
    #[error("terminal error: {message}")]
    Terminal { message: String },
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot reach {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("registration rejected: {0}")]
    Rejected(String),
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SourceError::CommandFailed {
            exit_code: Some(1),
            stderr: "NOT_FOUND".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "describe command failed (exit_code=Some(1)): NOT_FOUND"
        );

        let err = IngestionError::InvalidId("a b".to_string());
        assert_eq!(err.to_string(), "invalid job id 'a b'");

        let err = IngestionError::TooLong { limit: 1024 };
        assert_eq!(err.to_string(), "request exceeds 1024 bytes");
    }
}
