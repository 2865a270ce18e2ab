//! Parsing of the platform's job description, shared by the CLI and HTTP transports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::SourceError;
use crate::core::status::{ConsumedUnits, JobState, JobStatus};

const CONSOLE: &str = "https://console.cloud.google.com/ai-platform/jobs";
const LOGS: &str = "https://console.cloud.google.com/logs?resource=ml_job%2Fjob_id%2F";

/// The fields of a job resource this crate reads. Values stay loosely typed so
/// a malformed optional field degrades instead of failing the whole parse.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    state: Option<Value>,
    create_time: Option<Value>,
    start_time: Option<Value>,
    end_time: Option<Value>,
    labels: Option<Value>,
    training_input: Option<Value>,
    training_output: Option<Value>,
}

/// Parses `gcloud ... describe` output, which is YAML by default.
pub fn parse_yaml(output: &str) -> Result<JobStatus, SourceError> {
    let value: Value =
        serde_yaml_ng::from_str(output).map_err(|err| SourceError::Parse(err.to_string()))?;
    status_from_value(value)
}

pub fn parse_json(body: &str) -> Result<JobStatus, SourceError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| SourceError::Parse(err.to_string()))?;
    status_from_value(value)
}

/// Builds a status from a job resource. Only `state` is required; anything
/// missing or malformed degrades to `None` or unknown.
pub fn status_from_value(value: Value) -> Result<JobStatus, SourceError> {
    if !value.is_object() {
        return Err(SourceError::Parse(
            "job description is not a mapping".to_string(),
        ));
    }
    let job: JobResource =
        serde_json::from_value(value).map_err(|err| SourceError::Parse(err.to_string()))?;

    let raw_state = job
        .state
        .as_ref()
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::Parse("missing `state` field".to_string()))?
        .trim()
        .to_string();
    let state = JobState::from_remote(&raw_state);

    let consumed_units = ConsumedUnits::from_option(
        job.training_output
            .as_ref()
            .and_then(|output| output.get("consumedMLUnits"))
            .and_then(number_or_string),
    );

    let labels = job
        .labels
        .as_ref()
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .map(|(key, value)| (key.clone(), label_text(value)))
                .collect()
        })
        .unwrap_or_else(BTreeMap::new);

    let end_time = if state.is_terminal() {
        optional_time(job.end_time.as_ref())
    } else {
        None
    };

    Ok(JobStatus {
        state,
        raw_state,
        consumed_units,
        create_time: optional_time(job.create_time.as_ref()),
        start_time: optional_time(job.start_time.as_ref()),
        end_time,
        labels,
        training_input: job.training_input.unwrap_or(Value::Null),
    })
}

pub fn console_links(id: &str, project: Option<&str>) -> Vec<String> {
    let console = match project {
        Some(project) => format!("{CONSOLE}/{id}?project={project}"),
        None => format!("{CONSOLE}/{id}"),
    };
    vec![console, format!("{LOGS}{id}")]
}

fn optional_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let text = value?.as_str()?;
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

fn number_or_string(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
