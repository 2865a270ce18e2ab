use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::error::SourceError;
use crate::core::source::{describe, StatusSource};
use crate::core::status::JobStatus;

pub const DEFAULT_DESCRIBE_COMMAND: &str = "gcloud ai-platform jobs describe";

const WAIT_STEP: Duration = Duration::from_millis(25);

/// Describes a job by shelling out to the platform's CLI.
pub struct GcloudSource {
    id: String,
    command: Vec<String>,
    project: Option<String>,
    timeout: Duration,
}

impl GcloudSource {
    pub fn new(
        id: impl Into<String>,
        command: Vec<String>,
        project: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            command,
            project,
            timeout,
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.command.iter().skip(1).cloned().collect();
        args.push(self.id.clone());
        if let Some(project) = &self.project {
            args.push("--project".to_string());
            args.push(project.clone());
        }
        args
    }

    fn describe(&self) -> Result<String, SourceError> {
        let program = self.command.first().ok_or_else(|| SourceError::Spawn {
            program: String::new(),
            message: "describe command is empty".to_string(),
        })?;

        let mut child = Command::new(program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| SourceError::Spawn {
                program: program.clone(),
                message: err.to_string(),
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = wait_with_deadline(&mut child, self.timeout)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if status.success() {
            Ok(stdout)
        } else {
            Err(SourceError::CommandFailed {
                exit_code: status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

impl StatusSource for GcloudSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_status(&mut self) -> Result<JobStatus, SourceError> {
        let output = self.describe()?;
        describe::parse_yaml(&output)
    }

    fn links(&self) -> Vec<String> {
        describe::console_links(&self.id, self.project.as_deref())
    }
}

fn spawn_reader<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buffer);
        }
        String::from_utf8_lossy(&buffer).to_string()
    })
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<std::process::ExitStatus, SourceError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SourceError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(WAIT_STEP),
            Err(err) => {
                let _ = child.kill();
                return Err(SourceError::CommandFailed {
                    exit_code: None,
                    stderr: err.to_string(),
                });
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::status::JobState;

    fn shell(script: &str, timeout: Duration) -> GcloudSource {
        let command = shell_words::split(&format!("sh -c \"{script}\"")).unwrap();
        GcloudSource::new("job-1", command, None, timeout)
    }

    #[test]
    fn job_id_and_project_follow_the_command() {
        let command = shell_words::split(DEFAULT_DESCRIBE_COMMAND).unwrap();
        let source = GcloudSource::new("job-1", command, Some("proj".to_string()), Duration::from_secs(1));
        assert_eq!(
            source.args(),
            vec!["ai-platform", "jobs", "describe", "job-1", "--project", "proj"]
        );
    }

    #[test]
    fn parses_command_output() {
        let mut source = shell("printf 'state: RUNNING\\n'", Duration::from_secs(5));
        let status = source.fetch_status().unwrap();
        assert_eq!(status.state, JobState::Running);
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let mut source = shell("echo boom >&2; exit 3", Duration::from_secs(5));
        match source.fetch_status() {
            Err(SourceError::CommandFailed { exit_code, stderr }) => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn slow_command_is_killed_at_deadline() {
        let mut source = shell("sleep 5", Duration::from_millis(200));
        let started = Instant::now();
        assert!(matches!(source.fetch_status(), Err(SourceError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let mut source = GcloudSource::new(
            "job-1",
            vec!["jobwatch-no-such-binary".to_string()],
            None,
            Duration::from_secs(1),
        );
        assert!(matches!(source.fetch_status(), Err(SourceError::Spawn { .. })));
    }
}
