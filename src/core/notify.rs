use std::process::{Command, Stdio};
use std::thread;

use crate::core::detector::ChangeEvent;

/// Receives one call per notification. Must return promptly and never fail.
pub trait Notifier: Send {
    fn notify(&self, title: &str, body: &str);
}

pub fn change_message(event: &ChangeEvent) -> (String, String) {
    (
        format!("{} ✨", event.new),
        format!(
            "Status for '{}' changed from '{}' to '{}'",
            event.id, event.old, event.new
        ),
    )
}

pub fn watch_message(id: &str) -> (String, String) {
    ("jobwatch".to_string(), format!("Will keep an eye on '{id}'"))
}

/// Desktop notifications through the platform's notifier binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(title: &str, body: &str) -> Command {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {} with title {}",
                applescript_string(body),
                applescript_string(title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.arg(title).arg(body);
            cmd
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
        let mut cmd = Self::command(title, body);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        thread::spawn(move || match cmd.status() {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!("notifier exited with {status}"),
            Err(err) => tracing::warn!("notifier could not be launched: {err}"),
        });
    }
}

/// Notifications written to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
    }
}

fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::Notifier;

    /// Keeps every notification for later inspection.
    #[derive(Debug, Default, Clone)]
    pub struct RecordingNotifier {
        pub sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingNotifier {
        pub fn messages(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::JobState;

    #[test]
    fn change_message_names_both_states() {
        let event = ChangeEvent {
            id: "job-7".to_string(),
            old: JobState::Running,
            new: JobState::Succeeded,
        };
        let (title, body) = change_message(&event);
        assert_eq!(title, "SUCCEEDED ✨");
        assert_eq!(
            body,
            "Status for 'job-7' changed from 'RUNNING' to 'SUCCEEDED'"
        );
    }

    #[test]
    fn applescript_strings_are_escaped() {
        assert_eq!(applescript_string(r#"say "hi""#), r#""say \"hi\"""#);
    }
}
