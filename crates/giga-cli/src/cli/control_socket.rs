//! Control socket: server (during `giga run`) and client (for `giga pause`
//! and `giga remove`). Protocol: one line per command, "pause <id>" or
//! "cancel <id>".

use anyhow::Result;
use giga_core::control::MissionControl;
use giga_core::ledger::MissionId;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// A parsed control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause(MissionId),
    Cancel(MissionId),
}

impl ControlCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let (verb, id) = line.trim().split_once(' ')?;
        let id = id.trim().parse::<MissionId>().ok()?;
        match verb {
            "pause" => Some(ControlCommand::Pause(id)),
            "cancel" => Some(ControlCommand::Cancel(id)),
            _ => None,
        }
    }

    fn line(self) -> String {
        match self {
            ControlCommand::Pause(id) => format!("pause {}\n", id),
            ControlCommand::Cancel(id) => format!("cancel {}\n", id),
        }
    }
}

/// Spawns a task that listens on `path` and forwards each command to
/// `control`. Malformed lines are ignored.
pub fn spawn_control_listener(
    control: Arc<MissionControl>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let control = Arc::clone(&control);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            let handled = match ControlCommand::parse(&line) {
                                Some(ControlCommand::Pause(id)) => control.request_pause(id),
                                Some(ControlCommand::Cancel(id)) => control.request_cancel(id),
                                None => continue,
                            };
                            if !handled {
                                tracing::debug!(
                                    line = %line.trim(),
                                    "control command for a mission not running here"
                                );
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends `command` to a running `giga run`. False when no runner is listening.
pub async fn send(socket_path: &Path, command: ControlCommand) -> bool {
    if !socket_path.exists() {
        return false;
    }
    let Ok(mut stream) = UnixStream::connect(socket_path).await else {
        return false;
    };
    stream.write_all(command.line().as_bytes()).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pause_and_cancel() {
        assert_eq!(ControlCommand::parse("pause 3\n"), Some(ControlCommand::Pause(3)));
        assert_eq!(ControlCommand::parse(" cancel  12 "), Some(ControlCommand::Cancel(12)));
        assert_eq!(ControlCommand::parse("pause x"), None);
        assert_eq!(ControlCommand::parse("stop 1"), None);
        assert_eq!(ControlCommand::parse(""), None);
    }

    #[tokio::test]
    async fn nothing_listening_is_not_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        assert!(!send(&path, ControlCommand::Pause(1)).await);
    }

    #[tokio::test]
    async fn listener_accepts_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let control = Arc::new(MissionControl::new());
        let handle = spawn_control_listener(Arc::clone(&control), &path).unwrap();
        assert!(send(&path, ControlCommand::Cancel(7)).await);
        handle.abort();
    }
}
