//! Session registry: the list and kill operations
//!
//! The registry has no state of its own. Active sessions are whatever the
//! session host reports under the `rsm/<port>` naming scheme, enriched with
//! the metadata files found in the work directory. Sessions of the host
//! that do not follow the scheme are never touched.

use std::fmt;
use std::path::Path;

use rsm_protocol::SessionName;

use crate::error::{HostError, RsmError};
use crate::metadata::{self, SessionInfo};
use crate::traits::SessionHost;

/// One listening port with its currently recorded connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Host session serving the port
    pub name: SessionName,
    /// Connections recorded in the work directory for the port
    pub connections: Vec<SessionInfo>,
}

impl ActiveSession {
    /// Listening port
    pub fn port(&self) -> u16 {
        self.name.port()
    }
}

/// Result of killing one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The host destroyed the session
    Killed(SessionName),
    /// No such session existed
    NotFound(SessionName),
}

impl KillOutcome {
    /// Session the outcome refers to
    pub fn name(&self) -> SessionName {
        match self {
            KillOutcome::Killed(name) | KillOutcome::NotFound(name) => *name,
        }
    }
}

impl fmt::Display for KillOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillOutcome::Killed(name) => write!(f, "Session for port {} killed.", name.port()),
            KillOutcome::NotFound(name) => {
                write!(f, "No session found for port {}.", name.port())
            }
        }
    }
}

/// Host session names that follow the naming scheme, sorted and deduplicated
pub async fn matching_sessions(host: &dyn SessionHost) -> Result<Vec<SessionName>, HostError> {
    let mut names: Vec<SessionName> = host
        .list_sessions()
        .await?
        .iter()
        .filter_map(|line| SessionName::parse(line))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

/// Enumerate active sessions. Read-only.
pub async fn list_sessions(
    host: &dyn SessionHost,
    work_dir: &Path,
) -> Result<Vec<ActiveSession>, RsmError> {
    let mut sessions = Vec::new();
    for name in matching_sessions(host).await? {
        let connections = metadata::list_port_sessions(work_dir, name.port())?;
        sessions.push(ActiveSession { name, connections });
    }
    Ok(sessions)
}

/// Kill the session serving `port`.
///
/// A missing session is reported as [`KillOutcome::NotFound`]. Leftover
/// channel and metadata files of a killed port are removed.
pub async fn kill_port(
    host: &dyn SessionHost,
    work_dir: &Path,
    port: u16,
) -> Result<KillOutcome, HostError> {
    let name = SessionName::new(port);
    if !host.kill_session(&name).await? {
        tracing::debug!("No host session {}", name);
        return Ok(KillOutcome::NotFound(name));
    }

    tracing::info!("Killed host session {}", name);
    purge_files(work_dir, port);
    Ok(KillOutcome::Killed(name))
}

/// Kill every session that follows the naming scheme
pub async fn kill_all(
    host: &dyn SessionHost,
    work_dir: &Path,
) -> Result<Vec<KillOutcome>, HostError> {
    let mut outcomes = Vec::new();
    for name in matching_sessions(host).await? {
        outcomes.push(kill_port(host, work_dir, name.port()).await?);
    }
    Ok(outcomes)
}

fn purge_files(work_dir: &Path, port: u16) {
    match metadata::purge_port_files(work_dir, port) {
        Ok(0) => {}
        Ok(n) => tracing::debug!("Removed files of {} connection(s) on port {}", n, port),
        Err(e) => tracing::warn!("Failed to clean up files for port {}: {}", port, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::write_info_line;
    use async_trait::async_trait;
    use rsm_protocol::{ChannelPaths, SessionId};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory stand-in for tmux
    struct FakeHost {
        sessions: Mutex<Vec<String>>,
    }

    impl FakeHost {
        fn new(names: &[&str]) -> Self {
            Self {
                sessions: Mutex::new(names.iter().map(|s| s.to_string()).collect()),
            }
        }

        fn names(&self) -> Vec<String> {
            self.sessions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionHost for FakeHost {
        async fn list_sessions(&self) -> Result<Vec<String>, HostError> {
            Ok(self.names())
        }

        async fn has_session(&self, name: &SessionName) -> Result<bool, HostError> {
            Ok(self.names().contains(&name.to_string()))
        }

        async fn kill_session(&self, name: &SessionName) -> Result<bool, HostError> {
            let mut sessions = self.sessions.lock().unwrap();
            let before = sessions.len();
            sessions.retain(|s| *s != name.to_string());
            Ok(sessions.len() != before)
        }
    }

    fn record(dir: &Path, port: u16, counter: u64, remote: &str) {
        let paths = ChannelPaths::new(dir, SessionId::new(port, counter));
        write_info_line(&paths.info, &format!("2026-10-16 12:00:00 {}", remote)).unwrap();
    }

    #[tokio::test]
    async fn test_list_with_no_sessions() {
        let dir = TempDir::new().unwrap();
        let host = FakeHost::new(&[]);
        assert!(list_sessions(&host, dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_only_matching_sessions_with_metadata() {
        let dir = TempDir::new().unwrap();
        record(dir.path(), 9001, 1, "10.0.0.1:1000");
        record(dir.path(), 9001, 2, "10.0.0.2:2000");
        record(dir.path(), 9100, 1, "10.0.0.3:3000");

        let host = FakeHost::new(&["main", "rsm/9100", "rsm/9001", "scratch/rsm/1"]);
        let sessions = list_sessions(&host, dir.path()).await.unwrap();

        let ports: Vec<u16> = sessions.iter().map(ActiveSession::port).collect();
        assert_eq!(ports, [9001, 9100]);
        assert_eq!(sessions[0].connections.len(), 2);
        assert_eq!(sessions[0].connections[1].remote, "10.0.0.2:2000");
        assert_eq!(sessions[1].connections[0].connected_at, "2026-10-16 12:00:00");
        assert_eq!(host.names().len(), 4);
    }

    #[tokio::test]
    async fn test_kill_missing_port_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let host = FakeHost::new(&["rsm/9001"]);

        let outcome = kill_port(&host, dir.path(), 9002).await.unwrap();
        assert_eq!(outcome, KillOutcome::NotFound(SessionName::new(9002)));
        assert_eq!(outcome.to_string(), "No session found for port 9002.");
        assert_eq!(host.names(), ["rsm/9001"]);
    }

    #[tokio::test]
    async fn test_kill_port_is_idempotent() {
        let dir = TempDir::new().unwrap();
        record(dir.path(), 9001, 1, "10.0.0.1:1000");
        let host = FakeHost::new(&["rsm/9001", "rsm/9002"]);

        let first = kill_port(&host, dir.path(), 9001).await.unwrap();
        assert_eq!(first, KillOutcome::Killed(SessionName::new(9001)));
        assert_eq!(first.to_string(), "Session for port 9001 killed.");
        assert!(metadata::list_port_sessions(dir.path(), 9001).unwrap().is_empty());

        let second = kill_port(&host, dir.path(), 9001).await.unwrap();
        assert_eq!(second, KillOutcome::NotFound(SessionName::new(9001)));
        assert_eq!(host.names(), ["rsm/9002"]);
    }

    #[tokio::test]
    async fn test_kill_all_leaves_foreign_sessions() {
        let dir = TempDir::new().unwrap();
        let host = FakeHost::new(&["rsm/9001", "work", "rsm/22", "notes-rsm/3"]);

        let outcomes = kill_all(&host, dir.path()).await.unwrap();
        let killed: Vec<u16> = outcomes.iter().map(|o| o.name().port()).collect();
        assert_eq!(killed, [22, 9001]);
        assert!(outcomes.iter().all(|o| matches!(o, KillOutcome::Killed(_))));
        assert_eq!(host.names(), ["work", "notes-rsm/3"]);
    }

    #[tokio::test]
    async fn test_kill_all_with_nothing_to_kill() {
        let dir = TempDir::new().unwrap();
        let host = FakeHost::new(&["work"]);
        assert!(kill_all(&host, dir.path()).await.unwrap().is_empty());
        assert_eq!(host.names(), ["work"]);
    }
}
