//! Per-session metadata files
//!
//! Each session owns two files in the work directory: the rendezvous
//! channel socket and a one-line `.txt` file holding the accept time and
//! remote address. The files double as the listing index for the control
//! plane, so their names follow [`rsm_protocol::naming`] exactly.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rsm_protocol::{info_file_pattern, ChannelPaths, SessionId};

/// A metadata file found in the work directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session the file belongs to
    pub id: SessionId,
    /// Accept time as recorded (`YYYY-MM-DD HH:MM:SS`)
    pub connected_at: String,
    /// Remote `host:port`
    pub remote: String,
}

impl SessionInfo {
    /// Parse the first line of a metadata file
    pub fn parse(id: SessionId, contents: &str) -> Option<Self> {
        let line = contents.lines().next()?.trim();
        let (connected_at, remote) = line.rsplit_once(' ')?;
        if connected_at.is_empty() || remote.is_empty() {
            return None;
        }
        Some(Self {
            id,
            connected_at: connected_at.to_string(),
            remote: remote.to_string(),
        })
    }
}

/// Append `line` to the metadata file
pub fn write_info_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Read the metadata files recorded for `port`, ordered by session
pub fn list_port_sessions(work_dir: &Path, port: u16) -> io::Result<Vec<SessionInfo>> {
    let mut sessions = Vec::new();

    for path in glob_in(work_dir, &info_file_pattern(port))? {
        let Some(id) = ChannelPaths::parse(&path) else {
            continue;
        };
        match fs::read_to_string(&path) {
            Ok(contents) => match SessionInfo::parse(id, &contents) {
                Some(info) => sessions.push(info),
                None => tracing::debug!("Ignoring malformed metadata file {:?}", path),
            },
            // Removed between the glob and the read
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    sessions.sort_by_key(|s| s.id);
    Ok(sessions)
}

/// Remove the channel socket and metadata file of a session.
///
/// Missing files are not an error.
pub fn remove_session_files(paths: &ChannelPaths) {
    for path in [&paths.socket, &paths.info] {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!("Removed {:?}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
        }
    }
}

/// Remove every channel and metadata file of a port
pub fn purge_port_files(work_dir: &Path, port: u16) -> io::Result<usize> {
    let mut removed = 0;
    for path in glob_in(work_dir, &info_file_pattern(port))? {
        remove_session_files(&ChannelPaths::from_socket(&path.with_extension("sock")));
        removed += 1;
    }
    Ok(removed)
}

fn glob_in(dir: &Path, file_pattern: &str) -> io::Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        file_pattern
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!("Skipping unreadable path: {}", e);
                None
            }
        })
        .collect();
    Ok(paths)
}

/// Guard that removes a session's files when dropped
///
/// Held by the window launcher around the terminal adapter so the files
/// disappear however the adapter exits.
pub struct SessionFilesGuard {
    paths: ChannelPaths,
}

impl SessionFilesGuard {
    /// Take responsibility for the files at `paths`
    pub fn new(paths: ChannelPaths) -> Self {
        Self { paths }
    }

    /// Paths being guarded
    pub fn paths(&self) -> &ChannelPaths {
        &self.paths
    }
}

impl Drop for SessionFilesGuard {
    fn drop(&mut self) {
        remove_session_files(&self.paths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_info_line() {
        let id = SessionId::new(9001, 1);
        let info = SessionInfo::parse(id, "2026-10-16 10:00:01 10.1.2.3:40000\n").unwrap();
        assert_eq!(info.connected_at, "2026-10-16 10:00:01");
        assert_eq!(info.remote, "10.1.2.3:40000");
        assert!(SessionInfo::parse(id, "").is_none());
        assert!(SessionInfo::parse(id, "garbage").is_none());
    }

    #[test]
    fn test_write_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_09001_000001.txt");
        write_info_line(&path, "first").unwrap();
        write_info_line(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_list_port_sessions_filters_by_port() {
        let dir = TempDir::new().unwrap();
        for (port, counter, remote) in [(9001, 2, "b:2"), (9001, 1, "a:1"), (9002, 1, "c:3")] {
            let paths = ChannelPaths::new(dir.path(), SessionId::new(port, counter));
            write_info_line(&paths.info, &format!("2026-10-16 10:00:00 {}", remote)).unwrap();
        }
        fs::write(dir.path().join("client_09001_000003.txt"), "").unwrap();

        let sessions = list_port_sessions(dir.path(), 9001).unwrap();
        let remotes: Vec<_> = sessions.iter().map(|s| s.remote.as_str()).collect();
        assert_eq!(remotes, ["a:1", "b:2"]);
        assert!(list_port_sessions(dir.path(), 7).unwrap().is_empty());
    }

    #[test]
    fn test_glob_escapes_work_dir() {
        let dir = TempDir::new().unwrap();
        let odd = dir.path().join("work[1]");
        fs::create_dir(&odd).unwrap();
        let paths = ChannelPaths::new(&odd, SessionId::new(80, 1));
        write_info_line(&paths.info, "2026-10-16 10:00:00 h:1").unwrap();

        assert_eq!(list_port_sessions(&odd, 80).unwrap().len(), 1);
    }

    #[test]
    fn test_guard_removes_files() {
        let dir = TempDir::new().unwrap();
        let paths = ChannelPaths::new(dir.path(), SessionId::new(9001, 5));
        fs::write(&paths.socket, "").unwrap();
        write_info_line(&paths.info, "x y").unwrap();

        {
            let guard = SessionFilesGuard::new(paths.clone());
            assert_eq!(guard.paths(), &paths);
        }

        assert!(!paths.socket.exists());
        assert!(!paths.info.exists());
        // Second removal is a no-op
        remove_session_files(&paths);
    }

    #[test]
    fn test_purge_port_files() {
        let dir = TempDir::new().unwrap();
        let keep = ChannelPaths::new(dir.path(), SessionId::new(9002, 1));
        write_info_line(&keep.info, "t r").unwrap();
        for counter in 1..=3 {
            let paths = ChannelPaths::new(dir.path(), SessionId::new(9001, counter));
            write_info_line(&paths.info, "t r").unwrap();
        }

        assert_eq!(purge_port_files(dir.path(), 9001).unwrap(), 3);
        assert!(list_port_sessions(dir.path(), 9001).unwrap().is_empty());
        assert!(keep.info.exists());
    }
}
