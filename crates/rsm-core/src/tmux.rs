//! tmux integration for rsm
//!
//! rsm keeps its sessions in a tmux server running on a private socket in
//! the work directory. One tmux session (`rsm/<port>`) hosts the acceptor
//! for a port in its first window, and every accepted connection gets its
//! own window running the terminal adapter.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use rsm_protocol::SessionName;
use tokio::process::Command;

use crate::config::RsmConfig;
use crate::error::{HostError, LaunchError};
use crate::traits::{LaunchRequest, Launcher, SessionHost};

/// Handle to the tmux server on a given socket
#[derive(Debug, Clone)]
pub struct TmuxHost {
    binary: String,
    socket: PathBuf,
}

impl TmuxHost {
    /// Create a handle for `binary` talking to the server on `socket`
    pub fn new(binary: impl Into<String>, socket: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            socket: socket.into(),
        }
    }

    /// Create a handle from configuration
    pub fn from_config(config: &RsmConfig) -> Self {
        Self::new(config.tmux_binary.clone(), config.tmux_socket())
    }

    /// Socket the server listens on
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-S").arg(&self.socket).args(args);
        cmd
    }

    /// Run a tmux command and capture its output
    async fn output<I, S>(&self, args: I) -> Result<Output, HostError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command(args);
        cmd.stdin(Stdio::null());
        tracing::trace!("Running {:?}", cmd);

        cmd.output().await.map_err(|source| self.spawn_error(source))
    }

    /// Run a tmux command that must succeed
    async fn run(&self, args: &[&str]) -> Result<(), HostError> {
        let output = self.output(args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HostError::CommandFailed {
                command: format!("{} {}", self.binary, args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn spawn_error(&self, source: io::Error) -> HostError {
        if source.kind() == io::ErrorKind::NotFound {
            HostError::NotInstalled(self.binary.clone())
        } else {
            HostError::Spawn {
                program: self.binary.clone(),
                source,
            }
        }
    }

    /// Create a detached session
    pub async fn new_session(&self, name: &SessionName) -> Result<(), HostError> {
        self.run(&["new-session", "-d", "-s", &name.to_string()]).await
    }

    /// Rename a window, e.g. target `rsm/9001:0`
    pub async fn rename_window(&self, target: &str, new_name: &str) -> Result<(), HostError> {
        self.run(&["rename-window", "-t", target, new_name]).await
    }

    /// Type `keys` into a window followed by Enter
    pub async fn send_keys(&self, target: &str, keys: &str) -> Result<(), HostError> {
        self.run(&["send-keys", "-t", target, keys, "Enter"]).await
    }

    /// Open a window in `session` running the shell command `command`
    pub async fn new_window(
        &self,
        session: &SessionName,
        window_name: &str,
        command: &str,
    ) -> Result<(), HostError> {
        let target = format!("{}:", session.exact_target());
        self.run(&["new-window", "-t", &target, "-n", window_name, command])
            .await
    }

    /// Attach the current terminal to a session, returning when the user
    /// detaches or the session ends
    pub async fn attach(&self, name: &SessionName) -> Result<(), HostError> {
        let target = name.exact_target();
        let args = ["attach-session", "-t", target.as_str()];
        // Attaching from inside another tmux client is refused while
        // $TMUX is set, even though rsm uses its own server.
        let status = self
            .command(args)
            .env_remove("TMUX")
            .status()
            .await
            .map_err(|source| self.spawn_error(source))?;

        if status.success() {
            Ok(())
        } else {
            Err(HostError::CommandFailed {
                command: format!("{} {}", self.binary, args.join(" ")),
                status: status.to_string(),
                stderr: String::new(),
            })
        }
    }
}

#[async_trait]
impl SessionHost for TmuxHost {
    async fn list_sessions(&self) -> Result<Vec<String>, HostError> {
        let output = match self.output(["list-sessions", "-F", "#{session_name}"]).await {
            Ok(output) => output,
            Err(HostError::NotInstalled(binary)) => {
                tracing::debug!("{} not installed, no sessions", binary);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if !output.status.success() {
            // No server on the socket yet
            tracing::debug!(
                "tmux list-sessions: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(Vec::new());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    async fn has_session(&self, name: &SessionName) -> Result<bool, HostError> {
        let target = name.exact_target();
        match self.output(["has-session", "-t", target.as_str()]).await {
            Ok(output) => Ok(output.status.success()),
            Err(HostError::NotInstalled(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn kill_session(&self, name: &SessionName) -> Result<bool, HostError> {
        let target = name.exact_target();
        match self.output(["kill-session", "-t", target.as_str()]).await {
            Ok(output) => Ok(output.status.success()),
            Err(HostError::NotInstalled(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Quote an argument vector into a single shell command line
pub fn shell_command<I, S>(args: I) -> Result<String, LaunchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
    shlex::try_join(args.iter().map(String::as_str))
        .map_err(|e| LaunchError::Command(e.to_string()))
}

/// Launcher that opens one tmux window per session.
///
/// The window runs `<program> -d <work_dir> window [-t] --info <line> <socket>`,
/// which records the info line, runs the terminal adapter and removes the
/// session's files when it exits.
#[derive(Debug, Clone)]
pub struct TmuxLauncher {
    host: TmuxHost,
    session: SessionName,
    program: PathBuf,
    work_dir: PathBuf,
}

impl TmuxLauncher {
    /// Launch windows into `session` using the rsm executable at `program`
    pub fn new(
        host: TmuxHost,
        session: SessionName,
        program: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            session,
            program: program.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Shell command the window runs for `request`
    pub fn window_command(&self, request: &LaunchRequest) -> Result<String, LaunchError> {
        let mut args = vec![
            self.program.to_string_lossy().into_owned(),
            "-d".to_string(),
            self.work_dir.to_string_lossy().into_owned(),
            "window".to_string(),
        ];
        if request.raw_terminal {
            args.push("-t".to_string());
        }
        args.push("--info".to_string());
        args.push(request.info_line.clone());
        args.push(request.paths.socket.to_string_lossy().into_owned());

        shell_command(args)
    }
}

#[async_trait]
impl Launcher for TmuxLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        let command = self.window_command(request)?;
        tracing::debug!(session = %request.session, "Opening window: {}", command);

        self.host
            .new_window(&self.session, &request.window_name, &command)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_protocol::{ChannelPaths, SessionId};
    use std::net::SocketAddr;

    fn request(raw: bool) -> LaunchRequest {
        let id = SessionId::new(9001, 3);
        let remote: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let paths = ChannelPaths::new(Path::new("/w d"), id);
        let mut request = LaunchRequest::new(id, paths, remote, raw);
        request.info_line = "2026-10-16 10:00:00 10.0.0.9:5000".to_string();
        request
    }

    #[test]
    fn test_shell_command_quotes_spaces() {
        let cmd = shell_command(["echo", "a b", "c"]).unwrap();
        assert_eq!(
            shlex::split(&cmd),
            Some(vec!["echo".to_string(), "a b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_shell_command_rejects_nul() {
        assert!(shell_command(["a\0b"]).is_err());
    }

    #[test]
    fn test_window_command_cbreak() {
        let launcher = TmuxLauncher::new(
            TmuxHost::new("tmux", "/w d/tmux.sock"),
            SessionName::new(9001),
            "/usr/bin/rsm",
            "/w d",
        );
        let cmd = launcher.window_command(&request(false)).unwrap();
        let args = shlex::split(&cmd).unwrap();
        assert_eq!(
            args,
            [
                "/usr/bin/rsm",
                "-d",
                "/w d",
                "window",
                "--info",
                "2026-10-16 10:00:00 10.0.0.9:5000",
                "/w d/client_09001_000003.sock",
            ]
        );
        assert_eq!(request(false).window_name, "10.0.0.9/03");
    }

    #[test]
    fn test_window_command_raw_flag() {
        let launcher = TmuxLauncher::new(
            TmuxHost::new("tmux", "/tmp/tmux.sock"),
            SessionName::new(9001),
            "rsm",
            "/tmp",
        );
        let args = shlex::split(&launcher.window_command(&request(true)).unwrap()).unwrap();
        assert_eq!(&args[3..6], ["window", "-t", "--info"]);
    }

    #[tokio::test]
    async fn test_missing_binary_means_no_sessions() {
        let host = TmuxHost::new("rsm-test-no-such-tmux", "/tmp/rsm-test-none.sock");
        assert!(host.list_sessions().await.unwrap().is_empty());
        assert!(!host.has_session(&SessionName::new(1)).await.unwrap());
        assert!(!host.kill_session(&SessionName::new(1)).await.unwrap());

        let err = host.new_session(&SessionName::new(1)).await.unwrap_err();
        assert!(matches!(err, HostError::NotInstalled(_)));
    }
}
