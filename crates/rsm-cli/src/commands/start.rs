//! Start command: run a port's acceptor inside tmux and attach to it

use std::path::Path;

use anyhow::{Context, Result};

use rsm_core::tmux::{shell_command, TmuxHost};
use rsm_core::{RsmConfig, SessionHost};
use rsm_protocol::SessionName;

use crate::output::{print_info, print_success};

/// Name given to the acceptor's window
const SERVER_WINDOW: &str = "server";

/// Shell line typed into the server window: clears it, runs the acceptor
/// and closes the window when the acceptor exits
pub fn serve_command_line(
    program: &Path,
    config: &RsmConfig,
    config_path: Option<&Path>,
    port: u16,
    raw_terminal: bool,
) -> Result<String> {
    let mut args = vec![program.to_string_lossy().into_owned()];
    if let Some(path) = config_path {
        args.push("--config".to_string());
        args.push(path.to_string_lossy().into_owned());
    }
    args.push("-d".to_string());
    args.push(config.work_dir.to_string_lossy().into_owned());
    args.push("serve".to_string());
    args.push(port.to_string());
    args.push(SessionName::new(port).to_string());
    if raw_terminal {
        args.push("-t".to_string());
    }

    Ok(format!("clear; {}; exit", shell_command(args)?))
}

/// Execute the start command.
///
/// An existing session for the port is reused. Unless `detach` is set, the
/// terminal is attached to the session afterwards.
pub async fn start_command(
    config: &RsmConfig,
    config_path: Option<&Path>,
    port: u16,
    raw_terminal: bool,
    detach: bool,
) -> Result<()> {
    let host = TmuxHost::from_config(config);
    let name = SessionName::new(port);

    if host.has_session(&name).await? {
        print_info(&format!("Session {} is already running", name));
    } else {
        let program = std::env::current_exe().context("Cannot locate the rsm executable")?;
        let command = serve_command_line(&program, config, config_path, port, raw_terminal)?;
        let target = format!("{}:", name.exact_target());

        host.new_session(&name)
            .await
            .with_context(|| format!("Failed to create tmux session {}", name))?;
        host.rename_window(&target, SERVER_WINDOW).await?;
        host.send_keys(&target, &command).await?;

        print_success(&format!("Listening on port {} in tmux session {}", port, name));
    }

    if detach {
        return Ok(());
    }
    host.attach(&name)
        .await
        .with_context(|| format!("Failed to attach to tmux session {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> RsmConfig {
        RsmConfig {
            work_dir: PathBuf::from("/home/me/.rsm"),
            ..RsmConfig::default()
        }
    }

    fn split_inner(line: &str) -> Vec<String> {
        let inner = line
            .strip_prefix("clear; ")
            .and_then(|l| l.strip_suffix("; exit"))
            .unwrap();
        shlex::split(inner).unwrap()
    }

    #[test]
    fn test_serve_command_line() {
        let line =
            serve_command_line(Path::new("/usr/bin/rsm"), &config(), None, 9001, false).unwrap();
        assert_eq!(
            split_inner(&line),
            ["/usr/bin/rsm", "-d", "/home/me/.rsm", "serve", "9001", "rsm/9001"]
        );
    }

    #[test]
    fn test_serve_command_line_passes_flags() {
        let line = serve_command_line(
            Path::new("/opt/my tools/rsm"),
            &config(),
            Some(Path::new("/etc/rsm.toml")),
            22,
            true,
        )
        .unwrap();
        let args = split_inner(&line);
        assert_eq!(args[0], "/opt/my tools/rsm");
        assert_eq!(&args[1..3], ["--config", "/etc/rsm.toml"]);
        assert_eq!(&args[5..], ["serve", "22", "rsm/22", "-t"]);
    }
}
