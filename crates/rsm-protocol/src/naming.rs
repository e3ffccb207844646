//! Session naming scheme
//!
//! Every accepted connection is identified by the listening port and a
//! per-process connection counter. The identifier determines the rendezvous
//! channel path and the metadata file path inside the work directory, and
//! the listening port determines the session name in the tmux host. Both
//! mappings are parseable back so the control plane can work from the
//! filesystem and from the host's session list alone.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

/// File name prefix shared by channel and metadata files
pub const CHANNEL_PREFIX: &str = "client_";

/// Extension of the rendezvous channel socket
pub const SOCKET_EXTENSION: &str = "sock";

/// Extension of the metadata file
pub const INFO_EXTENSION: &str = "txt";

/// Prefix of host session names
pub const SESSION_PREFIX: &str = "rsm/";

/// The counter is rendered with six digits and wraps at this value
const COUNTER_MODULUS: u64 = 1_000_000;

/// Identifier of a single accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    port: u16,
    counter: u64,
}

impl SessionId {
    /// Create a session ID for the given port and connection counter
    pub fn new(port: u16, counter: u64) -> Self {
        Self { port, counter }
    }

    /// Listening port the connection was accepted on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connection counter value
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Base file name shared by the channel and metadata files,
    /// e.g. `client_09001_000001`
    pub fn base_name(&self) -> String {
        format!(
            "{}{:05}_{:06}",
            CHANNEL_PREFIX,
            self.port,
            self.counter % COUNTER_MODULUS
        )
    }

    /// Parse a base name produced by [`SessionId::base_name`]
    pub fn parse_base_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(CHANNEL_PREFIX)?;
        let (port, counter) = rest.split_once('_')?;

        if port.len() < 5 || counter.len() != 6 {
            return None;
        }
        if !port.bytes().all(|b| b.is_ascii_digit()) || !counter.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        Some(Self {
            port: port.parse().ok()?,
            counter: counter.parse().ok()?,
        })
    }

    /// Name of the host window opened for this session, e.g. `10.0.0.7/01`
    pub fn window_name(&self, remote: IpAddr) -> String {
        format!("{}/{:02}", remote, self.counter % 100)
    }

    /// Host session this connection belongs to
    pub fn session_name(&self) -> SessionName {
        SessionName::new(self.port)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_name())
    }
}

/// Filesystem locations of a session's channel and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPaths {
    /// Unix domain socket the terminal adapter connects to
    pub socket: PathBuf,
    /// One-line metadata file (timestamp and remote address)
    pub info: PathBuf,
}

impl ChannelPaths {
    /// Derive the paths for `id` inside `work_dir`
    pub fn new(work_dir: &Path, id: SessionId) -> Self {
        let base = id.base_name();
        Self {
            socket: work_dir.join(format!("{}.{}", base, SOCKET_EXTENSION)),
            info: work_dir.join(format!("{}.{}", base, INFO_EXTENSION)),
        }
    }

    /// Derive the metadata path that belongs to a channel socket path
    pub fn from_socket(socket: &Path) -> Self {
        Self {
            socket: socket.to_path_buf(),
            info: socket.with_extension(INFO_EXTENSION),
        }
    }

    /// Recover the session ID from either file name
    pub fn parse(path: &Path) -> Option<SessionId> {
        let ext = path.extension()?.to_str()?;
        if ext != SOCKET_EXTENSION && ext != INFO_EXTENSION {
            return None;
        }
        SessionId::parse_base_name(path.file_stem()?.to_str()?)
    }
}

/// File name pattern matching every metadata file of a port,
/// e.g. `client_09001_*.txt`
pub fn info_file_pattern(port: u16) -> String {
    format!("{}{:05}_*.{}", CHANNEL_PREFIX, port, INFO_EXTENSION)
}

fn session_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^rsm/(\d+)").expect("session name pattern is valid"))
}

/// Name of the tmux host session that serves one listening port (`rsm/<port>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionName {
    port: u16,
}

impl SessionName {
    /// Session name for a listening port
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Listening port this session serves
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Match a session name or a host listing line such as
    /// `rsm/9001: 2 windows (created ...)`.
    ///
    /// Lines for other sessions, and ports outside the valid range,
    /// yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = session_name_regex().captures(line)?;
        let port = caps.get(1)?.as_str().parse().ok()?;
        Some(Self { port })
    }

    /// Exact-match target for the host (`=rsm/<port>`), so `rsm/90` never
    /// resolves to `rsm/9001` by prefix
    pub fn exact_target(&self) -> String {
        format!("={}", self)
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SESSION_PREFIX, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_is_zero_padded() {
        let id = SessionId::new(9001, 1);
        assert_eq!(id.base_name(), "client_09001_000001");
        assert_eq!(format!("{}", id), "client_09001_000001");
    }

    #[test]
    fn test_counter_wraps_in_name() {
        let id = SessionId::new(22, 1_000_042);
        assert_eq!(id.base_name(), "client_00022_000042");
    }

    #[test]
    fn test_channel_paths_round_trip() {
        let dir = Path::new("/tmp/rsm-work");
        let id = SessionId::new(9001, 17);
        let paths = ChannelPaths::new(dir, id);

        assert_eq!(paths.socket, dir.join("client_09001_000017.sock"));
        assert_eq!(paths.info, dir.join("client_09001_000017.txt"));
        assert_eq!(ChannelPaths::parse(&paths.socket), Some(id));
        assert_eq!(ChannelPaths::parse(&paths.info), Some(id));
        assert_eq!(ChannelPaths::from_socket(&paths.socket), paths);
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert_eq!(SessionId::parse_base_name("client_9001_000001"), None);
        assert_eq!(SessionId::parse_base_name("client_09001_1"), None);
        assert_eq!(SessionId::parse_base_name("server_09001_000001"), None);
        assert_eq!(SessionId::parse_base_name("client_0900x_000001"), None);
        assert_eq!(ChannelPaths::parse(Path::new("client_09001_000001.log")), None);
        assert_eq!(ChannelPaths::parse(Path::new("tmux.sock")), None);
    }

    #[test]
    fn test_window_name() {
        let id = SessionId::new(9001, 123);
        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        assert_eq!(id.window_name(ip), "10.0.0.7/23");
    }

    #[test]
    fn test_info_file_pattern() {
        assert_eq!(info_file_pattern(9001), "client_09001_*.txt");
        let pattern = info_file_pattern(443);
        assert!(pattern.starts_with("client_00443_"));
    }

    #[test]
    fn test_session_name_round_trip() {
        let name = SessionName::new(9001);
        assert_eq!(name.to_string(), "rsm/9001");
        assert_eq!(SessionName::parse(&name.to_string()), Some(name));
        assert_eq!(name.exact_target(), "=rsm/9001");
    }

    #[test]
    fn test_session_name_from_listing_line() {
        let line = "rsm/4444: 3 windows (created Thu Oct 16 10:00:00 2026)";
        assert_eq!(SessionName::parse(line).map(|n| n.port()), Some(4444));
        assert_eq!(SessionName::parse("work: 1 windows"), None);
        assert_eq!(SessionName::parse("other/rsm/4444: 1 windows"), None);
        assert_eq!(SessionName::parse("rsm/99999999: 1 windows"), None);
    }
}
