//! Output formatting utilities for the CLI

use tabled::{settings::Style, Table, Tabled};

use rsm_core::registry::ActiveSession;

/// Message printed by `list` when no port is open
pub const NO_OPEN_PORTS: &str = "No open ports found.";

/// Format active sessions as a table, one row per connection.
///
/// Ports without recorded connections get a single row with `-` columns.
pub fn format_sessions(sessions: &[ActiveSession]) -> String {
    if sessions.is_empty() {
        return NO_OPEN_PORTS.to_string();
    }

    #[derive(Tabled)]
    struct SessionRow {
        #[tabled(rename = "PORT")]
        port: u16,
        #[tabled(rename = "SESSION")]
        session: String,
        #[tabled(rename = "CONNECTION")]
        connection: String,
        #[tabled(rename = "REMOTE")]
        remote: String,
        #[tabled(rename = "CONNECTED")]
        connected: String,
    }

    let mut rows = Vec::new();
    for session in sessions {
        if session.connections.is_empty() {
            rows.push(SessionRow {
                port: session.port(),
                session: session.name.to_string(),
                connection: "-".to_string(),
                remote: "-".to_string(),
                connected: "-".to_string(),
            });
        }
        for info in &session.connections {
            rows.push(SessionRow {
                port: session.port(),
                session: session.name.to_string(),
                connection: format!("{:06}", info.id.counter()),
                remote: info.remote.clone(),
                connected: info.connected_at.clone(),
            });
        }
    }

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_core::metadata::SessionInfo;
    use rsm_protocol::{SessionId, SessionName};

    #[test]
    fn test_empty_listing() {
        assert_eq!(format_sessions(&[]), "No open ports found.");
    }

    #[test]
    fn test_one_row_per_connection() {
        let sessions = vec![
            ActiveSession {
                name: SessionName::new(9001),
                connections: vec![
                    SessionInfo {
                        id: SessionId::new(9001, 1),
                        connected_at: "2026-10-16 10:00:00".to_string(),
                        remote: "10.0.0.1:5000".to_string(),
                    },
                    SessionInfo {
                        id: SessionId::new(9001, 2),
                        connected_at: "2026-10-16 10:05:00".to_string(),
                        remote: "10.0.0.2:5001".to_string(),
                    },
                ],
            },
            ActiveSession {
                name: SessionName::new(22),
                connections: Vec::new(),
            },
        ];

        let table = format_sessions(&sessions);
        assert!(table.contains("rsm/9001"));
        assert!(table.contains("10.0.0.2:5001"));
        assert!(table.contains("000002"));
        assert!(table.contains("rsm/22"));
        // Two connection rows and one idle port row
        assert_eq!(table.matches("rsm/").count(), 3);
    }
}
