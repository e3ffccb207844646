//! Time utilities for rsm
//!
//! Session metadata records the moment a connection was accepted with
//! seconds precision in local time, followed by the remote address.

use std::net::SocketAddr;

use chrono::{DateTime, Local, TimeZone};

/// Timestamp format used in metadata files (`2026-10-16 14:03:09`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way metadata files record it
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Info line for a connection accepted now from `remote`
pub fn info_line(remote: SocketAddr) -> String {
    info_line_at(&Local::now(), remote)
}

/// Info line for a connection accepted at `at` from `remote`
pub fn info_line_at<Tz: TimeZone>(at: &DateTime<Tz>, remote: SocketAddr) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{} {}", format_timestamp(at), remote)
}
