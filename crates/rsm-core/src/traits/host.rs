//! Session host abstraction

use async_trait::async_trait;
use rsm_protocol::SessionName;

use crate::error::HostError;

/// The external host that owns named, long-lived sessions.
///
/// Sessions are shared with anything else using the same host, so callers
/// select rsm's sessions by name only (see [`SessionName::parse`]).
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Names of every session the host currently knows about
    async fn list_sessions(&self) -> Result<Vec<String>, HostError>;

    /// Whether the session exists
    async fn has_session(&self, name: &SessionName) -> Result<bool, HostError>;

    /// Destroy the session. Returns `Ok(false)` if it did not exist.
    async fn kill_session(&self, name: &SessionName) -> Result<bool, HostError>;
}
